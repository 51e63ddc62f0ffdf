//! Markup serialization: the textual form used for undo snapshots, content
//! extraction and building subtrees from pasted rich text.
//!
//! The writer is canonical (attributes sorted, void elements unclosed) so two
//! structurally equal subtrees always serialize to the same string. The
//! reader is lenient in the way mail bodies require: unknown tags are
//! unwrapped, `head`/`script`/`style` content is dropped and unclosed
//! elements are closed at the end of input.

use logos::Logos;

use crate::error::{EditorError, Result};

use super::{Document, NodeId, NodeKind, Role};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum ContentToken<'src> {
    #[regex(r"<![^>]*>")]
    Declaration,

    #[regex(r"</[A-Za-z][A-Za-z0-9]*[ \t\r\n]*>", |lex| {
        let s = lex.slice();
        s[2..s.len() - 1].trim()
    })]
    CloseTag(&'src str),

    #[regex(r"<[A-Za-z][^<>]*>", |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    OpenTag(&'src str),

    #[regex(r"[^<]+", |lex| lex.slice())]
    Text(&'src str),
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum AttributeToken<'src> {
    #[token("=")]
    Equals,

    #[token("/")]
    Slash,

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    DoubleQuoted(&'src str),

    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    SingleQuoted(&'src str),

    #[regex(r#"[^ \t\r\n"'=/<>]+"#, |lex| lex.slice())]
    Word(&'src str),
}

/// Tags whose whole content is dropped.
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "title"];
/// Tags dropped without content (they never have any).
const DROPPED_VOID_TAGS: &[&str] = &["meta", "link", "base", "wbr"];

impl Document {
    /// Parses a whole document. A top-level `<body>` tag contributes its
    /// attributes to the document body.
    pub fn from_markup(markup: &str) -> Result<Document> {
        let mut document = Document::new();
        let body = document.body();
        parse_into(&mut document, body, markup, true)?;
        Ok(document)
    }

    /// Builds detached nodes from `markup` and returns the top-level ones.
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>> {
        self.parse_fragment_as(Role::Container, markup)
    }

    /// Like [`Document::parse_fragment`], but top-level text is kept or
    /// dropped the way it would be directly inside `parent`.
    pub fn parse_fragment_for(&mut self, parent: NodeId, markup: &str) -> Result<Vec<NodeId>> {
        let role = self.role(parent).unwrap_or(Role::Container);
        self.parse_fragment_as(role, markup)
    }

    fn parse_fragment_as(&mut self, role: Role, markup: &str) -> Result<Vec<NodeId>> {
        let holder = self.create_element(role);
        let parsed = parse_into(self, holder, markup, false);
        let nodes = self.children(holder).to_vec();
        self.clear_children(holder);
        self.release(holder);
        if let Err(err) = parsed {
            for node in nodes {
                self.release(node);
            }
            return Err(err);
        }
        Ok(nodes)
    }

    /// Replaces every child of `node` with the nodes parsed from `markup`.
    pub fn set_inner_markup(&mut self, node: NodeId, markup: &str) -> Result<()> {
        let nodes = self.parse_fragment_for(node, markup)?;
        self.clear_children(node);
        for child in nodes {
            self.append_child(node, child)?;
        }
        Ok(())
    }

    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    pub fn inner_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(*child, &mut out);
        }
        out
    }

    /// Serializes the children of `node` in `first..end`.
    pub fn children_markup(&self, node: NodeId, first: usize, end: usize) -> String {
        let mut out = String::new();
        let children = self.children(node);
        let end = end.min(children.len());
        if first < end {
            for child in &children[first..end] {
                self.write_node(*child, &mut out);
            }
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            NodeKind::Text(text) => escape_text(text, out),
            NodeKind::Element(element) => {
                let tag = element.role.tag();
                out.push('<');
                out.push_str(tag);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attribute(value, out);
                    out.push('"');
                }
                out.push('>');
                if element.role.is_void() {
                    return;
                }
                for child in self.children(node) {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            // The tag lexer ends a tag at the first `>`.
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn escape_attribute_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_attribute(value, &mut out);
    out
}

pub(crate) fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_text(text, &mut out);
    out
}

fn parse_into(document: &mut Document, root: NodeId, markup: &str, adopt_body: bool) -> Result<()> {
    let mut stack = vec![root];
    let mut skipping: Option<String> = None;

    for (token, span) in ContentToken::lexer(markup).spanned() {
        if let Some(skipped) = &skipping {
            if let Ok(ContentToken::CloseTag(name)) = token {
                if name.eq_ignore_ascii_case(skipped) {
                    skipping = None;
                }
            }
            continue;
        }

        let Some(&current) = stack.last() else {
            break;
        };

        match token {
            Ok(ContentToken::Declaration) => {}
            Ok(ContentToken::Text(text)) => {
                append_text(document, current, &decode_entities(text))?;
            }
            // A lone `<` that does not open a tag is ordinary text.
            Err(()) => append_text(document, current, &markup[span.clone()])?,
            Ok(ContentToken::CloseTag(name)) => {
                let name = name.to_ascii_lowercase();
                let Some(role) = Role::from_tag(&name) else {
                    continue;
                };
                if role == Role::Body {
                    continue;
                }
                if let Some(position) = stack
                    .iter()
                    .rposition(|node| document.has_role(*node, role))
                {
                    if position > 0 {
                        stack.truncate(position);
                    }
                }
            }
            Ok(ContentToken::OpenTag(inner)) => {
                let name_end = inner
                    .find(|c: char| c.is_whitespace() || c == '/')
                    .unwrap_or(inner.len());
                let name = inner[..name_end].to_ascii_lowercase();
                let attribute_source = &inner[name_end..];
                let self_closing = attribute_source.trim_end().ends_with('/');

                if SKIPPED_TAGS.contains(&name.as_str()) {
                    if !self_closing {
                        skipping = Some(name);
                    }
                    continue;
                }
                if DROPPED_VOID_TAGS.contains(&name.as_str()) {
                    continue;
                }

                let attributes = parse_attributes(attribute_source, span.start + 1 + name_end)?;
                let Some(role) = Role::from_tag(&name) else {
                    continue;
                };
                if role == Role::Body {
                    if adopt_body && current == root {
                        for (attribute, value) in attributes {
                            document.set_attribute(root, &attribute, value)?;
                        }
                    }
                    continue;
                }
                let in_item = document.has_role(current, Role::ListItem);
                if role == Role::ListItem && in_item && stack.len() > 1 {
                    stack.pop();
                }

                let parent = stack.last().copied().unwrap_or(root);
                let node = document.create_element(role);
                for (attribute, value) in attributes {
                    document.set_attribute(node, &attribute, value)?;
                }
                document.append_child(parent, node)?;
                if !role.is_void() && !self_closing {
                    stack.push(node);
                }
            }
        }
    }
    Ok(())
}

fn append_text(document: &mut Document, parent: NodeId, text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    // Formatting whitespace between structural tags carries no content.
    let structural = document.role(parent).is_some_and(Role::ignores_blank_text);
    if structural && text.chars().all(|c| c.is_ascii_whitespace()) {
        return Ok(());
    }
    let node = document.create_text(text);
    document.append_child(parent, node)
}

fn parse_attributes(source: &str, base_offset: usize) -> Result<Vec<(String, String)>> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut pending: Option<&str> = None;
    let mut expecting_value = false;

    for (token, span) in AttributeToken::lexer(source).spanned() {
        let token = token.map_err(|_| EditorError::Markup {
            offset: base_offset + span.start,
            message: format!("unexpected `{}` in tag", &source[span.clone()]),
        })?;
        match token {
            AttributeToken::Slash => {}
            AttributeToken::Equals => {
                if pending.is_none() || expecting_value {
                    return Err(EditorError::Markup {
                        offset: base_offset + span.start,
                        message: "`=` without an attribute name".to_string(),
                    });
                }
                expecting_value = true;
            }
            AttributeToken::Word(word) => {
                if expecting_value {
                    if let Some(name) = pending.take() {
                        push_attribute(&mut attributes, name, &decode_entities(word));
                    }
                    expecting_value = false;
                } else if let Some(name) = pending.replace(word) {
                    push_attribute(&mut attributes, name, "");
                }
            }
            AttributeToken::DoubleQuoted(value) | AttributeToken::SingleQuoted(value) => {
                let Some(name) = pending.take().filter(|_| expecting_value) else {
                    return Err(EditorError::Markup {
                        offset: base_offset + span.start,
                        message: "attribute value without a name".to_string(),
                    });
                };
                push_attribute(&mut attributes, name, &decode_entities(value));
                expecting_value = false;
            }
        }
    }
    if let Some(name) = pending {
        push_attribute(&mut attributes, name, "");
    }
    Ok(attributes)
}

/// Inline `style` declarations are flattened into one attribute each.
fn push_attribute(attributes: &mut Vec<(String, String)>, name: &str, value: &str) {
    let name = name.to_ascii_lowercase();
    if name != "style" {
        attributes.push((name, value.to_string()));
        return;
    }
    for declaration in value.split(';') {
        let Some((property, property_value)) = declaration.split_once(':') else {
            continue;
        };
        let property = match property.trim().to_ascii_lowercase().as_str() {
            "padding-inline-start" => "padding-start".to_string(),
            other => other.to_string(),
        };
        let property_value = property_value.trim();
        if !property.is_empty() && !property_value.is_empty() {
            attributes.push((property, property_value.to_string()));
        }
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(position) = rest.find('&') {
        out.push_str(&rest[..position]);
        let candidate = &rest[position..];
        let decoded = candidate
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&candidate[1..end]).map(|ch| (ch, end)));
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
