//! Conversion between the editing tree and [`tdoc`] documents, so FTML and
//! Markdown files can be opened and saved.
//!
//! tdoc knows fewer block kinds than the editor: headings deeper than three
//! levels become third-level headers, tables flatten into tab-separated
//! lines and checklists import as bulleted lists with `[x]` / `[ ]` marks.

use std::io::Cursor;

use tdoc::{ChecklistItem, InlineStyle, Paragraph, ParagraphType, Span, markdown, writer::Writer};

use crate::document::{Document, InlineRole, NodeId, Role, attr, class};
use crate::error::{EditorError, Result};

fn conversion_error(error: impl std::fmt::Display) -> EditorError {
    EditorError::Markup {
        offset: 0,
        message: error.to_string(),
    }
}

pub fn read_ftml(source: &str) -> Result<Document> {
    let parsed = tdoc::parse(Cursor::new(source)).map_err(conversion_error)?;
    import(&parsed)
}

pub fn read_markdown(source: &str) -> Result<Document> {
    let parsed = markdown::parse(Cursor::new(source)).map_err(conversion_error)?;
    import(&parsed)
}

pub fn write_ftml(document: &Document) -> Result<String> {
    Writer::new()
        .write_to_string(&export(document))
        .map_err(conversion_error)
}

pub fn write_markdown(document: &Document) -> Result<String> {
    let mut contents = Vec::new();
    markdown::write(&mut contents, &export(document)).map_err(conversion_error)?;
    String::from_utf8(contents).map_err(conversion_error)
}

// ============================================================================
// Import
// ============================================================================

/// Builds an editing tree from a tdoc document.
pub fn import(source: &tdoc::Document) -> Result<Document> {
    let mut document = Document::new();
    let body = document.body();
    for paragraph in &source.paragraphs {
        import_paragraph(&mut document, body, paragraph)?;
    }
    Ok(document)
}

fn import_paragraph(document: &mut Document, parent: NodeId, paragraph: &Paragraph) -> Result<()> {
    match paragraph {
        Paragraph::Text { content } => import_block(document, parent, Role::Paragraph, content),
        Paragraph::Header1 { content } => import_block(document, parent, Role::Heading(1), content),
        Paragraph::Header2 { content } => import_block(document, parent, Role::Heading(2), content),
        Paragraph::Header3 { content } => import_block(document, parent, Role::Heading(3), content),
        Paragraph::CodeBlock { content } => {
            let block = document.create_element(Role::Preformatted);
            document.append_child(parent, block)?;
            let text: String = content.iter().map(plain_span_text).collect();
            if !text.is_empty() {
                let node = document.create_text(text);
                document.append_child(block, node)?;
            }
            Ok(())
        }
        Paragraph::Quote { children } => {
            let quote = document.create_element(Role::QuoteBlock);
            document.set_attribute(quote, attr::TYPE, "cite")?;
            document.append_child(parent, quote)?;
            for child in children {
                import_paragraph(document, quote, child)?;
            }
            Ok(())
        }
        Paragraph::OrderedList { entries } => {
            import_list(document, parent, Role::OrderedList, entries)
        }
        Paragraph::UnorderedList { entries } => {
            import_list(document, parent, Role::UnorderedList, entries)
        }
        Paragraph::Checklist { items } => import_checklist(document, parent, items),
        #[allow(unreachable_patterns)]
        other => import_block(document, parent, Role::Paragraph, other.content()),
    }
}

fn import_block(
    document: &mut Document,
    parent: NodeId,
    role: Role,
    content: &[Span],
) -> Result<()> {
    let block = document.create_element(role);
    document.append_child(parent, block)?;
    import_spans(document, block, content)?;
    if document.child_count(block) == 0 {
        let line_break = document.create_element(Role::LineBreak);
        document.append_child(block, line_break)?;
    }
    Ok(())
}

fn import_list(
    document: &mut Document,
    parent: NodeId,
    role: Role,
    entries: &[Vec<Paragraph>],
) -> Result<()> {
    let list = document.create_element(role);
    document.append_child(parent, list)?;
    for entry in entries {
        let item = document.create_element(Role::ListItem);
        document.append_child(list, item)?;
        match entry.as_slice() {
            [Paragraph::Text { content }] => import_spans(document, item, content)?,
            paragraphs => {
                for paragraph in paragraphs {
                    import_paragraph(document, item, paragraph)?;
                }
            }
        }
    }
    Ok(())
}

fn import_checklist(
    document: &mut Document,
    parent: NodeId,
    items: &[ChecklistItem],
) -> Result<()> {
    let list = document.create_element(Role::UnorderedList);
    document.append_child(parent, list)?;
    for item in items {
        let node = document.create_element(Role::ListItem);
        document.append_child(list, node)?;
        let mark = document.create_text(if item.checked { "[x] " } else { "[ ] " });
        document.append_child(node, mark)?;
        import_spans(document, node, &item.content)?;
        if !item.children.is_empty() {
            import_checklist(document, node, &item.children)?;
        }
    }
    Ok(())
}

fn inline_container(document: &mut Document, span: &Span) -> Result<Option<NodeId>> {
    let role = match span.style {
        InlineStyle::Bold => Role::Inline(InlineRole::Bold),
        InlineStyle::Italic => Role::Inline(InlineRole::Italic),
        InlineStyle::Underline => Role::Inline(InlineRole::Underline),
        InlineStyle::Strike => Role::Inline(InlineRole::Strikethrough),
        InlineStyle::Code => Role::Inline(InlineRole::Code),
        InlineStyle::Highlight => Role::Inline(InlineRole::Span),
        InlineStyle::Link => Role::Anchor,
        #[allow(unreachable_patterns)]
        _ => return Ok(None),
    };
    let node = document.create_element(role);
    match span.style {
        InlineStyle::Highlight => document.set_attribute(node, attr::BACKGROUND_COLOR, "yellow")?,
        InlineStyle::Link => {
            if let Some(target) = &span.link_target {
                document.set_attribute(node, attr::HREF, target.as_str())?;
            }
        }
        _ => {}
    }
    Ok(Some(node))
}

fn import_spans(document: &mut Document, parent: NodeId, spans: &[Span]) -> Result<()> {
    for span in spans {
        let container = match inline_container(document, span)? {
            Some(node) => {
                document.append_child(parent, node)?;
                node
            }
            None => parent,
        };
        import_text(document, container, &span.text)?;
        import_spans(document, container, &span.children)?;
    }
    Ok(())
}

/// Appends `text`, turning newlines into line breaks.
fn import_text(document: &mut Document, parent: NodeId, text: &str) -> Result<()> {
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            let line_break = document.create_element(Role::LineBreak);
            document.append_child(parent, line_break)?;
        }
        if !line.is_empty() {
            let node = document.create_text(line);
            document.append_child(parent, node)?;
        }
    }
    Ok(())
}

fn plain_span_text(span: &Span) -> String {
    let mut text = span.text.clone();
    for child in &span.children {
        text.push_str(&plain_span_text(child));
    }
    text
}

// ============================================================================
// Export
// ============================================================================

/// Builds a tdoc document from the body of `document`.
pub fn export(document: &Document) -> tdoc::Document {
    tdoc::Document::new().with_paragraphs(export_blocks(document, document.body()))
}

fn flush_text(pending: &mut Vec<Span>, paragraphs: &mut Vec<Paragraph>) {
    if pending.is_empty() {
        return;
    }
    let content = std::mem::take(pending);
    let blank = content
        .iter()
        .all(|span| span.children.is_empty() && span.text.trim().is_empty());
    if !blank {
        paragraphs.push(Paragraph::new_text().with_content(content));
    }
}

fn export_blocks(document: &Document, node: NodeId) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut pending = Vec::new();

    for child in document.children(node).iter().copied() {
        let Some(role) = document.role(child) else {
            pending.extend(export_inline(document, child));
            continue;
        };
        if !is_block_role(role) {
            pending.extend(export_inline(document, child));
            continue;
        }
        flush_text(&mut pending, &mut paragraphs);

        match role {
            Role::Heading(level) => {
                let kind = match level {
                    1 => ParagraphType::Header1,
                    2 => ParagraphType::Header2,
                    _ => ParagraphType::Header3,
                };
                paragraphs.push(Paragraph::new(kind).with_content(export_inlines(document, child)));
            }
            Role::Preformatted => {
                let text = document.text_content(child);
                let code = Paragraph::new(ParagraphType::CodeBlock);
                paragraphs.push(code.with_content(vec![Span::new_text(&text)]));
            }
            Role::QuoteBlock => {
                let children = export_blocks(document, child);
                paragraphs.push(Paragraph::new_quote().with_children(children));
            }
            Role::UnorderedList | Role::OrderedList => {
                paragraphs.push(export_list(document, child));
            }
            Role::Table => paragraphs.extend(export_table(document, child)),
            Role::Rule => {
                let rule = vec![Span::new_text("---")];
                paragraphs.push(Paragraph::new_text().with_content(rule));
            }
            _ => {
                let nested = export_blocks(document, child);
                if nested.is_empty() {
                    paragraphs.push(Paragraph::new_text());
                } else {
                    paragraphs.extend(nested);
                }
            }
        }
    }

    flush_text(&mut pending, &mut paragraphs);
    paragraphs
}

fn is_block_role(role: Role) -> bool {
    role.is_block() || matches!(role, Role::ListItem | Role::Table | Role::Rule)
}

/// List items become entries; a list nested directly in a list joins the
/// entry before it.
fn export_list(document: &Document, list: NodeId) -> Paragraph {
    let mut entries: Vec<Vec<Paragraph>> = Vec::new();
    for child in document.children(list).iter().copied() {
        if document.is_list(child) {
            let nested = export_list(document, child);
            match entries.last_mut() {
                Some(entry) => entry.push(nested),
                None => entries.push(vec![nested]),
            }
            continue;
        }
        if !document.has_role(child, Role::ListItem) {
            continue;
        }
        let mut entry = export_blocks(document, child);
        if entry.is_empty() {
            entry.push(Paragraph::new_text());
        }
        entries.push(entry);
    }
    if document.has_role(list, Role::OrderedList) {
        Paragraph::new_ordered_list().with_entries(entries)
    } else {
        Paragraph::new_unordered_list().with_entries(entries)
    }
}

fn export_table(document: &Document, table: NodeId) -> Vec<Paragraph> {
    let mut rows = Vec::new();
    for row in document.descendants_with_role(table, Role::TableRow) {
        let mut content = Vec::new();
        let cells = document
            .children(row)
            .iter()
            .copied()
            .filter(|cell| matches!(document.role(*cell), Some(Role::TableCell { .. })));
        for (index, cell) in cells.enumerate() {
            if index > 0 {
                content.push(Span::new_text("\t"));
            }
            content.extend(export_inlines(document, cell));
        }
        rows.push(Paragraph::new_text().with_content(content));
    }
    rows
}

fn export_inlines(document: &Document, node: NodeId) -> Vec<Span> {
    document
        .children(node)
        .iter()
        .flat_map(|child| export_inline(document, *child))
        .collect()
}

fn export_inline(document: &Document, node: NodeId) -> Vec<Span> {
    if let Some(text) = document.text(node) {
        return vec![Span::new_text(text)];
    }
    let Some(role) = document.role(node) else {
        return Vec::new();
    };
    if document.has_class(node, class::QUOTED) || document.has_class(node, class::WRAP_BREAK) {
        return Vec::new();
    }

    let style = match role {
        Role::LineBreak => return vec![Span::new_text("\n")],
        Role::Image => {
            return document
                .attribute(node, attr::ALT)
                .map(|alt| vec![Span::new_text(alt)])
                .unwrap_or_default();
        }
        Role::Inline(InlineRole::Bold) => InlineStyle::Bold,
        Role::Inline(InlineRole::Italic) => InlineStyle::Italic,
        Role::Inline(InlineRole::Underline) => InlineStyle::Underline,
        Role::Inline(InlineRole::Strikethrough) => InlineStyle::Strike,
        Role::Inline(InlineRole::Code) => InlineStyle::Code,
        Role::Anchor => InlineStyle::Link,
        Role::Inline(InlineRole::Span)
            if document.attribute(node, attr::BACKGROUND_COLOR).is_some() =>
        {
            InlineStyle::Highlight
        }
        _ => return export_inlines(document, node),
    };

    let mut span = Span::new_styled(style).with_children(export_inlines(document, node));
    if style == InlineStyle::Link {
        span.link_target = document.attribute(node, attr::HREF).map(str::to_string);
    }
    vec![span]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_maps_blocks_and_styles() {
        let source = tdoc::Document::new().with_paragraphs(vec![
            Paragraph::new(ParagraphType::Header1).with_content(vec![Span::new_text("Title")]),
            Paragraph::new_text().with_content(vec![
                Span::new_text("plain "),
                Span::new_styled(InlineStyle::Bold).with_text("bold"),
            ]),
            Paragraph::new_quote().with_children(vec![
                Paragraph::new_text().with_content(vec![Span::new_text("quoted")]),
            ]),
        ]);
        let document = import(&source).unwrap();
        assert_eq!(
            document.inner_markup(document.body()),
            "<h1>Title</h1><div>plain <b>bold</b></div>\
             <blockquote type=\"cite\"><div>quoted</div></blockquote>"
        );
    }

    #[test]
    fn import_lists_keep_entries() {
        let source = tdoc::Document::new().with_paragraphs(vec![
            Paragraph::new_unordered_list().with_entries(vec![
                vec![Paragraph::new_text().with_content(vec![Span::new_text("one")])],
                vec![Paragraph::new_text().with_content(vec![Span::new_text("two")])],
            ]),
        ]);
        let document = import(&source).unwrap();
        assert_eq!(
            document.inner_markup(document.body()),
            "<ul><li>one</li><li>two</li></ul>"
        );
    }

    #[test]
    fn export_skips_quote_marks() {
        let document = Document::from_markup(
            "<blockquote><div><span class=\"quoted\">&gt; </span>hello</div></blockquote>",
        )
        .unwrap();
        let exported = export(&document);
        let [Paragraph::Quote { children }] = exported.paragraphs.as_slice() else {
            panic!("expected a single quote, got {:?}", exported.paragraphs);
        };
        let [Paragraph::Text { content }] = children.as_slice() else {
            panic!("expected a single text paragraph, got {children:?}");
        };
        let text: String = content.iter().map(plain_span_text).collect();
        assert_eq!(text, "hello");
    }

    #[test]
    fn export_flattens_tables_and_deep_headings() {
        let document = Document::from_markup(
            "<h5>Deep</h5><table><tr><td>a</td><td>b</td></tr></table>",
        )
        .unwrap();
        let exported = export(&document);
        assert_eq!(exported.paragraphs.len(), 2);
        assert_eq!(exported.paragraphs[0].paragraph_type(), ParagraphType::Header3);
        let text: String = exported.paragraphs[1].content().iter().map(plain_span_text).collect();
        assert_eq!(text, "a\tb");
    }

    #[test]
    fn links_survive_a_round_trip() {
        let document = Document::from_markup("<div>see <a href=\"http://x.org\">x</a></div>").unwrap();
        let reimported = import(&export(&document)).unwrap();
        assert_eq!(reimported.inner_markup(reimported.body()), document.inner_markup(document.body()));
    }
}
