use std::collections::BTreeMap;

use crate::error::{EditorError, Result};

mod markup;
mod path;

pub(crate) use markup::{escape_attribute_value, escape_markup};
pub use path::Path;

/// Attribute names understood by the editing operations.
pub mod attr {
    pub const TEXT_ALIGN: &str = "text-align";
    pub const MARGIN_LEFT: &str = "margin-left";
    pub const MARGIN_RIGHT: &str = "margin-right";
    pub const WIDTH: &str = "width";
    pub const PADDING_START: &str = "padding-start";
    pub const DIRECTION: &str = "dir";
    pub const CLASS: &str = "class";
    pub const TYPE: &str = "type";
    pub const HREF: &str = "href";
    pub const SRC: &str = "src";
    pub const ALT: &str = "alt";
    pub const FACE: &str = "face";
    pub const SIZE: &str = "size";
    pub const COLOR: &str = "color";
    pub const BACKGROUND_COLOR: &str = "background-color";
    pub const FONT_FAMILY: &str = "font-family";
    pub const BG_COLOR: &str = "bgcolor";
    pub const TEXT_COLOR: &str = "text";
    pub const LINK_COLOR: &str = "link";
    pub const VISITED_LINK_COLOR: &str = "vlink";
}

/// Marker classes the reflow engine puts on the nodes it owns.
pub mod class {
    /// A line break inserted by wrapping, as opposed to one the user typed.
    pub const WRAP_BREAK: &str = "wrap-br";
    /// The span holding all quotation prefixes of one line.
    pub const QUOTED: &str = "quoted";
    /// One `"> "` prefix inside a [`QUOTED`] span.
    pub const QUOTE_CHARACTER: &str = "quote-character";
    pub const SIGNATURE_WRAPPER: &str = "signature-wrapper";
    /// The empty paragraph kept between a top signature and the quoted text.
    pub const TOP_SIGNATURE_SPACER: &str = "top-signature-spacer";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineRole {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Subscript,
    Superscript,
    Code,
    Font,
    Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Body,
    Paragraph,
    Heading(u8),
    Preformatted,
    Address,
    QuoteBlock,
    UnorderedList,
    OrderedList,
    ListItem,
    Table,
    TableRow,
    TableCell { header: bool },
    Rule,
    Anchor,
    Image,
    LineBreak,
    Inline(InlineRole),
    Container,
}

impl Role {
    pub fn tag(self) -> &'static str {
        match self {
            Role::Body => "body",
            Role::Paragraph => "div",
            Role::Heading(1) => "h1",
            Role::Heading(2) => "h2",
            Role::Heading(3) => "h3",
            Role::Heading(4) => "h4",
            Role::Heading(5) => "h5",
            Role::Heading(_) => "h6",
            Role::Preformatted => "pre",
            Role::Address => "address",
            Role::QuoteBlock => "blockquote",
            Role::UnorderedList => "ul",
            Role::OrderedList => "ol",
            Role::ListItem => "li",
            Role::Table => "table",
            Role::TableRow => "tr",
            Role::TableCell { header: false } => "td",
            Role::TableCell { header: true } => "th",
            Role::Rule => "hr",
            Role::Anchor => "a",
            Role::Image => "img",
            Role::LineBreak => "br",
            Role::Inline(InlineRole::Bold) => "b",
            Role::Inline(InlineRole::Italic) => "i",
            Role::Inline(InlineRole::Underline) => "u",
            Role::Inline(InlineRole::Strikethrough) => "s",
            Role::Inline(InlineRole::Subscript) => "sub",
            Role::Inline(InlineRole::Superscript) => "sup",
            Role::Inline(InlineRole::Code) => "code",
            Role::Inline(InlineRole::Font) => "font",
            Role::Inline(InlineRole::Span) => "span",
            Role::Container => "section",
        }
    }

    /// Maps a lowercase tag name onto a role. Aliases (`p`, `strong`, `em`,
    /// `strike`, `del`, `tt`) collapse onto the role they render as.
    pub fn from_tag(tag: &str) -> Option<Role> {
        let role = match tag {
            "body" => Role::Body,
            "div" | "p" => Role::Paragraph,
            "h1" => Role::Heading(1),
            "h2" => Role::Heading(2),
            "h3" => Role::Heading(3),
            "h4" => Role::Heading(4),
            "h5" => Role::Heading(5),
            "h6" => Role::Heading(6),
            "pre" => Role::Preformatted,
            "address" => Role::Address,
            "blockquote" => Role::QuoteBlock,
            "ul" => Role::UnorderedList,
            "ol" => Role::OrderedList,
            "li" => Role::ListItem,
            "table" => Role::Table,
            "tr" => Role::TableRow,
            "td" => Role::TableCell { header: false },
            "th" => Role::TableCell { header: true },
            "hr" => Role::Rule,
            "a" => Role::Anchor,
            "img" => Role::Image,
            "br" => Role::LineBreak,
            "b" | "strong" => Role::Inline(InlineRole::Bold),
            "i" | "em" => Role::Inline(InlineRole::Italic),
            "u" => Role::Inline(InlineRole::Underline),
            "s" | "strike" | "del" => Role::Inline(InlineRole::Strikethrough),
            "sub" => Role::Inline(InlineRole::Subscript),
            "sup" => Role::Inline(InlineRole::Superscript),
            "code" | "tt" => Role::Inline(InlineRole::Code),
            "font" => Role::Inline(InlineRole::Font),
            "span" => Role::Inline(InlineRole::Span),
            "section" => Role::Container,
            _ => return None,
        };
        Some(role)
    }

    /// Block roles bound the reach of claims and reflow. List items are
    /// deliberately not blocks: their list container is.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            Role::Paragraph
                | Role::Heading(_)
                | Role::Preformatted
                | Role::Address
                | Role::QuoteBlock
                | Role::UnorderedList
                | Role::OrderedList
                | Role::TableCell { .. }
                | Role::Container
        )
    }

    pub fn is_list(self) -> bool {
        matches!(self, Role::UnorderedList | Role::OrderedList)
    }

    pub fn is_void(self) -> bool {
        matches!(self, Role::Rule | Role::Image | Role::LineBreak)
    }

    /// Inline runs that reflow descends into instead of treating as a line stopper.
    pub fn is_inline_run(self) -> bool {
        matches!(self, Role::Inline(_) | Role::Anchor)
    }

    /// Containers whose whitespace-only text is formatting, not content.
    pub fn ignores_blank_text(self) -> bool {
        matches!(
            self,
            Role::Body
                | Role::QuoteBlock
                | Role::UnorderedList
                | Role::OrderedList
                | Role::Table
                | Role::TableRow
                | Role::Container
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub role: Role,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A text node that [`Document::normalize_range`] took out of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    /// Appended to `into`, whose text was `shift` characters long before.
    Merged {
        removed: NodeId,
        into: NodeId,
        shift: usize,
        parent: NodeId,
        index: usize,
    },
    /// Empty, or blank inside a container that ignores blank text.
    Dropped {
        removed: NodeId,
        parent: NodeId,
        index: usize,
    },
}

/// An arena-backed document tree rooted at a fixed body element.
///
/// Node handles stay valid while the node is in the tree or merely detached.
/// [`Document::release`] hands a detached subtree's slots back for reuse.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    free: Vec<NodeId>,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let body = NodeData {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element(Element {
                role: Role::Body,
                attributes: BTreeMap::new(),
            }),
        };
        Self {
            nodes: vec![body],
            free: Vec::new(),
            body: NodeId(0),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // ========================================================================
    // Node creation and inspection
    // ========================================================================

    pub fn create_element(&mut self, role: Role) -> NodeId {
        self.push_node(NodeKind::Element(Element {
            role,
            attributes: BTreeMap::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeKind::Text(text.into()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            parent: None,
            children: Vec::new(),
            kind,
        };
        if let Some(id) = self.free.pop() {
            self.nodes[id.0] = data;
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    /// Number of arena slots, live or free.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes[node.0].kind {
            NodeKind::Element(element) => Some(element),
            NodeKind::Text(_) => None,
        }
    }

    pub fn role(&self, node: NodeId) -> Option<Role> {
        self.element(node).map(|element| element.role)
    }

    pub fn has_role(&self, node: NodeId, role: Role) -> bool {
        self.role(node) == Some(role)
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Text(_))
    }

    pub fn is_block(&self, node: NodeId) -> bool {
        self.role(node).is_some_and(Role::is_block)
    }

    pub fn is_list(&self, node: NodeId) -> bool {
        self.role(node).is_some_and(Role::is_list)
    }

    pub fn is_line_break(&self, node: NodeId) -> bool {
        self.has_role(node, Role::LineBreak)
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    pub fn set_text(&mut self, node: NodeId, value: impl Into<String>) -> Result<()> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Text(text) => {
                *text = value.into();
                Ok(())
            }
            NodeKind::Element(_) => Err(EditorError::structural("cannot set text of an element")),
        }
    }

    /// Changes the role of an element in place, keeping children and attributes.
    pub fn set_role(&mut self, node: NodeId, role: Role) -> Result<()> {
        if node == self.body {
            return Err(EditorError::structural("the body keeps its role"));
        }
        match &mut self.nodes[node.0].kind {
            NodeKind::Element(element) => {
                element.role = role;
                Ok(())
            }
            NodeKind::Text(_) => Err(EditorError::structural("text nodes have no role")),
        }
    }

    /// Replaces every attribute of an element.
    pub fn set_attributes(
        &mut self,
        node: NodeId,
        attributes: BTreeMap<String, String>,
    ) -> Result<()> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element(element) => {
                element.attributes = attributes;
                Ok(())
            }
            NodeKind::Text(_) => Err(EditorError::structural("text nodes have no attributes")),
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .and_then(|element| element.attributes.get(name))
            .map(String::as_str)
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element(element) => {
                element.attributes.insert(name.to_string(), value.into());
                Ok(())
            }
            NodeKind::Text(_) => Err(EditorError::structural(format!(
                "cannot set attribute `{name}` on a text node"
            ))),
        }
    }

    /// Sets the attribute, or removes it when `value` is `None` or empty.
    pub fn set_or_remove_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<()> {
        match value {
            Some(value) if !value.is_empty() => self.set_attribute(node, name, value),
            _ => {
                self.remove_attribute(node, name);
                Ok(())
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Option<String> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element(element) => element.attributes.remove(name),
            NodeKind::Text(_) => None,
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, attr::CLASS)
            .is_some_and(|value| value.split_whitespace().any(|candidate| candidate == class))
    }

    /// Reads a `"<n>ch"` attribute; anything else counts as unset.
    pub fn char_length_attribute(&self, node: NodeId, name: &str) -> Option<i64> {
        let value = self.attribute(node, name)?;
        value.strip_suffix("ch")?.trim().parse().ok()
    }

    pub fn is_rtl(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if let Some(direction) = self.attribute(candidate, attr::DIRECTION) {
                return direction.eq_ignore_ascii_case("rtl");
            }
            current = self.parent(candidate);
        }
        false
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[node.0].children.get(index).copied()
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.nodes[node.0].children.len()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.first().copied()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.last().copied()
    }

    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|candidate| *candidate == node)
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        self.child(parent, index + 1)
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        index.checked_sub(1).and_then(|index| self.child(parent, index))
    }

    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.parent(node),
        }
    }

    /// `true` when `node` is `ancestor` or lies below it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|candidate| candidate == ancestor)
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(self.body, node)
    }

    /// Pre-order list of everything below `node`, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    pub fn descendants_with_role(&self, node: NodeId, role: Role) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|candidate| self.has_role(*candidate, role))
            .collect()
    }

    /// Next node in document order below `up_to`: first child, then next
    /// sibling, then the next sibling of the nearest ancestor that has one.
    pub fn next_in_hierarchy(&self, node: NodeId, up_to: NodeId) -> Option<NodeId> {
        if let Some(child) = self.first_child(node) {
            return Some(child);
        }
        self.next_skipping_children(node, up_to)
    }

    /// Like [`Document::next_in_hierarchy`] but never descends into `node`.
    pub fn next_skipping_children(&self, node: NodeId, up_to: NodeId) -> Option<NodeId> {
        if node == up_to {
            return None;
        }
        if let Some(sibling) = self.next_sibling(node) {
            return Some(sibling);
        }
        let mut current = self.parent(node)?;
        loop {
            if current == up_to || current == self.body {
                return None;
            }
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.parent(current)?;
        }
    }

    /// Nearest block element containing `node` (inclusive), or the body.
    pub fn parent_block(&self, node: NodeId) -> NodeId {
        let mut current = node;
        loop {
            if current == self.body || self.is_block(current) {
                return current;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Number of quote-blocks enclosing `node`, counting `node` itself.
    pub fn quote_level(&self, node: NodeId) -> usize {
        let own = usize::from(self.has_role(node, Role::QuoteBlock));
        own + self
            .ancestors(node)
            .filter(|ancestor| self.has_role(*ancestor, Role::QuoteBlock))
            .count()
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let mut content = String::new();
        if let Some(text) = self.text(node) {
            content.push_str(text);
        }
        for descendant in self.descendants(node) {
            if let Some(text) = self.text(descendant) {
                content.push_str(text);
            }
        }
        content
    }

    /// A paragraph that shows nothing: no children, only a single line
    /// break, or only empty text.
    pub fn is_empty_paragraph(&self, node: NodeId) -> bool {
        if !self.is_block(node) && !self.has_role(node, Role::ListItem) {
            return false;
        }
        let children = self.children(node);
        match children {
            [] => true,
            [single] if self.is_line_break(*single) => true,
            _ => children
                .iter()
                .all(|child| self.text(*child).is_some_and(str::is_empty)),
        }
    }

    // ========================================================================
    // Structural primitives
    // ========================================================================

    /// Inserts `node` into `parent` before `before` (or at the end), detaching
    /// it from its previous position first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        before: Option<NodeId>,
    ) -> Result<()> {
        if self.is_text(parent) {
            return Err(EditorError::structural("text nodes cannot have children"));
        }
        if node == self.body {
            return Err(EditorError::structural("the body cannot be moved"));
        }
        if self.contains(node, parent) {
            return Err(EditorError::structural(
                "cannot move a node into its own descendant",
            ));
        }
        if let Some(reference) = before {
            if reference == node {
                return Ok(());
            }
            if self.parent(reference) != Some(parent) {
                return Err(EditorError::structural(
                    "reference node is not a child of the target parent",
                ));
            }
        }

        self.detach(node);
        let index = match before {
            Some(reference) => self
                .index_in_parent(reference)
                .unwrap_or(self.child_count(parent)),
            None => self.child_count(parent),
        };
        self.nodes[parent.0].children.insert(index, node);
        self.nodes[node.0].parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> Result<()> {
        self.insert_before(parent, node, None)
    }

    pub fn prepend_child(&mut self, parent: NodeId, node: NodeId) -> Result<()> {
        let first = self.first_child(parent);
        self.insert_before(parent, node, first)
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> Result<()> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| EditorError::structural("reference node is not attached"))?;
        let next = self.next_sibling(reference);
        self.insert_before(parent, node, next)
    }

    pub fn insert_at(&mut self, parent: NodeId, index: usize, node: NodeId) -> Result<()> {
        let before = self.child(parent, index);
        self.insert_before(parent, node, before)
    }

    /// Unlinks `node` from its parent. The node and its subtree stay usable.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    /// Detaches `node` and frees its subtree. Handles into the subtree must
    /// not be used afterwards; their slots go to the next created nodes.
    pub fn release(&mut self, node: NodeId) {
        if node == self.body {
            return;
        }
        self.detach(node);
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            let data = &mut self.nodes[current.0];
            pending.append(&mut data.children);
            data.parent = None;
            data.kind = NodeKind::Text(String::new());
            self.free.push(current);
        }
    }

    /// Removes `node` from the tree, optionally moving its children into its place.
    pub fn remove(&mut self, node: NodeId, promote_children: bool) -> Result<()> {
        if node == self.body {
            return Err(EditorError::structural("the body cannot be removed"));
        }
        let Some(parent) = self.parent(node) else {
            return Err(EditorError::structural("node is not attached"));
        };
        if promote_children {
            self.move_children(node, parent, Some(node))?;
        }
        self.detach(node);
        Ok(())
    }

    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let parent = self
            .parent(old)
            .ok_or_else(|| EditorError::structural("replaced node is not attached"))?;
        self.insert_before(parent, new, Some(old))?;
        self.detach(old);
        Ok(())
    }

    /// Moves every child of `from` into `to`, before `before` or at the end.
    pub fn move_children(
        &mut self,
        from: NodeId,
        to: NodeId,
        before: Option<NodeId>,
    ) -> Result<()> {
        if let Some(reference) = before {
            if self.parent(reference) != Some(to) {
                return Err(EditorError::structural(
                    "reference node is not a direct child of the target",
                ));
            }
        }
        if self.contains(from, to) {
            return Err(EditorError::structural(
                "target cannot be inside the node whose children move",
            ));
        }
        let children = self.children(from).to_vec();
        for child in children {
            self.insert_before(to, child, before)?;
        }
        Ok(())
    }

    pub fn clear_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Copies the role and attributes of `node` into a fresh, detached node.
    pub fn shallow_clone(&mut self, node: NodeId) -> NodeId {
        let kind = self.nodes[node.0].kind.clone();
        self.push_node(kind)
    }

    pub fn deep_clone(&mut self, node: NodeId) -> NodeId {
        let clone = self.shallow_clone(node);
        let children = self.children(node).to_vec();
        for child in children {
            let child_clone = self.deep_clone(child);
            self.nodes[child_clone.0].parent = Some(clone);
            self.nodes[clone.0].children.push(child_clone);
        }
        clone
    }

    /// Splits a text node at a character offset. The tail becomes a new text
    /// node placed right after the original (when attached) and is returned.
    pub fn split_text(&mut self, node: NodeId, offset: usize) -> Result<NodeId> {
        let Some(text) = self.text(node) else {
            return Err(EditorError::structural("only text nodes can be split"));
        };
        let char_count = text.chars().count();
        if offset > char_count {
            return Err(EditorError::invalid(format!(
                "split offset {offset} beyond text length {char_count}"
            )));
        }
        let byte_offset = byte_offset(text, offset);
        let tail = text[byte_offset..].to_string();
        let head = text[..byte_offset].to_string();
        self.set_text(node, head)?;
        let tail_node = self.create_text(tail);
        if self.parent(node).is_some() {
            self.insert_after(node, tail_node)?;
        }
        Ok(tail_node)
    }

    /// Merges adjacent text nodes and drops empty ones throughout the subtree.
    /// Whitespace-only text goes too where the container ignores blank text.
    pub fn normalize(&mut self, node: NodeId) -> Vec<Normalized> {
        self.normalize_range(node, 0, 0)
    }

    /// Normalizes the children of `node` from `first` up to the last
    /// `remaining` ones, which stay untouched. The children outside the range
    /// keep their index counted from either end.
    pub fn normalize_range(
        &mut self,
        node: NodeId,
        first: usize,
        remaining: usize,
    ) -> Vec<Normalized> {
        let mut changes = Vec::new();
        self.normalize_children(node, first, remaining, &mut changes);
        changes
    }

    fn normalize_children(
        &mut self,
        node: NodeId,
        first: usize,
        remaining: usize,
        changes: &mut Vec<Normalized>,
    ) {
        let ignores_blank = self.role(node).is_some_and(Role::ignores_blank_text);
        let end = self.child_count(node).saturating_sub(remaining);
        let range = self.children(node).get(first..end).map(<[NodeId]>::to_vec);
        let Some(range) = range else {
            return;
        };

        let mut run: Option<NodeId> = None;
        for child in range {
            let Some(text) = self.text(child).map(str::to_string) else {
                if let Some(head) = run.take() {
                    self.drop_blank_run(node, head, ignores_blank, changes);
                }
                self.normalize_children(child, 0, 0, changes);
                continue;
            };
            let Some(head) = run else {
                run = Some(child);
                continue;
            };
            let index = self.index_in_parent(child).unwrap_or(0);
            let mut shift = 0;
            if let NodeKind::Text(existing) = &mut self.nodes[head.0].kind {
                shift = existing.chars().count();
                existing.push_str(&text);
            }
            self.detach(child);
            changes.push(Normalized::Merged {
                removed: child,
                into: head,
                shift,
                parent: node,
                index,
            });
        }
        if let Some(head) = run {
            self.drop_blank_run(node, head, ignores_blank, changes);
        }
    }

    fn drop_blank_run(
        &mut self,
        parent: NodeId,
        head: NodeId,
        ignores_blank: bool,
        changes: &mut Vec<Normalized>,
    ) {
        let blank = self.text(head).is_some_and(|text| {
            text.is_empty() || (ignores_blank && text.chars().all(|c| c.is_ascii_whitespace()))
        });
        if !blank {
            return;
        }
        let index = self.index_in_parent(head).unwrap_or(0);
        self.detach(head);
        changes.push(Normalized::Dropped {
            removed: head,
            parent,
            index,
        });
    }
}

pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.document.parent(current);
        Some(current)
    }
}

/// Byte index of the `offset`-th character, clamped to the string length.
pub(crate) fn byte_offset(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod document_tests;
