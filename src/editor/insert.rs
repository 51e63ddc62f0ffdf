use crate::document::{Document, NodeId, Path, Role, attr, escape_attribute_value, escape_markup};
use crate::error::{EditorError, Result};

use super::claim::ClaimFlags;
use super::history::{AttributeEdit, Change, RecordKind};
use super::magic::{linkify_text, replace_smileys_below};
use super::plain_text::to_plain_text;
use super::{Caret, Claim, EditorSession, Mode};

/// Characters that end a word while typing.
const WORD_DELIMITERS: &[char] = &[' ', '\t', '\n', '.', ',', ';', ':', '!', '?'];

fn edit_flags() -> ClaimFlags {
    ClaimFlags::USE_PARENT_BLOCK_NODE | ClaimFlags::SAVE_MARKUP
}

/// Nearest block or list item holding `node` (inclusive), or the body.
fn line_container(document: &Document, node: NodeId) -> NodeId {
    let body = document.body();
    let mut current = node;
    loop {
        let stops = document.is_block(current) || document.has_role(current, Role::ListItem);
        if current == body || stops {
            return current;
        }
        match document.parent(current) {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

fn deepest_last(document: &Document, node: NodeId) -> Caret {
    let mut current = node;
    while let Some(child) = document.last_child(current) {
        current = child;
    }
    let offset = document
        .text(current)
        .map(|text| text.chars().count())
        .unwrap_or(0);
    Caret { node: current, offset }
}

fn is_inline(document: &Document, node: NodeId) -> bool {
    match document.role(node) {
        None => true,
        Some(role) => role.is_inline_run() || matches!(role, Role::LineBreak | Role::Image),
    }
}

/// Turns a caret into a gap between children, splitting a text node when
/// the caret sits inside it.
fn caret_gap(document: &mut Document, caret: Caret) -> Result<(NodeId, usize)> {
    let Some(text) = document.text(caret.node) else {
        return Ok((caret.node, caret.offset.min(document.child_count(caret.node))));
    };
    let length = text.chars().count();
    let parent = document
        .parent(caret.node)
        .ok_or_else(|| EditorError::structural("caret text node is not attached"))?;
    let index = document.index_in_parent(caret.node).unwrap_or(0);
    if caret.offset == 0 {
        return Ok((parent, index));
    }
    if caret.offset >= length {
        return Ok((parent, index + 1));
    }
    let tail = document.split_text(caret.node, caret.offset)?;
    Ok((parent, document.index_in_parent(tail).unwrap_or(index + 1)))
}

/// Splits every element from `parent` up to `stop` at the gap, returning
/// the right half of `stop`.
fn split_up_to(
    document: &mut Document,
    parent: NodeId,
    index: usize,
    stop: NodeId,
) -> Result<NodeId> {
    let mut parent = parent;
    let mut index = index;
    loop {
        let clone = document.shallow_clone(parent);
        let moved = document.children(parent)[index.min(document.child_count(parent))..].to_vec();
        for node in moved {
            document.append_child(clone, node)?;
        }
        document.insert_after(parent, clone)?;
        if parent == stop {
            return Ok(clone);
        }
        index = document.index_in_parent(clone).unwrap_or(0);
        parent = document
            .parent(parent)
            .ok_or_else(|| EditorError::structural("split reached a detached node"))?;
    }
}

fn fill_if_empty(document: &mut Document, block: NodeId) -> Result<()> {
    let empty = document
        .children(block)
        .iter()
        .all(|child| document.text(*child).is_some_and(str::is_empty));
    if empty {
        document.clear_children(block);
        let line_break = document.create_element(Role::LineBreak);
        document.append_child(block, line_break)?;
    }
    Ok(())
}

fn remove_if_empty(document: &mut Document, block: NodeId) {
    if document.is_attached(block) && document.is_empty_paragraph(block) {
        document.detach(block);
    }
}

impl EditorSession {
    // ========================================================================
    // Primitives, used inside open records
    // ========================================================================

    /// Deletes the selected content and joins the blocks at both ends.
    fn remove_selected_content(&mut self) -> Result<()> {
        let (start, end) = self.ordered_carets();
        if start == end {
            return Ok(());
        }

        if start.node == end.node {
            if let Some(text) = self.document.text(start.node) {
                let kept: String = text
                    .chars()
                    .take(start.offset)
                    .chain(text.chars().skip(end.offset))
                    .collect();
                self.document.set_text(start.node, kept)?;
                self.set_caret(start.node, start.offset);
                return Ok(());
            }
        }

        let (end_parent, end_index) = caret_gap(&mut self.document, end)?;
        let (start_parent, start_index) = caret_gap(&mut self.document, start)?;
        let start_key = self.document.path_from_body(start_parent)?.child(start_index);
        let end_key = self.document.path_from_body(end_parent)?.child(end_index);

        let body = self.document.body();
        let mut doomed: Vec<NodeId> = Vec::new();
        for node in self.document.descendants(body) {
            if doomed.iter().any(|removed| self.document.contains(*removed, node)) {
                continue;
            }
            let path: Path = self.document.path_from_body(node)?;
            if path >= start_key && path < end_key && !end_key.starts_with(&path) {
                doomed.push(node);
            }
        }
        for node in doomed {
            self.document.detach(node);
        }

        let start_block = line_container(&self.document, start_parent);
        let end_block = line_container(&self.document, end_parent);
        if start_block != end_block
            && self.document.is_attached(end_block)
            && !self.document.contains(end_block, start_block)
            && !self.document.contains(start_block, end_block)
        {
            self.document.move_children(end_block, start_block, None)?;
            let mut empty = Some(end_block);
            while let Some(node) = empty {
                if node == body || self.document.child_count(node) > 0 {
                    break;
                }
                empty = self.document.parent(node);
                self.document.detach(node);
            }
        }
        if start_block != body {
            fill_if_empty(&mut self.document, start_block)?;
        }

        let offset = start_index.min(self.document.child_count(start_parent));
        self.set_caret(start_parent, offset);
        Ok(())
    }

    /// Inserts text without line breaks at the caret.
    fn insert_text_at_caret(&mut self, text: &str) -> Result<()> {
        let caret = self.anchor;
        let length = text.chars().count();

        if let Some(existing) = self.document.text(caret.node) {
            let mut chars: Vec<char> = existing.chars().collect();
            let offset = caret.offset.min(chars.len());
            chars.splice(offset..offset, text.chars());
            self.document.set_text(caret.node, chars.into_iter().collect::<String>())?;
            self.set_caret(caret.node, offset + length);
            return Ok(());
        }

        let (parent, index) = match self.document.role(caret.node) {
            Some(role) if role.is_void() => {
                let parent = self
                    .document
                    .parent(caret.node)
                    .ok_or_else(|| EditorError::structural("caret node is not attached"))?;
                (parent, self.document.index_in_parent(caret.node).unwrap_or(0))
            }
            _ => (caret.node, caret.offset),
        };
        if self.document.is_empty_paragraph(parent) {
            self.document.clear_children(parent);
        }
        let index = index.min(self.document.child_count(parent));
        let previous = index.checked_sub(1).and_then(|index| self.document.child(parent, index));
        if let Some(previous) = previous.filter(|node| self.document.is_text(*node)) {
            let mut value = self.document.text(previous).unwrap_or_default().to_string();
            let offset = value.chars().count();
            value.push_str(text);
            self.document.set_text(previous, value)?;
            self.set_caret(previous, offset + length);
            return Ok(());
        }

        let node = self.document.create_text(text);
        self.document.insert_at(parent, index, node)?;
        self.set_caret(node, length);
        Ok(())
    }

    /// Splits the block holding the caret in two and puts the caret at the
    /// start of the second one.
    fn split_block_at_caret(&mut self) -> Result<NodeId> {
        let (parent, index) = caret_gap(&mut self.document, self.anchor)?;
        let block = line_container(&self.document, parent);

        if block == self.document.body() {
            let paragraph = self.empty_paragraph()?;
            self.document.insert_at(parent, index, paragraph)?;
            self.set_caret(paragraph, 0);
            return Ok(paragraph);
        }

        let right = split_up_to(&mut self.document, parent, index, block)?;
        fill_if_empty(&mut self.document, block)?;
        fill_if_empty(&mut self.document, right)?;
        self.set_caret(right, 0);
        Ok(right)
    }

    /// Inserts parsed, detached nodes at the caret. Block nodes split the
    /// current block; inline nodes around them join its halves.
    fn insert_fragment(&mut self, nodes: Vec<NodeId>) -> Result<()> {
        let Some(&last) = nodes.last() else {
            return Ok(());
        };

        if nodes.iter().all(|node| is_inline(&self.document, *node)) {
            if self.document.is_empty_paragraph(self.anchor.node) {
                self.document.clear_children(self.anchor.node);
                self.set_caret(self.anchor.node, 0);
            }
            let (parent, index) = caret_gap(&mut self.document, self.anchor)?;
            for (offset, node) in nodes.into_iter().enumerate() {
                self.document.insert_at(parent, index + offset, node)?;
            }
            let caret = deepest_last(&self.document, last);
            self.set_carets(caret, caret);
            return Ok(());
        }

        let right = self.split_block_at_caret()?;
        let left = self.document.previous_sibling(right);
        let holder = self
            .document
            .parent(right)
            .ok_or_else(|| EditorError::structural("split block is not attached"))?;

        let mut seen_block = false;
        let mut trailing = Vec::new();
        for node in nodes {
            if !is_inline(&self.document, node) {
                seen_block = true;
                self.document.insert_before(holder, node, Some(right))?;
            } else if seen_block {
                trailing.push(node);
            } else if let Some(left) = left {
                if self.document.is_empty_paragraph(left) {
                    self.document.clear_children(left);
                }
                self.document.append_child(left, node)?;
            } else {
                trailing.push(node);
            }
        }
        if !trailing.is_empty() && self.document.is_empty_paragraph(right) {
            self.document.clear_children(right);
        }
        for node in trailing.into_iter().rev() {
            self.document.prepend_child(right, node)?;
        }

        if let Some(left) = left {
            remove_if_empty(&mut self.document, left);
        }
        remove_if_empty(&mut self.document, right);

        let caret = deepest_last(&self.document, last);
        self.set_carets(caret, caret);
        Ok(())
    }

    fn remove_selection_in_record(&mut self, name: &str) -> Result<()> {
        if self.is_collapsed() {
            return Ok(());
        }
        self.record(RecordKind::Custom, name, Some(Claim::selection(edit_flags())), |session| {
            session.remove_selected_content()
        })
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub fn delete_selection(&mut self) -> Result<()> {
        self.remove_selection_in_record("DeleteSelection")
    }

    /// Replaces the selection with `text`; every `\n` starts a new block.
    /// Undoes as one step named `op`.
    pub fn insert_text(&mut self, op: &str, text: &str) -> Result<()> {
        self.record(RecordKind::Group, op, None, |session| {
            session.remove_selection_in_record(&format!("{op}::sel-remove"))?;
            let name = format!("{op}::insert");
            let claim = Claim::selection(edit_flags());
            session.record(RecordKind::Custom, &name, Some(claim), |session| {
                for (index, line) in text.split('\n').enumerate() {
                    if index > 0 {
                        session.split_block_at_caret()?;
                    }
                    if !line.is_empty() {
                        session.insert_text_at_caret(line)?;
                    }
                }
                Ok(())
            })
        })
    }

    /// Replaces the selection with parsed `html`. Inserted quote blocks lose
    /// their class, and paragraphs are fixed up afterwards.
    pub fn insert_html(&mut self, op: &str, html: &str) -> Result<()> {
        self.record(RecordKind::Group, op, None, |session| {
            session.remove_selection_in_record(&format!("{op}::sel-remove"))?;
            let name = format!("{op}::insert");
            let claim = Claim::selection(edit_flags());
            session.record(RecordKind::Custom, &name, Some(claim), |session| {
                let nodes = session.document.parse_fragment(html)?;
                session.insert_fragment(nodes)
            })?;

            let body = session.document.body();
            for quote in session.document.descendants_with_role(body, Role::QuoteBlock) {
                let name = "InsertHTML::fixBlockquote";
                session.set_attribute_with_undo(name, quote, attr::CLASS, None)?;
            }
            session.correct_paragraphs_after_insert_content(op)
        })
    }

    /// Inserts an image at the selection. `size` is in pixels.
    pub fn insert_image(&mut self, uri: &str, size: Option<(u32, u32)>) -> Result<()> {
        let mut html = format!("<img src=\"{}\"", escape_attribute_value(uri));
        if let Some((width, height)) = size {
            html.push_str(&format!(" width=\"{width}px\" height=\"{height}px\""));
        }
        html.push('>');
        self.insert_html("InsertImage", &html)
    }

    /// Inserts an emoticon. Rich text gets the picture with `text` as its
    /// alternative; plain text and unicode smileys get `text` itself.
    pub fn insert_emoticon(
        &mut self,
        text: &str,
        image_uri: Option<&str>,
        size: (u32, u32),
    ) -> Result<()> {
        let html = match image_uri {
            Some(uri) if self.mode == Mode::Html && !self.config.unicode_smileys => format!(
                "<img src=\"{}\" alt=\"{}\" width=\"{}px\" height=\"{}px\">",
                escape_attribute_value(uri),
                escape_attribute_value(text),
                size.0,
                size.1
            ),
            _ => escape_markup(text),
        };
        self.insert_html("InsertEmoticon", &html)
    }

    /// Gives every paragraph its plain-text width and every empty paragraph
    /// a placeholder break, each as its own record.
    pub(crate) fn correct_paragraphs_after_insert_content(&mut self, op: &str) -> Result<()> {
        let body = self.document.body();
        for paragraph in self.document.descendants_with_role(body, Role::Paragraph) {
            if self.mode == Mode::PlainText {
                let before = self.document.attribute(paragraph, attr::WIDTH).map(str::to_string);
                let name = format!("{op}::divWidths");
                self.record(RecordKind::Custom, &name, None, |session| {
                    session.maybe_update_paragraph_width(paragraph)?;
                    let after =
                        session.document.attribute(paragraph, attr::WIDTH).map(str::to_string);
                    if after != before {
                        session.record_change(Change::Attribute(AttributeEdit {
                            path: session.document.path_from_body(paragraph)?,
                            name: attr::WIDTH.to_string(),
                            before,
                            after,
                        }));
                    }
                    Ok(())
                })?;
            }

            if self.document.child_count(paragraph) == 0 {
                let name = format!("{op}::divBR");
                let claim = Claim::nodes(paragraph, paragraph, ClaimFlags::SAVE_MARKUP);
                self.record(RecordKind::Custom, &name, Some(claim), |session| {
                    let line_break = session.document.create_element(Role::LineBreak);
                    session.document.append_child(paragraph, line_break)
                })?;
            }
        }
        Ok(())
    }

    /// Replaces `content` by `text` lines separated by breaks.
    pub(crate) fn set_inner_text(&mut self, content: NodeId, text: &str) -> Result<()> {
        self.document.clear_children(content);
        let text = text.strip_suffix('\n').unwrap_or(text);
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                let line_break = self.document.create_element(Role::LineBreak);
                self.document.append_child(content, line_break)?;
            }
            if !line.is_empty() {
                let node = self.document.create_text(line);
                self.document.append_child(content, node)?;
            }
        }
        Ok(())
    }

    /// Replaces the selection with `text`, either as markup or plain text,
    /// and optionally as a cited quote. One undo step.
    pub fn insert_content(&mut self, text: &str, is_html: bool, quote: bool) -> Result<()> {
        self.record(RecordKind::Group, "InsertContent", None, |session| {
            session.remove_selection_in_record("InsertContent::sel-remove")?;
            session.insert_content_body(text, is_html, quote)
        })
    }

    fn insert_content_body(&mut self, text: &str, is_html: bool, quote: bool) -> Result<()> {
        let was_plain = !is_html;
        let mut is_html = is_html;
        let plain = self.mode == Mode::PlainText;
        let width = self.config.paragraph_width;
        let level = usize::from(quote);

        let content = if quote {
            let content = self.document.create_element(Role::QuoteBlock);
            self.document.set_attribute(content, attr::TYPE, "cite")?;
            content
        } else {
            self.document.create_element(Role::Paragraph)
        };

        if is_html {
            self.document.set_inner_markup(content, text)?;
            if plain {
                self.convert_paragraphs(content, level, Some(width), quote)?;
                let text = to_plain_text(&self.document, content, Some(width));
                self.set_inner_text(content, &text)?;
            } else {
                self.convert_paragraphs(content, level, None, quote)?;
            }
        } else {
            let lines: Vec<&str> = text.split('\n').collect();
            if lines.len() == 1 || (lines.len() == 2 && lines[1].is_empty()) {
                if !lines[0].is_empty() {
                    let node = self.document.create_text(lines[0]);
                    self.document.append_child(content, node)?;
                }
            } else {
                for line in lines {
                    let paragraph = self.document.create_element(Role::Paragraph);
                    if line.is_empty() {
                        let line_break = self.document.create_element(Role::LineBreak);
                        self.document.append_child(paragraph, line_break)?;
                    } else {
                        let node = self.document.create_text(line);
                        self.document.append_child(paragraph, node)?;
                    }
                    self.document.append_child(content, paragraph)?;
                }
                is_html = true;
            }
        }

        let layout_width = plain.then_some(width);
        if self.config.magic_links {
            let mut covered = false;
            for node in self.document.descendants(content) {
                if self.document.is_text(node) {
                    covered |= linkify_text(&mut self.document, node)?.is_some();
                }
            }
            if covered && !is_html {
                self.convert_paragraphs(content, level, layout_width, quote)?;
                is_html = true;
            }
        }
        if self.config.magic_smileys && self.config.unicode_smileys {
            replace_smileys_below(&mut self.document, content)?;
        }

        if quote {
            if !is_html {
                self.convert_paragraphs(content, level, layout_width, quote)?;
            }
            return self.insert_quoted_content(content);
        }

        if is_html {
            for blockquote in self.document.descendants_with_role(content, Role::QuoteBlock) {
                self.document.remove_attribute(blockquote, attr::CLASS);
            }

            let use_outer = [Role::QuoteBlock, Role::Paragraph, Role::Preformatted]
                .iter()
                .all(|role| self.document.descendants_with_role(content, *role).is_empty());
            let focus = self.focus.node;
            if !use_outer && self.is_collapsed() && self.document.is_empty_paragraph(focus) {
                let claim = Claim::nodes(focus, focus, edit_flags());
                let name = "InsertContent::replaceEmptyBlock";
                self.record(RecordKind::Custom, name, Some(claim), |session| {
                    let parent = session
                        .document
                        .parent(focus)
                        .ok_or_else(|| EditorError::structural("empty paragraph is not attached"))?;
                    let moved = session.document.children(content).to_vec();
                    for node in &moved {
                        session.document.insert_before(parent, *node, Some(focus))?;
                    }
                    session.document.detach(focus);
                    if let Some(last) = moved.last() {
                        let caret = deepest_last(&session.document, *last);
                        session.set_carets(caret, caret);
                    }
                    Ok(())
                })?;
                return self.correct_paragraphs_after_insert_content("InsertContent::inEmptyBlock");
            }

            let markup = if use_outer && !was_plain {
                self.document.to_markup(content)
            } else {
                self.document.inner_markup(content)
            };
            return self.insert_html("InsertContent::text", &markup);
        }

        let text = self.document.text_content(content);
        self.insert_text("InsertContent::text", &text)
    }

    /// Puts a quote after the block holding the caret, splitting that block
    /// when it is a paragraph.
    fn insert_quoted_content(&mut self, content: NodeId) -> Result<()> {
        let first = self
            .document
            .children(content)
            .iter()
            .copied()
            .find(|child| !self.document.is_text(*child));
        let wrapped = first.is_some_and(|first| {
            matches!(self.document.role(first), Some(Role::Paragraph | Role::Preformatted))
        });
        if !wrapped {
            let paragraph = self.document.create_element(Role::Paragraph);
            self.document.move_children(content, paragraph, None)?;
            self.document.append_child(content, paragraph)?;
        }

        let body = self.document.body();
        let anchor = self.anchor;
        let mut node = if self.document.is_text(anchor.node) {
            self.document.parent(anchor.node).unwrap_or(body)
        } else {
            anchor.node
        };
        let mut inline_top = None;
        while node != body && !self.document.is_block(node) {
            inline_top = Some(node);
            node = self.document.parent(node).unwrap_or(body);
        }
        let parent_block = if !self.document.has_role(node, Role::QuoteBlock) {
            node
        } else {
            inline_top.unwrap_or(node)
        };

        if parent_block == body {
            let claim = Claim::nodes(body, body, edit_flags());
            self.record(RecordKind::Custom, "InsertContent::text", Some(claim), |session| {
                session.document.prepend_child(body, content)?;
                session.maybe_update_paragraph_width(content)
            })?;
        } else {
            let will_split = matches!(
                self.document.role(parent_block),
                Some(Role::Paragraph | Role::Preformatted)
            );
            let flags = if will_split {
                edit_flags()
            } else {
                ClaimFlags::SAVE_MARKUP
            };
            let claim = Claim::nodes(parent_block, parent_block, flags);
            self.record(RecordKind::Custom, "InsertContent::text", Some(claim), |session| {
                let right = if will_split {
                    let (parent, index) = caret_gap(&mut session.document, anchor)?;
                    Some(split_up_to(&mut session.document, parent, index, parent_block)?)
                } else {
                    None
                };
                session.document.insert_after(parent_block, content)?;

                let caret = match session.document.next_sibling(content) {
                    Some(next) => Caret { node: next, offset: 0 },
                    None => deepest_last(&session.document, content),
                };
                session.set_carets(caret, caret);

                remove_if_empty(&mut session.document, parent_block);
                if let Some(right) = right {
                    if session.document.is_empty_paragraph(right) {
                        session.document.detach(right);
                        let caret = deepest_last(&session.document, content);
                        session.set_carets(caret, caret);
                    }
                }
                Ok(())
            })?;
        }

        if self.mode == Mode::PlainText {
            for child in self.document.children(content).to_vec() {
                self.requote_paragraph(child)?;
            }
        }
        Ok(())
    }

    /// Types `text` at the caret as a coalescing input event. A trailing
    /// word delimiter triggers magic links and smileys.
    pub fn type_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.record(RecordKind::Event, "Typing", Some(Claim::selection(edit_flags())), |session| {
            session.remove_selected_content()?;
            for (index, line) in text.split('\n').enumerate() {
                if index > 0 {
                    session.split_block_at_caret()?;
                }
                if !line.is_empty() {
                    session.insert_text_at_caret(line)?;
                }
            }
            Ok(())
        })?;

        if text.ends_with(WORD_DELIMITERS) {
            // The delimiter itself is not part of the word.
            let caret = self.anchor;
            if caret.offset > 0 && self.document.is_text(caret.node) {
                self.apply_magic_after_delimiter()?;
            }
        }
        Ok(())
    }
}
