//! Plain-text paragraph layout: soft wrapping, `> ` quotation prefixes and
//! the width styling plain-text mode puts on blocks.
//!
//! Breaks inserted by quoting carry the [`class::WRAP_BREAK`] class and the
//! prefixes live in [`class::QUOTED`] spans, so [`remove_quote_marks`] always
//! gets the unwrapped paragraph back.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::{MIN_OL_WIDTH, MIN_PARAGRAPH_WIDTH, validate_width};
use crate::document::{Document, InlineRole, NodeId, Role, attr, class, escape_markup};
use crate::error::{EditorError, Result};

use super::claim::{ClaimFlags, common_parent, direct_child};
use super::formatting::Force;
use super::history::{Change, ModeSwitch, RecordKind};
use super::plain_text::{ol_max_letters, to_plain_text};
use super::{Claim, EditorSession, Mode};

const QUOTE_MARK: &str = "> ";
/// Width of the ` * ` marker of unordered list items.
const UL_MARKER_WIDTH: usize = 3;

// ============================================================================
// Quotation prefixes
// ============================================================================

/// Builds a detached prefix span holding one `> ` mark per level.
pub fn quote_prefix(document: &mut Document, level: usize) -> Result<NodeId> {
    let prefix = document.create_element(Role::Inline(InlineRole::Span));
    document.set_attribute(prefix, attr::CLASS, class::QUOTED)?;
    for _ in 0..level {
        let mark = document.create_element(Role::Inline(InlineRole::Span));
        document.set_attribute(mark, attr::CLASS, class::QUOTE_CHARACTER)?;
        let text = document.create_text(QUOTE_MARK);
        document.append_child(mark, text)?;
        document.append_child(prefix, mark)?;
    }
    Ok(prefix)
}

fn wrap_break(document: &mut Document) -> Result<NodeId> {
    let line_break = document.create_element(Role::LineBreak);
    document.set_attribute(line_break, attr::CLASS, class::WRAP_BREAK)?;
    Ok(line_break)
}

fn insert_before_node(document: &mut Document, node: NodeId, inserted: NodeId) -> Result<()> {
    let parent = document
        .parent(node)
        .ok_or_else(|| EditorError::structural("reference node is not attached"))?;
    document.insert_before(parent, inserted, Some(node))
}

/// Deletes every quotation prefix below `node` and turns soft-wrap breaks
/// back into the space they replaced.
pub fn remove_quote_marks(document: &mut Document, node: NodeId) -> Result<()> {
    for candidate in document.descendants(node) {
        if document.has_role(candidate, Role::Inline(InlineRole::Span))
            && document.has_class(candidate, class::QUOTED)
        {
            document.detach(candidate);
        } else if document.is_line_break(candidate)
            && document.has_class(candidate, class::WRAP_BREAK)
        {
            if document.parent(candidate).is_some() {
                let space = document.create_text(" ");
                insert_before_node(document, candidate, space)?;
            }
            document.detach(candidate);
        }
    }
    document.normalize(node);
    Ok(())
}

/// Breaks the line `node` overflows and returns the length of the line the
/// walk continues on.
fn quote_paragraph_wrap(
    document: &mut Document,
    node: NodeId,
    mut line_length: usize,
    width: usize,
    level: usize,
) -> Result<usize> {
    let Some(text) = document.text(node).map(str::to_string) else {
        // The space in front of the element becomes the break.
        if let Some(previous) = document.previous_sibling(node) {
            if let Some(trimmed) = document
                .text(previous)
                .and_then(|text| text.strip_suffix(' '))
                .map(str::to_string)
            {
                document.set_text(previous, trimmed)?;
            }
        }
        let line_break = wrap_break(document)?;
        insert_before_node(document, node, line_break)?;
        let prefix = quote_prefix(document, level)?;
        insert_before_node(document, node, prefix)?;
        return Ok(document.text_content(node).width());
    };

    let words: Vec<&str> = text.split(' ').collect();
    let mut current = node;
    let mut offset = 0;
    for (index, word) in words.iter().enumerate() {
        let word_width = word.width();
        if line_length + word_width > width {
            if offset > 0 {
                let space = document.split_text(current, offset - 1)?;
                let rest = document.split_text(space, 1)?;
                document.detach(space);

                let line_break = wrap_break(document)?;
                insert_before_node(document, rest, line_break)?;
                let prefix = quote_prefix(document, level)?;
                insert_before_node(document, rest, prefix)?;
                current = rest;
            }
            offset = 0;
            line_length = 0;
        }

        let separator = usize::from(index + 1 < words.len());
        line_length += word_width + separator;
        offset += word.chars().count() + separator;
    }
    Ok(line_length)
}

/// Puts a prefix after every literal newline of a preformatted text node.
fn prefix_literal_newlines(document: &mut Document, node: NodeId, level: usize) -> Result<()> {
    let mut current = node;
    loop {
        let Some(position) = document
            .text(current)
            .and_then(|text| text.chars().position(|ch| ch == '\n'))
        else {
            return Ok(());
        };
        let rest = document.split_text(current, position + 1)?;
        let prefix = quote_prefix(document, level)?;
        insert_before_node(document, rest, prefix)?;
        current = rest;
    }
}

/// Prefixes every line of `paragraph` for `level` quotation levels and
/// wraps lines longer than `width`. Preformatted blocks are never wrapped,
/// but each of their literal newlines gets a prefix too.
pub fn quote_paragraph(
    document: &mut Document,
    paragraph: NodeId,
    level: usize,
    width: Option<usize>,
) -> Result<()> {
    if level == 0 {
        return Ok(());
    }
    remove_quote_marks(document, paragraph)?;

    let preformatted = document.has_role(paragraph, Role::Preformatted);
    let width = if preformatted {
        None
    } else {
        width.filter(|width| *width > 0)
    };

    let mut line_length = 0;
    let mut current = document.first_child(paragraph);
    while let Some(node) = current {
        let mut next = document.next_in_hierarchy(node, paragraph);

        if let Some(text) = document.text(node) {
            let length = text.width();
            if preformatted {
                prefix_literal_newlines(document, node, level)?;
            } else {
                match width {
                    Some(width) if line_length + length > width => {
                        line_length =
                            quote_paragraph_wrap(document, node, line_length, width, level)?;
                    }
                    _ => line_length += length,
                }
            }
        } else if document.is_line_break(node) {
            if document.has_class(node, class::WRAP_BREAK) {
                document.detach(node);
            } else {
                let alone = document
                    .parent(node)
                    .is_some_and(|parent| document.child_count(parent) == 1);
                if !alone {
                    let prefix = quote_prefix(document, level)?;
                    document.insert_after(node, prefix)?;
                }
                line_length = 0;
            }
        } else if document.has_role(node, Role::Anchor) {
            // Link text is never split.
            next = document.next_skipping_children(node, paragraph);
            let length = document.text_content(node).width();
            let before_break = next.is_some_and(|next| document.is_line_break(next));
            match width {
                Some(width) if line_length + length > width && !before_break => {
                    line_length = quote_paragraph_wrap(document, node, line_length, width, level)?;
                }
                _ => line_length += length,
            }
        }

        current = next;
    }

    let prefix = quote_prefix(document, level)?;
    document.prepend_child(paragraph, prefix)
}

/// Replaces the content of a quoted preformatted block with its text, one
/// prefix per line.
fn prefix_preformatted_lines(document: &mut Document, pre: NodeId, level: usize) -> Result<()> {
    let text = to_plain_text(document, pre, None);
    let text = text.strip_suffix('\n').unwrap_or(&text).to_string();
    let lines: Vec<&str> = text.split('\n').collect();

    document.clear_children(pre);
    for (index, line) in lines.iter().enumerate() {
        let prefix = quote_prefix(document, level)?;
        document.append_child(pre, prefix)?;
        if line.is_empty() {
            let line_break = document.create_element(Role::LineBreak);
            document.append_child(pre, line_break)?;
        } else {
            let content = document.create_text(*line);
            document.append_child(pre, content)?;
        }
        if index + 1 < lines.len() {
            let newline = document.create_text("\n");
            document.append_child(pre, newline)?;
        }
    }
    Ok(())
}

// ============================================================================
// Wrapping
// ============================================================================

fn columns(chars: &[char]) -> usize {
    chars.iter().map(|ch| ch.width().unwrap_or(0)).sum()
}

/// Last space whose column fits into what is left of the line, else the
/// first space at all.
fn break_position(chars: &[char], max_letters: usize, used: usize) -> Option<usize> {
    let fitting = match max_letters.checked_sub(used) {
        Some(limit) => {
            let mut column = 0;
            let mut found = None;
            for (index, ch) in chars.iter().enumerate() {
                if column > limit {
                    break;
                }
                if *ch == ' ' {
                    found = Some(index);
                }
                column += ch.width().unwrap_or(0);
            }
            found
        }
        None => (chars.first() == Some(&' ')).then_some(0),
    };
    fitting.or_else(|| chars.iter().position(|ch| *ch == ' '))
}

fn place(
    document: &mut Document,
    target: Option<NodeId>,
    reference: NodeId,
    node: NodeId,
) -> Result<()> {
    match target {
        Some(target) => document.append_child(target, node),
        None => insert_before_node(document, reference, node),
    }
}

/// Greedily re-wraps `paragraph` to `max_letters` columns, starting with
/// `used_letters` already on the line. With `target` set, the content moves
/// into that paragraph and continues its last line.
///
/// Single breaks are treated as soft and joined; a double break is a blank
/// line and stays. Returns the length of the last line, or `None` when the
/// paragraph ended in a break.
pub fn wrap_paragraph(
    document: &mut Document,
    paragraph: NodeId,
    max_letters: usize,
    target: Option<NodeId>,
    used_letters: usize,
    nested: bool,
) -> Result<Option<usize>> {
    let mut used = used_letters;
    let mut nested = nested;
    let mut child = document.first_child(paragraph);

    while let Some(mut node) = child {
        let mut append_break = false;

        if let Some(first) = document.text(node) {
            let mut text = first.to_string();
            while let Some(following) = document.next_sibling(node) {
                let Some(more) = document.text(following) else {
                    break;
                };
                text.push_str(more);
                document.detach(node);
                node = following;
            }

            let mut chars: Vec<char> = text.chars().collect();
            while columns(&chars) + used > max_letters {
                let space = break_position(&chars, max_letters, used);
                if let Some(position) = space.filter(|position| *position > 0) {
                    // The joining space is not counted, so a carried line may reach
                    // max_letters + 1 columns.
                    if used == 0 || used + columns(&chars[..position]) <= max_letters {
                        let mut head = String::new();
                        if used > 0 && !nested {
                            head.push(' ');
                        }
                        head.extend(&chars[..position]);
                        let head = document.create_text(head);
                        place(document, target, node, head)?;
                        chars.drain(..=position);
                    }
                }

                if space.is_none() && used == 0 {
                    break;
                }
                let line_break = document.create_element(Role::LineBreak);
                place(document, target, node, line_break)?;
                used = 0;

                match space {
                    Some(0) => {
                        chars.remove(0);
                    }
                    Some(_) => {}
                    None => break,
                }
            }

            let lead = used > 0 && !nested;
            let mut value = String::new();
            if lead {
                value.push(' ');
            }
            value.extend(&chars);
            used += usize::from(lead) + columns(&chars);
            document.set_text(node, value)?;

            append_break = used > max_letters;
            nested = false;
        } else if document.is_line_break(node) {
            nested = false;
            let Some(following) = document.next_sibling(node) else {
                return Ok(None);
            };
            if !document.is_line_break(following) {
                document.detach(node);
                child = Some(following);
                continue;
            }

            used = 0;
            let after = document.next_sibling(following);
            if let Some(target) = target {
                document.append_child(target, node)?;
                document.append_child(target, following)?;
            }
            if after.is_none() {
                return Ok(None);
            }
            child = after;
            continue;
        } else if document.has_role(node, Role::Image) {
            nested = false;
        } else if document.role(node).is_some_and(Role::is_inline_run) {
            used = wrap_paragraph(document, node, max_letters, None, used, true)?.unwrap_or(0);
            nested = true;
        } else {
            // Anything else stops the line.
            append_break = true;
            nested = false;
        }

        let next = document.next_sibling(node);
        if let Some(target) = target {
            document.append_child(target, node)?;
        }
        if append_break {
            used = 0;
            if let Some(next) = next {
                let line_break = document.create_element(Role::LineBreak);
                place(document, target, next, line_break)?;
            }
        }
        child = next;
    }

    Ok(Some(used))
}

// ============================================================================
// Mode conversion
// ============================================================================

/// Turns `>`-prefixed plain text back into nested quote blocks, one
/// paragraph (or preformatted block) per line.
pub fn re_blockquote_plain_text(plain_text: &str, use_pre: bool) -> String {
    let lines: Vec<&str> = plain_text.split('\n').collect();
    let (open, close) = if use_pre {
        ("<pre>", "</pre>")
    } else {
        ("<div>", "</div>")
    };
    let mut markup = String::new();
    let mut level = 0;

    for (index, line) in lines.iter().enumerate() {
        // Plain-text conversion ends with a newline.
        if index + 1 == lines.len() && line.is_empty() {
            break;
        }

        let mut rest = *line;
        let mut new_level = 0;
        while let Some(stripped) = rest.strip_prefix('>') {
            new_level += 1;
            rest = stripped.strip_prefix(' ').unwrap_or(stripped);
        }

        while new_level > level {
            markup.push_str("<blockquote type=\"cite\">");
            level += 1;
        }
        while new_level < level {
            markup.push_str("</blockquote>");
            level -= 1;
        }

        markup.push_str(open);
        let content = rest.trim_start_matches(' ');
        for _ in 0..rest.len() - content.len() {
            markup.push_str("&nbsp;");
        }
        if content.is_empty() {
            markup.push_str("<br>");
        } else {
            markup.push_str(&escape_markup(content));
        }
        markup.push_str(close);
    }

    for _ in 0..level {
        markup.push_str("</blockquote>");
    }
    markup
}

/// Quote blocks keep only their citation type and direction.
pub(crate) fn keep_quote_attributes(document: &mut Document, quote: NodeId) -> Result<()> {
    let kept = document
        .element(quote)
        .map(|element| {
            element
                .attributes
                .iter()
                .filter(|(name, _)| name.as_str() == attr::TYPE || name.as_str() == attr::DIRECTION)
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();
    document.set_attributes(quote, kept)
}

fn table_text(document: &Document, table: NodeId) -> String {
    let rows: Vec<NodeId> = document.descendants_with_role(table, Role::TableRow);
    rows.iter()
        .map(|row| {
            document
                .children(*row)
                .iter()
                .filter(|cell| matches!(document.role(**cell), Some(Role::TableCell { .. })))
                .map(|cell| document.text_content(*cell))
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduces the body to what plain text can show: images become their alt
/// text, links and tables become text, and every block other than
/// paragraphs, preformatted blocks, quotes and lists is unwrapped.
pub fn convert_tags(document: &mut Document) -> Result<()> {
    let body = document.body();

    for image in document.descendants_with_role(body, Role::Image).into_iter().rev() {
        let alt = document.attribute(image, attr::ALT).unwrap_or_default().to_string();
        if !alt.is_empty() {
            let text = document.create_text(alt);
            insert_before_node(document, image, text)?;
        }
        document.detach(image);
    }

    for anchor in document.descendants_with_role(body, Role::Anchor).into_iter().rev() {
        document.remove(anchor, true)?;
    }

    for table in document.descendants_with_role(body, Role::Table).into_iter().rev() {
        if !document.is_attached(table) {
            continue;
        }
        let text = table_text(document, table);
        let text = document.create_text(text);
        insert_before_node(document, table, text)?;
        document.detach(table);
    }

    for quote in document.descendants_with_role(body, Role::QuoteBlock) {
        keep_quote_attributes(document, quote)?;
    }

    let mut current = document.first_child(body);
    while let Some(node) = current {
        let role = document.role(node);
        let kept = matches!(
            role,
            None | Some(
                Role::Paragraph
                    | Role::Preformatted
                    | Role::QuoteBlock
                    | Role::UnorderedList
                    | Role::OrderedList
                    | Role::ListItem
                    | Role::LineBreak
            )
        );
        if matches!(role, Some(Role::Heading(_) | Role::Address)) {
            document.set_role(node, Role::Paragraph)?;
        }

        let signature =
            role == Some(Role::Paragraph) && document.has_class(node, class::SIGNATURE_WRAPPER);
        current = if signature {
            document.next_skipping_children(node, body)
        } else {
            document.next_in_hierarchy(node, body)
        };

        let renamed = matches!(role, Some(Role::Heading(_) | Role::Address));
        if !kept && !renamed {
            document.remove(node, true)?;
        }
    }

    document.normalize(body);
    Ok(())
}

// ============================================================================
// Session operations
// ============================================================================

impl EditorSession {
    /// Adjusts width styling below `parent` for `level` enclosing quotes.
    /// In plain-text mode quoted paragraphs are prefixed, and top-level
    /// quotes are flattened to text and rebuilt from their `>` prefixes.
    pub(crate) fn convert_paragraphs(
        &mut self,
        parent: NodeId,
        level: usize,
        width: Option<usize>,
        can_change_quote_paragraphs: bool,
    ) -> Result<()> {
        let plain = self.mode == Mode::PlainText;

        for child in self.document.children(parent).to_vec() {
            let Some(role) = self.document.role(child) else {
                continue;
            };
            match role {
                Role::Paragraph => {
                    match width {
                        Some(width) if !(plain && level > 0) => {
                            self.document.set_attribute(child, attr::WIDTH, format!("{width}ch"))?;
                        }
                        _ => {
                            self.document.remove_attribute(child, attr::WIDTH);
                        }
                    }
                    if plain && level > 0 {
                        quote_paragraph(&mut self.document, child, level, width)?;
                    }
                }
                Role::Preformatted => {
                    if plain && level > 0 {
                        prefix_preformatted_lines(&mut self.document, child, level)?;
                    } else {
                        self.convert_paragraphs(child, level, width, can_change_quote_paragraphs)?;
                    }
                }
                Role::QuoteBlock => {
                    let inner = width.map(|width| {
                        width
                            .saturating_sub(QUOTE_MARK.len())
                            .max(MIN_PARAGRAPH_WIDTH)
                    });
                    if plain && level == 0 {
                        let starts_with_pre = self
                            .document
                            .children(child)
                            .iter()
                            .find(|node| !self.document.is_text(**node))
                            .is_some_and(|node| self.document.has_role(*node, Role::Preformatted));
                        let rewrap = can_change_quote_paragraphs
                            && self.config.wrap_quoted_text_in_replies;
                        let use_pre = starts_with_pre && !rewrap;
                        let text = to_plain_text(&self.document, child, None);
                        self.document
                            .set_inner_markup(child, &re_blockquote_plain_text(&text, use_pre))?;
                    }
                    self.convert_paragraphs(child, level + 1, inner, can_change_quote_paragraphs)?;
                }
                Role::UnorderedList => match width {
                    Some(width) => {
                        let inner = width.saturating_sub(UL_MARKER_WIDTH).max(MIN_PARAGRAPH_WIDTH);
                        self.document.set_attribute(child, attr::WIDTH, format!("{inner}ch"))?;
                    }
                    None => {
                        self.document.remove_attribute(child, attr::WIDTH);
                    }
                },
                Role::OrderedList => match width {
                    Some(width) => {
                        let items = self
                            .document
                            .children(child)
                            .iter()
                            .filter(|node| !self.document.is_text(**node))
                            .count();
                        let kind = self.document.attribute(child, attr::TYPE);
                        let marker = (ol_max_letters(kind, items) + 2).max(MIN_OL_WIDTH);
                        let inner = width.saturating_sub(marker).max(MIN_PARAGRAPH_WIDTH);
                        self.document.set_attribute(child, attr::WIDTH, format!("{inner}ch"))?;
                        self.document
                            .set_attribute(child, attr::PADDING_START, format!("{marker}ch"))?;
                    }
                    None => {
                        self.document.remove_attribute(child, attr::WIDTH);
                        self.document.remove_attribute(child, attr::PADDING_START);
                    }
                },
                _ => {}
            }
        }
        Ok(())
    }

    /// Switches between rich and plain-text editing. The conversion is one
    /// undo step that also restores the mode.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        if self.mode == mode {
            return Ok(());
        }
        let name = match mode {
            Mode::PlainText => "setMode::PlainText",
            Mode::Html => "setMode::HTML",
        };

        let outcome = self.record(RecordKind::Document, name, None, |session| {
            session.record_change(Change::Mode(ModeSwitch {
                before: session.mode,
                after: mode,
            }));
            session.without_history(|session| {
                session.mode = mode;
                let body = session.document.body();
                remove_quote_marks(&mut session.document, body)?;
                match mode {
                    Mode::PlainText => {
                        convert_tags(&mut session.document)?;
                        let width = session.config.paragraph_width;
                        session.convert_paragraphs(body, 0, Some(width), false)
                    }
                    Mode::Html => session.convert_paragraphs(body, 0, None, false),
                }
            })
        });

        tracing::debug!(mode = mode.as_str(), "editing mode switched");
        self.update_formatting_state(Force::Yes);
        outcome
    }

    /// Changes the plain-text paragraph width, reflowing a plain-text
    /// document. The reflow is not undoable.
    pub fn set_paragraph_width(&mut self, width: usize) -> Result<()> {
        validate_width(width)?;
        if self.config.paragraph_width == width {
            return Ok(());
        }
        self.config.paragraph_width = width;
        if self.mode == Mode::PlainText {
            let body = self.document.body();
            self.without_history(|session| {
                session.convert_paragraphs(body, 0, Some(width), false)
            })?;
            self.normalize_range(body, 0, 0);
        }
        Ok(())
    }

    /// Sizes a paragraph to the plain-text width left over by its quotes.
    pub(crate) fn maybe_update_paragraph_width(&mut self, node: NodeId) -> Result<()> {
        if self.mode != Mode::PlainText {
            return Ok(());
        }
        let level = self.document.quote_level(node);
        let width = self.config.paragraph_width;
        if level * 2 < width {
            self.document
                .set_attribute(node, attr::WIDTH, format!("{}ch", width - level * 2))?;
        }
        Ok(())
    }

    /// Re-applies the quotation prefixes of the block holding `node`.
    /// Returns that block, or `None` when `node` is not inside one.
    pub fn requote_paragraph(&mut self, node: NodeId) -> Result<Option<NodeId>> {
        let block = self.document.parent_block(node);
        if block == self.document.body() {
            return Ok(None);
        }
        let level = self.document.quote_level(block);
        let width = self
            .config
            .paragraph_width
            .checked_sub(2 * level)
            .filter(|width| *width > 0);

        let claim = Claim::nodes(block, block, ClaimFlags::SAVE_MARKUP);
        self.record(RecordKind::Custom, "requote", Some(claim), |session| {
            quote_paragraph(&mut session.document, block, level, width)
        })?;
        Ok(Some(block))
    }

    /// Re-wraps the paragraphs touched by the selection to the paragraph
    /// width, joining their soft line breaks.
    pub fn wrap_selection(&mut self) -> Result<()> {
        let body = self.document.body();
        let mut from = self.document.parent_block(self.anchor.node);
        let mut to = self.document.parent_block(self.focus.node);
        if from == body || to == body {
            return Ok(());
        }

        if from != to {
            let common = common_parent(&self.document, from, to, true);
            let (Some(child_from), Some(child_to)) = (
                direct_child(&self.document, common, from),
                direct_child(&self.document, common, to),
            ) else {
                return Err(EditorError::structural("selection ends are not inside one container"));
            };
            let from_index = self.document.index_in_parent(child_from);
            let forward = from_index <= self.document.index_in_parent(child_to);
            (from, to) = if forward {
                (child_from, child_to)
            } else {
                (child_to, child_from)
            };
        }

        let flags = ClaimFlags::USE_PARENT_BLOCK_NODE | ClaimFlags::SAVE_MARKUP;
        let claim = Claim::nodes(from, to, flags);
        self.record(RecordKind::Custom, "WrapSelection", Some(claim), |session| {
            session.wrap_blocks(from, to)
        })
    }

    fn wrap_blocks(&mut self, first: NodeId, last: NodeId) -> Result<()> {
        let max_letters = self.config.paragraph_width;
        let plain = self.mode == Mode::PlainText;
        let mut used = 0;
        let mut target: Option<NodeId> = None;
        let mut last_role = self.document.role(first);
        let mut current = Some(first);

        while let Some(block) = current {
            remove_quote_marks(&mut self.document, block)?;

            let role = self.document.role(block);
            if role != last_role {
                last_role = role;
                target = None;
                used = 0;
            }

            if matches!(role, Some(Role::Paragraph | Role::Preformatted)) {
                let children = self.document.children(block);
                if children.len() == 1 && self.document.is_line_break(children[0]) {
                    target = None;
                    used = 0;
                } else {
                    let level = if plain { self.document.quote_level(block) } else { 0 };
                    let holder = target.unwrap_or(block);
                    let width = max_letters.saturating_sub(2 * level);
                    let outcome =
                        wrap_paragraph(&mut self.document, block, width, target, used, false)?;
                    if level > 0 {
                        self.requote_paragraph(holder)?;
                    }
                    match outcome {
                        None => {
                            target = None;
                            used = 0;
                        }
                        Some(length) => {
                            used = length;
                            target.get_or_insert(block);
                        }
                    }
                }
            }

            let done = block == last;
            current = self.document.next_sibling(block);
            if self.document.child_count(block) == 0 && self.document.parent(block).is_some() {
                self.document.detach(block);
            }
            if done {
                break;
            }
        }

        let mut caret = target.unwrap_or(last);
        while let Some(child) = self.document.last_child(caret) {
            caret = child;
        }
        let offset = self
            .document
            .text(caret)
            .map(|text| text.chars().count())
            .unwrap_or(0);
        self.set_caret(caret, offset);
        Ok(())
    }
}
