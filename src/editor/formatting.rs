use crate::config::TEXT_INDENT_SIZE;
use crate::document::{Document, InlineRole, NodeId, Role, attr};

use super::claim::{common_parent, direct_child};
use super::{Alignment, BlockFormat, EditorEvent, EditorSession, Mode};

/// How eagerly [`EditorSession::update_formatting_state`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Force {
    /// Skip when neither the anchor element nor the mode moved.
    No,
    /// Report every field and mark the diff as forced.
    Yes,
    /// Recompute, but report only changed fields.
    Maybe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Script {
    Subscript,
    #[default]
    Normal,
    Superscript,
}

pub const DEFAULT_FONT_SIZE: u8 = 3;

/// Effective formatting at the selection anchor, as reported to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingState {
    pub mode: Option<Mode>,
    pub body_font_family: String,
    pub body_fg_color: String,
    pub body_bg_color: String,
    pub body_link_color: String,
    pub body_vlink_color: String,
    pub script: Script,
    pub block_format: BlockFormat,
    pub font_size: u8,
    pub indent_level: i64,
    pub fg_color: String,
    pub bg_color: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font_family: String,
    pub alignment: Alignment,
}

impl Default for FormattingState {
    fn default() -> Self {
        Self {
            mode: None,
            body_font_family: String::new(),
            body_fg_color: String::new(),
            body_bg_color: String::new(),
            body_link_color: String::new(),
            body_vlink_color: String::new(),
            script: Script::Normal,
            block_format: BlockFormat::None,
            font_size: 0,
            indent_level: 0,
            fg_color: String::new(),
            bg_color: String::new(),
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            font_family: String::new(),
            alignment: Alignment::None,
        }
    }
}

/// Fields of [`FormattingState`] that changed since the last report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattingDiff {
    pub mode: Option<Mode>,
    pub body_font_family: Option<String>,
    pub body_fg_color: Option<String>,
    pub body_bg_color: Option<String>,
    pub body_link_color: Option<String>,
    pub body_vlink_color: Option<String>,
    pub script: Option<Script>,
    pub block_format: Option<BlockFormat>,
    pub font_size: Option<u8>,
    pub indent_level: Option<i64>,
    pub fg_color: Option<String>,
    pub bg_color: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikethrough: Option<bool>,
    pub font_family: Option<String>,
    pub alignment: Option<Alignment>,
    pub forced: bool,
}

impl FormattingDiff {
    pub fn is_empty(&self) -> bool {
        *self == FormattingDiff::default()
    }
}

fn changed<T: Clone + PartialEq>(force: bool, previous: &T, next: &T) -> Option<T> {
    (force || previous != next).then(|| next.clone())
}

impl FormattingState {
    /// Builds the diff from `self` to `next`. The mode is only reported
    /// when it actually changed.
    pub fn diff(&self, next: &FormattingState, force: bool) -> FormattingDiff {
        FormattingDiff {
            mode: changed(false, &self.mode, &next.mode).flatten(),
            body_font_family: changed(force, &self.body_font_family, &next.body_font_family),
            body_fg_color: changed(force, &self.body_fg_color, &next.body_fg_color),
            body_bg_color: changed(force, &self.body_bg_color, &next.body_bg_color),
            body_link_color: changed(force, &self.body_link_color, &next.body_link_color),
            body_vlink_color: changed(force, &self.body_vlink_color, &next.body_vlink_color),
            script: changed(force, &self.script, &next.script),
            block_format: changed(force, &self.block_format, &next.block_format),
            font_size: changed(force, &self.font_size, &next.font_size),
            indent_level: changed(force, &self.indent_level, &next.indent_level),
            fg_color: changed(force, &self.fg_color, &next.fg_color),
            bg_color: changed(force, &self.bg_color, &next.bg_color),
            bold: changed(force, &self.bold, &next.bold),
            italic: changed(force, &self.italic, &next.italic),
            underline: changed(force, &self.underline, &next.underline),
            strikethrough: changed(force, &self.strikethrough, &next.strikethrough),
            font_family: changed(force, &self.font_family, &next.font_family),
            alignment: changed(force, &self.alignment, &next.alignment),
            forced: force,
        }
    }
}

/// Block format of a single element, if it carries one.
pub(crate) fn block_format_of(document: &Document, node: NodeId) -> Option<BlockFormat> {
    let format = match document.role(node)? {
        Role::Paragraph => BlockFormat::Paragraph,
        Role::Preformatted => BlockFormat::Preformatted,
        Role::Address => BlockFormat::Address,
        Role::Heading(level) => BlockFormat::Heading(level),
        Role::UnorderedList => BlockFormat::UnorderedList,
        Role::OrderedList => match document.attribute(node, attr::TYPE) {
            Some(kind) if kind.eq_ignore_ascii_case("i") => BlockFormat::OrderedListRoman,
            Some(kind) if kind.eq_ignore_ascii_case("a") => BlockFormat::OrderedListAlpha,
            _ => BlockFormat::OrderedList,
        },
        _ => return None,
    };
    Some(format)
}

/// Indentation margin of `node` on its start side, in character cells.
pub(crate) fn start_margin(document: &Document, node: NodeId) -> Option<i64> {
    let side = if document.is_rtl(node) {
        attr::MARGIN_RIGHT
    } else {
        attr::MARGIN_LEFT
    };
    document.char_length_attribute(node, side)
}

/// Walks from `anchor` up to the body, taking the first value found for
/// each field.
pub fn resolve(document: &Document, anchor: NodeId, mode: Mode) -> FormattingState {
    let body = document.body();
    let body_value = |name: &str| document.attribute(body, name).unwrap_or_default().to_string();

    let mut script = None;
    let mut block_format = None;
    let mut font_size = None;
    let mut font_family: Option<String> = None;
    let mut fg_color: Option<String> = None;
    let mut bg_color: Option<String> = None;
    let mut text_align: Option<String> = None;
    let mut indent_level = 0;
    let mut bold = false;
    let mut italic = false;
    let mut underline = false;
    let mut strikethrough = false;

    let mut current = Some(anchor);
    while let Some(node) = current {
        if node == body {
            break;
        }
        current = document.parent(node);
        let Some(role) = document.role(node) else {
            continue;
        };

        if script.is_none() {
            script = match role {
                Role::Inline(InlineRole::Subscript) => Some(Script::Subscript),
                Role::Inline(InlineRole::Superscript) => Some(Script::Superscript),
                _ => None,
            };
        }
        if block_format.is_none() {
            block_format = block_format_of(document, node);
        }
        if role == Role::Inline(InlineRole::Font) {
            if font_size.is_none() {
                font_size = document
                    .attribute(node, attr::SIZE)
                    .and_then(|size| size.trim().parse::<u8>().ok())
                    .filter(|size| (1..=7).contains(size));
            }
            if font_family.is_none() {
                font_family = document.attribute(node, attr::FACE).map(str::to_string);
            }
            if fg_color.is_none() {
                fg_color = document.attribute(node, attr::COLOR).map(str::to_string);
            }
        }
        if font_family.is_none() && role != Role::Body {
            font_family = document.attribute(node, attr::FONT_FAMILY).map(str::to_string);
        }

        if let Some(margin) = start_margin(document, node).filter(|margin| *margin > 0) {
            indent_level += margin / TEXT_INDENT_SIZE;
        }
        if role.is_list() {
            indent_level += 1;
        }

        if bg_color.is_none() {
            bg_color = document
                .attribute(node, attr::BACKGROUND_COLOR)
                .map(str::to_string);
        }
        bold |= role == Role::Inline(InlineRole::Bold);
        italic |= role == Role::Inline(InlineRole::Italic);
        underline |= role == Role::Inline(InlineRole::Underline);
        strikethrough |= role == Role::Inline(InlineRole::Strikethrough);
        if text_align.is_none() {
            text_align = document.attribute(node, attr::TEXT_ALIGN).map(str::to_string);
        }
    }

    let font_family = font_family.unwrap_or_default();
    let font_family = font_family
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .map(str::to_string)
        .unwrap_or(font_family);

    let alignment = match text_align.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("left" | "start") => Alignment::Left,
        Some("right") => Alignment::Right,
        Some("center") => Alignment::Center,
        Some("justify") => Alignment::Justify,
        _ if document.is_rtl(anchor) => Alignment::Right,
        _ => Alignment::Left,
    };

    FormattingState {
        mode: Some(mode),
        body_font_family: body_value(attr::FONT_FAMILY),
        body_fg_color: body_value(attr::TEXT_COLOR),
        body_bg_color: body_value(attr::BG_COLOR),
        body_link_color: body_value(attr::LINK_COLOR),
        body_vlink_color: body_value(attr::VISITED_LINK_COLOR),
        script: script.unwrap_or_default(),
        block_format: block_format.unwrap_or(BlockFormat::Paragraph),
        font_size: font_size.unwrap_or(DEFAULT_FONT_SIZE),
        indent_level,
        fg_color: fg_color.unwrap_or_default(),
        bg_color: bg_color.unwrap_or_default(),
        bold,
        italic,
        underline,
        strikethrough,
        font_family,
        alignment,
    }
}

impl EditorSession {
    /// The element formatting is read from: the focus end for a forward
    /// selection, otherwise the anchor.
    fn formatting_anchor(&self) -> NodeId {
        let document = &self.document;
        let anchor = self.anchor.node;
        let focus = self.focus.node;
        let mut chosen = anchor;

        if !self.is_collapsed() {
            let common = common_parent(document, anchor, focus, true);
            let first = direct_child(document, common, anchor);
            let second = direct_child(document, common, focus);
            let forward = match (first, second) {
                (Some(first), Some(second)) => {
                    document.index_in_parent(first) <= document.index_in_parent(second)
                }
                (Some(_), None) => true,
                _ => false,
            };
            if forward {
                chosen = focus;
            }
        }

        if document.is_text(chosen) {
            document.parent(chosen).unwrap_or(document.body())
        } else {
            chosen
        }
    }

    /// Recomputes the formatting state and queues a
    /// [`EditorEvent::FormattingChanged`] carrying only what changed.
    pub fn update_formatting_state(&mut self, force: Force) {
        let anchor = self.formatting_anchor();
        if force == Force::No
            && self.formatting_anchor_element == Some(anchor)
            && self.formatting.mode == Some(self.mode)
        {
            return;
        }

        self.formatting_anchor_element = Some(anchor);
        let next = resolve(&self.document, anchor, self.mode);
        let diff = self.formatting.diff(&next, force == Force::Yes);
        self.formatting = next;
        if !diff.is_empty() {
            self.events.push(EditorEvent::FormattingChanged(diff));
        }
    }

    pub fn formatting_state(&self) -> &FormattingState {
        &self.formatting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComposerConfig;
    use crate::document::Path;

    #[test]
    fn resolve_reads_up_to_the_body() {
        let document =
            Document::from_markup("<body text=\"navy\"><ul><li><b><font size=\"5\">x</font></b></li></ul></body>")
                .unwrap();
        let font = document
            .resolve_from_body(&Path::new(vec![0, 0, 0, 0]))
            .unwrap();
        let state = resolve(&document, font, Mode::Html);
        assert!(state.bold);
        assert!(!state.italic);
        assert_eq!(state.block_format, BlockFormat::UnorderedList);
        assert_eq!(state.indent_level, 1);
        assert_eq!(state.font_size, 5);
        assert_eq!(state.body_fg_color, "navy");
        assert_eq!(state.alignment, Alignment::Left);
    }

    #[test]
    fn margins_count_as_indent_levels() {
        let document = Document::from_markup("<div dir=\"rtl\" margin-right=\"6ch\">x</div>").unwrap();
        let paragraph = document.first_child(document.body()).unwrap();
        let state = resolve(&document, paragraph, Mode::PlainText);
        assert_eq!(state.indent_level, 2);
        assert_eq!(state.alignment, Alignment::Right);
        assert_eq!(state.mode, Some(Mode::PlainText));
    }

    #[test]
    fn diff_reports_only_changes_unless_forced() {
        let previous = FormattingState::default();
        let next = FormattingState {
            bold: true,
            ..FormattingState::default()
        };
        let diff = previous.diff(&next, false);
        assert_eq!(diff.bold, Some(true));
        assert_eq!(diff.italic, None);
        assert!(previous.diff(&previous, false).is_empty());
        assert_eq!(previous.diff(&previous, true).italic, Some(false));
    }

    #[test]
    fn moving_into_bold_text_reports_the_change() {
        let mut session =
            EditorSession::from_markup("<div>a<b>b</b></div>", ComposerConfig::default()).unwrap();
        session.drain_events();
        session.collapse_to(&Path::new(vec![0, 1, 0]), 0).unwrap();

        let events = session.drain_events();
        let Some(EditorEvent::FormattingChanged(diff)) = events.last() else {
            panic!("expected a formatting event, got {events:?}");
        };
        assert_eq!(diff.bold, Some(true));
        assert!(!diff.forced);
        assert!(session.formatting_state().bold);
    }
}
