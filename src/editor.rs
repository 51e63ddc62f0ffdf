use std::fmt;
use std::str::FromStr;

use crate::config::{ComposerConfig, validate_width};
use crate::document::{Document, NodeId, Normalized, Path, Role, attr};
use crate::error::{EditorError, Result};

pub mod claim;
pub mod content;
pub mod formatting;
pub mod history;
pub mod plain_text;

mod block_format;
mod indent;
mod insert;
mod magic;
mod reflow;
mod signature;

use claim::{AffectedRegion, ClaimFlags, claim_affected_content};
use formatting::{Force, FormattingDiff, FormattingState};
use history::{Change, Closed, History, RecordKind, ReplayTarget};

/// Body attribute carrying the editing mode in a saved draft.
const DRAFT_MODE_ATTR: &str = "data-mode";
/// Body attribute carrying the selection in a saved draft.
const DRAFT_SELECTION_ATTR: &str = "data-selection";

// ============================================================================
// Enumerations exchanged with hosts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    PlainText,
    #[default]
    Html,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::PlainText => "plain",
            Mode::Html => "html",
        }
    }
}

impl TryFrom<i32> for Mode {
    type Error = EditorError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Mode::PlainText),
            1 => Ok(Mode::Html),
            _ => Err(EditorError::invalid(format!("unknown mode value {value}"))),
        }
    }
}

impl FromStr for Mode {
    type Err = EditorError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "plain" => Ok(Mode::PlainText),
            "html" => Ok(Mode::Html),
            _ => Err(EditorError::invalid(format!("unknown mode `{value}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    None,
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// The `text-align` value this alignment writes, empty for `None`.
    pub fn css_value(self) -> &'static str {
        match self {
            Alignment::None => "",
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

impl TryFrom<i32> for Alignment {
    type Error = EditorError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(Alignment::None),
            0 => Ok(Alignment::Left),
            1 => Ok(Alignment::Center),
            2 => Ok(Alignment::Right),
            3 => Ok(Alignment::Justify),
            _ => Err(EditorError::invalid(format!("unknown alignment value {value}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFormat {
    None,
    Paragraph,
    Preformatted,
    Address,
    /// Heading level, 1 to 6.
    Heading(u8),
    UnorderedList,
    OrderedList,
    OrderedListRoman,
    OrderedListAlpha,
}

impl BlockFormat {
    pub fn is_list(self) -> bool {
        matches!(
            self,
            BlockFormat::UnorderedList
                | BlockFormat::OrderedList
                | BlockFormat::OrderedListRoman
                | BlockFormat::OrderedListAlpha
        )
    }
}

impl TryFrom<i32> for BlockFormat {
    type Error = EditorError;

    fn try_from(value: i32) -> Result<Self> {
        let format = match value {
            0 => BlockFormat::None,
            1 => BlockFormat::Paragraph,
            2 => BlockFormat::Preformatted,
            3 => BlockFormat::Address,
            4..=9 => BlockFormat::Heading((value - 3) as u8),
            10 => BlockFormat::UnorderedList,
            11 => BlockFormat::OrderedList,
            12 => BlockFormat::OrderedListRoman,
            13 => BlockFormat::OrderedListAlpha,
            _ => {
                return Err(EditorError::invalid(format!(
                    "unknown block format value {value}"
                )));
            }
        };
        Ok(format)
    }
}

// ============================================================================
// Selection
// ============================================================================

/// A live selection endpoint. For text nodes the offset counts characters,
/// for elements it counts children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub node: NodeId,
    pub offset: usize,
}

impl Caret {
    /// Keeps the caret on the same character across one normalization step.
    fn follow(&mut self, change: Normalized) {
        let (parent, index) = match change {
            Normalized::Merged {
                removed,
                into,
                shift,
                parent,
                index,
            } => {
                if self.node == removed {
                    self.node = into;
                    self.offset += shift;
                    return;
                }
                if self.node == parent && self.offset == index {
                    *self = Caret { node: into, offset: shift };
                    return;
                }
                (parent, index)
            }
            Normalized::Dropped {
                removed,
                parent,
                index,
            } => {
                if self.node == removed {
                    *self = Caret { node: parent, offset: index };
                    return;
                }
                (parent, index)
            }
        };
        if self.node == parent && self.offset > index {
            self.offset -= 1;
        }
    }
}

/// A selection endpoint addressed by path, valid for one tree state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPoint {
    pub path: Path,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub anchor: SelectionPoint,
    pub focus: SelectionPoint,
}

impl Selection {
    pub fn collapsed(path: Path, offset: usize) -> Self {
        let point = SelectionPoint { path, offset };
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{};{}:{}",
            self.anchor.path, self.anchor.offset, self.focus.path, self.focus.offset
        )
    }
}

impl FromStr for Selection {
    type Err = EditorError;

    fn from_str(value: &str) -> Result<Self> {
        let point = |part: &str| -> Result<SelectionPoint> {
            let (path, offset) = part
                .rsplit_once(':')
                .ok_or_else(|| EditorError::invalid(format!("bad selection point `{part}`")))?;
            let offset = offset
                .parse()
                .map_err(|_| EditorError::invalid(format!("bad selection offset `{offset}`")))?;
            Ok(SelectionPoint {
                path: path.parse()?,
                offset,
            })
        };
        let (anchor, focus) = value
            .split_once(';')
            .ok_or_else(|| EditorError::invalid(format!("bad selection `{value}`")))?;
        Ok(Selection {
            anchor: point(anchor)?,
            focus: point(focus)?,
        })
    }
}

// ============================================================================
// Session
// ============================================================================

/// Notifications for an observing host, drained with
/// [`EditorSession::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    ContentChanged,
    FormattingChanged(FormattingDiff),
}

/// Which content a record claims for its undo snapshot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Claim {
    pub start: Option<NodeId>,
    pub end: Option<NodeId>,
    pub flags: ClaimFlags,
}

impl Claim {
    pub fn selection(flags: ClaimFlags) -> Self {
        Self {
            start: None,
            end: None,
            flags,
        }
    }

    pub fn nodes(start: NodeId, end: NodeId, flags: ClaimFlags) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            flags,
        }
    }
}

/// One open document with its selection, undo history and configuration.
pub struct EditorSession {
    document: Document,
    history: History,
    anchor: Caret,
    focus: Caret,
    stored_selection: Option<Selection>,
    mode: Mode,
    config: ComposerConfig,
    formatting: FormattingState,
    formatting_anchor_element: Option<NodeId>,
    events: Vec<EditorEvent>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(ComposerConfig::default())
    }
}

impl EditorSession {
    /// Creates a session holding a single empty paragraph.
    pub fn new(config: ComposerConfig) -> Self {
        let document = Document::new();
        let body = document.body();
        let caret = Caret { node: body, offset: 0 };
        let mut session = Self {
            document,
            history: History::new(config.max_undo_levels),
            anchor: caret,
            focus: caret,
            stored_selection: None,
            mode: Mode::Html,
            config,
            formatting: FormattingState::default(),
            formatting_anchor_element: None,
            events: Vec::new(),
        };
        let previous = session.history.set_enabled(false);
        if let Err(err) = session.initialize_content() {
            tracing::error!(error = %err, "failed to initialize an empty document");
        }
        session.history.set_enabled(previous);
        session
    }

    pub fn from_markup(markup: &str, config: ComposerConfig) -> Result<Self> {
        let mut session = Self::new(config);
        session.load_markup(markup)?;
        Ok(session)
    }

    /// Replaces the document with parsed `markup` and clears the history.
    /// A body carrying draft attributes restores the mode and selection.
    pub fn load_markup(&mut self, markup: &str) -> Result<()> {
        let document = Document::from_markup(markup)?;
        if self.history.is_recording() {
            return Err(EditorError::invalid("cannot load while a record is open"));
        }
        self.document = document;
        let body = self.document.body();
        self.anchor = Caret { node: body, offset: 0 };
        self.focus = self.anchor;
        self.stored_selection = None;

        let outcome = self.without_history(|session| session.process_loaded_content());
        self.history.clear();
        self.formatting_anchor_element = None;
        outcome?;
        tracing::debug!(mode = self.mode.as_str(), "content loaded");
        self.update_formatting_state(Force::Yes);
        Ok(())
    }

    fn process_loaded_content(&mut self) -> Result<()> {
        let body = self.document.body();
        if let Some(mode) = self.document.remove_attribute(body, DRAFT_MODE_ATTR) {
            self.mode = mode.parse()?;
        }
        let draft_selection = self.document.remove_attribute(body, DRAFT_SELECTION_ATTR);

        self.require_blocks_in_quotes()?;

        if self.mode == Mode::PlainText {
            let width = self.config.paragraph_width;
            self.convert_paragraphs(body, 0, Some(width), false)?;
            if self.config.magic_links {
                self.linkify_subtree(body)?;
            }
        }
        self.normalize_range(body, 0, 0);

        if self.config.start_bottom {
            let paragraph = self.empty_paragraph()?;
            self.document.append_child(body, paragraph)?;
            self.set_caret(paragraph, 0);
        }

        self.initialize_content()?;

        if let Some(selection) = draft_selection {
            let selection: Selection = selection.parse()?;
            if self.set_selection(&selection).is_err() {
                tracing::warn!(%selection, "draft selection does not resolve, ignored");
            }
        }
        Ok(())
    }

    /// Quote blocks hold only blocks: loose inline runs are wrapped into
    /// paragraphs, and presentation attributes are dropped.
    fn require_blocks_in_quotes(&mut self) -> Result<()> {
        let body = self.document.body();
        let quotes = self.document.descendants_with_role(body, Role::QuoteBlock);
        for quote in quotes.into_iter().rev() {
            let mut adding_to: Option<NodeId> = None;
            for node in self.document.children(quote).to_vec() {
                let loose = if self.document.is_text(node) {
                    self.document
                        .text(node)
                        .is_some_and(|text| !text.trim_matches(['\n', '\r']).is_empty())
                } else {
                    !self.document.is_block(node)
                };
                if !loose {
                    adding_to = None;
                    continue;
                }
                let target = match adding_to {
                    Some(target) => target,
                    None => {
                        let paragraph = self.document.create_element(Role::Paragraph);
                        self.document.insert_before(quote, paragraph, Some(node))?;
                        self.maybe_update_paragraph_width(paragraph)?;
                        adding_to = Some(paragraph);
                        paragraph
                    }
                };
                self.document.append_child(target, node)?;
            }

            reflow::keep_quote_attributes(&mut self.document, quote)?;
        }
        Ok(())
    }

    /// An empty body gets one empty paragraph, and the caret is put inside
    /// the document.
    fn initialize_content(&mut self) -> Result<()> {
        let body = self.document.body();
        if self.document.child_count(body) == 0 {
            let paragraph = self.empty_paragraph()?;
            self.document.append_child(body, paragraph)?;
            self.set_caret(paragraph, 0);
        }
        self.ensure_caret_attached();
        if self.anchor.node == body && self.focus.node == body {
            if let Some(first) = self.document.first_child(body) {
                self.set_caret(first, 0);
            }
        }
        Ok(())
    }

    /// A detached `<div><br></div>`, sized to the paragraph width in
    /// plain-text mode.
    pub(crate) fn empty_paragraph(&mut self) -> Result<NodeId> {
        let paragraph = self.document.create_element(Role::Paragraph);
        if self.mode == Mode::PlainText {
            self.document.set_attribute(
                paragraph,
                attr::WIDTH,
                format!("{}ch", self.config.paragraph_width),
            )?;
        }
        let line_break = self.document.create_element(Role::LineBreak);
        self.document.append_child(paragraph, line_break)?;
        Ok(paragraph)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct access to the tree. Changes made here are not recorded.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Serialized children of the body.
    pub fn markup(&self) -> String {
        self.document.inner_markup(self.document.body())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Replaces the configuration. A changed paragraph width reflows a
    /// plain-text document and a lower undo cap drops the oldest steps.
    pub fn set_config(&mut self, config: ComposerConfig) -> Result<()> {
        validate_width(config.paragraph_width)?;
        let width = config.paragraph_width;
        let width_changed = width != self.config.paragraph_width;
        self.history.set_max_levels(config.max_undo_levels);
        self.config = ComposerConfig {
            paragraph_width: self.config.paragraph_width,
            ..config
        };
        if width_changed {
            self.set_paragraph_width(width)?;
        }
        Ok(())
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit_content_changed(&mut self) {
        self.events.push(EditorEvent::ContentChanged);
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn anchor(&self) -> Caret {
        self.anchor
    }

    pub fn focus(&self) -> Caret {
        self.focus
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// The current selection as paths from the body.
    pub fn selection(&self) -> Selection {
        Selection {
            anchor: self.point_of(self.anchor),
            focus: self.point_of(self.focus),
        }
    }

    fn point_of(&self, caret: Caret) -> SelectionPoint {
        match self.document.path_from_body(caret.node) {
            Ok(path) => SelectionPoint {
                path,
                offset: caret.offset,
            },
            Err(_) => SelectionPoint::default(),
        }
    }

    fn resolve_point(&self, point: &SelectionPoint) -> Result<Caret> {
        let node = self.document.resolve_from_body(&point.path)?;
        Ok(Caret {
            node,
            offset: point.offset.min(self.max_offset(node)),
        })
    }

    fn max_offset(&self, node: NodeId) -> usize {
        match self.document.text(node) {
            Some(text) => text.chars().count(),
            None => self.document.child_count(node),
        }
    }

    pub fn set_selection(&mut self, selection: &Selection) -> Result<()> {
        let anchor = self.resolve_point(&selection.anchor)?;
        let focus = self.resolve_point(&selection.focus)?;
        self.anchor = anchor;
        self.focus = focus;
        self.update_formatting_state(Force::No);
        Ok(())
    }

    /// Collapses the selection to `offset` inside the node at `path`.
    pub fn collapse_to(&mut self, path: &Path, offset: usize) -> Result<()> {
        self.set_selection(&Selection::collapsed(path.clone(), offset))
    }

    /// Selects everything inside the node at `path`.
    pub fn select_node_contents(&mut self, path: &Path) -> Result<()> {
        let node = self.document.resolve_from_body(path)?;
        self.anchor = Caret { node, offset: 0 };
        self.focus = Caret {
            node,
            offset: self.max_offset(node),
        };
        self.update_formatting_state(Force::No);
        Ok(())
    }

    pub fn store_selection(&mut self) {
        self.stored_selection = Some(self.selection());
    }

    /// Restores and forgets the stored selection, if any.
    pub fn restore_selection(&mut self) -> Result<()> {
        match self.stored_selection.take() {
            Some(selection) => self.set_selection(&selection),
            None => Ok(()),
        }
    }

    pub(crate) fn set_caret(&mut self, node: NodeId, offset: usize) {
        self.anchor = Caret { node, offset };
        self.focus = self.anchor;
    }

    pub(crate) fn set_carets(&mut self, anchor: Caret, focus: Caret) {
        self.anchor = anchor;
        self.focus = focus;
    }

    /// Points carets that sat on `old` at `new`.
    pub(crate) fn remap_carets(&mut self, old: NodeId, new: NodeId) {
        let max = self.max_offset(new);
        for caret in [&mut self.anchor, &mut self.focus] {
            if caret.node == old {
                caret.node = new;
                caret.offset = caret.offset.min(max);
            }
        }
    }

    /// Normalizes the children of `node` between `first` and the last
    /// `remaining`, keeping the carets on their characters.
    pub(crate) fn normalize_range(&mut self, node: NodeId, first: usize, remaining: usize) {
        for change in self.document.normalize_range(node, first, remaining) {
            self.anchor.follow(change);
            self.focus.follow(change);
        }
    }

    /// Moves carets that lost their node back into the document.
    pub(crate) fn ensure_caret_attached(&mut self) {
        let body = self.document.body();
        let fallback = self.document.first_child(body).unwrap_or(body);
        for caret in [&mut self.anchor, &mut self.focus] {
            if !self.document.is_attached(caret.node) {
                *caret = Caret {
                    node: fallback,
                    offset: 0,
                };
            }
            let max = match self.document.text(caret.node) {
                Some(text) => text.chars().count(),
                None => self.document.child_count(caret.node),
            };
            caret.offset = caret.offset.min(max);
        }
    }

    fn caret_key(&self, caret: Caret) -> Option<Path> {
        let path = self.document.path_from_body(caret.node).ok()?;
        Some(path.child(caret.offset))
    }

    /// Both carets in document order.
    pub(crate) fn ordered_carets(&self) -> (Caret, Caret) {
        match (self.caret_key(self.anchor), self.caret_key(self.focus)) {
            (Some(anchor), Some(focus)) if focus < anchor => (self.focus, self.anchor),
            _ => (self.anchor, self.focus),
        }
    }

    /// Whether the selection covers at least part of `node`.
    pub(crate) fn selection_touches(&self, node: NodeId) -> bool {
        let (start, end) = self.ordered_carets();
        range_touches(&self.document, start, end, node)
    }

    /// Claims the affected content, defaulting to the selection endpoints.
    pub(crate) fn claim(
        &self,
        start: Option<NodeId>,
        end: Option<NodeId>,
        flags: ClaimFlags,
    ) -> Result<AffectedRegion> {
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, self.focus.node),
            (None, _) => (self.anchor.node, self.focus.node),
        };
        claim_affected_content(&self.document, start, end, flags)
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Runs `body` inside a history record. The record is always stopped,
    /// also when `body` fails. The outermost record refreshes the
    /// formatting state and announces the change.
    pub(crate) fn record<T>(
        &mut self,
        kind: RecordKind,
        name: &str,
        claim: Option<Claim>,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let region = match claim {
            Some(claim) if self.history.is_enabled() => {
                Some(self.claim(claim.start, claim.end, claim.flags)?)
            }
            _ => None,
        };
        let snapshot = self.snapshot_range(kind, region.as_ref());
        let selection = self.selection();
        self.history
            .start(&self.document, kind, name, selection, region);

        let outcome = body(self);

        // Snapshots replay by re-parsing, so the range must be in parsed form.
        if let Some(range) = snapshot {
            if let Ok(container) = self.document.resolve_from_body(&range.container) {
                let (first, remaining) = (range.first_child_index, range.remaining_sibling_count);
                self.normalize_range(container, first, remaining);
            }
        }
        self.ensure_caret_attached();
        let selection_after = self.selection();
        let stopped = self
            .history
            .stop(&self.document, kind, name, selection_after);

        if !self.history.is_recording() {
            self.update_formatting_state(Force::Maybe);
            if matches!(stopped, Ok(Closed::Committed | Closed::Suppressed)) {
                self.emit_content_changed();
            }
        }

        let value = outcome?;
        stopped?;
        Ok(value)
    }

    /// The range a record opened now will serialize, if it snapshots at all.
    fn snapshot_range(
        &self,
        kind: RecordKind,
        region: Option<&AffectedRegion>,
    ) -> Option<AffectedRegion> {
        if !self.history.is_enabled() || self.history.snapshot_pending() {
            return None;
        }
        match kind {
            RecordKind::Document => Some(AffectedRegion::whole(Path::root())),
            RecordKind::Custom | RecordKind::Event => region
                .filter(|region| region.markup.is_some())
                .map(|region| AffectedRegion {
                    markup: None,
                    ..region.clone()
                }),
            RecordKind::Group => None,
        }
    }

    /// Runs `body` with recording disabled, restoring the previous flag
    /// afterwards.
    pub(crate) fn without_history<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = self.history.set_enabled(false);
        let outcome = body(self);
        self.history.set_enabled(previous);
        outcome
    }

    pub(crate) fn record_change(&mut self, change: Change) {
        self.history.record_change(change);
    }

    /// Merges the last `count` committed records into one undo step.
    pub fn group_top_records(&mut self, count: usize, name: Option<&str>) {
        self.history.group_top_records(count, name);
    }

    // ========================================================================
    // Undo / redo
    // ========================================================================

    /// Reverts the latest committed record. Returns `false` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        let target = ReplayTarget {
            document: &mut self.document,
            mode: &mut self.mode,
        };
        let outcome = self.history.undo(target);
        self.finish_replay(outcome)
    }

    pub fn redo(&mut self) -> Result<bool> {
        let target = ReplayTarget {
            document: &mut self.document,
            mode: &mut self.mode,
        };
        let outcome = self.history.redo(target);
        self.finish_replay(outcome)
    }

    fn finish_replay(&mut self, outcome: Result<Option<Selection>>) -> Result<bool> {
        match outcome {
            Ok(Some(selection)) => {
                if self.set_selection(&selection).is_err() {
                    self.ensure_caret_attached();
                }
                self.update_formatting_state(Force::Maybe);
                self.emit_content_changed();
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                self.ensure_caret_attached();
                Err(err)
            }
        }
    }
}

/// Whether the ordered range `start..end` covers at least part of `node`.
pub(crate) fn range_touches(document: &Document, start: Caret, end: Caret, node: NodeId) -> bool {
    let (Ok(start_path), Ok(end_path), Ok(path)) = (
        document.path_from_body(start.node),
        document.path_from_body(end.node),
        document.path_from_body(node),
    ) else {
        return false;
    };
    let start_key = if document.is_text(start.node) {
        start_path
    } else {
        start_path.child(start.offset)
    };
    let end_key = if document.is_text(end.node) || end.offset == 0 {
        end_path
    } else {
        end_path.child(end.offset - 1)
    };

    let before = path < start_key && !start_key.starts_with(&path);
    let after = path > end_key && !path.starts_with(&end_key);
    !before && !after
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;



#[cfg(test)]
#[path = "editor/insert_tests.rs"]
mod insert_tests;
