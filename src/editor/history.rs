use std::collections::BTreeMap;
use std::mem;

use crate::document::{Document, NodeId, Path, Role};
use crate::error::{EditorError, Result};

use super::claim::AffectedRegion;
use super::{Mode, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A user input event, such as typing. Consecutive events coalesce.
    Event,
    /// An editing command.
    Custom,
    /// A container whose children are undone as one step.
    Group,
    /// A whole-document change, such as a mode switch.
    Document,
}

/// Role and attributes of an element, without its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub role: Role,
    pub attributes: BTreeMap<String, String>,
}

impl Shape {
    pub fn of(document: &Document, node: NodeId) -> Result<Shape> {
        let element = document
            .element(node)
            .ok_or_else(|| EditorError::structural("text nodes have no shape"))?;
        Ok(Shape {
            role: element.role,
            attributes: element.attributes.clone(),
        })
    }

    fn apply_to(&self, document: &mut Document, node: NodeId) -> Result<()> {
        document.set_role(node, self.role)?;
        document.set_attributes(node, self.attributes.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEdit {
    pub path: Path,
    pub name: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRename {
    pub path: Path,
    pub before: Shape,
    pub after: Shape,
}

/// Serialized children of a sibling range, before and after an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSnapshot {
    pub container: Path,
    pub first_index: usize,
    /// Children after the range, which the edit did not touch.
    pub remaining: usize,
    pub before: String,
    pub after: String,
}

impl RangeSnapshot {
    /// Serializes the current range of `region`.
    pub(crate) fn capture(document: &Document, region: &AffectedRegion) -> Result<String> {
        let container = document.resolve_from_body(&region.container)?;
        let end = region.end_index(document.child_count(container));
        if end < region.first_child_index {
            return Err(EditorError::not_found(
                &region.container.child(region.first_child_index),
            ));
        }
        Ok(document.children_markup(container, region.first_child_index, end))
    }

    fn restore(&self, document: &mut Document, markup: &str) -> Result<()> {
        let container = document.resolve_from_body(&self.container)?;
        let count = document.child_count(container);
        let end = count
            .checked_sub(self.remaining)
            .filter(|end| *end >= self.first_index)
            .ok_or_else(|| EditorError::not_found(&self.container.child(self.first_index)))?;

        let stale = document.children(container)[self.first_index..end].to_vec();
        for node in &stale {
            document.detach(*node);
        }
        let nodes = document.parse_fragment_for(container, markup)?;
        let before = document.child(container, self.first_index);
        for node in nodes {
            document.insert_before(container, node, before)?;
        }
        for node in stale {
            document.release(node);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSwitch {
    pub before: Mode,
    pub after: Mode,
}

/// One reversible edit. Every variant re-resolves its target through paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Attribute(AttributeEdit),
    Rename(BlockRename),
    ListRestructure(RangeSnapshot),
    Markup(RangeSnapshot),
    Mode(ModeSwitch),
}

impl Change {
    fn apply(&self, target: &mut ReplayTarget<'_>, undo: bool) -> Result<()> {
        match self {
            Change::Attribute(edit) => {
                let node = target.document.resolve_from_body(&edit.path)?;
                let value = if undo { &edit.before } else { &edit.after };
                target
                    .document
                    .set_or_remove_attribute(node, &edit.name, value.as_deref())
            }
            Change::Rename(rename) => {
                let node = target.document.resolve_from_body(&rename.path)?;
                let shape = if undo { &rename.before } else { &rename.after };
                shape.apply_to(target.document, node)
            }
            Change::ListRestructure(snapshot) | Change::Markup(snapshot) => {
                let markup = if undo { &snapshot.before } else { &snapshot.after };
                snapshot.restore(target.document, markup)
            }
            Change::Mode(switch) => {
                *target.mode = if undo { switch.before } else { switch.after };
                Ok(())
            }
        }
    }
}

/// What undo and redo write to.
pub struct ReplayTarget<'a> {
    pub document: &'a mut Document,
    pub mode: &'a mut Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Change(Change),
    Nested(Record),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    kind: RecordKind,
    name: String,
    steps: Vec<Step>,
    selection_before: Selection,
    selection_after: Selection,
    region: Option<AffectedRegion>,
    ignore: bool,
    depth: usize,
}

impl Record {
    fn new(kind: RecordKind, name: &str, selection: Selection, depth: usize) -> Self {
        Self {
            kind,
            name: name.to_string(),
            steps: Vec::new(),
            selection_after: selection.clone(),
            selection_before: selection,
            region: None,
            ignore: false,
            depth,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn selection_before(&self) -> &Selection {
        &self.selection_before
    }

    pub fn selection_after(&self) -> &Selection {
        &self.selection_after
    }

    /// Changes recorded directly in this record, in application order.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.steps.iter().filter_map(|step| match step {
            Step::Change(change) => Some(change),
            Step::Nested(_) => None,
        })
    }

    /// Child records, in application order.
    pub fn nested(&self) -> impl Iterator<Item = &Record> {
        self.steps.iter().filter_map(|step| match step {
            Step::Nested(record) => Some(record),
            Step::Change(_) => None,
        })
    }

    fn has_snapshot(&self) -> bool {
        self.region
            .as_ref()
            .is_some_and(|region| region.markup.is_some())
    }

    /// Undo runs the steps backwards, redo forwards.
    pub fn apply(&self, target: &mut ReplayTarget<'_>, undo: bool) -> Result<()> {
        if undo {
            for step in self.steps.iter().rev() {
                step.apply(target, true)?;
            }
        } else {
            for step in &self.steps {
                step.apply(target, false)?;
            }
        }
        Ok(())
    }

    /// Turns the markup captured at start into a range change. Individual
    /// changes are covered by the snapshot, so only mode switches survive.
    fn finish_snapshot(&mut self, document: &Document) -> Result<()> {
        let Some(region) = self.region.as_ref() else {
            return Ok(());
        };
        let Some(before) = region.markup.as_ref() else {
            return Ok(());
        };
        let after = RangeSnapshot::capture(document, region)?;
        let snapshot = RangeSnapshot {
            container: region.container.clone(),
            first_index: region.first_child_index,
            remaining: region.remaining_sibling_count,
            before: before.clone(),
            after,
        };

        self.steps
            .retain(|step| matches!(step, Step::Change(Change::Mode(_))));
        if snapshot.before != snapshot.after {
            self.steps.insert(0, Step::Change(Change::Markup(snapshot)));
        }
        Ok(())
    }

    /// Folds `next` into `self` when both are the same kind of input event
    /// over the same range and `next` starts where `self` ended.
    fn try_coalesce(&mut self, next: &Record) -> bool {
        let both_events = self.kind == RecordKind::Event && next.kind == RecordKind::Event;
        if !both_events || self.name != next.name {
            return false;
        }
        let same_range = match (&self.region, &next.region) {
            (Some(left), Some(right)) => left.same_range(right),
            _ => false,
        };
        if !same_range {
            return false;
        }
        let (
            [Step::Change(Change::Markup(previous))],
            [Step::Change(Change::Markup(following))],
        ) = (self.steps.as_mut_slice(), next.steps.as_slice())
        else {
            return false;
        };
        if previous.after != following.before {
            return false;
        }
        previous.after = following.after.clone();
        self.selection_after = next.selection_after.clone();
        true
    }
}

impl Step {
    fn apply(&self, target: &mut ReplayTarget<'_>, undo: bool) -> Result<()> {
        match self {
            Step::Change(change) => change.apply(target, undo),
            Step::Nested(record) => record.apply(target, undo),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OpenRecord {
    Active(Record),
    /// Opened while recording was disabled; only checked for balance.
    Suppressed { kind: RecordKind, name: String },
}

/// How a record left the open stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    Committed,
    Nested,
    Discarded,
    Suppressed,
}

/// Undo/redo log with nested open records.
#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<Record>,
    redo: Vec<Record>,
    open: Vec<OpenRecord>,
    enabled: bool,
    max_levels: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(0)
    }
}

impl History {
    pub fn new(max_levels: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            open: Vec::new(),
            enabled: true,
            max_levels,
        }
    }

    /// Changes the undo cap, dropping the oldest records beyond it. Zero
    /// means unlimited.
    pub fn set_max_levels(&mut self, max_levels: usize) {
        self.max_levels = max_levels;
        self.trim();
    }

    fn trim(&mut self) {
        if self.max_levels > 0 && self.undo.len() > self.max_levels {
            let excess = self.undo.len() - self.max_levels;
            self.undo.drain(..excess);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the recording flag and returns the previous value.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        mem::replace(&mut self.enabled, enabled)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn last_record(&self) -> Option<&Record> {
        self.undo.last()
    }

    pub fn is_recording(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Whether an open record already snapshots everything nested in it.
    pub(crate) fn snapshot_pending(&self) -> bool {
        self.open.iter().any(|open| match open {
            OpenRecord::Active(record) => record.has_snapshot(),
            OpenRecord::Suppressed { .. } => false,
        })
    }

    fn innermost_active(&mut self) -> Option<&mut Record> {
        match self.open.last_mut()? {
            OpenRecord::Active(record) => Some(record),
            OpenRecord::Suppressed { .. } => None,
        }
    }

    /// Opens a record. `region` is the claimed range for `Custom` and
    /// `Event` records; `Document` records snapshot the whole body.
    pub fn start(
        &mut self,
        document: &Document,
        kind: RecordKind,
        name: &str,
        selection: Selection,
        region: Option<AffectedRegion>,
    ) {
        if !self.enabled {
            tracing::trace!(name, "recording disabled, record suppressed");
            self.open.push(OpenRecord::Suppressed {
                kind,
                name: name.to_string(),
            });
            return;
        }

        let covered = self.snapshot_pending();
        let mut record = Record::new(kind, name, selection, self.open.len());
        record.region = match kind {
            RecordKind::Group => None,
            RecordKind::Document => Some(AffectedRegion {
                markup: (!covered).then(|| document.inner_markup(document.body())),
                ..AffectedRegion::whole(Path::root())
            }),
            RecordKind::Custom | RecordKind::Event => region.map(|mut region| {
                if covered {
                    region.markup = None;
                }
                region
            }),
        };
        tracing::trace!(name, ?kind, depth = record.depth, "record started");
        self.open.push(OpenRecord::Active(record));
    }

    /// Closes the innermost open record, which must match `kind` and `name`.
    pub fn stop(
        &mut self,
        document: &Document,
        kind: RecordKind,
        name: &str,
        selection_after: Selection,
    ) -> Result<Closed> {
        let Some(open) = self.open.pop() else {
            return Err(EditorError::UnbalancedRecord {
                expected: name.to_string(),
                found: "nothing".to_string(),
            });
        };

        let mut record = match open {
            OpenRecord::Suppressed {
                kind: open_kind,
                name: open_name,
            } => {
                if open_kind != kind || open_name != name {
                    let found = open_name.clone();
                    self.open.push(OpenRecord::Suppressed {
                        kind: open_kind,
                        name: open_name,
                    });
                    return Err(EditorError::UnbalancedRecord {
                        expected: name.to_string(),
                        found,
                    });
                }
                return Ok(Closed::Suppressed);
            }
            OpenRecord::Active(record) => {
                if record.kind != kind || record.name != name {
                    let found = record.name.clone();
                    self.open.push(OpenRecord::Active(record));
                    return Err(EditorError::UnbalancedRecord {
                        expected: name.to_string(),
                        found,
                    });
                }
                record
            }
        };

        record.selection_after = selection_after;
        record.finish_snapshot(document)?;

        if record.ignore || (record.steps.is_empty() && record.kind != RecordKind::Group) {
            tracing::trace!(name, "record discarded");
            return Ok(Closed::Discarded);
        }
        if self.snapshot_pending() {
            tracing::trace!(name, "record covered by an enclosing snapshot");
            return Ok(Closed::Discarded);
        }

        if self.open.is_empty() {
            self.commit(record);
            return Ok(Closed::Committed);
        }
        match self.innermost_active() {
            Some(parent) => {
                parent.steps.push(Step::Nested(record));
                Ok(Closed::Nested)
            }
            None => Ok(Closed::Discarded),
        }
    }

    fn commit(&mut self, record: Record) {
        let redo_was_empty = self.redo.is_empty();
        self.redo.clear();

        if redo_was_empty {
            if let Some(previous) = self.undo.last_mut() {
                if previous.try_coalesce(&record) {
                    tracing::trace!(name = %record.name, "coalesced with previous record");
                    return;
                }
            }
        }

        tracing::debug!(name = %record.name, kind = ?record.kind, "record committed");
        self.undo.push(record);
        self.trim();
    }

    /// Adds a change to the innermost open record. Ignored while disabled.
    pub fn record_change(&mut self, change: Change) {
        if !self.enabled {
            return;
        }
        match self.innermost_active() {
            Some(record) => record.steps.push(Step::Change(change)),
            None => tracing::warn!(?change, "change recorded outside of an open record"),
        }
    }

    /// Marks the innermost open record so it is dropped when it stops.
    pub fn ignore_current(&mut self) {
        if let Some(record) = self.innermost_active() {
            record.ignore = true;
        }
    }

    /// Merges the last `count` committed records into one group, so they
    /// undo and redo as a single step.
    pub fn group_top_records(&mut self, count: usize, name: Option<&str>) {
        let count = count.min(self.undo.len());
        if count < 2 {
            return;
        }
        let records = self.undo.split_off(self.undo.len() - count);
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return;
        };
        let mut group = Record::new(
            RecordKind::Group,
            name.unwrap_or(&first.name),
            first.selection_before.clone(),
            0,
        );
        group.selection_after = last.selection_after.clone();
        group.steps = records.into_iter().map(Step::Nested).collect();
        tracing::debug!(name = %group.name, count, "grouped top records");
        self.undo.push(group);
    }

    /// Reverts the latest committed record and returns the selection to
    /// restore. A replay failure clears the history.
    pub fn undo(&mut self, target: ReplayTarget<'_>) -> Result<Option<Selection>> {
        self.replay(target, true)
    }

    pub fn redo(&mut self, target: ReplayTarget<'_>) -> Result<Option<Selection>> {
        self.replay(target, false)
    }

    fn replay(&mut self, mut target: ReplayTarget<'_>, undo: bool) -> Result<Option<Selection>> {
        if self.is_recording() {
            return Err(EditorError::invalid(
                "cannot replay history while a record is open",
            ));
        }
        let popped = if undo { self.undo.pop() } else { self.redo.pop() };
        let Some(record) = popped else {
            return Ok(None);
        };

        let previous = self.set_enabled(false);
        let outcome = record.apply(&mut target, undo);
        self.set_enabled(previous);

        match outcome {
            Ok(()) => {
                tracing::debug!(name = %record.name, undo, "replayed record");
                let selection = if undo {
                    record.selection_before.clone()
                } else {
                    record.selection_after.clone()
                };
                if undo {
                    self.redo.push(record);
                } else {
                    self.undo.push(record);
                }
                Ok(Some(selection))
            }
            Err(err) => {
                tracing::error!(
                    name = %record.name,
                    undo,
                    error = %err,
                    "history replay failed, history cleared"
                );
                self.clear();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(path: Vec<usize>, name: &str, before: Option<&str>, after: Option<&str>) -> Change {
        Change::Attribute(AttributeEdit {
            path: Path::new(path),
            name: name.to_string(),
            before: before.map(str::to_string),
            after: after.map(str::to_string),
        })
    }

    fn set(document: &mut Document, history: &mut History, value: &str) {
        let node = document.first_child(document.body()).unwrap();
        let before = document.attribute(node, "data-x").map(str::to_string);
        document.set_attribute(node, "data-x", value).unwrap();
        history.start(document, RecordKind::Custom, "set", Selection::default(), None);
        history.record_change(edit(vec![0], "data-x", before.as_deref(), Some(value)));
        history.stop(document, RecordKind::Custom, "set", Selection::default()).unwrap();
    }

    fn value(document: &Document) -> Option<String> {
        let node = document.first_child(document.body()).unwrap();
        document.attribute(node, "data-x").map(str::to_string)
    }

    fn target<'a>(document: &'a mut Document, mode: &'a mut Mode) -> ReplayTarget<'a> {
        ReplayTarget { document, mode }
    }

    #[test]
    fn group_undoes_children_in_reverse_order() {
        let mut document = Document::from_markup("<div data-x=\"x\">a</div>").unwrap();
        let mut history = History::default();
        let mut mode = Mode::Html;

        history.start(&document, RecordKind::Group, "group", Selection::default(), None);
        for value in ["1", "2", "3"] {
            set(&mut document, &mut history, value);
        }
        let closed = history
            .stop(&document, RecordKind::Group, "group", Selection::default())
            .unwrap();
        assert_eq!(closed, Closed::Committed);
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.last_record().unwrap().nested().count(), 3);

        history.undo(target(&mut document, &mut mode)).unwrap();
        assert_eq!(value(&document).as_deref(), Some("x"));
        history.redo(target(&mut document, &mut mode)).unwrap();
        assert_eq!(value(&document).as_deref(), Some("3"));
    }

    #[test]
    fn empty_records_are_discarded_but_groups_kept() {
        let document = Document::new();
        let mut history = History::default();
        history.start(&document, RecordKind::Custom, "noop", Selection::default(), None);
        let closed = history
            .stop(&document, RecordKind::Custom, "noop", Selection::default())
            .unwrap();
        assert_eq!(closed, Closed::Discarded);

        history.start(&document, RecordKind::Group, "group", Selection::default(), None);
        history
            .stop(&document, RecordKind::Group, "group", Selection::default())
            .unwrap();
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn mismatched_stop_is_reported() {
        let document = Document::new();
        let mut history = History::default();
        history.start(&document, RecordKind::Custom, "outer", Selection::default(), None);
        let err = history
            .stop(&document, RecordKind::Custom, "inner", Selection::default())
            .unwrap_err();
        assert!(matches!(err, EditorError::UnbalancedRecord { .. }));
        assert!(history.is_recording());
    }

    #[test]
    fn disabled_history_records_nothing() {
        let mut document = Document::from_markup("<div>a</div>").unwrap();
        let mut history = History::default();
        history.set_enabled(false);
        set(&mut document, &mut history, "1");
        assert!(!history.can_undo());
    }

    #[test]
    fn new_commit_drops_redo_tail() {
        let mut document = Document::from_markup("<div>a</div>").unwrap();
        let mut history = History::default();
        let mut mode = Mode::Html;
        set(&mut document, &mut history, "1");
        set(&mut document, &mut history, "2");
        history.undo(target(&mut document, &mut mode)).unwrap();
        assert!(history.can_redo());
        set(&mut document, &mut history, "3");
        assert!(!history.can_redo());
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn undo_levels_are_capped() {
        let mut document = Document::from_markup("<div>a</div>").unwrap();
        let mut history = History::new(2);
        for value in ["1", "2", "3"] {
            set(&mut document, &mut history, value);
        }
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn lowering_the_cap_drops_oldest_records() {
        let mut document = Document::from_markup("<div>a</div>").unwrap();
        let mut history = History::default();
        let mut mode = Mode::Html;
        for value in ["1", "2", "3", "4"] {
            set(&mut document, &mut history, value);
        }
        history.set_max_levels(2);
        assert_eq!(history.undo_depth(), 2);
        history.undo(target(&mut document, &mut mode)).unwrap();
        history.undo(target(&mut document, &mut mode)).unwrap();
        assert_eq!(value(&document).as_deref(), Some("2"));
        assert!(!history.can_undo());
    }

    #[test]
    fn grouping_top_records_makes_one_step() {
        let mut document = Document::from_markup("<div data-x=\"x\">a</div>").unwrap();
        let mut history = History::default();
        let mut mode = Mode::Html;
        set(&mut document, &mut history, "1");
        set(&mut document, &mut history, "2");
        history.group_top_records(2, Some("both"));
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.last_record().unwrap().name(), "both");
        history.undo(target(&mut document, &mut mode)).unwrap();
        assert_eq!(value(&document).as_deref(), Some("x"));
    }

    #[test]
    fn snapshot_record_restores_claimed_range() {
        let mut document = Document::from_markup("<div>a</div><div>b</div><div>c</div>").unwrap();
        let mut history = History::default();
        let mut mode = Mode::Html;
        let region = AffectedRegion {
            container: Path::root(),
            first_child_index: 1,
            remaining_sibling_count: 1,
            markup: Some("<div>b</div>".to_string()),
        };
        history.start(&document, RecordKind::Custom, "edit", Selection::default(), Some(region));
        let middle = document.child(document.body(), 1).unwrap();
        let extra = document.create_element(Role::Paragraph);
        document.insert_after(middle, extra).unwrap();
        history
            .stop(&document, RecordKind::Custom, "edit", Selection::default())
            .unwrap();

        let edited = document.inner_markup(document.body());
        history.undo(target(&mut document, &mut mode)).unwrap();
        assert_eq!(
            document.inner_markup(document.body()),
            "<div>a</div><div>b</div><div>c</div>"
        );
        history.redo(target(&mut document, &mut mode)).unwrap();
        assert_eq!(document.inner_markup(document.body()), edited);
    }

    #[test]
    fn failed_replay_clears_history() {
        let mut document = Document::from_markup("<div>a</div>").unwrap();
        let mut history = History::default();
        let mut mode = Mode::Html;
        set(&mut document, &mut history, "1");
        set(&mut document, &mut history, "2");
        let paragraph = document.first_child(document.body()).unwrap();
        document.remove(paragraph, false).unwrap();

        let err = history.undo(target(&mut document, &mut mode)).unwrap_err();
        assert!(matches!(err, EditorError::NotFound { .. }));
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn mode_changes_replay() {
        let document = Document::new();
        let mut replayed = document.clone();
        let mut history = History::default();
        let mut mode = Mode::PlainText;
        history.start(&document, RecordKind::Document, "mode", Selection::default(), None);
        history.record_change(Change::Mode(ModeSwitch {
            before: Mode::Html,
            after: Mode::PlainText,
        }));
        history
            .stop(&document, RecordKind::Document, "mode", Selection::default())
            .unwrap();
        history.undo(target(&mut replayed, &mut mode)).unwrap();
        assert_eq!(mode, Mode::Html);
    }
}
