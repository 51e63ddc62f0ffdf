use std::collections::BTreeMap;

use crate::config::TEXT_INDENT_SIZE;
use crate::document::{Document, NodeId, Role, attr};
use crate::error::{EditorError, Result};

use super::block_format::{children_in_selection, insert_list_child_before, split_list};
use super::claim::{ClaimFlags, Traversal, Visitor, foreach_child_in_region};
use super::history::{AttributeEdit, Change, RangeSnapshot, RecordKind, Shape};
use super::{Caret, EditorSession};

/// Serializes child `index` of `container` as the start of a list change.
fn begin_snapshot(document: &Document, container: NodeId, index: usize) -> Result<RangeSnapshot> {
    let count = document.child_count(container);
    Ok(RangeSnapshot {
        container: document.path_from_body(container)?,
        first_index: index,
        remaining: count.saturating_sub(index + 1),
        before: document.children_markup(container, index, index + 1),
        after: String::new(),
    })
}

fn finish_snapshot(document: &Document, mut snapshot: RangeSnapshot) -> Result<Change> {
    let container = document.resolve_from_body(&snapshot.container)?;
    let end = document
        .child_count(container)
        .saturating_sub(snapshot.remaining)
        .max(snapshot.first_index);
    snapshot.after = document.children_markup(container, snapshot.first_index, end);
    Ok(Change::ListRestructure(snapshot))
}

fn first_element_child(document: &Document, node: NodeId) -> Option<NodeId> {
    document
        .children(node)
        .iter()
        .copied()
        .find(|child| !document.is_text(*child))
}

fn last_element_child(document: &Document, node: NodeId) -> Option<NodeId> {
    document
        .children(node)
        .iter()
        .rev()
        .copied()
        .find(|child| !document.is_text(*child))
}

fn has_element_children(document: &Document, node: NodeId) -> bool {
    first_element_child(document, node).is_some()
}

fn index_of(document: &Document, node: NodeId) -> Result<usize> {
    document
        .index_in_parent(node)
        .ok_or_else(|| EditorError::structural("indented node is not attached"))
}

fn parent_of(document: &Document, node: NodeId) -> Result<NodeId> {
    document
        .parent(node)
        .ok_or_else(|| EditorError::structural("indented node is not attached"))
}

struct Indenter {
    increment: bool,
    start: Caret,
    end: Caret,
    changes: Vec<Change>,
    /// Items that replaced or outlived a removed node, for caret fixups.
    replaced: Vec<(NodeId, NodeId)>,
}

impl Indenter {
    fn indent_list(&mut self, document: &mut Document, list: NodeId) -> Result<()> {
        let (all, affected) = children_in_selection(document, list, self.start, self.end);

        if self.increment {
            let clone = document.shallow_clone(list);
            if all {
                let parent = parent_of(document, list)?;
                let snapshot = begin_snapshot(document, parent, index_of(document, list)?)?;
                document.insert_before(parent, clone, Some(list))?;
                document.append_child(clone, list)?;
                self.changes.push(finish_snapshot(document, snapshot)?);
            } else if let (Some(first), Some(last)) = (affected.first(), affected.last()) {
                let first_index = index_of(document, *first)?;
                let last_index = index_of(document, *last)?;
                let count = document.child_count(list);
                let snapshot = RangeSnapshot {
                    container: document.path_from_body(list)?,
                    first_index,
                    remaining: count.saturating_sub(last_index + 1),
                    before: document.children_markup(list, first_index, last_index + 1),
                    after: String::new(),
                };
                document.insert_before(list, clone, Some(*first))?;
                for item in &affected {
                    document.append_child(clone, *item)?;
                }
                self.changes.push(finish_snapshot(document, snapshot)?);
            }
            return Ok(());
        }

        let parent = parent_of(document, list)?;
        let nested = document.is_list(parent);
        let same_kind = nested
            && document.role(parent) == document.role(list)
            && document.attribute(parent, attr::TYPE) == document.attribute(list, attr::TYPE);

        if same_kind {
            // Items move up into the enclosing list of the same kind.
            let snapshot = begin_snapshot(document, parent, index_of(document, list)?)?;
            let partial = !all && !affected.is_empty();
            let at_start = affected.first().copied() == first_element_child(document, list);
            let before = if partial && !at_start {
                split_list(document, list, &affected)?
            } else {
                Some(list)
            };
            let container = before.and_then(|before| document.parent(before)).unwrap_or(parent);
            for item in &affected {
                document.insert_before(container, *item, before)?;
            }
            if !has_element_children(document, list) {
                document.detach(list);
                if let Some(first) = affected.first() {
                    self.replaced.push((list, *first));
                }
            }
            self.changes.push(finish_snapshot(document, snapshot)?);
            return Ok(());
        }

        let (outer, container) = if nested {
            (parent, parent_of(document, parent)?)
        } else {
            (list, parent)
        };
        let snapshot = begin_snapshot(document, container, index_of(document, outer)?)?;

        let before = if nested {
            let before = split_list(document, list, &affected)?;
            let clone = document.shallow_clone(list);
            let holder = before.and_then(|before| document.parent(before)).unwrap_or(container);
            document.insert_before(holder, clone, before)?;
            for item in &affected {
                document.append_child(clone, *item)?;
            }
            before
        } else {
            let partial = !all && !affected.is_empty();
            let at_end = affected.last().copied() == last_element_child(document, list);
            let at_start = affected.first().copied() == first_element_child(document, list);
            let before = if partial && at_end {
                document.next_sibling(list)
            } else if partial && !at_start {
                split_list(document, list, &affected)?
            } else {
                Some(list)
            };
            let holder = before.and_then(|before| document.parent(before)).unwrap_or(container);
            let paragraph = Shape {
                role: Role::Paragraph,
                attributes: BTreeMap::new(),
            };
            for item in &affected {
                let node = insert_list_child_before(document, *item, &paragraph, holder, before)?;
                self.replaced.push((*item, node));
            }
            before
        };

        // Lists left without items go away, up to the container.
        let mut current = Some(list);
        while let Some(node) = current {
            if node == container || has_element_children(document, node) {
                break;
            }
            current = document.parent(node);
            let fallback = match before {
                Some(before) => document.previous_sibling(before),
                None => last_element_child(document, container),
            };
            document.detach(node);
            if let Some(fallback) = fallback.filter(|fallback| *fallback != node) {
                self.replaced.push((node, fallback));
            }
        }

        self.changes.push(finish_snapshot(document, snapshot)?);
        Ok(())
    }

    /// Moves the start margin by one indent step, giving the width back or
    /// taking it away so the right edge stays put.
    fn indent_block(&mut self, document: &mut Document, element: NodeId) -> Result<()> {
        let side = if document.is_rtl(element) {
            attr::MARGIN_RIGHT
        } else {
            attr::MARGIN_LEFT
        };
        let margin = document.char_length_attribute(element, side).unwrap_or(0);
        let mut width = document.char_length_attribute(element, attr::WIDTH).unwrap_or(0);

        let margin = if self.increment {
            if width > 0 && width - TEXT_INDENT_SIZE > 0 {
                width -= TEXT_INDENT_SIZE;
            }
            Some(margin + TEXT_INDENT_SIZE)
        } else if margin > TEXT_INDENT_SIZE {
            if width > 0 {
                width += TEXT_INDENT_SIZE;
            }
            Some(margin - TEXT_INDENT_SIZE)
        } else {
            if width > 0 {
                width += margin;
            }
            None
        };

        let mut edits = vec![(side, margin.map(|margin| format!("{margin}ch")))];
        if width > 0 {
            edits.push((attr::WIDTH, Some(format!("{width}ch"))));
        }
        for (name, after) in edits {
            let before = document.attribute(element, name).map(str::to_string);
            if before == after {
                continue;
            }
            document.set_or_remove_attribute(element, name, after.as_deref())?;
            self.changes.push(Change::Attribute(AttributeEdit {
                path: document.path_from_body(element)?,
                name: name.to_string(),
                before,
                after,
            }));
        }
        Ok(())
    }
}

impl Visitor for Indenter {
    fn exec(&mut self, document: &mut Document, _parent: NodeId, element: NodeId) -> Result<bool> {
        if document.is_list(element) {
            self.indent_list(document, element)?;
        } else {
            self.indent_block(document, element)?;
        }
        Ok(true)
    }
}

impl EditorSession {
    /// Indents (`delta > 0`) or outdents (`delta < 0`) the blocks touched by
    /// the selection. Lists nest or unnest their selected items; other
    /// blocks shift their start margin.
    pub fn indent(&mut self, delta: i32) -> Result<()> {
        if delta == 0 {
            return Err(EditorError::invalid("indent delta must not be zero"));
        }
        let region = self.claim(None, None, ClaimFlags::USE_PARENT_BLOCK_NODE)?;
        let (start, end) = self.ordered_carets();
        let mut indenter = Indenter {
            increment: delta > 0,
            start,
            end,
            changes: Vec::new(),
            replaced: Vec::new(),
        };
        let name = if delta > 0 { "Indent" } else { "Outdent" };

        self.record(RecordKind::Custom, name, None, |session| {
            let outcome = foreach_child_in_region(
                &mut session.document,
                &region,
                Traversal::FLAT_BLOCKS,
                &mut indenter,
            );
            for change in indenter.changes.drain(..) {
                session.record_change(change);
            }
            for (old, new) in &indenter.replaced {
                session.remap_carets(*old, *new);
            }
            outcome.map(|_| ())
        })
    }
}
