use std::collections::BTreeMap;

use crate::document::{Document, NodeId, Role, attr};
use crate::error::{EditorError, Result};

use super::claim::{ClaimFlags, Traversal, Visitor, foreach_child_in_region, region_children};
use super::formatting::Force;
use super::history::{AttributeEdit, BlockRename, Change, RecordKind, Shape};
use super::reflow::quote_paragraph;
use super::{Alignment, BlockFormat, Caret, Claim, EditorSession, Mode, range_touches};

/// What a block format turns the selected blocks into: the element each
/// block becomes, plus the list wrapping them for list formats.
struct FormatTarget {
    shape: Shape,
    create_parent: Option<Shape>,
}

fn shape(role: Role) -> Shape {
    Shape {
        role,
        attributes: BTreeMap::new(),
    }
}

fn ordered_list(kind: Option<&str>) -> Shape {
    let mut list = shape(Role::OrderedList);
    if let Some(kind) = kind {
        list.attributes.insert(attr::TYPE.to_string(), kind.to_string());
    }
    list
}

impl FormatTarget {
    fn of(format: BlockFormat) -> Result<Self> {
        let (role, create_parent) = match format {
            BlockFormat::None => {
                return Err(EditorError::invalid("no block format to apply"));
            }
            BlockFormat::Paragraph => (Role::Paragraph, None),
            BlockFormat::Preformatted => (Role::Preformatted, None),
            BlockFormat::Address => (Role::Address, None),
            BlockFormat::Heading(level @ 1..=6) => (Role::Heading(level), None),
            BlockFormat::Heading(level) => {
                return Err(EditorError::invalid(format!("unknown heading level {level}")));
            }
            BlockFormat::UnorderedList => (Role::ListItem, Some(shape(Role::UnorderedList))),
            BlockFormat::OrderedList => (Role::ListItem, Some(ordered_list(None))),
            BlockFormat::OrderedListRoman => (Role::ListItem, Some(ordered_list(Some("I")))),
            BlockFormat::OrderedListAlpha => (Role::ListItem, Some(ordered_list(Some("A")))),
        };
        Ok(Self {
            shape: shape(role),
            create_parent,
        })
    }
}

fn create_shaped(document: &mut Document, shape: &Shape) -> Result<NodeId> {
    let node = document.create_element(shape.role);
    document.set_attributes(node, shape.attributes.clone())?;
    Ok(node)
}

// ============================================================================
// List surgery
// ============================================================================

/// Element children of `list` touched by the range `start..end`, and
/// whether both its first and last element child are touched.
pub(crate) fn children_in_selection(
    document: &Document,
    list: NodeId,
    start: Caret,
    end: Caret,
) -> (bool, Vec<NodeId>) {
    let items: Vec<NodeId> = document
        .children(list)
        .iter()
        .copied()
        .filter(|child| !document.is_text(*child))
        .collect();
    let (Some(first), Some(last)) = (items.first(), items.last()) else {
        return (false, Vec::new());
    };
    let all =
        range_touches(document, start, end, *first) && range_touches(document, start, end, *last);
    let affected = items
        .iter()
        .copied()
        .filter(|item| all || range_touches(document, start, end, *item))
        .collect();
    (all, affected)
}

/// Splits `list` after the last affected item and returns the node the
/// affected items should be placed in front of. `None` means the end of
/// the list's parent.
pub(crate) fn split_list(
    document: &mut Document,
    list: NodeId,
    affected: &[NodeId],
) -> Result<Option<NodeId>> {
    let from = affected.last().and_then(|last| document.next_sibling(*last));
    let Some(from) = from else {
        return Ok(document.next_sibling(list));
    };
    let index = document
        .index_in_parent(from)
        .filter(|_| document.parent(from) == Some(list))
        .ok_or_else(|| EditorError::structural("split point is not a child of the list"))?;

    let clone = document.shallow_clone(list);
    document.insert_after(list, clone)?;
    let moved: Vec<NodeId> = document.children(list)[index..].to_vec();
    for node in moved {
        document.append_child(clone, node)?;
    }
    Ok(Some(clone))
}

/// Places a list child before `before` in `parent`. A list item becomes a
/// fresh element of `shape` holding its children; anything else moves as is.
pub(crate) fn insert_list_child_before(
    document: &mut Document,
    child: NodeId,
    shape: &Shape,
    parent: NodeId,
    before: Option<NodeId>,
) -> Result<NodeId> {
    if !document.has_role(child, Role::ListItem) {
        document.insert_before(parent, child, before)?;
        return Ok(child);
    }
    let node = create_shaped(document, shape)?;
    document.move_children(child, node, None)?;
    document.insert_before(parent, node, before)?;
    document.detach(child);
    Ok(node)
}

/// Moves the children of `element` into new elements of `shape` and drops
/// `element`. New elements go into `target_list` when given, otherwise in
/// front of `element`. List items each get their own new element; other
/// children are collected into one. Returns the first new element.
fn rename_element(
    document: &mut Document,
    element: NodeId,
    shape: &Shape,
    target_list: Option<NodeId>,
    replaced: &mut Vec<(NodeId, NodeId)>,
) -> Result<NodeId> {
    let parent = document
        .parent(element)
        .ok_or_else(|| EditorError::structural("renamed element is not attached"))?;
    let prepare = |document: &mut Document| -> Result<NodeId> {
        let node = create_shaped(document, shape)?;
        match target_list {
            Some(list) => document.append_child(list, node)?,
            None => document.insert_before(parent, node, Some(element))?,
        }
        Ok(node)
    };

    let mut first: Option<NodeId> = None;
    let mut target: Option<NodeId> = None;
    let mut before: Option<NodeId> = None;

    while let Some(child) = document.first_child(element) {
        if document.has_role(child, Role::ListItem) {
            let item_target = prepare(document)?;
            if let Some(target) = target {
                document.insert_after(target, item_target)?;
            }
            first.get_or_insert(item_target);
            document.move_children(child, item_target, None)?;
            document.detach(child);
            replaced.push((child, item_target));
            continue;
        }

        let into = match target {
            Some(into) => into,
            None => {
                let mut into = prepare(document)?;
                // Loose list content is not wrapped into an item.
                if shape.role == Role::ListItem && document.is_list(element) {
                    let holder = document.parent(into).unwrap_or(parent);
                    document.detach(into);
                    if holder == parent {
                        before = Some(element);
                    }
                    into = holder;
                }
                target = Some(into);
                into
            }
        };
        first.get_or_insert(into);
        document.insert_before(into, child, before)?;
    }

    let first = match first {
        Some(first) => first,
        None => prepare(document)?,
    };
    document.detach(element);
    replaced.push((element, first));
    Ok(first)
}

// ============================================================================
// Block format
// ============================================================================

struct BlockFormatter {
    target: FormatTarget,
    first: bool,
    target_list: Option<NodeId>,
    start: Caret,
    end: Caret,
    /// Paragraph width in plain-text mode, for requoting renamed blocks.
    plain_width: Option<usize>,
    replaced: Vec<(NodeId, NodeId)>,
}

impl BlockFormatter {
    /// Turns the selected items of a partially selected list into blocks,
    /// splitting the list around them.
    fn unlist_items(
        &mut self,
        document: &mut Document,
        list: NodeId,
        affected: &[NodeId],
    ) -> Result<()> {
        let list_parent = document
            .parent(list)
            .ok_or_else(|| EditorError::structural("list is not attached"))?;
        let first_item = document
            .children(list)
            .iter()
            .copied()
            .find(|child| !document.is_text(*child));
        let before = if !affected.is_empty() && first_item != affected.first().copied() {
            split_list(document, list, affected)?
        } else {
            Some(list)
        };
        let parent = before.and_then(|before| document.parent(before)).unwrap_or(list_parent);

        for item in affected {
            let shape = &self.target.shape;
            let node = insert_list_child_before(document, *item, shape, parent, before)?;
            self.replaced.push((*item, node));
        }

        let empty = document.children(list).iter().all(|child| document.is_text(*child));
        if empty {
            document.detach(list);
        }
        Ok(())
    }
}

impl Visitor for BlockFormatter {
    fn exec(&mut self, document: &mut Document, parent: NodeId, element: NodeId) -> Result<bool> {
        if self.target.shape.role != Role::ListItem && document.is_list(element) {
            let (all, affected) = children_in_selection(document, element, self.start, self.end);
            if !all {
                self.unlist_items(document, element, &affected)?;
                return Ok(true);
            }
        }

        if self.first {
            if let Some(create_parent) = &self.target.create_parent {
                let list = create_shaped(document, create_parent)?;
                document.insert_before(parent, list, Some(element))?;
                self.target_list = Some(list);
            }
            self.first = false;
        }

        let renamed = rename_element(
            document,
            element,
            &self.target.shape,
            self.target_list,
            &mut self.replaced,
        )?;

        if let Some(width) = self.plain_width {
            let role = self.target.shape.role;
            let level = document.quote_level(renamed);
            if level > 0 && matches!(role, Role::Paragraph | Role::Preformatted) {
                let wrap =
                    (role == Role::Paragraph && level * 2 < width).then(|| width - level * 2);
                quote_paragraph(document, renamed, level, wrap)?;
            }
        }
        Ok(true)
    }
}

impl EditorSession {
    /// Changes the block role of every block touched by the selection.
    ///
    /// Plain block-to-block changes are recorded as renames. Anything
    /// involving lists, or quoted paragraphs in plain-text mode, restructures
    /// the region and is recorded as a snapshot of it.
    pub fn set_block_format(&mut self, format: BlockFormat) -> Result<()> {
        let target = FormatTarget::of(format)?;
        let region = self.claim(None, None, ClaimFlags::USE_PARENT_BLOCK_NODE)?;
        let blocks: Vec<NodeId> = region_children(&self.document, &region)?
            .into_iter()
            .filter(|node| self.document.is_block(*node))
            .collect();

        let plain = self.mode == Mode::PlainText;
        let requotes = plain
            && matches!(target.shape.role, Role::Paragraph | Role::Preformatted)
            && blocks.iter().any(|block| self.document.quote_level(*block) > 0);
        let restructures = target.shape.role == Role::ListItem
            || requotes
            || blocks.iter().any(|block| self.document.is_list(*block));

        if !restructures {
            return self.record(RecordKind::Custom, "setBlockFormat", None, |session| {
                for block in blocks {
                    let before = Shape::of(&session.document, block)?;
                    if before == target.shape {
                        continue;
                    }
                    let path = session.document.path_from_body(block)?;
                    session.document.set_role(block, target.shape.role)?;
                    session
                        .document
                        .set_attributes(block, target.shape.attributes.clone())?;
                    session.record_change(Change::Rename(BlockRename {
                        path,
                        before,
                        after: target.shape.clone(),
                    }));
                }
                Ok(())
            });
        }

        let (start, end) = self.ordered_carets();
        let mut formatter = BlockFormatter {
            target,
            first: true,
            target_list: None,
            start,
            end,
            plain_width: plain.then_some(self.config.paragraph_width),
            replaced: Vec::new(),
        };
        let flags = ClaimFlags::USE_PARENT_BLOCK_NODE | ClaimFlags::SAVE_MARKUP;
        self.record(RecordKind::Custom, "setBlockFormat", Some(Claim::selection(flags)), |session| {
            let document = &mut session.document;
            foreach_child_in_region(document, &region, Traversal::FLAT_BLOCKS, &mut formatter)?;
            for (old, new) in &formatter.replaced {
                session.remap_carets(*old, *new);
            }
            Ok(())
        })
    }

    // ========================================================================
    // Alignment and attributes
    // ========================================================================

    /// Sets `text-align` on every block touched by the selection. The
    /// direction's natural alignment is written by clearing the attribute.
    pub fn set_alignment(&mut self, alignment: Alignment) -> Result<()> {
        let region = self.claim(None, None, ClaimFlags::USE_PARENT_BLOCK_NODE)?;
        let wanted = alignment.css_value();

        self.record(RecordKind::Custom, "setAlignment", None, |session| {
            let mut changes = Vec::new();
            let mut visitor = |document: &mut Document, _: NodeId, block: NodeId| -> Result<bool> {
                let effective = document
                    .ancestors(block)
                    .fold(document.attribute(block, attr::TEXT_ALIGN), |found, ancestor| {
                        found.or_else(|| document.attribute(ancestor, attr::TEXT_ALIGN))
                    })
                    .unwrap_or("start")
                    .to_string();
                if effective == wanted {
                    return Ok(true);
                }

                let rtl = document.is_rtl(block);
                let natural = (wanted == "left" && !rtl) || (wanted == "right" && rtl);
                let after = (!natural && !wanted.is_empty()).then(|| wanted.to_string());
                let before = document.attribute(block, attr::TEXT_ALIGN).map(str::to_string);
                if before != after {
                    document.set_or_remove_attribute(block, attr::TEXT_ALIGN, after.as_deref())?;
                    changes.push(AttributeEdit {
                        path: document.path_from_body(block)?,
                        name: attr::TEXT_ALIGN.to_string(),
                        before,
                        after,
                    });
                }
                Ok(true)
            };
            let document = &mut session.document;
            foreach_child_in_region(document, &region, Traversal::DEEP_BLOCKS, &mut visitor)?;
            for change in changes {
                session.record_change(Change::Attribute(change));
            }
            Ok(())
        })
    }

    /// Sets the font family of every block touched by the selection. An
    /// empty or missing name removes it, so the blocks inherit the body font.
    pub fn set_font_name(&mut self, name: Option<&str>) -> Result<()> {
        let region = self.claim(None, None, ClaimFlags::USE_PARENT_BLOCK_NODE)?;
        let value = name.filter(|name| !name.is_empty()).map(str::to_string);

        self.record(RecordKind::Custom, "SetFontName", None, |session| {
            let mut changes = Vec::new();
            let mut visitor = |document: &mut Document, _: NodeId, block: NodeId| -> Result<bool> {
                let before = document.attribute(block, attr::FONT_FAMILY).map(str::to_string);
                if before != value {
                    document.set_or_remove_attribute(block, attr::FONT_FAMILY, value.as_deref())?;
                    changes.push(AttributeEdit {
                        path: document.path_from_body(block)?,
                        name: attr::FONT_FAMILY.to_string(),
                        before,
                        after: value.clone(),
                    });
                }
                Ok(true)
            };
            let document = &mut session.document;
            foreach_child_in_region(document, &region, Traversal::DEEP_BLOCKS, &mut visitor)?;
            for change in changes {
                session.record_change(Change::Attribute(change));
            }
            Ok(())
        })?;
        self.update_formatting_state(Force::Yes);
        Ok(())
    }

    /// Sets or removes one attribute as its own undo step, named
    /// `<prefix>::<name>`. Returns `false` without recording when the value
    /// does not change.
    pub fn set_attribute_with_undo(
        &mut self,
        prefix: &str,
        node: NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<bool> {
        let before = self.document.attribute(node, name).map(str::to_string);
        if before.as_deref() == value {
            return Ok(false);
        }
        let path = self.document.path_from_body(node)?;
        let record_name = format!("{prefix}::{name}");
        self.record(RecordKind::Custom, &record_name, None, |session| {
            session.document.set_or_remove_attribute(node, name, value)?;
            session.record_change(Change::Attribute(AttributeEdit {
                path,
                name: name.to_string(),
                before,
                after: value.map(str::to_string),
            }));
            Ok(())
        })?;
        Ok(true)
    }

    pub fn set_body_attribute(&mut self, name: &str, value: Option<&str>) -> Result<bool> {
        let body = self.document.body();
        self.set_attribute_with_undo("SetBodyAttribute", body, name, value)
    }

    /// Sets the document-wide font family. An empty or missing name removes it.
    pub fn set_body_font_name(&mut self, name: Option<&str>) -> Result<()> {
        let body = self.document.body();
        let value = name.filter(|name| !name.is_empty());
        self.record(RecordKind::Custom, "setBodyFontName", None, |session| {
            let before = session.document.attribute(body, attr::FONT_FAMILY).map(str::to_string);
            if before.as_deref() == value {
                session.history.ignore_current();
                return Ok(());
            }
            session.document.set_or_remove_attribute(body, attr::FONT_FAMILY, value)?;
            session.record_change(Change::Attribute(AttributeEdit {
                path: session.document.path_from_body(body)?,
                name: attr::FONT_FAMILY.to_string(),
                before,
                after: value.map(str::to_string),
            }));
            Ok(())
        })?;
        self.update_formatting_state(Force::Yes);
        Ok(())
    }
}
