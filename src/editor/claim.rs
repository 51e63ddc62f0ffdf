use bitflags::bitflags;

use crate::document::{Document, NodeId, Path, Role};
use crate::error::{EditorError, Result};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClaimFlags: u8 {
        /// Start from the block element enclosing the start node.
        const USE_PARENT_BLOCK_NODE = 1 << 0;
        /// Serialize the claimed range before the operation mutates it.
        const SAVE_MARKUP = 1 << 1;
    }
}

/// The sibling range an operation may read and mutate.
///
/// The range is stored as a container path plus the number of children
/// before and after it, so it can be recovered after the operation grew or
/// shrank the range itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedRegion {
    pub container: Path,
    pub first_child_index: usize,
    pub remaining_sibling_count: usize,
    pub markup: Option<String>,
}

impl AffectedRegion {
    /// The region covering every child of `container`.
    pub fn whole(container: Path) -> Self {
        Self {
            container,
            first_child_index: 0,
            remaining_sibling_count: 0,
            markup: None,
        }
    }

    /// Exclusive end of the range inside a container of `child_count` children.
    pub fn end_index(&self, child_count: usize) -> usize {
        child_count.saturating_sub(self.remaining_sibling_count)
    }

    /// Same range, ignoring any captured markup.
    pub fn same_range(&self, other: &AffectedRegion) -> bool {
        self.container == other.container
            && self.first_child_index == other.first_child_index
            && self.remaining_sibling_count == other.remaining_sibling_count
    }
}

// ============================================================================
// Claiming
// ============================================================================

/// Nearest container shared by both nodes. Text nodes stand for their
/// parent; the body short-circuits. Unless `long_path` is set, each node's
/// own element is skipped and the search starts at its parent.
pub fn common_parent(
    document: &Document,
    first: NodeId,
    second: NodeId,
    long_path: bool,
) -> NodeId {
    let body = document.body();
    let first = element_of(document, first);
    let second = element_of(document, second);
    if first == body || second == body {
        return body;
    }

    let start = |node: NodeId| if long_path { Some(node) } else { document.parent(node) };

    let mut candidate = start(first);
    while let Some(common) = candidate {
        if common == body {
            break;
        }
        let mut other = start(second);
        while let Some(second_parent) = other {
            if second_parent == body {
                break;
            }
            if second_parent == common {
                return common;
            }
            other = document.parent(second_parent);
        }
        candidate = document.parent(common);
    }
    body
}

fn element_of(document: &Document, node: NodeId) -> NodeId {
    if document.is_text(node) {
        document.parent(node).unwrap_or(document.body())
    } else {
        node
    }
}

/// The ancestor of `node` (inclusive) whose parent is `parent`.
pub fn direct_child(document: &Document, parent: NodeId, node: NodeId) -> Option<NodeId> {
    if parent == node {
        return None;
    }
    let mut current = node;
    loop {
        let up = document.parent(current)?;
        if up == parent {
            return Some(current);
        }
        current = up;
    }
}

/// Computes the range of `common_parent(start, end)` children covering both
/// nodes, whichever of them comes first in the document.
pub fn claim_affected_content(
    document: &Document,
    start: NodeId,
    end: NodeId,
    flags: ClaimFlags,
) -> Result<AffectedRegion> {
    let body = document.body();
    let mut start_node = start;

    if flags.contains(ClaimFlags::USE_PARENT_BLOCK_NODE) {
        while start_node != body && !document.is_block(start_node) {
            match document.parent(start_node) {
                Some(parent) => start_node = parent,
                None => break,
            }
        }
    }

    let with_markup = flags.contains(ClaimFlags::SAVE_MARKUP);
    if with_markup {
        // Table parts only restore correctly as a whole table.
        let node = element_of(document, start_node);
        if matches!(
            document.role(node),
            Some(Role::TableCell { .. } | Role::TableRow)
        ) {
            let table = std::iter::once(node)
                .chain(document.ancestors(node))
                .find(|candidate| document.has_role(*candidate, Role::Table));
            if let Some(table) = table {
                start_node = table;
            }
        }
    }

    let container = common_parent(document, start_node, end, false);
    let start_child = direct_child(document, container, start_node);
    let mut end_child = direct_child(document, container, end);

    let children = document.children(container);
    let mut first_index: Option<usize> = None;
    let mut index = 0;
    while index < children.len() {
        let child = children[index];
        if first_index.is_none() {
            if Some(child) == start_child {
                first_index = Some(index);
            } else if Some(child) == end_child {
                end_child = start_child;
                first_index = Some(index);
            }
        }
        if first_index.is_some() && Some(child) == end_child {
            index += 1;
            break;
        }
        index += 1;
    }

    let container_path = document.path_from_body(container)?;
    let region = match first_index {
        Some(first) => AffectedRegion {
            container: container_path,
            first_child_index: first,
            remaining_sibling_count: children.len() - index,
            markup: with_markup.then(|| document.children_markup(container, first, index)),
        },
        None => AffectedRegion {
            markup: with_markup.then(|| document.inner_markup(container)),
            ..AffectedRegion::whole(container_path)
        },
    };
    tracing::trace!(
        container = %region.container,
        first = region.first_child_index,
        remaining = region.remaining_sibling_count,
        "claimed affected content"
    );
    Ok(region)
}

// ============================================================================
// Traversal
// ============================================================================

/// Work done on every visited element. Returning `Ok(false)` stops the walk.
pub trait Visitor {
    fn exec(&mut self, document: &mut Document, parent: NodeId, child: NodeId) -> Result<bool>;
}

impl<F> Visitor for F
where
    F: FnMut(&mut Document, NodeId, NodeId) -> Result<bool>,
{
    fn exec(&mut self, document: &mut Document, parent: NodeId, child: NodeId) -> Result<bool> {
        (*self)(document, parent, child)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traversal {
    /// Only direct children of the container are visited.
    pub flat: bool,
    /// The visitor only sees block elements.
    pub only_block_elements: bool,
}

impl Traversal {
    pub const FLAT_BLOCKS: Traversal = Traversal {
        flat: true,
        only_block_elements: true,
    };
    pub const DEEP_BLOCKS: Traversal = Traversal {
        flat: false,
        only_block_elements: true,
    };
}

/// Visits children `first..=last` of `parent`, descending into each child
/// before handing it to the visitor unless the traversal is flat.
///
/// The next sibling is fetched before the visitor runs, so a visitor may
/// remove or replace the node it was given.
pub fn foreach_child(
    document: &mut Document,
    parent: NodeId,
    first: usize,
    last: usize,
    traversal: Traversal,
    visitor: &mut dyn Visitor,
) -> Result<bool> {
    foreach_child_recur(document, parent, parent, first, last, traversal, visitor)
}

fn foreach_child_recur(
    document: &mut Document,
    top: NodeId,
    parent: NodeId,
    first: usize,
    last: usize,
    traversal: Traversal,
    visitor: &mut dyn Visitor,
) -> Result<bool> {
    if first >= document.child_count(parent) || last < first {
        return Ok(true);
    }

    let mut remaining = last - first + 1;
    let mut child = document.child(parent, first);
    while let Some(current) = child {
        if remaining == 0 {
            break;
        }
        let next = document.next_sibling(current);

        let grandchildren = document.child_count(current);
        if grandchildren > 0
            && !traversal.flat
            && !foreach_child_recur(
                document,
                top,
                current,
                0,
                grandchildren - 1,
                traversal,
                visitor,
            )?
        {
            return Ok(false);
        }

        if !document.is_text(current)
            && (!traversal.only_block_elements || document.is_block(current))
            && !visitor.exec(document, top, current)?
        {
            return Ok(false);
        }

        child = next;
        remaining -= 1;
    }
    Ok(true)
}

/// Re-resolves the region's container and walks its claimed children.
pub fn foreach_child_in_region(
    document: &mut Document,
    region: &AffectedRegion,
    traversal: Traversal,
    visitor: &mut dyn Visitor,
) -> Result<bool> {
    let container = document.resolve_from_body(&region.container)?;
    let end = region.end_index(document.child_count(container));
    if end == 0 || region.first_child_index >= end {
        return Ok(true);
    }
    foreach_child(
        document,
        container,
        region.first_child_index,
        end - 1,
        traversal,
        visitor,
    )
}

/// Resolves the container and returns the claimed child nodes.
pub fn region_children(document: &Document, region: &AffectedRegion) -> Result<Vec<NodeId>> {
    let container = document.resolve_from_body(&region.container)?;
    let children = document.children(container);
    let end = region.end_index(children.len());
    if region.first_child_index > end {
        return Err(EditorError::not_found(
            &region.container.child(region.first_child_index),
        ));
    }
    Ok(children[region.first_child_index..end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eight_paragraphs() -> Document {
        Document::from_markup(
            "<div>0</div><div>1</div><div>2</div><div>3</div><div>4</div><div>5</div><div>6</div><div>7</div>",
        )
        .unwrap()
    }

    fn text_in(document: &Document, index: usize) -> NodeId {
        let paragraph = document.child(document.body(), index).unwrap();
        document.first_child(paragraph).unwrap()
    }

    #[test]
    fn claim_covers_selected_range_in_either_direction() {
        let document = eight_paragraphs();
        let start = text_in(&document, 2);
        let end = text_in(&document, 5);

        let forward = claim_affected_content(&document, start, end, ClaimFlags::empty()).unwrap();
        assert_eq!(forward.container, Path::root());
        assert_eq!(forward.first_child_index, 2);
        assert_eq!(forward.remaining_sibling_count, 2);

        let backward = claim_affected_content(&document, end, start, ClaimFlags::empty()).unwrap();
        assert_eq!(backward, forward);
    }

    #[test]
    fn claim_saves_markup_of_covered_children() {
        let document = eight_paragraphs();
        let start = text_in(&document, 6);
        let end = text_in(&document, 7);
        let region = claim_affected_content(&document, end, start, ClaimFlags::SAVE_MARKUP).unwrap();
        assert_eq!(region.markup.as_deref(), Some("<div>6</div><div>7</div>"));
        assert_eq!(region.remaining_sibling_count, 0);
    }

    #[test]
    fn claim_inside_one_paragraph_uses_the_paragraph() {
        let document = Document::from_markup("<div>a<b>b</b>c</div><div>d</div>").unwrap();
        let paragraph = document.first_child(document.body()).unwrap();
        let first = document.first_child(paragraph).unwrap();
        let last = document.last_child(paragraph).unwrap();

        let region = claim_affected_content(&document, first, last, ClaimFlags::empty()).unwrap();
        assert_eq!(region.container, Path::root());
        assert_eq!(region.first_child_index, 0);
        assert_eq!(region.remaining_sibling_count, 1);

        let block = claim_affected_content(&document, first, first, ClaimFlags::USE_PARENT_BLOCK_NODE).unwrap();
        assert_eq!(block.first_child_index, 0);
    }

    #[test]
    fn claim_on_body_covers_everything() {
        let document = eight_paragraphs();
        let body = document.body();
        let region = claim_affected_content(&document, body, body, ClaimFlags::SAVE_MARKUP).unwrap();
        assert_eq!(region.first_child_index, 0);
        assert_eq!(region.remaining_sibling_count, 0);
        assert_eq!(region.markup.unwrap(), document.inner_markup(body));
    }

    #[test]
    fn table_cells_claim_the_whole_table() {
        let document =
            Document::from_markup("<div>x</div><table><tr><td>a</td><td>b</td></tr></table>").unwrap();
        let table = document.child(document.body(), 1).unwrap();
        let row = document.first_child(table).unwrap();
        let cell = document.first_child(row).unwrap();
        let region = claim_affected_content(&document, cell, cell, ClaimFlags::SAVE_MARKUP).unwrap();
        assert_eq!(region.first_child_index, 1);
        assert!(region.markup.unwrap().starts_with("<table>"));
    }

    #[test]
    fn traversal_visits_inclusive_range_children_first() {
        let mut document = Document::from_markup(
            "<div>a</div><blockquote><div>b</div></blockquote><div>c</div><div>d</div>",
        )
        .unwrap();
        let body = document.body();
        let mut seen = Vec::new();
        let mut visitor = |document: &mut Document, _parent: NodeId, child: NodeId| -> Result<bool> {
            seen.push(document.role(child).unwrap());
            Ok(true)
        };
        foreach_child(&mut document, body, 1, 2, Traversal::default(), &mut visitor).unwrap();
        assert_eq!(seen, vec![Role::Paragraph, Role::QuoteBlock, Role::Paragraph]);
    }

    #[test]
    fn traversal_survives_removal_of_visited_node() {
        let mut document = eight_paragraphs();
        let region = AffectedRegion::whole(Path::root());
        let mut visitor = |document: &mut Document, _parent: NodeId, child: NodeId| -> Result<bool> {
            if document.text_content(child).parse::<usize>().unwrap() % 2 == 0 {
                document.remove(child, false)?;
            }
            Ok(true)
        };
        foreach_child_in_region(&mut document, &region, Traversal::FLAT_BLOCKS, &mut visitor).unwrap();
        assert_eq!(
            document.inner_markup(document.body()),
            "<div>1</div><div>3</div><div>5</div><div>7</div>"
        );
    }

    #[test]
    fn visitor_can_stop_the_walk() {
        let mut document = eight_paragraphs();
        let body = document.body();
        let mut count = 0;
        let mut visitor = |_: &mut Document, _: NodeId, _: NodeId| -> Result<bool> {
            count += 1;
            Ok(count < 3)
        };
        let finished = foreach_child(&mut document, body, 0, 7, Traversal::FLAT_BLOCKS, &mut visitor).unwrap();
        assert!(!finished);
        assert_eq!(count, 3);
    }

    #[test]
    fn region_recovers_range_after_growth() {
        let mut document = eight_paragraphs();
        let region = AffectedRegion {
            container: Path::root(),
            first_child_index: 2,
            remaining_sibling_count: 2,
            markup: None,
        };
        let third = document.child(document.body(), 3).unwrap();
        let extra = document.create_element(Role::Paragraph);
        document.insert_after(third, extra).unwrap();
        assert_eq!(region_children(&document, &region).unwrap().len(), 5);
    }
}
