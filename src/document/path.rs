use std::fmt;
use std::str::FromStr;

use crate::error::{EditorError, Result};

use super::{Document, NodeId};

/// Child indices leading from an ancestor down to a node.
///
/// Paths are recomputed, never cached as identity: they are only meaningful
/// against the tree state they were taken from. Lexicographic ordering of two
/// paths taken from the same root matches document (pre-)order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<usize>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    pub fn child(&self, index: usize) -> Path {
        let mut indices = self.0.clone();
        indices.push(index);
        Path(indices)
    }

    pub fn parent(&self) -> Option<Path> {
        let (_, head) = self.0.split_last()?;
        Some(Path(head.to_vec()))
    }

    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn join(&self, relative: &Path) -> Path {
        let mut indices = self.0.clone();
        indices.extend_from_slice(&relative.0);
        Path(indices)
    }
}

impl From<Vec<usize>> for Path {
    fn from(indices: Vec<usize>) -> Self {
        Path(indices)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = EditorError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Err(EditorError::invalid(format!("path `{value}` must start with `/`")));
        };
        if rest.is_empty() {
            return Ok(Path::root());
        }
        rest.split('/')
            .map(|segment| {
                segment
                    .parse::<usize>()
                    .map_err(|_| EditorError::invalid(format!("bad path segment `{segment}`")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Path)
    }
}

impl Document {
    /// Walks from `node` up to `root`, recording each child index.
    pub fn path_of(&self, root: NodeId, node: NodeId) -> Result<Path> {
        let mut indices = Vec::new();
        let mut current = node;
        while current != root {
            let parent = self.parent(current).ok_or(EditorError::NotDescendant)?;
            let index = self
                .index_in_parent(current)
                .ok_or(EditorError::NotDescendant)?;
            indices.push(index);
            current = parent;
        }
        indices.reverse();
        Ok(Path(indices))
    }

    /// Follows `path` from `root`; any out-of-range index is `NotFound`.
    pub fn resolve(&self, root: NodeId, path: &Path) -> Result<NodeId> {
        let mut current = root;
        for index in path.indices() {
            current = self
                .child(current, *index)
                .ok_or_else(|| EditorError::not_found(path))?;
        }
        Ok(current)
    }

    pub fn path_from_body(&self, node: NodeId) -> Result<Path> {
        self.path_of(self.body(), node)
    }

    pub fn resolve_from_body(&self, path: &Path) -> Result<NodeId> {
        self.resolve(self.body(), path)
    }
}
