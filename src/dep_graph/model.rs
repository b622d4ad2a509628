//! Node and edge types for the dependency graph.

use crate::metadata_index::model::LinkTargetKind;

/// A bank file as a graph node; identity is the file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileNode {
    pub name: String,
}

/// An edge `a -> b`: `a` references `b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub kind: LinkTargetKind,
    pub source_line: usize,
}
