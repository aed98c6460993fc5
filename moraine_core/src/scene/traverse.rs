// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, NodeId};
use super::store::SceneGraph;

/// An iterator over the direct children of a node, in ascending z order.
///
/// Created by [`SceneGraph::children`].
#[derive(Debug)]
pub struct Children<'a> {
    graph: &'a SceneGraph,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(graph: &'a SceneGraph, first: u32) -> Self {
        Self {
            graph,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.graph.next_sibling[idx as usize];
        Some(NodeId {
            idx,
            generation: self.graph.generation[idx as usize],
        })
    }
}

/// An iterator over the direct children of a node, in descending z order.
///
/// Created by [`SceneGraph::children_rev`]. Hit-testing walks children
/// back-to-front so the topmost sibling wins.
#[derive(Debug)]
pub struct ChildrenRev<'a> {
    graph: &'a SceneGraph,
    current: u32,
}

impl<'a> ChildrenRev<'a> {
    pub(crate) fn new(graph: &'a SceneGraph, last: u32) -> Self {
        Self {
            graph,
            current: last,
        }
    }
}

impl Iterator for ChildrenRev<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.graph.prev_sibling[idx as usize];
        Some(NodeId {
            idx,
            generation: self.graph.generation[idx as usize],
        })
    }
}
