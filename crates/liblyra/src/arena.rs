//! Node arena and tree surgery for the Lyra compiler core.
//!
//! All AST nodes live in a single [`NodeArena`]; nodes reference each other
//! with typed [`NodeId`] indices. Ownership is tree shaped through the
//! child lists, while `instance`, `type`, `goto_enter` and `goto_exit` are
//! non-owning cross-edges that simply store the index of their target.
//! Because nodes are only dropped with the whole arena, cross-edges can
//! never dangle and cycles among them are safe to traverse with a visited
//! set.
//!
//! # Locking
//!
//! The resolvers frequently iterate a node's child list while resolution
//! of a child wants to append a sibling (for example a synthesized `var`
//! hoisted to the enclosing directive list). While a node is locked,
//! `append_child` enqueues the new child on the node and the queue is
//! drained in order when the last lock is released. In-place replacement
//! of an existing child slot stays legal under a lock since it does not
//! shift indices. Insertions and removals on a locked node are a bug and
//! panic.
//!
//! Locks are plain counters; the walker pairs [`NodeArena::lock`] and
//! [`NodeArena::unlock`] explicitly, including on early error returns.

use indexmap::IndexMap;

use crate::{
    node::{Node, NodeAttrs, NodeFlags, NodeKind},
    position::Position,
};

/// A typed index of a node inside the arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Sentinel value representing no node
    pub const UNDEFINED: Self = NodeId(usize::MAX);

    /// Returns the raw index of this node
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

/// Storage for every node of a compilation, including lazily loaded packages
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of nodes currently in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Creates a new detached node
    pub fn new_node(&mut self, kind: NodeKind, position: Position) -> NodeId {
        self.nodes.push(Node::new(kind, position));
        NodeId(self.nodes.len() - 1)
    }

    /// Creates a new detached node of another kind carrying the position of `source`
    ///
    /// Used by the rewriters so a rewritten subtree keeps pointing at the
    /// source text it came from.
    pub fn create_replacement(&mut self, source: NodeId, kind: NodeKind) -> NodeId {
        let position = self.node(source).position.clone();
        self.new_node(kind, position)
    }

    /* accessors */

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    /// Changes the kind of a node in place; this is how rewrites repoint a
    /// node without moving it under its parent
    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.node_mut(id).kind = kind;
    }

    pub fn position(&self, id: NodeId) -> Position {
        self.node(id).position.clone()
    }

    pub fn string(&self, id: NodeId) -> &str {
        &self.node(id).string
    }

    pub fn set_string(&mut self, id: NodeId, value: impl Into<String>) {
        self.node_mut(id).string = value.into();
    }

    pub fn integer(&self, id: NodeId) -> i64 {
        self.node(id).integer
    }

    pub fn set_integer(&mut self, id: NodeId, value: i64) {
        self.node_mut(id).integer = value;
    }

    pub fn float(&self, id: NodeId) -> f64 {
        self.node(id).float
    }

    pub fn set_float(&mut self, id: NodeId, value: f64) {
        self.node_mut(id).float = value;
    }

    /* flags and attributes */

    pub fn flag(&self, id: NodeId, flag: NodeFlags) -> bool {
        self.node(id).flags.contains(flag)
    }

    pub fn set_flag(&mut self, id: NodeId, flag: NodeFlags, on: bool) {
        let node = self.node_mut(id);
        if on {
            node.flags |= flag;
        } else {
            node.flags &= !flag;
        }
    }

    pub fn attrs(&self, id: NodeId) -> NodeAttrs {
        self.node(id).attrs
    }

    pub fn attr(&self, id: NodeId, attr: NodeAttrs) -> bool {
        self.node(id).attrs.contains(attr)
    }

    pub fn set_attr(&mut self, id: NodeId, attr: NodeAttrs, on: bool) {
        let node = self.node_mut(id);
        if on {
            node.attrs |= attr;
        } else {
            node.attrs &= !attr;
        }
    }

    /* tree structure */

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children_count(&self, id: NodeId) -> usize {
        self.node(id).children.len()
    }

    pub fn get_child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).children.get(index).copied()
    }

    /// Child at `index`; panics when out of range, which is a walker bug
    pub fn child(&self, id: NodeId, index: usize) -> NodeId {
        self.node(id).children[index]
    }

    /// A copy of the child list, cheap enough for the tree sizes at hand
    /// and free of borrow entanglements while the walker mutates
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).children.clone()
    }

    /// Index of `id` inside its parent's child list, 0 for detached nodes
    pub fn offset_of(&self, id: NodeId) -> usize {
        match self.node(id).parent {
            Some(parent) => self
                .node(parent)
                .children
                .iter()
                .position(|child| *child == id)
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Finds the first direct child of the given kind
    pub fn find_first_child(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).kind == kind)
    }

    /// Appends a child, deferring the append when the parent is locked
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        let parent_node = self.node_mut(parent);
        if parent_node.lock > 0 {
            parent_node.pending.push(child);
        } else {
            parent_node.children.push(child);
        }
    }

    /// Inserts a child at `index`; the parent must not be locked
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        assert_eq!(self.node(parent).lock, 0, "insert_child on a locked node");
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.insert(index, child);
    }

    /// Replaces the child at `index` in place; legal while locked
    pub fn replace_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        let old = self.node(parent).children[index];
        self.node_mut(old).parent = None;
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children[index] = child;
    }

    /// Removes the child at `index`; the parent must not be locked
    pub fn delete_child(&mut self, parent: NodeId, index: usize) -> NodeId {
        assert_eq!(self.node(parent).lock, 0, "delete_child on a locked node");
        let child = self.node_mut(parent).children.remove(index);
        self.node_mut(child).parent = None;
        child
    }

    /// Drops `Unknown` children of a node, recursively
    ///
    /// Declarations whose attributes evaluated to false are turned to
    /// `Unknown` at the start of the pass and swept here.
    pub fn clean_tree(&mut self, id: NodeId) {
        let children = self.children(id);
        for child in children.iter().rev() {
            if self.kind(*child) == NodeKind::Unknown {
                let index = self.offset_of(*child);
                self.delete_child(id, index);
            } else {
                self.clean_tree(*child);
            }
        }
    }

    /* locking */

    pub fn lock(&mut self, id: NodeId) {
        self.node_mut(id).lock += 1;
    }

    pub fn is_locked(&self, id: NodeId) -> bool {
        self.node(id).lock > 0
    }

    /// Releases one lock level; on the last release the deferred child
    /// queue is flushed in enqueue order
    pub fn unlock(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        assert!(node.lock > 0, "unlock without a matching lock");
        node.lock -= 1;
        if node.lock == 0 && !node.pending.is_empty() {
            let pending = std::mem::take(&mut node.pending);
            self.node_mut(id).children.extend(pending);
        }
    }

    /* cross-edges */

    pub fn instance(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).instance
    }

    /// Attaches the definition this node refers to
    ///
    /// Once set, the instance link is never repointed to a different node;
    /// rewriting the node is the only legitimate way to change it.
    pub fn set_instance(&mut self, id: NodeId, instance: NodeId) {
        let node = self.node_mut(id);
        debug_assert!(
            node.instance.is_none() || node.instance == Some(instance),
            "instance link silently repointed"
        );
        node.instance = Some(instance);
    }

    pub fn type_link(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).type_link
    }

    pub fn set_type_link(&mut self, id: NodeId, type_link: NodeId) {
        self.node_mut(id).type_link = Some(type_link);
    }

    pub fn goto_enter(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).goto_enter
    }

    pub fn set_goto_enter(&mut self, id: NodeId, target: NodeId) {
        self.node_mut(id).goto_enter = Some(target);
    }

    pub fn goto_exit(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).goto_exit
    }

    pub fn set_goto_exit(&mut self, id: NodeId, target: NodeId) {
        self.node_mut(id).goto_exit = Some(target);
    }

    /* label index */

    /// Looks a label up in the label index of a program, package or function
    pub fn find_label(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        self.node(scope).labels.get(name).copied()
    }

    /// Registers a label in the index of its enclosing scope
    pub fn add_label(&mut self, scope: NodeId, label: NodeId) {
        let name = self.node(label).string.clone();
        self.node_mut(scope).labels.insert(name, label);
    }

    pub fn labels(&self, scope: NodeId) -> &IndexMap<String, NodeId> {
        &self.node(scope).labels
    }

    /* variable index */

    /// Records a variable in the variable list of a scope forming node
    pub fn add_variable(&mut self, scope: NodeId, variable: NodeId) {
        self.node_mut(scope).variables.push(variable);
    }

    pub fn variables(&self, scope: NodeId) -> Vec<NodeId> {
        self.node(scope).variables.clone()
    }

    /* overload match payload */

    pub fn match_scores(&self, id: NodeId) -> &[usize] {
        &self.node(id).match_scores
    }

    pub fn set_match_scores(&mut self, id: NodeId, scores: Vec<usize>) {
        self.node_mut(id).match_scores = scores;
    }

    pub fn match_map(&self, id: NodeId) -> &[usize] {
        &self.node(id).match_map
    }

    pub fn set_match_map(&mut self, id: NodeId, map: Vec<usize>) {
        self.node_mut(id).match_map = map;
    }

    /// Copies the literal payload of `from` onto `onto`, changing its kind
    ///
    /// Used by constant folding to replace a reference with the literal it
    /// resolved to while keeping the node in place under its parent.
    pub fn clone_literal(&mut self, onto: NodeId, from: NodeId) {
        let (kind, string, integer, float) = {
            let source = self.node(from);
            (
                source.kind,
                source.string.clone(),
                source.integer,
                source.float,
            )
        };
        let target = self.node_mut(onto);
        target.kind = kind;
        target.string = string;
        target.integer = integer;
        target.float = float;
        target.children.clear();
        target.instance = None;
    }
}
