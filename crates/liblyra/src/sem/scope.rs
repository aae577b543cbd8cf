//! Scope stack for `use namespace` and `with` effects.
//!
//! Entries pushed while a directive list compiles only stay effective
//! until the end of that list; the walker saves a mark on entry and
//! restores it on every exit path. The name resolver consults the active
//! `with` entries when walking outward and the namespace entries when a
//! qualified attribute scope is in effect.

use crate::arena::NodeId;

/// One currently effective scope entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEntry {
    /// `use namespace <name>;`
    Namespace(String),
    /// a `with (object)` currently being compiled; the id is the object
    /// expression whose type drives field lookups
    With(NodeId),
}

/// The stack of currently effective scopes
#[derive(Debug, Default)]
pub struct ScopeStack {
    entries: Vec<ScopeEntry>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current depth, used to restore the stack on scope exit
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Drops every entry pushed after `mark`
    pub fn restore(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    pub fn push_namespace(&mut self, name: String) {
        self.entries.push(ScopeEntry::Namespace(name));
    }

    pub fn push_with(&mut self, object: NodeId) {
        self.entries.push(ScopeEntry::With(object));
    }

    /// Active namespace names, innermost last
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            ScopeEntry::Namespace(name) => Some(name.as_str()),
            ScopeEntry::With(_) => None,
        })
    }

    /// Innermost active `with` object, when any
    pub fn current_with(&self) -> Option<NodeId> {
        self.entries.iter().rev().find_map(|entry| match entry {
            ScopeEntry::With(object) => Some(*object),
            ScopeEntry::Namespace(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
