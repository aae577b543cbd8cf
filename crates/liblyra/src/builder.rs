//! Tree construction helpers for hosts feeding the semantic pass.
//!
//! The surface parser is not part of this crate; whatever produces the
//! input tree uses the arena through this builder. It fabricates
//! monotonically increasing positions inside one source file so
//! diagnostics point at distinct locations, and offers shorthands for
//! the node shapes the pass expects (a `function` always has its
//! `parameters` first, then the optional return type, then the body).

use crate::{
    arena::{NodeArena, NodeId},
    file::SourceFile,
    node::{NodeAttrs, NodeFlags, NodeKind},
    position::Position,
};

/// Builds nodes into an arena with synthetic positions
pub struct TreeBuilder {
    pub arena: NodeArena,
    file: SourceFile,
    cursor: usize,
}

impl TreeBuilder {
    /// Creates a builder for a file of the given name
    pub fn new(name: &str) -> Self {
        Self {
            arena: NodeArena::new(),
            file: SourceFile::new(vec![name.to_string()], String::new()),
            cursor: 0,
        }
    }

    /// Creates a builder over real source text so positions map back
    pub fn with_source(name: &str, code: &str) -> Self {
        Self {
            arena: NodeArena::new(),
            file: SourceFile::new(vec![name.to_string()], code.to_string()),
            cursor: 0,
        }
    }

    fn next_position(&mut self) -> Position {
        let start = self.cursor;
        self.cursor += 1;
        Position::new(self.file.clone(), start..start + 1)
    }

    /// A bare node of the given kind
    pub fn node(&mut self, kind: NodeKind) -> NodeId {
        let position = self.next_position();
        self.arena.new_node(kind, position)
    }

    /// A node carrying a name or text payload
    pub fn named(&mut self, kind: NodeKind, name: &str) -> NodeId {
        let node = self.node(kind);
        self.arena.set_string(node, name);
        node
    }

    /// A node with the given children appended in order
    pub fn with_children(&mut self, kind: NodeKind, children: &[NodeId]) -> NodeId {
        let node = self.node(kind);
        for child in children {
            self.arena.append_child(node, *child);
        }
        node
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.arena.append_child(parent, child);
    }

    /* common shapes */

    pub fn ident(&mut self, name: &str) -> NodeId {
        self.named(NodeKind::Identifier, name)
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.named(NodeKind::String, value)
    }

    pub fn integer(&mut self, value: i64) -> NodeId {
        let node = self.node(NodeKind::Integer);
        self.arena.set_integer(node, value);
        node
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        let node = self.node(NodeKind::Float);
        self.arena.set_float(node, value);
        node
    }

    /// A `program` wrapping one directive list of the given statements
    pub fn program(&mut self, statements: &[NodeId]) -> NodeId {
        let list = self.with_children(NodeKind::DirectiveList, statements);
        self.with_children(NodeKind::Program, &[list])
    }

    /// A directive list
    pub fn list(&mut self, statements: &[NodeId]) -> NodeId {
        self.with_children(NodeKind::DirectiveList, statements)
    }

    /// A `var` with one named variable, optionally typed and initialized
    pub fn var(&mut self, name: &str, type_name: Option<&str>, init: Option<NodeId>) -> NodeId {
        let variable = self.named(NodeKind::Variable, name);
        if let Some(type_name) = type_name {
            let type_node = self.ident(type_name);
            self.arena.append_child(variable, type_node);
        }
        if let Some(init) = init {
            let set = self.with_children(NodeKind::Set, &[init]);
            self.arena.append_child(variable, set);
        }
        self.with_children(NodeKind::Var, &[variable])
    }

    /// A single parameter, optionally typed and with a default value
    pub fn parameter(&mut self, name: &str, type_name: Option<&str>, default: Option<NodeId>) -> NodeId {
        let parameter = self.named(NodeKind::Parameter, name);
        if let Some(type_name) = type_name {
            let type_node = self.ident(type_name);
            self.arena.append_child(parameter, type_node);
        }
        if let Some(default) = default {
            let set = self.with_children(NodeKind::Set, &[default]);
            self.arena.append_child(parameter, set);
        }
        parameter
    }

    /// A function: parameters first, optional return type, optional body
    pub fn function(
        &mut self,
        name: &str,
        parameters: &[NodeId],
        return_type: Option<&str>,
        body: Option<NodeId>,
    ) -> NodeId {
        let function = self.named(NodeKind::Function, name);
        let parameters = self.with_children(NodeKind::Parameters, parameters);
        self.arena.append_child(function, parameters);
        if let Some(return_type) = return_type {
            let type_node = self.ident(return_type);
            self.arena.append_child(function, type_node);
        }
        if let Some(body) = body {
            self.arena.append_child(function, body);
        }
        function
    }

    /// A class with an optional base class and the given body members
    pub fn class(&mut self, name: &str, extends: Option<&str>, members: &[NodeId]) -> NodeId {
        let class = self.named(NodeKind::Class, name);
        if let Some(extends) = extends {
            let super_name = self.ident(extends);
            let clause = self.with_children(NodeKind::Extends, &[super_name]);
            self.arena.append_child(class, clause);
        }
        let body = self.with_children(NodeKind::DirectiveList, members);
        self.arena.append_child(class, body);
        class
    }

    /// A member access `object.field`
    pub fn member(&mut self, object: NodeId, field: &str) -> NodeId {
        let field = self.ident(field);
        self.with_children(NodeKind::Member, &[object, field])
    }

    /// A call `callee(arguments)`
    pub fn call(&mut self, callee: NodeId, arguments: &[NodeId]) -> NodeId {
        let list = self.with_children(NodeKind::List, arguments);
        self.with_children(NodeKind::Call, &[callee, list])
    }

    /// Marks a declaration with attributes; the mask may carry several
    pub fn attrs(&mut self, node: NodeId, attrs: NodeAttrs) -> NodeId {
        self.arena.set_attr(node, attrs, true);
        node
    }

    /// Sets flags on a node; the mask may carry several
    pub fn flags(&mut self, node: NodeId, flags: NodeFlags) -> NodeId {
        self.arena.set_flag(node, flags, true);
        node
    }
}

/// Builds the intrinsic type scope every compilation expects: `Object`,
/// `String`, `Integer`, `Double`, `Boolean`, `Array` and `Function`,
/// with the intrinsic arithmetic and comparison operators on `Integer`,
/// `Double` and `String`
///
/// Hosts install the returned program as the native import scope.
pub fn native_types(builder: &mut TreeBuilder) -> NodeId {
    let object = builder.class("Object", None, &[]);
    builder.arena.set_attr(object, NodeAttrs::Dynamic, true);

    let mut classes = vec![object];
    for name in ["String", "Integer", "Double", "Boolean", "Array", "Function"] {
        let mut members = Vec::new();
        if matches!(name, "String" | "Integer" | "Double" | "Boolean") {
            for op in [
                "+", "-", "*", "/", "%", "==", "!=", "<", "<=", ">", ">=", "&&", "||", "+=",
                "-=", "*=", "/=",
            ] {
                let left = builder.parameter("left", Some(name), None);
                let right = builder.parameter("right", Some(name), None);
                let operator = builder.function(op, &[left, right], Some(name), None);
                builder.arena.set_flag(operator, NodeFlags::Operator, true);
                builder.arena.set_attr(operator, NodeAttrs::Intrinsic, true);
                members.push(operator);
            }
            for op in ["++", "--"] {
                let left = builder.parameter("left", Some(name), None);
                let operator = builder.function(op, &[left], Some(name), None);
                builder.arena.set_flag(operator, NodeFlags::Operator, true);
                builder.arena.set_attr(operator, NodeAttrs::Intrinsic, true);
                members.push(operator);
            }
        }
        let class = builder.class(name, Some("Object"), &members);
        classes.push(class);
    }

    builder.program(&classes)
}
