//! Expression resolution dispatch.
//!
//! `expression` drives the recursive walk over expression subtrees: it
//! types literals, folds the special identifiers, resolves references,
//! dispatches member accesses, calls, `new` expressions and the operator
//! rewrites, and replaces constant variable references with their
//! literal initializers.

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeFlags, NodeKind},
};

use super::{Compiler, SearchFlags};

impl<'a> Compiler<'a> {
    /// Resolves one expression node, recursively
    pub(crate) fn expression(&mut self, expr: NodeId) -> Result<(), FatalError> {
        let kind = self.arena.kind(expr);

        match kind {
            NodeKind::String
            | NodeKind::Integer
            | NodeKind::Float
            | NodeKind::True
            | NodeKind::False
            | NodeKind::Null
            | NodeKind::Undefined
            | NodeKind::RegularExpression => self.type_expr(expr),

            NodeKind::ObjectLiteral => self.object_literal(expr),

            NodeKind::ArrayLiteral => {
                self.type_expr(expr)?;
                self.expression_children(expr)
            }

            NodeKind::Identifier | NodeKind::VIdentifier => self.expression_identifier(expr),

            NodeKind::Member => self.resolve_member(expr, None, SearchFlags::Getter),

            NodeKind::Call => {
                self.resolve_call(expr)?;
                Ok(())
            }

            NodeKind::New => self.expression_new(expr),

            NodeKind::As => {
                // children are (expression, type)
                self.expression_children(expr)?;
                let type_node = self.arena.child(expr, 1);
                if let Some(instance) = self.arena.instance(type_node) {
                    self.arena.set_type_link(expr, instance);
                }
                Ok(())
            }

            NodeKind::Super => {
                self.check_super_validity(expr);
                Ok(())
            }

            NodeKind::This
            | NodeKind::Empty
            | NodeKind::Unknown
            // argument names and parameter matches are resolution
            // artifacts, not expressions
            | NodeKind::Name
            | NodeKind::ParamMatch
            | NodeKind::Auto => Ok(()),

            NodeKind::Conditional => {
                self.expression_children(expr)?;
                if self.arena.children_count(expr) == 3 {
                    let then_arm = self.arena.child(expr, 1);
                    if let Some(type_link) = self.arena.type_link(then_arm) {
                        self.arena.set_type_link(expr, type_link);
                    }
                }
                Ok(())
            }

            NodeKind::List => {
                self.expression_children(expr)?;
                let count = self.arena.children_count(expr);
                if count > 0 {
                    let last = self.arena.child(expr, count - 1);
                    if let Some(type_link) = self.arena.type_link(last) {
                        self.arena.set_type_link(expr, type_link);
                    }
                }
                Ok(())
            }

            NodeKind::In | NodeKind::InstanceOf => {
                // intrinsic relational operators; the result is a Boolean
                self.expression_children(expr)?;
                let boolean = self.resolve_internal_type(expr, "Boolean")?;
                self.arena.set_type_link(expr, boolean);
                Ok(())
            }

            NodeKind::TypeOf => {
                self.expression_children(expr)?;
                let string = self.resolve_internal_type(expr, "String")?;
                self.arena.set_type_link(expr, string);
                Ok(())
            }

            NodeKind::Delete => self.expression_children(expr),

            _ if kind == NodeKind::Assignment => self.assignment_operator(expr),

            _ if kind.is_assignment() => {
                // compound assignments resolve both sides like the plain
                // assignment, then go through operator lookup
                self.expression_children(expr)?;
                self.binary_operator(expr)
            }

            _ if kind.is_unary_operator() && self.arena.children_count(expr) == 1 => {
                self.expression_children(expr)?;
                self.unary_operator(expr)
            }

            _ if kind.is_binary_operator()
                || (kind.is_unary_operator() && self.arena.children_count(expr) == 2) =>
            {
                self.expression_children(expr)?;
                self.binary_operator(expr)
            }

            _ => {
                // remaining kinds carry no expression semantics of their
                // own; resolve the children
                self.expression_children(expr)
            }
        }
    }

    /// Resolves the children of an expression, left to right
    pub(crate) fn expression_children(&mut self, expr: NodeId) -> Result<(), FatalError> {
        let children = self.arena.children(expr);
        self.arena.lock(expr);
        let result: Result<(), FatalError> = (|| {
            for child in children {
                self.expression(child)?;
            }
            Ok(())
        })();
        self.arena.unlock(expr);
        result
    }

    /// Resolves an identifier reference
    pub(crate) fn expression_identifier(&mut self, expr: NodeId) -> Result<(), FatalError> {
        // special identifiers fold to literals before resolution
        if self.special_identifier(expr)? {
            return Ok(());
        }

        // resolved, or already failed once; either way done
        if self.arena.instance(expr).is_some() || self.arena.flag(expr, NodeFlags::Typed) {
            return Ok(());
        }
        self.arena.set_flag(expr, NodeFlags::Typed, true);

        let errcnt = self.diags.error_count();
        match self.resolve_name(expr, expr, None, SearchFlags::none())? {
            Some(resolution) => {
                if self.replace_constant_variable(expr, resolution)? {
                    return Ok(());
                }
                if self.arena.kind(resolution) == NodeKind::Variable {
                    self.arena.set_flag(resolution, NodeFlags::InUse, true);
                }
                self.arena.set_instance(expr, resolution);
                if let Some(type_link) = self.arena.type_link(resolution) {
                    self.arena.set_type_link(expr, type_link);
                } else {
                    self.type_expr(expr)?;
                }
            }
            None => {
                if errcnt == self.diags.error_count() {
                    self.diags.error(
                        ErrorKind::NotFound,
                        self.arena.position(expr),
                        format!("cannot find any declaration for '{}'.", self.arena.string(expr)),
                    );
                }
                // mark the node resolved with an unknown type so cascaded
                // diagnostics do not explode
                let unknown = self.unknown_type();
                self.arena.set_type_link(expr, unknown);
            }
        }

        Ok(())
    }

    /// Resolves a `new` expression and rejects abstract instantiation
    fn expression_new(&mut self, expr: NodeId) -> Result<(), FatalError> {
        self.expression_children(expr)?;

        if self.arena.children_count(expr) == 0 {
            return Ok(());
        }
        let callee = self.arena.child(expr, 0);
        let class_node = match self.arena.instance(callee) {
            Some(instance) if self.arena.kind(instance) == NodeKind::Class => instance,
            _ => return Ok(()),
        };

        // an abstract class cannot be instantiated: an abstract method
        // somewhere in the derivation chain must be overridden all the
        // way down
        if let Some(abstract_function) = self.has_abstract_functions(class_node, class_node)? {
            self.diags.error(
                ErrorKind::InvalidExpression,
                self.arena.position(expr),
                format!(
                    "class '{}' cannot be instantiated, function '{}' is abstract and was not overridden.",
                    self.arena.string(class_node),
                    self.arena.string(abstract_function),
                ),
            );
        }

        self.arena.set_instance(expr, class_node);
        self.arena.set_type_link(expr, class_node);
        Ok(())
    }

    /// Checks an object literal: property names must be unique and
    /// proper, and the value expressions compile
    pub(crate) fn object_literal(&mut self, expr: NodeId) -> Result<(), FatalError> {
        // the type of the literal is Object
        self.type_expr(expr)?;

        let max = self.arena.children_count(expr);
        if max % 2 != 0 {
            // invalid, the parser pairs names and values
            return Ok(());
        }

        let mut idx = 0;
        while idx < max {
            let name = self.arena.child(expr, idx);
            let count = self.arena.children_count(name);
            if self.arena.kind(name) == NodeKind::Type {
                // the first child is a dynamic name
                let dynamic = self.arena.child(name, 0);
                self.expression(dynamic)?;
                if count == 2 {
                    self.diags.error(
                        ErrorKind::NotSupported,
                        self.arena.position(name),
                        "scope not supported yet. (1)",
                    );
                }
            } else if count == 1 {
                self.diags.error(
                    ErrorKind::NotSupported,
                    self.arena.position(name),
                    "scope not supported yet. (2)",
                );
            }

            // compile the value
            let value = self.arena.child(expr, idx + 1);
            self.expression(value)?;
            idx += 2;
        }

        Ok(())
    }

    /// Folds a reference to a constant variable with a literal
    /// initializer into the literal itself
    pub(crate) fn replace_constant_variable(
        &mut self,
        replace: NodeId,
        resolution: NodeId,
    ) -> Result<bool, FatalError> {
        if self.arena.kind(resolution) != NodeKind::Variable {
            return Ok(false);
        }
        if !self.arena.flag(resolution, NodeFlags::Const) {
            return Ok(false);
        }

        let children = self.arena.children(resolution);
        self.arena.lock(resolution);
        let result = (|| -> Result<bool, FatalError> {
            for set in children {
                if self.arena.kind(set) != NodeKind::Set {
                    continue;
                }
                if self.arena.children_count(set) != 1 {
                    return Ok(false);
                }
                let value = self.arena.child(set, 0);
                self.type_expr(value)?;

                if self.arena.kind(value).is_literal() {
                    self.arena.clone_literal(replace, value);
                    return Ok(true);
                }
                // a dynamic expression cannot be resolved at compile time
                return Ok(false);
            }
            Ok(false)
        })();
        self.arena.unlock(resolution);
        result
    }
}
