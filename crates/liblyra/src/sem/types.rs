//! TYPE link assignment and type compatibility.
//!
//! Every expression node acquires a TYPE cross-edge: literals map to the
//! intrinsic classes (`String`, `Integer`, `Double`, `Boolean`, `Object`,
//! `Array`), references inherit the declared type of the variable they
//! resolve to. `match_type` scores how well an argument matches a formal
//! parameter: 1 for the exact type, `i32::MAX / 2` when either side is
//! `Object`, `1 + depth` through the extends/implements chain, 0 for a
//! mismatch.

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeFlags, NodeKind},
};

use super::{Compiler, SearchFlags};

/// Worst acceptable match, used when either side is the top type
pub const OBJECT_MATCH: usize = i32::MAX as usize / 2;

impl<'a> Compiler<'a> {
    /// Links a type expression (an identifier naming a class) to its class
    pub(crate) fn link_type(&mut self, type_node: NodeId) -> Result<(), FatalError> {
        // already linked?
        if self.arena.instance(type_node).is_some() {
            return Ok(());
        }

        let kind = self.arena.kind(type_node);
        if kind != NodeKind::Identifier && kind != NodeKind::String {
            // the type cannot be determined at compile time when it is a
            // dynamic type expression
            return Ok(());
        }

        if self.arena.flag(type_node, NodeFlags::Typed) {
            // if it fails, we fail only once
            return Ok(());
        }
        self.arena.set_flag(type_node, NodeFlags::Typed, true);

        let Some(object) = self.resolve_name(type_node, type_node, None, SearchFlags::none())?
        else {
            self.diags.error(
                ErrorKind::InvalidExpression,
                self.arena.position(type_node),
                format!(
                    "cannot find a class definition for type '{}'.",
                    self.arena.string(type_node)
                ),
            );
            return Ok(());
        };

        let object_kind = self.arena.kind(object);
        if object_kind != NodeKind::Class && object_kind != NodeKind::Interface {
            self.diags.error(
                ErrorKind::InvalidExpression,
                self.arena.position(type_node),
                format!(
                    "the name '{}' is not referencing a class nor an interface.",
                    self.arena.string(type_node)
                ),
            );
            return Ok(());
        }

        self.arena.set_instance(type_node, object);
        Ok(())
    }

    /// Assigns the TYPE link of an expression when it can be known
    pub(crate) fn type_expr(&mut self, expr: NodeId) -> Result<(), FatalError> {
        // already typed?
        if self.arena.type_link(expr).is_some() {
            return Ok(());
        }

        let internal = match self.arena.kind(expr) {
            NodeKind::String => Some("String"),
            NodeKind::Integer => Some("Integer"),
            NodeKind::Float => Some("Double"),
            NodeKind::True | NodeKind::False => Some("Boolean"),
            NodeKind::ObjectLiteral => Some("Object"),
            NodeKind::ArrayLiteral => Some("Array"),
            _ => None,
        };

        if let Some(type_name) = internal {
            let resolution = self.resolve_internal_type(expr, type_name)?;
            self.arena.set_type_link(expr, resolution);
            return Ok(());
        }

        // a reference inherits the declared type of its variable
        let Some(instance) = self.arena.instance(expr) else {
            return Ok(());
        };
        if self.arena.kind(instance) != NodeKind::Variable
            || self.arena.children_count(instance) == 0
        {
            return Ok(());
        }
        let type_node = self.arena.child(instance, 0);
        if self.arena.kind(type_node) == NodeKind::Set {
            return Ok(());
        }
        if let Some(class_instance) = self.arena.instance(type_node) {
            self.arena.set_type_link(expr, class_instance);
        }

        Ok(())
    }

    /// Resolves and attaches the type of a function from its return type
    /// child, defaulting to `Object`
    pub(crate) fn define_function_type(&mut self, func: NodeId) -> Result<bool, FatalError> {
        if self.arena.type_link(func).is_some() {
            return Ok(true);
        }

        let max = self.arena.children_count(func);
        if max < 1 {
            return Ok(self.arena.flag(func, NodeFlags::Void));
        }

        let mut found = false;
        let children = self.arena.children(func);
        self.arena.lock(func);
        let result = (|| -> Result<(), FatalError> {
            for child in children {
                let kind = self.arena.kind(child);
                if kind == NodeKind::Parameters || kind == NodeKind::DirectiveList {
                    continue;
                }
                // this child is the return type definition
                found = true;
                self.expression(child)?;
                if let Some(resolution) =
                    self.resolve_name(child, child, None, SearchFlags::none())?
                {
                    self.arena.set_type_link(func, resolution);
                }
                break;
            }
            Ok(())
        })();
        self.arena.unlock(func);
        result?;

        if !found {
            // no type defined; use a default of Object
            let object = self.resolve_internal_type(func, "Object")?;
            self.arena.set_type_link(func, object);
        }

        Ok(true)
    }

    /// Scores how well the type of `t1` matches the formal parameter or
    /// type expression `t2`
    ///
    /// Returns 0 on a reject. With `any_ancestor`, ancestors of the
    /// argument type are accepted with a score of `1 + depth`.
    pub(crate) fn match_type(
        &mut self,
        t1: NodeId,
        t2: NodeId,
        any_ancestor: bool,
    ) -> Result<usize, FatalError> {
        let mut t2 = t2;
        if self.arena.kind(t2) == NodeKind::Parameter {
            if self.arena.flag(t2, NodeFlags::Out) {
                // an out parameter requires a variable reference which can
                // be set on exit
                if self.arena.kind(t1) != NodeKind::Identifier {
                    // no error here; another function may match elsewhere
                    return Ok(0);
                }
            }
            if self.arena.children_count(t2) == 0 {
                return Ok(OBJECT_MATCH);
            }
            let id = self.arena.child(t2, 0);
            // a parameter with only a default value matches anything
            if self.arena.kind(id) == NodeKind::Set {
                return Ok(OBJECT_MATCH);
            }
            if self.arena.type_link(id).is_none() {
                let Some(resolution) = self.resolve_name(t2, id, None, SearchFlags::none())? else {
                    return Ok(0);
                };
                self.arena.set_type_link(id, resolution);
            }
            t2 = id;
        }

        if self.arena.type_link(t1).is_none() {
            self.type_expr(t1)?;
            if self.arena.type_link(t1).is_none() {
                // cannot determine the type of the input; weakest accept
                return Ok(1);
            }
        }
        let tp1 = self.arena.type_link(t1).unwrap();
        let Some(tp2) = self.arena.type_link(t2) else {
            return Ok(1);
        };

        // the exact same type?
        if tp1 == tp2 {
            return Ok(1);
        }

        // if one of the types is Object, that is a match too
        let object = self.resolve_internal_type(t1, "Object")?;
        if tp1 == object {
            // untyped variables match whatever tp2 is
            return Ok(1);
        }
        if tp2 == object {
            // a "bad" match; anything else will be better
            return Ok(OBJECT_MATCH);
        }

        // still not equal; check the ancestors of tp1 when permitted
        if !any_ancestor {
            return Ok(0);
        }
        if self.arena.kind(tp1) != NodeKind::Class {
            return Ok(0);
        }

        let mut visited = Vec::new();
        Ok(self.find_class(tp1, tp2, 2, &mut visited)?)
    }

    /// Depth of `type_node` among the ancestors of `class_type`, 0 when
    /// unrelated
    ///
    /// The visited list keeps a malformed derivation graph from looping.
    pub(crate) fn find_class(
        &mut self,
        class_type: NodeId,
        type_node: NodeId,
        depth: usize,
        visited: &mut Vec<NodeId>,
    ) -> Result<usize, FatalError> {
        if visited.contains(&class_type) {
            return Ok(0);
        }
        visited.push(class_type);

        let children = self.arena.children(class_type);
        self.arena.lock(class_type);
        let result = (|| -> Result<usize, FatalError> {
            // direct ancestors first
            for clause in children.iter() {
                let kind = self.arena.kind(*clause);
                if kind != NodeKind::Extends && kind != NodeKind::Implements {
                    continue;
                }
                if self.arena.children_count(*clause) == 0 {
                    continue;
                }
                for super_name in self.clause_types(*clause) {
                    if self.arena.instance(super_name).is_none() {
                        self.expression(super_name)?;
                    }
                    let Some(super_class) = self.arena.instance(super_name) else {
                        self.diags.error(
                            ErrorKind::InvalidExpression,
                            self.arena.position(*clause),
                            "cannot find the type named in an 'extends' or 'implements' list.",
                        );
                        continue;
                    };
                    if super_class == type_node {
                        return Ok(depth);
                    }
                }
            }

            // then deeper ancestors
            let mut result = 0usize;
            for clause in children.iter() {
                let kind = self.arena.kind(*clause);
                if kind != NodeKind::Extends && kind != NodeKind::Implements {
                    continue;
                }
                for super_name in self.clause_types(*clause) {
                    let Some(super_class) = self.arena.instance(super_name) else {
                        continue;
                    };
                    let r = self.find_class(super_class, type_node, depth + 1, visited)?;
                    if r > result {
                        result = r;
                    }
                }
            }
            Ok(result)
        })();
        self.arena.unlock(class_type);
        result
    }

    /// The type name nodes of one `extends`/`implements` clause
    pub(crate) fn clause_types(&self, clause: NodeId) -> Vec<NodeId> {
        match self.arena.get_child(clause, 0) {
            Some(name) if self.arena.kind(name) == NodeKind::List => self.arena.children(name),
            Some(name) => vec![name],
            None => Vec::new(),
        }
    }

    /// Whether `derived_class` is `super_class` or derives from it
    pub(crate) fn is_derived_from(
        &mut self,
        derived_class: NodeId,
        super_class: NodeId,
    ) -> Result<bool, FatalError> {
        let mut visited = Vec::new();
        self.is_derived_from_inner(derived_class, super_class, &mut visited)
    }

    fn is_derived_from_inner(
        &mut self,
        derived_class: NodeId,
        super_class: NodeId,
        visited: &mut Vec<NodeId>,
    ) -> Result<bool, FatalError> {
        if derived_class == super_class {
            return Ok(true);
        }
        if visited.contains(&derived_class) {
            return Ok(false);
        }
        visited.push(derived_class);

        let children = self.arena.children(derived_class);
        for clause in children {
            let kind = self.arena.kind(clause);
            if kind != NodeKind::Extends && kind != NodeKind::Implements {
                continue;
            }
            for type_name in self.clause_types(clause) {
                self.link_type(type_name)?;
                let Some(link) = self.arena.instance(type_name) else {
                    continue;
                };
                if self.is_derived_from_inner(link, super_class, visited)? {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}
