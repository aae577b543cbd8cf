//! Operator overload lookup and mechanical rewrites.
//!
//! For unary, binary and compound assignment operators the rewriter
//! builds a synthetic identifier named after the operator symbol, with a
//! synthetic `left`/`right` parameter list carrying the operand types,
//! and searches the operand classes for a matching operator function.
//! When the operator is intrinsic the expression only receives its
//! INSTANCE and TYPE links; otherwise the node is rewritten in place
//! into `call(member(lhs, op), list(rhs))`. Post increment and decrement
//! keep their value semantics through a synthesized temporary variable.
//!
//! A plain assignment whose left side is an undeclared identifier
//! synthesizes the missing `var` in the nearest enclosing directive
//! list.

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeAttrs, NodeFlags, NodeKind},
};

use super::{Compiler, SearchFlags};

/// Name of the synthesized temporary holding a post inc/dec value
static TEMPORARY_VARIABLE: &str = "#temp_var#";

impl<'a> Compiler<'a> {
    /// Resolves a unary operator expression
    pub(crate) fn unary_operator(&mut self, expr: NodeId) -> Result<(), FatalError> {
        if self.arena.instance(expr).is_some() {
            // an intrinsic operator resolved on an earlier pass
            return Ok(());
        }
        let kind = self.arena.kind(expr);
        let Some(op) = kind.operator_symbol() else {
            return Err(self.internal_error(expr, "unary operator without a string"));
        };

        let left = self.arena.child(expr, 0);
        let Some(left_type) = self.arena.type_link(left) else {
            // operand not typed; nothing to look up
            return Ok(());
        };

        // synthetic `left` parameter carrying the operand type
        let l = self.arena.create_replacement(expr, NodeKind::Identifier);
        self.arena.set_string(l, "left");
        self.arena.set_type_link(l, left_type);

        let params = self.arena.create_replacement(expr, NodeKind::List);
        self.arena.append_child(params, l);

        let id = self.arena.create_replacement(expr, NodeKind::Identifier);
        self.arena.set_string(id, op);
        self.arena.append_child(id, params);

        // attach the synthetic identifier so scope lookups work
        let del = self.arena.children_count(expr);
        self.arena.append_child(expr, id);

        let mut funcs = 0usize;
        self.arena.lock(expr);
        let resolution =
            self.find_field(left_type, id, &mut funcs, Some(params), SearchFlags::none());
        self.arena.unlock(expr);
        self.arena.delete_child(expr, del);
        let resolution = match resolution? {
            Some(resolution) => Some(resolution),
            None if funcs > 0 => self.select_best_func(params)?,
            None => None,
        };

        let Some(resolution) = resolution else {
            self.diags.error(
                ErrorKind::InvalidOperator,
                self.arena.position(expr),
                format!("cannot apply operator '{op}' to this object."),
            );
            return Ok(());
        };

        let op_type = self.arena.type_link(resolution);

        if self.get_attribute(resolution, NodeAttrs::Intrinsic) {
            // incrementing or decrementing a constant is invalid even for
            // intrinsic operators
            if matches!(
                kind,
                NodeKind::Increment
                    | NodeKind::Decrement
                    | NodeKind::PostIncrement
                    | NodeKind::PostDecrement
            ) {
                if let Some(var) = self.arena.instance(left) {
                    let var_kind = self.arena.kind(var);
                    if (var_kind == NodeKind::Parameter || var_kind == NodeKind::Variable)
                        && self.arena.flag(var, NodeFlags::Const)
                    {
                        self.diags.error(
                            ErrorKind::CannotOverwriteConst,
                            self.arena.position(expr),
                            "cannot increment or decrement a constant variable or function parameters.",
                        );
                    }
                }
            }

            // intrinsic operators are kept as is
            self.arena.set_instance(expr, resolution);
            if let Some(op_type) = op_type {
                self.arena.set_type_link(expr, op_type);
            }
            return Ok(());
        }

        self.arena.set_instance(id, resolution);
        if let Some(op_type) = op_type {
            self.arena.set_type_link(id, op_type);
        }

        // not intrinsic: the lower layers only understand calls, so the
        // operator becomes one
        self.arena.delete_child(id, 0);
        self.arena.delete_child(expr, 0);

        let is_post = kind == NodeKind::PostIncrement || kind == NodeKind::PostDecrement;

        let call = self.arena.create_replacement(expr, NodeKind::Call);
        if let Some(op_type) = op_type {
            self.arena.set_type_link(call, op_type);
        }
        let member = self.arena.create_replacement(expr, NodeKind::Member);
        let function_type = self.resolve_internal_type(expr, "Function")?;
        self.arena.set_type_link(member, function_type);
        self.arena.append_child(call, member);

        let empty_list = self.arena.create_replacement(expr, NodeKind::List);
        if let Some(op_type) = op_type {
            self.arena.set_type_link(empty_list, op_type);
        }

        if is_post {
            // preserve the pre-modification value with a temporary:
            //     (#temp_var# = left, left.op(), #temp_var#)
            let post_list = self.arena.create_replacement(expr, NodeKind::List);
            if let Some(op_type) = op_type {
                self.arena.set_type_link(post_list, op_type);
            }

            let (_, temp_variable) = self.synthesize_variable(expr, TEMPORARY_VARIABLE);
            let temp_var = self.arena.create_replacement(expr, NodeKind::Identifier);
            self.arena.set_string(temp_var, TEMPORARY_VARIABLE);
            self.arena.set_instance(temp_var, temp_variable);
            let assignment = self.arena.create_replacement(expr, NodeKind::Assignment);
            self.arena.append_child(assignment, temp_var);
            self.arena.append_child(assignment, left);
            self.arena.append_child(post_list, assignment);

            // the call operates on the saved value
            let operand = self.arena.create_replacement(expr, NodeKind::Identifier);
            if self.arena.kind(left) == NodeKind::Identifier {
                let name = self.arena.string(left).to_string();
                self.arena.set_string(operand, name);
                if let Some(instance) = self.arena.instance(left) {
                    self.arena.set_instance(operand, instance);
                }
            } else {
                self.arena.set_string(operand, TEMPORARY_VARIABLE);
                self.arena.set_instance(operand, temp_variable);
            }
            self.arena.append_child(member, operand);
            self.arena.append_child(member, id);
            self.arena.append_child(call, empty_list);

            self.arena.append_child(post_list, call);
            let temp_read = self.arena.create_replacement(expr, NodeKind::Identifier);
            self.arena.set_string(temp_read, TEMPORARY_VARIABLE);
            self.arena.set_instance(temp_read, temp_variable);
            self.arena.append_child(post_list, temp_read);

            self.replace_expression(expr, post_list);
        } else {
            self.arena.append_child(member, left);
            self.arena.append_child(member, id);
            self.arena.append_child(call, empty_list);
            self.replace_expression(expr, call);
        }

        Ok(())
    }

    /// Resolves a binary operator expression
    pub(crate) fn binary_operator(&mut self, expr: NodeId) -> Result<(), FatalError> {
        if self.arena.instance(expr).is_some() {
            // an intrinsic operator resolved on an earlier pass
            return Ok(());
        }
        let Some(op) = self.arena.kind(expr).operator_symbol() else {
            return Err(self.internal_error(expr, "binary operator without a string"));
        };

        let left = self.arena.child(expr, 0);
        let Some(ltype) = self.arena.type_link(left) else {
            return Ok(());
        };
        let right = self.arena.child(expr, 1);
        let Some(rtype) = self.arena.type_link(right) else {
            return Ok(());
        };

        // synthetic `left`/`right` parameters carrying the operand types
        let l = self.arena.create_replacement(expr, NodeKind::Identifier);
        self.arena.set_string(l, "left");
        self.arena.set_type_link(l, ltype);
        let r = self.arena.create_replacement(expr, NodeKind::Identifier);
        self.arena.set_string(r, "right");
        self.arena.set_type_link(r, rtype);

        let params = self.arena.create_replacement(expr, NodeKind::List);
        self.arena.append_child(params, l);
        self.arena.append_child(params, r);

        let id = self.arena.create_replacement(expr, NodeKind::Identifier);
        self.arena.set_string(id, op);
        self.arena.append_child(id, params);

        let del = self.arena.children_count(expr);
        self.arena.append_child(expr, id);

        // search the left type for the operator first, then the right one
        let mut funcs = 0usize;
        self.arena.lock(expr);
        let mut resolution =
            self.find_field(ltype, id, &mut funcs, Some(params), SearchFlags::none());
        if matches!(resolution, Ok(None)) && funcs == 0 {
            resolution = self.find_field(rtype, id, &mut funcs, Some(params), SearchFlags::none());
        }
        self.arena.unlock(expr);
        self.arena.delete_child(expr, del);
        let resolution = match resolution? {
            Some(resolution) => Some(resolution),
            None if funcs > 0 => self.select_best_func(params)?,
            None => None,
        };

        let Some(resolution) = resolution else {
            self.diags.error(
                ErrorKind::InvalidOperator,
                self.arena.position(expr),
                format!("cannot apply operator '{op}' to these objects."),
            );
            return Ok(());
        };

        let op_type = self.arena.type_link(resolution);

        if self.get_attribute(resolution, NodeAttrs::Intrinsic) {
            // intrinsic operators are kept as is
            self.arena.set_instance(expr, resolution);
            if let Some(op_type) = op_type {
                self.arena.set_type_link(expr, op_type);
            }
            return Ok(());
        }

        self.arena.set_instance(id, resolution);
        if let Some(op_type) = op_type {
            self.arena.set_type_link(id, op_type);
        }
        self.arena.delete_child(id, 0);

        // move left and right into the new call expression
        self.arena.delete_child(expr, 1);
        self.arena.delete_child(expr, 0);

        let call = self.arena.create_replacement(expr, NodeKind::Call);
        if let Some(op_type) = op_type {
            self.arena.set_type_link(call, op_type);
        }
        let member = self.arena.create_replacement(expr, NodeKind::Member);
        let function_type = self.resolve_internal_type(expr, "Function")?;
        self.arena.set_type_link(member, function_type);
        self.arena.append_child(call, member);
        self.arena.append_child(member, left);
        self.arena.append_child(member, id);

        let list = self.arena.create_replacement(expr, NodeKind::List);
        if let Some(op_type) = op_type {
            self.arena.set_type_link(list, op_type);
        }
        self.arena.append_child(list, right);
        self.arena.append_child(call, list);

        self.replace_expression(expr, call);
        Ok(())
    }

    /// Resolves a plain assignment
    pub(crate) fn assignment_operator(&mut self, expr: NodeId) -> Result<(), FatalError> {
        let left = self.arena.child(expr, 0);
        // set when this assignment is also a definition
        let mut var_node: Option<NodeId> = None;
        let mut is_var = false;

        match self.arena.kind(left) {
            NodeKind::Identifier if self.arena.instance(left).is_some() => {
                // already wired to its variable by an earlier pass
            }

            NodeKind::Identifier => {
                // this may be like a VAR <name> = ...
                if let Some(resolution) =
                    self.resolve_name(left, left, None, SearchFlags::none())?
                {
                    let mut valid = false;
                    match self.arena.kind(resolution) {
                        NodeKind::Variable => {
                            if self.arena.flag(resolution, NodeFlags::Const) {
                                self.diags.error(
                                    ErrorKind::CannotOverwriteConst,
                                    self.arena.position(left),
                                    format!(
                                        "you cannot assign a value to the constant variable '{}'.",
                                        self.arena.string(resolution)
                                    ),
                                );
                            } else {
                                valid = true;
                            }
                        }
                        NodeKind::Parameter => {
                            if self.arena.flag(resolution, NodeFlags::Const) {
                                self.diags.error(
                                    ErrorKind::CannotOverwriteConst,
                                    self.arena.position(left),
                                    format!(
                                        "you cannot assign a value to the constant function parameter '{}'.",
                                        self.arena.string(resolution)
                                    ),
                                );
                            } else {
                                valid = true;
                            }
                        }
                        _ => {
                            self.diags.error(
                                ErrorKind::CannotOverload,
                                self.arena.position(left),
                                "you cannot assign but a variable or a function parameter.",
                            );
                        }
                    }
                    if valid {
                        self.arena.set_instance(left, resolution);
                        if let Some(type_link) = self.arena.type_link(resolution) {
                            self.arena.set_type_link(left, type_link);
                        }
                    }
                } else {
                    // it is a missing VAR; synthesize the declaration so
                    // the name exists from here on
                    is_var = true;
                    let name = self.arena.string(left).to_string();
                    let (var, variable) = self.synthesize_variable(left, &name);
                    self.arena.set_instance(left, variable);
                    var_node = Some(var);
                }
            }

            NodeKind::Member => {
                if self.arena.type_link(left).is_none() {
                    self.resolve_member(left, None, SearchFlags::Setter)?;

                    // setters are handled here because the member resolver
                    // has no access to the assignment that must become a
                    // call
                    if let Some(resolution) = self.arena.instance(left) {
                        if self.arena.kind(resolution) == NodeKind::Function
                            && self.arena.flag(resolution, NodeFlags::Setter)
                        {
                            self.rewrite_setter_assignment(expr, left)?;
                            return Ok(());
                        }
                    }
                }
            }

            _ => {
                self.expression(left)?;
            }
        }

        let right = self.arena.child(expr, 1);
        self.expression(right)?;

        if let Some(var_node) = var_node {
            self.arena.set_flag(var_node, NodeFlags::Defining, false);
        }

        if let Some(type_link) = self.arena.type_link(left) {
            self.arena.set_type_link(expr, type_link);
            return Ok(());
        }

        if !is_var {
            // left not typed: the assignment takes the type of the right
            // hand side
            if let Some(type_link) = self.arena.type_link(right) {
                self.arena.set_type_link(expr, type_link);
            }
        }

        Ok(())
    }

    /// Turns `obj.field = value` into `obj.<-field(value)` when the field
    /// resolved to a setter
    fn rewrite_setter_assignment(
        &mut self,
        expr: NodeId,
        left: NodeId,
    ) -> Result<(), FatalError> {
        let right = self.arena.child(expr, 1);

        // rename the field to match the setter; the field node is an
        // identifier, a v-identifier or a string so this always works
        let field = self.arena.child(left, 1);
        let setter_name = format!("<-{}", self.arena.string(field));
        self.arena.set_string(field, setter_name);

        // the call takes the assigned value as its single parameter
        let params = self.arena.create_replacement(expr, NodeKind::List);
        self.arena.replace_child(expr, 1, params);
        self.arena.append_child(params, right);

        self.arena.set_kind(expr, NodeKind::Call);
        Ok(())
    }

    /// Synthesizes a `var`/`variable` pair named `name` and registers it
    /// with the frames enclosing `anchor`
    ///
    /// The variable is born fully defined: there is no declaration site
    /// to compile later.
    fn synthesize_variable(&mut self, anchor: NodeId, name: &str) -> (NodeId, NodeId) {
        let var_node = self.arena.create_replacement(anchor, NodeKind::Var);
        self.arena.set_flag(var_node, NodeFlags::ToAdd, true);
        self.arena.set_flag(var_node, NodeFlags::Defining, true);

        let variable = self.arena.create_replacement(anchor, NodeKind::Variable);
        self.arena.set_string(variable, name);
        self.arena.set_flag(variable, NodeFlags::ToAdd, true);
        self.arena.set_flag(variable, NodeFlags::Defined, true);
        self.arena.set_flag(variable, NodeFlags::Compiled, true);
        self.arena.append_child(var_node, variable);

        let mut last_directive: Option<NodeId> = None;
        let mut parent = self.arena.parent(anchor);
        while let Some(current) = parent {
            match self.arena.kind(current) {
                NodeKind::DirectiveList => last_directive = Some(current),
                NodeKind::Function => {
                    self.arena.set_flag(variable, NodeFlags::Local, true);
                    self.arena.add_variable(current, variable);
                    break;
                }
                NodeKind::Program
                | NodeKind::Class
                | NodeKind::Interface
                | NodeKind::Package => break,
                _ => {}
            }
            parent = self.arena.parent(current);
        }

        // we cannot insert the child in our locked parent here; the
        // variable is recorded on the directive list and hoisted to its
        // top once the list unlocks
        if let Some(last_directive) = last_directive {
            self.arena.add_variable(last_directive, variable);
            self.arena
                .set_flag(last_directive, NodeFlags::NewVariables, true);
        }

        (var_node, variable)
    }

    /// Replaces `expr` with `replacement` under the parent of `expr`
    ///
    /// In-place replacement is immediate even under a lock since it does
    /// not shift sibling indices.
    fn replace_expression(&mut self, expr: NodeId, replacement: NodeId) {
        let Some(parent) = self.arena.parent(expr) else {
            return;
        };
        let offset = self.arena.offset_of(expr);
        self.arena.replace_child(parent, offset, replacement);
    }
}
