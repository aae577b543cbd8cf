//! Statement validation and control flow resolution.
//!
//! Each statement kind gets its placement and adjacency rules checked
//! (`try`/`catch`/`finally` chains, `case`/`default` inside `switch`),
//! and the transition statements (`break`, `continue`, `goto`) receive
//! their `GOTO_EXIT`/`GOTO_ENTER` cross-edges. Labels are collected in a
//! first scan per function, program or package.

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeFlags, NodeKind},
};

use super::Compiler;

impl<'a> Compiler<'a> {
    /// `if` (2 or 3 children): condition, then arm, optional else arm
    pub(crate) fn if_directive(&mut self, if_node: NodeId) -> Result<(), FatalError> {
        let max = self.arena.children_count(if_node);
        if max < 2 {
            return Ok(());
        }
        self.arena.lock(if_node);
        let result: Result<(), FatalError> = (|| {
            self.expression(self.arena.child(if_node, 0))?;
            self.directive_list(self.arena.child(if_node, 1))?;
            if max == 3 {
                // else part
                self.directive_list(self.arena.child(if_node, 2))?;
            }
            Ok(())
        })();
        self.arena.unlock(if_node);
        result
    }

    /// `while` (2 children): constant conditions are the optimizer's
    /// business, not ours
    pub(crate) fn while_directive(&mut self, while_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(while_node) != 2 {
            return Ok(());
        }
        self.arena.lock(while_node);
        let result: Result<(), FatalError> = (|| {
            self.expression(self.arena.child(while_node, 0))?;
            self.directive_list(self.arena.child(while_node, 1))?;
            Ok(())
        })();
        self.arena.unlock(while_node);
        result
    }

    /// `do` (2 children): body first, then the condition
    pub(crate) fn do_directive(&mut self, do_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(do_node) != 2 {
            return Ok(());
        }
        self.arena.lock(do_node);
        let result: Result<(), FatalError> = (|| {
            self.directive_list(self.arena.child(do_node, 0))?;
            self.expression(self.arena.child(do_node, 1))?;
            Ok(())
        })();
        self.arena.unlock(do_node);
        result
    }

    /// `for`: either `for (item in collection) body` (3 children) or
    /// `for (init; cond; step) body` (4 children); each clause may be
    /// `Empty`
    pub(crate) fn for_directive(&mut self, for_node: NodeId) -> Result<(), FatalError> {
        let max = self.arena.children_count(for_node);
        if max < 3 {
            return Ok(());
        }
        self.arena.lock(for_node);
        let result: Result<(), FatalError> = (|| {
            for idx in 0..max {
                let child = self.arena.child(for_node, idx);
                match self.arena.kind(child) {
                    NodeKind::Empty => {}
                    NodeKind::DirectiveList => {
                        self.directive_list(child)?;
                    }
                    NodeKind::Var => self.var(child)?,
                    _ => self.expression(child)?,
                }
            }
            Ok(())
        })();
        self.arena.unlock(for_node);
        result
    }

    /// `switch` (2 children): the directive list must start with a `case`
    /// or `default` label
    pub(crate) fn switch_directive(&mut self, switch_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(switch_node) != 2 {
            return Ok(());
        }
        self.arena.lock(switch_node);
        let result: Result<(), FatalError> = (|| {
            self.expression(self.arena.child(switch_node, 0))?;

            let list = self.arena.child(switch_node, 1);
            if self.arena.children_count(list) > 0 {
                let first = self.arena.child(list, 0);
                let kind = self.arena.kind(first);
                if kind != NodeKind::Case && kind != NodeKind::Default {
                    self.diags.error(
                        ErrorKind::InaccessibleStatement,
                        self.arena.position(switch_node),
                        "the list of instructions of a 'switch()' statement must start with a 'case' or 'default' label.",
                    );
                }
            }

            self.directive_list(list)?;
            Ok(())
        })();
        self.arena.unlock(switch_node);

        // reset the DEFAULT flag in case we get compiled a second time
        self.arena
            .set_flag(switch_node, NodeFlags::SwitchDefault, false);

        // duplicate case detection is not performed; cases can be dynamic
        result
    }

    /// `case`: only valid directly inside a `switch` body; a range needs
    /// the `in` or default switch operator
    pub(crate) fn case_directive(&mut self, case_node: NodeId) -> Result<(), FatalError> {
        let Some(switch_node) = self.grandparent(case_node) else {
            return Ok(());
        };
        if self.arena.kind(switch_node) != NodeKind::Switch {
            self.diags.error(
                ErrorKind::ImproperStatement,
                self.arena.position(case_node),
                "a 'case' statement can only be used within a 'switch()' block.",
            );
            return Ok(());
        }

        let max = self.arena.children_count(case_node);
        if max > 0 {
            self.expression(self.arena.child(case_node, 0))?;
            if max > 1 {
                // the switch operator is carried as the integer payload of
                // the switch node; 0 means default (unknown)
                let operator = self.switch_operator(switch_node);
                match operator {
                    None | Some(NodeKind::In) => {}
                    _ => {
                        self.diags.error(
                            ErrorKind::InvalidExpression,
                            self.arena.position(case_node),
                            "a range on a 'case' statement can only be used with the 'in' and 'default' switch() operators.",
                        );
                    }
                }
                self.expression(self.arena.child(case_node, 1))?;
            }
        }
        Ok(())
    }

    /// `default`: only valid inside a `switch`, and at most once
    pub(crate) fn default_directive(&mut self, default_node: NodeId) -> Result<(), FatalError> {
        let Some(switch_node) = self.grandparent(default_node) else {
            return Ok(());
        };
        if self.arena.kind(switch_node) != NodeKind::Switch {
            self.diags.error(
                ErrorKind::InaccessibleStatement,
                self.arena.position(default_node),
                "a 'default' statement can only be used within a 'switch()' block.",
            );
            return Ok(());
        }

        if self.arena.flag(switch_node, NodeFlags::SwitchDefault) {
            self.diags.error(
                ErrorKind::ImproperStatement,
                self.arena.position(default_node),
                "only one 'default' statement can be used within one 'switch()'.",
            );
        } else {
            self.arena
                .set_flag(switch_node, NodeFlags::SwitchDefault, true);
        }
        Ok(())
    }

    /// `try` (1 child): must be followed by a `catch` or a `finally`
    pub(crate) fn try_directive(&mut self, try_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(try_node) != 1 {
            return Ok(());
        }

        let mut correct = false;
        if let Some(parent) = self.arena.parent(try_node) {
            let offset = self.arena.offset_of(try_node) + 1;
            if offset < self.arena.children_count(parent) {
                let next = self.arena.child(parent, offset);
                let kind = self.arena.kind(next);
                if kind == NodeKind::Catch || kind == NodeKind::Finally {
                    correct = true;
                }
            }
        }
        if !correct {
            self.diags.error(
                ErrorKind::InvalidTry,
                self.arena.position(try_node),
                "a 'try' statement needs to be followed by at least one of 'catch' or 'finally'.",
            );
        }

        self.directive_list(self.arena.child(try_node, 0))?;
        Ok(())
    }

    /// `catch` (2 children): must follow a `try` or a typed `catch`; only
    /// the last catch of a chain may be untyped
    pub(crate) fn catch_directive(&mut self, catch_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(catch_node) != 2 {
            return Ok(());
        }

        let mut correct = false;
        if let Some(parent) = self.arena.parent(catch_node) {
            let offset = self.arena.offset_of(catch_node);
            if offset > 0 {
                let prev = self.arena.child(parent, offset - 1);
                match self.arena.kind(prev) {
                    NodeKind::Try => correct = true,
                    NodeKind::Catch => {
                        correct = true;
                        // syntactically correct, but the previous catch
                        // must clearly be typed
                        if !self.arena.flag(prev, NodeFlags::Typed) {
                            self.diags.error(
                                ErrorKind::InvalidType,
                                self.arena.position(catch_node),
                                "only the last 'catch' statement can have a parameter without a valid type.",
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
        if !correct {
            self.diags.error(
                ErrorKind::ImproperStatement,
                self.arena.position(catch_node),
                "a 'catch' statement needs to be preceded by a 'try' or another typed 'catch' statement.",
            );
        }

        let parameters_node = self.arena.child(catch_node, 0);
        self.parameters(parameters_node)?;
        if self.arena.children_count(parameters_node) > 0 {
            let param = self.arena.child(parameters_node, 0);
            self.arena.set_flag(param, NodeFlags::Catch, true);
        }

        self.directive_list(self.arena.child(catch_node, 1))?;
        Ok(())
    }

    /// `finally` (1 child): must follow a `try` or a `catch`
    pub(crate) fn finally_directive(&mut self, finally_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(finally_node) != 1 {
            return Ok(());
        }

        let mut correct = false;
        if let Some(parent) = self.arena.parent(finally_node) {
            let offset = self.arena.offset_of(finally_node);
            if offset > 0 {
                let prev = self.arena.child(parent, offset - 1);
                let kind = self.arena.kind(prev);
                if kind == NodeKind::Try || kind == NodeKind::Catch {
                    correct = true;
                }
            }
        }
        if !correct {
            self.diags.error(
                ErrorKind::ImproperStatement,
                self.arena.position(finally_node),
                "a 'finally' statement needs to be preceded by a 'try' or 'catch' statement.",
            );
        }

        self.directive_list(self.arena.child(finally_node, 0))?;
        Ok(())
    }

    /// `throw` (1 child)
    pub(crate) fn throw_directive(&mut self, throw_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(throw_node) != 1 {
            return Ok(());
        }
        self.expression(self.arena.child(throw_node, 0))
    }

    /// `return`: only valid inside a function; a Void function or a
    /// constructor returns nothing, everything else returns a value
    pub(crate) fn return_directive(
        &mut self,
        return_node: NodeId,
    ) -> Result<Option<NodeId>, FatalError> {
        let mut function: Option<NodeId> = None;
        let mut parent = self.arena.parent(return_node);
        while let Some(current) = parent {
            match self.arena.kind(current) {
                NodeKind::Function => {
                    function = Some(current);
                    break;
                }
                NodeKind::Class
                | NodeKind::Interface
                | NodeKind::Package
                | NodeKind::Program
                | NodeKind::Root => break,
                _ => {}
            }
            parent = self.arena.parent(current);
        }

        let Some(function) = function else {
            self.diags.error(
                ErrorKind::ImproperStatement,
                self.arena.position(return_node),
                "'return' can only be used inside a function.",
            );
            return Ok(None);
        };

        if self.arena.flag(function, NodeFlags::Never) {
            self.diags.error(
                ErrorKind::ImproperStatement,
                self.arena.position(return_node),
                format!(
                    "'return' was used inside '{}', a function Never returning.",
                    self.arena.string(function)
                ),
            );
        }

        let returns_void =
            self.arena.flag(function, NodeFlags::Void) || self.is_constructor(function);
        if self.arena.children_count(return_node) == 1 {
            if returns_void {
                self.diags.error(
                    ErrorKind::ImproperStatement,
                    self.arena.position(return_node),
                    format!(
                        "'return' was used with an expression inside '{}', a function returning Void.",
                        self.arena.string(function)
                    ),
                );
            }
            self.expression(self.arena.child(return_node, 0))?;
        } else if !returns_void {
            self.diags.error(
                ErrorKind::ImproperStatement,
                self.arena.position(return_node),
                format!(
                    "'return' was used without an expression inside '{}', a function which expected a value to be returned.",
                    self.arena.string(function)
                ),
            );
        }

        Ok(Some(function))
    }

    /// `break`/`continue`: selects the target loop or switch and records
    /// it as the GOTO_EXIT cross-edge
    pub(crate) fn break_continue(&mut self, break_node: NodeId) -> Result<(), FatalError> {
        let label = self.arena.string(break_node).to_string();
        let no_label = label.is_empty();
        // an unlabelled continue never targets a switch
        let accept_switch = !no_label || self.arena.kind(break_node) == NodeKind::Break;
        let mut found_switch = false;

        let mut parent = self.arena.parent(break_node);
        let target = loop {
            let Some(current) = parent else {
                return Ok(());
            };
            let kind = self.arena.kind(current);
            if kind == NodeKind::Switch {
                found_switch = true;
            }
            if (kind == NodeKind::Switch && accept_switch)
                || kind == NodeKind::For
                || kind == NodeKind::Do
                || kind == NodeKind::While
            {
                if no_label {
                    // just break the current switch, for, while or do
                    break current;
                }
                // otherwise the statement must be labelled with the
                // requested name
                let offset = self.arena.offset_of(current);
                if offset > 0 {
                    if let Some(statement_parent) = self.arena.parent(current) {
                        let previous = self.arena.child(statement_parent, offset - 1);
                        if self.arena.kind(previous) == NodeKind::Label
                            && self.arena.string(previous) == label
                        {
                            break current;
                        }
                    }
                }
            }
            if matches!(
                kind,
                NodeKind::Function
                    | NodeKind::Program
                    | NodeKind::Class
                    | NodeKind::Interface
                    | NodeKind::Package
            ) {
                // a break/continue outside a loop or switch, or the label
                // was not found
                if no_label {
                    if found_switch {
                        self.diags.error(
                            ErrorKind::ImproperStatement,
                            self.arena.position(break_node),
                            "you cannot use a continue statement outside a loop (and you need a label to make it work with a switch statement).",
                        );
                    } else {
                        self.diags.error(
                            ErrorKind::ImproperStatement,
                            self.arena.position(break_node),
                            "you cannot use a break or continue instruction outside a loop or switch statement.",
                        );
                    }
                } else {
                    self.diags.error(
                        ErrorKind::LabelNotFound,
                        self.arena.position(break_node),
                        format!(
                            "could not find a loop or switch statement labelled '{label}' for this break or continue."
                        ),
                    );
                }
                return Ok(());
            }
            parent = self.arena.parent(current);
        };

        // we only mark which node is to be reached; the tree consumer
        // programs the actual unwinding the way it needs to
        self.arena.set_goto_exit(break_node, target);
        Ok(())
    }

    /// `goto`: finds the label in the enclosing function, program or
    /// package, and the common ancestor to unwind to
    pub(crate) fn goto_directive(&mut self, goto_node: NodeId) -> Result<(), FatalError> {
        let name = self.arena.string(goto_node).to_string();
        let mut parents: Vec<NodeId> = Vec::new();
        let mut label: Option<NodeId> = None;

        let mut parent = self.arena.parent(goto_node);
        while label.is_none() {
            let Some(current) = parent else {
                return Err(self.internal_error(
                    goto_node,
                    "out of parents before a function, program or package parent",
                ));
            };
            match self.arena.kind(current) {
                NodeKind::Class | NodeKind::Interface => {
                    self.diags.error(
                        ErrorKind::ImproperStatement,
                        self.arena.position(goto_node),
                        "cannot have a GOTO instruction in a 'class' or 'interface'.",
                    );
                    return Ok(());
                }
                NodeKind::Function | NodeKind::Package | NodeKind::Program => {
                    match self.arena.find_label(current, &name) {
                        Some(found) => label = Some(found),
                        None => {
                            self.diags.error(
                                ErrorKind::LabelNotFound,
                                self.arena.position(goto_node),
                                format!("label '{name}' for goto instruction not found."),
                            );
                            return Ok(());
                        }
                    }
                }
                _ => {}
            }
            parents.push(current);
            parent = self.arena.parent(current);
        }
        let label = label.unwrap();
        self.arena.set_goto_enter(goto_node, label);

        // the hardest part: find the first frame common to the goto and
        // the label, for correct scope unwinding
        let mut parent = self.arena.parent(label);
        loop {
            let Some(current) = parent else {
                return Err(
                    self.internal_error(goto_node, "no common parent for a goto and its label")
                );
            };
            if parents.contains(&current) {
                self.arena.set_goto_exit(goto_node, current);
                return Ok(());
            }
            parent = self.arena.parent(current);
        }
    }

    /// `with` (2 children): the object may not be `this`; the with scope
    /// is only active while its directive list compiles
    pub(crate) fn with_directive(&mut self, with_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(with_node) != 2 {
            // invalid, ignore
            return Ok(());
        }
        self.arena.lock(with_node);
        let result: Result<(), FatalError> = (|| {
            let object = self.arena.child(with_node, 0);
            if self.arena.kind(object) == NodeKind::This {
                self.diags.error(
                    ErrorKind::InvalidExpression,
                    self.arena.position(object),
                    "'with' cannot use 'this' as an object.",
                );
            }

            self.expression(object)?;

            let mark = self.scope_stack.mark();
            self.scope_stack.push_with(object);
            let result = self.directive_list(self.arena.child(with_node, 1));
            self.scope_stack.restore(mark);
            result?;
            Ok(())
        })();
        self.arena.unlock(with_node);
        result
    }

    /// Collects the labels of a function, program or package body
    ///
    /// The scan skips nested functions, classes, variables and expression
    /// subtrees: labels do not escape those.
    pub(crate) fn find_labels(&mut self, function: NodeId, node: NodeId) -> Result<(), FatalError> {
        match self.arena.kind(node) {
            NodeKind::Label => {
                let name = self.arena.string(node).to_string();
                match self.arena.find_label(function, &name) {
                    // a re-scan of the same label is not a duplicate
                    Some(existing) if existing == node => {}
                    Some(_) => {
                        self.diags.error(
                            ErrorKind::Duplicates,
                            self.arena.position(node),
                            format!(
                                "label '{name}' defined twice in the same program, package or function."
                            ),
                        );
                    }
                    None => self.arena.add_label(function, node),
                }
                return Ok(());
            }

            // sub-declarations and expressions are skipped
            NodeKind::Function
            | NodeKind::Class
            | NodeKind::Interface
            | NodeKind::Enum
            | NodeKind::Var
            | NodeKind::Package
            | NodeKind::Program
            | NodeKind::Call
            | NodeKind::Member
            | NodeKind::New
            | NodeKind::Delete
            | NodeKind::Increment
            | NodeKind::Decrement
            | NodeKind::PostIncrement
            | NodeKind::PostDecrement => return Ok(()),

            kind if kind.is_assignment() => return Ok(()),

            _ => {}
        }

        let children = self.arena.children(node);
        self.arena.lock(node);
        let result: Result<(), FatalError> = (|| {
            for child in children {
                self.find_labels(function, child)?;
            }
            Ok(())
        })();
        self.arena.unlock(node);
        result
    }

    /// The operator a switch compares with, carried as a child kind tag
    /// on the switch node; `None` is the unknown/default operator
    fn switch_operator(&self, switch_node: NodeId) -> Option<NodeKind> {
        let code = self.arena.integer(switch_node);
        match code {
            0 => None,
            1 => Some(NodeKind::In),
            2 => Some(NodeKind::Equal),
            3 => Some(NodeKind::StrictlyEqual),
            _ => Some(NodeKind::Unknown),
        }
    }

    fn grandparent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.parent(node).and_then(|p| self.arena.parent(p))
    }
}
