//! Declaration checks: variables, functions, parameters and attributes.
//!
//! Variables register themselves with their enclosing frame and compile
//! their initializer at most once. Functions are classified as members,
//! package functions or free functions; attributes that only make sense
//! on members are rejected elsewhere, a function marked `final` in a
//! super class may not be redefined, and a scope may not hold two
//! functions with the same name and prototype, nor a function and a
//! variable sharing a name.

use simplelog::debug;

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeAttrs, NodeFlags, NodeKind},
};

use super::Compiler;

impl<'a> Compiler<'a> {
    /// Resolves the variables of a `var` directive
    ///
    /// At the directive level only initializers with side effects are
    /// compiled; a variable used as an attribute would otherwise often
    /// end up as a spurious error.
    pub(crate) fn var(&mut self, var_node: NodeId) -> Result<(), FatalError> {
        let count = self.arena.children_count(var_node);
        self.arena.lock(var_node);
        let result: Result<(), FatalError> = (|| {
            for v in 0..count {
                let variable_node = self.arena.child(var_node, v);
                self.variable(variable_node, true)?;
            }
            Ok(())
        })();
        self.arena.unlock(var_node);
        result
    }

    /// Resolves one variable declaration
    ///
    /// With `side_effects_only` the initializer is compiled only when it
    /// has side effects. Once `Compiled` is set the initializer is never
    /// resolved again.
    pub(crate) fn variable(
        &mut self,
        variable_node: NodeId,
        side_effects_only: bool,
    ) -> Result<(), FatalError> {
        let max = self.arena.children_count(variable_node);

        // if already defined, only catch up on a skipped initializer
        if self.arena.flag(variable_node, NodeFlags::Defined) {
            if !side_effects_only {
                if !self.arena.flag(variable_node, NodeFlags::Compiled) {
                    for idx in 0..max {
                        let child = self.arena.child(variable_node, idx);
                        if self.arena.kind(child) == NodeKind::Set {
                            let expr = self.arena.child(child, 0);
                            self.expression(expr)?;
                            self.arena
                                .set_flag(variable_node, NodeFlags::Compiled, true);
                            break;
                        }
                    }
                }
                self.arena.set_flag(variable_node, NodeFlags::InUse, true);
            }
            return Ok(());
        }

        self.arena.set_flag(variable_node, NodeFlags::Defined, true);
        self.arena
            .set_flag(variable_node, NodeFlags::InUse, !side_effects_only);

        let constant = self.arena.flag(variable_node, NodeFlags::Const);

        // make sure the attributes are evaluated before the node is locked
        self.get_attribute(variable_node, NodeAttrs::Defined);

        let mut set = 0usize;
        self.arena.lock(variable_node);
        let result: Result<(), FatalError> = (|| {
            for idx in 0..max {
                let child = self.arena.child(variable_node, idx);
                match self.arena.kind(child) {
                    NodeKind::Unknown => {}

                    NodeKind::Set => {
                        let expr = self.arena.child(child, 0);
                        let expr_kind = self.arena.kind(expr);
                        if expr_kind == NodeKind::Private || expr_kind == NodeKind::Public {
                            // this is a list of attributes
                            set += 1;
                        } else if set == 0 && (!side_effects_only || self.has_side_effects(expr)) {
                            self.expression(expr)?;
                            self.arena
                                .set_flag(variable_node, NodeFlags::Compiled, true);
                            self.arena.set_flag(variable_node, NodeFlags::InUse, true);
                        }
                        set += 1;
                    }

                    _ => {
                        // the type of the variable
                        self.expression(child)?;
                        if self.arena.type_link(variable_node).is_none() {
                            if let Some(instance) = self.arena.instance(child) {
                                self.arena.set_type_link(variable_node, instance);
                            }
                        }
                    }
                }
            }
            Ok(())
        })();
        self.arena.unlock(variable_node);
        result?;

        if set > 1 {
            self.arena.set_kind(variable_node, NodeKind::VarAttributes);
            if !constant {
                self.diags.error(
                    ErrorKind::NeedConst,
                    self.arena.position(variable_node),
                    format!(
                        "a variable cannot be a list of attributes unless it is made constant and '{}' is not constant.",
                        self.arena.string(variable_node)
                    ),
                );
            }
        } else {
            self.register_variable(variable_node);
        }

        Ok(())
    }

    /// Records the variable in the first enclosing directive list and
    /// classifies it as local, member or global
    ///
    /// The per-frame variable lists let the consumer drop local
    /// variables whenever a frame is left.
    fn register_variable(&mut self, variable_node: NodeId) {
        let mut first = true;
        let mut parent = self.arena.parent(variable_node);
        while let Some(current) = parent {
            match self.arena.kind(current) {
                NodeKind::DirectiveList => {
                    if first {
                        first = false;
                        self.arena.add_variable(current, variable_node);
                    }
                }
                NodeKind::Function => {
                    self.arena.set_flag(variable_node, NodeFlags::Local, true);
                    if first {
                        self.arena.add_variable(current, variable_node);
                    }
                    return;
                }
                NodeKind::Class | NodeKind::Interface => {
                    self.arena.set_flag(variable_node, NodeFlags::Member, true);
                    if first {
                        self.arena.add_variable(current, variable_node);
                    }
                    return;
                }
                NodeKind::Program | NodeKind::Package => {
                    // the variable is global
                    if first {
                        self.arena.add_variable(current, variable_node);
                    }
                    return;
                }
                _ => {}
            }
            parent = self.arena.parent(current);
        }
    }

    /// Whether an expression subtree can change state when evaluated
    pub(crate) fn has_side_effects(&self, expr: NodeId) -> bool {
        let kind = self.arena.kind(expr);
        if kind.is_assignment()
            || matches!(
                kind,
                NodeKind::Call
                    | NodeKind::New
                    | NodeKind::Delete
                    | NodeKind::Increment
                    | NodeKind::Decrement
                    | NodeKind::PostIncrement
                    | NodeKind::PostDecrement
            )
        {
            return true;
        }
        let count = self.arena.children_count(expr);
        (0..count).any(|idx| self.has_side_effects(self.arena.child(expr, idx)))
    }

    /// Checks and compiles a function declaration
    pub(crate) fn function(&mut self, function_node: NodeId) -> Result<(), FatalError> {
        if self.get_attribute(function_node, NodeAttrs::Unused)
            || self.get_attribute(function_node, NodeAttrs::False)
        {
            return Ok(());
        }
        debug!("function: {}", self.arena.string(function_node));

        // search for the parent of this function; a class, interface or
        // package parent makes it a member or package function, anything
        // else a local or global definition
        let mut member = false;
        let mut package = false;
        let mut owner: Option<NodeId> = None;
        let mut list: Option<NodeId> = None;
        let mut parent = self.arena.parent(function_node);
        while let Some(current) = parent {
            match self.arena.kind(current) {
                NodeKind::Class | NodeKind::Interface => {
                    member = true;
                    owner = Some(current);
                    break;
                }
                NodeKind::Package => {
                    package = true;
                    owner = Some(current);
                    break;
                }
                NodeKind::Catch
                | NodeKind::Do
                | NodeKind::Else
                | NodeKind::Finally
                | NodeKind::For
                | NodeKind::Function
                | NodeKind::If
                | NodeKind::Program
                | NodeKind::Root
                | NodeKind::Switch
                | NodeKind::Try
                | NodeKind::While
                | NodeKind::With => break,
                NodeKind::DirectiveList => {
                    if list.is_none() {
                        list = Some(current);
                    }
                }
                _ => {}
            }
            parent = self.arena.parent(current);
        }

        // these attributes imply a function member defined in a class
        if (self.get_attribute(function_node, NodeAttrs::Abstract)
            || self.get_attribute(function_node, NodeAttrs::Static)
            || self.get_attribute(function_node, NodeAttrs::Protected)
            || self.get_attribute(function_node, NodeAttrs::Virtual)
            || self.get_attribute(function_node, NodeAttrs::Constructor)
            || self.get_attribute(function_node, NodeAttrs::Final))
            && !member
        {
            self.diags.error(
                ErrorKind::InvalidAttributes,
                self.arena.position(function_node),
                format!(
                    "function \"{}\" was defined with an attribute which can only be used with a function member inside a class definition.",
                    self.arena.string(function_node)
                ),
            );
        }
        if self.arena.flag(function_node, NodeFlags::Operator) && !member {
            self.diags.error(
                ErrorKind::InvalidOperator,
                self.arena.position(function_node),
                format!(
                    "operator \"{}\" can only be defined inside a class definition.",
                    self.arena.string(function_node)
                ),
            );
        }

        // private also works at package scope
        if self.get_attribute(function_node, NodeAttrs::Private) && !package && !member {
            self.diags.error(
                ErrorKind::InvalidAttributes,
                self.arena.position(function_node),
                format!(
                    "function \"{}\" was defined with an attribute which can only be used inside a class or package definition.",
                    self.arena.string(function_node)
                ),
            );
        }

        if member {
            let class_node = owner.unwrap();
            // a member may not redefine a function marked final in a
            // super class
            if self.check_final_functions(function_node, class_node)? {
                self.diags.error(
                    ErrorKind::CannotOverload,
                    self.arena.position(function_node),
                    format!(
                        "function \"{}\" was marked as final in a super class and thus it cannot be defined in class \"{}\".",
                        self.arena.string(function_node),
                        self.arena.string(class_node)
                    ),
                );
            }
            self.check_unique_functions(function_node, class_node, true)?;
        } else if let Some(list) = list {
            self.check_unique_functions(function_node, list, false)?;
        }

        // when the function calls itself the tree would be mutated while
        // locked, so the type resolves right here
        if !self.define_function_type(function_node)? {
            return Ok(());
        }

        let children = self.arena.children(function_node);
        let mut end_list: Option<NodeId> = None;
        let mut body: Option<NodeId> = None;
        self.arena.lock(function_node);
        let result: Result<(), FatalError> = (|| {
            for child in children {
                match self.arena.kind(child) {
                    NodeKind::Parameters => {
                        // parse the parameters, including default values
                        self.parameters(child)?;
                    }
                    NodeKind::DirectiveList => {
                        if self.get_attribute(function_node, NodeAttrs::Abstract) {
                            self.diags.error(
                                ErrorKind::ImproperStatement,
                                self.arena.position(function_node),
                                format!(
                                    "the function \"{}\" is marked abstract and cannot have a body.",
                                    self.arena.string(function_node)
                                ),
                            );
                        }
                        // find all the labels of this function
                        self.find_labels(function_node, child)?;
                        end_list = self.directive_list(child)?;
                        body = Some(child);
                    }
                    _ => {
                        // the expression represents the return type
                        self.expression(child)?;
                        // constructors only support Void
                        if self.is_constructor(function_node) {
                            self.diags.error(
                                ErrorKind::InvalidReturnType,
                                self.arena.position(function_node),
                                format!(
                                    "a constructor must return \"void\" and nothing else, \"{}\" is invalid.",
                                    self.arena.string(function_node)
                                ),
                            );
                        }
                    }
                }
            }
            Ok(())
        })();
        self.arena.unlock(function_node);
        result?;

        if self.arena.flag(function_node, NodeFlags::Never)
            && self.is_constructor(function_node)
        {
            self.diags.error(
                ErrorKind::InvalidReturnType,
                self.arena.position(function_node),
                "a constructor must return (it cannot be marked Never).",
            );
        }

        // a function which is not Void/Never and has a body should end in
        // a return; flow analysis belongs to the optimizer, so only the
        // straightforward shape is checked here
        let _ = (end_list, body);

        Ok(())
    }

    /// Checks a parameter list: name unicity, types and default values
    pub(crate) fn parameters(&mut self, parameters_node: NodeId) -> Result<(), FatalError> {
        let max = self.arena.children_count(parameters_node);
        self.arena.lock(parameters_node);
        let result: Result<(), FatalError> = (|| {
            // clear the reference flags
            for idx in 0..max {
                let param = self.arena.child(parameters_node, idx);
                self.arena.set_flag(param, NodeFlags::Referenced, false);
                self.arena.set_flag(param, NodeFlags::ParamRef, false);
            }

            // verify unicity and resolve the types and defaults
            let mut duplicated = vec![false; max];
            for idx in 0..max {
                let param = self.arena.child(parameters_node, idx);

                for k in (0..idx).rev() {
                    let prev = self.arena.child(parameters_node, k);
                    if self.arena.string(prev) == self.arena.string(param) {
                        if !duplicated[k] {
                            self.diags.error(
                                ErrorKind::Duplicates,
                                self.arena.position(prev),
                                format!(
                                    "the named parameter '{}' is defined two or more times in the same list of parameters.",
                                    self.arena.string(param)
                                ),
                            );
                        }
                        duplicated[idx] = true;
                        break;
                    }
                }

                let param_children = self.arena.children(param);
                self.arena.lock(param);
                let inner: Result<(), FatalError> = (|| {
                    for child in param_children {
                        if self.arena.kind(child) == NodeKind::Set {
                            let default_expr = self.arena.child(child, 0);
                            self.expression(default_expr)?;
                        } else {
                            self.expression(child)?;
                            if let Some(type_instance) = self.arena.instance(child) {
                                match self.arena.type_link(param) {
                                    None => self.arena.set_type_link(param, type_instance),
                                    Some(existing) if existing != type_instance => {
                                        return Err(self.internal_error(
                                            param,
                                            "a parameter was given two incompatible types",
                                        ));
                                    }
                                    Some(_) => {}
                                }
                            }
                        }
                    }
                    Ok(())
                })();
                self.arena.unlock(param);
                inner?;
            }

            // a parameter referenced by another parameter is marked so
            for idx in 0..max {
                let param = self.arena.child(parameters_node, idx);
                if self.arena.flag(param, NodeFlags::Referenced) {
                    self.arena.set_flag(param, NodeFlags::ParamRef, true);
                }
            }
            Ok(())
        })();
        self.arena.unlock(parameters_node);
        result
    }

    /// Whether a super class in the chain defines `function_node` as final
    ///
    /// A final function only blocks a redefinition with the same
    /// prototype; a different prototype is a plain overload.
    pub(crate) fn find_final_functions(
        &mut self,
        function_node: NodeId,
        super_node: NodeId,
    ) -> Result<bool, FatalError> {
        let children = self.arena.children(super_node);
        for child in children {
            match self.arena.kind(child) {
                NodeKind::Extends => {
                    if let Some(next_super) = self
                        .arena
                        .get_child(child, 0)
                        .and_then(|name| self.arena.instance(name))
                    {
                        if self.find_final_functions(function_node, next_super)? {
                            return Ok(true);
                        }
                    }
                }
                NodeKind::DirectiveList => {
                    if self.find_final_functions(function_node, child)? {
                        return Ok(true);
                    }
                }
                NodeKind::Function => {
                    if self.arena.string(function_node) == self.arena.string(child)
                        && self.compare_parameters(function_node, child)
                        && self.get_attribute(child, NodeAttrs::Final)
                    {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }
        Ok(false)
    }

    /// Entry point for the final function check: walk the extends chain
    pub(crate) fn check_final_functions(
        &mut self,
        function_node: NodeId,
        class_node: NodeId,
    ) -> Result<bool, FatalError> {
        let children = self.arena.children(class_node);
        for child in children {
            // there can be only one extends on a class
            if self.arena.kind(child) == NodeKind::Extends
                && self.arena.children_count(child) > 0
            {
                let name = self.arena.child(child, 0);
                self.link_type(name)?;
                if let Some(super_node) = self.arena.instance(name) {
                    return self.find_final_functions(function_node, super_node);
                }
                break;
            }
        }
        Ok(false)
    }

    /// Structural equality of two parameter lists
    ///
    /// Types are compared by name when both are identifiers or strings;
    /// anything not comparable at compile time is considered equal.
    pub(crate) fn compare_parameters(&self, lfunction: NodeId, rfunction: NodeId) -> bool {
        let lparams = self.arena.find_first_child(lfunction, NodeKind::Parameters);
        let rparams = self.arena.find_first_child(rfunction, NodeKind::Parameters);

        let lmax = lparams.map(|p| self.arena.children_count(p)).unwrap_or(0);
        let rmax = rparams.map(|p| self.arena.children_count(p)).unwrap_or(0);

        // a different count cannot be the same prototype
        if lmax != rmax {
            return false;
        }

        for idx in 0..lmax {
            let lp = self.arena.child(lparams.unwrap(), idx);
            let rp = self.arena.child(rparams.unwrap(), idx);
            let Some(l) = self.arena.get_child(lp, 0) else {
                continue;
            };
            let Some(r) = self.arena.get_child(rp, 0) else {
                continue;
            };
            let lkind = self.arena.kind(l);
            let rkind = self.arena.kind(r);
            if (lkind != NodeKind::Identifier && lkind != NodeKind::String)
                || (rkind != NodeKind::Identifier && rkind != NodeKind::String)
            {
                // not comparable at compile time; treat as matching
                continue;
            }
            if self.arena.string(l) != self.arena.string(r) {
                return false;
            }
        }

        true
    }

    /// Rejects duplicate functions and function/variable name collisions
    /// within one scope
    pub(crate) fn check_unique_functions(
        &mut self,
        function_node: NodeId,
        class_node: NodeId,
        all_levels: bool,
    ) -> Result<bool, FatalError> {
        let children = self.arena.children(class_node);
        for child in children {
            match self.arena.kind(child) {
                NodeKind::DirectiveList => {
                    if all_levels && self.check_unique_functions(function_node, child, true)? {
                        return Ok(true);
                    }
                }

                NodeKind::Function => {
                    if child == function_node {
                        continue;
                    }
                    if self.arena.string(function_node) == self.arena.string(child)
                        && self.compare_parameters(function_node, child)
                    {
                        self.diags.error(
                            ErrorKind::Duplicates,
                            self.arena.position(function_node),
                            format!(
                                "you cannot define two functions with the same name ({}) and prototype in the same scope, class or interface.",
                                self.arena.string(function_node)
                            ),
                        );
                        return Ok(true);
                    }
                }

                NodeKind::Var => {
                    let count = self.arena.children_count(child);
                    for j in 0..count {
                        let variable_node = self.arena.child(child, j);
                        if self.arena.string(function_node) == self.arena.string(variable_node) {
                            let line = self.arena.position(variable_node).line();
                            self.diags.error(
                                ErrorKind::Duplicates,
                                self.arena.position(function_node),
                                format!(
                                    "you cannot define a function and a variable (found at line #{}) with the same name ({}) in the same scope, class or interface.",
                                    line,
                                    self.arena.string(function_node)
                                ),
                            );
                            return Ok(true);
                        }
                    }
                }

                _ => {}
            }
        }
        Ok(false)
    }

    /// Whether a function has no body (and thus is abstract in shape)
    pub(crate) fn is_function_abstract(&self, function_node: NodeId) -> bool {
        let count = self.arena.children_count(function_node);
        for idx in 0..count {
            if self.arena.kind(self.arena.child(function_node, idx)) == NodeKind::DirectiveList {
                return false;
            }
        }
        true
    }

    /// Whether `class_node` (or a class between it and the declaring
    /// class) overrides `function_node`
    fn find_overloaded_function(
        &mut self,
        class_node: NodeId,
        function_node: NodeId,
    ) -> Result<bool, FatalError> {
        let children = self.arena.children(class_node);
        for child in children {
            match self.arena.kind(child) {
                NodeKind::Extends | NodeKind::Implements => {
                    for name in self.clause_types(child) {
                        if let Some(super_class) = self.arena.instance(name) {
                            if self.is_function_overloaded(super_class, function_node)? {
                                return Ok(true);
                            }
                        }
                    }
                }
                NodeKind::DirectiveList => {
                    if self.find_overloaded_function(child, function_node)? {
                        return Ok(true);
                    }
                }
                NodeKind::Function => {
                    if self.arena.string(function_node) == self.arena.string(child)
                        && self.compare_parameters(function_node, child)
                    {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }
        Ok(false)
    }

    fn is_function_overloaded(
        &mut self,
        class_node: NodeId,
        function_node: NodeId,
    ) -> Result<bool, FatalError> {
        let super::name::Container::Class(declaring) = self.class_of_member(function_node) else {
            return Ok(false);
        };
        if declaring == class_node {
            return Ok(false);
        }
        self.find_overloaded_function(class_node, function_node)
    }

    /// Finds an abstract function which `class_node` does not override,
    /// anywhere in `list`'s derivation chain
    pub(crate) fn has_abstract_functions(
        &mut self,
        class_node: NodeId,
        list: NodeId,
    ) -> Result<Option<NodeId>, FatalError> {
        let children = self.arena.children(list);
        for child in children {
            match self.arena.kind(child) {
                NodeKind::Extends | NodeKind::Implements => {
                    for name in self.clause_types(child) {
                        if let Some(super_class) = self.arena.instance(name) {
                            if let Some(found) =
                                self.has_abstract_functions(class_node, super_class)?
                            {
                                return Ok(Some(found));
                            }
                        }
                    }
                }
                NodeKind::DirectiveList => {
                    if let Some(found) = self.has_abstract_functions(class_node, child)? {
                        return Ok(Some(found));
                    }
                }
                NodeKind::Function => {
                    if self.get_attribute(child, NodeAttrs::Abstract)
                        && self.is_function_abstract(child)
                        && !self.is_function_overloaded(class_node, child)?
                    {
                        // not overridden: the class cannot be instantiated
                        return Ok(Some(child));
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }
}
