//! Member and field resolution over classes, interfaces and packages.
//!
//! `resolve_field` searches the body of a class (recursively into nested
//! directive lists) and then its whole `extends`/`implements` chain.
//! `resolve_member` handles chained accesses `a.b.c` by recursing on the
//! left side, as well as `super.x` and the getter rewrite that turns a
//! property read into a call of the `->name` function.

use simplelog::debug;

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeAttrs, NodeFlags, NodeKind},
};

use super::{Compiler, SearchFlags};

/// Result of a member lookup on a `member` expression
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemberLookup {
    /// The search failed; a diagnostic may have been emitted
    NotFound,
    /// The name is dynamic and can only be resolved at run time
    Dynamic,
    /// The member resolved to this declaration
    Found(NodeId),
}

impl<'a> Compiler<'a> {
    /// Searches the directive lists of a class body for a field
    ///
    /// Sets the field's INSTANCE link on success.
    pub(crate) fn check_field(
        &mut self,
        link: NodeId,
        field: NodeId,
        funcs: &mut usize,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<Option<NodeId>, FatalError> {
        let children = self.arena.children(link);
        self.arena.lock(link);
        let result = (|| -> Result<Option<NodeId>, FatalError> {
            for list in children.iter() {
                if self.arena.kind(*list) != NodeKind::DirectiveList {
                    continue;
                }
                let entries = self.arena.children(*list);
                self.arena.lock(*list);
                let inner = (|| -> Result<Option<NodeId>, FatalError> {
                    for (j, entry) in entries.iter().enumerate() {
                        if self.arena.kind(*entry) == NodeKind::DirectiveList {
                            // nested directive lists are searched too
                            if let Some(resolution) =
                                self.check_field(*list, field, funcs, params, search_flags)?
                            {
                                if self.funcs_name(funcs, Some(resolution), false) {
                                    return Ok(Some(resolution));
                                }
                            }
                        } else if let Some(resolution) =
                            self.check_name(*list, j, field, params, search_flags, funcs)?
                        {
                            if self.funcs_name(funcs, Some(resolution), true) {
                                self.arena.set_instance(field, resolution);
                                return Ok(Some(resolution));
                            }
                        }
                    }
                    Ok(None)
                })();
                self.arena.unlock(*list);
                if let Some(resolution) = inner? {
                    return Ok(Some(resolution));
                }
            }
            Ok(None)
        })();
        self.arena.unlock(link);
        result
    }

    /// Field search entry point with sub-reason rendering
    pub(crate) fn find_field(
        &mut self,
        link: NodeId,
        field: NodeId,
        funcs: &mut usize,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<Option<NodeId>, FatalError> {
        let saved_flags = self.err_flags;
        self.err_flags = super::SearchError::none();

        let mut visited = Vec::new();
        let result = self.find_any_field(link, field, funcs, params, search_flags, &mut visited);
        if matches!(result, Ok(None)) && *funcs == 0 {
            self.print_search_errors(field);
        }
        self.err_flags = saved_flags;
        result
    }

    fn find_any_field(
        &mut self,
        link: NodeId,
        field: NodeId,
        funcs: &mut usize,
        params: Option<NodeId>,
        search_flags: SearchFlags,
        visited: &mut Vec<NodeId>,
    ) -> Result<Option<NodeId>, FatalError> {
        // a malformed derivation graph may close a cycle; never revisit
        if visited.contains(&link) {
            return Ok(None);
        }
        visited.push(link);

        if let Some(resolution) = self.check_field(link, field, funcs, params, search_flags)? {
            return Ok(Some(resolution));
        }
        if *funcs != 0 {
            // functions matched in this class; the caller selects the best
            // match across the whole chain
            return Ok(None);
        }

        self.find_in_extends_inner(link, field, funcs, params, search_flags, visited)
    }

    /// Searches a field through the `extends`/`implements` chain
    ///
    /// More than one distinct match across the chain is a `duplicates`
    /// diagnostic.
    pub(crate) fn find_in_extends(
        &mut self,
        link: NodeId,
        field: NodeId,
        funcs: &mut usize,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<Option<NodeId>, FatalError> {
        let mut visited = vec![link];
        self.find_in_extends_inner(link, field, funcs, params, search_flags, &mut visited)
    }

    fn find_in_extends_inner(
        &mut self,
        link: NodeId,
        field: NodeId,
        funcs: &mut usize,
        params: Option<NodeId>,
        search_flags: SearchFlags,
        visited: &mut Vec<NodeId>,
    ) -> Result<Option<NodeId>, FatalError> {
        let children = self.arena.children(link);
        let mut count = 0usize;
        let mut found: Option<NodeId> = None;

        self.arena.lock(link);
        let result = (|| -> Result<(), FatalError> {
            for clause in children.iter() {
                let clause_kind = self.arena.kind(*clause);
                if clause_kind != NodeKind::Extends && clause_kind != NodeKind::Implements {
                    continue;
                }
                if self.arena.children_count(*clause) != 1 {
                    continue;
                }
                let name = self.arena.child(*clause, 0);
                let types = if self.arena.kind(name) == NodeKind::List {
                    self.arena.children(name)
                } else {
                    vec![name]
                };
                for type_name in types {
                    self.link_type(type_name)?;
                    let Some(sub_link) = self.arena.instance(type_name) else {
                        // cannot search a field in nothing
                        debug!("type not linked, cannot lookup member");
                        continue;
                    };
                    if let Some(resolution) = self.find_any_field(
                        sub_link,
                        field,
                        funcs,
                        params,
                        search_flags,
                        visited,
                    )? {
                        found = Some(resolution);
                        count += 1;
                    }
                }
            }
            Ok(())
        })();
        self.arena.unlock(link);
        result?;

        if count == 1 || *funcs != 0 {
            return Ok(found);
        }

        if count > 1 {
            self.diags.error(
                ErrorKind::Duplicates,
                self.arena.position(field),
                format!("found more than one match for '{}'.", self.arena.string(field)),
            );
        }

        Ok(None)
    }

    /// Resolves a field access against the type of an object
    pub(crate) fn resolve_field(
        &mut self,
        object: NodeId,
        field: NodeId,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<Option<NodeId>, FatalError> {
        // a field resolved on an earlier pass stays resolved; the
        // instance link is never repointed
        if let Some(existing) = self.arena.instance(field) {
            return Ok(Some(existing));
        }

        // check that the object is indeed an object, i.e. a variable which
        // references a class, or a class itself
        let link = match self.arena.kind(object) {
            NodeKind::Variable | NodeKind::Parameter => {
                let mut type_node = None;
                let count = self.arena.children_count(object);
                for idx in 0..count {
                    let child = self.arena.child(object, idx);
                    let kind = self.arena.kind(child);
                    if kind != NodeKind::Set && kind != NodeKind::VarAttributes {
                        type_node = Some(child);
                        break;
                    }
                }
                let Some(type_node) = type_node else {
                    // variables and parameters without a type cannot be
                    // used with members
                    debug!("variable without a type used with a member");
                    return Ok(None);
                };

                self.link_type(type_node)?;
                match self.arena.instance(type_node) {
                    Some(link) => link,
                    // cannot search a field in nothing; it will bite the
                    // user later if the class is not dynamic
                    None => return Ok(None),
                }
            }

            NodeKind::Class | NodeKind::Interface | NodeKind::Package => object,

            kind => {
                self.diags.error(
                    ErrorKind::InvalidType,
                    self.arena.position(field),
                    format!("object of type '{kind}' is not known to have members."),
                );
                return Ok(None);
            }
        };

        let field_kind = self.arena.kind(field);
        if field_kind != NodeKind::Identifier
            && field_kind != NodeKind::VIdentifier
            && field_kind != NodeKind::String
        {
            // we cannot determine at compile time whether a dynamic field
            // is valid
            return Ok(None);
        }

        let mut funcs = 0usize;
        let resolution = self.find_field(link, field, &mut funcs, params, search_flags)?;

        if funcs != 0 {
            if let Some(params) = params {
                return self.select_best_func(params);
            }
            return Ok(None);
        }

        Ok(resolution)
    }

    /// Whether unknown members on this class are acceptable at compile time
    ///
    /// A class is dynamic when marked so or when it inherits the flag;
    /// inheriting from `Object` does not count, per the language
    /// reference.
    pub(crate) fn is_dynamic_class(&mut self, class_node: Option<NodeId>) -> bool {
        let Some(class_node) = class_node else {
            // we cannot know, assume it is
            return true;
        };

        if self.get_attribute(class_node, NodeAttrs::Dynamic) {
            return true;
        }

        let children = self.arena.children(class_node);
        for child in children {
            if self.arena.kind(child) != NodeKind::Extends {
                continue;
            }
            let Some(name) = self.arena.get_child(child, 0) else {
                break;
            };
            let Some(extends) = self.arena.instance(name) else {
                break;
            };
            if self.arena.string(extends) == "Object" {
                return false;
            }
            return self.is_dynamic_class(Some(extends));
        }

        false
    }

    /// Verifies the resolved (or unresolved) member of a reference
    ///
    /// Unknown members on non-dynamic types are `static` errors. Members
    /// reached through a class (not an instance) must be sub-types, static
    /// functions, operators, static variables or constants.
    pub(crate) fn check_member(
        &mut self,
        reference: NodeId,
        field: Option<NodeId>,
        field_name: NodeId,
    ) {
        let Some(field) = field else {
            let type_link = self.arena.type_link(reference);
            if !self.is_dynamic_class(type_link) {
                let type_name = type_link
                    .map(|t| self.arena.string(t).to_string())
                    .unwrap_or_default();
                self.diags.error(
                    ErrorKind::Static,
                    self.arena.position(reference),
                    format!(
                        "'{}: {}' is not dynamic and thus it cannot be used with unknown member '{}'.",
                        self.arena.string(reference),
                        type_name,
                        self.arena.string(field_name),
                    ),
                );
            }
            return;
        };

        let Some(object) = self.arena.instance(reference) else {
            return;
        };

        // only when the reference is directly a class or interface
        let object_kind = self.arena.kind(object);
        if object_kind != NodeKind::Class && object_kind != NodeKind::Interface {
            return;
        }

        let err = match self.arena.kind(field) {
            NodeKind::Class | NodeKind::Interface => false,
            NodeKind::Function => {
                // constructors are considered static; operators are static
                // since they are called with all their inputs
                !self.get_attribute(field, NodeAttrs::Static)
                    && !self.arena.flag(field, NodeFlags::Operator)
            }
            NodeKind::Variable => {
                !self.get_attribute(field, NodeAttrs::Static)
                    && !self.arena.flag(field, NodeFlags::Const)
            }
            _ => true,
        };

        if err {
            self.diags.error(
                ErrorKind::InstanceExpected,
                self.arena.position(reference),
                format!(
                    "you cannot directly access non-static functions and non-static/constant variables in a class ('{}' here); you need to use an instance instead.",
                    self.arena.string(field),
                ),
            );
        }
    }

    /// Resolves a `member` expression `obj.field`
    pub(crate) fn find_member(
        &mut self,
        member: NodeId,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<MemberLookup, FatalError> {
        // an invalid member node was already reported upstream
        if self.arena.children_count(member) != 2 {
            return Ok(MemberLookup::NotFound);
        }

        debug!("searching for member");
        let mut must_find = false;
        let mut object: Option<NodeId> = None;

        let name = self.arena.child(member, 0);
        let mut resolve_simple_name = false;

        self.arena.lock(member);
        let result = (|| -> Result<Option<MemberLookup>, FatalError> {
            match self.arena.kind(name) {
                NodeKind::Member => {
                    // a chained expression such as a.b.c; resolve the left
                    // side first, its resolution is the object to search
                    match self.find_member(name, params, search_flags)? {
                        MemberLookup::Found(resolution) => object = Some(resolution),
                        MemberLookup::Dynamic => return Ok(Some(MemberLookup::Dynamic)),
                        MemberLookup::NotFound => return Ok(Some(MemberLookup::NotFound)),
                    }
                }

                NodeKind::Super => {
                    self.check_super_validity(name);
                    match self.super_class_of(member)? {
                        Some(super_class) => {
                            object = Some(super_class);
                            must_find = true;
                        }
                        None => return Ok(Some(MemberLookup::NotFound)),
                    }
                }

                _ => {
                    let name_kind = self.arena.kind(name);
                    if name_kind == NodeKind::Identifier || name_kind == NodeKind::String {
                        // resolved below, outside the lock
                        resolve_simple_name = true;
                    } else {
                        self.expression(name)?;
                        // a dynamic name cannot be resolved now; we can
                        // only hope it is a valid name at run time, e.g.
                        //     ("test_" + var).hello
                        return Ok(Some(MemberLookup::Dynamic));
                    }
                }
            }
            Ok(None)
        })();
        self.arena.unlock(member);
        if let Some(early) = result? {
            return Ok(early);
        }

        // resolve the field expression now so more errors surface in this
        // compile instead of the next one
        let field = self.arena.child(member, 1);
        if self.arena.kind(field) != NodeKind::Identifier {
            self.expression(field)?;
        }

        if resolve_simple_name {
            if let Some(existing) = self.arena.instance(name) {
                // wired on an earlier pass
                let resolution = self.resolve_field(existing, field, params, search_flags)?;
                return Ok(match resolution {
                    Some(resolution) => MemberLookup::Found(resolution),
                    None => MemberLookup::NotFound,
                });
            }

            let errcnt = self.diags.error_count();
            match self.resolve_name(name, name, params, search_flags)? {
                Some(resolution) => {
                    object = Some(resolution);
                    // the reference carries the links the member checks
                    // rely upon
                    self.arena.set_instance(name, resolution);
                    if let Some(type_link) = self.arena.type_link(resolution) {
                        self.arena.set_type_link(name, type_link);
                    } else {
                        self.type_expr(name)?;
                    }
                    if self.arena.kind(resolution) == NodeKind::Variable {
                        self.arena.set_flag(resolution, NodeFlags::InUse, true);
                    }
                }
                None => {
                    // we cannot search for fields without an object
                    if errcnt == self.diags.error_count() {
                        self.diags.error(
                            ErrorKind::NotFound,
                            self.arena.position(name),
                            format!(
                                "cannot find any declaration for '{}'.",
                                self.arena.string(name)
                            ),
                        );
                    }
                    return Ok(MemberLookup::NotFound);
                }
            }
        }

        let Some(object) = object else {
            // avoid errors by returning no resolution but success
            return Ok(MemberLookup::Dynamic);
        };

        let result = self.resolve_field(object, field, params, search_flags)?;
        match result {
            Some(resolution) => {
                self.check_member(name, Some(resolution), field);
                Ok(MemberLookup::Found(resolution))
            }
            None => {
                if must_find {
                    self.diags.error(
                        ErrorKind::InvalidExpression,
                        self.arena.position(name),
                        "'super' must name a valid field of the super class.",
                    );
                } else {
                    self.check_member(name, None, field);
                }
                Ok(MemberLookup::NotFound)
            }
        }
    }

    /// Resolves a member expression and applies the getter rewrite
    pub(crate) fn resolve_member(
        &mut self,
        expr: NodeId,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<(), FatalError> {
        let resolution = match self.find_member(expr, params, search_flags)? {
            MemberLookup::Found(resolution) => resolution,
            // dynamic names cannot be fully resolved at compile time
            MemberLookup::Dynamic | MemberLookup::NotFound => return Ok(()),
        };

        if self.replace_constant_variable(expr, resolution)? {
            // just a constant, we are done
            return Ok(());
        }

        self.arena.set_instance(expr, resolution);
        let type_link = self.arena.type_link(resolution);
        if let Some(type_link) = type_link {
            self.arena.set_type_link(expr, type_link);
        }

        // a getter transforms the MEMBER into a CALL to a MEMBER
        if self.arena.kind(resolution) == NodeKind::Function
            && self.arena.flag(resolution, NodeFlags::Getter)
        {
            debug!("getter caught, rewriting member into a call");
            let left = self.arena.child(expr, 0);
            let right = self.arena.child(expr, 1);
            self.arena.delete_child(expr, 0);
            self.arena.delete_child(expr, 0); // 1 is now 0

            // a new member node, since the expression node itself becomes
            // the call and must stay under its parent
            let member = self.arena.create_replacement(expr, NodeKind::Member);
            self.arena.set_instance(member, resolution);
            self.arena.append_child(member, left);
            self.arena.append_child(member, right);
            if let Some(type_link) = type_link {
                self.arena.set_type_link(member, type_link);
            }
            self.arena.append_child(expr, member);

            // the name changes to match the getter; the right node is an
            // identifier, a v-identifier or a string so this always works
            let getter_name = format!("->{}", self.arena.string(right));
            self.arena.set_string(right, getter_name);

            // the call needs an empty list of parameters
            let empty_params = self.arena.create_replacement(expr, NodeKind::List);
            self.arena.append_child(expr, empty_params);

            self.arena.set_kind(expr, NodeKind::Call);
        }

        Ok(())
    }

    /// Finds the direct base class used by `super` inside `member`
    fn super_class_of(&mut self, member: NodeId) -> Result<Option<NodeId>, FatalError> {
        let mut parent = Some(member);
        let enclosing = loop {
            parent = match parent {
                Some(current) => self.arena.parent(current),
                None => break None,
            };
            let Some(current) = parent else {
                break None;
            };
            match self.arena.kind(current) {
                NodeKind::Class => break Some(current),
                // interfaces can use super but we cannot know what it is
                // at compile time
                NodeKind::Interface | NodeKind::Package | NodeKind::Program | NodeKind::Root => {
                    break None
                }
                _ => {}
            }
        };

        let Some(class_node) = enclosing else {
            return Ok(None);
        };

        if self.arena.string(class_node) == "Object" {
            self.diags.error(
                ErrorKind::InvalidExpression,
                self.arena.position(member),
                "you cannot use 'super' within the 'Object' class.",
            );
            return Ok(None);
        }

        let children = self.arena.children(class_node);
        for child in children {
            if self.arena.kind(child) != NodeKind::Extends {
                continue;
            }
            if self.arena.children_count(child) == 1 {
                let name = self.arena.child(child, 0);
                return Ok(self.arena.instance(name));
            }
            // another error upstream
            return Ok(None);
        }

        // default to Object when there is no extends
        let object = self.resolve_internal_type(class_node, "Object")?;
        Ok(Some(object))
    }

    /// Validates the context of a `super` expression
    pub(crate) fn check_super_validity(&mut self, expr: NodeId) {
        let needs_constructor = self
            .arena
            .parent(expr)
            .map(|parent| self.arena.kind(parent) == NodeKind::Call)
            .unwrap_or(false);

        let mut first_function = true;
        let mut parent = self.arena.parent(expr);
        while let Some(current) = parent {
            match self.arena.kind(current) {
                NodeKind::Function => {
                    if first_function {
                        // super(params) is only valid in constructors;
                        // super.member() in non-static member functions
                        if needs_constructor {
                            if !self.is_constructor(current) {
                                self.diags.error(
                                    ErrorKind::InvalidExpression,
                                    self.arena.position(expr),
                                    "'super()' cannot be used outside of a constructor function.",
                                );
                                return;
                            }
                        } else if self.arena.flag(current, NodeFlags::Operator)
                            || self.get_attribute(current, NodeAttrs::Static)
                            || self.get_attribute(current, NodeAttrs::Constructor)
                            || self.is_constructor(current)
                        {
                            self.diags.error(
                                ErrorKind::InvalidExpression,
                                self.arena.position(expr),
                                "'super.member()' cannot be used in a static function nor a constructor.",
                            );
                            return;
                        }
                        first_function = false;
                    }
                }
                NodeKind::Class | NodeKind::Interface => return,
                NodeKind::Program | NodeKind::Root => break,
                _ => {}
            }
            parent = self.arena.parent(current);
        }

        if needs_constructor {
            self.diags.error(
                ErrorKind::InvalidExpression,
                self.arena.position(expr),
                "'super()' cannot be used outside a class definition.",
            );
        }
    }
}
