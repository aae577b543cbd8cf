//! Name resolution through nested lexical scopes.
//!
//! `resolve_name` starts from the node that references a name and walks
//! outward through the enclosing directive lists, `for` initializers,
//! `with` objects, function parameters, enums, catch clauses and class
//! extends/implements chains, up to the program node and from there
//! through the three global import scopes. Inner scopes always win;
//! variables and classes terminate the walk, while functions accumulate
//! into a candidate set handed to the overload selector at the end.
//!
//! Access control is enforced after a match, not during the walk: a
//! private or protected match that the requesting identifier may not see
//! clears the resolution and ORs a sub-reason into the search error
//! flags, rendered by `print_search_errors` once the whole search fails.

use simplelog::debug;

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeAttrs, NodeFlags, NodeKind},
};

use super::{Compiler, SearchError, SearchFlags};

/// Where a declaration lives, as seen by the access control checks
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Container {
    /// Enclosed in this class or interface
    Class(NodeId),
    /// Reached a package, program or root node first
    Outer(NodeId),
    /// Ran out of parents
    None,
}

impl<'a> Compiler<'a> {
    /// Resolves an identifier to its declaration
    ///
    /// `list` is the node the search starts from, usually the identifier
    /// itself. `params` carries the argument list of the call being
    /// resolved, when any; matching functions push their `ParamMatch`
    /// scores onto it. Returns `None` when the name cannot be resolved;
    /// the accumulated sub-reasons have then been rendered.
    pub fn resolve_name(
        &mut self,
        list: NodeId,
        id: NodeId,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<Option<NodeId>, FatalError> {
        let kind = self.arena.kind(id);
        if kind != NodeKind::Identifier
            && kind != NodeKind::VIdentifier
            && kind != NodeKind::String
        {
            return Err(self.internal_error(
                id,
                "resolve_name() called with a node which is not an identifier or a string",
            ));
        }

        let saved_flags = self.err_flags;
        self.err_flags = SearchError::none();
        let result = self.search_name(list, id, params, search_flags);
        if matches!(result, Ok(None)) {
            self.print_search_errors(id);
        }
        self.err_flags = saved_flags;
        result
    }

    fn search_name(
        &mut self,
        list: NodeId,
        id: NodeId,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<Option<NodeId>, FatalError> {
        debug!("resolve_name: '{}'", self.arena.string(id));

        let mut list = list;
        // when we are currently defining the WITH object, skip the WITH
        // itself so the object expression does not resolve through it
        if let Some(parent) = self.arena.parent(list) {
            if self.arena.kind(parent) == NodeKind::With {
                list = parent;
            }
        }

        // a count of functions matched so far; the name resolves to an
        // overload set as long as only functions are found
        let mut funcs = 0usize;

        // 0 is the user program being compiled; 1..3 are the global,
        // system and native import scopes
        let mut module = 0usize;
        loop {
            // we search starting at this offset, backward first and then
            // forward
            let mut offset = 0usize;

            if module == 0 {
                // inside a parameter list only backward search through the
                // previous parameters is allowed, so step out first
                if self.arena.kind(list) == NodeKind::Parameters {
                    list = match self.arena.parent(list) {
                        Some(parent) => parent,
                        None => return Ok(None),
                    };
                }

                loop {
                    offset = self.arena.offset_of(list);
                    list = match self.arena.parent(list) {
                        Some(parent) => parent,
                        None => return Ok(None),
                    };
                    let kind = self.arena.kind(list);
                    if kind == NodeKind::Extends || kind == NodeKind::Implements {
                        // transparent frames
                        continue;
                    }
                    if matches!(
                        kind,
                        NodeKind::DirectiveList
                            | NodeKind::For
                            | NodeKind::With
                            | NodeKind::Program
                            | NodeKind::Function
                            | NodeKind::Parameters
                            | NodeKind::Enum
                            | NodeKind::Catch
                            | NodeKind::Class
                            | NodeKind::Interface
                    ) {
                        break;
                    }
                }
            }

            if self.arena.kind(list) == NodeKind::Program || module != 0 {
                // not resolved in the program itself; restart in the next
                // global import scope
                let mut advanced = false;
                while !advanced {
                    let scope = match module {
                        0 => {
                            module = 1;
                            self.imports.global
                        }
                        1 => {
                            module = 2;
                            self.imports.system
                        }
                        2 => {
                            module = 3;
                            self.imports.native
                        }
                        _ => {
                            module = 4;
                            break;
                        }
                    };
                    if let Some(scope) = scope {
                        if self.arena.children_count(scope) > 0 {
                            list = self.arena.child(scope, 0);
                            advanced = true;
                        }
                    }
                }
            }
            if module == 4 {
                // no more default lists of directives; we may still have
                // accumulated functions (see below)
                break;
            }

            let kind = self.arena.kind(list);
            let max = self.arena.children_count(list);
            self.arena.lock(list);
            let found =
                self.search_in_scope(list, kind, offset, max, id, params, search_flags, &mut funcs);
            self.arena.unlock(list);
            if let Some(resolution) = found? {
                return Ok(Some(resolution));
            }
        }

        if funcs != 0 {
            if let Some(params) = params {
                if let Some(resolution) = self.select_best_func(params)? {
                    return Ok(Some(resolution));
                }
            }
            // one or more functions were found but none matched the inputs
            self.err_flags |= SearchError::Prototype;
        }

        Ok(None)
    }

    /// Searches one scope frame reached by the outward walk
    #[allow(clippy::too_many_arguments)]
    fn search_in_scope(
        &mut self,
        list: NodeId,
        kind: NodeKind,
        offset: usize,
        max: usize,
        id: NodeId,
        params: Option<NodeId>,
        search_flags: SearchFlags,
        funcs: &mut usize,
    ) -> Result<Option<NodeId>, FatalError> {
        match kind {
            NodeKind::DirectiveList => {
                // backward first since in most cases that is enough
                let mut idx = offset.min(max);
                while idx > 0 {
                    idx -= 1;
                    if let Some(resolution) =
                        self.check_name(list, idx, id, params, search_flags, funcs)?
                    {
                        if self.funcs_name(funcs, Some(resolution), true) {
                            return Ok(Some(resolution));
                        }
                    }
                }

                // forward resolution is also allowed so mutually recursive
                // top level declarations can reference each other
                for idx in offset..max {
                    if let Some(resolution) =
                        self.check_name(list, idx, id, params, search_flags, funcs)?
                    {
                        if self.funcs_name(funcs, Some(resolution), true) {
                            return Ok(Some(resolution));
                        }
                    }
                }
            }

            NodeKind::For => {
                // the first child of a for can declare variables
                if max > 0 {
                    if let Some(resolution) = self.check_name(list, 0, id, params, search_flags, funcs)? {
                        if self.funcs_name(funcs, Some(resolution), true) {
                            return Ok(Some(resolution));
                        }
                    }
                }
            }

            NodeKind::With => {
                if max == 2 {
                    // search the name as a field of the with object's type
                    let object = self.arena.child(list, 0);
                    if let Some(link) = self.arena.instance(object) {
                        if let Some(resolution) =
                            self.resolve_field(link, id, params, search_flags)?
                        {
                            // mark the identifier as a reference through a
                            // with object
                            self.arena.set_flag(id, NodeFlags::With, true);
                            return Ok(Some(resolution));
                        }
                    }
                }
            }

            NodeKind::Function => {
                // search the parameter list for a matching name
                for idx in 0..max {
                    let parameters = self.arena.child(list, idx);
                    if self.arena.kind(parameters) == NodeKind::Parameters {
                        let count = self.arena.children_count(parameters);
                        self.arena.lock(parameters);
                        let result = (|| -> Result<Option<NodeId>, FatalError> {
                            for j in 0..count {
                                if let Some(resolution) =
                                    self.check_name(parameters, j, id, params, search_flags, funcs)?
                                {
                                    if self.funcs_name(funcs, Some(resolution), true) {
                                        return Ok(Some(resolution));
                                    }
                                }
                            }
                            Ok(None)
                        })();
                        self.arena.unlock(parameters);
                        if let Some(resolution) = result? {
                            return Ok(Some(resolution));
                        }
                        break;
                    }
                }
            }

            NodeKind::Parameters => {
                // default value expressions can reference the previous
                // parameters, never the following ones
                let mut idx = offset.min(max);
                while idx > 0 {
                    idx -= 1;
                    if let Some(resolution) =
                        self.check_name(list, idx, id, params, search_flags, funcs)?
                    {
                        if self.funcs_name(funcs, Some(resolution), true) {
                            return Ok(Some(resolution));
                        }
                    }
                }
            }

            NodeKind::Catch => {
                // a catch has one parameter of its own
                if max > 0 {
                    let parameters = self.arena.child(list, 0);
                    if self.arena.children_count(parameters) > 0 {
                        if let Some(resolution) =
                            self.check_name(parameters, 0, id, params, search_flags, funcs)?
                        {
                            if self.funcs_name(funcs, Some(resolution), true) {
                                return Ok(Some(resolution));
                            }
                        }
                    }
                }
            }

            NodeKind::Enum => {
                // the name of the enum itself references the type
                if self.arena.string(id) == self.arena.string(list) {
                    self.arena.set_flag(list, NodeFlags::InUse, true);
                    return Ok(Some(list));
                }

                // inside an enum the other enumerators are in scope, and
                // they are not affected by scope attributes
                for idx in 0..max {
                    let entry = self.arena.child(list, idx);
                    if self.arena.string(id) == self.arena.string(entry) {
                        if self.funcs_name(funcs, Some(entry), true) {
                            self.arena.set_flag(entry, NodeFlags::InUse, true);
                            return Ok(Some(entry));
                        }
                    }
                }
            }

            NodeKind::Class | NodeKind::Interface => {
                // the body plus the whole extends/implements chain
                if let Some(resolution) =
                    self.find_in_extends(list, id, funcs, params, search_flags)?
                {
                    if self.funcs_name(funcs, Some(resolution), false) {
                        return Ok(Some(resolution));
                    }
                }
            }

            _ => {
                return Err(self.internal_error(list, "unhandled scope kind in resolve_name()"));
            }
        }

        Ok(None)
    }

    /// Checks one directive list entry against the searched name
    ///
    /// Returns the resolution when the entry matches and passes the access
    /// control checks. Function candidates reached through an import bump
    /// `funcs` so the final selection sees them.
    pub(crate) fn check_name(
        &mut self,
        list: NodeId,
        idx: usize,
        id: NodeId,
        params: Option<NodeId>,
        search_flags: SearchFlags,
        funcs: &mut usize,
    ) -> Result<Option<NodeId>, FatalError> {
        let child = self.arena.child(list, idx);

        let resolution = match self.arena.kind(child) {
            NodeKind::Var => {
                // a VAR is composed of VARIABLEs
                let count = self.arena.children_count(child);
                let mut found = None;
                self.arena.lock(child);
                let result = (|| -> Result<(), FatalError> {
                    for v in 0..count {
                        let variable = self.arena.child(child, v);
                        if self.arena.string(variable) == self.arena.string(id) {
                            // make sure the variable was parsed
                            if !search_flags.contains(SearchFlags::NoParsing) {
                                self.variable(variable, false)?;
                            }
                            found = Some(variable);
                            break;
                        }
                    }
                    Ok(())
                })();
                self.arena.unlock(child);
                result?;
                match found {
                    Some(variable) => variable,
                    None => return Ok(None),
                }
            }

            NodeKind::Parameter => {
                if self.arena.string(child) == self.arena.string(id) {
                    self.arena.set_flag(child, NodeFlags::Referenced, true);
                    return Ok(Some(child));
                }
                return Ok(None);
            }

            NodeKind::Function => {
                let name = self.arena.string(id).to_string();
                match self.check_function(child, &name, params, search_flags)? {
                    Some(resolution) => resolution,
                    None => return Ok(None),
                }
            }

            NodeKind::Class | NodeKind::Interface => {
                if self.arena.string(child) == self.arena.string(id) {
                    // a class name, good for a typedef or a cast
                    child
                } else {
                    return Ok(None);
                }
            }

            NodeKind::Enum => {
                // the name of the enum references the type itself
                if self.arena.string(child) == self.arena.string(id) {
                    self.arena.set_flag(child, NodeFlags::InUse, true);
                    return Ok(Some(child));
                }
                // then each enumerator
                let count = self.arena.children_count(child);
                for e in 0..count {
                    let entry = self.arena.child(child, e);
                    if self.arena.string(entry) == self.arena.string(id) {
                        self.arena.set_flag(entry, NodeFlags::InUse, true);
                        return Ok(Some(entry));
                    }
                }
                return Ok(None);
            }

            NodeKind::Package => {
                if self.arena.string(child) == self.arena.string(id) {
                    // packages resolve like classes; searching further
                    // means searching inside this package and none other
                    return Ok(Some(child));
                }
                return Ok(None);
            }

            NodeKind::Import => {
                let name = self.arena.string(id).to_string();
                return self.check_import(child, &name, params, search_flags, funcs);
            }

            _ => return Ok(None),
        };

        // access control is enforced post-match
        self.check_access(id, resolution, params, child)
    }

    /// Applies the private/protected rules and the function prototype
    /// check to a candidate resolution
    fn check_access(
        &mut self,
        id: NodeId,
        resolution: NodeId,
        params: Option<NodeId>,
        child: NodeId,
    ) -> Result<Option<NodeId>, FatalError> {
        self.get_attribute(resolution, NodeAttrs::Defined);

        if self.arena.attr(resolution, NodeAttrs::Private) {
            // an interface and a package can also have private members
            match self.class_of_member(resolution) {
                Container::Class(resolution_class) => match self.class_of_member(id) {
                    Container::Class(id_class) if id_class == resolution_class => {}
                    _ => {
                        self.err_flags |= SearchError::Private;
                        return Ok(None);
                    }
                },
                Container::Outer(outer) if self.arena.kind(outer) == NodeKind::Package => {
                    // package private: only reachable from inside that very
                    // package
                    let id_package = self.enclosing_package(id);
                    if id_package != Some(outer) {
                        self.err_flags |= SearchError::PrivatePackage;
                        return Ok(None);
                    }
                }
                _ => {
                    self.err_flags |= SearchError::WrongPrivate;
                    return Ok(None);
                }
            }
        }

        if self.arena.attr(resolution, NodeAttrs::Protected) {
            // an interface can also have protected members
            let (derived, container) = self.are_objects_derived_from_one_another(id, resolution)?;
            if !derived {
                match container {
                    Container::Class(_) => self.err_flags |= SearchError::Protected,
                    _ => self.err_flags |= SearchError::WrongProtected,
                }
                return Ok(None);
            }
        }

        if self.arena.attr(resolution, NodeAttrs::Internal)
            && self.enclosing_package(resolution).is_some()
            && self.enclosing_package(id).is_none()
        {
            // internal declarations stay inside the package world
            self.err_flags |= SearchError::PrivatePackage;
            return Ok(None);
        }

        if self.arena.kind(child) == NodeKind::Function {
            if let Some(params) = params {
                if self.check_function_with_params(child, params)? < 0 {
                    return Ok(None);
                }
            }
        }

        Ok(Some(resolution))
    }

    /// Decides whether the search terminates with this resolution
    ///
    /// Variables and classes stop the search immediately. Functions join
    /// the candidate set and the search continues, since outer scopes may
    /// hold more overloads. Getters and setters behave as variables.
    pub(crate) fn funcs_name(
        &mut self,
        funcs: &mut usize,
        resolution: Option<NodeId>,
        increment: bool,
    ) -> bool {
        let Some(resolution) = resolution else {
            return true;
        };
        if self.arena.kind(resolution) != NodeKind::Function {
            return *funcs == 0;
        }
        if self.arena.flag(resolution, NodeFlags::Getter)
            || self.arena.flag(resolution, NodeFlags::Setter)
        {
            // viewed as a variable; there is no way to overload these
            return *funcs == 0;
        }

        if increment {
            *funcs += 1;
        }

        false
    }

    /// Finds the class or interface a member belongs to
    pub(crate) fn class_of_member(&self, node: NodeId) -> Container {
        let mut parent = Some(node);
        while let Some(current) = parent {
            match self.arena.kind(current) {
                NodeKind::Class | NodeKind::Interface => return Container::Class(current),
                NodeKind::Package | NodeKind::Program | NodeKind::Root => {
                    return Container::Outer(current)
                }
                _ => {}
            }
            parent = self.arena.parent(current);
        }
        Container::None
    }

    /// Finds the package a node is enclosed in, when any
    pub(crate) fn enclosing_package(&self, node: NodeId) -> Option<NodeId> {
        let mut parent = Some(node);
        while let Some(current) = parent {
            match self.arena.kind(current) {
                NodeKind::Package => return Some(current),
                NodeKind::Program | NodeKind::Root => return None,
                _ => {}
            }
            parent = self.arena.parent(current);
        }
        None
    }

    /// Whether the classes of two members derive from one another, in
    /// either direction; also reports the container of `superc`
    pub(crate) fn are_objects_derived_from_one_another(
        &mut self,
        derived: NodeId,
        superc: NodeId,
    ) -> Result<(bool, Container), FatalError> {
        let super_container = self.class_of_member(superc);
        let Container::Class(super_class) = super_container else {
            return Ok((false, super_container));
        };
        let Container::Class(derived_class) = self.class_of_member(derived) else {
            return Ok((false, super_container));
        };

        let related = self.is_derived_from(derived_class, super_class)?;
        Ok((related, super_container))
    }

    /// Renders the accumulated sub-reasons after a failed search
    pub(crate) fn print_search_errors(&mut self, name: NodeId) {
        if self.err_flags.is_none() {
            return;
        }

        let position = self.arena.position(name);
        self.diags.error(
            ErrorKind::CannotMatch,
            position.clone(),
            format!(
                "the name '{}' could not be resolved because:",
                self.arena.string(name)
            ),
        );
        if self.err_flags.contains(SearchError::Private) {
            self.diags.error(
                ErrorKind::CannotMatch,
                position.clone(),
                "   You cannot access a private class member from outside that very class.",
            );
        }
        if self.err_flags.contains(SearchError::Protected) {
            self.diags.error(
                ErrorKind::CannotMatch,
                position.clone(),
                "   You cannot access a protected class member from outside a class or its derived classes.",
            );
        }
        if self.err_flags.contains(SearchError::Prototype) {
            self.diags.error(
                ErrorKind::CannotMatch,
                position.clone(),
                "   One or more functions were found, but none matched the input parameters.",
            );
        }
        if self.err_flags.contains(SearchError::WrongPrivate) {
            self.diags.error(
                ErrorKind::CannotMatch,
                position.clone(),
                "   You cannot use the private attribute outside of a package or a class.",
            );
        }
        if self.err_flags.contains(SearchError::WrongProtected) {
            self.diags.error(
                ErrorKind::CannotMatch,
                position.clone(),
                "   You cannot use the protected attribute outside of a class.",
            );
        }
        if self.err_flags.contains(SearchError::PrivatePackage) {
            self.diags.error(
                ErrorKind::CannotMatch,
                position,
                "   You cannot access a package private declaration from outside of that package.",
            );
        }

        self.err_flags = SearchError::none();
    }

    /// Resolves one of the intrinsic type names (`Object`, `String`, ...)
    ///
    /// A temporary identifier is attached to `parent` so the regular scope
    /// walk applies, then removed. Not finding an internal type means the
    /// host did not install the system scopes; that is fatal.
    pub(crate) fn resolve_internal_type(
        &mut self,
        parent: NodeId,
        type_name: &str,
    ) -> Result<NodeId, FatalError> {
        let id = self.arena.create_replacement(parent, NodeKind::Identifier);
        self.arena.set_string(id, type_name);
        let idx = self.arena.children_count(parent);
        let was_locked = self.arena.is_locked(parent);
        if was_locked {
            // the temporary child must be visible to the walk right away
            return self.resolve_detached_internal_type(parent, id, type_name);
        }
        self.arena.append_child(parent, id);

        self.arena.lock(parent);
        let resolution = self.resolve_name(id, id, None, SearchFlags::none());
        self.arena.unlock(parent);

        // get rid of the temporary identifier
        self.arena.delete_child(parent, idx);

        match resolution? {
            Some(resolution) => Ok(resolution),
            None => Err(FatalError::MissingInternalType {
                name: type_name.to_string(),
            }),
        }
    }

    /// Internal type lookup when the anchor node is locked: resolve from
    /// the anchor itself instead of a temporary child
    fn resolve_detached_internal_type(
        &mut self,
        parent: NodeId,
        id: NodeId,
        type_name: &str,
    ) -> Result<NodeId, FatalError> {
        // the identifier is detached; resolve starting at the parent node
        match self.resolve_name(parent, id, None, SearchFlags::none())? {
            Some(resolution) => Ok(resolution),
            None => Err(FatalError::MissingInternalType {
                name: type_name.to_string(),
            }),
        }
    }
}
