//! Overload selection for function calls.
//!
//! Candidates accumulated by name resolution are scored against the
//! caller's argument list: each argument finds its formal parameter by
//! name or by position, and the pair is scored by `match_type`. A
//! `ParamMatch` node carrying the score vector and the argument mapping
//! is pushed on the argument list per viable candidate;
//! `select_best_func` then keeps the unique best one. Two candidates
//! whose score vectors are incomparable fall back to the declaring class
//! relationship, and a genuine tie is a `duplicates` diagnostic.

use simplelog::debug;

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeAttrs, NodeFlags, NodeKind},
};

use super::{Compiler, SearchFlags};

impl<'a> Compiler<'a> {
    /// Whether `func` is the constructor of its class
    pub(crate) fn is_constructor(&mut self, func: NodeId) -> bool {
        // user marked constructor
        if self.get_attribute(func, NodeAttrs::Constructor) {
            return true;
        }

        let mut parent = self.arena.parent(func);
        while let Some(current) = parent {
            match self.arena.kind(current) {
                NodeKind::Package
                | NodeKind::Program
                | NodeKind::Function // sub-functions cannot be constructors
                | NodeKind::Interface => return false,
                NodeKind::Class => {
                    // found the class in question
                    return self.arena.string(current) == self.arena.string(func);
                }
                _ => {}
            }
            parent = self.arena.parent(current);
        }
        false
    }

    /// Checks a function declaration against a searched name
    ///
    /// Getter/setter searches match through the `->`/`<-` sigils. A
    /// function found where a variable was expected (no argument list in
    /// flight) is a `mismatch-func-var` error, except for getters,
    /// setters and constructors.
    pub(crate) fn check_function(
        &mut self,
        func: NodeId,
        name: &str,
        params: Option<NodeId>,
        search_flags: SearchFlags,
    ) -> Result<Option<NodeId>, FatalError> {
        // an unused function would be an error, but overloading prevents
        // us from reporting it here
        if self.get_attribute(func, NodeAttrs::Unused) {
            return Ok(None);
        }

        // the searched name may already carry the getter/setter sigil when
        // a rewritten access resolves again
        let is_getter = self.arena.flag(func, NodeFlags::Getter);
        let is_setter = self.arena.flag(func, NodeFlags::Setter);
        if is_getter && search_flags.contains(SearchFlags::Getter) {
            let getter = format!("->{name}");
            if self.arena.string(func) != getter && self.arena.string(func) != name {
                return Ok(None);
            }
        } else if is_setter && search_flags.contains(SearchFlags::Setter) {
            let setter = format!("<-{name}");
            if self.arena.string(func) != setter && self.arena.string(func) != name {
                return Ok(None);
            }
        } else if self.arena.string(func) != name {
            return Ok(None);
        }

        if params.is_none() {
            // getters and setters do not have parameters
            if !is_getter && !is_setter {
                if !self.is_constructor(func) {
                    self.diags.error(
                        ErrorKind::MismatchFuncVar,
                        self.arena.position(func),
                        format!(
                            "a variable name was expected, we found the function '{}' instead.",
                            self.arena.string(func)
                        ),
                    );
                }
                return Ok(None);
            }
            self.define_function_type(func)?;
        }

        Ok(Some(func))
    }

    /// Scores a candidate function against the caller's argument list
    ///
    /// Returns 0 when a `ParamMatch` was appended to `params`, -1 when
    /// the candidate is rejected.
    pub(crate) fn check_function_with_params(
        &mut self,
        func: NodeId,
        params: NodeId,
    ) -> Result<i32, FatalError> {
        let match_node = self.arena.create_replacement(params, NodeKind::ParamMatch);
        self.arena.set_instance(match_node, func);

        // define the type of the function when not available yet
        if !self.define_function_type(func)? {
            // this function definition is no good; the parser already
            // complained about it
            return Ok(-1);
        }

        let count = self.arena.children_count(params);
        let func_children = self.arena.children_count(func);

        if func_children == 0 {
            // no parameters at all; match unless the declaration said Void
            if !self.arena.flag(func, NodeFlags::NoParams) {
                self.arena
                    .set_flag(match_node, NodeFlags::Unprototyped, true);
                self.arena.append_child(params, match_node);
                return Ok(0);
            }
            if count == 0 {
                self.arena.append_child(params, match_node);
                return Ok(0);
            }
            // the caller has parameters, but the function accepts none
            return Ok(-1);
        }

        let parameters = self.arena.child(func, 0);
        if self.arena.kind(parameters) != NodeKind::Parameters {
            // declared without an argument list; accepts anything with
            // the worst score
            self.arena
                .set_flag(match_node, NodeFlags::Unprototyped, true);
            self.arena.append_child(params, match_node);
            return Ok(0);
        }

        let max = self.arena.children_count(parameters);
        self.arena.lock(func);
        self.arena.lock(parameters);
        let result = self.match_parameters(func, parameters, params, match_node, count, max);
        self.arena.unlock(parameters);
        self.arena.unlock(func);
        result
    }

    /// The argument to formal pairing and scoring loop
    fn match_parameters(
        &mut self,
        func: NodeId,
        parameters: NodeId,
        params: NodeId,
        match_node: NodeId,
        count: usize,
        max: usize,
    ) -> Result<i32, FatalError> {
        if max == 0 {
            // this function accepts 0 parameters
            if count > 0 {
                return Ok(-1);
            }
            self.arena.append_child(params, match_node);
            return Ok(0);
        }

        // the whole parameter list may be marked as accepting anything
        let first = self.arena.child(parameters, 0);
        if self.arena.flag(first, NodeFlags::Unprototyped) {
            self.arena
                .set_flag(match_node, NodeFlags::Unprototyped, true);
            self.arena.append_child(params, match_node);
            return Ok(0);
        }

        // the caller parameters can be named, so we search each caller
        // parameter in the function parameter list, not the opposite
        let size = max.max(count);
        let mut scores = vec![0usize; size];
        let mut map = vec![0usize; size];
        let mut min = 0usize;
        let mut rest = max;
        let mut used = 0usize;

        for idx in 0..count {
            let p = self.arena.child(params, idx);
            if self.arena.kind(p) == NodeKind::ParamMatch {
                continue;
            }

            // a named argument is name(value)
            let mut param_name: Option<String> = None;
            let arg_children = self.arena.children(p);
            for child in arg_children {
                if self.arena.kind(child) == NodeKind::Name {
                    if self.arena.children_count(child) != 1 {
                        return Err(
                            self.internal_error(func, "a named parameter has no children")
                        );
                    }
                    let name = self.arena.child(child, 0);
                    if self.arena.kind(name) != NodeKind::Identifier {
                        return Err(self.internal_error(
                            func,
                            "the name of a parameter needs to be an identifier",
                        ));
                    }
                    param_name = Some(self.arena.string(name).to_string());
                    break;
                }
            }

            // find the formal parameter, by name or by position
            let j = if let Some(param_name) = param_name {
                let mut j = max;
                for candidate in 0..max {
                    let formal = self.arena.child(parameters, candidate);
                    if self.arena.string(formal) == param_name {
                        j = candidate;
                        break;
                    }
                }
                if j == max {
                    self.diags.error(
                        ErrorKind::InvalidFieldName,
                        self.arena.position(p),
                        format!(
                            "no parameter named '{param_name}' was found in this function declaration."
                        ),
                    );
                    return Ok(-1);
                }
                // if already used, it must be a rest
                if scores[j] != 0 {
                    let formal = self.arena.child(parameters, j);
                    if !self.arena.flag(formal, NodeFlags::Rest) {
                        self.diags.error(
                            ErrorKind::InvalidFieldName,
                            self.arena.position(p),
                            format!(
                                "function parameter name '{param_name}' already used & not a 'rest' (...)."
                            ),
                        );
                        return Ok(-1);
                    }
                }
                j
            } else {
                // the first formal parameter not used yet
                let mut j = min;
                while j < max && scores[j] != 0 {
                    j += 1;
                }
                min = j;
                if j == max {
                    // all the formals are taken; the last one better be a
                    // rest
                    let formal = self.arena.child(parameters, max - 1);
                    if !self.arena.flag(formal, NodeFlags::Rest) {
                        return Ok(-1);
                    }
                    let at_rest = rest;
                    rest += 1;
                    at_rest
                } else {
                    j
                }
            };

            // score the argument against the formal
            let formal_idx = j.min(max - 1);
            let formal = self.arena.child(parameters, formal_idx);
            let depth = self.match_type(p, formal, true)?;
            if depth == 0 {
                // the type does not match this candidate
                return Ok(-1);
            }
            if j < scores.len() {
                scores[j] = depth;
            }
            if idx < map.len() {
                map[idx] = j;
            }
            used = used.max(idx + 1);
        }

        // unfilled formals need a default value, or to be marked
        // unchecked; a rest is viewed as optional
        let mut fill = used;
        for j in min..max {
            if scores[j] != 0 {
                continue;
            }
            if fill < map.len() {
                map[fill] = j;
            }
            fill += 1;
            let formal = self.arena.child(parameters, j);
            if self.arena.flag(formal, NodeFlags::Unchecked)
                || self.arena.flag(formal, NodeFlags::Rest)
            {
                continue;
            }
            if self.arena.find_first_child(formal, NodeKind::Set).is_none() {
                // a required parameter is missing and has no default; this
                // candidate cannot be called like this
                return Ok(-1);
            }
        }

        self.arena.set_match_scores(match_node, scores);
        self.arena.set_match_map(match_node, map);
        self.arena.append_child(params, match_node);

        Ok(0)
    }

    /// Compares two viable candidates through their declaring classes
    ///
    /// Keeps the candidate declared in the more derived class; unrelated
    /// classes make the call ambiguous.
    fn best_param_match_derived_from(
        &mut self,
        best: NodeId,
        candidate: NodeId,
    ) -> Result<(NodeId, bool), FatalError> {
        let best_func = self.arena.instance(best).unwrap_or(best);
        let candidate_func = self.arena.instance(candidate).unwrap_or(candidate);

        let (best_wins, _) =
            self.are_objects_derived_from_one_another(best_func, candidate_func)?;
        if best_wins {
            return Ok((best, true));
        }

        let (candidate_wins, _) =
            self.are_objects_derived_from_one_another(candidate_func, best_func)?;
        if candidate_wins {
            return Ok((candidate, true));
        }

        self.diags.error(
            ErrorKind::Duplicates,
            self.arena.position(best),
            format!(
                "found two functions named '{}' and both have the same prototype. Cannot determine which one to use.",
                self.arena.string(best_func)
            ),
        );

        Ok((best, false))
    }

    /// Picks the better of two `ParamMatch` nodes
    fn best_param_match(
        &mut self,
        best: NodeId,
        candidate: NodeId,
    ) -> Result<(NodeId, bool), FatalError> {
        let best_size = self.arena.match_scores(best).len();
        let candidate_size = self.arena.match_scores(candidate).len();

        // unprototyped candidates lose to any prototyped one
        if best_size == 0 {
            if candidate_size == 0 {
                return self.best_param_match_derived_from(best, candidate);
            }
            return Ok((candidate, true));
        }
        if candidate_size == 0 {
            return Ok((best, true));
        }

        let mut best_more = 0usize;
        let mut candidate_more = 0usize;
        for idx in 0..best_size.min(candidate_size) {
            let b = self.arena.match_scores(best)[idx];
            let m = self.arena.match_scores(candidate)[idx];
            if b < m {
                best_more += 1;
            } else if b > m {
                candidate_more += 1;
            }
        }

        // a candidate only wins outright when it is better on some
        // argument and worse on none; anything else falls back to the
        // declaring class relationship
        if best_more != 0 && candidate_more == 0 {
            return Ok((best, true));
        }
        if candidate_more != 0 && best_more == 0 {
            return Ok((candidate, true));
        }

        self.best_param_match_derived_from(best, candidate)
    }

    /// Keeps the unique best `ParamMatch` of an argument list
    ///
    /// Losing match nodes are removed from the list; the winner stays as
    /// the last child for `call_add_missing_params` to consume.
    pub(crate) fn select_best_func(
        &mut self,
        params: NodeId,
    ) -> Result<Option<NodeId>, FatalError> {
        let mut found = true;
        let mut best: Option<NodeId> = None;

        let mut idx = 0usize;
        while idx < self.arena.children_count(params) {
            let candidate = self.arena.child(params, idx);
            if self.arena.kind(candidate) != NodeKind::ParamMatch {
                idx += 1;
                continue;
            }
            match best {
                None => {
                    best = Some(candidate);
                    idx += 1;
                }
                Some(current_best) => {
                    let (winner, ok) = self.best_param_match(current_best, candidate)?;
                    if !ok {
                        found = false;
                    }
                    // drop the loser, keep walking from the winner
                    let loser = if winner == candidate {
                        current_best
                    } else {
                        candidate
                    };
                    let loser_idx = self.arena.offset_of(loser);
                    self.arena.delete_child(params, loser_idx);
                    best = Some(winner);
                    if winner == candidate {
                        // the index of the winner shifted down by one
                    } else {
                        // candidate removed; idx now points at the next child
                    }
                }
            }
        }

        let Some(best) = best else {
            return Ok(None);
        };
        if !found {
            return Ok(None);
        }

        Ok(self.arena.instance(best))
    }

    /// Copies the winning argument mapping onto the call and materializes
    /// the missing default arguments
    pub(crate) fn call_add_missing_params(
        &mut self,
        call: NodeId,
        params: NodeId,
    ) -> Result<(), FatalError> {
        let count = self.arena.children_count(params);
        if count == 0 {
            return Ok(());
        }

        // the winning parameter match is the last child; resolutions that
        // never went through scoring (getters, rewritten accesses) have
        // none and need no defaults either
        let idx = count - 1;
        let match_node = self.arena.child(params, idx);
        if self.arena.kind(match_node) != NodeKind::ParamMatch {
            return Ok(());
        }

        let map = self.arena.match_map(match_node).to_vec();
        let size = map.len();
        self.arena.set_match_map(call, map.clone());
        self.arena.delete_child(params, idx);

        let mut idx = idx;
        if idx < size {
            // get the list of parameters of the selected function
            let Some(function) = self.arena.instance(call) else {
                return Ok(());
            };
            let parameters = self.arena.find_first_child(function, NodeKind::Parameters);
            // functions with no parameters just have no parameters node
            let Some(parameters) = parameters else {
                return Ok(());
            };
            let max = self.arena.children_count(parameters);
            while idx < size {
                if map[idx] < max {
                    let param = self.arena.child(parameters, map[idx]);
                    match self.arena.find_first_child(param, NodeKind::Set) {
                        Some(set) => {
                            let auto_param = self.arena.create_replacement(set, NodeKind::Auto);
                            if let Some(default_expr) = self.arena.get_child(set, 0) {
                                self.arena.set_instance(auto_param, default_expr);
                            }
                            self.arena.append_child(params, auto_param);
                        }
                        None => {
                            // no initializer; force the undefined value
                            let undefined =
                                self.arena.create_replacement(call, NodeKind::Undefined);
                            self.arena.append_child(params, undefined);
                        }
                    }
                }
                idx += 1;
            }
        }

        Ok(())
    }

    /// Resolves a call expression
    ///
    /// A callee resolving to a class becomes a cast; a callee resolving
    /// to a variable calls the `()` operator of its class; a member
    /// function gets `this.` injected in front of it.
    pub(crate) fn resolve_call(&mut self, call: NodeId) -> Result<bool, FatalError> {
        if self.arena.children_count(call) != 2 {
            return Ok(false);
        }
        if self.arena.instance(call).is_some() {
            // already resolved on an earlier pass
            return Ok(true);
        }

        // resolve all the parameter expressions first
        let params = self.arena.child(call, 1);
        let args = self.arena.children(params);
        self.arena.lock(call);
        let result = (|| -> Result<(), FatalError> {
            for arg in args {
                self.expression(arg)?;
            }
            Ok(())
        })();
        self.arena.unlock(call);
        result?;

        let id = self.arena.child(call, 0);
        if self.arena.kind(id) == NodeKind::Identifier {
            // straight identifiers can be resolved at compile time; they
            // need to be function names
            let errcnt = self.diags.error_count();
            let resolution =
                self.resolve_name(id, id, Some(params), SearchFlags::Getter)?;

            if let Some(resolution) = resolution {
                debug!("call identifier found: '{}'", self.arena.string(id));
                return self.attach_call_resolution(call, id, params, resolution);
            }

            // drop the candidate matches of the failed selection
            let mut count = self.arena.children_count(params);
            while count > 0 {
                let last = self.arena.child(params, count - 1);
                if self.arena.kind(last) != NodeKind::ParamMatch {
                    break;
                }
                self.arena.delete_child(params, count - 1);
                count -= 1;
            }

            if errcnt == self.diags.error_count() {
                self.diags.error(
                    ErrorKind::NotFound,
                    self.arena.position(call),
                    format!("function named '{}' not found.", self.arena.string(id)),
                );
            }
            return Ok(false);
        }

        // a dynamic expression cannot always be resolved at compile time
        if self.arena.kind(id) == NodeKind::Member {
            self.resolve_member(id, Some(params), SearchFlags::Getter)?;
        } else {
            self.expression(id)?;
        }

        // drop a dangling parameter match, if any
        let count = self.arena.children_count(params);
        if count > 0 {
            let last = self.arena.child(params, count - 1);
            if self.arena.kind(last) == NodeKind::ParamMatch {
                self.arena.delete_child(params, count - 1);
            }
        }

        if let Some(type_link) = self.arena.type_link(id) {
            self.arena.set_type_link(call, type_link);
        }

        Ok(false)
    }

    /// Wires a resolved callee into the call node, rewriting casts,
    /// `()` operators and implicit member calls on the way
    fn attach_call_resolution(
        &mut self,
        call: NodeId,
        id: NodeId,
        params: NodeId,
        resolution: NodeId,
    ) -> Result<bool, FatalError> {
        match self.arena.kind(resolution) {
            NodeKind::Class | NodeKind::Interface => {
                // under a `new` operator this really is a constructor
                // call; the new expression takes it from here
                if let Some(parent) = self.arena.parent(call) {
                    if self.arena.kind(parent) == NodeKind::New {
                        return self.finish_call(call, params, resolution);
                    }
                }

                // not a call: a cast
                let type_node = self.arena.child(call, 0);
                let expr = self.arena.child(call, 1);
                self.arena.delete_child(call, 0);
                self.arena.delete_child(call, 0); // 1 is now 0
                self.arena.append_child(call, expr);
                self.arena.append_child(call, type_node);
                self.arena.set_instance(type_node, resolution);
                self.arena.set_kind(call, NodeKind::As);
                return Ok(true);
            }

            NodeKind::Variable => {
                // a variable is called through the `()` operator of its
                // class
                let type_node = if self.arena.children_count(resolution) > 0 {
                    let first = self.arena.child(resolution, 0);
                    if self.arena.kind(first) != NodeKind::Set {
                        self.arena.instance(first)
                    } else {
                        None
                    }
                } else {
                    None
                };
                let Some(var_class) = type_node else {
                    return Err(
                        self.internal_error(call, "getters and setters not supported yet")
                    );
                };
                self.arena.set_instance(id, var_class);

                // search for a function named "()"
                let all_params = self.arena.child(call, 1);
                self.arena.delete_child(call, 1);
                let op = self.arena.create_replacement(call, NodeKind::Identifier);
                self.arena.set_string(op, "()");
                self.arena.append_child(op, all_params);
                let del = self.arena.children_count(call);
                self.arena.append_child(call, op);

                let mut funcs = 0usize;
                let mut func = self.find_field(
                    var_class,
                    op,
                    &mut funcs,
                    Some(params),
                    SearchFlags::none(),
                )?;
                if func.is_none() && funcs > 0 {
                    func = self.select_best_func(params)?;
                }
                self.arena.delete_child(call, del);

                let Some(func) = func else {
                    self.diags.error(
                        ErrorKind::UnknownOperator,
                        self.arena.position(call),
                        format!(
                            "no '()' operators found in '{}'.",
                            self.arena.string(var_class)
                        ),
                    );
                    return Ok(false);
                };

                let member = self.arena.create_replacement(call, NodeKind::Member);
                self.arena.replace_child(call, 0, member);
                self.arena.delete_child(op, 0);
                if self.arena.children_count(call) > 1 {
                    self.arena.replace_child(call, 1, all_params);
                } else {
                    self.arena.append_child(call, all_params);
                }
                self.arena.append_child(member, id);
                self.arena.append_child(member, op);

                return self.finish_call(call, params, func);
            }

            NodeKind::Function => {
                // when the resolution is in a class, the call is really
                //     this.<name>(params);
                if let super::name::Container::Class(_) = self.class_of_member(resolution) {
                    let member = self.arena.create_replacement(call, NodeKind::Member);
                    self.arena.replace_child(call, 0, member);
                    let this_expr = self.arena.create_replacement(call, NodeKind::This);
                    self.arena.append_child(member, this_expr);
                    self.arena.append_child(member, id);
                }
                self.finish_call(call, params, resolution)
            }

            _ => {
                self.diags.error(
                    ErrorKind::InvalidType,
                    self.arena.position(call),
                    format!(
                        "'{}' was expected to be a type, a variable or a function.",
                        self.arena.string(id)
                    ),
                );
                Ok(false)
            }
        }
    }

    fn finish_call(
        &mut self,
        call: NodeId,
        params: NodeId,
        resolution: NodeId,
    ) -> Result<bool, FatalError> {
        self.arena.set_instance(call, resolution);
        if let Some(type_link) = self.arena.type_link(resolution) {
            self.arena.set_type_link(call, type_link);
        }
        self.call_add_missing_params(call, params)?;
        Ok(true)
    }
}
