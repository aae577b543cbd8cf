//! Package loading, imports and `use namespace`.
//!
//! An `import` carrying the `Implements` flag compiles its package right
//! away; a plain import defers everything until a name actually resolves
//! into the package. Packages load at most once per compilation and get
//! their labels scanned on first use. External packages come from the
//! host: the package index resolver maps `(import_name, symbol)` to a
//! file, the module loader parses that file into a program node.

use simplelog::debug;

use crate::{
    arena::NodeId,
    diagnostics::{ErrorKind, FatalError},
    node::{NodeAttrs, NodeFlags, NodeKind},
};

use super::{Compiler, SearchFlags};

impl<'a> Compiler<'a> {
    /// Compiles an `import` directive
    ///
    /// Only imports flagged `Implements` force the package to compile
    /// here; everything else waits for a reference.
    pub(crate) fn import(&mut self, import_node: NodeId) -> Result<(), FatalError> {
        if !self.arena.flag(import_node, NodeFlags::Implements) {
            return Ok(());
        }

        let name = self.arena.string(import_node).to_string();

        // search this program first
        let mut package = match self.program {
            Some(program) => self.find_package(program, &name),
            None => None,
        };

        if package.is_none() {
            // not in this program, search the externals
            if let Some(external) = self.find_external_package(import_node, "*")? {
                package = self.find_package(external, &name);
            }
            if package.is_none() {
                self.diags.error(
                    ErrorKind::NotFound,
                    self.arena.position(import_node),
                    format!("cannot find package '{name}'."),
                );
                return Ok(());
            }
        }
        let package = package.unwrap();

        // make sure it is compiled, once
        let was_referenced = self.arena.flag(package, NodeFlags::PackageReferenced);
        self.arena
            .set_flag(package, NodeFlags::PackageReferenced, true);
        if !was_referenced {
            self.package_body(package)?;
        }

        Ok(())
    }

    /// Compiles a `use namespace` directive
    pub(crate) fn use_namespace(&mut self, use_node: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(use_node) != 1 {
            return Ok(());
        }
        self.arena.lock(use_node);
        let result: Result<(), FatalError> = (|| {
            // the qualifier needs to resolve to a name usable as a type
            // or scope name
            let qualifier = self.arena.child(use_node, 0);
            self.expression(qualifier)?;

            let kind = self.arena.kind(qualifier);
            if kind != NodeKind::String && kind != NodeKind::Identifier {
                return Err(self.internal_error(
                    use_node,
                    "type qualifier is not just a string, we cannot duplicate it at this point",
                ));
            }

            // effective until the end of the enclosing directive list
            let name = self.arena.string(qualifier).to_string();
            self.scope_stack.push_namespace(name);
            Ok(())
        })();
        self.arena.unlock(use_node);
        result
    }

    /// Finds a package by name in a program, recursing through the
    /// directive lists
    pub(crate) fn find_package(&self, list: NodeId, name: &str) -> Option<NodeId> {
        let count = self.arena.children_count(list);
        for idx in 0..count {
            let child = self.arena.child(list, idx);
            match self.arena.kind(child) {
                NodeKind::DirectiveList => {
                    if let Some(package) = self.find_package(child, name) {
                        return Some(package);
                    }
                }
                NodeKind::Package => {
                    if self.arena.string(child) == name {
                        return Some(child);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Loads the external package which defines `name` for this import
    ///
    /// Consults the host package index, then loads and caches the module
    /// file. The returned program is parsed but not yet analyzed.
    pub(crate) fn find_external_package(
        &mut self,
        import_node: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>, FatalError> {
        let import_name = self.arena.string(import_node).to_string();

        let Some(resolver) = self.package_resolver.as_ref() else {
            return Ok(None);
        };
        let Some(filename) = resolver.resolve_package(&import_name, name) else {
            return Ok(None);
        };

        if let Some(program) = self.loaded_modules.get(&filename) {
            return Ok(Some(*program));
        }

        debug!("loading external package from {}", filename.display());
        let Some(loader) = self.module_loader.as_mut() else {
            return Ok(None);
        };
        let Some(program) = loader.load_module(&mut *self.arena, &filename) else {
            return Err(self.internal_error(
                import_node,
                format!("cannot load module file '{}'", filename.display()),
            ));
        };

        self.loaded_modules.insert(filename, program);
        Ok(Some(program))
    }

    /// Resolves a name through an import, lazily loading the package
    ///
    /// Function candidates found in the package join the caller's
    /// candidate set through `funcs` and the trailing selection.
    pub(crate) fn check_import(
        &mut self,
        import_node: NodeId,
        name: &str,
        params: Option<NodeId>,
        search_flags: SearchFlags,
        funcs: &mut usize,
    ) -> Result<Option<NodeId>, FatalError> {
        // a package can live in any script file, so search this program
        // before asking the host for an external package
        if let Some(program) = self.program {
            let before = *funcs;
            if let Some(resolution) =
                self.find_package_item(program, import_node, name, params, search_flags, funcs)?
            {
                return Ok(Some(resolution));
            }
            if *funcs > before {
                return Ok(None);
            }
        }

        let Some(program) = self.find_external_package(import_node, name)? else {
            return Ok(None);
        };

        self.find_package_item(
            program,
            import_node,
            name,
            params,
            search_flags | SearchFlags::PackageMustExist,
            funcs,
        )
    }

    /// Finds one symbol inside the package named by an import
    pub(crate) fn find_package_item(
        &mut self,
        program: NodeId,
        import_node: NodeId,
        name: &str,
        params: Option<NodeId>,
        search_flags: SearchFlags,
        funcs: &mut usize,
    ) -> Result<Option<NodeId>, FatalError> {
        let import_name = self.arena.string(import_node).to_string();
        let Some(package) = self.find_package(program, &import_name) else {
            if search_flags.contains(SearchFlags::PackageMustExist) {
                // when looking through the package index the package must
                // always exist
                return Err(self.internal_error(
                    import_node,
                    format!(
                        "cannot find package '{import_name}' in any of the previously registered packages."
                    ),
                ));
            }
            return Ok(None);
        };

        if self.arena.children_count(package) == 0 {
            return Ok(None);
        }

        // setup the labels, only the first time around
        if !self.arena.flag(package, NodeFlags::FoundLabels) {
            self.arena.set_flag(package, NodeFlags::FoundLabels, true);
            let child = self.arena.child(package, 0);
            self.find_labels(package, child)?;
        }

        debug!("found package '{import_name}', searching field '{name}'");

        // search the symbol inside the package; the probe hangs off the
        // import so the access checks see the importer's context
        let id = self.arena.create_replacement(package, NodeKind::Identifier);
        self.arena.set_string(id, name);
        let probe_idx = self.arena.children_count(import_node);
        self.arena.append_child(import_node, id);

        let before = *funcs;
        let resolution = self.find_field(package, id, funcs, params, search_flags);
        self.arena.delete_child(import_node, probe_idx);
        let resolution = resolution?;
        if resolution.is_none() && *funcs == before {
            return Ok(None);
        }

        // the access modifiers of the resolved name are enforced here;
        // function candidates get checked after the final selection
        if let Some(resolution) = resolution {
            if self.get_attribute(resolution, NodeAttrs::Private) {
                // private: invisible from outside the declaring class or
                // package
                return Ok(None);
            }
            if self.get_attribute(resolution, NodeAttrs::Internal) {
                // internal: only visible from within another package
                if self.enclosing_package(import_node).is_none() {
                    return Ok(None);
                }
            }
        }

        // make sure the package is compiled, once
        let was_referenced = self.arena.flag(package, NodeFlags::PackageReferenced);
        self.arena
            .set_flag(package, NodeFlags::PackageReferenced, true);
        if !was_referenced {
            self.package_body(package)?;
        }

        Ok(resolution)
    }
}
