//! Semantic analysis pass for the Lyra language compiler.
//!
//! The pass takes a parsed, still partially ambiguous AST and turns it
//! into a fully resolved, type annotated, scope aware tree ready for the
//! optimizer and the code generator. It is a single recursive walk driven
//! by [`Compiler::compile`], composed of cooperating resolvers:
//!
//! - [`name`]: identifier resolution through nested lexical scopes,
//!   inheritance chains, packages, imports and `with` objects
//! - [`member`]: field resolution over classes, interfaces and packages,
//!   including `super.x`, chained member access and getter rewrites
//! - [`types`]: TYPE links for expressions and type compatibility scoring
//! - [`overload`]: candidate scoring and best match selection for calls
//! - [`statements`]: statement validation and transition target wiring
//! - [`declarations`]: declaration and attribute checks
//! - [`operators`]: operator overload lookup and call rewrites
//! - [`packages`]: lazy package loading through the host resolver
//! - [`idents`]: `__FUNCTION__` style special identifier folding
//!
//! The pass is single threaded and cooperative. Everything that used to be
//! process wide state in older designs lives on the [`Compiler`] value:
//! the global import scopes, the diagnostics sink and the time snapshot.

use std::path::{Path, PathBuf};

use bitmask_enum::bitmask;
use simplelog::debug;

use crate::{
    arena::{NodeArena, NodeId},
    diagnostics::{Diagnostics, ErrorKind, FatalError, MessageLevel},
    node::{NodeAttrs, NodeFlags, NodeKind},
};

pub mod declarations;
pub mod idents;
pub mod member;
pub mod name;
pub mod operators;
pub mod overload;
pub mod packages;
pub mod scope;
pub mod statements;
pub mod types;

mod expr;

use scope::ScopeStack;

/// Flags steering a name or field search
///
/// `Getter`/`Setter` accept the `->name`/`<-name` sigil functions for
/// the searched name, `PackageMustExist` makes a missing package an
/// internal error, and `NoParsing` skips variable initializers while
/// matching names.
#[bitmask(u32)]
pub enum SearchFlags {
    Getter,
    Setter,
    PackageMustExist,
    NoParsing,
}

/// Sub-reasons accumulated while a name search fails
///
/// These are OR-ed together and rendered after the primary
/// `cannot-match` message.
#[bitmask(u32)]
pub enum SearchError {
    Private,
    Protected,
    Prototype,
    WrongPrivate,
    WrongProtected,
    PrivatePackage,
}

/// Host callback resolving `(import_name, symbol)` to a package file
pub trait PackageResolver {
    fn resolve_package(&self, import_name: &str, symbol: &str) -> Option<PathBuf>;
}

/// Host callback parsing a package file into a program node
///
/// The returned program has positions, kinds, children and payloads set by
/// the parser; all cross-edges are this pass's responsibility.
pub trait ModuleLoader {
    fn load_module(&mut self, arena: &mut NodeArena, filename: &Path) -> Option<NodeId>;
}

/// Host time source for the `__TIME__`/`__DATE__`/`__UNIXTIME__` family
pub trait TimeSource {
    fn now(&self) -> i64;
}

/// The three global import scopes consulted when lexical resolution
/// reaches the program node, each a parsed program
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalImports {
    pub global: Option<NodeId>,
    pub system: Option<NodeId>,
    pub native: Option<NodeId>,
}

/// The semantic analysis pass over one program tree
///
/// One `Compiler` instance runs one compilation; independent compilations
/// may run in different threads with no shared state.
pub struct Compiler<'a> {
    pub(crate) arena: &'a mut NodeArena,
    pub(crate) diags: Diagnostics,
    /// Root of the program being compiled; resolution never walks past it
    pub(crate) program: Option<NodeId>,
    /// Currently effective `use namespace` / `with` scopes
    pub(crate) scope_stack: ScopeStack,
    /// Sub-reasons of the name search currently in flight
    pub(crate) err_flags: SearchError,
    pub(crate) imports: GlobalImports,
    /// Lazily created fallback node used as the TYPE of unresolved expressions
    pub(crate) unknown_type: Option<NodeId>,
    pub(crate) package_resolver: Option<Box<dyn PackageResolver>>,
    pub(crate) module_loader: Option<Box<dyn ModuleLoader>>,
    /// Cache of externally loaded programs, keyed by filename
    pub(crate) loaded_modules: indexmap::IndexMap<PathBuf, NodeId>,
    /// Unix time sampled once when the compiler is created
    pub(crate) time: i64,
}

impl<'a> Compiler<'a> {
    pub fn new(arena: &'a mut NodeArena) -> Self {
        Self {
            arena,
            diags: Diagnostics::new(),
            program: None,
            scope_stack: ScopeStack::new(),
            err_flags: SearchError::none(),
            imports: GlobalImports::default(),
            unknown_type: None,
            package_resolver: None,
            module_loader: None,
            loaded_modules: indexmap::IndexMap::new(),
            time: chrono::Utc::now().timestamp(),
        }
    }

    /// Installs the global import scopes shared by the host across compiles
    pub fn set_global_imports(&mut self, imports: GlobalImports) {
        self.imports = imports;
    }

    /// Installs the package index resolver and module loader host pair
    pub fn set_package_host(
        &mut self,
        resolver: Box<dyn PackageResolver>,
        loader: Box<dyn ModuleLoader>,
    ) {
        self.package_resolver = Some(resolver);
        self.module_loader = Some(loader);
    }

    /// Overrides the time snapshot used by the special identifiers
    pub fn set_time_source(&mut self, source: &dyn TimeSource) {
        self.time = source.now();
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diags
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diags
    }

    /// Runs the pass on a `Program` or `Root` node
    ///
    /// The tree is mutated in place. Returns the error count; the host
    /// decides whether code generation proceeds. `Err` is the abort
    /// channel for broken internal invariants only.
    pub fn compile(&mut self, root: NodeId) -> Result<usize, FatalError> {
        match self.arena.kind(root) {
            NodeKind::Program => {
                self.program_directive(root)?;
            }
            NodeKind::Root => {
                let children = self.arena.children(root);
                self.arena.lock(root);
                let result: Result<(), FatalError> = (|| {
                    for child in children {
                        if self.arena.kind(child) == NodeKind::Program {
                            self.program_directive(child)?;
                        }
                    }
                    Ok(())
                })();
                self.arena.unlock(root);
                result?;
            }
            _ => {
                self.diags.error(
                    ErrorKind::InternalError,
                    self.arena.position(root),
                    "the compiler expected a root or a program node to start with.",
                );
            }
        }

        Ok(self.diags.error_count())
    }

    /// Compiles one program: label scan first, then the directive lists
    fn program_directive(&mut self, program_node: NodeId) -> Result<(), FatalError> {
        // This is the root; resolution never searches past this node.
        // What is in the parent of a program is not part of the program.
        self.program = Some(program_node);

        // get rid of any declaration marked false
        let children = self.arena.children(program_node);
        for child in children.iter() {
            if self.get_attribute(*child, NodeAttrs::False) {
                self.arena.set_kind(*child, NodeKind::Unknown);
            }
        }
        self.arena.clean_tree(program_node);

        let children = self.arena.children(program_node);
        self.arena.lock(program_node);
        let result: Result<(), FatalError> = (|| {
            // look for all the labels in this program (for goto's)
            for child in children.iter() {
                if self.arena.kind(*child) == NodeKind::DirectiveList {
                    self.find_labels(program_node, *child)?;
                }
            }

            // a program is composed of directives (usually just one list)
            for child in children.iter() {
                if self.arena.kind(*child) == NodeKind::DirectiveList {
                    self.directive_list(*child)?;
                }
            }
            Ok(())
        })();
        self.arena.unlock(program_node);
        result
    }

    /// Walks one directive list and returns the trailing `return`, if the
    /// list ends with one
    pub(crate) fn directive_list(&mut self, list: NodeId) -> Result<Option<NodeId>, FatalError> {
        if self.arena.kind(list) != NodeKind::DirectiveList {
            return Err(FatalError::Internal {
                position: self.arena.position(list),
                message: "directive_list() called on a non directive list node".to_string(),
            });
        }

        // the effect of `use namespace` entries pushed by the children
        // ends with this list
        let scope_mark = self.scope_stack.mark();

        let max = self.arena.children_count(list);
        self.arena.lock(list);
        let result: Result<Option<NodeId>, FatalError> = (|| {
            let mut end: Option<NodeId> = None;
            for idx in 0..max {
                let child = self.arena.child(list, idx);
                self.directive(child)?;
                match self.arena.kind(child) {
                    NodeKind::Return => end = Some(child),
                    NodeKind::Empty | NodeKind::Unknown => {}
                    _ => end = None,
                }
            }
            Ok(end)
        })();
        self.arena.unlock(list);
        self.scope_stack.restore(scope_mark);

        // hoist variables synthesized by assignments to undeclared names
        if self.arena.flag(list, NodeFlags::NewVariables) {
            self.arena.set_flag(list, NodeFlags::NewVariables, false);
            let variables = self.arena.variables(list);
            for variable in variables.into_iter().rev() {
                if self.arena.flag(variable, NodeFlags::ToAdd) {
                    self.arena.set_flag(variable, NodeFlags::ToAdd, false);
                    if let Some(var_node) = self.arena.parent(variable) {
                        if self.arena.parent(var_node).is_none() {
                            self.arena.insert_child(list, 0, var_node);
                        }
                    }
                }
            }
        }

        result
    }

    /// Dispatches one directive by node kind
    fn directive(&mut self, child: NodeId) -> Result<(), FatalError> {
        match self.arena.kind(child) {
            NodeKind::DirectiveList => {
                self.directive_list(child)?;
            }
            NodeKind::Var => self.var(child)?,
            NodeKind::Function => self.function(child)?,
            NodeKind::Class | NodeKind::Interface => self.class_directive(child)?,
            NodeKind::Enum => self.enum_directive(child)?,
            NodeKind::Package => {
                // packages compile lazily, on first reference
                if self.arena.flag(child, NodeFlags::PackageReferenced) {
                    self.package_body(child)?;
                }
            }
            NodeKind::Import => self.import(child)?,
            NodeKind::Use => self.use_namespace(child)?,
            NodeKind::If => self.if_directive(child)?,
            NodeKind::While => self.while_directive(child)?,
            NodeKind::Do => self.do_directive(child)?,
            NodeKind::For => self.for_directive(child)?,
            NodeKind::Switch => self.switch_directive(child)?,
            NodeKind::Case => self.case_directive(child)?,
            NodeKind::Default => self.default_directive(child)?,
            NodeKind::Try => self.try_directive(child)?,
            NodeKind::Catch => self.catch_directive(child)?,
            NodeKind::Finally => self.finally_directive(child)?,
            NodeKind::Throw => self.throw_directive(child)?,
            NodeKind::Return => {
                let _ = self.return_directive(child)?;
            }
            NodeKind::Break | NodeKind::Continue => self.break_continue(child)?,
            NodeKind::Goto => self.goto_directive(child)?,
            NodeKind::With => self.with_directive(child)?,
            NodeKind::Label | NodeKind::Empty | NodeKind::Unknown => {}
            _ => self.expression(child)?,
        }
        Ok(())
    }

    /// Checks a class or interface declaration and compiles its body
    fn class_directive(&mut self, class_node: NodeId) -> Result<(), FatalError> {
        debug!("class: {}", self.arena.string(class_node));
        let children = self.arena.children(class_node);
        self.arena.lock(class_node);
        let result: Result<(), FatalError> = (|| {
            for child in children.iter() {
                match self.arena.kind(*child) {
                    NodeKind::Extends | NodeKind::Implements => {
                        self.link_super_types(class_node, *child)?;
                    }
                    NodeKind::DirectiveList => {
                        self.directive_list(*child)?;
                    }
                    _ => {}
                }
            }
            Ok(())
        })();
        self.arena.unlock(class_node);
        result
    }

    /// Links the names of an `extends`/`implements` clause and rejects
    /// edges that would close a derivation cycle
    fn link_super_types(&mut self, class_node: NodeId, clause: NodeId) -> Result<(), FatalError> {
        if self.arena.children_count(clause) != 1 {
            return Ok(());
        }
        let name = self.arena.child(clause, 0);
        let names = if self.arena.kind(name) == NodeKind::List {
            self.arena.children(name)
        } else {
            vec![name]
        };
        for name in names {
            self.link_type(name)?;
            if let Some(super_class) = self.arena.instance(name) {
                if super_class == class_node || self.is_derived_from(super_class, class_node)? {
                    self.diags.error(
                        ErrorKind::InvalidType,
                        self.arena.position(name),
                        format!(
                            "'{}' cannot extend or implement '{}', the derivation would be circular.",
                            self.arena.string(class_node),
                            self.arena.string(name)
                        ),
                    );
                }
            }
        }
        Ok(())
    }

    /// Resolves the initializers of the entries of an enum
    fn enum_directive(&mut self, enum_node: NodeId) -> Result<(), FatalError> {
        let entries = self.arena.children(enum_node);
        self.arena.lock(enum_node);
        let result: Result<(), FatalError> = (|| {
            for entry in entries {
                if let Some(set) = self.arena.find_first_child(entry, NodeKind::Set) {
                    if let Some(expr) = self.arena.get_child(set, 0) {
                        self.expression(expr)?;
                    }
                }
            }
            Ok(())
        })();
        self.arena.unlock(enum_node);
        result
    }

    /// Compiles the body of a referenced package
    pub(crate) fn package_body(&mut self, package: NodeId) -> Result<(), FatalError> {
        let children = self.arena.children(package);
        for child in children {
            if self.arena.kind(child) == NodeKind::DirectiveList {
                self.directive_list(child)?;
            }
        }
        Ok(())
    }

    /// Reads one declaration attribute, marking the attribute set as
    /// evaluated; until that mark the attributes of a node are unknown
    pub(crate) fn get_attribute(&mut self, node: NodeId, attr: NodeAttrs) -> bool {
        if !self.arena.attr(node, NodeAttrs::Defined) {
            self.arena.set_attr(node, NodeAttrs::Defined, true);
        }
        self.arena.attr(node, attr)
    }

    /// The UNKNOWN fallback type attached to unresolved expressions so
    /// dependents can still be walked without cascading diagnostics
    pub(crate) fn unknown_type(&mut self) -> NodeId {
        match self.unknown_type {
            Some(unknown) => unknown,
            None => {
                let unknown = self
                    .arena
                    .new_node(NodeKind::Unknown, crate::position::Position::internal());
                self.unknown_type = Some(unknown);
                unknown
            }
        }
    }

    /// Emits a fatal message and returns the matching abort error
    pub(crate) fn internal_error(
        &mut self,
        node: NodeId,
        message: impl Into<String>,
    ) -> FatalError {
        let message = message.into();
        let position = self.arena.position(node);
        self.diags.emit(
            MessageLevel::Fatal,
            ErrorKind::InternalError,
            position.clone(),
            message.clone(),
        );
        FatalError::Internal { position, message }
    }
}
