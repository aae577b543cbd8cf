//! Lyra Compiler Semantic Analysis Library
//!
//! This library implements the semantic analysis engine of the Lyra
//! scripting language compiler: the pass that takes a parsed, still
//! partially ambiguous abstract syntax tree and turns it into a fully
//! resolved, type annotated, scope aware tree suitable for an optimizer
//! and a code generator to consume.
//!
//! # Overview
//!
//! The pass performs, in one recursive walk over a shared mutable tree:
//!
//! - **Name resolution** across nested lexical scopes, inheritance
//!   chains, packages, imports, `with` objects and namespace scopes
//! - **Overload selection** scoring candidate functions against the
//!   caller's arguments and picking a unique best match
//! - **Member resolution** over classes, interfaces, enums and packages,
//!   including `super.x` and chained `a.b.c` access
//! - **Structural checks** on classes and interfaces: duplicates, final
//!   overriding, abstract instantiation constraints
//! - **Control flow validation**: labels, `goto`, `break`/`continue`
//!   targets, `return` legality, `try`/`catch`/`finally` adjacency
//! - **Access control**: private, protected, internal, package private
//! - **Mechanical rewrites**: operator overloads into calls, getter and
//!   setter accesses into calls, identifier calls into casts, implicit
//!   `this.` injection, constant folding of variable references
//! - **Lazy package loading** through a host package index resolver
//!
//! # Architecture
//!
//! - [`arena`]: the node arena holding the AST; typed indices serve as
//!   non-owning cross-edges
//! - [`node`]: node kinds, flags, attributes and payloads
//! - [`sem`]: the cooperating resolvers of the pass
//! - [`diagnostics`]: the message sink read by the host after the pass
//! - [`file`] / [`position`]: source files and node positions
//!
//! # Usage
//!
//! The host parses source text into the arena (the parser is not part of
//! this crate), then runs the pass:
//!
//! ```ignore
//! use liblyra::{arena::NodeArena, sem::Compiler};
//!
//! let mut arena = NodeArena::new();
//! let program = /* ... parser output ... */;
//! let mut compiler = Compiler::new(&mut arena);
//! let errors = compiler.compile(program)?;
//! if errors == 0 {
//!     // the tree is ready for the optimizer
//! }
//! ```
//!
//! # Error Handling
//!
//! The pass never unwinds on user errors: every failure emits a
//! diagnostic and resolution continues with a local fallback. The
//! [`diagnostics::FatalError`] channel only reports broken internal
//! invariants to the host.

pub mod arena;
pub mod builder;
pub mod diagnostics;
pub mod file;
pub mod node;
pub mod position;
pub mod sem;

pub use arena::{NodeArena, NodeId};
pub use builder::TreeBuilder;
pub use diagnostics::{
    CodeSpanReportGenerator, Diagnostics, ErrorKind, FatalError, Message, MessageLevel,
    ReportGenerator,
};
pub use file::SourceFile;
pub use node::{NodeAttrs, NodeFlags, NodeKind};
pub use position::Position;
pub use sem::{Compiler, GlobalImports, ModuleLoader, PackageResolver, TimeSource};
