//! Shared helpers for the semantic analysis integration tests.
#![allow(dead_code)]

use liblyra::{
    arena::{NodeArena, NodeId},
    builder::{native_types, TreeBuilder},
    diagnostics::{Diagnostics, ErrorKind},
    node::NodeKind,
    sem::{Compiler, GlobalImports},
};

/// The result of a test compilation
pub struct Compiled {
    pub arena: NodeArena,
    pub diagnostics: Diagnostics,
    pub errors: usize,
    pub natives: NodeId,
}

/// Runs the pass over `program` with the intrinsic types installed as
/// the native import scope
pub fn compile(mut builder: TreeBuilder, program: NodeId) -> Compiled {
    let natives = native_types(&mut builder);
    let mut arena = builder.arena;

    let mut compiler = Compiler::new(&mut arena);
    compiler.set_global_imports(GlobalImports {
        native: Some(natives),
        ..GlobalImports::default()
    });
    let errors = compiler.compile(program).expect("fatal compiler error");
    let diagnostics = compiler.into_diagnostics();

    Compiled {
        arena,
        diagnostics,
        errors,
        natives,
    }
}

/// Runs the pass a second time over an already compiled arena
pub fn recompile(compiled: &mut Compiled, program: NodeId) -> usize {
    let mut compiler = Compiler::new(&mut compiled.arena);
    compiler.set_global_imports(GlobalImports {
        native: Some(compiled.natives),
        ..GlobalImports::default()
    });
    let errors = compiler.compile(program).expect("fatal compiler error");
    compiled.diagnostics = compiler.into_diagnostics();
    errors
}

/// Number of collected messages of one kind
pub fn count_kind(diagnostics: &Diagnostics, kind: ErrorKind) -> usize {
    diagnostics
        .messages()
        .iter()
        .filter(|message| message.kind == kind)
        .count()
}

/// A flat structural snapshot of a subtree, for idempotence comparisons
pub fn snapshot(arena: &NodeArena, node: NodeId, out: &mut Vec<(NodeId, NodeKind, usize)>) {
    out.push((node, arena.kind(node), arena.children_count(node)));
    for idx in 0..arena.children_count(node) {
        snapshot(arena, arena.child(node, idx), out);
    }
}
