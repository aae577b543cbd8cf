//! Package loading, imports and cross package access control.

mod common;

use std::path::{Path, PathBuf};

use common::{compile, count_kind};
use liblyra::{
    arena::{NodeArena, NodeId},
    builder::{native_types, TreeBuilder},
    diagnostics::ErrorKind,
    node::{NodeAttrs, NodeFlags, NodeKind},
    sem::{Compiler, GlobalImports, ModuleLoader, PackageResolver},
};
use pretty_assertions::assert_eq;

#[test]
fn name_resolves_lazily_through_an_import() {
    let mut b = TreeBuilder::new("lazy_import");
    // package math { function twice(a: Integer): Integer }
    let a = b.parameter("a", Some("Integer"), None);
    let twice = b.function("twice", &[a], Some("Integer"), None);
    let package_body = b.list(&[twice]);
    let package = b.named(NodeKind::Package, "math");
    b.append(package, package_body);

    let import = b.named(NodeKind::Import, "math");
    let callee = b.ident("twice");
    let one = b.integer(1);
    let call = b.call(callee, &[one]);
    let program = b.program(&[package, import, call]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(call), Some(twice));
    // the reference compiled the package
    assert!(compiled.arena.flag(package, NodeFlags::PackageReferenced));
}

#[test]
fn import_implements_compiles_the_package_eagerly() {
    let mut b = TreeBuilder::new("eager_import");
    let ghost = b.ident("ghost");
    let package_body = b.list(&[ghost]);
    let package = b.named(NodeKind::Package, "p");
    b.append(package, package_body);
    let import = b.named(NodeKind::Import, "p");
    b.flags(import, NodeFlags::Implements);
    let program = b.program(&[package, import]);

    let compiled = compile(b, program);
    // the unresolved name inside the package was reached and diagnosed
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::NotFound), 1);
    assert!(compiled.arena.flag(package, NodeFlags::PackageReferenced));
}

#[test]
fn missing_package_import_is_not_found() {
    let mut b = TreeBuilder::new("missing_package");
    let import = b.named(NodeKind::Import, "nowhere");
    b.flags(import, NodeFlags::Implements);
    let program = b.program(&[import]);

    let compiled = compile(b, program);
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::NotFound), 1);
}

#[test]
fn private_package_member_is_invisible_outside() {
    let mut b = TreeBuilder::new("package_private");
    let hidden = b.function("hidden", &[], None, None);
    b.attrs(hidden, NodeAttrs::Private);
    let package_body = b.list(&[hidden]);
    let package = b.named(NodeKind::Package, "p");
    b.append(package, package_body);

    let import = b.named(NodeKind::Import, "p");
    let callee = b.ident("hidden");
    let call = b.call(callee, &[]);
    let program = b.program(&[package, import, call]);

    let compiled = compile(b, program);
    assert!(compiled.errors > 0);
    assert_eq!(compiled.arena.instance(call), None);
}

#[test]
fn internal_package_member_is_invisible_from_program_scope() {
    let mut b = TreeBuilder::new("package_internal");
    let shared = b.function("shared", &[], None, None);
    b.attrs(shared, NodeAttrs::Internal);
    let package_body = b.list(&[shared]);
    let package = b.named(NodeKind::Package, "p");
    b.append(package, package_body);

    let import = b.named(NodeKind::Import, "p");
    let callee = b.ident("shared");
    let call = b.call(callee, &[]);
    let program = b.program(&[package, import, call]);

    let compiled = compile(b, program);
    assert!(compiled.errors > 0);
    assert_eq!(compiled.arena.instance(call), None);
}

/// A host pair serving one external package from a fixed "file"
struct OnePackageIndex;

impl PackageResolver for OnePackageIndex {
    fn resolve_package(&self, import_name: &str, _symbol: &str) -> Option<PathBuf> {
        (import_name == "vendor").then(|| PathBuf::from("vendor.lyra"))
    }
}

struct OnePackageLoader {
    package_program: NodeId,
}

impl ModuleLoader for OnePackageLoader {
    fn load_module(&mut self, _arena: &mut NodeArena, filename: &Path) -> Option<NodeId> {
        assert_eq!(filename, Path::new("vendor.lyra"));
        Some(self.package_program)
    }
}

#[test]
fn external_package_loads_once_through_the_host() {
    let mut b = TreeBuilder::new("external");
    // the external module: package vendor { function util() }
    let util = b.function("util", &[], None, None);
    let vendor_body = b.list(&[util]);
    let vendor = b.named(NodeKind::Package, "vendor");
    b.append(vendor, vendor_body);
    let external_program = b.program(&[vendor]);

    // the user program imports vendor and calls util twice
    let import = b.named(NodeKind::Import, "vendor");
    let c1 = b.ident("util");
    let call1 = b.call(c1, &[]);
    let c2 = b.ident("util");
    let call2 = b.call(c2, &[]);
    let program = b.program(&[import, call1, call2]);

    let natives = native_types(&mut b);
    let mut arena = b.arena;
    let mut compiler = Compiler::new(&mut arena);
    compiler.set_global_imports(GlobalImports {
        native: Some(natives),
        ..GlobalImports::default()
    });
    compiler.set_package_host(
        Box::new(OnePackageIndex),
        Box::new(OnePackageLoader {
            package_program: external_program,
        }),
    );
    let errors = compiler.compile(program).expect("fatal compiler error");
    let diagnostics = compiler.into_diagnostics();

    assert_eq!(errors, 0, "{:?}", diagnostics.messages());
    assert_eq!(arena.instance(call1), Some(util));
    assert_eq!(arena.instance(call2), Some(util));
}
