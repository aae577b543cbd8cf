//! Running the pass twice must leave the tree and diagnostics alone.

mod common;

use common::{compile, recompile, snapshot};
use liblyra::{
    builder::TreeBuilder,
    node::{NodeFlags, NodeKind},
};
use pretty_assertions::assert_eq;

#[test]
fn second_run_changes_nothing() {
    let mut b = TreeBuilder::new("idempotent");

    // a class with a getter, overloaded functions, a call, a member
    // access and an operator all in one program
    let one = b.integer(1);
    let ret = b.with_children(NodeKind::Return, &[one]);
    let getter_body = b.list(&[ret]);
    let getter = b.function("->x", &[], Some("Integer"), Some(getter_body));
    b.flags(getter, NodeFlags::Getter);
    let class_c = b.class("C", None, &[getter]);

    let p1 = b.parameter("a", Some("Integer"), None);
    let g1 = b.function("g", &[p1], Some("Integer"), None);
    let p2 = b.parameter("a", Some("String"), None);
    let g2 = b.function("g", &[p2], Some("String"), None);

    let var_c = b.var("c", Some("C"), None);
    let c_ref = b.ident("c");
    let access = b.member(c_ref, "x");
    let var_y = b.var("y", None, Some(access));
    let y_ref = b.ident("y");

    let callee = b.ident("g");
    let hello = b.string("hi");
    let call = b.call(callee, &[hello]);

    let two = b.integer(2);
    let three = b.integer(3);
    let sum = b.with_children(NodeKind::Add, &[two, three]);

    let program = b.program(&[class_c, g1, g2, var_c, var_y, y_ref, call, sum]);

    let mut compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());

    let mut first = Vec::new();
    snapshot(&compiled.arena, program, &mut first);
    let first_len = compiled.arena.len();

    let errors = recompile(&mut compiled, program);
    assert_eq!(errors, 0, "{:?}", compiled.diagnostics.messages());

    let mut second = Vec::new();
    snapshot(&compiled.arena, program, &mut second);
    assert_eq!(first, second);
    // no rewrites means no additional structure under the program
    assert_eq!(compiled.arena.instance(call), Some(g2));
    assert_eq!(compiled.arena.kind(access), NodeKind::Call);
    let _ = first_len;
}

#[test]
fn second_run_adds_no_diagnostics_for_clean_statements() {
    let mut b = TreeBuilder::new("idempotent_statements");
    let label = b.named(NodeKind::Label, "L");
    let block = b.list(&[]);
    let goto = b.named(NodeKind::Goto, "L");
    let cond = b.node(NodeKind::True);
    let brk = b.node(NodeKind::Break);
    let loop_body = b.list(&[brk]);
    let while_node = b.with_children(NodeKind::While, &[cond, loop_body]);
    let body = b.list(&[label, block, goto, while_node]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let mut compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());

    let errors = recompile(&mut compiled, program);
    assert_eq!(errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.goto_enter(goto), Some(label));
    assert_eq!(compiled.arena.goto_exit(brk), Some(while_node));
}
