//! Operator overload lookup and rewrites.

mod common;

use common::{compile, count_kind};
use liblyra::{
    builder::TreeBuilder,
    diagnostics::ErrorKind,
    node::{NodeFlags, NodeKind},
};
use pretty_assertions::assert_eq;

#[test]
fn intrinsic_operator_keeps_the_expression() {
    let mut b = TreeBuilder::new("intrinsic");
    let one = b.integer(1);
    let two = b.integer(2);
    let add = b.with_children(NodeKind::Add, &[one, two]);
    let program = b.program(&[add]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    // the node is still an addition, only linked to the operator
    assert_eq!(compiled.arena.kind(add), NodeKind::Add);
    let operator = compiled.arena.instance(add).expect("operator instance");
    assert_eq!(compiled.arena.kind(operator), NodeKind::Function);
    assert!(compiled.arena.type_link(add).is_some());
}

#[test]
fn overloaded_operator_rewrites_into_a_call() {
    let mut b = TreeBuilder::new("overloaded_op");
    // class V with a non intrinsic "+" operator
    let left = b.parameter("left", Some("V"), None);
    let right = b.parameter("right", Some("V"), None);
    let plus = b.function("+", &[left, right], Some("V"), None);
    b.flags(plus, NodeFlags::Operator);
    let class_v = b.class("V", None, &[plus]);

    let var_a = b.var("a", Some("V"), None);
    let var_b = b.var("b", Some("V"), None);
    let a_ref = b.ident("a");
    let b_ref = b.ident("b");
    let add = b.with_children(NodeKind::Add, &[a_ref, b_ref]);
    let body = b.list(&[add]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[class_v, var_a, var_b, f]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());

    // a + b became call(member(a, "+"), [b])
    let rewritten = compiled.arena.child(body, 0);
    assert_eq!(compiled.arena.kind(rewritten), NodeKind::Call);
    let member = compiled.arena.child(rewritten, 0);
    assert_eq!(compiled.arena.kind(member), NodeKind::Member);
    assert_eq!(compiled.arena.child(member, 0), a_ref);
    let op_name = compiled.arena.child(member, 1);
    assert_eq!(compiled.arena.string(op_name), "+");
    assert_eq!(compiled.arena.instance(op_name), Some(plus));
    let arguments = compiled.arena.child(rewritten, 1);
    assert_eq!(compiled.arena.children(arguments), vec![b_ref]);
}

#[test]
fn unknown_operator_is_diagnosed() {
    let mut b = TreeBuilder::new("no_op");
    let class_v = b.class("V", None, &[]);
    let var_a = b.var("a", Some("V"), None);
    let var_b = b.var("b", Some("V"), None);
    let a_ref = b.ident("a");
    let b_ref = b.ident("b");
    let add = b.with_children(NodeKind::Add, &[a_ref, b_ref]);
    let program = b.program(&[class_v, var_a, var_b, add]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InvalidOperator),
        1
    );
}

#[test]
fn increment_of_a_constant_is_rejected() {
    let mut b = TreeBuilder::new("const_incr");
    // no literal initializer, so the reference does not fold away
    let var_k = b.var("K", Some("Integer"), None);
    let variable = b.arena.child(var_k, 0);
    b.flags(variable, NodeFlags::Const);
    let k_ref = b.ident("K");
    let incr = b.with_children(NodeKind::Increment, &[k_ref]);
    let program = b.program(&[var_k, incr]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::CannotOverwriteConst),
        1
    );
}

#[test]
fn post_increment_rewrite_preserves_the_value_through_a_temporary() {
    let mut b = TreeBuilder::new("post_incr");
    // class V with a non intrinsic "++" operator
    let left = b.parameter("left", Some("V"), None);
    let plus_plus = b.function("++", &[left], Some("V"), None);
    b.flags(plus_plus, NodeFlags::Operator);
    let class_v = b.class("V", None, &[plus_plus]);

    let var_a = b.var("a", Some("V"), None);
    let a_ref = b.ident("a");
    let incr = b.with_children(NodeKind::PostIncrement, &[a_ref]);
    let body = b.list(&[incr]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[class_v, var_a, f]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());

    // the statement became (#temp_var# = a, a.++(), #temp_var#)
    let rewritten = compiled.arena.child(body, 0);
    assert_eq!(compiled.arena.kind(rewritten), NodeKind::List);
    assert_eq!(compiled.arena.children_count(rewritten), 3);
    assert_eq!(
        compiled.arena.kind(compiled.arena.child(rewritten, 0)),
        NodeKind::Assignment
    );
    assert_eq!(
        compiled.arena.kind(compiled.arena.child(rewritten, 1)),
        NodeKind::Call
    );
    let read_back = compiled.arena.child(rewritten, 2);
    assert_eq!(compiled.arena.kind(read_back), NodeKind::Identifier);
    assert!(compiled.arena.instance(read_back).is_some());
}

#[test]
fn compound_assignment_resolves_the_operator() {
    let mut b = TreeBuilder::new("compound");
    let one = b.integer(1);
    let var_x = b.var("x", Some("Integer"), Some(one));
    let x_ref = b.ident("x");
    let two = b.integer(2);
    let add_assign = b.with_children(NodeKind::AssignmentAdd, &[x_ref, two]);
    let program = b.program(&[var_x, add_assign]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    // += is intrinsic on Integer, so the node stays an assignment
    assert_eq!(compiled.arena.kind(add_assign), NodeKind::AssignmentAdd);
    assert!(compiled.arena.instance(add_assign).is_some());
}
