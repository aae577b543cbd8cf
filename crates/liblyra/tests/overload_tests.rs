//! Overload selection over whole trees.

mod common;

use common::{compile, count_kind};
use liblyra::{
    builder::TreeBuilder,
    diagnostics::ErrorKind,
    node::{NodeFlags, NodeKind},
};
use pretty_assertions::assert_eq;

#[test]
fn overload_by_argument_type() {
    let mut b = TreeBuilder::new("overload");
    let p1 = b.parameter("a", Some("Integer"), None);
    let g1 = b.function("g", &[p1], Some("Integer"), None);
    let p2 = b.parameter("a", Some("String"), None);
    let g2 = b.function("g", &[p2], Some("String"), None);

    let callee = b.ident("g");
    let hello = b.string("hi");
    let call = b.call(callee, &[hello]);
    let program = b.program(&[g1, g2, call]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(call), Some(g2));
}

#[test]
fn ambiguous_overload_is_a_duplicates_error() {
    let mut b = TreeBuilder::new("ambiguous");
    let p1a = b.parameter("a", Some("Integer"), None);
    let p1b = b.parameter("b", Some("String"), None);
    let g1 = b.function("g", &[p1a, p1b], None, None);
    let p2a = b.parameter("a", Some("String"), None);
    let p2b = b.parameter("b", Some("Integer"), None);
    let g2 = b.function("g", &[p2a, p2b], None, None);

    let var_x = b.var("x", Some("Object"), None);
    let var_y = b.var("y", Some("Object"), None);
    let callee = b.ident("g");
    let x_ref = b.ident("x");
    let y_ref = b.ident("y");
    let call = b.call(callee, &[x_ref, y_ref]);
    let program = b.program(&[g1, g2, var_x, var_y, call]);

    let compiled = compile(b, program);
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::Duplicates), 1);
    assert_eq!(compiled.arena.instance(call), None);
}

#[test]
fn missing_default_arguments_are_materialized() {
    let mut b = TreeBuilder::new("defaults");
    let p1 = b.parameter("a", Some("Integer"), None);
    let ninety = b.integer(90);
    let p2 = b.parameter("b", Some("Integer"), Some(ninety));
    let g = b.function("g", &[p1, p2], None, None);

    let callee = b.ident("g");
    let one = b.integer(1);
    let call = b.call(callee, &[one]);
    let args = b.arena.child(call, 1);
    let program = b.program(&[g, call]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(call), Some(g));

    // the missing argument became an auto node linked to the default
    assert_eq!(compiled.arena.children_count(args), 2);
    let auto = compiled.arena.child(args, 1);
    assert_eq!(compiled.arena.kind(auto), NodeKind::Auto);
    assert_eq!(compiled.arena.instance(auto), Some(ninety));
}

#[test]
fn missing_argument_without_default_rejects_the_candidate() {
    let mut b = TreeBuilder::new("missing_arg");
    let p1 = b.parameter("a", Some("Integer"), None);
    let p2 = b.parameter("b", Some("Integer"), None);
    let g = b.function("g", &[p1, p2], None, None);

    let callee = b.ident("g");
    let one = b.integer(1);
    let call = b.call(callee, &[one]);
    let program = b.program(&[g, call]);

    let compiled = compile(b, program);
    assert!(compiled.errors > 0);
    assert_eq!(compiled.arena.instance(call), None);
}

#[test]
fn rest_parameter_collects_extra_arguments() {
    let mut b = TreeBuilder::new("rest");
    let p1 = b.parameter("a", Some("Integer"), None);
    let p2 = b.parameter("rest", None, None);
    b.flags(p2, NodeFlags::Rest);
    let g = b.function("g", &[p1, p2], None, None);

    let callee = b.ident("g");
    let one = b.integer(1);
    let two = b.integer(2);
    let three = b.integer(3);
    let call = b.call(callee, &[one, two, three]);
    let program = b.program(&[g, call]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(call), Some(g));
}

#[test]
fn named_argument_matches_by_parameter_name() {
    let mut b = TreeBuilder::new("named");
    let p1 = b.parameter("first", Some("Integer"), None);
    let ten = b.integer(10);
    let p2 = b.parameter("second", Some("Integer"), Some(ten));
    let g = b.function("g", &[p1, p2], None, None);

    // g(second(7), 1): `second` is named, `1` takes the first slot
    let seven = b.integer(7);
    let name_id = b.ident("second");
    let name = b.with_children(NodeKind::Name, &[name_id]);
    let named_arg = b.with_children(NodeKind::List, &[name, seven]);
    let one = b.integer(1);
    let callee = b.ident("g");
    let call = b.call(callee, &[named_arg, one]);
    let program = b.program(&[g, call]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(call), Some(g));
}

#[test]
fn unknown_named_argument_is_invalid_field_name() {
    let mut b = TreeBuilder::new("bad_name");
    let p1 = b.parameter("first", Some("Integer"), None);
    let g = b.function("g", &[p1], None, None);

    let seven = b.integer(7);
    let name_id = b.ident("nope");
    let name = b.with_children(NodeKind::Name, &[name_id]);
    let named_arg = b.with_children(NodeKind::List, &[name, seven]);
    let callee = b.ident("g");
    let call = b.call(callee, &[named_arg]);
    let program = b.program(&[g, call]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InvalidFieldName),
        1
    );
}

#[test]
fn call_on_a_class_becomes_a_cast() {
    let mut b = TreeBuilder::new("cast");
    let class_c = b.class("C", None, &[]);
    let var_v = b.var("v", Some("C"), None);
    let callee = b.ident("C");
    let v_ref = b.ident("v");
    let call = b.call(callee, &[v_ref]);
    let program = b.program(&[class_c, var_v, call]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.kind(call), NodeKind::As);
    // children are now (expression, type)
    let type_node = compiled.arena.child(call, 1);
    assert_eq!(compiled.arena.instance(type_node), Some(class_c));
}

#[test]
fn member_function_call_gains_an_implicit_this() {
    let mut b = TreeBuilder::new("implicit_this");
    let helper = b.function("helper", &[], None, None);
    let callee = b.ident("helper");
    let call = b.call(callee, &[]);
    let ret = b.with_children(NodeKind::Return, &[call]);
    let body = b.list(&[ret]);
    let work = b.function("work", &[], None, Some(body));
    let class_c = b.class("C", None, &[helper, work]);
    let program = b.program(&[class_c]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(call), Some(helper));

    // the callee was rewritten into this.helper
    let rewritten = compiled.arena.child(call, 0);
    assert_eq!(compiled.arena.kind(rewritten), NodeKind::Member);
    assert_eq!(
        compiled.arena.kind(compiled.arena.child(rewritten, 0)),
        NodeKind::This
    );
}

#[test]
fn unprototyped_function_loses_to_a_prototyped_one() {
    let mut b = TreeBuilder::new("unprototyped");
    // g declared without any argument list at all
    let g1 = b.named(NodeKind::Function, "g");
    b.flags(g1, NodeFlags::Void);
    let p = b.parameter("a", Some("Integer"), None);
    let g2 = b.function("g", &[p], None, None);

    let callee = b.ident("g");
    let one = b.integer(1);
    let call = b.call(callee, &[one]);
    let program = b.program(&[g1, g2, call]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(call), Some(g2));
}
