//! Class and interface structural checks, access control and the
//! getter/setter rewrites.

mod common;

use common::{compile, count_kind};
use liblyra::{
    builder::TreeBuilder,
    diagnostics::ErrorKind,
    node::{NodeAttrs, NodeFlags, NodeKind},
};
use pretty_assertions::assert_eq;

#[test]
fn final_method_cannot_be_redefined() {
    let mut b = TreeBuilder::new("final");
    let body_a = b.list(&[]);
    let m_a = b.function("m", &[], None, Some(body_a));
    b.attrs(m_a, NodeAttrs::Final);
    let class_a = b.class("A", None, &[m_a]);

    let body_b = b.list(&[]);
    let m_b = b.function("m", &[], None, Some(body_b));
    let class_b = b.class("B", Some("A"), &[m_b]);
    let program = b.program(&[class_a, class_b]);

    let compiled = compile(b, program);
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::CannotOverload), 1);
}

#[test]
fn final_method_with_other_prototype_is_a_plain_overload() {
    let mut b = TreeBuilder::new("final_overload");
    let m_a = b.function("m", &[], None, None);
    b.attrs(m_a, NodeAttrs::Final);
    let class_a = b.class("A", None, &[m_a]);

    let p = b.parameter("a", Some("Integer"), None);
    let m_b = b.function("m", &[p], None, None);
    let class_b = b.class("B", Some("A"), &[m_b]);
    let program = b.program(&[class_a, class_b]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
}

#[test]
fn duplicate_functions_in_one_scope() {
    let mut b = TreeBuilder::new("duplicates");
    let f1 = b.function("same", &[], None, None);
    let f2 = b.function("same", &[], None, None);
    let class_a = b.class("A", None, &[f1, f2]);
    let program = b.program(&[class_a]);

    let compiled = compile(b, program);
    assert!(count_kind(&compiled.diagnostics, ErrorKind::Duplicates) >= 1);
}

#[test]
fn function_and_variable_may_not_share_a_name() {
    let mut b = TreeBuilder::new("func_var");
    let var_same = b.var("same", Some("Integer"), None);
    let f = b.function("same", &[], None, None);
    let class_a = b.class("A", None, &[var_same, f]);
    let program = b.program(&[class_a]);

    let compiled = compile(b, program);
    assert!(count_kind(&compiled.diagnostics, ErrorKind::Duplicates) >= 1);
}

#[test]
fn member_attributes_require_a_class() {
    let mut b = TreeBuilder::new("attrs");
    let f = b.function("free", &[], None, None);
    b.attrs(f, NodeAttrs::Static);
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InvalidAttributes),
        1
    );
}

#[test]
fn operator_function_requires_a_class() {
    let mut b = TreeBuilder::new("op_attr");
    let f = b.function("+", &[], None, None);
    b.flags(f, NodeFlags::Operator);
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InvalidOperator),
        1
    );
}

#[test]
fn abstract_function_may_not_have_a_body() {
    let mut b = TreeBuilder::new("abstract_body");
    let body = b.list(&[]);
    let f = b.function("m", &[], None, Some(body));
    b.attrs(f, NodeAttrs::Abstract);
    let class_a = b.class("A", None, &[f]);
    let program = b.program(&[class_a]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::ImproperStatement),
        1
    );
}

#[test]
fn abstract_class_cannot_be_instantiated() {
    let mut b = TreeBuilder::new("abstract_new");
    let run = b.function("run", &[], None, None);
    b.attrs(run, NodeAttrs::Abstract);
    let class_abs = b.class("Abs", None, &[run]);

    let callee = b.ident("Abs");
    let args = b.node(NodeKind::List);
    let new_node = b.with_children(NodeKind::New, &[callee, args]);
    let program = b.program(&[class_abs, new_node]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InvalidExpression),
        1
    );
}

#[test]
fn overriding_class_can_be_instantiated() {
    let mut b = TreeBuilder::new("abstract_override");
    let run_abs = b.function("run", &[], None, None);
    b.attrs(run_abs, NodeAttrs::Abstract);
    let class_abs = b.class("Abs", None, &[run_abs]);

    let body = b.list(&[]);
    let run_impl = b.function("run", &[], None, Some(body));
    let class_impl = b.class("Impl", Some("Abs"), &[run_impl]);

    let callee = b.ident("Impl");
    let args = b.node(NodeKind::List);
    let new_node = b.with_children(NodeKind::New, &[callee, args]);
    let program = b.program(&[class_abs, class_impl, new_node]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(new_node), Some(class_impl));
}

#[test]
fn circular_extends_is_rejected_and_terminates() {
    let mut b = TreeBuilder::new("cycle");
    let class_a = b.class("A", Some("B"), &[]);
    let class_b = b.class("B", Some("A"), &[]);
    // a member lookup over the cyclic chain must terminate too
    let var_a = b.var("a", Some("A"), None);
    let a_ref = b.ident("a");
    let access = b.member(a_ref, "ghost");
    let program = b.program(&[class_a, class_b, var_a, access]);

    let compiled = compile(b, program);
    assert!(count_kind(&compiled.diagnostics, ErrorKind::InvalidType) >= 1);
    assert_eq!(compiled.arena.instance(access), None);
}

#[test]
fn getter_access_rewrites_into_a_call() {
    let mut b = TreeBuilder::new("getter");
    let one = b.integer(1);
    let ret = b.with_children(NodeKind::Return, &[one]);
    let getter_body = b.list(&[ret]);
    let getter = b.function("->x", &[], Some("Integer"), Some(getter_body));
    b.flags(getter, NodeFlags::Getter);
    let class_c = b.class("C", None, &[getter]);

    let var_c = b.var("c", Some("C"), None);
    let c_ref = b.ident("c");
    let access = b.member(c_ref, "x");
    let var_y = b.var("y", None, Some(access));
    let y_ref = b.ident("y");
    let program = b.program(&[class_c, var_c, var_y, y_ref]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());

    // c.x became call(member(c, "->x"), [])
    assert_eq!(compiled.arena.kind(access), NodeKind::Call);
    let member = compiled.arena.child(access, 0);
    assert_eq!(compiled.arena.kind(member), NodeKind::Member);
    let field = compiled.arena.child(member, 1);
    assert!(compiled.arena.string(field).starts_with("->"));
    let arguments = compiled.arena.child(access, 1);
    assert_eq!(compiled.arena.kind(arguments), NodeKind::List);
    assert_eq!(compiled.arena.children_count(arguments), 0);
}

#[test]
fn setter_assignment_rewrites_into_a_call() {
    let mut b = TreeBuilder::new("setter");
    let value = b.parameter("value", Some("Integer"), None);
    let setter = b.function("<-v", &[value], None, None);
    b.flags(setter, NodeFlags::Setter);
    let class_s = b.class("S", None, &[setter]);

    let var_s = b.var("s", Some("S"), None);
    let s_ref = b.ident("s");
    let target = b.member(s_ref, "v");
    let five = b.integer(5);
    let assignment = b.with_children(NodeKind::Assignment, &[target, five]);
    let program = b.program(&[class_s, var_s, assignment]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());

    // s.v = 5 became call(member(s, "<-v"), [5])
    assert_eq!(compiled.arena.kind(assignment), NodeKind::Call);
    let field = compiled.arena.child(target, 1);
    assert_eq!(compiled.arena.string(field), "<-v");
    let arguments = compiled.arena.child(assignment, 1);
    assert_eq!(compiled.arena.children_count(arguments), 1);
    assert_eq!(compiled.arena.child(arguments, 0), five);
}

#[test]
fn private_member_is_invisible_from_outside() {
    let mut b = TreeBuilder::new("private");
    let var_secret = b.var("secret", Some("Integer"), None);
    let secret_variable = b.arena.child(var_secret, 0);
    b.attrs(secret_variable, NodeAttrs::Private);
    let class_a = b.class("A", None, &[var_secret]);

    let var_a = b.var("a", Some("A"), None);
    let a_ref = b.ident("a");
    let access = b.member(a_ref, "secret");
    let program = b.program(&[class_a, var_a, access]);

    let compiled = compile(b, program);
    assert!(count_kind(&compiled.diagnostics, ErrorKind::CannotMatch) >= 1);
    assert_eq!(compiled.arena.instance(access), None);
}

#[test]
fn private_member_resolves_inside_its_class() {
    let mut b = TreeBuilder::new("private_inside");
    let var_secret = b.var("secret", Some("Integer"), None);
    let secret_variable = b.arena.child(var_secret, 0);
    b.attrs(secret_variable, NodeAttrs::Private);

    let secret_ref = b.ident("secret");
    let ret = b.with_children(NodeKind::Return, &[secret_ref]);
    let body = b.list(&[ret]);
    let getter = b.function("read", &[], Some("Integer"), Some(body));
    let class_a = b.class("A", None, &[var_secret, getter]);
    let program = b.program(&[class_a]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(secret_ref), Some(secret_variable));
}

#[test]
fn protected_member_needs_a_derived_class() {
    let mut b = TreeBuilder::new("protected");
    let var_p = b.var("p", Some("Integer"), None);
    let p_variable = b.arena.child(var_p, 0);
    b.attrs(p_variable, NodeAttrs::Protected);
    let class_a = b.class("A", None, &[var_p]);

    // reading through a derived class works
    let p_ref = b.ident("p");
    let ret = b.with_children(NodeKind::Return, &[p_ref]);
    let body = b.list(&[ret]);
    let reader = b.function("read", &[], Some("Integer"), Some(body));
    let class_b = b.class("B", Some("A"), &[reader]);

    let program = b.program(&[class_a, class_b]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(p_ref), Some(p_variable));
}

#[test]
fn protected_member_is_invisible_from_program_scope() {
    let mut b = TreeBuilder::new("protected_outside");
    let var_p = b.var("p", Some("Integer"), None);
    let p_variable = b.arena.child(var_p, 0);
    b.attrs(p_variable, NodeAttrs::Protected);
    let class_a = b.class("A", None, &[var_p]);

    let var_a = b.var("a", Some("A"), None);
    let a_ref = b.ident("a");
    let access = b.member(a_ref, "p");
    let program = b.program(&[class_a, var_a, access]);

    let compiled = compile(b, program);
    assert!(count_kind(&compiled.diagnostics, ErrorKind::CannotMatch) >= 1);
    assert_eq!(compiled.arena.instance(access), None);
}

#[test]
fn member_not_found_on_non_dynamic_class() {
    let mut b = TreeBuilder::new("static_member");
    let class_a = b.class("A", None, &[]);
    let var_a = b.var("a", Some("A"), None);
    let a_ref = b.ident("a");
    let access = b.member(a_ref, "ghost");
    let program = b.program(&[class_a, var_a, access]);

    let compiled = compile(b, program);
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::Static), 1);
}

#[test]
fn unknown_member_on_dynamic_class_is_accepted() {
    let mut b = TreeBuilder::new("dynamic_member");
    let class_a = b.class("A", None, &[]);
    b.attrs(class_a, NodeAttrs::Dynamic);
    let var_a = b.var("a", Some("A"), None);
    let a_ref = b.ident("a");
    let access = b.member(a_ref, "ghost");
    let program = b.program(&[class_a, var_a, access]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
}

#[test]
fn super_member_call_resolves_in_the_base_class() {
    let mut b = TreeBuilder::new("super_member");
    let base_body = b.list(&[]);
    let m = b.function("m", &[], None, Some(base_body));
    let class_base = b.class("Base", None, &[m]);

    let super_node = b.node(NodeKind::Super);
    let target = b.with_children(NodeKind::Member, &[super_node]);
    let m_ident = b.ident("m");
    b.append(target, m_ident);
    let call = b.with_children(NodeKind::Call, &[target]);
    let args = b.node(NodeKind::List);
    b.append(call, args);
    let ret = b.with_children(NodeKind::Return, &[call]);
    let body = b.list(&[ret]);
    let t = b.function("t", &[], None, Some(body));
    let class_derived = b.class("Derived", Some("Base"), &[t]);
    let program = b.program(&[class_base, class_derived]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.instance(target), Some(m));
}

#[test]
fn super_call_outside_a_class_is_rejected() {
    let mut b = TreeBuilder::new("super_outside");
    let super_node = b.node(NodeKind::Super);
    let args = b.node(NodeKind::List);
    let call = b.with_children(NodeKind::Call, &[super_node, args]);
    let program = b.program(&[call]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InvalidExpression),
        1
    );
}

#[test]
fn class_qualified_instance_member_needs_an_instance() {
    let mut b = TreeBuilder::new("instance_expected");
    let var_field = b.var("field", Some("Integer"), None);
    let class_a = b.class("A", None, &[var_field]);
    let a_type = b.ident("A");
    let access = b.member(a_type, "field");
    let program = b.program(&[class_a, access]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InstanceExpected),
        1
    );
}
