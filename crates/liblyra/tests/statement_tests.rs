//! Statement validation and control flow wiring.

mod common;

use common::{compile, count_kind};
use liblyra::{
    builder::TreeBuilder,
    diagnostics::ErrorKind,
    node::{NodeFlags, NodeKind},
};
use pretty_assertions::assert_eq;

#[test]
fn goto_wires_enter_and_exit_edges() {
    let mut b = TreeBuilder::new("goto");
    let label = b.named(NodeKind::Label, "L");
    let block = b.list(&[]);
    let goto = b.named(NodeKind::Goto, "L");
    let body = b.list(&[label, block, goto]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.goto_enter(goto), Some(label));
    assert_eq!(compiled.arena.goto_exit(goto), Some(body));
}

#[test]
fn goto_to_a_missing_label() {
    let mut b = TreeBuilder::new("goto_missing");
    let goto = b.named(NodeKind::Goto, "nowhere");
    let body = b.list(&[goto]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::LabelNotFound), 1);
}

#[test]
fn duplicate_labels_are_diagnosed() {
    let mut b = TreeBuilder::new("dup_labels");
    let l1 = b.named(NodeKind::Label, "L");
    let l2 = b.named(NodeKind::Label, "L");
    let body = b.list(&[l1, l2]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::Duplicates), 1);
}

#[test]
fn break_outside_a_loop() {
    let mut b = TreeBuilder::new("break");
    let brk = b.node(NodeKind::Break);
    let body = b.list(&[brk]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::ImproperStatement),
        1
    );
    assert_eq!(compiled.arena.goto_exit(brk), None);
}

#[test]
fn break_targets_the_enclosing_loop() {
    let mut b = TreeBuilder::new("break_loop");
    let cond = b.node(NodeKind::True);
    let brk = b.node(NodeKind::Break);
    let loop_body = b.list(&[brk]);
    let while_node = b.with_children(NodeKind::While, &[cond, loop_body]);
    let body = b.list(&[while_node]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.goto_exit(brk), Some(while_node));
}

#[test]
fn labelled_break_targets_the_labelled_loop() {
    let mut b = TreeBuilder::new("break_label");
    let outer_cond = b.node(NodeKind::True);
    let inner_cond = b.node(NodeKind::True);
    let brk = b.named(NodeKind::Break, "out");
    let inner_body = b.list(&[brk]);
    let inner_while = b.with_children(NodeKind::While, &[inner_cond, inner_body]);
    let outer_body = b.list(&[inner_while]);
    let outer_while = b.with_children(NodeKind::While, &[outer_cond, outer_body]);
    let label = b.named(NodeKind::Label, "out");
    let body = b.list(&[label, outer_while]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert_eq!(compiled.arena.goto_exit(brk), Some(outer_while));
}

#[test]
fn continue_does_not_target_a_switch() {
    let mut b = TreeBuilder::new("continue_switch");
    let scrutinee = b.integer(1);
    let cont = b.node(NodeKind::Continue);
    let case_node = {
        let value = b.integer(1);
        b.with_children(NodeKind::Case, &[value])
    };
    let list = b.list(&[case_node, cont]);
    let switch_node = b.with_children(NodeKind::Switch, &[scrutinee, list]);
    let body = b.list(&[switch_node]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::ImproperStatement),
        1
    );
}

#[test]
fn switch_must_start_with_a_case() {
    let mut b = TreeBuilder::new("switch_start");
    let scrutinee = b.integer(1);
    let stray = b.integer(2);
    let list = b.list(&[stray]);
    let switch_node = b.with_children(NodeKind::Switch, &[scrutinee, list]);
    let program = b.program(&[switch_node]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InaccessibleStatement),
        1
    );
}

#[test]
fn only_one_default_per_switch() {
    let mut b = TreeBuilder::new("two_defaults");
    let scrutinee = b.integer(1);
    let d1 = b.node(NodeKind::Default);
    let d2 = b.node(NodeKind::Default);
    let list = b.list(&[d1, d2]);
    let switch_node = b.with_children(NodeKind::Switch, &[scrutinee, list]);
    let program = b.program(&[switch_node]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::ImproperStatement),
        1
    );
    // the flag resets so a recompile behaves the same
    assert!(!compiled.arena.flag(switch_node, NodeFlags::SwitchDefault));
}

#[test]
fn case_outside_a_switch() {
    let mut b = TreeBuilder::new("stray_case");
    let value = b.integer(1);
    let case_node = b.with_children(NodeKind::Case, &[value]);
    let inner = b.list(&[case_node]);
    let body = b.list(&[inner]);
    let f = b.function("f", &[], None, Some(body));
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::ImproperStatement),
        1
    );
}

#[test]
fn case_range_requires_the_in_operator() {
    let mut b = TreeBuilder::new("case_range");
    let scrutinee = b.integer(1);
    let low = b.integer(1);
    let high = b.integer(5);
    let case_node = b.with_children(NodeKind::Case, &[low, high]);
    let list = b.list(&[case_node]);
    let switch_node = b.with_children(NodeKind::Switch, &[scrutinee, list]);
    // switch operator: strictly equal
    b.arena.set_integer(switch_node, 3);
    let program = b.program(&[switch_node]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InvalidExpression),
        1
    );
}

#[test]
fn try_needs_a_catch_or_finally() {
    let mut b = TreeBuilder::new("lone_try");
    let try_body = b.list(&[]);
    let try_node = b.with_children(NodeKind::Try, &[try_body]);
    let program = b.program(&[try_node]);

    let compiled = compile(b, program);
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::InvalidTry), 1);
}

#[test]
fn try_catch_finally_chain_is_accepted() {
    let mut b = TreeBuilder::new("try_chain");
    let try_body = b.list(&[]);
    let try_node = b.with_children(NodeKind::Try, &[try_body]);

    let param = b.parameter("error", Some("String"), None);
    let catch_params = b.with_children(NodeKind::Parameters, &[param]);
    let catch_body = b.list(&[]);
    let catch_node = b.with_children(NodeKind::Catch, &[catch_params, catch_body]);
    b.flags(catch_node, NodeFlags::Typed);

    let finally_body = b.list(&[]);
    let finally_node = b.with_children(NodeKind::Finally, &[finally_body]);

    let program = b.program(&[try_node, catch_node, finally_node]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    assert!(compiled.arena.flag(param, NodeFlags::Catch));
}

#[test]
fn untyped_catch_must_be_last() {
    let mut b = TreeBuilder::new("untyped_catch");
    let try_body = b.list(&[]);
    let try_node = b.with_children(NodeKind::Try, &[try_body]);

    let p1 = b.parameter("e", None, None);
    let params1 = b.with_children(NodeKind::Parameters, &[p1]);
    let body1 = b.list(&[]);
    let catch1 = b.with_children(NodeKind::Catch, &[params1, body1]);

    let p2 = b.parameter("e", Some("String"), None);
    let params2 = b.with_children(NodeKind::Parameters, &[p2]);
    let body2 = b.list(&[]);
    let catch2 = b.with_children(NodeKind::Catch, &[params2, body2]);
    b.flags(catch2, NodeFlags::Typed);

    let program = b.program(&[try_node, catch1, catch2]);

    let compiled = compile(b, program);
    assert_eq!(count_kind(&compiled.diagnostics, ErrorKind::InvalidType), 1);
}

#[test]
fn return_outside_a_function() {
    let mut b = TreeBuilder::new("stray_return");
    let ret = b.node(NodeKind::Return);
    let program = b.program(&[ret]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::ImproperStatement),
        1
    );
}

#[test]
fn void_function_may_not_return_a_value() {
    let mut b = TreeBuilder::new("void_return");
    let one = b.integer(1);
    let ret = b.with_children(NodeKind::Return, &[one]);
    let body = b.list(&[ret]);
    let f = b.function("f", &[], None, Some(body));
    b.flags(f, NodeFlags::Void);
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::ImproperStatement),
        1
    );
}

#[test]
fn never_function_may_not_return() {
    let mut b = TreeBuilder::new("never_return");
    let one = b.integer(1);
    let ret = b.with_children(NodeKind::Return, &[one]);
    let body = b.list(&[ret]);
    let f = b.function("f", &[], None, Some(body));
    b.flags(f, NodeFlags::Never);
    let program = b.program(&[f]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::ImproperStatement),
        1
    );
}

#[test]
fn with_may_not_use_this() {
    let mut b = TreeBuilder::new("with_this");
    let this = b.node(NodeKind::This);
    let with_body = b.list(&[]);
    let with_node = b.with_children(NodeKind::With, &[this, with_body]);
    let program = b.program(&[with_node]);

    let compiled = compile(b, program);
    assert_eq!(
        count_kind(&compiled.diagnostics, ErrorKind::InvalidExpression),
        1
    );
}

#[test]
fn for_in_and_classic_for_both_resolve() {
    let mut b = TreeBuilder::new("for_forms");
    // for (item in collection) {}
    let var_collection = b.var("collection", Some("Array"), None);
    let item = b.var("item", None, None);
    let collection_ref = b.ident("collection");
    let in_body = b.list(&[]);
    let for_in = b.with_children(NodeKind::For, &[item, collection_ref, in_body]);

    // for (;;) {}
    let e1 = b.node(NodeKind::Empty);
    let e2 = b.node(NodeKind::Empty);
    let e3 = b.node(NodeKind::Empty);
    let classic_body = b.list(&[]);
    let classic = b.with_children(NodeKind::For, &[e1, e2, e3, classic_body]);

    let program = b.program(&[var_collection, for_in, classic]);

    let compiled = compile(b, program);
    assert_eq!(compiled.errors, 0, "{:?}", compiled.diagnostics.messages());
    let collection_variable = compiled.arena.child(var_collection, 0);
    assert_eq!(
        compiled.arena.instance(collection_ref),
        Some(collection_variable)
    );
}
