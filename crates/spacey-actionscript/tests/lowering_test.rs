//! End-to-end lowering tests
//!
//! Builds trees through the public construction API, compiles them and
//! checks the emitted actions and bytes.

use spacey_actionscript::compiler::{Operand, PushValue};
use spacey_actionscript::{
    ActionSequence, CompileError, CompileOptions, NodeKind, OpCode, StringEncoding, Tree,
    ValidationErrorKind, compile,
};

/// Routes pass logs to the test output; `RUST_LOG=spacey_actionscript=trace`
/// shows individual folds and hoists.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn lower(tree: &mut Tree, options: &CompileOptions) -> ActionSequence {
    init_tracing();
    let mut script = compile(tree, options).expect("Compilation should succeed");
    assert_eq!(script.blocks.len(), 1);
    script.blocks.remove(0).actions
}

fn lower_default(tree: &mut Tree) -> ActionSequence {
    lower(tree, &CompileOptions::default())
}

fn is_arithmetic(op: OpCode) -> bool {
    matches!(
        op,
        OpCode::Add2 | OpCode::Subtract | OpCode::Multiply | OpCode::Divide | OpCode::Modulo
    )
}

/// `x = left <op> right;`
fn fold_case(kind: NodeKind, left: i32, right: i32) -> ActionSequence {
    let mut tree = Tree::script();
    let x = tree.ident("x");
    let l = tree.int(left);
    let r = tree.int(right);
    let op = tree.binary(kind, l, r);
    let assign = tree.assign(x, op);
    tree.push_statements([assign]);
    lower_default(&mut tree)
}

fn pushed_value(seq: &ActionSequence) -> PushValue {
    match &seq.instructions[1].operand {
        Some(Operand::Push(value)) => value.clone(),
        other => panic!("expected a push, got {other:?}"),
    }
}

// ============================================================================
// Constant folding
// ============================================================================

#[test]
fn test_integer_folding_wraps() {
    let pairs = [
        (7, 3),
        (-7, 3),
        (i32::MAX, 1),
        (i32::MIN, -1),
        (123_456, 654_321),
        (0, -5),
    ];
    let ops: [(NodeKind, fn(i32, i32) -> i32); 3] = [
        (NodeKind::Add, i32::wrapping_add),
        (NodeKind::Sub, i32::wrapping_sub),
        (NodeKind::Mul, i32::wrapping_mul),
    ];

    for (a, b) in pairs {
        for (kind, expected) in ops {
            let seq = fold_case(kind, a, b);
            assert!(!seq.iter().any(|i| is_arithmetic(i.opcode)), "{kind:?} {a} {b}");
            assert_eq!(pushed_value(&seq), PushValue::Integer(expected(a, b)), "{kind:?} {a} {b}");
        }

        if b != 0 {
            let seq = fold_case(NodeKind::Mod, a, b);
            assert!(!seq.iter().any(|i| is_arithmetic(i.opcode)));
            assert_eq!(pushed_value(&seq), PushValue::Integer(a.wrapping_rem(b)));
        }
    }
}

#[test]
fn test_division_folds_to_double_unless_exact() {
    assert_eq!(pushed_value(&fold_case(NodeKind::Div, 12, 4)), PushValue::Integer(3));
    assert_eq!(pushed_value(&fold_case(NodeKind::Div, 7, 2)), PushValue::Double(3.5));
    assert_eq!(
        pushed_value(&fold_case(NodeKind::Div, 1, 0)),
        PushValue::Double(f64::INFINITY)
    );
    assert_eq!(
        pushed_value(&fold_case(NodeKind::Div, i32::MIN, -1)),
        PushValue::Double(2_147_483_648.0)
    );
}

// ============================================================================
// Constant pool
// ============================================================================

#[test]
fn test_pool_is_capped() {
    const COUNT: usize = 300;
    let mut tree = Tree::script();
    for _ in 0..2 {
        for i in 0..COUNT {
            let s = tree.string(format!("s{i}"));
            tree.push_statements([s]);
        }
    }

    let seq = lower_default(&mut tree);
    let Some(Operand::Pool(pool)) = &seq.instructions[0].operand else {
        panic!("expected a constant pool, got {:?}", seq.instructions[0]);
    };
    assert_eq!(pool.len(), 256);
    assert_eq!(pool[0], "s0");
    assert_eq!(pool[255], "s255");

    let pushes: Vec<&PushValue> = seq
        .iter()
        .filter_map(|i| match &i.operand {
            Some(Operand::Push(value)) => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(pushes.len(), 2 * COUNT);
    for (n, value) in pushes.iter().enumerate() {
        let i = n % COUNT;
        if i < 256 {
            assert_eq!(**value, PushValue::Constant8(i as u8));
        } else {
            assert_eq!(**value, PushValue::Str(format!("s{i}")));
        }
    }
}

#[test]
fn test_single_use_strings_skip_pool() {
    let mut tree = Tree::script();
    let a = tree.string("a");
    let b = tree.string("b");
    tree.push_statements([a, b]);

    let seq = lower_default(&mut tree);
    assert!(seq.iter().all(|i| i.opcode != OpCode::ConstantPool));
}

// ============================================================================
// Encoding
// ============================================================================

fn branch_over_string(text: &str) -> Tree {
    let mut tree = Tree::script();
    let cond = tree.ident("c");
    let x = tree.ident("x");
    let value = tree.string(text);
    let assign = tree.assign(x, value);
    let then = tree.block([assign]);
    let stmt = tree.if_else(cond, then, None);
    tree.push_statements([stmt]);
    tree
}

fn first_branch_offset(seq: &ActionSequence) -> i16 {
    seq.iter()
        .find_map(|i| match i.operand {
            Some(Operand::Offset(offset)) => Some(offset),
            _ => None,
        })
        .expect("a branch")
}

#[test]
fn test_offsets_follow_encoding() {
    let utf8 = CompileOptions::default();
    let latin1 = CompileOptions::default().with_encoding(StringEncoding::Latin1);

    let wide = lower(&mut branch_over_string("caf\u{e9}"), &utf8);
    let narrow = lower(&mut branch_over_string("caf\u{e9}"), &latin1);
    assert_eq!(first_branch_offset(&wide), first_branch_offset(&narrow) + 1);

    for (seq, options) in [(&wide, &utf8), (&narrow, &latin1)] {
        let bytes = seq.to_bytes(options).unwrap();
        assert_eq!(bytes.len(), seq.encoded_len(options).unwrap());
    }
}

#[test]
fn test_unencodable_string_is_an_error() {
    let latin1 = CompileOptions::default().with_encoding(StringEncoding::Latin1);
    let mut tree = branch_over_string("\u{65e5}\u{672c}");
    let err = compile(&mut tree, &latin1)
        .and_then(|script| script.encode())
        .unwrap_err();
    assert!(matches!(err, CompileError::Encoding { encoding: "ISO-8859-1", .. }));
}

#[test]
fn test_encoded_script_matches_planned_length() {
    let mut tree = Tree::script();
    let i = tree.ident("i");
    let zero = tree.int(0);
    let init = tree.assign(i, zero);
    let i = tree.ident("i");
    let ten = tree.int(10);
    let cond = tree.binary(NodeKind::Less, i, ten);
    let i = tree.ident("i");
    let iter = tree.unary(NodeKind::PreIncrement, i);
    let msg = tree.string("tick");
    let trace = tree.call("trace", [msg]);
    let body = tree.block([trace]);
    let stmt = tree.for_loop(Some(init), Some(cond), Some(iter), body);
    tree.push_statements([stmt]);

    let options = CompileOptions::for_version(5);
    let script = compile(&mut tree, &options).unwrap();
    let encoded = script.encode().unwrap();
    let planned = script.blocks[0].actions.encoded_len(&options).unwrap();
    // plus the end-of-actions byte
    assert_eq!(encoded[0].len(), planned + 1);
    assert_eq!(encoded[0].last(), Some(&0));
}

// ============================================================================
// Hoisting
// ============================================================================

#[test]
fn test_hoisted_functions_keep_source_order() {
    let mut tree = Tree::script();
    let play = tree.call("play", []);
    let f1 = tree.function_def("first", &[], []);
    let nested = tree.block([f1]);
    let cond = tree.ident("c");
    let guard = tree.if_else(cond, nested, None);
    let f2 = tree.function_def("second", &[], []);
    let f3 = tree.function_def("third", &[], []);
    let loop_body = tree.block([f3]);
    let x = tree.ident("x");
    let lp = tree.while_loop(x, loop_body);
    tree.push_statements([play, guard, f2, lp]);

    let seq = lower_default(&mut tree);
    let names: Vec<&str> = seq.instructions[..3]
        .iter()
        .map(|i| match &i.operand {
            Some(Operand::Function { name, .. }) => name.as_str(),
            other => panic!("expected a function, got {other:?}"),
        })
        .collect();
    assert_eq!(names, ["first", "second", "third"]);

    let root = tree.root();
    assert_eq!(tree.children(root)[..3], [f1, f2, f3]);
    assert_eq!(tree.children(root)[3], play);
}

#[test]
fn test_inner_functions_hoist_to_their_function() {
    let mut tree = Tree::script();
    let inner = tree.function_def("inner", &[], []);
    let call = tree.call("inner", []);
    let cond = tree.ident("c");
    let block = tree.block([inner]);
    let guard = tree.if_else(cond, block, None);
    let outer = tree.function_def("outer", &[], [call, guard]);
    tree.push_statements([outer]);

    let seq = lower_default(&mut tree);
    let Some(Operand::Function { name, body, .. }) = &seq.instructions[0].operand else {
        panic!("expected a function");
    };
    assert_eq!(name, "outer");
    assert!(matches!(
        &body.instructions[0].operand,
        Some(Operand::Function { name, .. }) if name == "inner"
    ));
}

// ============================================================================
// Errors
// ============================================================================

fn validation_error(tree: &mut Tree) -> (ValidationErrorKind, u32) {
    init_tracing();
    match compile(tree, &CompileOptions::default()) {
        Err(CompileError::Validation { kind, line }) => (kind, line),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn test_break_outside_loop() {
    let mut tree = Tree::script();
    tree.set_line(3);
    let brk = tree.break_stmt();
    tree.push_statements([brk]);
    assert_eq!(validation_error(&mut tree), (ValidationErrorKind::BreakOutsideLoop, 3));
}

#[test]
fn test_continue_in_switch_outside_loop() {
    let mut tree = Tree::script();
    let x = tree.ident("x");
    let one = tree.int(1);
    tree.set_line(4);
    let cont = tree.continue_stmt();
    let case = tree.case(one, [cont]);
    let switch = tree.switch(x, [case]);
    tree.push_statements([switch]);
    assert_eq!(validation_error(&mut tree), (ValidationErrorKind::ContinueOutsideLoop, 4));
}

#[test]
fn test_return_outside_function() {
    let mut tree = Tree::script();
    let ret = tree.return_stmt(None);
    tree.push_statements([ret]);
    assert_eq!(validation_error(&mut tree).0, ValidationErrorKind::ReturnOutsideFunction);
}

#[test]
fn test_loop_does_not_reach_into_function() {
    let mut tree = Tree::script();
    let brk = tree.break_stmt();
    let function = tree.function_expr(&[], [brk]);
    let f = tree.ident("f");
    let assign = tree.assign(f, function);
    let body = tree.block([assign]);
    let x = tree.ident("x");
    let lp = tree.while_loop(x, body);
    tree.push_statements([lp]);
    assert_eq!(validation_error(&mut tree).0, ValidationErrorKind::BreakOutsideLoop);
}

#[test]
fn test_builtin_argument_count() {
    let mut tree = Tree::script();
    let call = tree.call("gotoAndPlay", []);
    tree.push_statements([call]);
    assert_eq!(
        validation_error(&mut tree).0,
        ValidationErrorKind::ArgumentCount {
            name: "gotoAndPlay".into(),
            min: 1,
            max: 1,
            found: 0,
        }
    );
}

#[test]
fn test_mismatched_event_handler() {
    let mut tree = Tree::new(NodeKind::ButtonScript);
    let stop = tree.call("stop", []);
    let handler = tree.event(NodeKind::ClipEvent, 1, [stop]);
    tree.push_statements([handler]);
    assert_eq!(validation_error(&mut tree).0, ValidationErrorKind::InvalidEventHandler);
}

#[test]
fn test_literal_assignment_target() {
    let mut tree = Tree::script();
    let one = tree.int(1);
    let two = tree.int(2);
    let assign = tree.assign(one, two);
    tree.push_statements([assign]);
    assert_eq!(validation_error(&mut tree).0, ValidationErrorKind::InvalidAssignmentTarget);
}

#[test]
fn test_old_versions_rejected() {
    let mut tree = Tree::script();
    let err = compile(&mut tree, &CompileOptions::for_version(4)).unwrap_err();
    assert_eq!(err, CompileError::UnsupportedVersion(4));
}

#[test]
fn test_options_from_json() {
    let options: CompileOptions =
        serde_json::from_str(r#"{"version": 5, "encoding": "latin1"}"#).unwrap();
    assert_eq!(options, CompileOptions::for_version(5).with_encoding(StringEncoding::Latin1));

    let mut tree = Tree::script();
    let stop = tree.call("stop", []);
    tree.push_statements([stop]);
    assert_eq!(lower(&mut tree, &options).instructions.len(), 1);
}
