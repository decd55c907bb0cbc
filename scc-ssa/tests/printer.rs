//! Textual output of optimized sample modules

use pretty_assertions::assert_eq;
use scc_common::TargetInfo;
use scc_ssa::{optimize, print_module, sample, OptimizerOptions};

fn print_optimized(name: &str, options: OptimizerOptions) -> String {
    let (mut ctx, mut module) = sample(name, TargetInfo::lp64(), None).unwrap();
    optimize(&mut ctx, &mut module, &options);
    print_module(&ctx, &module)
}

#[test]
fn test_arith_fold_prints_constant_return() {
    let expected = "\
; module arith_fold

define int @main() {
%0:
  ret 14
}
";
    assert_eq!(print_optimized("arith_fold", OptimizerOptions::all()), expected);
}

#[test]
fn test_diamond_prints_phi() {
    let expected = "\
; module diamond

define int @pick(int %0) {
%1:
  %2 = cmp ne int %0, 0
  br %2, %3, %4
%3: ; preds %1
  br %5
%4: ; preds %1
  br %5
%5: ; preds %3 %4
  %6 = phi int [1, %3], [2, %4]
  ret %6
}
";
    assert_eq!(print_optimized("diamond", OptimizerOptions::all()), expected);
}

#[test]
fn test_const_branch_prints_straight_line() {
    let expected = "\
; module const_branch

define int @choose() {
%0:
  br %1
%1: ; preds %0
  br %2
%2: ; preds %1
  ret 10
}
";
    assert_eq!(print_optimized("const_branch", OptimizerOptions::all()), expected);
}

#[test]
fn test_unoptimized_arith_fold() {
    let expected = "\
; module arith_fold

define int @main() {
%0:
  %1 = alloca int, align 4
  %2 = mul int 3, 4
  %3 = add int 2, %2
  store %3, %1
  %4 = load int, %1
  ret %4
}
";
    assert_eq!(print_optimized("arith_fold", OptimizerOptions::default()), expected);
}

#[test]
fn test_globals_and_declarations() {
    let text = print_optimized("escaping_alloca", OptimizerOptions::all());
    for line in [
        "%pair = type { int, int }",
        "@.str0 = string \"escaped\\00\"",
        "declare void @consume(int*)",
        "declare int @puts(char*)",
        "define int @escape() {",
        "call @consume(%1)",
        "getfieldaddr %2, 1",
        "call @puts(@.str0)",
    ] {
        assert!(text.contains(line), "missing `{line}` in:\n{text}");
    }
}

#[test]
fn test_atomics_text() {
    let text = print_optimized("atomics", OptimizerOptions::all());
    for line in [
        "@counter = global int 0",
        "@counter_ref = internal global int* @counter",
        "atomicrmw add @counter, 1 seq_cst",
        "fence seq_cst",
        "cmpxchg @counter, %2, 0 acq_rel monotonic",
        "atomicrmw xchg @counter, %1 release",
        "fence single_thread acquire",
        "ret %1",
    ] {
        assert!(text.contains(line), "missing `{line}` in:\n{text}");
    }
}

#[test]
fn test_switch_text() {
    let text = print_optimized("switch_select", OptimizerOptions::all());
    assert!(text.contains("define int @classify(int %0) {"), "{text}");
    assert!(text.contains("switch %0, %3 [1: %2, 2: %2, 3: %4]"), "{text}");
    assert!(text.contains("%4: ; preds"), "{text}");
}
