//! End-to-end optimizer tests over the sample modules

mod common;

use common::{all_option_sets, int, run_sample, Val};
use pretty_assertions::assert_eq;
use scc_common::{SsaError, TargetInfo};
use scc_ssa::ir::{Context, InstrKind, Module, ValueId, ValueKind};
use scc_ssa::opt::{eliminate_dead_code, fold_function, promote_function};
use scc_ssa::verify::{verify_module, verify_use_lists};
use scc_ssa::{optimize, print_module, sample, try_optimize, OptimizerOptions, SAMPLE_NAMES};

/// Entry point and arguments each sample is exercised with
fn runs() -> Vec<(&'static str, &'static str, Vec<Val>)> {
    vec![
        ("arith_fold", "main", vec![]),
        ("diamond", "pick", vec![int(0)]),
        ("diamond", "pick", vec![int(7)]),
        ("loop_invariant", "sum", vec![int(0)]),
        ("loop_invariant", "sum", vec![int(4)]),
        ("loop_counter", "count", vec![]),
        ("const_branch", "choose", vec![]),
        ("switch_select", "classify", vec![int(1)]),
        ("switch_select", "classify", vec![int(2)]),
        ("switch_select", "classify", vec![int(3)]),
        ("switch_select", "classify", vec![int(9)]),
        ("nested_loops", "nest", vec![int(0)]),
        ("nested_loops", "nest", vec![int(3)]),
        ("escaping_alloca", "escape", vec![]),
        ("atomics", "bump", vec![]),
    ]
}

fn optimized(name: &str, options: &OptimizerOptions) -> (Context, Module) {
    let (mut ctx, mut module) = sample(name, TargetInfo::lp64(), None).unwrap();
    optimize(&mut ctx, &mut module, options);
    (ctx, module)
}

fn instr_count(ctx: &Context, module: &Module, pred: impl Fn(&InstrKind) -> bool) -> usize {
    module
        .defined_functions(ctx)
        .into_iter()
        .flat_map(|f| ctx.blocks_of(f).to_vec())
        .flat_map(|b| ctx.block(b).instrs().to_vec())
        .filter(|&i| pred(&ctx.instr(i).kind))
        .count()
}

fn main_function(ctx: &Context, module: &Module) -> ValueId {
    *module.defined_functions(ctx).last().unwrap()
}

#[test]
fn test_every_pipeline_preserves_behaviour() {
    for (name, entry, args) in runs() {
        let expected = run_sample(name, entry, &args, None);
        for options in all_option_sets() {
            let actual = run_sample(name, entry, &args, Some(options));
            assert_eq!(actual, expected, "{name} changed behaviour under {options:?}");
        }
    }
}

#[test]
fn test_sample_results() {
    let result = |name, entry, args: &[Val]| run_sample(name, entry, args, None).result;
    assert_eq!(result("arith_fold", "main", &[]), Some(int(14)));
    assert_eq!(result("diamond", "pick", &[int(3)]), Some(int(1)));
    assert_eq!(result("diamond", "pick", &[int(0)]), Some(int(2)));
    assert_eq!(result("loop_invariant", "sum", &[int(3)]), Some(int(15)));
    assert_eq!(result("loop_counter", "count", &[]), Some(int(10)));
    assert_eq!(result("const_branch", "choose", &[]), Some(int(10)));
    assert_eq!(result("switch_select", "classify", &[int(1)]), Some(int(100)));
    assert_eq!(result("switch_select", "classify", &[int(2)]), Some(int(100)));
    assert_eq!(result("switch_select", "classify", &[int(3)]), Some(int(7)));
    assert_eq!(result("switch_select", "classify", &[int(9)]), Some(int(200)));
    assert_eq!(result("nested_loops", "nest", &[int(0)]), Some(int(0)));
    assert_eq!(result("nested_loops", "nest", &[int(3)]), Some(int(12)));
    assert_eq!(result("escaping_alloca", "escape", &[]), Some(int(3)));
    assert_eq!(result("atomics", "bump", &[]), Some(int(0)));
}

#[test]
fn test_every_pipeline_keeps_ir_well_formed() {
    for &name in SAMPLE_NAMES {
        for options in all_option_sets() {
            let (ctx, module) = optimized(name, &options);
            verify_module(&ctx, &module).unwrap_or_else(|e| panic!("{name} under {options:?}: {e}"));
        }
    }
}

#[test]
fn test_folding_twice_changes_nothing() {
    for &name in SAMPLE_NAMES {
        let (mut ctx, module) = sample(name, TargetInfo::lp64(), None).unwrap();
        for f in module.defined_functions(&ctx) {
            fold_function(&mut ctx, f);
            let before = print_module(&ctx, &module);
            assert_eq!(fold_function(&mut ctx, f), 0, "{name} folded again");
            assert_eq!(print_module(&ctx, &module), before);
        }
    }
}

#[test]
fn test_passes_keep_use_lists_exact() {
    for &name in SAMPLE_NAMES {
        let (mut ctx, module) = sample(name, TargetInfo::lp64(), None).unwrap();
        for f in module.defined_functions(&ctx) {
            fold_function(&mut ctx, f);
            verify_use_lists(&ctx).unwrap();
            eliminate_dead_code(&mut ctx, f);
            verify_use_lists(&ctx).unwrap();
            promote_function(&mut ctx, f);
            verify_use_lists(&ctx).unwrap();
        }
    }
}

#[test]
fn test_promotion_removes_every_local_slot() {
    for name in [
        "arith_fold",
        "diamond",
        "loop_invariant",
        "loop_counter",
        "const_branch",
        "switch_select",
        "nested_loops",
    ] {
        let (ctx, module) = optimized(name, &OptimizerOptions::all());
        let memory = instr_count(&ctx, &module, |k| {
            matches!(k, InstrKind::Alloca { .. } | InstrKind::Load | InstrKind::Store)
        });
        assert_eq!(memory, 0, "{name} still touches memory");
    }
}

#[test]
fn test_no_trivial_phis_survive() {
    for &name in SAMPLE_NAMES {
        let (ctx, module) = optimized(name, &OptimizerOptions::all());
        for f in module.defined_functions(&ctx) {
            for &b in ctx.blocks_of(f) {
                for &i in ctx.block(b).instrs() {
                    if !ctx.instr(i).kind.is_phi() {
                        continue;
                    }
                    let result = ctx.result(i).unwrap();
                    let mut sources: Vec<ValueId> = ctx
                        .instr(i)
                        .phi_incoming()
                        .into_iter()
                        .map(|(v, _)| v)
                        .filter(|&v| v != result)
                        .collect();
                    sources.sort();
                    sources.dedup();
                    assert!(sources.len() > 1, "{name}: trivial phi {result}");
                    assert!(ctx.is_used(result), "{name}: dead phi {result}");
                }
            }
        }
    }
}

#[test]
fn test_const_branch_collapses_to_constant() {
    let (ctx, module) = optimized("const_branch", &OptimizerOptions::all());
    let f = main_function(&ctx, &module);
    assert_eq!(ctx.blocks_of(f).len(), 3);
    assert_eq!(instr_count(&ctx, &module, |k| k.is_phi()), 0);
}

#[test]
fn test_escaping_alloca_is_kept() {
    let (ctx, module) = optimized("escaping_alloca", &OptimizerOptions::all());
    assert_eq!(instr_count(&ctx, &module, |k| matches!(k, InstrKind::Alloca { .. })), 2);
    assert_eq!(instr_count(&ctx, &module, |k| *k == InstrKind::Call), 2);
}

#[test]
fn test_atomics_survive_optimization() {
    let (ctx, module) = optimized("atomics", &OptimizerOptions::all());
    let atomics = instr_count(&ctx, &module, |k| {
        matches!(k, InstrKind::AtomicRmw { .. } | InstrKind::AtomicCmpXchg { .. } | InstrKind::Fence { .. })
    });
    assert_eq!(atomics, 5);
}

#[test]
fn test_dead_block_values_become_undef() {
    // `br 0, %dead, %live` where %live reads a value defined only in %dead
    let (mut ctx, module) = scc_ssa::build_module(TargetInfo::lp64(), None, |ctx| {
        let mut module = Module::new("undef");
        let f = ctx.add_function(
            "f",
            scc_common::Type::function(scc_common::Type::int(), vec![], false),
            scc_ssa::ir::Linkage::External,
        );
        module.add_global(f);
        let mut b = scc_ssa::Builder::new(ctx);
        let entry = b.append_block(f);
        let dead = b.ctx_mut().add_block(f);
        let live = b.ctx_mut().add_block(f);
        b.position_at_end(entry);
        let zero = b.i32_constant(0);
        b.cond_jump(zero, dead, live);
        b.position_at_end(dead);
        let seven = b.i32_constant(7);
        let value = b.mul(seven, seven);
        b.jump(live);
        b.position_at_end(live);
        let phi = b.phi(scc_common::Type::int());
        b.add_phi_incoming(phi, zero, entry);
        b.add_phi_incoming(phi, value, dead);
        b.ret(phi);
        module
    })
    .unwrap();

    let f = main_function(&ctx, &module);
    let stats = eliminate_dead_code(&mut ctx, f);
    assert_eq!(stats.blocks_removed, 1);
    assert_eq!(stats.values_undefined, 1);
    verify_module(&ctx, &module).unwrap();
    assert!(ctx
        .value_ids()
        .filter(|&v| matches!(ctx.value(v).kind, ValueKind::Undef))
        .all(|v| !ctx.is_used(v)));
}

#[test]
fn test_node_budget_is_reported() {
    let err = sample("loop_invariant", TargetInfo::lp64(), Some(10)).unwrap_err();
    assert_eq!(err, SsaError::AllocationFailed { limit: 10 });

    let err = sample("no_such_sample", TargetInfo::lp64(), None).unwrap_err();
    assert_eq!(err, SsaError::UnknownSample { name: "no_such_sample".to_string() });
}

#[test]
fn test_node_budget_is_reported_while_optimizing() {
    let (ctx, _) = sample("arith_fold", TargetInfo::lp64(), None).unwrap();
    let built = ctx.node_count();

    // Enough room to build the sample but none for the constants folding creates
    let (mut ctx, mut module) = sample("arith_fold", TargetInfo::lp64(), Some(built)).unwrap();
    let err = try_optimize(&mut ctx, &mut module, &OptimizerOptions::all()).unwrap_err();
    assert_eq!(err, SsaError::AllocationFailed { limit: built });

    let (mut ctx, mut module) = sample("arith_fold", TargetInfo::lp64(), Some(built + 64)).unwrap();
    try_optimize(&mut ctx, &mut module, &OptimizerOptions::all()).unwrap();
    verify_module(&ctx, &module).unwrap();
}

#[test]
fn test_context_round_trips_through_json() {
    let (ctx, module) = optimized("diamond", &OptimizerOptions::all());
    let json = serde_json::to_string(&(&ctx, &module)).unwrap();
    let (ctx2, module2): (Context, Module) = serde_json::from_str(&json).unwrap();
    assert_eq!(print_module(&ctx2, &module2), print_module(&ctx, &module));
}
