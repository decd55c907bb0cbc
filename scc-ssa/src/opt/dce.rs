//! Dead code elimination
//!
//! Two rewrites per function, in order:
//! 1. conditional jumps on a constant become unconditional jumps to the
//!    selected successor;
//! 2. blocks after the entry that nothing jumps to are unlinked, with any
//!    value they define that is still used elsewhere replaced by `Undef`.

use log::{debug, trace};

use crate::ir::{BlockId, Builder, Context, InstrKind, TerminatorKind, ValueId};
use crate::pass::PassContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DceStats {
    pub branches_simplified: usize,
    pub blocks_removed: usize,
    pub values_undefined: usize,
}

pub fn run(pc: &mut PassContext<'_>) {
    let function = pc.function();
    eliminate_dead_code(pc.ctx, function);
}

pub fn eliminate_dead_code(ctx: &mut Context, function: ValueId) -> DceStats {
    let mut stats = DceStats {
        branches_simplified: simplify_branches(ctx, function),
        ..DceStats::default()
    };
    let (blocks, undefined) = remove_unreachable_blocks(ctx, function);
    stats.blocks_removed = blocks;
    stats.values_undefined = undefined;

    debug!(
        "'{}': {} branches simplified, {} blocks removed",
        ctx.function(function).name,
        stats.branches_simplified,
        stats.blocks_removed
    );
    stats
}

/// Rewrite `br cond, a, b` with a constant `cond` into `br a` or `br b`
pub fn simplify_branches(ctx: &mut Context, function: ValueId) -> usize {
    let mut simplified = 0;
    for block in ctx.blocks_of(function).to_vec() {
        if !ctx.is_live(block) {
            continue;
        }
        let Some(term) = ctx.terminator(block) else {
            continue;
        };
        let data = ctx.instr(term);
        if data.kind != InstrKind::Terminator(TerminatorKind::CondJump) {
            continue;
        }
        let Some(cond) = ctx.value(data.operand(0)).as_constant() else {
            continue;
        };

        let (taken, dropped) = if cond.is_zero() {
            (data.operand(2), data.operand(1))
        } else {
            (data.operand(1), data.operand(2))
        };
        let (Some(taken_block), Some(dropped_block)) = (ctx.label_block(taken), ctx.label_block(dropped)) else {
            continue;
        };

        ctx.remove_instr(term);
        Builder::at_end(ctx, block).jump(taken_block);
        if dropped_block != taken_block {
            drop_phi_edges(ctx, dropped_block, block);
        }
        trace!("{block}: branch on {cond} now jumps to {taken_block}");
        simplified += 1;
    }
    simplified
}

/// Forget the incoming values `to` receives from `from`
fn drop_phi_edges(ctx: &mut Context, to: BlockId, from: BlockId) {
    let label = ctx.label(from);
    let phis: Vec<_> = ctx
        .block(to)
        .instrs()
        .iter()
        .copied()
        .filter(|&i| ctx.instr(i).kind.is_phi())
        .collect();
    for phi in phis {
        ctx.remove_phi_incoming(phi, label);
    }
}

/// Unlink dead blocks after the entry, sweeping until nothing changes since
/// removing a block can orphan blocks earlier in the list. Returns the number
/// of blocks removed and of values replaced with `Undef`.
pub fn remove_unreachable_blocks(ctx: &mut Context, function: ValueId) -> (usize, usize) {
    let mut removed = 0;
    let mut undefined = 0;
    loop {
        let mut changed = false;
        for block in ctx.blocks_of(function).iter().skip(1).copied().collect::<Vec<_>>() {
            if ctx.is_live(block) {
                continue;
            }
            undefined += ctx.remove_block(block);
            removed += 1;
            changed = true;
        }
        if !changed {
            return (removed, undefined);
        }
    }
}
