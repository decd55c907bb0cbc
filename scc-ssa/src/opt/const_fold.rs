//! Constant folding
//!
//! One walk over each block: a `Binary` or `Cast` whose operands are all
//! constants is evaluated at the numeric layer, its result is replaced by a
//! fresh constant and the instruction is unlinked. Anything that cannot be
//! evaluated safely is left untouched.

use log::{debug, trace};
use scc_common::{Builtin, Num, TargetInfo, Type};
use std::cmp::Ordering;
use std::mem::discriminant;

use crate::ir::{BinaryOp, Context, InstrId, InstrKind, ValueId};
use crate::pass::PassContext;

pub fn run(pc: &mut PassContext<'_>) {
    let function = pc.function();
    fold_function(pc.ctx, function);
}

/// Fold every foldable instruction of `function`; returns how many were folded
pub fn fold_function(ctx: &mut Context, function: ValueId) -> usize {
    let mut folded = 0;
    for block in ctx.blocks_of(function).to_vec() {
        for instr in ctx.block(block).instrs().to_vec() {
            let Some(result) = ctx.result(instr) else {
                continue;
            };
            let Some(value) = fold_instr(ctx, instr) else {
                continue;
            };

            let ty = ctx.ty(result).clone();
            let constant = ctx.constant(ty, value);
            trace!("folded {instr} to {value}");
            ctx.replace_all_uses_with(result, constant);
            ctx.remove_instr(instr);
            folded += 1;
        }
    }

    if folded > 0 {
        debug!("folded {folded} instructions in '{}'", ctx.function(function).name);
    }
    folded
}

/// Value of a binary or cast instruction whose operands are all constants
pub fn fold_instr(ctx: &Context, instr: InstrId) -> Option<Num> {
    let data = ctx.instr(instr);
    let constant = |index: usize| ctx.value(data.operand(index)).as_constant();
    match data.kind {
        InstrKind::Binary(op) => fold_binary(op, constant(0)?, constant(1)?),
        InstrKind::Cast => {
            let to = ctx.ty(data.result?);
            fold_cast(ctx.target(), constant(0)?, to)
        }
        _ => None,
    }
}

pub fn fold_binary(op: BinaryOp, lhs: Num, rhs: Num) -> Option<Num> {
    match op {
        BinaryOp::Mul => lhs.mul(&rhs),
        BinaryOp::Div => lhs.div(&rhs),
        BinaryOp::Mod => lhs.rem(&rhs),
        BinaryOp::Add => lhs.add(&rhs),
        BinaryOp::Sub => lhs.sub(&rhs),
        BinaryOp::Shl => lhs.shl(&rhs),
        BinaryOp::Shr => lhs.shr(&rhs),
        BinaryOp::And => lhs.and(&rhs),
        BinaryOp::Or => lhs.or(&rhs),
        BinaryOp::Xor => lhs.xor(&rhs),
        // Pointer constants are addresses the numeric layer does not model
        BinaryOp::PtrAdd => None,
        _ => fold_comparison(op, lhs, rhs).map(Num::truth),
    }
}

fn fold_comparison(op: BinaryOp, lhs: Num, rhs: Num) -> Option<bool> {
    let Some(ord) = lhs.compare(&rhs) else {
        // Unordered floats: only `!=` holds
        if discriminant(&lhs) == discriminant(&rhs) && !lhs.is_int() {
            return Some(op == BinaryOp::Ne);
        }
        return None;
    };
    Some(match op {
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Ge => ord != Ordering::Less,
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        _ => return None,
    })
}

/// Casts to pointers are never folded
pub fn fold_cast(target: &TargetInfo, value: Num, to: &Type) -> Option<Num> {
    if to.is_builtin(Builtin::Bool) {
        return Some(Num::int(8, false, !value.is_zero() as u64));
    }
    if to.is_integer() {
        return Some(value.convert_to_int(target.bits_of(to), to.is_signed_integer()));
    }
    if to.is_builtin(Builtin::Float) {
        return Some(value.to_float());
    }
    if to.is_floating() {
        return Some(value.to_double());
    }
    None
}
