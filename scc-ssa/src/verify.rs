//! Structural checks over finished IR
//!
//! Used after building and after every pass in tests; the driver runs it
//! before printing. Checks:
//! - every block of a defined function ends in its only terminator;
//! - phis only appear at the start of a block;
//! - use-lists and operand slots mirror each other exactly;
//! - no operand names an unlinked instruction's result or a removed block.

use scc_common::SsaError;

use crate::ir::{Context, InstrKind, Module, Use, ValueId, ValueKind};

pub fn verify_module(ctx: &Context, module: &Module) -> Result<(), SsaError> {
    for function in module.defined_functions(ctx) {
        verify_function(ctx, function)?;
    }
    verify_use_lists(ctx)
}

pub fn verify_function(ctx: &Context, function: ValueId) -> Result<(), SsaError> {
    let name = ctx.function(function).name.as_str();
    let err = |message: String| Err(SsaError::verification(name, message));

    for &block in ctx.blocks_of(function) {
        let data = ctx.block(block);
        if !data.linked || data.function != function {
            return err(format!("{block} is listed but not owned by the function"));
        }
        let Some(&last) = data.instrs().last() else {
            return err(format!("{block} is empty"));
        };
        if !ctx.instr(last).kind.is_terminator() {
            return err(format!("{block} does not end in a terminator"));
        }

        let mut in_phis = true;
        for (pos, &instr) in data.instrs().iter().enumerate() {
            let idata = ctx.instr(instr);
            if idata.block != Some(block) {
                return err(format!("{instr} does not point back at {block}"));
            }
            if idata.kind.is_terminator() && pos + 1 != data.instrs().len() {
                return err(format!("{block} has a terminator before its end"));
            }
            if idata.kind.is_phi() {
                if !in_phis {
                    return err(format!("phi {instr} follows a non-phi in {block}"));
                }
                if idata.operands().len() % 2 != 0 {
                    return err(format!("phi {instr} has an odd operand count"));
                }
            } else {
                in_phis = false;
            }

            for (index, &operand) in idata.operands().iter().enumerate() {
                if let Some(message) = check_operand(ctx, function, operand) {
                    return err(format!("{instr} operand {index}: {message}"));
                }
            }
            for slot in idata.successor_slots() {
                if ctx.label_block(idata.operand(slot)).is_none() {
                    return err(format!("{instr} jumps to non-label {}", idata.operand(slot)));
                }
            }
        }
    }
    Ok(())
}

fn check_operand(ctx: &Context, function: ValueId, operand: ValueId) -> Option<String> {
    match ctx.value(operand).kind {
        ValueKind::InstrResult(def) => {
            let Some(block) = ctx.instr(def).block else {
                return Some(format!("{operand} is the result of removed {def}"));
            };
            (ctx.block(block).function != function)
                .then(|| format!("{operand} is defined in another function"))
        }
        ValueKind::Label(block) => {
            let data = ctx.block(block);
            if !data.linked {
                Some(format!("{operand} labels removed {block}"))
            } else if data.function != function {
                Some(format!("{operand} labels a block of another function"))
            } else {
                None
            }
        }
        ValueKind::Param { function: owner, .. } => {
            (owner != function).then(|| format!("{operand} is a parameter of another function"))
        }
        _ => None,
    }
}

/// Every operand slot is on its value's use-list and every use names a slot
/// holding that value
pub fn verify_use_lists(ctx: &Context) -> Result<(), SsaError> {
    let err = |message: String| Err(SsaError::verification("<module>", message));

    for instr in ctx.instr_ids() {
        for (index, &operand) in ctx.instr(instr).operands().iter().enumerate() {
            let slot = Use { instr, index };
            let count = ctx.uses(operand).iter().filter(|&&u| u == slot).count();
            if count != 1 {
                return err(format!("{operand} lists {instr} slot {index} {count} times"));
            }
        }
    }

    for value in ctx.value_ids() {
        for u in ctx.uses(value) {
            if ctx.instr(u.instr).operands().get(u.index) != Some(&value) {
                return err(format!("{value} has a stale use {u:?}"));
            }
        }
    }
    Ok(())
}

/// True when no instruction of the given kind survives in `function`
pub fn has_no_instr(ctx: &Context, function: ValueId, pred: impl Fn(&InstrKind) -> bool) -> bool {
    ctx.blocks_of(function)
        .iter()
        .flat_map(|&b| ctx.block(b).instrs())
        .all(|&i| !pred(&ctx.instr(i).kind))
}
