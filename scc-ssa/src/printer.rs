//! Textual form of a module
//!
//! Locals, parameters and labels print as `%N` using the numbers assigned
//! by renumbering, functions and global variables as `@name`, string blobs
//! as `@.strN`. Values that were never numbered fall back to their arena id
//! (`%v12`) so half-built IR can still be dumped while debugging.

use scc_common::Type;
use std::fmt;

use crate::ir::{
    AtomicRmwOp, BlockId, Const, Context, InstrId, InstrKind, Linkage, Module, SyncScope,
    TerminatorKind, ValueId, ValueKind,
};

pub fn print_module(ctx: &Context, module: &Module) -> String {
    ModuleDisplay { ctx, module }.to_string()
}

pub fn print_function(ctx: &Context, function: ValueId) -> String {
    FunctionDisplay { ctx, function }.to_string()
}

pub struct ModuleDisplay<'a> {
    pub ctx: &'a Context,
    pub module: &'a Module,
}

pub struct FunctionDisplay<'a> {
    pub ctx: &'a Context,
    pub function: ValueId,
}

/// Operand reference
struct ValueRef<'a>(&'a Context, ValueId);

impl fmt::Display for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ValueRef(ctx, id) = *self;
        let data = ctx.value(id);
        match &data.kind {
            ValueKind::Constant(num) => write!(f, "{num}"),
            ValueKind::Undef => write!(f, "undef"),
            ValueKind::GlobalVar(g) => write!(f, "@{}", g.name),
            ValueKind::Function(func) => write!(f, "@{}", func.name),
            ValueKind::String(_) => match data.number {
                Some(n) => write!(f, "@.str{n}"),
                None => write!(f, "@.str.{id}"),
            },
            ValueKind::InstrResult(_) | ValueKind::Param { .. } | ValueKind::Label(_) => {
                match data.number {
                    Some(n) => write!(f, "%{n}"),
                    None => write!(f, "%{id}"),
                }
            }
        }
    }
}

struct ConstDisplay<'a>(&'a Context, &'a Const);

impl fmt::Display for ConstDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ConstDisplay(ctx, c) = *self;
        match c {
            Const::Literal { value, .. } => write!(f, "{value}"),
            Const::Address { global, .. } => write!(f, "{}", ValueRef(ctx, *global)),
            Const::Cast { ty, operand } => write!(f, "cast ({}) to {ty}", ConstDisplay(ctx, operand)),
            Const::PtrAdd { pointer, offset, .. } => write!(
                f,
                "ptradd ({}, {})",
                ConstDisplay(ctx, pointer),
                ConstDisplay(ctx, offset)
            ),
            Const::GetFieldAddr { record, field, .. } => {
                write!(f, "getfieldaddr ({}, {field})", ConstDisplay(ctx, record))
            }
            Const::List { items, .. } => {
                write!(f, "{{ ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", ConstDisplay(ctx, item))?;
                }
                write!(f, " }}")
            }
        }
    }
}

fn linkage_prefix(linkage: Linkage) -> &'static str {
    match linkage {
        Linkage::External => "",
        Linkage::Internal => "internal ",
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    write!(f, "\"")?;
    for &b in bytes {
        if (b.is_ascii_graphic() && b != b'"' && b != b'\\') || b == b' ' {
            write!(f, "{}", b as char)?;
        } else {
            write!(f, "\\{b:02X}")?;
        }
    }
    write!(f, "\"")
}

impl fmt::Display for ModuleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        writeln!(f, "; module {}", self.module.name)?;
        for record in &self.module.records {
            if let Type::Record { fields, .. } = record {
                write!(f, "{record} = type {{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{field}")?;
                }
                writeln!(f, " }}")?;
            }
        }

        for &global in &self.module.globals {
            let data = ctx.value(global);
            match &data.kind {
                ValueKind::String(s) => {
                    write!(f, "{} = string ", ValueRef(ctx, global))?;
                    write_escaped(f, &s.bytes)?;
                    writeln!(f)?;
                }
                ValueKind::GlobalVar(g) => {
                    let ty = data.ty.pointee().cloned().unwrap_or_else(Type::void);
                    write!(f, "@{} = {}global {ty}", g.name, linkage_prefix(g.linkage))?;
                    if let Some(init) = &g.initializer {
                        write!(f, " {}", ConstDisplay(ctx, init))?;
                    }
                    writeln!(f)?;
                }
                _ => {}
            }
        }

        for function in self.module.functions(ctx) {
            writeln!(f)?;
            write!(f, "{}", FunctionDisplay { ctx, function })?;
        }
        Ok(())
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        let data = ctx.function(self.function);
        let signature = ctx.ty(self.function).pointee().cloned();
        let result = signature
            .as_ref()
            .and_then(|s| s.function_result())
            .cloned()
            .unwrap_or_else(Type::void);

        let keyword = if data.is_declaration() { "declare" } else { "define" };
        write!(f, "{keyword} {}{result} @{}(", linkage_prefix(data.linkage), data.name)?;
        if data.is_declaration() {
            if let Some(Type::Function { params, variadic, .. }) = &signature {
                for (i, param) in params.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{param}")?;
                }
                if *variadic {
                    if !params.is_empty() { write!(f, ", ")?; }
                    write!(f, "...")?;
                }
            }
            return writeln!(f, ")");
        }

        for (i, &param) in data.params.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{} {}", ctx.ty(param), ValueRef(ctx, param))?;
        }
        writeln!(f, ") {{")?;
        for &block in &data.blocks {
            write_block(f, ctx, block)?;
        }
        writeln!(f, "}}")
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, ctx: &Context, block: BlockId) -> fmt::Result {
    write!(f, "{}:", ValueRef(ctx, ctx.label(block)))?;
    let preds = ctx.predecessors(block);
    if !preds.is_empty() {
        write!(f, " ; preds")?;
        for pred in preds {
            write!(f, " {}", ValueRef(ctx, ctx.label(pred)))?;
        }
    }
    writeln!(f)?;
    for &instr in ctx.block(block).instrs() {
        write!(f, "  ")?;
        write_instr(f, ctx, instr)?;
        writeln!(f)?;
    }
    Ok(())
}

fn write_operands(f: &mut fmt::Formatter<'_>, ctx: &Context, operands: &[ValueId]) -> fmt::Result {
    for (i, &op) in operands.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{}", ValueRef(ctx, op))?;
    }
    Ok(())
}

fn write_instr(f: &mut fmt::Formatter<'_>, ctx: &Context, instr: InstrId) -> fmt::Result {
    let data = ctx.instr(instr);
    let ops = data.operands();
    let r = |v: ValueId| ValueRef(ctx, v);
    if let Some(result) = data.result {
        write!(f, "{} = ", r(result))?;
    }

    match data.kind {
        InstrKind::Alloca { align } => {
            let ty = data.result.and_then(|v| ctx.ty(v).pointee().cloned());
            match ty {
                Some(ty) => write!(f, "alloca {ty}, align {align}"),
                None => write!(f, "alloca ?, align {align}"),
            }
        }
        InstrKind::Load => {
            let ty = data.result.map(|v| ctx.ty(v).to_string()).unwrap_or_default();
            write!(f, "load {ty}, {}", r(ops[0]))
        }
        InstrKind::Store => write!(f, "store {}, {}", r(ops[0]), r(ops[1])),
        InstrKind::GetFieldAddr { field } => write!(f, "getfieldaddr {}, {field}", r(ops[0])),
        InstrKind::Cast => {
            let ty = data.result.map(|v| ctx.ty(v).to_string()).unwrap_or_default();
            write!(f, "cast {} to {ty}", r(ops[0]))
        }
        InstrKind::Binary(op) => {
            write!(f, "{op} {} {}, {}", ctx.ty(ops[0]), r(ops[0]), r(ops[1]))
        }
        InstrKind::Call => {
            write!(f, "call {}(", r(ops[0]))?;
            write_operands(f, ctx, &ops[1..])?;
            write!(f, ")")
        }
        InstrKind::Phi => {
            let ty = data.result.map(|v| ctx.ty(v).to_string()).unwrap_or_default();
            write!(f, "phi {ty} ")?;
            for (i, (value, label)) in data.phi_incoming().into_iter().enumerate() {
                if i > 0 { write!(f, ", ")?; }
                write!(f, "[{}, {}]", r(value), r(label))?;
            }
            Ok(())
        }
        InstrKind::Terminator(TerminatorKind::Jump | TerminatorKind::CondJump) => {
            write!(f, "br ")?;
            write_operands(f, ctx, ops)
        }
        InstrKind::Terminator(TerminatorKind::Switch) => {
            write!(f, "switch {}, {} [", r(ops[0]), r(ops[1]))?;
            for (i, case) in ops[2..].chunks(2).enumerate() {
                if i > 0 { write!(f, ", ")?; }
                write!(f, "{}: {}", r(case[0]), r(case[1]))?;
            }
            write!(f, "]")
        }
        InstrKind::Terminator(TerminatorKind::Return) => match ops.first() {
            Some(&value) => write!(f, "ret {}", r(value)),
            None => write!(f, "ret"),
        },
        InstrKind::AtomicRmw { op, ordering } => {
            let op = match op {
                AtomicRmwOp::Add => "add",
                AtomicRmwOp::Xchg => "xchg",
            };
            write!(f, "atomicrmw {op} {}, {} {ordering}", r(ops[0]), r(ops[1]))
        }
        InstrKind::Fence { scope, ordering } => match scope {
            SyncScope::AllThreads => write!(f, "fence {ordering}"),
            SyncScope::SingleThread => write!(f, "fence single_thread {ordering}"),
        },
        InstrKind::AtomicCmpXchg { success, failure } => {
            write!(f, "cmpxchg ")?;
            write_operands(f, ctx, ops)?;
            write!(f, " {success} {failure}")
        }
    }
}
