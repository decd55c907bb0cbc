//! Test helpers: a reference interpreter for SSA functions
//!
//! Runs a function against an abstract memory keyed by allocation site and
//! field path, so optimized and unoptimized versions of a sample can be
//! compared by what they return and by the calls they make to external
//! declarations.

#![allow(dead_code)]

use std::collections::HashMap;

use scc_common::{Num, TargetInfo, Type};
use scc_ssa::ir::{
    AtomicRmwOp, BinaryOp, BlockId, Const, Context, InstrKind, Module, TerminatorKind, ValueId,
    ValueKind,
};
use scc_ssa::opt::const_fold::{fold_binary, fold_cast};
use scc_ssa::{optimize, sample, verify_module, OptimizerOptions};

/// Base object and field path of an address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Addr {
    pub base: ValueId,
    pub path: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Num(Num),
    Ptr(Addr),
    Undef,
}

pub fn int(value: i64) -> Val {
    Val::Num(Num::from_i64(32, true, value))
}

/// Observable behaviour of one call
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub result: Option<Val>,
    pub calls: Vec<(String, Vec<Val>)>,
    pub globals: Vec<(String, Option<Val>)>,
}

const STEP_LIMIT: usize = 100_000;

pub struct Interpreter<'a> {
    ctx: &'a Context,
    memory: HashMap<Addr, Val>,
    calls: Vec<(String, Vec<Val>)>,
    steps: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a Context, module: &Module) -> Self {
        let mut memory = HashMap::new();
        for &global in &module.globals {
            if let ValueKind::GlobalVar(data) = &ctx.value(global).kind {
                if let Some(value) = data.initializer.as_ref().and_then(const_value) {
                    memory.insert(Addr { base: global, path: Vec::new() }, value);
                }
            }
        }
        Self { ctx, memory, calls: Vec::new(), steps: 0 }
    }

    /// Call `name` and report everything observable about it
    pub fn run(mut self, module: &Module, name: &str, args: &[Val]) -> Outcome {
        let function = module.find_global(self.ctx, name).expect("no such function");
        let result = self.call(function, args.to_vec());

        let mut globals = Vec::new();
        for &global in &module.globals {
            if let ValueKind::GlobalVar(data) = &self.ctx.value(global).kind {
                let value = self.memory.get(&Addr { base: global, path: Vec::new() }).cloned();
                globals.push((data.name.clone(), value));
            }
        }
        Outcome { result, calls: self.calls, globals }
    }

    fn call(&mut self, function: ValueId, args: Vec<Val>) -> Option<Val> {
        let ctx = self.ctx;
        let data = ctx.function(function);
        if data.is_declaration() {
            self.calls.push((data.name.clone(), args));
            let result = ctx.ty(function).function_result()?.clone();
            return (!result.is_void()).then(|| zero_of(ctx.target(), &result));
        }

        let mut env: HashMap<ValueId, Val> = data.params.iter().copied().zip(args).collect();
        let mut block = data.entry().expect("defined function without blocks");
        let mut prev: Option<BlockId> = None;
        loop {
            self.steps += 1;
            assert!(self.steps < STEP_LIMIT, "interpreter step limit exceeded");

            // Phis read their inputs simultaneously on block entry
            let instrs = ctx.block(block).instrs();
            let mut incoming = Vec::new();
            for &instr in instrs.iter().take_while(|&&i| ctx.instr(i).kind.is_phi()) {
                let from = prev.map(|p| ctx.label(p)).expect("phi in the entry block");
                let (value, _) = ctx
                    .instr(instr)
                    .phi_incoming()
                    .into_iter()
                    .find(|&(_, label)| label == from)
                    .expect("phi has no value for the incoming edge");
                let value = self.eval(&env, value);
                incoming.push((ctx.result(instr).expect("phi without result"), value));
            }
            env.extend(incoming);

            let mut next = None;
            for &instr in instrs {
                let idata = ctx.instr(instr);
                let op = |i: usize| idata.operand(i);
                let value = match idata.kind {
                    InstrKind::Phi => continue,
                    InstrKind::Alloca { .. } => {
                        let result = ctx.result(instr).expect("alloca without result");
                        Some(Val::Ptr(Addr { base: result, path: Vec::new() }))
                    }
                    InstrKind::Load => {
                        let addr = self.address(&env, op(0));
                        Some(self.memory.get(&addr).cloned().unwrap_or(Val::Undef))
                    }
                    InstrKind::Store => {
                        let addr = self.address(&env, op(1));
                        let value = self.eval(&env, op(0));
                        self.memory.insert(addr, value);
                        None
                    }
                    InstrKind::GetFieldAddr { field } => {
                        let mut addr = self.address(&env, op(0));
                        addr.path.push(field);
                        Some(Val::Ptr(addr))
                    }
                    InstrKind::Cast => {
                        let to = ctx.ty(ctx.result(instr).expect("cast without result"));
                        let num = self.num(&env, op(0));
                        Some(Val::Num(fold_cast(ctx.target(), num, to).expect("unsupported cast")))
                    }
                    InstrKind::Binary(BinaryOp::PtrAdd) => panic!("pointer arithmetic is not modelled"),
                    InstrKind::Binary(bin) => {
                        let (l, r) = (self.num(&env, op(0)), self.num(&env, op(1)));
                        Some(Val::Num(fold_binary(bin, l, r).expect("undefined arithmetic")))
                    }
                    InstrKind::Call => {
                        let callee = op(0);
                        let args = idata.operands()[1..].iter().map(|&a| self.eval(&env, a)).collect();
                        self.call(callee, args)
                    }
                    InstrKind::AtomicRmw { op: rmw, .. } => {
                        let addr = self.address(&env, op(0));
                        let operand = self.num(&env, op(1));
                        let old = self.memory.get(&addr).cloned().unwrap_or(Val::Undef);
                        let new = match (rmw, &old) {
                            (AtomicRmwOp::Add, Val::Num(n)) => Val::Num(n.add(&operand).expect("bad atomic add")),
                            (AtomicRmwOp::Add, _) => Val::Undef,
                            (AtomicRmwOp::Xchg, _) => Val::Num(operand),
                        };
                        self.memory.insert(addr, new);
                        Some(old)
                    }
                    InstrKind::AtomicCmpXchg { .. } => {
                        let addr = self.address(&env, op(0));
                        let expected = self.eval(&env, op(1));
                        let desired = self.eval(&env, op(2));
                        let old = self.memory.get(&addr).cloned().unwrap_or(Val::Undef);
                        if old == expected {
                            self.memory.insert(addr, desired);
                        }
                        Some(old)
                    }
                    InstrKind::Fence { .. } => None,
                    InstrKind::Terminator(kind) => {
                        match kind {
                            TerminatorKind::Return => {
                                return idata.operands().first().map(|&v| self.eval(&env, v));
                            }
                            TerminatorKind::Jump => next = ctx.label_block(op(0)),
                            TerminatorKind::CondJump => {
                                let taken = if self.num(&env, op(0)).is_zero() { op(2) } else { op(1) };
                                next = ctx.label_block(taken);
                            }
                            TerminatorKind::Switch => {
                                let cond = self.num(&env, op(0));
                                let mut target = op(1);
                                for case in idata.operands()[2..].chunks(2) {
                                    if self.num(&env, case[0]) == cond {
                                        target = case[1];
                                        break;
                                    }
                                }
                                next = ctx.label_block(target);
                            }
                        }
                        None
                    }
                };
                if let (Some(value), Some(result)) = (value, ctx.result(instr)) {
                    env.insert(result, value);
                }
            }

            prev = Some(block);
            block = next.expect("block fell through without a terminator");
        }
    }

    fn eval(&self, env: &HashMap<ValueId, Val>, value: ValueId) -> Val {
        match &self.ctx.value(value).kind {
            ValueKind::Constant(num) => Val::Num(*num),
            ValueKind::Undef => Val::Undef,
            ValueKind::GlobalVar(_) | ValueKind::Function(_) | ValueKind::String(_) => {
                Val::Ptr(Addr { base: value, path: Vec::new() })
            }
            ValueKind::InstrResult(_) | ValueKind::Param { .. } => {
                env.get(&value).cloned().unwrap_or(Val::Undef)
            }
            ValueKind::Label(_) => panic!("labels are not first-class values"),
        }
    }

    fn num(&self, env: &HashMap<ValueId, Val>, value: ValueId) -> Num {
        match self.eval(env, value) {
            Val::Num(num) => num,
            other => panic!("expected a number for {value}, got {other:?}"),
        }
    }

    fn address(&self, env: &HashMap<ValueId, Val>, value: ValueId) -> Addr {
        match self.eval(env, value) {
            Val::Ptr(addr) => addr,
            other => panic!("expected an address for {value}, got {other:?}"),
        }
    }
}

fn const_value(init: &Const) -> Option<Val> {
    match init {
        Const::Literal { value, .. } => Some(Val::Num(*value)),
        Const::Address { global, .. } => Some(Val::Ptr(Addr { base: *global, path: Vec::new() })),
        _ => None,
    }
}

fn zero_of(target: &TargetInfo, ty: &Type) -> Val {
    if ty.is_floating() {
        Val::Num(Num::Double(0.0))
    } else {
        Val::Num(Num::int(target.bits_of(ty), ty.is_signed_integer(), 0))
    }
}

/// Build a sample, optionally optimize it, verify it, and run `entry`
pub fn run_sample(name: &str, entry: &str, args: &[Val], options: Option<OptimizerOptions>) -> Outcome {
    let (mut ctx, mut module) = sample(name, TargetInfo::lp64(), None).unwrap();
    verify_module(&ctx, &module).unwrap();
    if let Some(options) = options {
        optimize(&mut ctx, &mut module, &options);
        verify_module(&ctx, &module).unwrap();
    }
    Interpreter::new(&ctx, &module).run(&module, entry, args)
}

/// Every combination of the three pass switches
pub fn all_option_sets() -> Vec<OptimizerOptions> {
    let mut sets = Vec::new();
    for bits in 0..8u8 {
        sets.push(OptimizerOptions {
            fold_constants: bits & 1 != 0,
            eliminate_dead_code: bits & 2 != 0,
            promote_allocas: bits & 4 != 0,
        });
    }
    sets
}
