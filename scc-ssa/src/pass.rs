//! Pass scheduling
//!
//! A pass is a plain entry function tagged with the granularity it runs at.
//! The manager runs passes in registration order, module passes once and
//! function passes once per function with a body, and then renumbers every
//! value so that printed output is compact and stable. Ordering between
//! passes is entirely the caller's responsibility.

use log::{debug, trace};

use crate::ir::{Context, Module, ValueId, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Module,
    Function,
}

/// What a pass entry sees
pub struct PassContext<'a> {
    pub ctx: &'a mut Context,
    pub module: &'a mut Module,
    /// Function under a function pass; `None` for module passes
    pub current: Option<ValueId>,
}

impl PassContext<'_> {
    /// The function a function pass is running over
    pub fn function(&self) -> ValueId {
        match self.current {
            Some(function) => function,
            None => panic!("module pass asked for the current function"),
        }
    }
}

#[derive(Clone, Copy)]
pub struct Pass {
    pub name: &'static str,
    pub kind: PassKind,
    pub entry: fn(&mut PassContext<'_>),
}

#[derive(Default)]
pub struct PassManager {
    passes: Vec<Pass>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: Pass) {
        self.passes.push(pass);
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name).collect()
    }

    /// Run every pass in order, then renumber the module
    pub fn run(&self, ctx: &mut Context, module: &mut Module) {
        for pass in &self.passes {
            match pass.kind {
                PassKind::Module => {
                    debug!("running module pass '{}'", pass.name);
                    (pass.entry)(&mut PassContext { ctx: &mut *ctx, module: &mut *module, current: None });
                }
                PassKind::Function => {
                    for function in module.defined_functions(ctx) {
                        debug!("running pass '{}' on '{}'", pass.name, ctx.function(function).name);
                        (pass.entry)(&mut PassContext {
                            ctx: &mut *ctx,
                            module: &mut *module,
                            current: Some(function),
                        });
                    }
                }
            }
        }
        number_module_values(ctx, module);
    }
}

/// Assign display numbers: per function, parameters then each block's label
/// followed by its instruction results, from 0; strings module-wide from 0
pub fn number_module_values(ctx: &mut Context, module: &Module) {
    let mut next_string = 0;
    for &global in &module.globals {
        if matches!(ctx.value(global).kind, ValueKind::String(_)) {
            ctx.value_mut(global).number = Some(next_string);
            next_string += 1;
        } else if ctx.is_function(global) && !ctx.function(global).is_declaration() {
            number_function_values(ctx, global);
        }
    }
}

pub fn number_function_values(ctx: &mut Context, function: ValueId) {
    let mut order = ctx.function(function).params.clone();
    for &block in ctx.blocks_of(function) {
        order.push(ctx.label(block));
        order.extend(ctx.block(block).instrs().iter().filter_map(|&i| ctx.result(i)));
    }

    for (number, value) in order.into_iter().enumerate() {
        ctx.value_mut(value).number = Some(number as u32);
    }
    trace!("numbered '{}'", ctx.function(function).name);
}
