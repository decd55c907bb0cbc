//! SSA optimization passes.
//!
//! Three function passes rewrite the graph in place: constant folding,
//! dead code elimination and alloca promotion. `optimize` assembles them
//! into the standard pipeline from an `OptimizerOptions`.

use log::debug;
use scc_common::SsaError;
use serde::{Deserialize, Serialize};

use crate::ir::{Context, Module};
use crate::pass::{Pass, PassKind, PassManager};

pub mod const_fold;
pub mod dce;
pub mod promote;

pub use const_fold::fold_function;
pub use dce::eliminate_dead_code;
pub use promote::{is_promotable, promote_function};

/// Which passes the pipeline runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    pub fold_constants: bool,
    pub eliminate_dead_code: bool,
    pub promote_allocas: bool,
}

impl OptimizerOptions {
    pub fn all() -> Self {
        Self {
            fold_constants: true,
            eliminate_dead_code: true,
            promote_allocas: true,
        }
    }

    /// Options enabled in either set
    pub fn union(self, other: Self) -> Self {
        Self {
            fold_constants: self.fold_constants || other.fold_constants,
            eliminate_dead_code: self.eliminate_dead_code || other.eliminate_dead_code,
            promote_allocas: self.promote_allocas || other.promote_allocas,
        }
    }
}

pub const CONSTANT_FOLD: Pass = Pass {
    name: "fold-constants",
    kind: PassKind::Function,
    entry: const_fold::run,
};

pub const DEAD_CODE_ELIMINATION: Pass = Pass {
    name: "eliminate-dead-code",
    kind: PassKind::Function,
    entry: dce::run,
};

pub const ALLOCA_PROMOTION: Pass = Pass {
    name: "promote-allocas",
    kind: PassKind::Function,
    entry: promote::run,
};

/// The pass manager `optimize` would run. Promotion relies on simplified
/// branches, so it also schedules dead code elimination.
pub fn pipeline(options: &OptimizerOptions) -> PassManager {
    let mut pm = PassManager::new();
    if options.fold_constants {
        pm.add_pass(CONSTANT_FOLD);
    }
    if options.eliminate_dead_code || options.promote_allocas {
        pm.add_pass(DEAD_CODE_ELIMINATION);
    }
    if options.promote_allocas {
        pm.add_pass(ALLOCA_PROMOTION);
    }
    pm
}

/// Run the selected passes over the module and renumber it
pub fn optimize(ctx: &mut Context, module: &mut Module, options: &OptimizerOptions) {
    let pm = pipeline(options);
    debug!("optimizing '{}' with {:?}", module.name, pm.pass_names());
    pm.run(ctx, module);
}

/// `optimize` with node-budget exhaustion reported as an error
pub fn try_optimize(ctx: &mut Context, module: &mut Module, options: &OptimizerOptions) -> Result<(), SsaError> {
    ctx.recover(|ctx| optimize(ctx, module, options))
}
