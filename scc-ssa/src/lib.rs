//! SCC Compiler - SSA Intermediate Representation and Optimizer
//!
//! This crate holds the back half of the compiler's middle end: the SSA
//! graph the AST lowering emits into, the builder used to emit it, a small
//! pass manager, and the optimization passes run over it before code
//! generation (constant folding, dead code elimination and alloca
//! promotion). A verifier and a textual printer are provided for tests and
//! for the driver.

pub mod ir;
pub mod opt;
pub mod pass;
pub mod printer;
pub mod samples;
pub mod verify;

pub use ir::{build_module, Builder, Context, Module};
pub use opt::{optimize, try_optimize, OptimizerOptions};
pub use pass::{Pass, PassContext, PassKind, PassManager};
pub use printer::{print_function, print_module};
pub use samples::{sample, SAMPLE_NAMES};
pub use verify::verify_module;
