//! SSA Intermediate Representation
//!
//! The graph the optimizer rewrites in place.
//!
//! ## Architecture
//!
//! - `values` - Value ids, kinds and use-lists
//! - `instructions` - Instruction kinds and operand layouts
//! - `constant` - Global initializer expressions
//! - `context` - The arena owning every node, and use-list maintenance
//! - `module` - Globals and record declarations of a compilation unit
//! - `builder` - Instruction construction and insertion

pub use self::builder::{Builder, InsertPoint};
pub use self::constant::Const;
pub use self::context::{build_module, AllocationFailure, BlockData, Context};
pub use self::instructions::{
    AtomicRmwOp, BinaryOp, InstrData, InstrKind, MemoryOrder, SyncScope, TerminatorKind,
};
pub use self::module::Module;
pub use self::values::{
    BlockId, FunctionData, GlobalVarData, InstrId, Linkage, StringData, Use, ValueData, ValueId,
    ValueKind,
};

mod builder;
mod constant;
mod context;
mod instructions;
mod module;
mod values;
