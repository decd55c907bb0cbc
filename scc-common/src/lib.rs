//! SCC Compiler - Common Types and Utilities
//! 
//! This crate contains the pieces shared by the SSA layer and its driver
//! that do not depend on the IR itself: the type system handed over by
//! semantic analysis, the target description, the numeric value layer used
//! for constants and folding, and the error type.

pub mod error;
pub mod num;
pub mod target;
pub mod types;

pub use error::SsaError;
pub use num::Num;
pub use target::{TargetInfo, TypeLayout};
pub use types::{Builtin, Type};
