//! SSA Values
//!
//! Everything an instruction can reference as an operand. Values live in the
//! context arena and are addressed by `ValueId`; identity is by index, never
//! by the display number assigned during renumbering.

use scc_common::{Num, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ir::Const;

/// Index of a value in the context arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueId(pub(crate) u32);

/// Index of an instruction in the context arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrId(pub(crate) u32);

/// Index of a block in the context arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub(crate) u32);

macro_rules! arena_index {
    ($($name:ident),*) => {
        $(
            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

arena_index!(ValueId, InstrId, BlockId);

/// Operand slot `index` of instruction `instr`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Use {
    pub instr: InstrId,
    pub index: usize,
}

/// Linkage types for global symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    External,  // Visible to other modules
    Internal,  // Only visible within this module (static)
}

/// Global variable definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVarData {
    pub name: String,
    pub linkage: Linkage,
    pub initializer: Option<Const>,
}

/// Function definition or declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionData {
    pub name: String,
    pub linkage: Linkage,
    pub params: Vec<ValueId>,
    /// Empty for a forward declaration
    pub blocks: Vec<BlockId>,
}

impl FunctionData {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }
}

/// String literal blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringData {
    pub bytes: Vec<u8>,
}

/// What a value is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Embedded literal
    Constant(Num),
    /// Result of a value-producing instruction
    InstrResult(InstrId),
    GlobalVar(GlobalVarData),
    Function(FunctionData),
    String(StringData),
    /// Identity of a block, used by jumps and phis
    Label(BlockId),
    Param { function: ValueId, index: usize },
    /// Placeholder that keeps operand slots typed after a rewrite
    Undef,
}

/// A value with its type and use-list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueData {
    pub kind: ValueKind,
    pub ty: Type,
    pub(crate) uses: Vec<Use>,
    /// Display number assigned by renumbering
    pub number: Option<u32>,
}

impl ValueData {
    pub fn new(kind: ValueKind, ty: Type) -> Self {
        Self { kind, ty, uses: Vec::new(), number: None }
    }

    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn is_used(&self) -> bool {
        !self.uses.is_empty()
    }

    pub fn as_constant(&self) -> Option<Num> {
        match self.kind {
            ValueKind::Constant(num) => Some(num),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.as_constant().is_some()
    }

    pub fn is_global(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::GlobalVar(_) | ValueKind::Function(_) | ValueKind::String(_)
        )
    }

    /// Name of a function or global variable
    pub fn global_name(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::GlobalVar(data) => Some(&data.name),
            ValueKind::Function(data) => Some(&data.name),
            _ => None,
        }
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}
