//! SSA Instructions
//!
//! Instruction kinds and their operand layouts. Operands are stored as a flat
//! list of value ids so that every slot can be tracked by a `Use`:
//!
//! | Kind            | Operands                                  |
//! |-----------------|-------------------------------------------|
//! | `Alloca`        | none                                      |
//! | `Load`          | `[ptr]`                                   |
//! | `Store`         | `[value, dest]`                           |
//! | `GetFieldAddr`  | `[record_ptr]`                            |
//! | `Cast`          | `[value]`                                 |
//! | `Binary`        | `[lhs, rhs]`                              |
//! | `Call`          | `[callee, args..]`                        |
//! | `Phi`           | `[v0, label0, v1, label1, ..]`            |
//! | `Jump`          | `[dest]`                                  |
//! | `CondJump`      | `[cond, on_true, on_false]`               |
//! | `Switch`        | `[cond, default, (case, label)*]`         |
//! | `Return`        | `[value?]`                                |
//! | `AtomicRmw`     | `[ptr, value]`                            |
//! | `Fence`         | none                                      |
//! | `AtomicCmpXchg` | `[ptr, expected, desired]`                |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ir::{BlockId, ValueId};

/// Binary operations, evaluated at signed, unsigned or floating semantics
/// depending on the operand type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    /// Pointer plus element count
    PtrAdd,
    Sub,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Add => "add",
            BinaryOp::PtrAdd => "ptradd",
            BinaryOp::Sub => "sub",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Lt => "cmp lt",
            BinaryOp::Gt => "cmp gt",
            BinaryOp::Le => "cmp le",
            BinaryOp::Ge => "cmp ge",
            BinaryOp::Eq => "cmp eq",
            BinaryOp::Ne => "cmp ne",
        }
    }
}

/// Block terminators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminatorKind {
    /// Unconditional jump to a label operand
    Jump,
    CondJump,
    Switch,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryOrder {
    Unordered,
    Monotonic,
    Acquire,
    Release,
    AcqRel,
    SeqCst,
}

impl MemoryOrder {
    pub fn mnemonic(self) -> &'static str {
        match self {
            MemoryOrder::Unordered => "unordered",
            MemoryOrder::Monotonic => "monotonic",
            MemoryOrder::Acquire => "acquire",
            MemoryOrder::Release => "release",
            MemoryOrder::AcqRel => "acq_rel",
            MemoryOrder::SeqCst => "seq_cst",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncScope {
    AllThreads,
    SingleThread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicRmwOp {
    Add,
    Xchg,
}

/// Instruction kind with its non-operand payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrKind {
    /// Stack slot; the result is a pointer to the allocated type
    Alloca { align: u64 },
    Load,
    Store,
    GetFieldAddr { field: usize },
    /// Conversion to the result type
    Cast,
    Binary(BinaryOp),
    Call,
    Phi,
    Terminator(TerminatorKind),
    AtomicRmw { op: AtomicRmwOp, ordering: MemoryOrder },
    Fence { scope: SyncScope, ordering: MemoryOrder },
    AtomicCmpXchg { success: MemoryOrder, failure: MemoryOrder },
}

impl InstrKind {
    pub fn is_terminator(&self) -> bool {
        matches!(self, InstrKind::Terminator(_))
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, InstrKind::Phi)
    }
}

/// An instruction node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrData {
    pub kind: InstrKind,
    pub(crate) operands: Vec<ValueId>,
    pub result: Option<ValueId>,
    /// Owning block; `None` once unlinked
    pub block: Option<BlockId>,
}

impl InstrData {
    pub fn operands(&self) -> &[ValueId] {
        &self.operands
    }

    pub fn operand(&self, index: usize) -> ValueId {
        self.operands[index]
    }

    pub fn is_linked(&self) -> bool {
        self.block.is_some()
    }

    /// Operand slots that hold successor labels
    pub fn successor_slots(&self) -> Vec<usize> {
        match self.kind {
            InstrKind::Terminator(TerminatorKind::Jump) => vec![0],
            InstrKind::Terminator(TerminatorKind::CondJump) => vec![1, 2],
            InstrKind::Terminator(TerminatorKind::Switch) => {
                let mut slots = vec![1];
                slots.extend((3..self.operands.len()).step_by(2));
                slots
            }
            _ => Vec::new(),
        }
    }

    /// Incoming `(value, label)` pairs of a phi
    pub fn phi_incoming(&self) -> Vec<(ValueId, ValueId)> {
        debug_assert!(self.kind.is_phi());
        self.operands.chunks(2).map(|pair| (pair[0], pair[1])).collect()
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

impl fmt::Display for MemoryOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
