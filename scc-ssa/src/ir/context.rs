//! Compilation context
//!
//! The arena owning every value, instruction and block of a compilation.
//! Nodes are never freed: removing an instruction or block unlinks it from
//! its owner and from the use-lists of its operands, and the slot stays
//! behind. All mutation that touches use-lists goes through this type so
//! that each operand slot is registered exactly once on the value it reads.
//!
//! The context may carry a node budget. Exceeding it unwinds with an
//! [`AllocationFailure`] payload that [`Context::recover`] (and through it
//! [`build_module`]) turns into `SsaError::AllocationFailed`.

use log::trace;
use scc_common::{Num, SsaError, TargetInfo, Type};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

use crate::ir::{
    BlockId, Const, FunctionData, GlobalVarData, InstrData, InstrId, InstrKind, Linkage, Module,
    StringData, Use, ValueData, ValueId, ValueKind,
};

/// Panic payload raised when the node budget is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationFailure {
    pub limit: usize,
}

/// A basic block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    pub label: ValueId,
    pub function: ValueId,
    pub(crate) instrs: Vec<InstrId>,
    /// Cleared when the block is removed from its function
    pub linked: bool,
}

impl BlockData {
    pub fn instrs(&self) -> &[InstrId] {
        &self.instrs
    }
}

/// Arena of IR nodes for one compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    target: TargetInfo,
    values: Vec<ValueData>,
    instrs: Vec<InstrData>,
    blocks: Vec<BlockData>,
    node_limit: Option<usize>,
}

impl Context {
    pub fn new(target: TargetInfo) -> Self {
        Self::with_node_limit(target, None)
    }

    pub fn with_node_limit(target: TargetInfo, node_limit: Option<usize>) -> Self {
        Self {
            target,
            values: Vec::new(),
            instrs: Vec::new(),
            blocks: Vec::new(),
            node_limit,
        }
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    /// Number of nodes ever allocated
    pub fn node_count(&self) -> usize {
        self.values.len() + self.instrs.len() + self.blocks.len()
    }

    fn reserve_nodes(&self, count: usize) {
        if let Some(limit) = self.node_limit {
            if self.node_count() + count > limit {
                panic::panic_any(AllocationFailure { limit });
            }
        }
    }

    /// Run `f` over the context, turning node-budget exhaustion into
    /// `SsaError::AllocationFailed`. The graph is left as it was when the
    /// budget ran out and should be discarded.
    pub fn recover<R, F>(&mut self, f: F) -> Result<R, SsaError>
    where
        F: FnOnce(&mut Context) -> R,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(result) => Ok(result),
            Err(payload) => match payload.downcast::<AllocationFailure>() {
                Ok(failure) => Err(SsaError::AllocationFailed { limit: failure.limit }),
                Err(payload) => panic::resume_unwind(payload),
            },
        }
    }

    // ---- node access ----

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.index()]
    }

    pub fn instr(&self, id: InstrId) -> &InstrData {
        &self.instrs[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.index()]
    }

    pub fn ty(&self, id: ValueId) -> &Type {
        &self.value(id).ty
    }

    pub fn uses(&self, id: ValueId) -> &[Use] {
        self.value(id).uses()
    }

    pub fn is_used(&self, id: ValueId) -> bool {
        self.value(id).is_used()
    }

    pub fn value_ids(&self) -> impl Iterator<Item = ValueId> {
        (0..self.values.len() as u32).map(ValueId)
    }

    pub fn instr_ids(&self) -> impl Iterator<Item = InstrId> {
        (0..self.instrs.len() as u32).map(InstrId)
    }

    // ---- values ----

    pub fn new_value(&mut self, kind: ValueKind, ty: Type) -> ValueId {
        self.reserve_nodes(1);
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData::new(kind, ty));
        id
    }

    pub fn constant(&mut self, ty: Type, value: Num) -> ValueId {
        self.new_value(ValueKind::Constant(value), ty)
    }

    pub fn undef(&mut self, ty: Type) -> ValueId {
        self.new_value(ValueKind::Undef, ty)
    }

    /// String blob; its value is a `char*`
    pub fn string(&mut self, bytes: &[u8]) -> ValueId {
        let data = StringData { bytes: bytes.to_vec() };
        self.new_value(ValueKind::String(data), Type::char().pointer_to())
    }

    /// Function with signature `ty`; its value is a pointer to the function
    pub fn add_function(&mut self, name: &str, ty: Type, linkage: Linkage) -> ValueId {
        assert!(ty.is_function(), "function '{name}' needs a function type, got {ty}");
        let data = FunctionData {
            name: name.to_string(),
            linkage,
            params: Vec::new(),
            blocks: Vec::new(),
        };
        self.new_value(ValueKind::Function(data), ty.pointer_to())
    }

    /// Global variable of object type `ty`; its value is a pointer to it
    pub fn add_global_var(
        &mut self,
        name: &str,
        ty: Type,
        linkage: Linkage,
        initializer: Option<Const>,
    ) -> ValueId {
        let data = GlobalVarData {
            name: name.to_string(),
            linkage,
            initializer,
        };
        self.new_value(ValueKind::GlobalVar(data), ty.pointer_to())
    }

    pub fn set_initializer(&mut self, global: ValueId, initializer: Const) {
        match &mut self.value_mut(global).kind {
            ValueKind::GlobalVar(data) => data.initializer = Some(initializer),
            other => panic!("{global} is not a global variable: {other:?}"),
        }
    }

    pub fn add_param(&mut self, function: ValueId, ty: Type) -> ValueId {
        let index = self.function(function).params.len();
        let param = self.new_value(ValueKind::Param { function, index }, ty);
        self.function_mut(function).params.push(param);
        param
    }

    pub fn function(&self, id: ValueId) -> &FunctionData {
        match &self.value(id).kind {
            ValueKind::Function(data) => data,
            other => panic!("{id} is not a function: {other:?}"),
        }
    }

    fn function_mut(&mut self, id: ValueId) -> &mut FunctionData {
        match &mut self.value_mut(id).kind {
            ValueKind::Function(data) => data,
            other => panic!("{id} is not a function: {other:?}"),
        }
    }

    pub fn is_function(&self, id: ValueId) -> bool {
        matches!(self.value(id).kind, ValueKind::Function(_))
    }

    /// Block whose label is `value`
    pub fn label_block(&self, value: ValueId) -> Option<BlockId> {
        match self.value(value).kind {
            ValueKind::Label(block) => Some(block),
            _ => None,
        }
    }

    /// Instruction producing `value`
    pub fn defining_instr(&self, value: ValueId) -> Option<InstrId> {
        match self.value(value).kind {
            ValueKind::InstrResult(instr) => Some(instr),
            _ => None,
        }
    }

    // ---- blocks ----

    /// Append a new, empty block to `function`
    pub fn add_block(&mut self, function: ValueId) -> BlockId {
        self.reserve_nodes(2);
        let id = BlockId(self.blocks.len() as u32);
        let label = self.new_value(ValueKind::Label(id), Type::void());
        self.blocks.push(BlockData {
            label,
            function,
            instrs: Vec::new(),
            linked: true,
        });
        self.function_mut(function).blocks.push(id);
        id
    }

    pub fn blocks_of(&self, function: ValueId) -> &[BlockId] {
        &self.function(function).blocks
    }

    pub fn entry_block(&self, function: ValueId) -> Option<BlockId> {
        self.function(function).entry()
    }

    pub fn is_entry(&self, block: BlockId) -> bool {
        self.entry_block(self.block(block).function) == Some(block)
    }

    pub fn label(&self, block: BlockId) -> ValueId {
        self.block(block).label
    }

    pub fn terminator(&self, block: BlockId) -> Option<InstrId> {
        let last = *self.block(block).instrs.last()?;
        self.instr(last).kind.is_terminator().then_some(last)
    }

    /// A block is closed once it ends in a terminator
    pub fn is_closed(&self, block: BlockId) -> bool {
        self.terminator(block).is_some()
    }

    /// Successor blocks in terminator slot order; may repeat
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let Some(term) = self.terminator(block) else {
            return Vec::new();
        };
        let data = self.instr(term);
        data.successor_slots()
            .into_iter()
            .filter_map(|slot| self.label_block(data.operand(slot)))
            .collect()
    }

    /// Blocks whose terminator targets `block`, deduplicated, in use order.
    /// Phi references to the label are not control-flow edges.
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        let mut preds = Vec::new();
        for u in self.uses(self.label(block)) {
            let data = self.instr(u.instr);
            if !data.kind.is_terminator() {
                continue;
            }
            if let Some(pred) = data.block {
                if !preds.contains(&pred) {
                    preds.push(pred);
                }
            }
        }
        preds
    }

    /// The entry block, or a block some non-phi instruction jumps to
    pub fn is_live(&self, block: BlockId) -> bool {
        self.is_entry(block)
            || self
                .uses(self.label(block))
                .iter()
                .any(|u| !self.instr(u.instr).kind.is_phi())
    }

    /// Unlink a block from its function together with all its instructions.
    /// Results still used outside the block are replaced with `Undef` values
    /// of the same type; returns how many were replaced.
    pub fn remove_block(&mut self, block: BlockId) -> usize {
        assert!(!self.is_entry(block), "cannot remove the entry block {block}");
        let instrs = std::mem::take(&mut self.blocks[block.index()].instrs);
        for &instr in &instrs {
            self.instrs[instr.index()].block = None;
            self.drop_operands(instr);
        }

        let mut replaced = 0;
        for &instr in &instrs {
            let Some(result) = self.result(instr) else {
                continue;
            };
            if self.is_used(result) {
                let undef = self.undef(self.ty(result).clone());
                self.replace_all_uses_with(result, undef);
                replaced += 1;
            }
        }

        // Only phis may still name the label
        let label = self.label(block);
        let phis: Vec<InstrId> = self.uses(label).iter().map(|u| u.instr).collect();
        for phi in phis {
            self.remove_phi_incoming(phi, label);
        }

        let function = self.block(block).function;
        self.function_mut(function).blocks.retain(|&b| b != block);
        self.blocks[block.index()].linked = false;
        trace!("removed block {block}, {replaced} values replaced with undef");
        replaced
    }

    // ---- instructions ----

    /// Allocate an unlinked instruction and register its operand uses
    pub fn create_instr(
        &mut self,
        kind: InstrKind,
        operands: Vec<ValueId>,
        result_ty: Option<Type>,
    ) -> InstrId {
        self.reserve_nodes(1 + result_ty.is_some() as usize);
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(InstrData {
            kind,
            operands: Vec::new(),
            result: None,
            block: None,
        });
        for operand in operands {
            self.push_operand(id, operand);
        }
        if let Some(ty) = result_ty {
            let result = self.new_value(ValueKind::InstrResult(id), ty);
            self.instrs[id.index()].result = Some(result);
        }
        id
    }

    /// Allocate an unlinked value-producing instruction
    pub fn create_value_instr(
        &mut self,
        kind: InstrKind,
        operands: Vec<ValueId>,
        ty: Type,
    ) -> (InstrId, ValueId) {
        self.reserve_nodes(2);
        let instr = self.create_instr(kind, operands, None);
        let result = self.new_value(ValueKind::InstrResult(instr), ty);
        self.instrs[instr.index()].result = Some(result);
        (instr, result)
    }

    pub fn result(&self, instr: InstrId) -> Option<ValueId> {
        self.instr(instr).result
    }

    pub fn append_instr(&mut self, block: BlockId, instr: InstrId) {
        let pos = self.block(block).instrs.len();
        self.link_at(block, pos, instr);
    }

    pub fn insert_before(&mut self, before: InstrId, instr: InstrId) {
        let (block, pos) = self.position(before);
        self.link_at(block, pos, instr);
    }

    pub fn insert_after(&mut self, after: InstrId, instr: InstrId) {
        let (block, pos) = self.position(after);
        self.link_at(block, pos + 1, instr);
    }

    fn link_at(&mut self, block: BlockId, pos: usize, instr: InstrId) {
        assert!(!self.instr(instr).is_linked(), "{instr} is already linked");
        self.blocks[block.index()].instrs.insert(pos, instr);
        self.instrs[instr.index()].block = Some(block);
    }

    /// Owning block and index of a linked instruction
    pub fn position(&self, instr: InstrId) -> (BlockId, usize) {
        let Some(block) = self.instr(instr).block else {
            panic!("{instr} is not linked into a block");
        };
        match self.block(block).instrs.iter().position(|&i| i == instr) {
            Some(pos) => (block, pos),
            None => panic!("{instr} missing from its block {block}"),
        }
    }

    /// Unlink an instruction whose result is unused and drop its operand uses
    pub fn remove_instr(&mut self, instr: InstrId) {
        if let Some(result) = self.result(instr) {
            assert!(!self.is_used(result), "removing {instr} whose result {result} is still used");
        }
        let (block, pos) = self.position(instr);
        self.blocks[block.index()].instrs.remove(pos);
        self.instrs[instr.index()].block = None;
        self.drop_operands(instr);
    }

    // ---- use-lists ----

    pub fn push_operand(&mut self, instr: InstrId, value: ValueId) {
        let index = self.instr(instr).operands.len();
        self.instrs[instr.index()].operands.push(value);
        self.value_mut(value).uses.push(Use { instr, index });
    }

    pub fn set_operand(&mut self, instr: InstrId, index: usize, value: ValueId) {
        let old = self.instr(instr).operand(index);
        if old == value {
            return;
        }
        let slot = Use { instr, index };
        self.unlink_use(old, slot);
        self.instrs[instr.index()].operands[index] = value;
        self.value_mut(value).uses.push(slot);
    }

    /// Replace the whole operand list, relinking every slot
    pub fn set_operands(&mut self, instr: InstrId, operands: Vec<ValueId>) {
        self.drop_operands(instr);
        for operand in operands {
            self.push_operand(instr, operand);
        }
    }

    fn drop_operands(&mut self, instr: InstrId) {
        let operands = std::mem::take(&mut self.instrs[instr.index()].operands);
        for (index, value) in operands.into_iter().enumerate() {
            self.unlink_use(value, Use { instr, index });
        }
    }

    fn unlink_use(&mut self, value: ValueId, slot: Use) {
        let uses = &mut self.values[value.index()].uses;
        match uses.iter().position(|&u| u == slot) {
            Some(pos) => {
                uses.remove(pos);
            }
            None => panic!("use-list of {value} lacks {slot:?}"),
        }
    }

    /// Point every use of `old` at `new`
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        debug_assert_eq!(self.ty(old), self.ty(new), "replacing {old} with a value of another type");
        let uses = std::mem::take(&mut self.value_mut(old).uses);
        for u in &uses {
            self.instrs[u.instr.index()].operands[u.index] = new;
        }
        self.value_mut(new).uses.extend(uses);
    }

    pub fn add_phi_incoming(&mut self, phi: InstrId, value: ValueId, label: ValueId) {
        assert!(self.instr(phi).kind.is_phi(), "{phi} is not a phi");
        assert!(self.label_block(label).is_some(), "{label} is not a block label");
        self.push_operand(phi, value);
        self.push_operand(phi, label);
    }

    /// Drop every incoming pair of `phi` that arrives from `label`
    pub fn remove_phi_incoming(&mut self, phi: InstrId, label: ValueId) {
        let data = self.instr(phi);
        assert!(data.kind.is_phi(), "{phi} is not a phi");
        let kept: Vec<ValueId> = data
            .phi_incoming()
            .into_iter()
            .filter(|&(_, l)| l != label)
            .flat_map(|(v, l)| [v, l])
            .collect();
        self.set_operands(phi, kept);
    }
}

/// Run `build` against a fresh context, turning node-budget exhaustion into
/// `SsaError::AllocationFailed`. Other panics propagate unchanged.
pub fn build_module<F>(
    target: TargetInfo,
    node_limit: Option<usize>,
    build: F,
) -> Result<(Context, Module), SsaError>
where
    F: FnOnce(&mut Context) -> Module,
{
    let mut ctx = Context::with_node_limit(target, node_limit);
    let module = ctx.recover(build)?;
    Ok((ctx, module))
}
