//! Alloca promotion (mem2reg)
//!
//! Stack slots that are only ever loaded from and stored to as a whole are
//! replaced by SSA values, with phis at the merge points that need them.
//!
//! Blocks are visited in function order. Before a block is rewritten its
//! incoming definitions are merged from its predecessors: a slot every
//! predecessor defines with the same value needs no phi; a slot defined
//! differently or only on some paths gets one. A predecessor that has not
//! been fully visited yet (a back edge) gives no information, so the block
//! then receives a phi for every slot. Loads and stores are then rewritten
//! against the running definitions, phi operands are filled in from each
//! predecessor's exit definitions, and finally dead and trivial phis and the
//! emptied allocas are removed.
//!
//! The merge is a forward relaxation rather than dominance-frontier SSA
//! construction; it assumes the reducible control flow structured lowering
//! produces.

use log::{debug, trace};
use scc_common::Type;
use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{BlockId, Builder, Context, InstrId, InstrKind, ValueId};
use crate::pass::PassContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionStats {
    pub slots_promoted: usize,
    pub phis_inserted: usize,
    pub phis_removed: usize,
}

pub fn run(pc: &mut PassContext<'_>) {
    let function = pc.function();
    promote_function(pc.ctx, function);
}

/// An alloca result whose only uses are loads from it and stores into it
pub fn is_promotable(ctx: &Context, slot: ValueId) -> bool {
    let Some(alloca) = ctx.defining_instr(slot) else {
        return false;
    };
    if !matches!(ctx.instr(alloca).kind, InstrKind::Alloca { .. }) || !ctx.instr(alloca).is_linked() {
        return false;
    }
    ctx.uses(slot).iter().all(|u| match ctx.instr(u.instr).kind {
        InstrKind::Load => true,
        InstrKind::Store => u.index == 1,
        _ => false,
    })
}

pub fn promote_function(ctx: &mut Context, function: ValueId) -> PromotionStats {
    let blocks = ctx.blocks_of(function).to_vec();
    let mut slots = BTreeMap::new();
    for &block in &blocks {
        for &instr in ctx.block(block).instrs() {
            let Some(result) = ctx.result(instr) else {
                continue;
            };
            if is_promotable(ctx, result) {
                if let Some(pointee) = ctx.ty(result).pointee() {
                    slots.insert(result, pointee.clone());
                }
            }
        }
    }
    if slots.is_empty() {
        return PromotionStats::default();
    }

    let mut promoter = Promoter::new(ctx, &blocks, slots);
    for &block in &blocks {
        promoter.visit(block);
    }
    promoter.patch_phis(&blocks);
    promoter.cleanup();

    debug!(
        "'{}': promoted {} slots, {} phis inserted, {} removed",
        promoter.ctx.function(function).name,
        promoter.stats.slots_promoted,
        promoter.stats.phis_inserted,
        promoter.stats.phis_removed
    );
    promoter.stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    InProgress,
    Done,
}

/// Side tables owned by one promotion run
struct Promoter<'a> {
    ctx: &'a mut Context,
    /// Promotable slot to its value type
    slots: BTreeMap<ValueId, Type>,
    order: BTreeMap<BlockId, usize>,
    state: BTreeMap<BlockId, Visit>,
    /// Definition of each slot at block exit
    defs: BTreeMap<BlockId, BTreeMap<ValueId, ValueId>>,
    /// Phi inserted for a slot at block entry
    phis: BTreeMap<BlockId, BTreeMap<ValueId, InstrId>>,
    /// Removed load results and the value that replaced them
    forward: BTreeMap<ValueId, ValueId>,
    stats: PromotionStats,
}

impl<'a> Promoter<'a> {
    fn new(ctx: &'a mut Context, blocks: &[BlockId], slots: BTreeMap<ValueId, Type>) -> Self {
        Self {
            ctx,
            order: blocks.iter().enumerate().map(|(i, &b)| (b, i)).collect(),
            state: blocks.iter().map(|&b| (b, Visit::Pending)).collect(),
            stats: PromotionStats { slots_promoted: slots.len(), ..PromotionStats::default() },
            slots,
            defs: BTreeMap::new(),
            phis: BTreeMap::new(),
            forward: BTreeMap::new(),
        }
    }

    fn state(&self, block: BlockId) -> Visit {
        self.state.get(&block).copied().unwrap_or(Visit::Done)
    }

    /// Follow load replacements so stale ids never leak into operands
    fn resolve(&self, mut value: ValueId) -> ValueId {
        while let Some(&next) = self.forward.get(&value) {
            value = next;
        }
        value
    }

    fn def(&self, block: BlockId, slot: ValueId) -> Option<ValueId> {
        self.defs.get(&block)?.get(&slot).map(|&v| self.resolve(v))
    }

    fn set_def(&mut self, block: BlockId, slot: ValueId, value: ValueId) {
        self.defs.entry(block).or_default().insert(slot, value);
    }

    fn visit(&mut self, block: BlockId) {
        if self.state(block) != Visit::Pending {
            return;
        }
        self.state.insert(block, Visit::InProgress);
        self.merge_parent_defs(block);
        self.rewrite_block(block);
        self.state.insert(block, Visit::Done);
    }

    fn merge_parent_defs(&mut self, block: BlockId) {
        if self.ctx.is_entry(block) {
            return;
        }
        let preds = self.ctx.predecessors(block);
        if preds.is_empty() {
            return;
        }

        let position = self.order.get(&block).copied().unwrap_or(usize::MAX);
        for &pred in &preds {
            let earlier = self.order.get(&pred).is_some_and(|&p| p < position);
            if earlier && self.state(pred) == Visit::Pending {
                self.visit(pred);
            }
        }

        let slots: Vec<ValueId> = self.slots.keys().copied().collect();
        if preds.iter().any(|&p| self.state(p) != Visit::Done) {
            for slot in slots {
                self.insert_phi(block, slot);
            }
            return;
        }

        for slot in slots {
            let incoming: Vec<Option<ValueId>> = preds.iter().map(|&p| self.def(p, slot)).collect();
            if incoming.iter().all(Option::is_none) {
                continue;
            }
            let first = incoming[0];
            if incoming.iter().all(|&v| v == first) {
                if let Some(value) = first {
                    self.set_def(block, slot, value);
                }
            } else {
                self.insert_phi(block, slot);
            }
        }
    }

    fn insert_phi(&mut self, block: BlockId, slot: ValueId) {
        let ty = self.slots[&slot].clone();
        let first = self.ctx.block(block).instrs().first().copied();
        let mut builder = Builder::new(&mut *self.ctx);
        match first {
            Some(instr) => builder.position_before(instr),
            None => builder.position_at_end(block),
        }
        let phi = builder.phi(ty);
        let Some(instr) = self.ctx.defining_instr(phi) else {
            return;
        };
        self.set_def(block, slot, phi);
        self.phis.entry(block).or_default().insert(slot, instr);
        self.stats.phis_inserted += 1;
        trace!("{block}: phi {phi} for slot {slot}");
    }

    /// Replace loads with the running definition and drop stores
    fn rewrite_block(&mut self, block: BlockId) {
        for instr in self.ctx.block(block).instrs().to_vec() {
            let data = self.ctx.instr(instr);
            let (kind, result) = (data.kind, data.result);
            let operands = data.operands().to_vec();
            match kind {
                InstrKind::Load if self.slots.contains_key(&operands[0]) => {
                    let slot = operands[0];
                    let Some(result) = result else {
                        continue;
                    };
                    let value = match self.def(block, slot) {
                        Some(value) => value,
                        None => {
                            let undef = self.ctx.undef(self.slots[&slot].clone());
                            self.set_def(block, slot, undef);
                            undef
                        }
                    };
                    self.ctx.replace_all_uses_with(result, value);
                    self.forward.insert(result, value);
                    self.ctx.remove_instr(instr);
                }
                InstrKind::Store if self.slots.contains_key(&operands[1]) => {
                    self.set_def(block, operands[1], operands[0]);
                    self.ctx.remove_instr(instr);
                }
                _ => {}
            }
        }
    }

    /// Give each phi one incoming value per predecessor edge
    fn patch_phis(&mut self, blocks: &[BlockId]) {
        for &block in blocks {
            let label = self.ctx.label(block);
            let succs: BTreeSet<BlockId> = self.ctx.successors(block).into_iter().collect();
            for succ in succs {
                let Some(phis) = self.phis.get(&succ).cloned() else {
                    continue;
                };
                for (slot, phi) in phis {
                    let value = match self.def(block, slot) {
                        Some(value) => value,
                        None => self.ctx.undef(self.slots[&slot].clone()),
                    };
                    self.ctx.add_phi_incoming(phi, value, label);
                }
            }
        }
    }

    /// Remove dead and trivial phis and the emptied allocas, to a fixpoint
    fn cleanup(&mut self) {
        let phis: Vec<InstrId> = self.phis.values().flat_map(|m| m.values().copied()).collect();
        loop {
            let mut changed = self.remove_dead_phis(&phis);
            for &phi in &phis {
                if self.ctx.instr(phi).is_linked() && self.collapse_trivial_phi(phi) {
                    changed = true;
                }
            }

            for &slot in self.slots.keys() {
                let Some(alloca) = self.ctx.defining_instr(slot) else {
                    continue;
                };
                if self.ctx.instr(alloca).is_linked() && !self.ctx.is_used(slot) {
                    self.ctx.remove_instr(alloca);
                    changed = true;
                }
            }

            if !changed {
                return;
            }
        }
    }

    /// Remove inserted phis no real instruction depends on, including cycles
    /// of phis that only feed each other
    fn remove_dead_phis(&mut self, phis: &[InstrId]) -> bool {
        let results: BTreeMap<ValueId, InstrId> = phis
            .iter()
            .filter(|&&p| self.ctx.instr(p).is_linked())
            .filter_map(|&p| Some((self.ctx.result(p)?, p)))
            .collect();
        let inserted: BTreeSet<InstrId> = results.values().copied().collect();

        let mut live = BTreeSet::new();
        let mut work = Vec::new();
        for (&result, &phi) in &results {
            if self.ctx.uses(result).iter().any(|u| !inserted.contains(&u.instr)) {
                live.insert(phi);
                work.push(phi);
            }
        }
        while let Some(phi) = work.pop() {
            for (value, _) in self.ctx.instr(phi).phi_incoming() {
                if let Some(&source) = results.get(&value) {
                    if live.insert(source) {
                        work.push(source);
                    }
                }
            }
        }

        let dead: Vec<InstrId> = inserted.difference(&live).copied().collect();
        for &phi in &dead {
            self.ctx.set_operands(phi, Vec::new());
        }
        for &phi in &dead {
            self.ctx.remove_instr(phi);
            self.stats.phis_removed += 1;
        }
        !dead.is_empty()
    }

    /// Replace a phi whose incoming values, ignoring itself, are all the same
    fn collapse_trivial_phi(&mut self, phi: InstrId) -> bool {
        let Some(result) = self.ctx.result(phi) else {
            return false;
        };
        let mut sources: Vec<ValueId> = self
            .ctx
            .instr(phi)
            .phi_incoming()
            .into_iter()
            .map(|(v, _)| v)
            .filter(|&v| v != result)
            .collect();
        sources.sort();
        sources.dedup();
        if sources.len() > 1 {
            return false;
        }

        let replacement = match sources.first() {
            Some(&source) => source,
            None => {
                let ty = self.ctx.ty(result).clone();
                self.ctx.undef(ty)
            }
        };
        trace!("collapsing trivial phi {result} into {replacement}");
        self.ctx.replace_all_uses_with(result, replacement);
        self.forward.insert(result, replacement);
        self.ctx.remove_instr(phi);
        self.stats.phis_removed += 1;
        true
    }
}
