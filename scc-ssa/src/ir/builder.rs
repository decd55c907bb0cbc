//! IR Builder
//!
//! The only supported way to create instructions and insert them into
//! blocks. Operand typing and the single-terminator rule are enforced here
//! with assertions: malformed input is a bug in the caller.

use scc_common::{Builtin, Num, Type};

use crate::ir::{
    AtomicRmwOp, BinaryOp, BlockId, Context, InstrId, InstrKind, MemoryOrder, SyncScope,
    TerminatorKind, ValueId,
};

/// Where the next instruction goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    /// Append to the block
    End(BlockId),
    Before(InstrId),
    /// After the instruction; advances past every inserted instruction so
    /// consecutive insertions keep program order
    After(InstrId),
}

/// Builder for constructing SSA
pub struct Builder<'a> {
    ctx: &'a mut Context,
    point: Option<InsertPoint>,
}

impl<'a> Builder<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        Self { ctx, point: None }
    }

    pub fn at_end(ctx: &'a mut Context, block: BlockId) -> Self {
        Self { ctx, point: Some(InsertPoint::End(block)) }
    }

    pub fn ctx(&self) -> &Context {
        &*self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut Context {
        &mut *self.ctx
    }

    pub fn insert_point(&self) -> Option<InsertPoint> {
        self.point
    }

    pub fn set_insert_point(&mut self, point: InsertPoint) {
        self.point = Some(point);
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.set_insert_point(InsertPoint::End(block));
    }

    pub fn position_before(&mut self, instr: InstrId) {
        self.set_insert_point(InsertPoint::Before(instr));
    }

    pub fn position_after(&mut self, instr: InstrId) {
        self.set_insert_point(InsertPoint::After(instr));
    }

    /// Block the insertion point lies in
    pub fn current_block(&self) -> BlockId {
        match self.point {
            Some(InsertPoint::End(block)) => block,
            Some(InsertPoint::Before(instr)) | Some(InsertPoint::After(instr)) => {
                self.ctx.position(instr).0
            }
            None => panic!("builder has no insertion point"),
        }
    }

    /// Add a block to `function` and move the insertion point to its end
    pub fn append_block(&mut self, function: ValueId) -> BlockId {
        let block = self.ctx.add_block(function);
        self.position_at_end(block);
        block
    }

    pub fn param(&mut self, function: ValueId, ty: Type) -> ValueId {
        self.ctx.add_param(function, ty)
    }

    fn insert(&mut self, instr: InstrId) {
        match self.point {
            Some(InsertPoint::End(block)) => self.ctx.append_instr(block, instr),
            Some(InsertPoint::Before(before)) => self.ctx.insert_before(before, instr),
            Some(InsertPoint::After(after)) => {
                self.ctx.insert_after(after, instr);
                self.point = Some(InsertPoint::After(instr));
            }
            None => panic!("builder has no insertion point"),
        }
    }

    fn build_void(&mut self, kind: InstrKind, operands: Vec<ValueId>) -> InstrId {
        let instr = self.ctx.create_instr(kind, operands, None);
        self.insert(instr);
        instr
    }

    fn build_value(&mut self, kind: InstrKind, operands: Vec<ValueId>, ty: Type) -> ValueId {
        let (instr, result) = self.ctx.create_value_instr(kind, operands, ty);
        self.insert(instr);
        result
    }

    fn ty(&self, value: ValueId) -> Type {
        self.ctx.ty(value).clone()
    }

    // ---- constants ----

    /// Numeric value of type `ty` holding `value`
    fn num_for(&self, ty: &Type, value: i64) -> Num {
        let target = self.ctx.target();
        if ty.is_builtin(Builtin::Float) {
            Num::Float(value as f32)
        } else if ty.is_floating() {
            Num::Double(value as f64)
        } else {
            Num::from_i64(target.bits_of(ty), ty.is_signed_integer(), value)
        }
    }

    pub fn int_constant(&mut self, ty: Type, value: i64) -> ValueId {
        let num = self.num_for(&ty, value);
        self.ctx.constant(ty, num)
    }

    pub fn i32_constant(&mut self, value: i32) -> ValueId {
        self.int_constant(Type::int(), value as i64)
    }

    pub fn u32_constant(&mut self, value: u32) -> ValueId {
        self.int_constant(Type::uint(), value as i64)
    }

    pub fn size_constant(&mut self, value: u64) -> ValueId {
        let ty = self.ctx.target().size_type();
        self.int_constant(ty, value as i64)
    }

    pub fn ptrdiff_constant(&mut self, value: i64) -> ValueId {
        let ty = self.ctx.target().ptrdiff_type();
        self.int_constant(ty, value)
    }

    pub fn float_constant(&mut self, value: f32) -> ValueId {
        self.ctx.constant(Type::float(), Num::Float(value))
    }

    pub fn double_constant(&mut self, value: f64) -> ValueId {
        self.ctx.constant(Type::double(), Num::Double(value))
    }

    pub fn zero(&mut self, ty: Type) -> ValueId {
        self.int_constant(ty, 0)
    }

    pub fn one(&mut self, ty: Type) -> ValueId {
        self.int_constant(ty, 1)
    }

    pub fn undef(&mut self, ty: Type) -> ValueId {
        self.ctx.undef(ty)
    }

    pub fn string(&mut self, bytes: &[u8]) -> ValueId {
        self.ctx.string(bytes)
    }

    // ---- arithmetic ----

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let lt = self.ty(lhs);
        let rt = self.ty(rhs);
        let result_ty = match op {
            BinaryOp::PtrAdd => {
                assert!(lt.is_pointer() && rt.is_integer(), "ptradd needs pointer and integer, got {lt} and {rt}");
                lt
            }
            // Shift amounts may have any integer type
            BinaryOp::Shl | BinaryOp::Shr => {
                assert!(lt.is_integer() && rt.is_integer(), "shift of {lt} by {rt}");
                lt
            }
            _ if op.is_comparison() => {
                assert_eq!(lt, rt, "comparison operands must share a type");
                Type::int()
            }
            _ => {
                assert_eq!(lt, rt, "{op} operands must share a type");
                lt
            }
        };
        self.build_value(InstrKind::Binary(op), vec![lhs, rhs], result_ty)
    }

    pub fn mul(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn rem(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Mod, lhs, rhs)
    }

    pub fn shl(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Shl, lhs, rhs)
    }

    pub fn shr(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Shr, lhs, rhs)
    }

    pub fn and(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Xor, lhs, rhs)
    }

    /// Pointer plus element count
    pub fn ptr_add(&mut self, pointer: ValueId, offset: ValueId) -> ValueId {
        self.binary(BinaryOp::PtrAdd, pointer, offset)
    }

    /// Integer addition, or pointer arithmetic if either side is a pointer
    pub fn add(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        if self.ty(lhs).is_pointer() {
            self.ptr_add(lhs, rhs)
        } else if self.ty(rhs).is_pointer() {
            self.ptr_add(rhs, lhs)
        } else {
            self.binary(BinaryOp::Add, lhs, rhs)
        }
    }

    /// Integer subtraction, pointer arithmetic, or the element distance of
    /// two pointers
    pub fn sub(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        let lt = self.ty(lhs);
        let rt = self.ty(rhs);
        match (lt.pointee().cloned(), rt.is_pointer()) {
            (Some(pointee), true) => {
                let size = self.ctx.target().size_of(&pointee);
                let lhs = self.cast_to_ptrdiff(lhs);
                let rhs = self.cast_to_ptrdiff(rhs);
                let diff = self.binary(BinaryOp::Sub, lhs, rhs);
                let size = self.ptrdiff_constant(size as i64);
                self.div(diff, size)
            }
            (Some(_), false) => {
                let neg = self.neg(rhs);
                self.ptr_add(lhs, neg)
            }
            (None, true) => {
                let neg = self.neg(lhs);
                self.ptr_add(rhs, neg)
            }
            (None, false) => self.binary(BinaryOp::Sub, lhs, rhs),
        }
    }

    // ---- comparisons, all yielding int ----

    pub fn lt(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Lt, lhs, rhs)
    }

    pub fn gt(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Gt, lhs, rhs)
    }

    pub fn le(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Le, lhs, rhs)
    }

    pub fn ge(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Ge, lhs, rhs)
    }

    pub fn eq(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Eq, lhs, rhs)
    }

    pub fn ne(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Ne, lhs, rhs)
    }

    // ---- unary sugar ----

    /// Bitwise complement
    pub fn not(&mut self, value: ValueId) -> ValueId {
        let ones = self.int_constant(self.ty(value), -1);
        self.xor(value, ones)
    }

    /// `value == 0`
    pub fn log_not(&mut self, value: ValueId) -> ValueId {
        let zero = self.zero(self.ty(value));
        self.eq(value, zero)
    }

    /// `0 - value`
    pub fn neg(&mut self, value: ValueId) -> ValueId {
        let zero = self.zero(self.ty(value));
        self.binary(BinaryOp::Sub, zero, value)
    }

    /// `value != 0`
    pub fn ne_zero(&mut self, value: ValueId) -> ValueId {
        let zero = self.zero(self.ty(value));
        self.ne(value, zero)
    }

    pub fn inc(&mut self, value: ValueId) -> ValueId {
        let one = self.step_of(value);
        self.add(value, one)
    }

    pub fn dec(&mut self, value: ValueId) -> ValueId {
        let one = self.step_of(value);
        self.sub(value, one)
    }

    fn step_of(&mut self, value: ValueId) -> ValueId {
        let ty = self.ty(value);
        if ty.is_pointer() {
            self.ptrdiff_constant(1)
        } else {
            self.one(ty)
        }
    }

    // ---- casts ----

    /// Convert to a scalar type; no instruction when the type already matches
    pub fn cast(&mut self, to: Type, value: ValueId) -> ValueId {
        assert!(to.is_scalar(), "cannot cast to non-scalar type {to}");
        if *self.ctx.ty(value) == to {
            return value;
        }
        self.build_value(InstrKind::Cast, vec![value], to)
    }

    pub fn cast_to_ptrdiff(&mut self, value: ValueId) -> ValueId {
        let ty = self.ctx.target().ptrdiff_type();
        self.cast(ty, value)
    }

    pub fn cast_to_size(&mut self, value: ValueId) -> ValueId {
        let ty = self.ctx.target().size_type();
        self.cast(ty, value)
    }

    pub fn cast_to_void_ptr(&mut self, value: ValueId) -> ValueId {
        self.cast(Type::void().pointer_to(), value)
    }

    // ---- memory ----

    /// Stack slot aligned for `ty`
    pub fn alloca(&mut self, ty: Type) -> ValueId {
        let align = self.ctx.target().align_of(&ty);
        self.alloca_aligned(ty, align)
    }

    pub fn alloca_aligned(&mut self, ty: Type, align: u64) -> ValueId {
        self.build_value(InstrKind::Alloca { align }, Vec::new(), ty.pointer_to())
    }

    pub fn load(&mut self, pointer: ValueId) -> ValueId {
        let ty = self.ty(pointer);
        let Some(pointee) = ty.pointee() else {
            panic!("load from non-pointer {pointer} of type {ty}");
        };
        self.build_value(InstrKind::Load, vec![pointer], pointee.clone())
    }

    pub fn store(&mut self, value: ValueId, dest: ValueId) -> InstrId {
        let dt = self.ty(dest);
        assert_eq!(dt.pointee(), Some(self.ctx.ty(value)), "store of {value} through {dest}");
        self.build_void(InstrKind::Store, vec![value, dest])
    }

    pub fn get_field_addr(&mut self, record_ptr: ValueId, field: usize) -> ValueId {
        let ty = self.ty(record_ptr);
        let Some(field_ty) = ty.pointee().and_then(|r| r.record_field(field)) else {
            panic!("{ty} has no record field {field}");
        };
        let result_ty = field_ty.pointer_to();
        self.build_value(InstrKind::GetFieldAddr { field }, vec![record_ptr], result_ty)
    }

    // ---- calls and phis ----

    /// Call through a function pointer; `None` for void results
    pub fn call(&mut self, callee: ValueId, args: &[ValueId]) -> Option<ValueId> {
        let ty = self.ty(callee);
        let Some(result) = ty.function_result().cloned() else {
            panic!("call through non-function {callee} of type {ty}");
        };
        let mut operands = vec![callee];
        operands.extend_from_slice(args);
        if result.is_void() {
            self.build_void(InstrKind::Call, operands);
            None
        } else {
            Some(self.build_value(InstrKind::Call, operands, result))
        }
    }

    /// Empty phi; incoming pairs are added with `add_phi_incoming`
    pub fn phi(&mut self, ty: Type) -> ValueId {
        self.build_value(InstrKind::Phi, Vec::new(), ty)
    }

    pub fn add_phi_incoming(&mut self, phi: ValueId, value: ValueId, from: BlockId) {
        let Some(instr) = self.ctx.defining_instr(phi) else {
            panic!("{phi} is not an instruction result");
        };
        let label = self.ctx.label(from);
        self.ctx.add_phi_incoming(instr, value, label);
    }

    // ---- control flow ----

    /// The open block a terminator may be appended to
    fn open_block(&self) -> BlockId {
        let block = match self.point {
            Some(InsertPoint::End(block)) => block,
            Some(InsertPoint::After(instr)) => {
                let (block, pos) = self.ctx.position(instr);
                assert_eq!(pos + 1, self.ctx.block(block).instrs().len(), "terminator must end the block");
                block
            }
            _ => panic!("terminators are appended at the end of a block"),
        };
        assert!(!self.ctx.is_closed(block), "block {block} is already terminated");
        block
    }

    fn terminate(&mut self, kind: TerminatorKind, operands: Vec<ValueId>) -> InstrId {
        self.open_block();
        self.build_void(InstrKind::Terminator(kind), operands)
    }

    pub fn jump(&mut self, dest: BlockId) -> InstrId {
        let label = self.ctx.label(dest);
        self.terminate(TerminatorKind::Jump, vec![label])
    }

    pub fn cond_jump(&mut self, cond: ValueId, on_true: BlockId, on_false: BlockId) -> InstrId {
        let t = self.ctx.label(on_true);
        let f = self.ctx.label(on_false);
        self.terminate(TerminatorKind::CondJump, vec![cond, t, f])
    }

    pub fn switch(&mut self, cond: ValueId, default: BlockId) -> InstrId {
        let label = self.ctx.label(default);
        self.terminate(TerminatorKind::Switch, vec![cond, label])
    }

    pub fn add_switch_case(&mut self, switch: InstrId, value: ValueId, dest: BlockId) {
        assert_eq!(
            self.ctx.instr(switch).kind,
            InstrKind::Terminator(TerminatorKind::Switch),
            "{switch} is not a switch"
        );
        assert!(self.ctx.value(value).is_constant(), "switch case {value} is not a constant");
        let label = self.ctx.label(dest);
        self.ctx.push_operand(switch, value);
        self.ctx.push_operand(switch, label);
    }

    pub fn ret(&mut self, value: ValueId) -> InstrId {
        self.terminate(TerminatorKind::Return, vec![value])
    }

    pub fn ret_void(&mut self) -> InstrId {
        self.terminate(TerminatorKind::Return, Vec::new())
    }

    // ---- atomics ----

    fn atomic_rmw(&mut self, op: AtomicRmwOp, pointer: ValueId, value: ValueId, ordering: MemoryOrder) -> ValueId {
        let ty = self.ty(value);
        assert_eq!(self.ctx.ty(pointer).pointee(), Some(&ty), "atomic operand type mismatch");
        self.build_value(InstrKind::AtomicRmw { op, ordering }, vec![pointer, value], ty)
    }

    /// Atomically add, yielding the previous value
    pub fn atomic_add(&mut self, pointer: ValueId, value: ValueId, ordering: MemoryOrder) -> ValueId {
        self.atomic_rmw(AtomicRmwOp::Add, pointer, value, ordering)
    }

    /// Atomically exchange, yielding the previous value
    pub fn atomic_xchg(&mut self, pointer: ValueId, value: ValueId, ordering: MemoryOrder) -> ValueId {
        self.atomic_rmw(AtomicRmwOp::Xchg, pointer, value, ordering)
    }

    pub fn fence(&mut self, scope: SyncScope, ordering: MemoryOrder) -> InstrId {
        self.build_void(InstrKind::Fence { scope, ordering }, Vec::new())
    }

    /// Compare-and-exchange, yielding the value found in memory
    pub fn atomic_cmpxchg(
        &mut self,
        pointer: ValueId,
        expected: ValueId,
        desired: ValueId,
        success: MemoryOrder,
        failure: MemoryOrder,
    ) -> ValueId {
        let ty = self.ty(desired);
        assert_eq!(self.ctx.ty(pointer).pointee(), Some(&ty), "cmpxchg operand type mismatch");
        assert_eq!(self.ctx.ty(expected), &ty, "cmpxchg operand type mismatch");
        self.build_value(
            InstrKind::AtomicCmpXchg { success, failure },
            vec![pointer, expected, desired],
            ty,
        )
    }
}
