//! Constant sublanguage
//!
//! Pure expression trees describing the initial value of a global variable.
//! They never appear as instruction operands; function bodies materialize
//! literals as `ValueKind::Constant` values instead.

use scc_common::{Num, Type};
use serde::{Deserialize, Serialize};

use crate::ir::ValueId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    /// Address of a global variable, function or string
    Address { ty: Type, global: ValueId },
    Cast { ty: Type, operand: Box<Const> },
    /// Pointer plus element count
    PtrAdd { ty: Type, pointer: Box<Const>, offset: Box<Const> },
    GetFieldAddr { ty: Type, record: Box<Const>, field: usize },
    Literal { ty: Type, value: Num },
    /// Aggregate initializer
    List { ty: Type, items: Vec<Const> },
}

impl Const {
    pub fn ty(&self) -> &Type {
        match self {
            Const::Address { ty, .. }
            | Const::Cast { ty, .. }
            | Const::PtrAdd { ty, .. }
            | Const::GetFieldAddr { ty, .. }
            | Const::Literal { ty, .. }
            | Const::List { ty, .. } => ty,
        }
    }

    pub fn literal(ty: Type, value: Num) -> Self {
        Const::Literal { ty, value }
    }

    pub fn address(ty: Type, global: ValueId) -> Self {
        Const::Address { ty, global }
    }

    pub fn cast(ty: Type, operand: Const) -> Self {
        Const::Cast { ty, operand: Box::new(operand) }
    }

    pub fn ptr_add(pointer: Const, offset: Const) -> Self {
        Const::PtrAdd {
            ty: pointer.ty().clone(),
            pointer: Box::new(pointer),
            offset: Box::new(offset),
        }
    }

    /// Address of field `field` of the record `record` points to
    pub fn field_addr(record: Const, field: usize) -> Self {
        let ty = record
            .ty()
            .pointee()
            .and_then(|r| r.record_field(field))
            .map(Type::pointer_to)
            .unwrap_or_else(|| Type::void().pointer_to());
        Const::GetFieldAddr { ty, record: Box::new(record), field }
    }

    pub fn list(ty: Type, items: Vec<Const>) -> Self {
        Const::List { ty, items }
    }

    /// Globals referenced anywhere in the tree
    pub fn referenced_globals(&self) -> Vec<ValueId> {
        let mut out = Vec::new();
        self.collect_globals(&mut out);
        out
    }

    fn collect_globals(&self, out: &mut Vec<ValueId>) {
        match self {
            Const::Address { global, .. } => out.push(*global),
            Const::Cast { operand, .. } => operand.collect_globals(out),
            Const::PtrAdd { pointer, offset, .. } => {
                pointer.collect_globals(out);
                offset.collect_globals(out);
            }
            Const::GetFieldAddr { record, .. } => record.collect_globals(out),
            Const::Literal { .. } => {}
            Const::List { items, .. } => {
                for item in items {
                    item.collect_globals(out);
                }
            }
        }
    }
}
