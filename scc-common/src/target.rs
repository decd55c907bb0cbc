//! Target description
//!
//! Pointer width/alignment and the per-builtin size/alignment table used by
//! the SSA layer for pointer arithmetic, alloca alignment and folding casts
//! to the right integer width.

use crate::types::{Builtin, Type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Size and alignment of a type in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeLayout {
    pub size: u64,
    pub align: u64,
}

impl TypeLayout {
    pub const fn new(size: u64, align: u64) -> Self {
        Self { size, align }
    }
}

/// Target machine description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub name: String,
    pub pointer: TypeLayout,
    pub builtins: BTreeMap<Builtin, TypeLayout>,
    /// Builtin used for `size_t`
    pub size_type: Builtin,
    /// Builtin used for `ptrdiff_t`
    pub ptrdiff_type: Builtin,
}

impl TargetInfo {
    /// 64-bit target with 64-bit `long` and pointers
    pub fn lp64() -> Self {
        Self::with_layouts("lp64", TypeLayout::new(8, 8), 8, Builtin::ULong, Builtin::Long)
    }

    /// 32-bit target with 32-bit `int`, `long` and pointers
    pub fn ilp32() -> Self {
        Self::with_layouts("ilp32", TypeLayout::new(4, 4), 4, Builtin::UInt, Builtin::Int)
    }

    fn with_layouts(
        name: &str,
        pointer: TypeLayout,
        long_size: u64,
        size_type: Builtin,
        ptrdiff_type: Builtin,
    ) -> Self {
        let mut builtins = BTreeMap::new();
        for builtin in Builtin::ALL {
            let layout = match builtin {
                // GNU semantics: void behaves as a single byte for pointer arithmetic
                Builtin::Void | Builtin::Bool | Builtin::Char | Builtin::SChar | Builtin::UChar => {
                    TypeLayout::new(1, 1)
                }
                Builtin::Short | Builtin::UShort => TypeLayout::new(2, 2),
                Builtin::Int | Builtin::UInt | Builtin::Float => TypeLayout::new(4, 4),
                Builtin::Long | Builtin::ULong => TypeLayout::new(long_size, long_size),
                Builtin::LongLong | Builtin::ULongLong | Builtin::Double => TypeLayout::new(8, 8),
            };
            builtins.insert(builtin, layout);
        }

        Self {
            name: name.to_string(),
            pointer,
            builtins,
            size_type,
            ptrdiff_type,
        }
    }

    pub fn builtin_layout(&self, builtin: Builtin) -> TypeLayout {
        self.builtins
            .get(&builtin)
            .copied()
            .unwrap_or(TypeLayout::new(1, 1))
    }

    pub fn layout_of(&self, ty: &Type) -> TypeLayout {
        match ty {
            Type::Builtin(b) => self.builtin_layout(*b),
            Type::Pointer(_) => self.pointer,
            Type::Array { element, len } => {
                let elem = self.layout_of(element);
                TypeLayout::new(elem.size * len, elem.align)
            }
            Type::Record { fields, .. } => {
                let mut size = 0;
                let mut align = 1;
                for field in fields {
                    let layout = self.layout_of(field);
                    size = align_to(size, layout.align) + layout.size;
                    align = align.max(layout.align);
                }
                TypeLayout::new(align_to(size, align), align)
            }
            Type::Function { .. } => TypeLayout::new(1, 1),
        }
    }

    pub fn size_of(&self, ty: &Type) -> u64 {
        self.layout_of(ty).size
    }

    pub fn align_of(&self, ty: &Type) -> u64 {
        self.layout_of(ty).align
    }

    /// Width of an integer or float type in bits
    pub fn bits_of(&self, ty: &Type) -> u8 {
        (self.size_of(ty) * 8).min(64) as u8
    }

    /// Byte offset of a record field
    pub fn field_offset(&self, record: &Type, index: usize) -> Option<u64> {
        let Type::Record { fields, .. } = record else {
            return None;
        };
        if index >= fields.len() {
            return None;
        }

        let mut offset = 0;
        for (i, field) in fields.iter().enumerate() {
            let layout = self.layout_of(field);
            offset = align_to(offset, layout.align);
            if i == index {
                return Some(offset);
            }
            offset += layout.size;
        }
        None
    }

    pub fn size_type(&self) -> Type {
        Type::Builtin(self.size_type)
    }

    pub fn ptrdiff_type(&self) -> Type {
        Type::Builtin(self.ptrdiff_type)
    }
}

impl Default for TargetInfo {
    fn default() -> Self {
        Self::lp64()
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    if align == 0 {
        return offset;
    }
    offset.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_sizes() {
        let lp64 = TargetInfo::lp64();
        assert_eq!(lp64.size_of(&Type::int()), 4);
        assert_eq!(lp64.size_of(&Type::long()), 8);
        assert_eq!(lp64.size_of(&Type::int().pointer_to()), 8);
        assert_eq!(lp64.bits_of(&Type::char()), 8);

        let ilp32 = TargetInfo::ilp32();
        assert_eq!(ilp32.size_of(&Type::long()), 4);
        assert_eq!(ilp32.size_of(&Type::int().pointer_to()), 4);
        assert_eq!(ilp32.size_type(), Type::uint());
    }

    #[test]
    fn test_record_layout() {
        let target = TargetInfo::lp64();
        let rec = Type::record("s", vec![Type::char(), Type::int(), Type::char()]);
        assert_eq!(target.size_of(&rec), 12);
        assert_eq!(target.align_of(&rec), 4);
        assert_eq!(target.field_offset(&rec, 1), Some(4));
        assert_eq!(target.field_offset(&rec, 2), Some(8));
        assert_eq!(target.field_offset(&rec, 3), None);
    }

    #[test]
    fn test_array_layout() {
        let target = TargetInfo::lp64();
        let arr = Type::Array { element: Box::new(Type::int()), len: 10 };
        assert_eq!(target.size_of(&arr), 40);
        assert_eq!(target.align_of(&arr), 4);
    }
}
