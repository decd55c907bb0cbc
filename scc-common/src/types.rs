//! Type system shared with semantic analysis
//!
//! Every SSA value carries one of these types. The SSA layer never invents
//! language-level types of its own beyond pointers to existing ones and the
//! `int`, `size_t` and `ptrdiff_t` types it needs for comparisons and
//! pointer arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Builtin scalar types of the source language
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Void,
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
}

impl Builtin {
    /// All builtins, in declaration order
    pub const ALL: [Builtin; 15] = [
        Builtin::Void,
        Builtin::Bool,
        Builtin::Char,
        Builtin::SChar,
        Builtin::UChar,
        Builtin::Short,
        Builtin::UShort,
        Builtin::Int,
        Builtin::UInt,
        Builtin::Long,
        Builtin::ULong,
        Builtin::LongLong,
        Builtin::ULongLong,
        Builtin::Float,
        Builtin::Double,
    ];

    pub fn is_integer(self) -> bool {
        !matches!(self, Builtin::Void | Builtin::Float | Builtin::Double)
    }

    /// Plain `char` is treated as signed
    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            Builtin::Char
                | Builtin::SChar
                | Builtin::Short
                | Builtin::Int
                | Builtin::Long
                | Builtin::LongLong
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Builtin::Float | Builtin::Double)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Builtin::Void => "void",
            Builtin::Bool => "bool",
            Builtin::Char => "char",
            Builtin::SChar => "schar",
            Builtin::UChar => "uchar",
            Builtin::Short => "short",
            Builtin::UShort => "ushort",
            Builtin::Int => "int",
            Builtin::UInt => "uint",
            Builtin::Long => "long",
            Builtin::ULong => "ulong",
            Builtin::LongLong => "llong",
            Builtin::ULongLong => "ullong",
            Builtin::Float => "float",
            Builtin::Double => "double",
        }
    }
}

/// A fully resolved source-language type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Builtin scalar or void
    Builtin(Builtin),

    /// Pointer to the target type
    Pointer(Box<Type>),

    /// Fixed-size array [len x element]
    Array { element: Box<Type>, len: u64 },

    /// Struct with named identity and ordered field types
    Record { name: String, fields: Vec<Type> },

    /// Function signature
    Function {
        result: Box<Type>,
        params: Vec<Type>,
        variadic: bool,
    },
}

impl Type {
    pub fn void() -> Self {
        Type::Builtin(Builtin::Void)
    }

    pub fn bool() -> Self {
        Type::Builtin(Builtin::Bool)
    }

    pub fn char() -> Self {
        Type::Builtin(Builtin::Char)
    }

    pub fn int() -> Self {
        Type::Builtin(Builtin::Int)
    }

    pub fn uint() -> Self {
        Type::Builtin(Builtin::UInt)
    }

    pub fn long() -> Self {
        Type::Builtin(Builtin::Long)
    }

    pub fn ulong() -> Self {
        Type::Builtin(Builtin::ULong)
    }

    pub fn float() -> Self {
        Type::Builtin(Builtin::Float)
    }

    pub fn double() -> Self {
        Type::Builtin(Builtin::Double)
    }

    pub fn pointer(target: Type) -> Self {
        Type::Pointer(Box::new(target))
    }

    pub fn function(result: Type, params: Vec<Type>, variadic: bool) -> Self {
        Type::Function {
            result: Box::new(result),
            params,
            variadic,
        }
    }

    pub fn record(name: &str, fields: Vec<Type>) -> Self {
        Type::Record {
            name: name.to_string(),
            fields,
        }
    }

    /// Pointer to this type
    pub fn pointer_to(&self) -> Self {
        Type::pointer(self.clone())
    }

    pub fn as_builtin(&self) -> Option<Builtin> {
        match self {
            Type::Builtin(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_builtin(&self, builtin: Builtin) -> bool {
        self.as_builtin() == Some(builtin)
    }

    pub fn is_void(&self) -> bool {
        self.is_builtin(Builtin::Void)
    }

    pub fn is_integer(&self) -> bool {
        self.as_builtin().is_some_and(Builtin::is_integer)
    }

    pub fn is_signed_integer(&self) -> bool {
        self.as_builtin().is_some_and(Builtin::is_signed_integer)
    }

    pub fn is_floating(&self) -> bool {
        self.as_builtin().is_some_and(Builtin::is_floating)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// Scalars are arithmetic types and pointers
    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    /// Pointer whose target is neither void nor a function
    pub fn is_object_pointer(&self) -> bool {
        match self {
            Type::Pointer(target) => !target.is_void() && !target.is_function(),
            _ => false,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Type::Record { .. })
    }

    /// Target type of a pointer
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(target) => Some(target),
            _ => None,
        }
    }

    /// Field type of a record by index
    pub fn record_field(&self, index: usize) -> Option<&Type> {
        match self {
            Type::Record { fields, .. } => fields.get(index),
            _ => None,
        }
    }

    /// Result type of a function or of a pointer to function
    pub fn function_result(&self) -> Option<&Type> {
        match self {
            Type::Function { result, .. } => Some(result),
            Type::Pointer(target) => target.function_result(),
            _ => None,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Builtin(b) => write!(f, "{b}"),
            Type::Pointer(target) => write!(f, "{target}*"),
            Type::Array { element, len } => write!(f, "[{len} x {element}]"),
            Type::Record { name, .. } => write!(f, "%{name}"),
            Type::Function { result, params, variadic } => {
                write!(f, "{result} (")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{param}")?;
                }
                if *variadic {
                    if !params.is_empty() { write!(f, ", ")?; }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_type_queries() {
        assert!(Type::int().is_integer());
        assert!(Type::int().is_signed_integer());
        assert!(!Type::uint().is_signed_integer());
        assert!(Type::double().is_floating());
        assert!(Type::double().is_scalar());
        assert!(!Type::void().is_scalar());

        let p = Type::int().pointer_to();
        assert!(p.is_pointer());
        assert!(p.is_object_pointer());
        assert_eq!(p.pointee(), Some(&Type::int()));
        assert!(!Type::void().pointer_to().is_object_pointer());
    }

    #[test]
    fn test_record_fields() {
        let rec = Type::record("point", vec![Type::int(), Type::double()]);
        assert_eq!(rec.record_field(1), Some(&Type::double()));
        assert_eq!(rec.record_field(2), None);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(Type::int().pointer_to().to_string(), "int*");
        assert_eq!(
            Type::Array { element: Box::new(Type::char()), len: 4 }.to_string(),
            "[4 x char]"
        );
        let f = Type::function(Type::void(), vec![Type::int()], true);
        assert_eq!(f.to_string(), "void (int, ...)");
        assert_eq!(Type::record("node", vec![]).to_string(), "%node");
    }
}
