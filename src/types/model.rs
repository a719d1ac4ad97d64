use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::syntax::{NodeId, Span};

/// Predeclared basic types, plus the untyped kinds of constant expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Basic {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl Basic {
    pub fn from_name(name: &str) -> Option<Basic> {
        Some(match name {
            "bool" => Basic::Bool,
            "string" => Basic::String,
            "int" => Basic::Int,
            "int8" => Basic::Int8,
            "int16" => Basic::Int16,
            "int32" | "rune" => Basic::Int32,
            "int64" => Basic::Int64,
            "uint" => Basic::Uint,
            "uint8" | "byte" => Basic::Uint8,
            "uint16" => Basic::Uint16,
            "uint32" => Basic::Uint32,
            "uint64" => Basic::Uint64,
            "uintptr" => Basic::Uintptr,
            "float32" => Basic::Float32,
            "float64" => Basic::Float64,
            "complex64" => Basic::Complex64,
            "complex128" => Basic::Complex128,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Basic::Bool => "bool",
            Basic::String => "string",
            Basic::Int => "int",
            Basic::Int8 => "int8",
            Basic::Int16 => "int16",
            Basic::Int32 => "int32",
            Basic::Int64 => "int64",
            Basic::Uint => "uint",
            Basic::Uint8 => "uint8",
            Basic::Uint16 => "uint16",
            Basic::Uint32 => "uint32",
            Basic::Uint64 => "uint64",
            Basic::Uintptr => "uintptr",
            Basic::Float32 => "float32",
            Basic::Float64 => "float64",
            Basic::Complex64 => "complex64",
            Basic::Complex128 => "complex128",
            Basic::UntypedBool => "untyped bool",
            Basic::UntypedInt => "untyped int",
            Basic::UntypedRune => "untyped rune",
            Basic::UntypedFloat => "untyped float",
            Basic::UntypedComplex => "untyped complex",
            Basic::UntypedString => "untyped string",
            Basic::UntypedNil => "untyped nil",
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Basic::Bool | Basic::UntypedBool)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Basic::String | Basic::UntypedString)
    }

    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            Basic::UntypedBool
                | Basic::UntypedInt
                | Basic::UntypedRune
                | Basic::UntypedFloat
                | Basic::UntypedComplex
                | Basic::UntypedString
                | Basic::UntypedNil
        )
    }

    /// Type an untyped constant takes when assigned to a fresh variable.
    pub fn default_type(&self) -> Basic {
        match self {
            Basic::UntypedBool => Basic::Bool,
            Basic::UntypedInt => Basic::Int,
            Basic::UntypedRune => Basic::Int32,
            Basic::UntypedFloat => Basic::Float64,
            Basic::UntypedComplex => Basic::Complex128,
            Basic::UntypedString => Basic::String,
            other => *other,
        }
    }

    fn untyped_rank(&self) -> u8 {
        match self {
            Basic::UntypedInt => 1,
            Basic::UntypedRune => 2,
            Basic::UntypedFloat => 3,
            Basic::UntypedComplex => 4,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    pub variadic: bool,
}

impl FuncType {
    /// Type of a call: nothing, the single result, or a tuple.
    pub fn call_result(&self) -> Type {
        match self.results.as_slice() {
            [single] => single.clone(),
            many => Type::Tuple(many.to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub sig: FuncType,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InterfaceType {
    pub methods: Vec<Method>,
    /// Embedded interfaces, resolved through [`TypeInfo::named`] on lookup.
    pub embeds: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Basic(Basic),
    /// A declared type. `package` is empty for universe types (`error`).
    Named { package: String, name: String },
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(Option<u64>, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Func(FuncType),
    Struct(Vec<StructField>),
    Interface(InterfaceType),
    /// Results of a call with zero or several values.
    Tuple(Vec<Type>),
}

impl Type {
    pub fn error() -> Type {
        Type::Named {
            package: String::new(),
            name: "error".into(),
        }
    }

    pub fn named(package: &str, name: &str) -> Type {
        Type::Named {
            package: package.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Named { package, name } if package.is_empty() && name == "error")
    }

    pub fn as_basic(&self) -> Option<Basic> {
        match self {
            Type::Basic(b) => Some(*b),
            _ => None,
        }
    }

    /// Qualified key of a named type, as used by [`TypeInfo::named`].
    pub fn named_key(&self) -> Option<String> {
        match self {
            Type::Named { .. } => Some(self.to_string()),
            _ => None,
        }
    }

    /// Type of a variable initialized from a value of this type.
    pub fn defaulted(self) -> Type {
        match self {
            Type::Basic(b) => Type::Basic(b.default_type()),
            other => other,
        }
    }

    /// Result type of a binary arithmetic operation on `self` and `other`.
    pub fn unify(self, other: Type) -> Type {
        match (&self, &other) {
            (Type::Basic(a), Type::Basic(b)) if a.is_untyped() && b.is_untyped() => {
                if b.untyped_rank() > a.untyped_rank() {
                    other
                } else {
                    self
                }
            }
            (Type::Basic(a), _) if a.is_untyped() => other,
            _ => self,
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match param {
                Type::Slice(elem) if self.variadic && i + 1 == self.params.len() => {
                    write!(f, "...{}", elem)?
                }
                _ => write!(f, "{}", param)?,
            }
        }
        write!(f, ")")?;
        match self.results.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " {}", single),
            many => write!(f, " {}", Type::Tuple(many.to_vec())),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(b) => write!(f, "{}", b.name()),
            Type::Named { package, name } if package.is_empty() => write!(f, "{}", name),
            Type::Named { package, name } => write!(f, "{}.{}", package, name),
            Type::Pointer(elem) => write!(f, "*{}", elem),
            Type::Slice(elem) => write!(f, "[]{}", elem),
            Type::Array(Some(n), elem) => write!(f, "[{}]{}", n, elem),
            Type::Array(None, elem) => write!(f, "[...]{}", elem),
            Type::Map(key, value) => write!(f, "map[{}]{}", key, value),
            Type::Func(sig) => write!(f, "{}", sig),
            Type::Struct(fields) => {
                write!(f, "struct{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    if field.embedded {
                        write!(f, "{}", field.ty)?;
                    } else {
                        write!(f, "{} {}", field.name, field.ty)?;
                    }
                }
                write!(f, "}}")
            }
            Type::Interface(iface) => {
                write!(f, "interface{{")?;
                let embeds = iface.embeds.iter().map(|t| t.to_string());
                let methods = iface.methods.iter().map(|m| {
                    let sig = m.sig.to_string();
                    format!("{}{}", m.name, sig.trim_start_matches("func"))
                });
                let elems: Vec<String> = embeds.chain(methods).collect();
                write!(f, "{}}}", elems.join("; "))
            }
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Underlying type and method set of a declared type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NamedInfo {
    pub underlying: Option<Type>,
    pub methods: BTreeMap<String, FuncType>,
}

/// What an identifier refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    /// A variable. `ty` is `None` when its initializer could not be typed.
    Var { ty: Option<Type> },
    Const { ty: Type },
    TypeName { ty: Type },
    Func { ty: FuncType },
    Package { path: String },
    Builtin { name: String },
    Nil,
}

/// A non-fatal complaint of the type checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDiagnostic {
    pub file: String,
    pub span: Span,
    pub message: String,
}

/// Everything one type-checking pass learned about a unit.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    /// Types of expressions and type expressions, by node.
    pub types: HashMap<NodeId, Type>,
    /// Objects denoted by identifier expressions.
    pub uses: HashMap<NodeId, Object>,
    pub diagnostics: Vec<TypeDiagnostic>,
    /// Declared types, keyed by their qualified name (`main.T`, `os.File`).
    pub named: HashMap<String, NamedInfo>,
}

impl TypeInfo {
    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id)
    }

    /// Follows named types down to their underlying type.
    pub fn underlying<'a>(&'a self, ty: &'a Type) -> Option<&'a Type> {
        let mut current = ty;
        // Named chains are short; the bound keeps a cyclic declaration from hanging.
        for _ in 0..16 {
            match current {
                Type::Named { .. } => {
                    let key = current.to_string();
                    current = self.named.get(&key)?.underlying.as_ref()?;
                }
                other => return Some(other),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_like_go() {
        let file = Type::Pointer(Box::new(Type::named("os", "File")));
        assert_eq!(file.to_string(), "*os.File");
        let map = Type::Map(
            Box::new(Type::Basic(Basic::String)),
            Box::new(Type::Slice(Box::new(Type::Basic(Basic::Uint8)))),
        );
        assert_eq!(map.to_string(), "map[string][]uint8");
        let tuple = Type::Tuple(vec![Type::Basic(Basic::Int), Type::error()]);
        assert_eq!(tuple.to_string(), "(int, error)");
        let sig = FuncType {
            params: vec![Type::Slice(Box::new(Type::Basic(Basic::String)))],
            results: vec![Type::error()],
            variadic: true,
        };
        assert_eq!(sig.to_string(), "func(...string) error");
    }

    #[test]
    fn untyped_constants_default() {
        assert_eq!(Type::Basic(Basic::UntypedRune).defaulted(), Type::Basic(Basic::Int32));
        let mixed = Type::Basic(Basic::UntypedInt).unify(Type::Basic(Basic::UntypedFloat));
        assert_eq!(mixed, Type::Basic(Basic::UntypedFloat));
    }

    #[test]
    fn underlying_follows_named_chain() {
        let mut info = TypeInfo::default();
        info.named.insert(
            "main.A".into(),
            NamedInfo {
                underlying: Some(Type::named("main", "B")),
                methods: BTreeMap::new(),
            },
        );
        info.named.insert(
            "main.B".into(),
            NamedInfo {
                underlying: Some(Type::Basic(Basic::Bool)),
                methods: BTreeMap::new(),
            },
        );
        let a = Type::named("main", "A");
        assert_eq!(info.underlying(&a), Some(&Type::Basic(Basic::Bool)));
    }
}
