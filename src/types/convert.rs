//! Conversion of syntactic type expressions into [`Type`]s.

use super::model::{Basic, FuncType, InterfaceType, Method, StructField, Type};
use crate::syntax::{ExprKind, LitKind, Signature, TypeExpr, TypeKind};

/// Resolves the type names met inside a type expression.
pub trait NameResolver {
    fn resolve_name(&mut self, package: Option<&str>, name: &str) -> Option<Type>;
}

/// Names predeclared in every scope.
pub fn universe_type(name: &str) -> Option<Type> {
    match name {
        "error" => Some(Type::error()),
        "any" => Some(Type::Interface(InterfaceType::default())),
        _ => Basic::from_name(name).map(Type::Basic),
    }
}

pub fn convert_type(te: &TypeExpr, names: &mut dyn NameResolver) -> Option<Type> {
    Some(match &te.kind {
        TypeKind::Name { package, name } => names.resolve_name(package.as_deref(), name)?,
        TypeKind::Pointer(elem) => Type::Pointer(Box::new(convert_type(elem, names)?)),
        TypeKind::Slice(elem) => Type::Slice(Box::new(convert_type(elem, names)?)),
        TypeKind::Array { len, elem } => {
            let len = len.as_ref().and_then(|len| match &len.kind {
                ExprKind::Lit(LitKind::Int, text) => text.replace('_', "").parse().ok(),
                _ => None,
            });
            Type::Array(len, Box::new(convert_type(elem, names)?))
        }
        TypeKind::Map { key, value } => Type::Map(
            Box::new(convert_type(key, names)?),
            Box::new(convert_type(value, names)?),
        ),
        TypeKind::Func(sig) => Type::Func(convert_signature(sig, names)?),
        TypeKind::Struct(fields) => {
            let mut out = Vec::new();
            for field in fields {
                let ty = convert_type(&field.ty, names)?;
                if field.names.is_empty() {
                    out.push(StructField {
                        name: embedded_name(&field.ty),
                        ty: ty.clone(),
                        embedded: true,
                    });
                }
                for name in &field.names {
                    out.push(StructField {
                        name: name.name.clone(),
                        ty: ty.clone(),
                        embedded: false,
                    });
                }
            }
            Type::Struct(out)
        }
        TypeKind::Interface(elems) => {
            let mut iface = InterfaceType::default();
            for elem in elems {
                match (&elem.ty.kind, elem.names.first()) {
                    (TypeKind::Func(sig), Some(name)) => iface.methods.push(Method {
                        name: name.name.clone(),
                        sig: convert_signature(sig, names)?,
                    }),
                    _ => iface.embeds.push(convert_type(&elem.ty, names)?),
                }
            }
            Type::Interface(iface)
        }
    })
}

pub fn convert_signature(sig: &Signature, names: &mut dyn NameResolver) -> Option<FuncType> {
    let mut params = Vec::new();
    let mut variadic = false;
    for field in &sig.params {
        let mut ty = convert_type(&field.ty, names)?;
        if field.variadic {
            variadic = true;
            ty = Type::Slice(Box::new(ty));
        }
        for _ in 0..field.names.len().max(1) {
            params.push(ty.clone());
        }
    }
    let mut results = Vec::new();
    for ty in sig.result_slots() {
        results.push(convert_type(ty, names)?);
    }
    Some(FuncType {
        params,
        results,
        variadic,
    })
}

/// Field name of an embedded field: the type name without pointer or package.
pub fn embedded_name(ty: &TypeExpr) -> String {
    match &ty.kind {
        TypeKind::Pointer(elem) => embedded_name(elem),
        TypeKind::Name { name, .. } => name.clone(),
        _ => String::new(),
    }
}
