//! Declarations of external packages.
//!
//! A stub file is JSON keyed by import path:
//!
//! ```json
//! { "os": {
//!     "funcs": { "Open": "func(name string) (*File, error)" },
//!     "vars":  { "Args": "[]string" },
//!     "types": { "File": { "underlying": "struct {}",
//!                          "methods": { "Close": "func() error" } } } } }
//! ```
//!
//! Unqualified type names inside a package's entries refer to that package.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::convert::{convert_signature, convert_type, universe_type, NameResolver};
use super::model::{FuncType, NamedInfo, Object, Type};
use crate::errors::{unspanned, CheckflowError, ErrorKind, ErrorReporting, PhaseContext, SourceContext};
use crate::syntax::parser::parse_type;
use crate::syntax::{NodeIds, TypeExpr, TypeKind};

const STD_STUBS: &str = include_str!("std_stubs.json");

static BUILTIN: Lazy<Result<StubSet, String>> = Lazy::new(|| StubSet::parse(STD_STUBS, "<builtin>"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StubFile(pub BTreeMap<String, PackageStub>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageStub {
    #[serde(default)]
    pub funcs: BTreeMap<String, String>,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeStub>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeStub {
    pub underlying: String,
    #[serde(default)]
    pub methods: BTreeMap<String, String>,
}

/// Resolved members of one external package.
#[derive(Debug, Clone, Default)]
pub struct StubPackage {
    pub members: BTreeMap<String, Object>,
}

/// All known external packages.
#[derive(Debug, Clone, Default)]
pub struct StubSet {
    pub packages: BTreeMap<String, StubPackage>,
    /// Declared types of every stub package, keyed like [`super::TypeInfo::named`].
    pub named: BTreeMap<String, NamedInfo>,
}

impl StubSet {
    /// The embedded stubs for `errors`, `fmt`, `strconv`, `os`, `io` and `strings`.
    pub fn builtin() -> Result<StubSet, CheckflowError> {
        (*BUILTIN).clone().map_err(|message| invalid(message, "<builtin>"))
    }

    /// Loads a user stub file.
    pub fn from_json(text: &str, name: &str) -> Result<StubSet, CheckflowError> {
        StubSet::parse(text, name).map_err(|message| invalid(message, name))
    }

    /// Adds `other`, replacing members and types that are declared twice.
    pub fn merge(&mut self, other: StubSet) {
        for (path, package) in other.packages {
            self.packages
                .entry(path)
                .or_default()
                .members
                .extend(package.members);
        }
        self.named.extend(other.named);
    }

    pub fn package(&self, path: &str) -> Option<&StubPackage> {
        self.packages.get(path)
    }

    fn parse(text: &str, name: &str) -> Result<StubSet, String> {
        let file: StubFile = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let mut set = StubSet::default();
        for (path, stub) in &file.0 {
            let package = package_name(path);
            let mut loader = Loader {
                package: package.to_string(),
                ids: NodeIds::new(),
                file: name,
            };
            let mut members = BTreeMap::new();

            for (type_name, ty) in &stub.types {
                let underlying = loader.ty(&ty.underlying)?;
                let mut methods = BTreeMap::new();
                for (method, sig) in &ty.methods {
                    methods.insert(method.clone(), loader.func(sig)?);
                }
                let named = Type::named(package, type_name);
                set.named.insert(
                    named.to_string(),
                    NamedInfo {
                        underlying: Some(underlying),
                        methods,
                    },
                );
                members.insert(type_name.clone(), Object::TypeName { ty: named });
            }
            for (func, sig) in &stub.funcs {
                members.insert(func.clone(), Object::Func { ty: loader.func(sig)? });
            }
            for (var, ty) in &stub.vars {
                members.insert(var.clone(), Object::Var { ty: Some(loader.ty(ty)?) });
            }

            set.packages.insert(path.clone(), StubPackage { members });
        }
        Ok(set)
    }
}

/// Last element of an import path: `path/filepath` is `filepath`.
pub fn package_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn invalid(message: String, name: &str) -> CheckflowError {
    let ctx = PhaseContext::new(SourceContext::from_file(name, ""), "stubs");
    ctx.report(ErrorKind::InvalidStubs { message }, unspanned())
}

struct Loader<'a> {
    package: String,
    ids: NodeIds,
    file: &'a str,
}

impl Loader<'_> {
    fn parse(&mut self, text: &str) -> Result<TypeExpr, String> {
        let ctx = PhaseContext::new(SourceContext::from_file(self.file, text), "stubs");
        parse_type(text, &mut self.ids, &ctx).map_err(|e| format!("{}: {}", text, e))
    }

    fn ty(&mut self, text: &str) -> Result<Type, String> {
        let te = self.parse(text)?;
        convert_type(&te, self).ok_or_else(|| format!("cannot resolve type '{}'", text))
    }

    fn func(&mut self, text: &str) -> Result<FuncType, String> {
        let te = self.parse(text)?;
        let TypeKind::Func(sig) = &te.kind else {
            return Err(format!("'{}' is not a function type", text));
        };
        convert_signature(sig, self).ok_or_else(|| format!("cannot resolve '{}'", text))
    }
}

impl NameResolver for Loader<'_> {
    fn resolve_name(&mut self, package: Option<&str>, name: &str) -> Option<Type> {
        match package {
            Some(package) => Some(Type::named(package, name)),
            None => universe_type(name).or_else(|| Some(Type::named(&self.package, name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_stubs_load() {
        let stubs = StubSet::builtin().unwrap();
        let os = stubs.package("os").unwrap();
        let Some(Object::Func { ty }) = os.members.get("Open") else {
            panic!("os.Open missing");
        };
        assert_eq!(ty.to_string(), "func(string) (*os.File, error)");
        assert!(stubs.named["os.File"].methods.contains_key("Close"));
    }

    #[test]
    fn user_stubs_merge_over_builtin() {
        let mut stubs = StubSet::builtin().unwrap();
        let extra = StubSet::from_json(
            r#"{ "example.com/db": { "funcs": { "Connect": "func(dsn string) (*Conn, error)" },
                 "types": { "Conn": { "underlying": "struct {}" } } } }"#,
            "db.json",
        )
        .unwrap();
        stubs.merge(extra);
        let db = stubs.package("example.com/db").unwrap();
        assert!(db.members.contains_key("Connect"));
        assert!(stubs.named.contains_key("db.Conn"));
    }

    #[test]
    fn rejects_malformed_signatures() {
        let err = StubSet::from_json(r#"{ "x": { "funcs": { "F": "int" } } }"#, "x.json").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidStubs { .. }));
    }
}
