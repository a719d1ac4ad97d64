//! Type information for the expansion engine.
//!
//! The engine only needs a handful of facts: the type of each checked call,
//! the result types of the enclosing function, and enough of the declared
//! types to build zero values. [`TypeChecker`] is the seam; [`Checker`] is
//! the built-in implementation over package stubs.

pub mod checker;
pub mod convert;
pub mod model;
pub mod naming;
pub mod stubs;

pub use checker::{Checker, TypeChecker};
pub use model::{Basic, FuncType, NamedInfo, Object, Type, TypeDiagnostic, TypeInfo};
pub use naming::type_to_var;
pub use stubs::StubSet;
