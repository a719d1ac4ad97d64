pub use crate::errors::{CheckflowError, ErrorCategory, ErrorKind};
pub use crate::expand::{expand_unit, Driver, Snapshot, Summary};
pub use crate::unit::{SourceInput, Unit};

pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod expand;
pub mod names;
pub mod rewrite;
pub mod syntax;
pub mod types;
pub mod unit;

/// Expands a single marked source against the builtin stubs and returns the
/// generated host text.
pub fn expand_source(name: &str, text: &str) -> Result<String, CheckflowError> {
    let mut unit = Unit::from_source(name, text)?;
    let mut checker = types::Checker::with_builtin_stubs()?;
    expand_unit(&mut unit, &mut checker)?;
    Ok(unit.marked_files().map(|f| f.render()).collect())
}
