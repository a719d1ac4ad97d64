//! Expansion of `check` and `handle` markers.
//!
//! - [`collector`] binds marker positions to syntax nodes and detaches handlers
//! - [`engine`] expands the checks whose types are known
//! - [`handlers`] composes handler chains and default handlers
//! - [`driver`] alternates type checking and expansion until nothing is pending

pub mod collector;
pub mod driver;
pub mod engine;
pub mod handlers;

pub use collector::{CheckBinding, Collected, Handler, NamingScope, Ownership};
pub use driver::{Driver, Observer, Snapshot, Summary};

use crate::errors::CheckflowError;
use crate::types::TypeChecker;
use crate::unit::Unit;

/// Expands `unit` in place with `checker`, without observing iterations.
pub fn expand_unit(unit: &mut Unit, checker: &mut dyn TypeChecker) -> Result<Summary, CheckflowError> {
    Driver::new(checker).run(unit)
}
