//! Sealtrack - package lifecycle tracking
//!
//! Packages move through a fixed set of shipment stages. Every transition is
//! appended to a per-package update log, and the package's current stage and
//! seal status are a projection of that log. Dashboards stay current by
//! re-fetching whenever the store reports an insert.

pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod model;
pub mod storage;
pub mod sync;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use error::{ErrorKind, LifecycleError};
pub use lifecycle::{LifecycleEngine, ManagerConsole};
