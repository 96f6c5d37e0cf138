//! Capacity-safe course enrollment with prerequisite gating.
//!
//! - [`prerequisites`]: the prerequisite DAG, cycle detection and one-hop
//!   satisfaction checks.
//! - [`eligibility`]: a pure evaluator producing a structured decision.
//! - [`ledger`]: the only writer; per-course critical sections and atomic
//!   sled commits keep `active seats <= capacity` under concurrency.
//! - [`statistics`]: per-student counts, read path only.

pub mod catalog;
pub mod config;
pub mod course;
pub mod eligibility;
pub mod enrollment;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod logging;
pub mod prerequisites;
pub mod statistics;
pub mod store;
pub mod types;
pub mod utils;

pub use error::{EnrollmentError, ErrorKind, Result};
pub use ledger::EnrollmentLedger;
