//! API-friendly request and response shapes.

pub mod auth;
pub mod eligibility;
pub mod election;
pub mod id;
pub mod receipt;
pub mod reconcile;
pub mod results;
pub mod tally;
