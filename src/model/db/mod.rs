//! DB-compatible (e.g. de/serialisable) records.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Counters are plain integers that only the vote ledger increments.

mod candidate;
pub use candidate::Candidate;

mod election;
pub use election::{Election, Inactive};

mod vote;
pub use vote::Vote;

mod voter;
pub use voter::Voter;
