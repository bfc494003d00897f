//! The allocation core: a deterministic, rule-driven matching of ranked
//! student preferences onto capacity-constrained subjects, plus the Postgres
//! glue that feeds and records a run.

pub mod eligibility;
pub mod engine;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod store;
pub mod tiebreak;
