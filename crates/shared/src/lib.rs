pub mod dashboard;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod protocol;
pub mod query;
