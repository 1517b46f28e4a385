pub mod config;
pub mod error;
pub mod escrow;
pub mod geo;
pub mod ledger;
pub mod models;
pub mod proof;
pub mod provision;
pub mod store;
