

pub mod constants;
pub mod config;
pub mod error;
pub mod misc;
pub mod schema;
pub mod models;
pub mod storage;
pub mod cache;
pub mod commission;
pub mod referral;
pub mod ledger;
pub mod settlement;
pub mod retry;
pub mod adapters;

#[cfg(test)]
pub mod testkit;
