


/*
    the relational store is the single source of truth, every composite
    operation exposed here is all or nothing so a crash mid commit leaves
    a payee group entirely unpaid and unresolved, safe to reprocess

    services depend on this seam instead of a concrete connection so unit
    tests can run against the deterministic in memory fakes in testkit
*/

use async_trait::async_trait;
use crate::error::EngineError;
use crate::models::users::{UserData, ChainAscendant};
use crate::models::referral_edges::{NewReferralEdge, ReferralEdgeData};
use crate::models::users_earnings::{NewEarning, EarningData, UnpaidEarning};
use crate::models::payout_retries::{RetryRecordData, RetryStats};

pub mod pg;

/* one successful backend call committed locally in a single transaction */
#[derive(Clone, Debug, PartialEq)]
pub struct SettlementCommit{
    pub payee_user_id: i32,
    pub payment_kind: String,
    pub earning_ids: Vec<i32>,
    pub amount: i64,
    pub settlement_ref: String,
    pub retry_id: Option<i32>,
}

/* one failed backend call, lands in the open retry row of (payee, kind) */
#[derive(Clone, Debug, PartialEq)]
pub struct RetryFailure{
    pub payee_user_id: i32,
    pub payment_kind: String,
    pub amount: i64,
    pub earning_ids: Vec<i32>,
    pub fail_reason: String,
    pub next_retry_at: chrono::NaiveDateTime,
}

#[async_trait]
pub trait SettlementStore: Send + Sync{

    async fn find_user_by_id(&self, user_id: i32) -> Result<UserData, EngineError>;

    async fn ascend_chain(&self, user_id: i32, depth: i32) -> Result<Vec<ChainAscendant>, EngineError>;

    /* atomic: either every new edge of the set commits or none do */
    async fn insert_edges(&self, new_edges: Vec<NewReferralEdge>) -> Result<usize, EngineError>;

    async fn edges_for_referral(&self, referral_user_id: i32) -> Result<Vec<ReferralEdgeData>, EngineError>;

    /*
        idempotent against deposit confirmation replay: returns None and
        touches nothing when an earning already exists for the edge and
        deposit pair, otherwise inserts it and bumps the edge cumulative
        counter in the same transaction
    */
    async fn insert_earning_if_absent(&self, new_earning: NewEarning) -> Result<Option<EarningData>, EngineError>;

    async fn all_unpaid_earnings(&self) -> Result<Vec<UnpaidEarning>, EngineError>;

    async fn unpaid_of(&self, earning_ids: &[i32]) -> Result<Vec<UnpaidEarning>, EngineError>;

    async fn settle_payee_group(&self, commit: SettlementCommit) -> Result<(), EngineError>;

    async fn find_open_retry(&self, payee_user_id: i32, kind: &str) -> Result<Option<RetryRecordData>, EngineError>;

    async fn upsert_retry_failure(&self, failure: RetryFailure) -> Result<RetryRecordData, EngineError>;

    async fn due_retries(&self, now: chrono::NaiveDateTime) -> Result<Vec<RetryRecordData>, EngineError>;

    async fn retry_by_id(&self, retry_id: i32) -> Result<RetryRecordData, EngineError>;

    async fn record_retry_attempt(&self, retry_id: i32, attempted_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>;

    async fn reschedule_retry(&self, retry_id: i32, fail_reason: &str, next_attempt_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>;

    async fn dead_letter_retry(&self, retry_id: i32, fail_reason: &str) -> Result<RetryRecordData, EngineError>;

    /* every earning of the record got paid by another pass, nothing left to send */
    async fn resolve_retry_without_payment(&self, retry_id: i32) -> Result<RetryRecordData, EngineError>;

    async fn reopen_dead_letter(&self, retry_id: i32, reopened_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>;

    async fn dead_letters(&self) -> Result<Vec<RetryRecordData>, EngineError>;

    async fn retry_stats(&self) -> Result<RetryStats, EngineError>;

}
