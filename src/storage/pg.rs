


use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use crate::constants::*;
use crate::error::EngineError;
use crate::models::users::{User, UserData, ChainAscendant};
use crate::models::referral_edges::{ReferralEdge, NewReferralEdge, ReferralEdgeData};
use crate::models::users_earnings::{Earning, NewEarning, EarningData, UnpaidEarning};
use crate::models::payout_retries::{PayoutRetry, NewPayoutRetry, RetryRecordData, RetryStats};
use crate::models::payout_transactions::PayoutTransaction;
use super::{SettlementStore, SettlementCommit, RetryFailure};


pub struct PgStore{
    pool: Pool<ConnectionManager<PgConnection>>
}

impl PgStore{

    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self{
        PgStore{ pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, EngineError>{
        self.pool
            .get()
            .map_err(|e| {
                let msg = e.to_string();
                EngineError::new(*STORAGE_IO_ERROR_CODE, msg, e.into(), "PgStore::conn")
            })
    }

}

#[async_trait]
impl SettlementStore for PgStore{

    async fn find_user_by_id(&self, user_id: i32) -> Result<UserData, EngineError>{
        let mut pooled = self.conn()?;
        User::find_by_id(user_id, &mut pooled)
    }

    async fn ascend_chain(&self, user_id: i32, depth: i32) -> Result<Vec<ChainAscendant>, EngineError>{
        let mut pooled = self.conn()?;
        User::ascend_chain(user_id, depth, &mut pooled)
    }

    async fn insert_edges(&self, new_edges: Vec<NewReferralEdge>) -> Result<usize, EngineError>{
        let mut pooled = self.conn()?;
        pooled.transaction::<_, EngineError, _>(|connection| {
            ReferralEdge::insert_bulk(&new_edges, connection)
        })
    }

    async fn edges_for_referral(&self, referral_user_id: i32) -> Result<Vec<ReferralEdgeData>, EngineError>{
        let mut pooled = self.conn()?;
        ReferralEdge::for_referral(referral_user_id, &mut pooled)
    }

    async fn insert_earning_if_absent(&self, new_earning: NewEarning) -> Result<Option<EarningData>, EngineError>{
        let mut pooled = self.conn()?;
        pooled.transaction::<_, EngineError, _>(|connection| {

            let existing = Earning::find_for(new_earning.referral_edge_id, new_earning.source_deposit_id, connection)?;
            if existing.is_some(){
                return Ok(None); /* deposit confirmation replay, nothing to do */
            }

            let edge_id = new_earning.referral_edge_id;
            let earning_amount = new_earning.amount;
            let created = Earning::insert(new_earning, connection)?;
            ReferralEdge::bump_cumulative(edge_id, earning_amount, connection)?;

            Ok(Some(created))
        })
    }

    async fn all_unpaid_earnings(&self) -> Result<Vec<UnpaidEarning>, EngineError>{
        let mut pooled = self.conn()?;
        Earning::all_unpaid(&mut pooled)
    }

    async fn unpaid_of(&self, earning_ids: &[i32]) -> Result<Vec<UnpaidEarning>, EngineError>{
        let mut pooled = self.conn()?;
        Earning::unpaid_of(earning_ids, &mut pooled)
    }

    async fn settle_payee_group(&self, commit: SettlementCommit) -> Result<(), EngineError>{
        let mut pooled = self.conn()?;
        pooled.transaction::<_, EngineError, _>(|connection| {

            Earning::mark_paid(&commit.earning_ids, &commit.settlement_ref, connection)?;
            PayoutTransaction::insert_confirmed(commit.payee_user_id, &commit.payment_kind,
                commit.amount, &commit.settlement_ref, connection)?;
            if let Some(retry_id) = commit.retry_id{
                PayoutRetry::resolve(retry_id, Some(&commit.settlement_ref), connection)?;
            }

            Ok(())
        })
    }

    async fn find_open_retry(&self, payee_user_id: i32, kind: &str) -> Result<Option<RetryRecordData>, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::find_open(payee_user_id, kind, &mut pooled)
    }

    async fn upsert_retry_failure(&self, failure: RetryFailure) -> Result<RetryRecordData, EngineError>{
        let mut pooled = self.conn()?;
        pooled.transaction::<_, EngineError, _>(|connection| {

            let open = PayoutRetry::find_open(failure.payee_user_id, &failure.payment_kind, connection)?;
            match open{
                Some(existing) => {
                    PayoutRetry::union_failure(existing.id, failure.amount, &failure.earning_ids,
                        &failure.fail_reason, failure.next_retry_at, connection)
                },
                None => {
                    PayoutRetry::insert(
                        NewPayoutRetry::first_failure(failure.payee_user_id, &failure.payment_kind,
                            failure.amount, failure.earning_ids.clone(), &failure.fail_reason,
                            failure.next_retry_at),
                        connection)
                }
            }
        })
    }

    async fn due_retries(&self, now: chrono::NaiveDateTime) -> Result<Vec<RetryRecordData>, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::due(now, &mut pooled)
    }

    async fn retry_by_id(&self, retry_id: i32) -> Result<RetryRecordData, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::by_id(retry_id, &mut pooled)
    }

    async fn record_retry_attempt(&self, retry_id: i32, attempted_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::record_attempt(retry_id, attempted_at, &mut pooled)
    }

    async fn reschedule_retry(&self, retry_id: i32, fail_reason: &str, next_attempt_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::reschedule(retry_id, fail_reason, next_attempt_at, &mut pooled)
    }

    async fn dead_letter_retry(&self, retry_id: i32, fail_reason: &str) -> Result<RetryRecordData, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::dead_letter(retry_id, fail_reason, &mut pooled)
    }

    async fn resolve_retry_without_payment(&self, retry_id: i32) -> Result<RetryRecordData, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::resolve(retry_id, None, &mut pooled)
    }

    async fn reopen_dead_letter(&self, retry_id: i32, reopened_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::reopen(retry_id, reopened_at, &mut pooled)
    }

    async fn dead_letters(&self) -> Result<Vec<RetryRecordData>, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::dead_letters(&mut pooled)
    }

    async fn retry_stats(&self) -> Result<RetryStats, EngineError>{
        let mut pooled = self.conn()?;
        PayoutRetry::stats(&mut pooled)
    }

}
