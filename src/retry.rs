


use std::sync::Arc;
use serde::{Serialize, Deserialize};
use log::{info, error};
use crate::constants::*;
use crate::error::{EngineError, ErrorKind, RetryStateError};
use crate::misc::{idempotency_token, now_naive};
use crate::storage::{SettlementStore, SettlementCommit};
use crate::adapters::payment::PaymentBackend;
use crate::adapters::notifier::{Notifier, AlertChannel};
use crate::models::payout_retries::{RetryRecordData, RetryStats};


/*
    backoff is data, not a sleeping task: every failure stamps the next
    wakeup on the record and the periodic sweep polls for due rows, so
    the schedule survives process restarts
*/
pub fn backoff_delay(attempt_count: i32) -> chrono::Duration{

    let step = attempt_count.clamp(0, 16) as u32;
    chrono::Duration::minutes(RETRY_BASE_DELAY_MINS * 2_i64.pow(step))

}

#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome{
    Resolved,
    Reconciled, /* every earning was already paid elsewhere, no call made */
    Rescheduled,
    DeadLettered,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SweepReport{
    pub run_id: String,
    pub swept: usize,
    pub resolved: usize,
    pub rescheduled: usize,
    pub dead_lettered: usize,
}

pub struct RetryLedger{
    store: Arc<dyn SettlementStore>,
    backend: Arc<dyn PaymentBackend>,
    notifier: Arc<dyn Notifier>,
    alerts: Arc<dyn AlertChannel>,
}

impl RetryLedger{

    pub fn new(store: Arc<dyn SettlementStore>, backend: Arc<dyn PaymentBackend>,
        notifier: Arc<dyn Notifier>, alerts: Arc<dyn AlertChannel>) -> Self{
        RetryLedger{ store, backend, notifier, alerts }
    }

    pub async fn sweep_once(&self) -> Result<SweepReport, EngineError>{

        let run_id = uuid::Uuid::new_v4().to_string();
        let due = self.store.due_retries(now_naive()).await?;

        let mut report = SweepReport{
            run_id: run_id.clone(),
            swept: 0,
            resolved: 0,
            rescheduled: 0,
            dead_lettered: 0,
        };

        for record in due{

            report.swept += 1;
            match self.attempt_once(record.id).await{
                Ok(AttemptOutcome::Resolved) | Ok(AttemptOutcome::Reconciled) => report.resolved += 1,
                Ok(AttemptOutcome::Rescheduled) => report.rescheduled += 1,
                Ok(AttemptOutcome::DeadLettered) => report.dead_lettered += 1,
                Err(e) => {
                    /* a broken store row must not kill the whole sweep */
                    error!("😖 retry attempt skipped | run: {} | record: {} | reason: {}", run_id, record.id, e);
                    e.write().await;
                }
            }

        }

        info!("✅ retry sweep finished | run: {} | swept: {} | resolved: {} | rescheduled: {} | dead lettered: {}",
            run_id, report.swept, report.resolved, report.rescheduled, report.dead_lettered);

        Ok(report)

    }

    /*
        one settlement attempt for one retry record, shared between the
        automatic sweep and the operator triggered replay
    */
    async fn attempt_once(&self, retry_id: i32) -> Result<AttemptOutcome, EngineError>{

        let record = self.store.record_retry_attempt(retry_id, now_naive()).await?;

        /* only the still unpaid subset may be sent, paid rows never pay twice */
        let unpaid = self.store.unpaid_of(&record.earning_ids).await?;
        if unpaid.is_empty(){
            self.store.resolve_retry_without_payment(record.id).await?;
            info!("🧾 retry record reconciled, all earnings already paid | record: {}", record.id);
            return Ok(AttemptOutcome::Reconciled);
        }

        let payee = self.store.find_user_by_id(record.payee_user_id).await?;
        let earning_ids = unpaid.iter().map(|e| e.earning_id).collect::<Vec<i32>>();
        let group_amount = unpaid.iter().map(|e| e.amount).sum::<i64>();

        let idem_key = idempotency_token(record.payee_user_id, &earning_ids);
        match self.backend.send(&payee.wallet_address, group_amount, &idem_key).await{

            Ok(receipt) => {

                self.store.settle_payee_group(SettlementCommit{
                    payee_user_id: record.payee_user_id,
                    payment_kind: record.payment_kind.clone(),
                    earning_ids,
                    amount: group_amount,
                    settlement_ref: receipt.settlement_ref.clone(),
                    retry_id: Some(record.id),
                }).await?;

                self.notifier.notify(record.payee_user_id, PAYOUT_SENT).await;
                info!("💸 retried payout settled | record: {} | payee: {} | amount: {} | settlement ref: {}",
                    record.id, record.payee_user_id, group_amount, receipt.settlement_ref);

                Ok(AttemptOutcome::Resolved)

            },

            Err(backend_err) => {

                let fail_reason = backend_err.msg.clone();
                backend_err.write().await;

                if record.attempt_count >= record.max_attempts{

                    self.store.dead_letter_retry(record.id, &fail_reason).await?;

                    let exhausted = EngineError::new(*RETRY_STATE_ERROR_CODE, RETRIES_EXHAUSTED.to_string(),
                        ErrorKind::Retry(RetryStateError::ExhaustedRetries), "RetryLedger::attempt_once");
                    exhausted.write().await;
                    self.alerts.alert_critical(DEAD_LETTER_ALERT_TITLE,
                        &format!("record: {} | payee: {} | amount: {} | attempts: {} | last error: {}",
                            record.id, record.payee_user_id, record.amount, record.attempt_count, fail_reason)).await;

                    Ok(AttemptOutcome::DeadLettered)

                } else{

                    let next_retry_at = now_naive() + backoff_delay(record.attempt_count);
                    self.store.reschedule_retry(record.id, &fail_reason, next_retry_at).await?;

                    Ok(AttemptOutcome::Rescheduled)

                }

            }

        }

    }

    pub async fn list_dead_letter(&self) -> Result<Vec<RetryRecordData>, EngineError>{
        self.store.dead_letters().await
    }

    /*
        operator triggered replay: clears the dead letter flag, resets the
        attempt budget and immediately runs one attempt, a deliberate
        bypass of the backoff schedule rather than a new kind of retry
    */
    pub async fn retry_dead_letter_item(&self, retry_id: i32) -> Result<RetryRecordData, EngineError>{

        let record = self.store.retry_by_id(retry_id).await?;

        if record.is_resolved{
            return Err(
                EngineError::new(*RETRY_STATE_ERROR_CODE, RETRY_ALREADY_RESOLVED.to_string(),
                    ErrorKind::Retry(RetryStateError::AlreadyResolved), "RetryLedger::retry_dead_letter_item")
            );
        }
        if !record.in_dead_letter{
            return Err(
                EngineError::new(*RETRY_STATE_ERROR_CODE, RETRY_NOT_DEAD_LETTERED.to_string(),
                    ErrorKind::Retry(RetryStateError::NotDeadLettered), "RetryLedger::retry_dead_letter_item")
            );
        }

        self.store.reopen_dead_letter(retry_id, now_naive()).await?;
        info!("🛠 dead letter replay requested | record: {}", retry_id);

        self.attempt_once(retry_id).await?;
        self.store.retry_by_id(retry_id).await

    }

    /* operator dashboard surface */
    pub async fn stats(&self) -> Result<RetryStats, EngineError>{
        self.store.retry_stats().await
    }

}
