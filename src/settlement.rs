


use std::sync::Arc;
use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use log::{info, error};
use crate::constants::*;
use crate::error::EngineError;
use crate::misc::{idempotency_token, now_naive};
use crate::storage::{SettlementStore, SettlementCommit, RetryFailure};
use crate::adapters::payment::PaymentBackend;
use crate::adapters::notifier::Notifier;
use crate::models::users_earnings::UnpaidEarning;
use crate::retry::backoff_delay;


#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SettlementReport{
    pub run_id: String,
    pub payees_processed: usize,
    pub paid_groups: usize,
    pub failed_groups: usize,
    pub total_paid: i64,
}

/*
    the periodic batch pass: all currently unpaid earnings grouped by
    payee, one backend call per payee, one atomic local commit per group,
    failures land in the retry ledger and never surface to end users
*/
pub struct PaymentSettlementScheduler{
    store: Arc<dyn SettlementStore>,
    backend: Arc<dyn PaymentBackend>,
    notifier: Arc<dyn Notifier>,
}

impl PaymentSettlementScheduler{

    pub fn new(store: Arc<dyn SettlementStore>, backend: Arc<dyn PaymentBackend>,
        notifier: Arc<dyn Notifier>) -> Self{
        PaymentSettlementScheduler{ store, backend, notifier }
    }

    pub async fn run_once(&self) -> Result<SettlementReport, EngineError>{

        let run_id = uuid::Uuid::new_v4().to_string();

        let unpaid = self.store.all_unpaid_earnings().await?;

        /* ordered grouping keeps payee processing deterministic */
        let mut payee_groups = BTreeMap::<i32, Vec<UnpaidEarning>>::new();
        for earning in unpaid{
            payee_groups.entry(earning.payee_user_id).or_default().push(earning);
        }

        let mut report = SettlementReport{
            run_id: run_id.clone(),
            payees_processed: 0,
            paid_groups: 0,
            failed_groups: 0,
            total_paid: 0,
        };

        /*
            payees run strictly one after another, two concurrent calls
            for the same payee could race their paid commits
        */
        for (payee_user_id, group) in payee_groups{

            report.payees_processed += 1;

            let earning_ids = group.iter().map(|e| e.earning_id).collect::<Vec<i32>>();
            let group_amount = group.iter().map(|e| e.amount).sum::<i64>();
            let payee_wallet = group[0].payee_wallet.clone();

            /* fetched up front, a success resolves it inside the same commit */
            let open_retry = self.store.find_open_retry(payee_user_id, PAYMENT_KIND_REFERRAL).await?;

            let idem_key = idempotency_token(payee_user_id, &earning_ids);
            match self.backend.send(&payee_wallet, group_amount, &idem_key).await{

                Ok(receipt) => {

                    let committed = self.store.settle_payee_group(SettlementCommit{
                        payee_user_id,
                        payment_kind: PAYMENT_KIND_REFERRAL.to_string(),
                        earning_ids,
                        amount: group_amount,
                        settlement_ref: receipt.settlement_ref.clone(),
                        retry_id: open_retry.map(|r| r.id),
                    }).await;

                    match committed{
                        Ok(_) => {
                            self.notifier.notify(payee_user_id, PAYOUT_SENT).await;
                            report.paid_groups += 1;
                            report.total_paid += group_amount;
                            info!("💸 payee group settled | run: {} | payee: {} | amount: {} | settlement ref: {}",
                                run_id, payee_user_id, group_amount, receipt.settlement_ref);
                        },
                        Err(e) => {
                            /*
                                local commit lost after a successful backend call:
                                the group stays fully unpaid and the next pass
                                replays it with the same idempotency token
                            */
                            error!("😖 paid commit lost, group will be replayed | run: {} | payee: {} | reason: {}",
                                run_id, payee_user_id, e);
                            e.write().await;
                            report.failed_groups += 1;
                        }
                    }

                },

                Err(backend_err) => {

                    let fail_reason = backend_err.msg.clone();
                    backend_err.write().await;

                    /* a fresh record schedules the first backoff step, an open one keeps its count */
                    let attempt_count = open_retry.as_ref().map(|r| r.attempt_count).unwrap_or(0);
                    let next_retry_at = now_naive() + backoff_delay(attempt_count);
                    self.store.upsert_retry_failure(RetryFailure{
                        payee_user_id,
                        payment_kind: PAYMENT_KIND_REFERRAL.to_string(),
                        amount: group_amount,
                        earning_ids,
                        fail_reason,
                        next_retry_at,
                    }).await?;

                    report.failed_groups += 1;

                }

            }

        }

        info!("✅ settlement pass finished | run: {} | payees: {} | paid: {} | failed: {}",
            run_id, report.payees_processed, report.paid_groups, report.failed_groups);

        Ok(report)

    }

}
