


use std::sync::Arc;
use serde::{Serialize, Deserialize};
use log::info;
use crate::constants::*;
use crate::error::EngineError;
use crate::storage::SettlementStore;
use crate::adapters::notifier::Notifier;
use crate::commission::commission_for_level;
use crate::models::users_earnings::NewEarning;


#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordedEarnings{
    pub created_count: usize,
    pub total_amount: i64,
}

/* turns one confirmed deposit into unpaid earnings for the depositor's ascendants */
pub struct EarningLedger{
    store: Arc<dyn SettlementStore>,
    notifier: Arc<dyn Notifier>,
}

impl EarningLedger{

    pub fn new(store: Arc<dyn SettlementStore>, notifier: Arc<dyn Notifier>) -> Self{
        EarningLedger{ store, notifier }
    }

    /*
        safe to replay for the same deposit: an earning that already exists
        for an (edge, deposit) pair is skipped, so the deposit confirmation
        pipeline may retry the whole call after a crash
    */
    pub async fn record_earnings(&self, depositor_user_id: i32, deposit_amount: i64,
        source_deposit_id: i64) -> Result<RecordedEarnings, EngineError>{

        let edges = self.store.edges_for_referral(depositor_user_id).await?;

        let mut created_count = 0;
        let mut total_amount = 0;
        for edge in edges{

            let commission = commission_for_level(deposit_amount, edge.level);
            if commission <= 0{
                continue;
            }

            let created = self.store.insert_earning_if_absent(NewEarning{
                referral_edge_id: edge.id,
                amount: commission,
                source_deposit_id,
                is_paid: false,
            }).await?;

            if let Some(earning) = created{
                created_count += 1;
                total_amount += earning.amount;
                self.notifier.notify(edge.referrer_id, EARNING_RECORDED).await;
            }

        }

        info!("🪙 earnings recorded | depositor: {} | deposit: {} | created: {} | total: {}",
            depositor_user_id, source_deposit_id, created_count, total_amount);

        Ok(
            RecordedEarnings{
                created_count,
                total_amount,
            }
        )

    }

}
