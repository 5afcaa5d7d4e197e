


/*
    deterministic in memory fakes for the engine seams, unit tests run
    the full service flows against these instead of live postgres and
    redis, semantics mirror the pg implementations
*/

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use async_trait::async_trait;
use crate::constants::*;
use crate::error::{EngineError, ErrorKind, StorageError, BackendError};
use crate::storage::{SettlementStore, SettlementCommit, RetryFailure};
use crate::cache::{ChainCache, chain_key};
use crate::adapters::payment::{PaymentBackend, PaymentReceipt};
use crate::adapters::notifier::{Notifier, AlertChannel};
use crate::misc::now_naive;
use crate::models::users::{UserData, ChainAscendant};
use crate::models::referral_edges::{NewReferralEdge, ReferralEdgeData};
use crate::models::users_earnings::{NewEarning, EarningData, UnpaidEarning};
use crate::models::payout_retries::{RetryRecordData, RetryStats};
use crate::models::payout_transactions::PayoutTransactionData;


#[derive(Default)]
struct MemState{
    users: HashMap<i32, UserData>,
    edges: Vec<ReferralEdgeData>,
    earnings: Vec<EarningData>,
    retries: Vec<RetryRecordData>,
    transactions: Vec<PayoutTransactionData>,
    next_edge_id: i32,
    next_earning_id: i32,
    next_retry_id: i32,
    next_tx_id: i32,
}

pub struct MemStore{
    state: Mutex<MemState>,
    settle_crash: AtomicBool,
    ascend_calls: AtomicUsize,
}

impl MemStore{

    pub fn new() -> Arc<Self>{
        Arc::new(
            MemStore{
                state: Mutex::new(MemState::default()),
                settle_crash: AtomicBool::new(false),
                ascend_calls: AtomicUsize::new(0),
            }
        )
    }

    pub fn add_user(&self, id: i32, username: &str, wallet: &str, referrer_id: Option<i32>){
        let mut state = self.state.lock().unwrap();
        state.users.insert(id, UserData{
            id,
            username: username.to_string(),
            wallet_address: wallet.to_string(),
            referrer_id,
        });
    }

    pub fn add_edge(&self, referrer_id: i32, referral_id: i32, level: i32) -> i32{
        let mut state = self.state.lock().unwrap();
        state.next_edge_id += 1;
        let edge_id = state.next_edge_id;
        state.edges.push(ReferralEdgeData{
            id: edge_id,
            referrer_id,
            referral_id,
            level,
            cumulative_earned: 0,
        });
        edge_id
    }

    /* seeds one unpaid earning on the (referrer, referral) edge */
    pub fn add_unpaid_earning(&self, referrer_id: i32, referral_id: i32, deposit_id: i64, amount: i64) -> i32{
        let mut state = self.state.lock().unwrap();
        let edge_id = state.edges
            .iter()
            .find(|e| e.referrer_id == referrer_id && e.referral_id == referral_id)
            .map(|e| e.id)
            .expect("no such edge seeded");
        state.next_earning_id += 1;
        let earning_id = state.next_earning_id;
        state.earnings.push(EarningData{
            id: earning_id,
            referral_edge_id: edge_id,
            amount,
            source_deposit_id: deposit_id,
            is_paid: false,
            settlement_ref: None,
        });
        earning_id
    }

    pub fn edge(&self, referrer_id: i32, referral_id: i32) -> Option<ReferralEdgeData>{
        let state = self.state.lock().unwrap();
        state.edges
            .iter()
            .find(|e| e.referrer_id == referrer_id && e.referral_id == referral_id)
            .cloned()
    }

    pub fn edges_all(&self) -> Vec<ReferralEdgeData>{
        self.state.lock().unwrap().edges.clone()
    }

    pub fn earnings_all(&self) -> Vec<EarningData>{
        self.state.lock().unwrap().earnings.clone()
    }

    pub fn earning_by_id(&self, earning_id: i32) -> Option<EarningData>{
        self.state.lock().unwrap().earnings.iter().find(|e| e.id == earning_id).cloned()
    }

    pub fn transactions_all(&self) -> Vec<PayoutTransactionData>{
        self.state.lock().unwrap().transactions.clone()
    }

    pub fn retries_all(&self) -> Vec<RetryRecordData>{
        self.state.lock().unwrap().retries.clone()
    }

    pub fn open_retry_for(&self, payee: i32, kind: &str) -> Option<RetryRecordData>{
        self.state.lock().unwrap().retries
            .iter()
            .find(|r| r.payee_user_id == payee && r.payment_kind == kind && !r.is_resolved && !r.in_dead_letter)
            .cloned()
    }

    pub fn retry_by_id_sync(&self, retry_id: i32) -> RetryRecordData{
        self.state.lock().unwrap().retries
            .iter()
            .find(|r| r.id == retry_id)
            .cloned()
            .expect("no such retry record")
    }

    pub fn force_due(&self, retry_id: i32){
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.retries.iter_mut().find(|r| r.id == retry_id){
            if record.next_retry_at.is_some(){
                record.next_retry_at = Some(now_naive() - chrono::Duration::seconds(1));
            }
        }
    }

    pub fn mark_paid_directly(&self, earning_id: i32, settlement_ref: &str){
        let mut state = self.state.lock().unwrap();
        if let Some(earning) = state.earnings.iter_mut().find(|e| e.id == earning_id){
            earning.is_paid = true;
            earning.settlement_ref = Some(settlement_ref.to_string());
        }
    }

    pub fn dead_letter_directly(&self, retry_id: i32){
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.retries.iter_mut().find(|r| r.id == retry_id){
            record.in_dead_letter = true;
            record.next_retry_at = None;
        }
    }

    /* the next settle_payee_group call dies before committing anything */
    pub fn arm_settle_crash(&self){
        self.settle_crash.store(true, Ordering::SeqCst);
    }

    pub fn ascend_calls(&self) -> usize{
        self.ascend_calls.load(Ordering::SeqCst)
    }

    fn not_found(method_name: &str) -> EngineError{
        EngineError::new(*STORAGE_IO_ERROR_CODE, USER_NOT_FOUND.to_string(),
            ErrorKind::Storage(StorageError::NotFound), method_name)
    }

    fn unpaid_join(state: &MemState, earning_ids: Option<&[i32]>) -> Vec<UnpaidEarning>{
        state.earnings
            .iter()
            .filter(|e| !e.is_paid)
            .filter(|e| earning_ids.map(|ids| ids.contains(&e.id)).unwrap_or(true))
            .filter_map(|e| {
                let edge = state.edges.iter().find(|edge| edge.id == e.referral_edge_id)?;
                let payee = state.users.get(&edge.referrer_id)?;
                Some(UnpaidEarning{
                    earning_id: e.id,
                    referral_edge_id: e.referral_edge_id,
                    payee_user_id: edge.referrer_id,
                    payee_wallet: payee.wallet_address.clone(),
                    amount: e.amount,
                })
            })
            .collect::<Vec<UnpaidEarning>>()
    }

}

#[async_trait]
impl SettlementStore for MemStore{

    async fn find_user_by_id(&self, user_id: i32) -> Result<UserData, EngineError>{
        let state = self.state.lock().unwrap();
        state.users
            .get(&user_id)
            .cloned()
            .ok_or(Self::not_found("MemStore::find_user_by_id"))
    }

    async fn ascend_chain(&self, user_id: i32, depth: i32) -> Result<Vec<ChainAscendant>, EngineError>{

        self.ascend_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();

        /* bounded loop over referrer pointers, one snapshot under the lock */
        let mut chain = vec![];
        let mut cursor = user_id;
        for level in 1..=depth{
            let Some(referrer) = state.users.get(&cursor).and_then(|u| u.referrer_id) else{
                break;
            };
            chain.push(ChainAscendant{ user_id: referrer, level });
            cursor = referrer;
        }

        Ok(chain)

    }

    async fn insert_edges(&self, new_edges: Vec<NewReferralEdge>) -> Result<usize, EngineError>{
        let mut state = self.state.lock().unwrap();
        let mut inserted = 0;
        for new_edge in new_edges{
            let exists = state.edges
                .iter()
                .any(|e| e.referrer_id == new_edge.referrer_id && e.referral_id == new_edge.referral_id);
            if exists{
                continue;
            }
            state.next_edge_id += 1;
            let edge_id = state.next_edge_id;
            state.edges.push(ReferralEdgeData{
                id: edge_id,
                referrer_id: new_edge.referrer_id,
                referral_id: new_edge.referral_id,
                level: new_edge.level,
                cumulative_earned: 0,
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn edges_for_referral(&self, referral_user_id: i32) -> Result<Vec<ReferralEdgeData>, EngineError>{
        let state = self.state.lock().unwrap();
        let mut edges = state.edges
            .iter()
            .filter(|e| e.referral_id == referral_user_id)
            .cloned()
            .collect::<Vec<ReferralEdgeData>>();
        edges.sort_by_key(|e| e.level);
        Ok(edges)
    }

    async fn insert_earning_if_absent(&self, new_earning: NewEarning) -> Result<Option<EarningData>, EngineError>{
        let mut state = self.state.lock().unwrap();

        let exists = state.earnings
            .iter()
            .any(|e| e.referral_edge_id == new_earning.referral_edge_id
                && e.source_deposit_id == new_earning.source_deposit_id);
        if exists{
            return Ok(None);
        }

        state.next_earning_id += 1;
        let earning_id = state.next_earning_id;
        let created = EarningData{
            id: earning_id,
            referral_edge_id: new_earning.referral_edge_id,
            amount: new_earning.amount,
            source_deposit_id: new_earning.source_deposit_id,
            is_paid: false,
            settlement_ref: None,
        };
        state.earnings.push(created.clone());

        if let Some(edge) = state.edges.iter_mut().find(|e| e.id == new_earning.referral_edge_id){
            edge.cumulative_earned += new_earning.amount;
        }

        Ok(Some(created))
    }

    async fn all_unpaid_earnings(&self) -> Result<Vec<UnpaidEarning>, EngineError>{
        let state = self.state.lock().unwrap();
        Ok(Self::unpaid_join(&state, None))
    }

    async fn unpaid_of(&self, earning_ids: &[i32]) -> Result<Vec<UnpaidEarning>, EngineError>{
        let state = self.state.lock().unwrap();
        Ok(Self::unpaid_join(&state, Some(earning_ids)))
    }

    async fn settle_payee_group(&self, commit: SettlementCommit) -> Result<(), EngineError>{

        if self.settle_crash.swap(false, Ordering::SeqCst){
            return Err(
                EngineError::new(*STORAGE_IO_ERROR_CODE, "simulated crash before commit".to_string(),
                    ErrorKind::Storage(StorageError::Diesel(diesel::result::Error::RollbackTransaction)),
                    "MemStore::settle_payee_group")
            );
        }

        let mut state = self.state.lock().unwrap();

        for earning in state.earnings.iter_mut(){
            if commit.earning_ids.contains(&earning.id) && !earning.is_paid{
                earning.is_paid = true;
                earning.settlement_ref = Some(commit.settlement_ref.clone());
            }
        }

        state.next_tx_id += 1;
        let tx_id = state.next_tx_id;
        state.transactions.push(PayoutTransactionData{
            id: tx_id,
            payee_user_id: commit.payee_user_id,
            amount: commit.amount,
            payment_kind: commit.payment_kind.clone(),
            settlement_ref: commit.settlement_ref.clone(),
            status: TX_STATUS_CONFIRMED.to_string(),
        });

        if let Some(retry_id) = commit.retry_id{
            if let Some(record) = state.retries.iter_mut().find(|r| r.id == retry_id){
                record.is_resolved = true;
                record.settlement_ref = Some(commit.settlement_ref.clone());
                record.next_retry_at = None;
            }
        }

        Ok(())
    }

    async fn find_open_retry(&self, payee_user_id: i32, kind: &str) -> Result<Option<RetryRecordData>, EngineError>{
        Ok(self.open_retry_for(payee_user_id, kind))
    }

    async fn upsert_retry_failure(&self, failure: RetryFailure) -> Result<RetryRecordData, EngineError>{
        let mut state = self.state.lock().unwrap();

        let open_idx = state.retries
            .iter()
            .position(|r| r.payee_user_id == failure.payee_user_id
                && r.payment_kind == failure.payment_kind
                && !r.is_resolved && !r.in_dead_letter);

        match open_idx{
            Some(idx) => {
                let record = &mut state.retries[idx];
                record.amount = failure.amount;
                for eid in &failure.earning_ids{
                    if !record.earning_ids.contains(eid){
                        record.earning_ids.push(*eid);
                    }
                }
                record.last_error = Some(failure.fail_reason.clone());
                record.next_retry_at = Some(failure.next_retry_at);
                Ok(record.clone())
            },
            None => {
                state.next_retry_id += 1;
                let retry_id = state.next_retry_id;
                let created = RetryRecordData{
                    id: retry_id,
                    payee_user_id: failure.payee_user_id,
                    amount: failure.amount,
                    payment_kind: failure.payment_kind.clone(),
                    earning_ids: failure.earning_ids.clone(),
                    attempt_count: 0,
                    max_attempts: MAX_PAYOUT_ATTEMPTS,
                    last_attempt_at: None,
                    next_retry_at: Some(failure.next_retry_at),
                    last_error: Some(failure.fail_reason.clone()),
                    in_dead_letter: false,
                    is_resolved: false,
                    settlement_ref: None,
                };
                state.retries.push(created.clone());
                Ok(created)
            }
        }
    }

    async fn due_retries(&self, now: chrono::NaiveDateTime) -> Result<Vec<RetryRecordData>, EngineError>{
        let state = self.state.lock().unwrap();
        Ok(
            state.retries
                .iter()
                .filter(|r| !r.is_resolved && !r.in_dead_letter)
                .filter(|r| r.next_retry_at.map(|at| at <= now).unwrap_or(false))
                .cloned()
                .collect::<Vec<RetryRecordData>>()
        )
    }

    async fn retry_by_id(&self, retry_id: i32) -> Result<RetryRecordData, EngineError>{
        let state = self.state.lock().unwrap();
        state.retries
            .iter()
            .find(|r| r.id == retry_id)
            .cloned()
            .ok_or(Self::not_found("MemStore::retry_by_id"))
    }

    async fn record_retry_attempt(&self, retry_id: i32, attempted_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>{
        let mut state = self.state.lock().unwrap();
        let record = state.retries
            .iter_mut()
            .find(|r| r.id == retry_id)
            .ok_or(Self::not_found("MemStore::record_retry_attempt"))?;
        record.attempt_count += 1;
        record.last_attempt_at = Some(attempted_at);
        Ok(record.clone())
    }

    async fn reschedule_retry(&self, retry_id: i32, fail_reason: &str, next_attempt_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>{
        let mut state = self.state.lock().unwrap();
        let record = state.retries
            .iter_mut()
            .find(|r| r.id == retry_id)
            .ok_or(Self::not_found("MemStore::reschedule_retry"))?;
        record.last_error = Some(fail_reason.to_string());
        record.next_retry_at = Some(next_attempt_at);
        Ok(record.clone())
    }

    async fn dead_letter_retry(&self, retry_id: i32, fail_reason: &str) -> Result<RetryRecordData, EngineError>{
        let mut state = self.state.lock().unwrap();
        let record = state.retries
            .iter_mut()
            .find(|r| r.id == retry_id)
            .ok_or(Self::not_found("MemStore::dead_letter_retry"))?;
        record.in_dead_letter = true;
        record.last_error = Some(fail_reason.to_string());
        record.next_retry_at = None;
        Ok(record.clone())
    }

    async fn resolve_retry_without_payment(&self, retry_id: i32) -> Result<RetryRecordData, EngineError>{
        let mut state = self.state.lock().unwrap();
        let record = state.retries
            .iter_mut()
            .find(|r| r.id == retry_id)
            .ok_or(Self::not_found("MemStore::resolve_retry_without_payment"))?;
        record.is_resolved = true;
        record.next_retry_at = None;
        Ok(record.clone())
    }

    async fn reopen_dead_letter(&self, retry_id: i32, reopened_at: chrono::NaiveDateTime) -> Result<RetryRecordData, EngineError>{
        let mut state = self.state.lock().unwrap();
        let record = state.retries
            .iter_mut()
            .find(|r| r.id == retry_id)
            .ok_or(Self::not_found("MemStore::reopen_dead_letter"))?;
        record.in_dead_letter = false;
        record.attempt_count = 0;
        record.next_retry_at = Some(reopened_at);
        Ok(record.clone())
    }

    async fn dead_letters(&self) -> Result<Vec<RetryRecordData>, EngineError>{
        let state = self.state.lock().unwrap();
        Ok(
            state.retries
                .iter()
                .filter(|r| r.in_dead_letter && !r.is_resolved)
                .cloned()
                .collect::<Vec<RetryRecordData>>()
        )
    }

    async fn retry_stats(&self) -> Result<RetryStats, EngineError>{
        let state = self.state.lock().unwrap();
        let mut stats = RetryStats::default();
        for record in &state.retries{
            if record.is_resolved{
                stats.resolved_count += 1;
                stats.resolved_amount += record.amount;
            } else if record.in_dead_letter{
                stats.dead_letter_count += 1;
                stats.dead_letter_amount += record.amount;
            } else{
                stats.pending_count += 1;
                stats.pending_amount += record.amount;
            }
        }
        Ok(stats)
    }

}


pub struct MemCache{
    map: Mutex<HashMap<String, Vec<ChainAscendant>>>,
}

impl MemCache{

    pub fn new() -> Self{
        MemCache{ map: Mutex::new(HashMap::new()) }
    }

}

#[async_trait]
impl ChainCache for MemCache{

    async fn get_chain(&self, user_id: i32, depth: i32) -> Option<Vec<ChainAscendant>>{
        self.map.lock().unwrap().get(&chain_key(user_id, depth)).cloned()
    }

    async fn set_chain(&self, user_id: i32, depth: i32, chain: &[ChainAscendant]){
        self.map.lock().unwrap().insert(chain_key(user_id, depth), chain.to_vec());
    }

    async fn invalidate(&self, user_ids: &[i32]){
        let mut map = self.map.lock().unwrap();
        for uid in user_ids{
            for depth in 1..=MAX_REFERRAL_DEPTH{
                map.remove(&chain_key(*uid, depth));
            }
        }
    }

}


#[derive(Clone, Debug, PartialEq)]
pub struct SendCall{
    pub wallet_address: String,
    pub amount: i64,
    pub idem_key: String,
}

/*
    scripted payment backend: queued outcomes drain first, anything after
    that succeeds with a generated settlement ref
*/
pub struct ScriptedBackend{
    outcomes: Mutex<VecDeque<Result<String, String>>>,
    recorded: Mutex<Vec<SendCall>>,
    counter: AtomicUsize,
}

impl ScriptedBackend{

    pub fn new() -> Self{
        ScriptedBackend{
            outcomes: Mutex::new(VecDeque::new()),
            recorded: Mutex::new(vec![]),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn push_failure(&self, reason: &str){
        self.outcomes.lock().unwrap().push_back(Err(reason.to_string()));
    }

    pub fn calls(&self) -> Vec<SendCall>{
        self.recorded.lock().unwrap().clone()
    }

}

#[async_trait]
impl PaymentBackend for ScriptedBackend{

    async fn send(&self, wallet_address: &str, amount: i64, idem_key: &str) -> Result<PaymentReceipt, EngineError>{

        self.recorded.lock().unwrap().push(SendCall{
            wallet_address: wallet_address.to_string(),
            amount,
            idem_key: idem_key.to_string(),
        });

        let scripted = self.outcomes.lock().unwrap().pop_front();
        match scripted{
            Some(Err(reason)) => Err(
                EngineError::new(*THIRDPARTYAPI_ERROR_CODE, reason.clone(),
                    ErrorKind::Backend(BackendError::Rejected(reason)), "ScriptedBackend::send")
            ),
            Some(Ok(settlement_ref)) => Ok(PaymentReceipt{ settlement_ref }),
            None => {
                let seq = self.counter.fetch_add(1, Ordering::SeqCst);
                Ok(PaymentReceipt{ settlement_ref: format!("settle-{}", seq) })
            }
        }

    }

}


pub struct RecordingNotifier{
    sent: Mutex<Vec<(i32, String)>>,
}

impl RecordingNotifier{

    pub fn new() -> Self{
        RecordingNotifier{ sent: Mutex::new(vec![]) }
    }

    pub fn sent_to(&self, user_id: i32) -> Vec<String>{
        self.sent.lock().unwrap()
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, message)| message.clone())
            .collect::<Vec<String>>()
    }

}

#[async_trait]
impl Notifier for RecordingNotifier{

    async fn notify(&self, user_id: i32, message: &str){
        self.sent.lock().unwrap().push((user_id, message.to_string()));
    }

}


pub struct RecordingAlerts{
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingAlerts{

    pub fn new() -> Self{
        RecordingAlerts{ alerts: Mutex::new(vec![]) }
    }

    pub fn raised(&self) -> Vec<(String, String)>{
        self.alerts.lock().unwrap().clone()
    }

}

#[async_trait]
impl AlertChannel for RecordingAlerts{

    async fn alert_critical(&self, title: &str, details: &str){
        self.alerts.lock().unwrap().push((title.to_string(), details.to_string()));
    }

}
