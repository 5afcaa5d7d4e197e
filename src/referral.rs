


use std::sync::Arc;
use log::info;
use crate::constants::*;
use crate::error::EngineError;
use crate::storage::SettlementStore;
use crate::cache::ChainCache;
use crate::adapters::notifier::Notifier;
use crate::models::users::ChainAscendant;
use crate::models::referral_edges::NewReferralEdge;


/*
    builds the referral edge set for a freshly registered user: the direct
    referrer plus its own ascendants become the new user's level 1..3
    payees, ascendants past the depth cap get no edge and no reward
*/
pub struct ReferralGraphBuilder{
    store: Arc<dyn SettlementStore>,
    cache: Arc<dyn ChainCache>,
    notifier: Arc<dyn Notifier>,
}

impl ReferralGraphBuilder{

    pub fn new(store: Arc<dyn SettlementStore>, cache: Arc<dyn ChainCache>, notifier: Arc<dyn Notifier>) -> Self{
        ReferralGraphBuilder{ store, cache, notifier }
    }

    pub async fn build(&self, new_user_id: i32, direct_referrer_id: i32) -> Result<(), EngineError>{

        if new_user_id == direct_referrer_id{
            let error_instance = EngineError::self_referral("ReferralGraphBuilder::build");
            error_instance.write().await;
            return Err(error_instance);
        }

        let get_referrer = self.store.find_user_by_id(direct_referrer_id).await;
        if let Err(e) = get_referrer{
            if e.is_not_found(){
                let error_instance = EngineError::referrer_not_found("ReferralGraphBuilder::build");
                error_instance.write().await;
                return Err(error_instance);
            }
            return Err(e);
        }

        /*
            cycle checks must act on fresh graph state so the cache is
            bypassed here on purpose, the direct referrer is hop one and
            its own ascendants shift down by one level
        */
        let upper_chain = self.store.ascend_chain(direct_referrer_id, MAX_REFERRAL_DEPTH - 1).await?;
        let mut full_chain = vec![ChainAscendant{ user_id: direct_referrer_id, level: 1 }];
        for hop in upper_chain{
            full_chain.push(ChainAscendant{ user_id: hop.user_id, level: hop.level + 1 });
        }

        if full_chain.iter().any(|hop| hop.user_id == new_user_id){
            let error_instance = EngineError::cycle_detected("ReferralGraphBuilder::build");
            error_instance.write().await;
            return Err(error_instance);
        }

        /* one edge per distinct ascendant, the whole set commits atomically */
        let mut new_edges = vec![];
        for hop in &full_chain{
            if new_edges.iter().any(|e: &NewReferralEdge| e.referrer_id == hop.user_id){
                continue;
            }
            new_edges.push(NewReferralEdge{
                referrer_id: hop.user_id,
                referral_id: new_user_id,
                level: hop.level,
            });
        }
        let inserted = self.store.insert_edges(new_edges).await?;

        /* ascended and descended views changed for everyone on the chain */
        let mut affected = full_chain.iter().map(|hop| hop.user_id).collect::<Vec<i32>>();
        affected.push(new_user_id);
        self.cache.invalidate(&affected).await;

        /* best effort, a broken notifier never rolls back edge creation */
        self.notifier.notify(direct_referrer_id, NEW_REFERRAL_JOINED).await;

        info!("🌱 referral chain linked | new user: {} | direct referrer: {} | edges: {}",
            new_user_id, direct_referrer_id, inserted);

        Ok(())

    }

    /* cache first ascent, an empty chain means the user has no referrer */
    pub async fn get_chain(&self, user_id: i32, depth: i32) -> Result<Vec<ChainAscendant>, EngineError>{

        if let Some(cached_chain) = self.cache.get_chain(user_id, depth).await{
            return Ok(cached_chain);
        }

        let chain = self.store.ascend_chain(user_id, depth).await?;
        self.cache.set_chain(user_id, depth, &chain).await;

        Ok(chain)

    }

}
