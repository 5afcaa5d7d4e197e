


use async_trait::async_trait;
use redis::AsyncCommands; // this trait is required to be imported in here to call set methods on the connection
use redis::RedisResult;
use log::error;
use crate::constants::*;
use crate::models::users::ChainAscendant;


/*
    ttl bounded side table of ascended chains keyed by (user, depth),
    never the source of truth: every error in here degrades to a miss
    and the caller re derives the chain from the relational store
*/

#[async_trait]
pub trait ChainCache: Send + Sync{

    async fn get_chain(&self, user_id: i32, depth: i32) -> Option<Vec<ChainAscendant>>;

    async fn set_chain(&self, user_id: i32, depth: i32, chain: &[ChainAscendant]);

    /* proactive delete on any graph write touching these users, all depths */
    async fn invalidate(&self, user_ids: &[i32]);

}

pub fn chain_key(user_id: i32, depth: i32) -> String{
    format!("chain:{}:{}", user_id, depth)
}

pub struct RedisChainCache{
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisChainCache{

    pub fn new(client: redis::Client, ttl_secs: u64) -> Self{
        RedisChainCache{ client, ttl_secs }
    }

}

#[async_trait]
impl ChainCache for RedisChainCache{

    async fn get_chain(&self, user_id: i32, depth: i32) -> Option<Vec<ChainAscendant>>{

        let mut redis_conn = match self.client.get_async_connection().await{
            Ok(conn) => conn,
            Err(e) => {
                error!("😖 chain cache is not reachable: {}", e);
                return None;
            }
        };

        let cached: RedisResult<Option<String>> = redis_conn.get(chain_key(user_id, depth)).await;
        match cached{
            Ok(Some(payload)) => serde_json::from_str::<Vec<ChainAscendant>>(&payload).ok(),
            Ok(None) => None,
            Err(e) => {
                error!("😖 chain cache read failed: {}", e);
                None
            }
        }

    }

    async fn set_chain(&self, user_id: i32, depth: i32, chain: &[ChainAscendant]){

        let Ok(payload) = serde_json::to_string(chain) else{
            return;
        };

        let mut redis_conn = match self.client.get_async_connection().await{
            Ok(conn) => conn,
            Err(e) => {
                error!("😖 chain cache is not reachable: {}", e);
                return;
            }
        };

        let cached: RedisResult<()> = redis_conn.set_ex(chain_key(user_id, depth), payload, self.ttl_secs as usize).await;
        if let Err(e) = cached{
            error!("😖 chain cache write failed: {}", e);
        }

    }

    async fn invalidate(&self, user_ids: &[i32]){

        let mut stale_keys = vec![];
        for uid in user_ids{
            for depth in 1..=MAX_REFERRAL_DEPTH{
                stale_keys.push(chain_key(*uid, depth));
            }
        }
        if stale_keys.is_empty(){
            return;
        }

        let mut redis_conn = match self.client.get_async_connection().await{
            Ok(conn) => conn,
            Err(e) => {
                error!("😖 chain cache is not reachable: {}", e);
                return;
            }
        };

        let deleted: RedisResult<()> = redis_conn.del(stale_keys).await;
        if let Err(e) = deleted{
            error!("😖 chain cache invalidation failed: {}", e);
        }

    }

}
