


use serde::{Serialize, Deserialize};
use crate::constants::*;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[allow(non_snake_case)]
pub struct Env{
    pub DATABASE_URL: String,
    pub REDIS_HOST: String,
    pub REDIS_PORT: String,
    pub REDIS_PASSWORD: String,
    pub PAYMENT_GATEWAY_ENDPOINT: String,
    pub PAYMENT_GATEWAY_TOKEN: String,
    pub PAYMENT_CALL_TIMEOUT_SECS: u64,
    pub BOT_NOTIFY_ENDPOINT: String,
    pub BOT_ALERT_ENDPOINT: String,
    pub SETTLEMENT_INTERVAL_SECS: u64,
    pub RETRY_SWEEP_INTERVAL_SECS: u64,
    pub CHAIN_CACHE_TTL_SECS: u64,
}

pub trait EnvExt{

    type Context;
    fn get_vars(&self) -> Self::Context;
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Context<C>{
    pub vars: C
}

impl EnvExt for Env{

    type Context = Context<Self>;

    fn get_vars(&self) -> Self::Context {

        let ctx = Context::<Env>{
            vars: Env{
                DATABASE_URL: std::env::var("DATABASE_URL").expect("⚠️ no database url variable set"),
                REDIS_HOST: std::env::var("REDIS_HOST").unwrap_or("localhost".to_string()),
                REDIS_PORT: std::env::var("REDIS_PORT").unwrap_or("6379".to_string()),
                REDIS_PASSWORD: std::env::var("REDIS_PASSWORD").unwrap_or("".to_string()),
                PAYMENT_GATEWAY_ENDPOINT: std::env::var("PAYMENT_GATEWAY_ENDPOINT").expect("⚠️ no payment gateway endpoint variable set"),
                PAYMENT_GATEWAY_TOKEN: std::env::var("PAYMENT_GATEWAY_TOKEN").expect("⚠️ no payment gateway token variable set"),
                PAYMENT_CALL_TIMEOUT_SECS: parse_u64("PAYMENT_CALL_TIMEOUT_SECS", DEFAULT_PAYMENT_CALL_TIMEOUT_SECS),
                BOT_NOTIFY_ENDPOINT: std::env::var("BOT_NOTIFY_ENDPOINT").unwrap_or("".to_string()),
                BOT_ALERT_ENDPOINT: std::env::var("BOT_ALERT_ENDPOINT").unwrap_or("".to_string()),
                SETTLEMENT_INTERVAL_SECS: parse_u64("SETTLEMENT_INTERVAL_SECS", DEFAULT_SETTLEMENT_INTERVAL_SECS),
                RETRY_SWEEP_INTERVAL_SECS: parse_u64("RETRY_SWEEP_INTERVAL_SECS", DEFAULT_RETRY_SWEEP_INTERVAL_SECS),
                CHAIN_CACHE_TTL_SECS: parse_u64("CHAIN_CACHE_TTL_SECS", DEFAULT_CHAIN_CACHE_TTL_SECS),
            }
        };

        ctx

    }

}

fn parse_u64(key: &str, default: u64) -> u64{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
