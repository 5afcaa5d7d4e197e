


use serde::{Serialize, Deserialize};
use crate::constants::*;


/*
    pure commission math, no side effects and no storage so the whole
    rate table is exhaustively unit testable, amounts are integer money
    in the smallest unit and truncate toward zero
*/

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CommissionReward{
    pub level: i32,
    pub rate: f64,
    pub amount: i64,
}

pub fn commission_for_level(deposit_amount: i64, level: i32) -> i64{

    if deposit_amount <= 0 || level < 1 || level > MAX_REFERRAL_DEPTH{
        return 0;
    }

    let bps = REFERRAL_RATE_BPS[(level - 1) as usize];
    deposit_amount * bps / 10_000

}

pub fn rewards_for(deposit_amount: i64) -> Vec<CommissionReward>{

    (1..=MAX_REFERRAL_DEPTH)
        .map(|level| {
            CommissionReward{
                level,
                rate: REFERRAL_RATE_BPS[(level - 1) as usize] as f64 / 10_000f64,
                amount: commission_for_level(deposit_amount, level),
            }
        })
        .collect::<Vec<CommissionReward>>()

}
