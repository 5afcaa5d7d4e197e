

pub mod users;
pub mod referral_edges;
pub mod users_earnings;
pub mod payout_retries;
pub mod payout_transactions;
