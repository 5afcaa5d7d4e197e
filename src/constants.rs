


pub const APP_NAME: &str = "RefPay";

/* referral graph rules */
pub const MAX_REFERRAL_DEPTH: i32 = 3;
/* commission rates per level in basis points: 3% / 2% / 5% at levels 1/2/3 */
pub const REFERRAL_RATE_BPS: [i64; 3] = [300, 200, 500];

/* payout retry pipeline */
pub const MAX_PAYOUT_ATTEMPTS: i32 = 5;
pub const RETRY_BASE_DELAY_MINS: i64 = 1;
pub const PAYMENT_KIND_REFERRAL: &str = "referral";
pub const TX_STATUS_CONFIRMED: &str = "confirmed";

/* defaults for env driven knobs */
pub const DEFAULT_CHAIN_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_SETTLEMENT_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_RETRY_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_PAYMENT_CALL_TIMEOUT_SECS: u64 = 30;

pub static REFERRER_NOT_FOUND: &str = "Referrer Not Found";
pub static SELF_REFERRAL_REJECTED: &str = "Can't Refer Yourself";
pub static CYCLE_DETECTED: &str = "Referral Would Close A Cycle";
pub static RETRY_RECORD_NOT_FOUND: &str = "Retry Record Not Found";
pub static RETRY_NOT_DEAD_LETTERED: &str = "Retry Record Is Not In The Dead Letter Queue";
pub static RETRY_ALREADY_RESOLVED: &str = "Retry Record Has Already Been Resolved";
pub static RETRIES_EXHAUSTED: &str = "Automatic Retry Budget Exhausted, Operator Action Required";
pub static USER_NOT_FOUND: &str = "User Not Found";
pub static EARNING_NOT_FOUND: &str = "Earning Not Found";
pub static BACKEND_REJECTED_PAYMENT: &str = "Payment Backend Rejected The Transfer";

/* user facing notification lines, sent through the bot notifier */
pub static NEW_REFERRAL_JOINED: &str = "A New Referral Just Joined Your Network";
pub static EARNING_RECORDED: &str = "New Referral Earning Recorded, It Will Be Paid With The Next Settlement Pass";
pub static PAYOUT_SENT: &str = "Your Referral Earnings Have Been Paid Out";

/* operator alert titles */
pub static DEAD_LETTER_ALERT_TITLE: &str = "Referral Payout Moved To Dead Letter";

pub const LOGS_FOLDER_ERROR_KIND: &str = "logs/error-kind";

/* u16 bits is 2 bytes long which is 4 chars in hex */
pub static STORAGE_IO_ERROR_CODE: &u16 = &0xFFFF;
pub static THIRDPARTYAPI_ERROR_CODE: &u16 = &0xFFFE;
pub static GRAPH_RULE_ERROR_CODE: &u16 = &0xFFFD;
pub static RETRY_STATE_ERROR_CODE: &u16 = &0xFFFC;
