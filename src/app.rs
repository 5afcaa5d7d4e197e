


use std::sync::Arc;
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use dotenv::dotenv;
use log::{info, error};
use refpay::constants::*;
use refpay::config::{Env as RefpayEnv, EnvExt};
use refpay::storage::pg::PgStore;
use refpay::adapters::payment::GatewayPaymentBackend;
use refpay::adapters::notifier::{BotNotifier, BotAlertChannel};
use refpay::settlement::PaymentSettlementScheduler;
use refpay::retry::RetryLedger;


#[tokio::main(flavor="multi_thread", worker_threads=10)]
async fn main(){



    // -------------------------------- environment variables setup
    //
    // ---------------------------------------------------------------------
    if std::env::var("RUST_LOG").is_err(){
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
    dotenv().expect("⚠️ .env file not found");
    let ctx = RefpayEnv::default().get_vars();
    let env = ctx.vars;




    // -------------------------------- app storage setup
    //
    // ------------------------------------------------------------------
    let manager = ConnectionManager::<PgConnection>::new(env.DATABASE_URL.as_str());
    let pool = Pool::builder()
        .build(manager)
        .expect("⚠️ can't build the db connection pool");
    let store = Arc::new(PgStore::new(pool));




    // -------------------------------- engine services setup
    //
    // ------------------------------------------------------------------
    let backend = Arc::new(GatewayPaymentBackend::new(
        env.PAYMENT_GATEWAY_ENDPOINT.clone(),
        env.PAYMENT_GATEWAY_TOKEN.clone(),
        env.PAYMENT_CALL_TIMEOUT_SECS));
    let notifier = Arc::new(BotNotifier::new(env.BOT_NOTIFY_ENDPOINT.clone()));
    let alerts = Arc::new(BotAlertChannel::new(env.BOT_ALERT_ENDPOINT.clone()));

    let scheduler = Arc::new(PaymentSettlementScheduler::new(store.clone(), backend.clone(), notifier.clone()));
    let retry_ledger = Arc::new(RetryLedger::new(store.clone(), backend.clone(), notifier.clone(), alerts.clone()));




    // -------------------------------- periodic jobs
    //
    //      one loop per job type, the pass is awaited inside its loop so
    //      at most one instance of each job type runs at a time, the two
    //      jobs themselves run independently of each other
    //
    // ------------------------------------------------------------------
    let settlement_interval = env.SETTLEMENT_INTERVAL_SECS;
    let settle = scheduler.clone();
    tokio::spawn(async move{
        loop{
            tokio::time::sleep(std::time::Duration::from_secs(settlement_interval)).await;
            match settle.run_once().await{
                Ok(report) => info!("💸 settlement pass | run: {} | payees: {} | paid: {} | failed: {}",
                    report.run_id, report.payees_processed, report.paid_groups, report.failed_groups),
                Err(e) => {
                    error!("😖 settlement pass failed: {}", e);
                    e.write().await;
                }
            }
        }
    });

    let sweep_interval = env.RETRY_SWEEP_INTERVAL_SECS;
    let sweeper = retry_ledger.clone();
    tokio::spawn(async move{
        loop{
            tokio::time::sleep(std::time::Duration::from_secs(sweep_interval)).await;
            match sweeper.sweep_once().await{
                Ok(report) => info!("♻️ retry sweep | run: {} | swept: {} | resolved: {} | dead lettered: {}",
                    report.run_id, report.swept, report.resolved, report.dead_lettered),
                Err(e) => {
                    error!("😖 retry sweep failed: {}", e);
                    e.write().await;
                }
            }
        }
    });

    info!("🚀 {} settlement daemon has launched - {}", APP_NAME, chrono::Local::now().naive_local());

    tokio::signal::ctrl_c().await.expect("😖 can't install the CTRL+C signal handler");
    info!("🔚 {} settlement daemon is shutting down - {}", APP_NAME, chrono::Local::now().naive_local());

}
