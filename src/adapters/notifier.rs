


use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::json;
use log::{info, error};


/* shared client for the fire and forget bot calls */
static NOTIFY_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| reqwest::Client::new());

const NOTIFY_TIMEOUT_SECS: u64 = 10;

/*
    both seams are fire and forget: failures get logged and swallowed,
    a broken bot must never block or roll back a settlement commit
*/

#[async_trait]
pub trait Notifier: Send + Sync{

    async fn notify(&self, user_id: i32, message: &str);

}

#[async_trait]
pub trait AlertChannel: Send + Sync{

    async fn alert_critical(&self, title: &str, details: &str);

}

pub struct BotNotifier{
    endpoint: String,
}

impl BotNotifier{

    pub fn new(endpoint: String) -> Self{
        BotNotifier{ endpoint }
    }

}

#[async_trait]
impl Notifier for BotNotifier{

    async fn notify(&self, user_id: i32, message: &str){

        if self.endpoint.is_empty(){
            info!("🔕 no bot notify endpoint set | user: {} | message: {}", user_id, message);
            return;
        }

        let res = NOTIFY_CLIENT
            .post(self.endpoint.as_str())
            .timeout(std::time::Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .json(&json!({
                "user_id": user_id,
                "message": message,
            }))
            .send()
            .await;

        if let Err(e) = res{
            error!("😖 can't notify user {} through the bot: {}", user_id, e);
        }

    }

}

pub struct BotAlertChannel{
    endpoint: String,
}

impl BotAlertChannel{

    pub fn new(endpoint: String) -> Self{
        BotAlertChannel{ endpoint }
    }

}

#[async_trait]
impl AlertChannel for BotAlertChannel{

    async fn alert_critical(&self, title: &str, details: &str){

        /* operators must see the alert even with a dead alert channel */
        error!("🚨 {} | {}", title, details);

        if self.endpoint.is_empty(){
            return;
        }

        let res = NOTIFY_CLIENT
            .post(self.endpoint.as_str())
            .timeout(std::time::Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .json(&json!({
                "severity": "critical",
                "title": title,
                "details": details,
            }))
            .send()
            .await;

        if let Err(e) = res{
            error!("😖 can't raise the critical alert through the bot: {}", e);
        }

    }

}
