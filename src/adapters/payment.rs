


use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use log::info;
use crate::constants::*;
use crate::error::{EngineError, ErrorKind, BackendError};


/* payment gateway adapter to fire one transfer per payee group attempt */

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PaymentReceipt{
    pub settlement_ref: String,
}

/*
    the engine never constructs or broadcasts a transfer itself, one call
    against this seam either settles a payee group or fails as a whole,
    the result is known before the call returns
*/
#[async_trait]
pub trait PaymentBackend: Send + Sync{

    async fn send(&self, wallet_address: &str, amount: i64, idem_key: &str) -> Result<PaymentReceipt, EngineError>;

}

#[derive(Serialize)]
struct GatewayTransferRequest<'r>{
    address: &'r str,
    amount: i64,
    idempotency_key: &'r str,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct GatewayTransferResponse{
    pub success: Option<bool>,
    pub settlement_ref: Option<String>,
    pub error: Option<String>,
}

pub struct GatewayPaymentBackend{
    endpoint: String,
    token: String,
    call_timeout: std::time::Duration,
}

impl GatewayPaymentBackend{

    pub fn new(endpoint: String, token: String, timeout_secs: u64) -> Self{
        GatewayPaymentBackend{
            endpoint,
            token,
            call_timeout: std::time::Duration::from_secs(timeout_secs),
        }
    }

}

#[async_trait]
impl PaymentBackend for GatewayPaymentBackend{

    async fn send(&self, wallet_address: &str, amount: i64, idem_key: &str) -> Result<PaymentReceipt, EngineError>{

        let transfer_request = GatewayTransferRequest{
            address: wallet_address,
            amount,
            idempotency_key: idem_key,
        };

        /* a timed out call goes down the retry path, it is never a success */
        let res = reqwest::Client::new()
            .post(self.endpoint.as_str())
            .bearer_auth(&self.token)
            .timeout(self.call_timeout)
            .json(&transfer_request)
            .send()
            .await;

        let Ok(gateway_response) = res else{

            let e = res.unwrap_err();
            let error_content = e.to_string();
            let error_instance = EngineError::new(*THIRDPARTYAPI_ERROR_CODE, error_content, e.into(), "GatewayPaymentBackend::send");
            error_instance.write().await; /* log caching inside the logs folder */
            return Err(error_instance);
        };

        let get_transfer_response = gateway_response.json::<GatewayTransferResponse>().await;
        let Ok(transfer_response) = get_transfer_response else{

            let e = get_transfer_response.unwrap_err();
            let error_content = e.to_string();
            let error_instance = EngineError::new(*THIRDPARTYAPI_ERROR_CODE, error_content, e.into(), "GatewayPaymentBackend::send");
            error_instance.write().await;
            return Err(error_instance);
        };

        if transfer_response.success == Some(true) && transfer_response.settlement_ref.is_some(){

            let succ_settlement_ref = transfer_response.settlement_ref.unwrap_or_default();
            info!("✅ transfer accepted by the gateway | wallet: {} | amount: {} | settlement ref: {}",
                wallet_address, amount, succ_settlement_ref);
            Ok(
                PaymentReceipt{
                    settlement_ref: succ_settlement_ref,
                }
            )

        } else{

            let reject_reason = transfer_response.error.unwrap_or(BACKEND_REJECTED_PAYMENT.to_string());
            let error_instance = EngineError::new(*THIRDPARTYAPI_ERROR_CODE, reject_reason.clone(),
                ErrorKind::Backend(BackendError::Rejected(reject_reason)), "GatewayPaymentBackend::send");
            error_instance.write().await;
            Err(error_instance)
        }

    }

}
