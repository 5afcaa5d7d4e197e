


/*
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
        REFPAY ENGINE CUSTOM ERROR HANDLER
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=

   graph rule errors are returned synchronously to the caller of the
   registration / deposit pipelines, storage and backend errors are
   absorbed into the retry pipeline and only ever surfaced to operators
*/

use tokio::io::AsyncWriteExt;
use crate::constants::*;

#[derive(Debug)]
pub struct EngineError{
    pub code: u16,
    pub msg: String, // reason
    pub kind: ErrorKind, // due to what service
    pub method_name: String // in what method
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphError{
    CycleDetected,
    SelfReferral,
    ReferrerNotFound,
}

#[derive(Debug)]
pub enum StorageError{
    Diesel(diesel::result::Error),
    Pool(diesel::r2d2::PoolError),
    Redis(redis::RedisError),
    NotFound,
}

#[derive(Debug)]
pub enum BackendError{
    Http(reqwest::Error),
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStateError{
    ExhaustedRetries,
    NotDeadLettered,
    AlreadyResolved,
}

#[derive(Debug)]
pub enum ErrorKind{
    Graph(GraphError), // referral graph rule violations
    Storage(StorageError), // diesel, r2d2, redis
    Backend(BackendError), // payment gateway call
    Retry(RetryStateError), // retry record state machine
}

impl std::error::Error for EngineError{}

impl std::fmt::Display for EngineError{

    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result{
        f.write_fmt(
            format_args!(
                "ERROR: {} | due to: {:?} | method: {}",
                self.msg,
                self.kind,
                self.method_name
            )
        )
    }
}

/* can be made using from() method */
impl From<diesel::result::Error> for ErrorKind{
    fn from(error: diesel::result::Error) -> Self{
        ErrorKind::Storage(StorageError::Diesel(error))
    }
}

impl From<diesel::r2d2::PoolError> for ErrorKind{
    fn from(error: diesel::r2d2::PoolError) -> Self{
        ErrorKind::Storage(StorageError::Pool(error))
    }
}

impl From<redis::RedisError> for ErrorKind{
    fn from(error: redis::RedisError) -> Self{
        ErrorKind::Storage(StorageError::Redis(error))
    }
}

impl From<reqwest::Error> for ErrorKind{
    fn from(error: reqwest::Error) -> Self{
        ErrorKind::Backend(BackendError::Http(error))
    }
}

/* lets diesel transaction closures use ? on bare diesel errors */
impl From<diesel::result::Error> for EngineError{
    fn from(error: diesel::result::Error) -> Self{
        EngineError::storage(error, "transaction")
    }
}

impl EngineError{

    pub fn new(code: u16, msg: String, kind: ErrorKind, method_name: &str) -> Self{
        EngineError{
            code,
            msg,
            kind,
            method_name: method_name.to_string()
        }
    }

    pub fn storage(error: diesel::result::Error, method_name: &str) -> Self{
        let msg = error.to_string();
        EngineError::new(*STORAGE_IO_ERROR_CODE, msg, error.into(), method_name)
    }

    pub fn referrer_not_found(method_name: &str) -> Self{
        EngineError::new(*GRAPH_RULE_ERROR_CODE, REFERRER_NOT_FOUND.to_string(),
            ErrorKind::Graph(GraphError::ReferrerNotFound), method_name)
    }

    pub fn self_referral(method_name: &str) -> Self{
        EngineError::new(*GRAPH_RULE_ERROR_CODE, SELF_REFERRAL_REJECTED.to_string(),
            ErrorKind::Graph(GraphError::SelfReferral), method_name)
    }

    pub fn cycle_detected(method_name: &str) -> Self{
        EngineError::new(*GRAPH_RULE_ERROR_CODE, CYCLE_DETECTED.to_string(),
            ErrorKind::Graph(GraphError::CycleDetected), method_name)
    }

    pub fn is_cycle(&self) -> bool{
        matches!(self.kind, ErrorKind::Graph(GraphError::CycleDetected))
    }

    pub fn is_self_referral(&self) -> bool{
        matches!(self.kind, ErrorKind::Graph(GraphError::SelfReferral))
    }

    pub fn is_referrer_not_found(&self) -> bool{
        matches!(self.kind, ErrorKind::Graph(GraphError::ReferrerNotFound))
    }

    pub fn is_backend_failure(&self) -> bool{
        matches!(self.kind, ErrorKind::Backend(_))
    }

    pub fn is_not_found(&self) -> bool{
        matches!(self.kind, ErrorKind::Storage(StorageError::NotFound))
    }

    /* append one line to the error kind log file, the engine must never
       panic over a broken log sink so write failures are swallowed */
    pub async fn write(&self){

        let this = self;
        let Self{ code, msg, kind, method_name } = this;

        if tokio::fs::create_dir_all(LOGS_FOLDER_ERROR_KIND).await.is_err(){
            return;
        }
        let filepath = format!("{}/refpay-error.log", LOGS_FOLDER_ERROR_KIND);
        let error_log_content = format!("code: {} | message: {} | due to: {:?} | time: {} | method name: {}\n",
            code, msg, kind, chrono::Local::now().timestamp_millis(), method_name);

        let opened = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(filepath.as_str())
            .await;
        if let Ok(mut file) = opened{
            let _ = file.write_all(error_log_content.as_bytes()).await;
        }

    }

}
