


use sha2::{Digest, Sha256};

/*
    stable idempotency token per payee group attempt: the same payee with
    the same set of unpaid earnings always derives the same token, so a
    backend that deduplicates on it will not double pay when we crash
    between its commit and ours and later replay the group
*/
pub fn idempotency_token(payee_user_id: i32, earning_ids: &[i32]) -> String{

    let mut sorted_ids = earning_ids.to_vec();
    sorted_ids.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(payee_user_id.to_be_bytes());
    for eid in sorted_ids{
        hasher.update(eid.to_be_bytes());
    }

    hex::encode(hasher.finalize())

}

pub fn now_naive() -> chrono::NaiveDateTime{
    chrono::Local::now().naive_local()
}
