


use diesel::prelude::*;
use serde::{Serialize, Deserialize};
use crate::schema::payout_retries;
use crate::constants::*;
use crate::error::{EngineError, ErrorKind, StorageError};


/*

    diesel migration generate payout_retries ---> create payout_retries migration sql files
    diesel migration run                     ---> apply sql files to db
    diesel migration redo                    ---> drop tables

    at most one open row (unresolved, not dead lettered) may exist per
    (payee_user_id, payment_kind) pair, repeated failures for the same
    pair union their amount and earning ids into that row

*/

#[derive(Identifiable, Selectable, Queryable, Debug)]
#[diesel(table_name=payout_retries)]
pub struct PayoutRetry{ /* note that the ordering of fields must be the same as the table fields in up.sql */
    pub id: i32,
    pub payee_user_id: i32,
    pub amount: i64,
    pub payment_kind: String,
    pub earning_ids: Vec<i32>,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub last_attempt_at: Option<chrono::NaiveDateTime>,
    pub next_retry_at: Option<chrono::NaiveDateTime>,
    pub last_error: Option<String>,
    pub in_dead_letter: bool,
    pub is_resolved: bool,
    pub settlement_ref: Option<String>,
    pub created_at: chrono::NaiveDateTime
}

#[derive(Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name=payout_retries)]
pub struct NewPayoutRetry{
    pub payee_user_id: i32,
    pub amount: i64,
    pub payment_kind: String,
    pub earning_ids: Vec<i32>,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<chrono::NaiveDateTime>,
    pub last_error: Option<String>,
    pub in_dead_letter: bool,
    pub is_resolved: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryRecordData{
    pub id: i32,
    pub payee_user_id: i32,
    pub amount: i64,
    pub payment_kind: String,
    pub earning_ids: Vec<i32>,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub last_attempt_at: Option<chrono::NaiveDateTime>,
    pub next_retry_at: Option<chrono::NaiveDateTime>,
    pub last_error: Option<String>,
    pub in_dead_letter: bool,
    pub is_resolved: bool,
    pub settlement_ref: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RetryStats{
    pub pending_count: i64,
    pub pending_amount: i64,
    pub dead_letter_count: i64,
    pub dead_letter_amount: i64,
    pub resolved_count: i64,
    pub resolved_amount: i64,
}

impl PayoutRetry{

    pub fn find_open(payee: i32, kind: &str, connection: &mut PgConnection) -> Result<Option<RetryRecordData>, EngineError>{

        let found = payout_retries::table
            .filter(payout_retries::payee_user_id.eq(payee))
            .filter(payout_retries::payment_kind.eq(kind.to_string()))
            .filter(payout_retries::is_resolved.eq(false))
            .filter(payout_retries::in_dead_letter.eq(false))
            .first::<PayoutRetry>(connection)
            .optional();

        match found{
            Ok(maybe_retry) => Ok(maybe_retry.map(|r| r.to_data())),
            Err(e) => Err(EngineError::storage(e, "PayoutRetry::find_open"))
        }

    }

    pub fn by_id(retry_id: i32, connection: &mut PgConnection) -> Result<RetryRecordData, EngineError>{

        let found = payout_retries::table
            .filter(payout_retries::id.eq(retry_id))
            .first::<PayoutRetry>(connection);

        let Ok(retry_record) = found else{
            return Err(
                EngineError::new(*STORAGE_IO_ERROR_CODE, RETRY_RECORD_NOT_FOUND.to_string(),
                    ErrorKind::Storage(StorageError::NotFound), "PayoutRetry::by_id")
            );
        };

        Ok(retry_record.to_data())

    }

    pub fn insert(new_retry: NewPayoutRetry, connection: &mut PgConnection) -> Result<RetryRecordData, EngineError>{

        match diesel::insert_into(payout_retries::table)
            .values(&new_retry)
            .returning(PayoutRetry::as_returning())
            .get_result::<PayoutRetry>(connection)
            {
                Ok(retry_record) => Ok(retry_record.to_data()),
                Err(e) => Err(EngineError::storage(e, "PayoutRetry::insert"))
            }

    }

    /*
        another failure for an already open record: the new amount covers
        the payee's full outstanding group so it replaces the old one, the
        earning id sets are unioned
    */
    pub fn union_failure(retry_id: i32, full_amount: i64, failed_ids: &[i32], fail_reason: &str,
        next_attempt_at: chrono::NaiveDateTime, connection: &mut PgConnection) -> Result<RetryRecordData, EngineError>{

        let existing = Self::by_id(retry_id, connection)?;

        let mut unioned_ids = existing.earning_ids.clone();
        for eid in failed_ids{
            if !unioned_ids.contains(eid){
                unioned_ids.push(*eid);
            }
        }

        match diesel::update(payout_retries::table.find(retry_id))
            .set((payout_retries::amount.eq(full_amount),
                payout_retries::earning_ids.eq(unioned_ids),
                payout_retries::last_error.eq(fail_reason.to_string()),
                payout_retries::next_retry_at.eq(next_attempt_at)))
            .returning(PayoutRetry::as_returning())
            .get_result::<PayoutRetry>(connection)
            {
                Ok(retry_record) => Ok(retry_record.to_data()),
                Err(e) => Err(EngineError::storage(e, "PayoutRetry::union_failure"))
            }

    }

    pub fn record_attempt(retry_id: i32, attempted_at: chrono::NaiveDateTime,
        connection: &mut PgConnection) -> Result<RetryRecordData, EngineError>{

        match diesel::update(payout_retries::table.find(retry_id))
            .set((payout_retries::attempt_count.eq(payout_retries::attempt_count + 1),
                payout_retries::last_attempt_at.eq(attempted_at)))
            .returning(PayoutRetry::as_returning())
            .get_result::<PayoutRetry>(connection)
            {
                Ok(retry_record) => Ok(retry_record.to_data()),
                Err(e) => Err(EngineError::storage(e, "PayoutRetry::record_attempt"))
            }

    }

    pub fn reschedule(retry_id: i32, fail_reason: &str, next_attempt_at: chrono::NaiveDateTime,
        connection: &mut PgConnection) -> Result<RetryRecordData, EngineError>{

        match diesel::update(payout_retries::table.find(retry_id))
            .set((payout_retries::last_error.eq(fail_reason.to_string()),
                payout_retries::next_retry_at.eq(next_attempt_at)))
            .returning(PayoutRetry::as_returning())
            .get_result::<PayoutRetry>(connection)
            {
                Ok(retry_record) => Ok(retry_record.to_data()),
                Err(e) => Err(EngineError::storage(e, "PayoutRetry::reschedule"))
            }

    }

    /* terminal until an operator replays it, excluded from the automatic sweep */
    pub fn dead_letter(retry_id: i32, fail_reason: &str, connection: &mut PgConnection) -> Result<RetryRecordData, EngineError>{

        match diesel::update(payout_retries::table.find(retry_id))
            .set((payout_retries::in_dead_letter.eq(true),
                payout_retries::last_error.eq(fail_reason.to_string()),
                payout_retries::next_retry_at.eq(None::<chrono::NaiveDateTime>)))
            .returning(PayoutRetry::as_returning())
            .get_result::<PayoutRetry>(connection)
            {
                Ok(retry_record) => Ok(retry_record.to_data()),
                Err(e) => Err(EngineError::storage(e, "PayoutRetry::dead_letter"))
            }

    }

    pub fn resolve(retry_id: i32, succ_settlement_ref: Option<&str>,
        connection: &mut PgConnection) -> Result<RetryRecordData, EngineError>{

        match diesel::update(payout_retries::table.find(retry_id))
            .set((payout_retries::is_resolved.eq(true),
                payout_retries::settlement_ref.eq(succ_settlement_ref.map(|r| r.to_string())),
                payout_retries::next_retry_at.eq(None::<chrono::NaiveDateTime>)))
            .returning(PayoutRetry::as_returning())
            .get_result::<PayoutRetry>(connection)
            {
                Ok(retry_record) => Ok(retry_record.to_data()),
                Err(e) => Err(EngineError::storage(e, "PayoutRetry::resolve"))
            }

    }

    /* manual replay entry point, the backoff schedule is deliberately bypassed */
    pub fn reopen(retry_id: i32, reopened_at: chrono::NaiveDateTime,
        connection: &mut PgConnection) -> Result<RetryRecordData, EngineError>{

        match diesel::update(payout_retries::table.find(retry_id))
            .set((payout_retries::in_dead_letter.eq(false),
                payout_retries::attempt_count.eq(0),
                payout_retries::next_retry_at.eq(reopened_at)))
            .returning(PayoutRetry::as_returning())
            .get_result::<PayoutRetry>(connection)
            {
                Ok(retry_record) => Ok(retry_record.to_data()),
                Err(e) => Err(EngineError::storage(e, "PayoutRetry::reopen"))
            }

    }

    pub fn dead_letters(connection: &mut PgConnection) -> Result<Vec<RetryRecordData>, EngineError>{

        let rows = payout_retries::table
            .filter(payout_retries::in_dead_letter.eq(true))
            .filter(payout_retries::is_resolved.eq(false))
            .order(payout_retries::id.asc())
            .load::<PayoutRetry>(connection);

        match rows{
            Ok(dead) => Ok(dead.into_iter().map(|r| r.to_data()).collect::<Vec<RetryRecordData>>()),
            Err(e) => Err(EngineError::storage(e, "PayoutRetry::dead_letters"))
        }

    }

    pub fn due(now: chrono::NaiveDateTime, connection: &mut PgConnection) -> Result<Vec<RetryRecordData>, EngineError>{

        let rows = payout_retries::table
            .filter(payout_retries::is_resolved.eq(false))
            .filter(payout_retries::in_dead_letter.eq(false))
            .filter(payout_retries::next_retry_at.le(now))
            .order(payout_retries::id.asc())
            .load::<PayoutRetry>(connection);

        match rows{
            Ok(due_rows) => Ok(due_rows.into_iter().map(|r| r.to_data()).collect::<Vec<RetryRecordData>>()),
            Err(e) => Err(EngineError::storage(e, "PayoutRetry::due"))
        }

    }

    pub fn stats(connection: &mut PgConnection) -> Result<RetryStats, EngineError>{

        let pending = payout_retries::table
            .filter(payout_retries::is_resolved.eq(false))
            .filter(payout_retries::in_dead_letter.eq(false))
            .select(payout_retries::amount)
            .load::<i64>(connection);
        let Ok(pending_amounts) = pending else{
            return Err(EngineError::storage(pending.unwrap_err(), "PayoutRetry::stats"));
        };

        let dead = payout_retries::table
            .filter(payout_retries::in_dead_letter.eq(true))
            .filter(payout_retries::is_resolved.eq(false))
            .select(payout_retries::amount)
            .load::<i64>(connection);
        let Ok(dead_amounts) = dead else{
            return Err(EngineError::storage(dead.unwrap_err(), "PayoutRetry::stats"));
        };

        let resolved = payout_retries::table
            .filter(payout_retries::is_resolved.eq(true))
            .select(payout_retries::amount)
            .load::<i64>(connection);
        let Ok(resolved_amounts) = resolved else{
            return Err(EngineError::storage(resolved.unwrap_err(), "PayoutRetry::stats"));
        };

        Ok(
            RetryStats{
                pending_count: pending_amounts.len() as i64,
                pending_amount: pending_amounts.iter().sum(),
                dead_letter_count: dead_amounts.len() as i64,
                dead_letter_amount: dead_amounts.iter().sum(),
                resolved_count: resolved_amounts.len() as i64,
                resolved_amount: resolved_amounts.iter().sum(),
            }
        )

    }

    fn to_data(self) -> RetryRecordData{
        RetryRecordData{
            id: self.id,
            payee_user_id: self.payee_user_id,
            amount: self.amount,
            payment_kind: self.payment_kind,
            earning_ids: self.earning_ids,
            attempt_count: self.attempt_count,
            max_attempts: self.max_attempts,
            last_attempt_at: self.last_attempt_at,
            next_retry_at: self.next_retry_at,
            last_error: self.last_error,
            in_dead_letter: self.in_dead_letter,
            is_resolved: self.is_resolved,
            settlement_ref: self.settlement_ref,
        }
    }

}

impl NewPayoutRetry{

    pub fn first_failure(payee: i32, kind: &str, full_amount: i64, failed_ids: Vec<i32>,
        fail_reason: &str, next_attempt_at: chrono::NaiveDateTime) -> Self{

        NewPayoutRetry{
            payee_user_id: payee,
            amount: full_amount,
            payment_kind: kind.to_string(),
            earning_ids: failed_ids,
            attempt_count: 0,
            max_attempts: MAX_PAYOUT_ATTEMPTS,
            next_retry_at: Some(next_attempt_at),
            last_error: Some(fail_reason.to_string()),
            in_dead_letter: false,
            is_resolved: false,
        }
    }

}
