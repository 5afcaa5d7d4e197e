


use diesel::prelude::*;
use serde::{Serialize, Deserialize};
use crate::schema::payout_transactions;
use crate::constants::*;
use crate::error::EngineError;


/*

    diesel migration generate payout_transactions ---> create payout_transactions migration sql files
    diesel migration run                          ---> apply sql files to db
    diesel migration redo                         ---> drop tables

*/

#[derive(Identifiable, Selectable, Queryable, Debug)]
#[diesel(table_name=payout_transactions)]
pub struct PayoutTransaction{ /* note that the ordering of fields must be the same as the table fields in up.sql */
    pub id: i32,
    pub payee_user_id: i32,
    pub amount: i64,
    pub payment_kind: String,
    pub settlement_ref: String,
    pub status: String,
    pub created_at: chrono::NaiveDateTime
}

#[derive(Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name=payout_transactions)]
pub struct NewPayoutTransaction{
    pub payee_user_id: i32,
    pub amount: i64,
    pub payment_kind: String,
    pub settlement_ref: String,
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PayoutTransactionData{
    pub id: i32,
    pub payee_user_id: i32,
    pub amount: i64,
    pub payment_kind: String,
    pub settlement_ref: String,
    pub status: String,
}

impl PayoutTransaction{

    pub fn insert_confirmed(payee: i32, kind: &str, paid_amount: i64, succ_settlement_ref: &str,
        connection: &mut PgConnection) -> Result<PayoutTransactionData, EngineError>{

        let new_payout_transaction = NewPayoutTransaction{
            payee_user_id: payee,
            amount: paid_amount,
            payment_kind: kind.to_string(),
            settlement_ref: succ_settlement_ref.to_string(),
            status: TX_STATUS_CONFIRMED.to_string(),
        };

        match diesel::insert_into(payout_transactions::table)
            .values(&new_payout_transaction)
            .returning(PayoutTransaction::as_returning())
            .get_result::<PayoutTransaction>(connection)
            {
                Ok(payout_transaction) => {
                    Ok(
                        PayoutTransactionData{
                            id: payout_transaction.id,
                            payee_user_id: payout_transaction.payee_user_id,
                            amount: payout_transaction.amount,
                            payment_kind: payout_transaction.payment_kind,
                            settlement_ref: payout_transaction.settlement_ref,
                            status: payout_transaction.status,
                        }
                    )
                },
                Err(e) => Err(EngineError::storage(e, "PayoutTransaction::insert_confirmed"))
            }

    }

}
