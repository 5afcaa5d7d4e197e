


use diesel::prelude::*;
use serde::{Serialize, Deserialize};
use crate::schema::{users, referral_edges, users_earnings};
use crate::error::EngineError;


/*

    diesel migration generate users_earnings ---> create users_earnings migration sql files
    diesel migration run                     ---> apply sql files to db
    diesel migration redo                    ---> drop tables

*/

#[derive(Identifiable, Selectable, Queryable, Debug)]
#[diesel(table_name=users_earnings)]
pub struct Earning{ /* note that the ordering of fields must be the same as the table fields in up.sql */
    pub id: i32,
    pub referral_edge_id: i32,
    pub amount: i64,
    pub source_deposit_id: i64,
    pub is_paid: bool,
    pub settlement_ref: Option<String>,
    pub created_at: chrono::NaiveDateTime
}

#[derive(Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name=users_earnings)]
pub struct NewEarning{
    pub referral_edge_id: i32,
    pub amount: i64,
    pub source_deposit_id: i64,
    pub is_paid: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EarningData{
    pub id: i32,
    pub referral_edge_id: i32,
    pub amount: i64,
    pub source_deposit_id: i64,
    pub is_paid: bool,
    pub settlement_ref: Option<String>,
}

/* one unpaid earning joined with its payee, the settlement pass groups these by payee */
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UnpaidEarning{
    pub earning_id: i32,
    pub referral_edge_id: i32,
    pub payee_user_id: i32,
    pub payee_wallet: String,
    pub amount: i64,
}

impl Earning{

    pub fn find_for(edge_id: i32, deposit_id: i64, connection: &mut PgConnection) -> Result<Option<EarningData>, EngineError>{

        let found = users_earnings::table
            .filter(users_earnings::referral_edge_id.eq(edge_id))
            .filter(users_earnings::source_deposit_id.eq(deposit_id))
            .first::<Earning>(connection)
            .optional();

        match found{
            Ok(maybe_earning) => Ok(maybe_earning.map(|e| e.to_data())),
            Err(e) => Err(EngineError::storage(e, "Earning::find_for"))
        }

    }

    pub fn insert(new_earning: NewEarning, connection: &mut PgConnection) -> Result<EarningData, EngineError>{

        match diesel::insert_into(users_earnings::table)
            .values(&new_earning)
            .returning(Earning::as_returning())
            .get_result::<Earning>(connection)
            {
                Ok(earning) => Ok(earning.to_data()),
                Err(e) => Err(EngineError::storage(e, "Earning::insert"))
            }

    }

    pub fn all_unpaid(connection: &mut PgConnection) -> Result<Vec<UnpaidEarning>, EngineError>{

        let rows = users_earnings::table
            .inner_join(referral_edges::table.on(referral_edges::id.eq(users_earnings::referral_edge_id)))
            .inner_join(users::table.on(users::id.eq(referral_edges::referrer_id)))
            .filter(users_earnings::is_paid.eq(false))
            .order(users_earnings::id.asc())
            .select((users_earnings::id, users_earnings::referral_edge_id,
                referral_edges::referrer_id, users::wallet_address, users_earnings::amount))
            .load::<(i32, i32, i32, String, i64)>(connection);

        match rows{
            Ok(unpaid) => Ok(Self::to_unpaid(unpaid)),
            Err(e) => Err(EngineError::storage(e, "Earning::all_unpaid"))
        }

    }

    /* the still unpaid subset of a retry record's earning ids */
    pub fn unpaid_of(earning_ids: &[i32], connection: &mut PgConnection) -> Result<Vec<UnpaidEarning>, EngineError>{

        let rows = users_earnings::table
            .inner_join(referral_edges::table.on(referral_edges::id.eq(users_earnings::referral_edge_id)))
            .inner_join(users::table.on(users::id.eq(referral_edges::referrer_id)))
            .filter(users_earnings::id.eq_any(earning_ids.to_vec()))
            .filter(users_earnings::is_paid.eq(false))
            .order(users_earnings::id.asc())
            .select((users_earnings::id, users_earnings::referral_edge_id,
                referral_edges::referrer_id, users::wallet_address, users_earnings::amount))
            .load::<(i32, i32, i32, String, i64)>(connection);

        match rows{
            Ok(unpaid) => Ok(Self::to_unpaid(unpaid)),
            Err(e) => Err(EngineError::storage(e, "Earning::unpaid_of"))
        }

    }

    /* is_paid is a one way flip, already paid rows are filtered out so they can never flip twice */
    pub fn mark_paid(earning_ids: &[i32], succ_settlement_ref: &str, connection: &mut PgConnection) -> Result<usize, EngineError>{

        match diesel::update(users_earnings::table
                .filter(users_earnings::id.eq_any(earning_ids.to_vec()))
                .filter(users_earnings::is_paid.eq(false)))
            .set((users_earnings::is_paid.eq(true),
                users_earnings::settlement_ref.eq(succ_settlement_ref.to_string())))
            .execute(connection)
            {
                Ok(flipped) => Ok(flipped),
                Err(e) => Err(EngineError::storage(e, "Earning::mark_paid"))
            }

    }

    fn to_data(self) -> EarningData{
        EarningData{
            id: self.id,
            referral_edge_id: self.referral_edge_id,
            amount: self.amount,
            source_deposit_id: self.source_deposit_id,
            is_paid: self.is_paid,
            settlement_ref: self.settlement_ref,
        }
    }

    fn to_unpaid(rows: Vec<(i32, i32, i32, String, i64)>) -> Vec<UnpaidEarning>{
        rows
            .into_iter()
            .map(|(earning_id, edge_id, payee_id, wallet, earning_amount)| {
                UnpaidEarning{
                    earning_id,
                    referral_edge_id: edge_id,
                    payee_user_id: payee_id,
                    payee_wallet: wallet,
                    amount: earning_amount,
                }
            }).collect::<Vec<UnpaidEarning>>()
    }

}
