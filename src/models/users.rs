


use diesel::prelude::*;
use diesel::sql_types::Integer;
use serde::{Serialize, Deserialize};
use crate::schema::users;
use crate::constants::*;
use crate::error::{EngineError, ErrorKind, StorageError};


/*

    diesel migration generate users ---> create users migration sql files
    diesel migration run            ---> apply sql files to db
    diesel migration redo           ---> drop tables

*/

#[derive(Identifiable, Selectable, Queryable, Debug)]
#[diesel(table_name=users)]
pub struct User{ /* note that the ordering of fields must be the same as the table fields in up.sql */
    pub id: i32,
    pub username: String,
    pub wallet_address: String,
    pub referrer_id: Option<i32>, /* immutable once set, the registration pipeline writes it exactly once */
    pub created_at: chrono::NaiveDateTime
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserData{
    pub id: i32,
    pub username: String,
    pub wallet_address: String,
    pub referrer_id: Option<i32>,
}

/* one hop of an ascended referral chain, level 1 is the direct referrer */
#[derive(QueryableByName, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChainAscendant{
    #[diesel(sql_type = Integer)]
    pub user_id: i32,
    #[diesel(sql_type = Integer)]
    pub level: i32,
}

impl User{

    pub fn find_by_id(doer_id: i32, connection: &mut PgConnection) -> Result<UserData, EngineError>{

        let single_user = users::table
            .filter(users::id.eq(doer_id))
            .first::<User>(connection);

        let Ok(user) = single_user else{
            return Err(
                EngineError::new(*STORAGE_IO_ERROR_CODE, USER_NOT_FOUND.to_string(),
                    ErrorKind::Storage(StorageError::NotFound), "User::find_by_id")
            );
        };

        Ok(
            UserData{
                id: user.id,
                username: user.username,
                wallet_address: user.wallet_address,
                referrer_id: user.referrer_id,
            }
        )

    }

    /*
        bounded recursive ascent in a single query instead of one round trip
        per level, rows come back ordered by level ascending and a user with
        no referrer simply yields zero rows
    */
    pub fn ascend_chain(start_user_id: i32, depth: i32, connection: &mut PgConnection) -> Result<Vec<ChainAscendant>, EngineError>{

        let ascent = diesel::sql_query(
            "WITH RECURSIVE ancestry(user_id, level) AS (
                SELECT u.referrer_id, 1 FROM users u
                    WHERE u.id = $1 AND u.referrer_id IS NOT NULL
                UNION ALL
                SELECT u.referrer_id, a.level + 1 FROM users u
                    JOIN ancestry a ON u.id = a.user_id
                    WHERE u.referrer_id IS NOT NULL AND a.level < $2
            )
            SELECT user_id, level FROM ancestry ORDER BY level ASC")
            .bind::<Integer, _>(start_user_id)
            .bind::<Integer, _>(depth)
            .load::<ChainAscendant>(connection);

        match ascent{
            Ok(chain) => Ok(chain),
            Err(e) => Err(EngineError::storage(e, "User::ascend_chain"))
        }

    }

}
