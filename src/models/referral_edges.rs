


use diesel::prelude::*;
use serde::{Serialize, Deserialize};
use crate::schema::referral_edges;
use crate::error::EngineError;


/*

    diesel migration generate referral_edges ---> create referral_edges migration sql files
    diesel migration run                     ---> apply sql files to db
    diesel migration redo                    ---> drop tables

*/

#[derive(Identifiable, Selectable, Queryable, Debug)]
#[diesel(table_name=referral_edges)]
pub struct ReferralEdge{ /* note that the ordering of fields must be the same as the table fields in up.sql */
    pub id: i32,
    pub referrer_id: i32,
    pub referral_id: i32,
    pub level: i32,
    pub cumulative_earned: i64,
    pub created_at: chrono::NaiveDateTime
}

#[derive(Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name=referral_edges)]
pub struct NewReferralEdge{
    pub referrer_id: i32,
    pub referral_id: i32,
    pub level: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReferralEdgeData{
    pub id: i32,
    pub referrer_id: i32,
    pub referral_id: i32,
    pub level: i32,
    pub cumulative_earned: i64,
}

impl ReferralEdge{

    /*
        the whole edge set of one build() call must land in a single
        transaction owned by the caller, existing (referrer, referral)
        pairs are left untouched
    */
    pub fn insert_bulk(new_edges: &[NewReferralEdge], connection: &mut PgConnection) -> Result<usize, EngineError>{

        match diesel::insert_into(referral_edges::table)
            .values(new_edges)
            .on_conflict((referral_edges::referrer_id, referral_edges::referral_id))
            .do_nothing()
            .execute(connection)
            {
                Ok(inserted) => Ok(inserted),
                Err(e) => Err(EngineError::storage(e, "ReferralEdge::insert_bulk"))
            }

    }

    /* edges whose descendant is the passed in user, their referrers are the payees */
    pub fn for_referral(referral_user_id: i32, connection: &mut PgConnection) -> Result<Vec<ReferralEdgeData>, EngineError>{

        let edges = referral_edges::table
            .filter(referral_edges::referral_id.eq(referral_user_id))
            .order(referral_edges::level.asc())
            .load::<ReferralEdge>(connection);

        let Ok(found_edges) = edges else{
            return Err(EngineError::storage(edges.unwrap_err(), "ReferralEdge::for_referral"));
        };

        Ok(
            found_edges
                .into_iter()
                .map(|e| {
                    ReferralEdgeData{
                        id: e.id,
                        referrer_id: e.referrer_id,
                        referral_id: e.referral_id,
                        level: e.level,
                        cumulative_earned: e.cumulative_earned,
                    }
                }).collect::<Vec<ReferralEdgeData>>()
        )

    }

    pub fn bump_cumulative(edge_id: i32, delta: i64, connection: &mut PgConnection) -> Result<(), EngineError>{

        match diesel::update(referral_edges::table.find(edge_id))
            .set(referral_edges::cumulative_earned.eq(referral_edges::cumulative_earned + delta))
            .execute(connection)
            {
                Ok(_) => Ok(()),
                Err(e) => Err(EngineError::storage(e, "ReferralEdge::bump_cumulative"))
            }

    }

}
