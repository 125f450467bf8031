use std::collections::HashMap;

use crate::store::Store;
use crate::types::account::{UserId, leaderboard_limit};

/// 공개 프로필: 평판과 배지를 포함한다.
pub async fn get_user(id: i32, store: Store) -> Result<impl warp::Reply, warp::Rejection> {
    match store.get_user(UserId(id)).await {
        Ok(user) => Ok(super::ok(&user)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// GET /users/leaderboard?limit=..
pub async fn get_leaderboard(
    params: HashMap<String, String>,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    let limit = leaderboard_limit(&params)?;
    match store.get_leaderboard(limit).await {
        Ok(entries) => Ok(super::ok(&entries)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
