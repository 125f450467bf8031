use std::collections::HashMap;
use tracing::instrument;

use crate::realtime::Registry;
use crate::store::Store;
use crate::types::account::Session;
use crate::types::pagination::extract_pagination;
use crate::types::vote::{NewVote, VoteId, VoteTarget, history_direction};

fn target(target_type: &str, target_id: i32) -> Result<VoteTarget, handle_errors::Error> {
    Ok(VoteTarget {
        target_type: target_type.parse()?,
        target_id,
    })
}

/// 추천/비추천. 같은 방향을 다시 보내면 취소된다.
#[instrument(skip(store, registry), fields(user_id = session.user_id.0))]
pub async fn cast_vote(
    session: Session,
    store: Store,
    registry: Registry,
    new_vote: NewVote,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (target, direction) = new_vote.parse()?;

    match store.cast_vote(session.user_id, target, direction).await {
        Ok((outcome, delivery)) => {
            registry.deliver_all(&delivery).await;
            Ok(super::ok(&outcome))
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn get_vote_counts(
    target_type: String,
    target_id: i32,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    let target = target(&target_type, target_id)?;
    match store.get_vote_counts(target).await {
        Ok(counts) => Ok(super::ok(&counts)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// 투표하지 않았으면 data는 null이다.
pub async fn get_my_vote(
    target_type: String,
    target_id: i32,
    session: Session,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    let target = target(&target_type, target_id)?;
    match store.get_user_vote(session.user_id, target).await {
        Ok(vote) => Ok(super::ok(&vote)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn remove_vote(
    id: i32,
    session: Session,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    match store.remove_vote(VoteId(id), session.user_id).await {
        Ok(outcome) => Ok(super::respond(
            warp::http::StatusCode::OK,
            &outcome,
            Some("Vote removed"),
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// GET /votes/history?direction=up|down&page=..
pub async fn get_vote_history(
    params: HashMap<String, String>,
    session: Session,
    store: Store,
    page_size: u32,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pagination = extract_pagination(&params, page_size)?;
    let direction = history_direction(&params)?;

    match store
        .get_vote_history(session.user_id, direction, pagination)
        .await
    {
        Ok(page) => Ok(super::ok(&page)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
