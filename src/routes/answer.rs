use std::collections::HashMap;
use tracing::instrument;
use warp::http::StatusCode;

use crate::realtime::Registry;
use crate::store::Store;
use crate::types::account::{Session, UserId};
use crate::types::answer::{AnswerId, NewAnswer};
use crate::types::pagination::extract_pagination;
use crate::types::question::QuestionId;

pub async fn get_answers(
    question_id: i32,
    params: HashMap<String, String>,
    store: Store,
    page_size: u32,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pagination = extract_pagination(&params, page_size)?;
    match store
        .get_answers_for_question(QuestionId(question_id), pagination)
        .await
    {
        Ok(page) => Ok(super::ok(&page)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn get_answers_by_user(
    user_id: i32,
    params: HashMap<String, String>,
    store: Store,
    page_size: u32,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pagination = extract_pagination(&params, page_size)?;
    match store.get_answers_by_user(UserId(user_id), pagination).await {
        Ok(page) => Ok(super::ok(&page)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// 답변을 저장한 뒤 질문 작성자에게 실시간 알림을 보낸다.
#[instrument(skip(store, registry, new_answer), fields(user_id = session.user_id.0))]
pub async fn add_answer(
    question_id: i32,
    session: Session,
    store: Store,
    registry: Registry,
    new_answer: NewAnswer,
) -> Result<impl warp::Reply, warp::Rejection> {
    let new_answer = new_answer.validate()?;

    match store
        .add_answer(QuestionId(question_id), new_answer, session.user_id)
        .await
    {
        Ok((answer, delivery)) => {
            registry.deliver_all(&delivery).await;
            Ok(super::created(&answer, "Answer posted successfully"))
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn delete_answer(
    id: i32,
    session: Session,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    match store.delete_answer(AnswerId(id), &session).await {
        Ok(_) => Ok(super::done(&format!("Answer {} deleted", id))),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[instrument(skip(store, registry), fields(user_id = session.user_id.0))]
pub async fn accept_answer(
    id: i32,
    session: Session,
    store: Store,
    registry: Registry,
) -> Result<impl warp::Reply, warp::Rejection> {
    match store.accept_answer(AnswerId(id), &session).await {
        Ok((answer, delivery)) => {
            registry.deliver_all(&delivery).await;
            Ok(super::respond(
                StatusCode::OK,
                &answer,
                Some("Answer accepted successfully"),
            ))
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn unaccept_answer(
    id: i32,
    session: Session,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    match store.unaccept_answer(AnswerId(id), &session).await {
        Ok(answer) => Ok(super::respond(
            StatusCode::OK,
            &answer,
            Some("Answer unaccepted successfully"),
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
