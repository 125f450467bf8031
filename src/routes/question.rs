use std::collections::HashMap;
use tracing::{Level, event, instrument};

use crate::listing::ListingQuery;
use crate::store::Store;
use crate::types::account::{Session, UserId};
use crate::types::pagination::extract_pagination;
use crate::types::question::{NewQuestion, QuestionId, QuestionUpdate};

/// 검색, 태그, 정렬, 페이지 매개변수를 받는 질문 목록
#[instrument(skip(store))]
pub async fn get_questions(
    params: HashMap<String, String>,
    store: Store,
    page_size: u32,
) -> Result<impl warp::Reply, warp::Rejection> {
    event!(target: "stackit", Level::INFO, "querying questions");
    let query = ListingQuery::from_params(&params, page_size)?;

    match store.get_questions(&query).await {
        Ok(page) => Ok(super::ok(&page)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn get_question(id: i32, store: Store) -> Result<impl warp::Reply, warp::Rejection> {
    match store.get_question_detail(QuestionId(id)).await {
        Ok(detail) => Ok(super::ok(&detail)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn get_questions_by_user(
    id: i32,
    params: HashMap<String, String>,
    store: Store,
    page_size: u32,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pagination = extract_pagination(&params, page_size)?;
    match store.get_questions_by_user(UserId(id), pagination).await {
        Ok(page) => Ok(super::ok(&page)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[instrument(skip(store, new_question), fields(user_id = session.user_id.0))]
pub async fn add_question(
    session: Session,
    store: Store,
    new_question: NewQuestion,
) -> Result<impl warp::Reply, warp::Rejection> {
    let new_question = new_question.validate()?;

    match store.add_question(new_question, session.user_id).await {
        Ok(question) => Ok(super::created(&question, "Question created successfully")),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn update_question(
    id: i32,
    session: Session,
    store: Store,
    update: QuestionUpdate,
) -> Result<impl warp::Reply, warp::Rejection> {
    let update = update.validate()?;

    match store.update_question(QuestionId(id), update, &session).await {
        Ok(question) => Ok(super::respond(
            warp::http::StatusCode::OK,
            &question,
            Some("Question updated successfully"),
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn delete_question(
    id: i32,
    session: Session,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    match store.delete_question(QuestionId(id), &session).await {
        Ok(_) => Ok(super::done(&format!("Question {} deleted", id))),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
