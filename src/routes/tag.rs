use std::collections::HashMap;
use tracing::instrument;

use crate::store::Store;
use crate::types::account::Session;
use crate::types::pagination::extract_pagination;
use crate::types::tag::{self, NewTag, TagId};

pub async fn get_tags(
    params: HashMap<String, String>,
    store: Store,
    page_size: u32,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pagination = extract_pagination(&params, page_size)?;
    let search = params.get("search").cloned().filter(|s| !s.trim().is_empty());

    match store.get_tags(search, pagination).await {
        Ok(page) => Ok(super::ok(&page)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn get_tag(id: i32, store: Store) -> Result<impl warp::Reply, warp::Rejection> {
    match store.get_tag(TagId(id)).await {
        Ok(tag) => Ok(super::ok(&tag)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// GET /tags/name/{name}
pub async fn get_tag_by_name(name: String, store: Store) -> Result<impl warp::Reply, warp::Rejection> {
    let name = tag::normalize_name(&name)?;
    match store.get_tag_by_name(&name).await {
        Ok(tag) => Ok(super::ok(&tag)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[instrument(skip(store), fields(user_id = session.user_id.0))]
pub async fn add_tag(
    session: Session,
    store: Store,
    new_tag: NewTag,
) -> Result<impl warp::Reply, warp::Rejection> {
    let new_tag = new_tag.validate()?;

    match store.add_tag(new_tag).await {
        Ok(tag) => Ok(super::created(&tag, "Tag created successfully")),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn update_tag(
    id: i32,
    session: Session,
    store: Store,
    tag: NewTag,
) -> Result<impl warp::Reply, warp::Rejection> {
    super::admin_only(&session, "change tags")?;
    let tag = tag.validate()?;

    match store.update_tag(TagId(id), tag).await {
        Ok(tag) => Ok(super::respond(
            warp::http::StatusCode::OK,
            &tag,
            Some("Tag updated successfully"),
        )),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn delete_tag(
    id: i32,
    session: Session,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    super::admin_only(&session, "change tags")?;

    match store.delete_tag(TagId(id)).await {
        Ok(_) => Ok(super::done(&format!("Tag {} deleted", id))),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
