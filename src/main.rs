#![recursion_limit = "256"]
#![warn(clippy::all)]

use chrono::Utc;
use handle_errors::return_error;
use tracing::{Level, event};
use tracing_subscriber::fmt::format::FmtSpan;
use warp::{Filter, http::Method};

mod acceptance;
mod config;
mod ledger;
mod listing;
mod realtime;
mod reputation;
mod routes;
mod store;
mod types;

use routes::authentication::{TokenKey, auth};

const PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// 보관 기간이 지난 읽은 알림을 한 시간마다 지운다.
fn spawn_notification_pruning(store: store::Store, retention_days: u32) {
    if retention_days == 0 {
        return;
    }
    let retention = chrono::Duration::days(i64::from(retention_days));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = store.prune_notifications(Utc::now() - retention).await {
                event!(Level::ERROR, "notification pruning failed: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), handle_errors::Error> {
    let config = config::Config::new()?;

    // 1단계: RUST_LOG가 있으면 그 값을, 없으면 설정의 log_level을 쓴다
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        // 각 범위가 닫힐 때 이벤트를 기록한다
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let store = store::Store::new(&config.database_url(), config.max_connections)
        .await
        .map_err(handle_errors::Error::DatabaseQueryError)?;

    sqlx::migrate!()
        .run(&store.clone().connection)
        .await
        .map_err(handle_errors::Error::MigrationError)?;

    spawn_notification_pruning(store.clone(), config.notification_retention_days);

    let registry = realtime::Registry::new();
    let key = TokenKey::new(&config.paseto_key);
    let page_size = config.page_size;

    let store_filter = warp::any().map(move || store.clone());
    let registry_filter = warp::any().map(move || registry.clone());
    let key_filter = {
        let key = key.clone();
        warp::any().map(move || key.clone())
    };
    let page_size_filter = warp::any().map(move || page_size);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["Content-Type", "Authorization"])
        .allow_methods(&[Method::PUT, Method::DELETE, Method::POST, Method::GET]);

    // 계정
    let registration = warp::post()
        .and(warp::path("registration"))
        .and(warp::path::end())
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(routes::authentication::register);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(store_filter.clone())
        .and(key_filter.clone())
        .and(warp::body::json())
        .and_then(routes::authentication::login);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and_then(routes::authentication::logout);

    let get_leaderboard = warp::get()
        .and(warp::path("users"))
        .and(warp::path("leaderboard"))
        .and(warp::path::end())
        .and(warp::query())
        .and(store_filter.clone())
        .and_then(routes::user::get_leaderboard);

    let get_platform_stats = warp::get()
        .and(warp::path("admin"))
        .and(warp::path("stats"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and_then(routes::admin::get_platform_stats);

    let get_user = warp::get()
        .and(warp::path("users"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(store_filter.clone())
        .and_then(routes::user::get_user);

    // 질문
    let get_questions = warp::get()
        .and(warp::path("questions"))
        .and(warp::path::end())
        .and(warp::query())
        .and(store_filter.clone())
        .and(page_size_filter.clone())
        .and_then(routes::question::get_questions);

    let get_question = warp::get()
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(store_filter.clone())
        .and_then(routes::question::get_question);

    let get_questions_by_user = warp::get()
        .and(warp::path("users"))
        .and(warp::path::param::<i32>())
        .and(warp::path("questions"))
        .and(warp::path::end())
        .and(warp::query())
        .and(store_filter.clone())
        .and(page_size_filter.clone())
        .and_then(routes::question::get_questions_by_user);

    let add_question = warp::post()
        .and(warp::path("questions"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(routes::question::add_question);

    let update_question = warp::put()
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(routes::question::update_question);

    let delete_question = warp::delete()
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and_then(routes::question::delete_question);

    // 답변
    let get_answers = warp::get()
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path("answers"))
        .and(warp::path::end())
        .and(warp::query())
        .and(store_filter.clone())
        .and(page_size_filter.clone())
        .and_then(routes::answer::get_answers);

    let get_answers_by_user = warp::get()
        .and(warp::path("users"))
        .and(warp::path::param::<i32>())
        .and(warp::path("answers"))
        .and(warp::path::end())
        .and(warp::query())
        .and(store_filter.clone())
        .and(page_size_filter.clone())
        .and_then(routes::answer::get_answers_by_user);

    let add_answer = warp::post()
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path("answers"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(registry_filter.clone())
        .and(warp::body::json())
        .and_then(routes::answer::add_answer);

    let delete_answer = warp::delete()
        .and(warp::path("answers"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and_then(routes::answer::delete_answer);

    let accept_answer = warp::put()
        .and(warp::path("answers"))
        .and(warp::path::param::<i32>())
        .and(warp::path("accept"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(registry_filter.clone())
        .and_then(routes::answer::accept_answer);

    let unaccept_answer = warp::put()
        .and(warp::path("answers"))
        .and(warp::path::param::<i32>())
        .and(warp::path("unaccept"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and_then(routes::answer::unaccept_answer);

    // 투표
    let cast_vote = warp::post()
        .and(warp::path("votes"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(registry_filter.clone())
        .and(warp::body::json())
        .and_then(routes::vote::cast_vote);

    let get_vote_history = warp::get()
        .and(warp::path("votes"))
        .and(warp::path("history"))
        .and(warp::path::end())
        .and(warp::query())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(page_size_filter.clone())
        .and_then(routes::vote::get_vote_history);

    let get_vote_counts = warp::get()
        .and(warp::path("votes"))
        .and(warp::path::param::<String>())
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(store_filter.clone())
        .and_then(routes::vote::get_vote_counts);

    let get_my_vote = warp::get()
        .and(warp::path("votes"))
        .and(warp::path::param::<String>())
        .and(warp::path::param::<i32>())
        .and(warp::path("mine"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and_then(routes::vote::get_my_vote);

    let remove_vote = warp::delete()
        .and(warp::path("votes"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and_then(routes::vote::remove_vote);

    // 태그
    let get_tags = warp::get()
        .and(warp::path("tags"))
        .and(warp::path::end())
        .and(warp::query())
        .and(store_filter.clone())
        .and(page_size_filter.clone())
        .and_then(routes::tag::get_tags);

    let get_tag_by_name = warp::get()
        .and(warp::path("tags"))
        .and(warp::path("name"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(store_filter.clone())
        .and_then(routes::tag::get_tag_by_name);

    let get_tag = warp::get()
        .and(warp::path("tags"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(store_filter.clone())
        .and_then(routes::tag::get_tag);

    let add_tag = warp::post()
        .and(warp::path("tags"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(routes::tag::add_tag);

    let update_tag = warp::put()
        .and(warp::path("tags"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(warp::body::json())
        .and_then(routes::tag::update_tag);

    let delete_tag = warp::delete()
        .and(warp::path("tags"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and_then(routes::tag::delete_tag);

    // 알림
    let get_notifications = warp::get()
        .and(warp::path("notifications"))
        .and(warp::path::end())
        .and(warp::query())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(page_size_filter.clone())
        .and_then(routes::notification::get_notifications);

    let get_unread_count = warp::get()
        .and(warp::path("notifications"))
        .and(warp::path("unread-count"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and_then(routes::notification::get_unread_count);

    let mark_all_read = warp::put()
        .and(warp::path("notifications"))
        .and(warp::path("read-all"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(registry_filter.clone())
        .and_then(routes::notification::mark_all_read);

    let mark_read = warp::put()
        .and(warp::path("notifications"))
        .and(warp::path::param::<i32>())
        .and(warp::path("read"))
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(registry_filter.clone())
        .and_then(routes::notification::mark_read);

    let delete_notification = warp::delete()
        .and(warp::path("notifications"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth(key.clone()))
        .and(store_filter.clone())
        .and(registry_filter.clone())
        .and_then(routes::notification::delete_notification);

    // 실시간 채널
    let websocket = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::query())
        .and(store_filter.clone())
        .and(registry_filter.clone())
        .and(key_filter.clone())
        .and_then(routes::realtime::connect);

    let routes = registration
        .or(login)
        .or(logout)
        .or(get_leaderboard)
        .or(get_platform_stats)
        .or(get_user)
        .or(get_questions)
        .or(get_question)
        .or(get_questions_by_user)
        .or(add_question)
        .or(update_question)
        .or(delete_question)
        .or(get_answers)
        .or(get_answers_by_user)
        .or(add_answer)
        .or(delete_answer)
        .or(accept_answer)
        .or(unaccept_answer)
        .or(cast_vote)
        .or(get_vote_history)
        .or(get_vote_counts)
        .or(get_my_vote)
        .or(remove_vote)
        .or(get_tags)
        .or(get_tag_by_name)
        .or(get_tag)
        .or(add_tag)
        .or(update_tag)
        .or(delete_tag)
        .or(get_notifications)
        .or(get_unread_count)
        .or(mark_all_read)
        .or(mark_read)
        .or(delete_notification)
        .or(websocket)
        .with(cors)
        .with(warp::trace(|info| {
            tracing::info_span!(
                "request",
                method = %info.method(),
                path = %info.path(),
                id = %uuid::Uuid::new_v4(),
            )
        }))
        .recover(return_error);

    event!(Level::INFO, port = config.port, "stackit listening");
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;

    Ok(())
}
