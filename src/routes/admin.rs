use tracing::instrument;

use crate::store::Store;
use crate::types::account::Session;

/// GET /admin/stats
#[instrument(skip(store), fields(user_id = session.user_id.0))]
pub async fn get_platform_stats(
    session: Session,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    super::admin_only(&session, "view platform stats")?;

    match store.get_platform_stats().await {
        Ok(stats) => Ok(super::ok(&stats)),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
