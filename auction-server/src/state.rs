use {
    crate::{
        api::{
            ws::WsState,
            RestError,
        },
        auction,
        kernel::db::DB,
        models::User,
    },
    std::sync::Arc,
    tokio_util::task::TaskTracker,
};

pub struct Store {
    pub db: DB,
    pub ws: WsState,
}

impl Store {
    /// Resolves a bearer token to its user. Token issuance and refresh live
    /// in the marketplace account service; this server only verifies.
    pub async fn get_user_by_access_token(&self, token: &str) -> Result<User, RestError> {
        sqlx::query_as::<_, User>(
            "SELECT u.id, u.name, u.role FROM \"user\" u \
             JOIN access_token t ON t.user_id = u.id \
             WHERE t.token = $1 AND t.revoked = false",
        )
        .bind(token)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => RestError::Unauthorized,
            _ => {
                tracing::error!(error = e.to_string(), "Failed to get user from db");
                RestError::TemporarilyUnavailable
            }
        })
    }
}

pub struct StoreNew {
    pub store:           Arc<Store>,
    pub auction_service: auction::service::Service,
    pub task_tracker:    TaskTracker,
}
