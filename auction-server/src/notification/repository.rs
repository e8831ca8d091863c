#[cfg(test)]
use mockall::automock;
use {
    super::entities,
    crate::kernel::{
        db::DB,
        entities::UserId,
    },
    axum::async_trait,
    sqlx::{
        types::Json,
        FromRow,
    },
    std::fmt::Debug,
    time::PrimitiveDateTime,
    tracing::instrument,
};

#[derive(Clone, FromRow, Debug)]
pub struct Notification {
    pub id:            entities::NotificationId,
    pub recipient:     UserId,
    pub title:         String,
    pub body:          String,
    pub metadata:      Json<entities::NotificationMetadata>,
    pub read:          bool,
    pub creation_time: PrimitiveDateTime,
}

impl Notification {
    pub fn from_entity(notification: &entities::Notification) -> Self {
        Self {
            id:            notification.id,
            recipient:     notification.recipient,
            title:         notification.title.clone(),
            body:          notification.body.clone(),
            metadata:      Json(notification.metadata.clone()),
            read:          notification.read,
            creation_time: PrimitiveDateTime::new(
                notification.creation_time.date(),
                notification.creation_time.time(),
            ),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Database: Debug + Send + Sync + 'static {
    async fn add_notification(&self, notification: &Notification) -> anyhow::Result<()>;
}

#[async_trait]
impl Database for DB {
    #[instrument(name = "db_add_notification", skip_all, fields(notification_id = %notification.id))]
    async fn add_notification(&self, notification: &Notification) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO notification (id, recipient, title, body, metadata, read, creation_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(notification.id)
        .bind(notification.recipient)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.metadata)
        .bind(notification.read)
        .bind(notification.creation_time)
        .execute(self)
        .await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Repository {
    db: Box<dyn Database>,
}

impl Repository {
    pub fn new(db: impl Database) -> Self {
        Self { db: Box::new(db) }
    }

    pub async fn add_notification(
        &self,
        notification: &entities::Notification,
    ) -> anyhow::Result<()> {
        self.db
            .add_notification(&Notification::from_entity(notification))
            .await
    }
}
