use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::models::notification::{Notification, NotificationType};
use crate::services::change_feed::{ChangeFeed, ChangeOp};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const TABLE: &str = "notifications";

pub struct NotificationService {
    database: Arc<SqliteDatabase>,
    feed: ChangeFeed,
}

impl NotificationService {
    pub fn new(database: Arc<SqliteDatabase>, feed: ChangeFeed) -> Self {
        Self { database, feed }
    }

    pub async fn create(
        &self,
        user_id: &Uuid,
        title: &str,
        message: &str,
        notification_type: NotificationType,
        action_link: Option<&str>,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: *user_id,
            title: title.to_string(),
            message: message.to_string(),
            is_read: false,
            notification_type,
            action_link: action_link.map(str::to_string),
            created_at: Utc::now(),
        };

        self.database.store_notification(&notification).await?;
        self.feed.publish(TABLE, ChangeOp::Insert, notification.id, Some(*user_id));
        Ok(notification)
    }

    /// Inserts a notification as a side effect of another operation; a
    /// failure here is logged and never fails the caller.
    pub async fn notify(&self, user_id: &Uuid, title: &str, message: &str, notification_type: NotificationType, action_link: Option<&str>) {
        if let Err(e) = self.create(user_id, title, message, notification_type, action_link).await {
            warn!(action = "notification_insert_failed", user_id = %user_id, error = %e);
        }
    }

    pub async fn get_user_notifications(&self, user_id: &Uuid, limit: Option<i64>) -> Result<Vec<Notification>> {
        let limit = limit.unwrap_or(50).clamp(1, 200);
        self.database.get_user_notifications(user_id, limit).await
    }

    pub async fn mark_read(&self, user_id: &Uuid, notification_id: &Uuid) -> Result<()> {
        if !self.database.mark_notification_read(user_id, notification_id).await? {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        self.feed.publish(TABLE, ChangeOp::Update, notification_id, Some(*user_id));
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: &Uuid) -> Result<u64> {
        self.database.mark_all_notifications_read(user_id).await
    }

    pub async fn delete(&self, user_id: &Uuid, notification_id: &Uuid) -> Result<()> {
        if !self.database.delete_notification(user_id, notification_id).await? {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        self.feed.publish(TABLE, ChangeOp::Delete, notification_id, Some(*user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::tests::sample_profile;

    async fn setup() -> (NotificationService, Uuid) {
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let profile = sample_profile("notify@example.com");
        db.create_profile(&profile).await.unwrap();
        (NotificationService::new(db, ChangeFeed::default()), profile.id)
    }

    #[tokio::test]
    async fn created_notifications_are_listed_unread() {
        let (service, user_id) = setup().await;
        service
            .create(&user_id, "Deposit received", "₦100 credited", NotificationType::Success, Some("/wallet"))
            .await
            .unwrap();

        let list = service.get_user_notifications(&user_id, None).await.unwrap();
        assert_eq!(list.len(), 1);
        assert!(!list[0].is_read);
        assert_eq!(list[0].action_link.as_deref(), Some("/wallet"));
    }

    #[tokio::test]
    async fn user_cannot_touch_someone_elses_notification() {
        let (service, user_id) = setup().await;
        let n = service.create(&user_id, "t", "m", NotificationType::Info, None).await.unwrap();

        let stranger = Uuid::new_v4();
        assert!(matches!(service.mark_read(&stranger, &n.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.delete(&stranger, &n.id).await, Err(AppError::NotFound(_))));

        service.mark_read(&user_id, &n.id).await.unwrap();
        let list = service.get_user_notifications(&user_id, None).await.unwrap();
        assert!(list[0].is_read);
    }

    #[tokio::test]
    async fn mark_all_read_counts_only_unread() {
        let (service, user_id) = setup().await;
        let first = service.create(&user_id, "a", "a", NotificationType::Info, None).await.unwrap();
        service.create(&user_id, "b", "b", NotificationType::Info, None).await.unwrap();
        service.mark_read(&user_id, &first.id).await.unwrap();

        assert_eq!(service.mark_all_read(&user_id).await.unwrap(), 1);
    }
}
