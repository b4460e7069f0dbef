use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::gateways::document_store::DocumentStore;
use crate::models::kyc::{KycDecision, KycReviewRequest, KycSubmission, KycSubmitRequest, UploadedFile};
use crate::models::notification::NotificationType;
use crate::models::profile::KycStatus;
use crate::services::change_feed::{ChangeFeed, ChangeOp};
use crate::services::notification_service::NotificationService;
use crate::utils::validation::Validator;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

pub struct KycService {
    database: Arc<SqliteDatabase>,
    documents: Arc<dyn DocumentStore>,
    notifications: Arc<NotificationService>,
    feed: ChangeFeed,
}

impl KycService {
    pub fn new(
        database: Arc<SqliteDatabase>,
        documents: Arc<dyn DocumentStore>,
        notifications: Arc<NotificationService>,
        feed: ChangeFeed,
    ) -> Self {
        Self { database, documents, notifications, feed }
    }

    pub async fn submit(&self, user_id: &Uuid, request: &KycSubmitRequest) -> Result<KycSubmission> {
        Validator::validate_required("Full name", &request.full_name)?;
        Validator::validate_required("Address", &request.address)?;
        Validator::validate_required("ID type", &request.id_type)?;
        Validator::validate_required("ID number", &request.id_number)?;
        if request.date_of_birth >= Utc::now().date_naive() {
            return Err(AppError::ValidationError("Date of birth must be in the past".to_string()));
        }

        // Both files are decoded before either is uploaded.
        let document = decode_upload("ID document", request.document.as_ref())?;
        let selfie = decode_upload("Selfie", request.selfie.as_ref())?;

        let profile = self
            .database
            .get_profile_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
        if matches!(profile.kyc_status, KycStatus::Pending | KycStatus::Approved) {
            return Err(AppError::ValidationError(format!(
                "KYC already {}",
                profile.kyc_status.as_str()
            )));
        }

        let document_url = self.documents.put(user_id, &document.0, document.1).await?;
        let selfie_url = self.documents.put(user_id, &selfie.0, selfie.1).await?;

        let submission = KycSubmission {
            id: Uuid::new_v4(),
            user_id: *user_id,
            full_name: request.full_name.trim().to_string(),
            date_of_birth: request.date_of_birth,
            address: request.address.trim().to_string(),
            id_type: request.id_type.trim().to_string(),
            id_number: request.id_number.trim().to_string(),
            document_url,
            selfie_url,
            status: KycStatus::Pending,
            admin_notes: None,
            submitted_at: Utc::now(),
            reviewed_at: None,
        };
        self.database.create_kyc_submission(&submission).await?;
        self.database.update_profile_kyc_status(user_id, KycStatus::Pending).await?;
        self.feed.publish("kyc_submissions", ChangeOp::Insert, submission.id, Some(*user_id));
        self.feed.publish("profiles", ChangeOp::Update, user_id, Some(*user_id));

        info!(action = "kyc_submitted", user_id = %user_id, kyc_id = %submission.id);
        Ok(submission)
    }

    pub async fn status(&self, user_id: &Uuid) -> Result<Option<KycSubmission>> {
        self.database.get_kyc_submission_by_user(user_id).await
    }

    pub async fn list(&self, status: Option<KycStatus>, limit: Option<i64>) -> Result<Vec<KycSubmission>> {
        self.database
            .list_kyc_submissions(status, limit.unwrap_or(50).clamp(1, 200))
            .await
    }

    pub async fn review(&self, kyc_id: &Uuid, review: &KycReviewRequest, reviewer: &str) -> Result<KycSubmission> {
        let submission = self
            .database
            .get_kyc_submission(kyc_id)
            .await?
            .ok_or_else(|| AppError::NotFound("KYC submission not found".to_string()))?;
        if submission.status != KycStatus::Pending {
            return Err(AppError::ValidationError("KYC submission has already been reviewed".to_string()));
        }

        let status = match review.decision {
            KycDecision::Approve => KycStatus::Approved,
            KycDecision::Reject => KycStatus::Rejected,
        };
        let notes = review.admin_notes.as_deref().map(str::trim).filter(|n| !n.is_empty());

        self.database
            .update_kyc_status(kyc_id, status, Some(Utc::now()), notes)
            .await?;
        self.database
            .update_profile_kyc_status(&submission.user_id, status)
            .await?;
        self.feed.publish("kyc_submissions", ChangeOp::Update, kyc_id, Some(submission.user_id));
        self.feed.publish("profiles", ChangeOp::Update, submission.user_id, Some(submission.user_id));

        let (title, message, kind) = match status {
            KycStatus::Approved => (
                "KYC approved",
                "Your identity has been verified.".to_string(),
                NotificationType::Success,
            ),
            _ => (
                "KYC rejected",
                format!("Your verification was rejected: {}", notes.unwrap_or("no reason given")),
                NotificationType::Warning,
            ),
        };
        self.notifications
            .notify(&submission.user_id, title, &message, kind, Some("/kyc"))
            .await;

        info!(action = "kyc_reviewed", kyc_id = %kyc_id, status = status.as_str(), reviewer = %reviewer);
        self.database
            .get_kyc_submission(kyc_id)
            .await?
            .ok_or_else(|| AppError::NotFound("KYC submission not found".to_string()))
    }
}

fn decode_upload(label: &str, file: Option<&UploadedFile>) -> Result<(String, Vec<u8>)> {
    let file = file
        .filter(|f| !f.content_base64.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError(format!("{} is required", label)))?;

    // Accept data URLs as sent by browsers.
    let payload = file
        .content_base64
        .split_once(";base64,")
        .map(|(_, data)| data)
        .unwrap_or(&file.content_base64);
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::ValidationError(format!("{} is not valid base64", label)))?;

    if bytes.is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", label)));
    }
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(AppError::ValidationError(format!("{} exceeds 5 MB", label)));
    }
    Ok((file.file_name.clone(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::tests::sample_profile;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        puts: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn put(&self, owner: &Uuid, file_name: &str, _bytes: Vec<u8>) -> Result<String> {
            let n = self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(format!("/uploads/{}/{}-{}", owner, n, file_name))
        }
    }

    struct Harness {
        service: KycService,
        store: Arc<CountingStore>,
        database: Arc<SqliteDatabase>,
        user_id: Uuid,
    }

    async fn harness() -> Harness {
        let database = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let profile = sample_profile("kyc@example.com");
        database.create_profile(&profile).await.unwrap();
        let feed = ChangeFeed::default();
        let store = Arc::new(CountingStore::default());
        let notifications = Arc::new(NotificationService::new(database.clone(), feed.clone()));
        let service = KycService::new(database.clone(), store.clone(), notifications, feed);
        Harness { service, store, database, user_id: profile.id }
    }

    fn file(name: &str) -> Option<UploadedFile> {
        Some(UploadedFile {
            file_name: name.to_string(),
            content_base64: general_purpose::STANDARD.encode(b"image-bytes"),
        })
    }

    fn request() -> KycSubmitRequest {
        KycSubmitRequest {
            full_name: "Ada Obi".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1994, 3, 12).unwrap(),
            address: "12 Allen Avenue, Ikeja".to_string(),
            id_type: "nin".to_string(),
            id_number: "12345678901".to_string(),
            document: file("nin.jpg"),
            selfie: file("selfie.jpg"),
        }
    }

    #[tokio::test]
    async fn missing_document_is_rejected_before_upload() {
        let h = harness().await;
        let mut req = request();
        req.document = None;

        let err = h.service.submit(&h.user_id, &req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(h.store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_selfie_is_rejected_before_upload() {
        let h = harness().await;
        let mut req = request();
        req.selfie = Some(UploadedFile { file_name: "s.jpg".to_string(), content_base64: String::new() });

        assert!(h.service.submit(&h.user_id, &req).await.is_err());
        assert_eq!(h.store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submission_uploads_both_files_and_marks_profile_pending() {
        let h = harness().await;
        let submission = h.service.submit(&h.user_id, &request()).await.unwrap();

        assert_eq!(h.store.puts.load(Ordering::SeqCst), 2);
        assert!(submission.document_url.ends_with("nin.jpg"));
        assert_eq!(submission.status, KycStatus::Pending);

        let profile = h.database.get_profile_by_id(&h.user_id).await.unwrap().unwrap();
        assert_eq!(profile.kyc_status, KycStatus::Pending);

        let again = h.service.submit(&h.user_id, &request()).await.unwrap_err();
        assert!(matches!(again, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn review_updates_profile_and_notifies() {
        let h = harness().await;
        let submission = h.service.submit(&h.user_id, &request()).await.unwrap();

        let reviewed = h
            .service
            .review(
                &submission.id,
                &KycReviewRequest { decision: KycDecision::Reject, admin_notes: Some("Blurry photo".to_string()) },
                "ops@tradevault.ng",
            )
            .await
            .unwrap();
        assert_eq!(reviewed.status, KycStatus::Rejected);
        assert_eq!(reviewed.admin_notes.as_deref(), Some("Blurry photo"));
        assert!(reviewed.reviewed_at.is_some());

        let profile = h.database.get_profile_by_id(&h.user_id).await.unwrap().unwrap();
        assert_eq!(profile.kyc_status, KycStatus::Rejected);

        let notes = h.database.get_user_notifications(&h.user_id, 10).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "KYC rejected");

        // Rejected users may resubmit.
        assert!(h.service.submit(&h.user_id, &request()).await.is_ok());
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let encoded = format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(b"png"));
        let upload = UploadedFile { file_name: "a.png".to_string(), content_base64: encoded };
        let (_, bytes) = decode_upload("Selfie", Some(&upload)).unwrap();
        assert_eq!(bytes, b"png");
    }
}
