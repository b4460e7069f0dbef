use crate::models::profile::KycStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KycSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub id_type: String,
    pub id_number: String,
    pub document_url: String,
    pub selfie_url: String,
    pub status: KycStatus,
    pub admin_notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// A file sent inline with a JSON request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KycSubmitRequest {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub id_type: String,
    pub id_number: String,
    pub document: Option<UploadedFile>,
    pub selfie: Option<UploadedFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KycDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KycReviewRequest {
    pub decision: KycDecision,
    pub admin_notes: Option<String>,
}
