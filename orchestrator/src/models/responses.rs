// CRM response models and presentation-boundary DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{CrmError, FieldErrors};
use crate::utils::logging::mask_sensitive;

// =========================
// Generic wrapper (matches frontend ApiResponse<T>)
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub correlation_id: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, correlation_id: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            correlation_id: correlation_id.to_string(),
        }
    }

    /// Failure that still carries a payload (field errors, CRM diagnostics).
    pub fn fail_with(data: T, message: impl Into<String>, correlation_id: &str) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(message.into()),
            correlation_id: correlation_id.to_string(),
        }
    }

    pub fn fail(message: impl Into<String>, correlation_id: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            correlation_id: correlation_id.to_string(),
        }
    }
}

// =========================
// OAuth2
// =========================

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub instance_url: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Short-lived bearer credential. Valid for one orchestration run; never cached.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    pub instance_url: String,
    pub issued_at: DateTime<Utc>,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &mask_sensitive(&self.access_token))
            .field("instance_url", &self.instance_url)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

// =========================
// Lead create / update
// =========================

/// CRM-assigned identifiers returned by the create call. Immutable once obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadReference {
    pub lead_result_id: Option<String>,
    pub id_full_operation: Option<String>,
    pub record_id: Option<String>,
}

impl LeadReference {
    /// Extract identifiers from a create response object. `None` when no identifier is present.
    pub fn from_response(body: &Value) -> Option<Self> {
        let text = |key: &str| {
            body.get(key)
                .and_then(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
        };

        let reference = LeadReference {
            lead_result_id: text("leadResultId"),
            id_full_operation: text("idFullOperation"),
            record_id: text("recordId").or_else(|| text("id")),
        };

        if reference.lead_result_id.is_none()
            && reference.id_full_operation.is_none()
            && reference.record_id.is_none()
        {
            return None;
        }
        Some(reference)
    }

    /// Id addressed by the custom partial-update resource.
    pub fn partial_update_id(&self) -> Option<&str> {
        self.id_full_operation
            .as_deref()
            .or(self.lead_result_id.as_deref())
    }

    /// Id addressed by the standard sObject API.
    pub fn sobject_id(&self) -> Option<&str> {
        self.record_id.as_deref().or(self.lead_result_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadOutcome {
    pub reference: LeadReference,
    /// Raw CRM response body, returned to the presentation layer as-is.
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl UpdateResult {
    /// Synthesized outcome for a 2xx response without a body (e.g. `204 No Content`).
    pub fn no_content() -> Self {
        Self {
            success: true,
            body: None,
        }
    }
}

// =========================
// Presentation boundary
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmFailureDto {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl From<&CrmError> for CrmFailureDto {
    fn from(e: &CrmError) -> Self {
        Self {
            message: e.to_string(),
            status: e.status(),
            body: e.body().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_reference: Option<LeadReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crm_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CrmFailureDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTransitionResponse {
    /// Index of the step now on screen; the confirmation screen when confirmed.
    pub step_index: usize,
    /// "step" | "submitting" | "confirmed" | "failed"
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleUpdateResponse {
    pub stage: String,
    pub result: UpdateResult,
}
