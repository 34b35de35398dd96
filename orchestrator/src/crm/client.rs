// CRM gateway
//
// Every operation acquires its own token, sends one request and normalizes the answer through
// `crm::response`. No retries: a failure is returned to the caller with status and raw body.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;

use crate::auth::token::{PasswordGrantTokenProvider, TokenProvider, TokenPurpose};
use crate::crm::endpoints;
use crate::crm::response::{interpret_create_response, interpret_update_response};
use crate::error::CrmError;
use crate::models::requests::{LeadEnvelope, LeadRecord, StatusPayload, UpdateKind};
use crate::models::responses::{CreateLeadOutcome, LeadReference, UpdateResult};
use crate::settings::CrmSettings;
use crate::utils::logging::mask_bearer;

/// The wizard only ever talks to the CRM through this trait.
/// Production code uses `HttpCrmClient`; tests use in-memory stubs.
#[async_trait]
pub trait CrmGateway: Send + Sync {
    async fn create_lead(
        &self,
        payload: &LeadEnvelope<LeadRecord>,
    ) -> Result<CreateLeadOutcome, CrmError>;

    async fn update_lead(
        &self,
        reference: &LeadReference,
        update: &UpdateKind,
    ) -> Result<UpdateResult, CrmError>;

    async fn update_status(
        &self,
        reference: &LeadReference,
        status: &StatusPayload,
    ) -> Result<UpdateResult, CrmError>;
}

pub struct HttpCrmClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    api_version: String,
}

impl HttpCrmClient {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenProvider>, api_version: &str) -> Self {
        Self {
            http,
            tokens,
            api_version: api_version.to_string(),
        }
    }

    /// Client backed by the password-grant provider, sharing one connection pool.
    pub fn from_settings(settings: &CrmSettings) -> Self {
        let http = reqwest::Client::new();
        let tokens = Arc::new(PasswordGrantTokenProvider::new(
            http.clone(),
            settings.clone(),
        ));
        Self::new(http, tokens, &settings.api_version)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        request: reqwest::RequestBuilder,
        access_token: &str,
        body: &B,
    ) -> Result<(u16, String), CrmError> {
        debug!(
            "[PHASE: crm] [STEP: send] Authorization: {}",
            mask_bearer(&format!("Bearer {}", access_token))
        );
        let resp = request.bearer_auth(access_token).json(body).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        Ok((status, text))
    }
}

#[async_trait]
impl CrmGateway for HttpCrmClient {
    async fn create_lead(
        &self,
        payload: &LeadEnvelope<LeadRecord>,
    ) -> Result<CreateLeadOutcome, CrmError> {
        let token = self.tokens.fetch_token(TokenPurpose::CreateLead).await?;
        let url = endpoints::lead_resource_url(&token.instance_url)?;
        info!(
            "[PHASE: crm] [STEP: create_lead] POST {} (records={})",
            url,
            payload.lead_wrappers.len()
        );

        let (status, body) = self
            .send_json(self.http.post(url), &token.access_token, payload)
            .await?;
        let outcome = interpret_create_response(status, &body)?;

        info!(
            "[PHASE: crm] [STEP: create_lead] Lead created (status={}, lead_result_id={:?}, id_full_operation={:?}, record_id={:?})",
            status,
            outcome.reference.lead_result_id,
            outcome.reference.id_full_operation,
            outcome.reference.record_id
        );
        Ok(outcome)
    }

    async fn update_lead(
        &self,
        reference: &LeadReference,
        update: &UpdateKind,
    ) -> Result<UpdateResult, CrmError> {
        // Resolve the id before spending a token on a request that cannot be addressed.
        let sobject_id = match update {
            UpdateKind::LeadPartial(_) => None,
            UpdateKind::StandardObjectPatch { .. } => Some(
                reference
                    .sobject_id()
                    .ok_or(CrmError::MissingLeadReference)?
                    .to_string(),
            ),
        };

        let purpose = match update {
            UpdateKind::LeadPartial(_) => TokenPurpose::UpdateLead,
            UpdateKind::StandardObjectPatch { .. } => TokenPurpose::UpdateStatus,
        };
        let token = self.tokens.fetch_token(purpose).await?;

        let (status, body) = match (update, sobject_id) {
            (UpdateKind::StandardObjectPatch { object, fields }, Some(id)) => {
                let url =
                    endpoints::sobject_url(&token.instance_url, &self.api_version, *object, &id)?;
                info!(
                    "[PHASE: crm] [STEP: update_lead] PATCH {} (kind={}, fields={})",
                    url,
                    update.label(),
                    fields.len()
                );
                self.send_json(self.http.patch(url), &token.access_token, fields)
                    .await?
            }
            (UpdateKind::LeadPartial(record), _) => {
                let url = endpoints::lead_resource_url(&token.instance_url)?;
                info!(
                    "[PHASE: crm] [STEP: update_lead] POST {} (kind={}, id_full_operation={})",
                    url,
                    update.label(),
                    record.id_full_operation
                );
                let envelope = LeadEnvelope::single(record);
                self.send_json(self.http.post(url), &token.access_token, &envelope)
                    .await?
            }
            (UpdateKind::StandardObjectPatch { .. }, None) => {
                return Err(CrmError::MissingLeadReference)
            }
        };

        let result = interpret_update_response(status, &body)?;
        if result.success {
            info!(
                "[PHASE: crm] [STEP: update_lead] Update accepted (status={}, kind={})",
                status,
                update.label()
            );
        } else {
            warn!(
                "[PHASE: crm] [STEP: update_lead] CRM answered {} but reported success=false (body={})",
                status, body
            );
        }
        Ok(result)
    }

    async fn update_status(
        &self,
        reference: &LeadReference,
        status: &StatusPayload,
    ) -> Result<UpdateResult, CrmError> {
        info!(
            "[PHASE: crm] [STEP: update_status] Status transition (object={}, stage={:?}, status={:?})",
            status.object, status.stage_name, status.status
        );
        let update = UpdateKind::StandardObjectPatch {
            object: status.object,
            fields: status.to_fields(),
        };
        self.update_lead(reference, &update).await
    }
}
