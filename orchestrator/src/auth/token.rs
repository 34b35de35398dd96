// CRM access token provider (OAuth2 resource-owner password grant)
//
// SECURITY:
// - Credentials come from injected settings; nothing is hard-coded.
// - Never log the password, client secret or access token in clear.
// - No caching: each CRM operation asks for its own token.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::{error, info};

use crate::crm::endpoints;
use crate::error::CrmError;
use crate::models::requests::PasswordGrantForm;
use crate::models::responses::{AuthToken, TokenResponse};
use crate::settings::CrmSettings;
use crate::utils::logging::mask_sensitive;

/// What the token will be used for. Only affects logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    CreateLead,
    UpdateLead,
    UpdateStatus,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::CreateLead => "create_lead",
            TokenPurpose::UpdateLead => "update_lead",
            TokenPurpose::UpdateStatus => "update_status",
        }
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self, purpose: TokenPurpose) -> Result<AuthToken, CrmError>;
}

pub struct PasswordGrantTokenProvider {
    http: reqwest::Client,
    settings: CrmSettings,
}

impl PasswordGrantTokenProvider {
    pub fn new(http: reqwest::Client, settings: CrmSettings) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl TokenProvider for PasswordGrantTokenProvider {
    async fn fetch_token(&self, purpose: TokenPurpose) -> Result<AuthToken, CrmError> {
        let url = endpoints::token_url(&self.settings.login_url)?;
        info!(
            "[PHASE: auth] [STEP: fetch_token] Requesting access token (purpose={}, url={}, client_id={})",
            purpose.as_str(),
            url,
            mask_sensitive(&self.settings.client_id)
        );

        let form = PasswordGrantForm {
            grant_type: "password",
            client_id: &self.settings.client_id,
            client_secret: &self.settings.client_secret,
            username: &self.settings.username,
            password: &self.settings.password,
        };

        let resp = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(transport_failure)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport_failure)?;

        let token = interpret_token_response(status, &body)?;
        info!(
            "[PHASE: auth] [STEP: fetch_token] Access token issued (purpose={}, instance_url={}, issued_at={})",
            purpose.as_str(),
            token.instance_url,
            token.issued_at
        );
        Ok(token)
    }
}

/// Turn the token endpoint's raw answer into an `AuthToken`.
pub fn interpret_token_response(status: u16, body: &str) -> Result<AuthToken, CrmError> {
    if !(200..300).contains(&status) {
        error!(
            "[PHASE: auth] [STEP: fetch_token] Token request failed (status={}, body={})",
            status, body
        );
        return Err(CrmError::Auth {
            status,
            body: body.to_string(),
        });
    }

    let parsed: TokenResponse = serde_json::from_str(body).map_err(|e| {
        error!(
            "[PHASE: auth] [STEP: fetch_token] Token response is not valid JSON: {} (status={})",
            e, status
        );
        CrmError::MalformedResponse {
            reason: format!("token response is not valid JSON: {}", e),
            body: body.to_string(),
        }
    })?;

    let access_token = parsed
        .access_token
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| malformed("token response is missing access_token", body))?;
    let instance_url = parsed
        .instance_url
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| malformed("token response is missing instance_url", body))?;

    Ok(AuthToken {
        access_token,
        instance_url: instance_url.trim_end_matches('/').to_string(),
        issued_at: parse_issued_at(parsed.issued_at.as_deref()).unwrap_or_else(Utc::now),
    })
}

fn transport_failure(e: reqwest::Error) -> CrmError {
    error!(
        "[PHASE: auth] [STEP: fetch_token] Token endpoint unreachable: {}",
        e
    );
    CrmError::AuthTransport(e)
}

fn malformed(reason: &str, body: &str) -> CrmError {
    error!("[PHASE: auth] [STEP: fetch_token] {}", reason);
    CrmError::MalformedResponse {
        reason: reason.to_string(),
        body: body.to_string(),
    }
}

/// `issued_at` is milliseconds since the epoch, sent as a string.
fn parse_issued_at(v: Option<&str>) -> Option<DateTime<Utc>> {
    let millis = v?.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
