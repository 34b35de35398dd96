// HTTP outcome normalization for CRM lead operations
//
// Pure functions over (status, raw body) so the 2xx/204/error rules can be tested without a
// network. Every failure is logged with the raw body before it is returned.

use log::error;
use serde_json::Value;

use crate::error::CrmError;
use crate::models::responses::{CreateLeadOutcome, LeadReference, UpdateResult};

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn crm_failure(step: &str, status: u16, body: &str) -> CrmError {
    error!(
        "[PHASE: crm] [STEP: {}] CRM request failed (status={}, body={})",
        step, status, body
    );
    CrmError::Crm {
        status,
        body: body.to_string(),
    }
}

fn malformed(step: &str, reason: String, body: &str) -> CrmError {
    error!(
        "[PHASE: crm] [STEP: {}] Malformed CRM response: {} (body={})",
        step, reason, body
    );
    CrmError::MalformedResponse {
        reason,
        body: body.to_string(),
    }
}

/// Create: any 2xx whose JSON body carries an identifier.
///
/// The body may be an object or a one-element array of objects.
pub fn interpret_create_response(status: u16, body: &str) -> Result<CreateLeadOutcome, CrmError> {
    const STEP: &str = "create_lead";
    if !is_success(status) {
        return Err(crm_failure(STEP, status, body));
    }

    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| malformed(STEP, format!("body is not valid JSON: {}", e), body))?;

    let candidate = match &parsed {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    let reference = candidate
        .and_then(LeadReference::from_response)
        .ok_or_else(|| malformed(STEP, "no lead identifier in response".to_string(), body))?;

    Ok(CreateLeadOutcome {
        reference,
        body: parsed,
    })
}

/// Update: 204 or an empty 2xx body is a success; a JSON body is passed through.
pub fn interpret_update_response(status: u16, body: &str) -> Result<UpdateResult, CrmError> {
    const STEP: &str = "update_lead";
    if !is_success(status) {
        return Err(crm_failure(STEP, status, body));
    }
    if status == 204 || body.trim().is_empty() {
        return Ok(UpdateResult::no_content());
    }

    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| malformed(STEP, format!("body is not valid JSON: {}", e), body))?;

    let success = parsed
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    Ok(UpdateResult {
        success,
        body: Some(parsed),
    })
}
