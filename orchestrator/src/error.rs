// Error taxonomy
//
// Validation errors stay inside the wizard; every network-originating failure surfaces as a
// `CrmError` carrying the HTTP status and raw body so support can diagnose it from the UI.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::wizard::steps::WizardStep;

/// Per-field validation messages keyed by wire field name.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("token request failed with HTTP {status}")]
    Auth { status: u16, body: String },

    /// The token endpoint could not be reached or its answer could not be read.
    #[error("token request failed: {0}")]
    AuthTransport(#[source] reqwest::Error),

    #[error("CRM request failed with HTTP {status}")]
    Crm { status: u16, body: String },

    #[error("malformed CRM response: {reason}")]
    MalformedResponse { reason: String, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid CRM endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("no lead reference: the lead must be created before it can be updated")]
    MissingLeadReference,
}

impl CrmError {
    /// HTTP status attached to the failure, if the CRM answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            CrmError::Auth { status, .. } | CrmError::Crm { status, .. } => Some(*status),
            CrmError::Transport(e) | CrmError::AuthTransport(e) => {
                e.status().map(|s| s.as_u16())
            }
            _ => None,
        }
    }

    /// Raw response body, for display alongside the failure.
    pub fn body(&self) -> Option<&str> {
        match self {
            CrmError::Auth { body, .. }
            | CrmError::Crm { body, .. }
            | CrmError::MalformedResponse { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("{step} failed validation ({} field error(s))", errors.len())]
    Validation {
        step: WizardStep,
        errors: FieldErrors,
    },

    #[error("cannot {action} while {state}")]
    IllegalTransition { action: &'static str, state: String },

    #[error("a CRM call is already in flight for this session")]
    InFlight,

    #[error("unknown wizard step index {0}")]
    UnknownStep(usize),

    #[error(transparent)]
    Crm(#[from] CrmError),
}

impl WizardError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            WizardError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("missing CRM credential: {0}")]
    MissingCredential(&'static str),
}
