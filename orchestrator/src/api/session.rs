// Presentation-layer session API
//
// One `LeadSession` per user session. Every call returns an `ApiResponse` carrying a fresh
// correlation id; nothing here panics or returns `Err` to the caller.

use chrono::NaiveDate;
use log::{info, warn};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::WizardError;
use crate::models::requests::{ConversionData, LeadProgress, SObjectKind};
use crate::models::responses::{
    ApiResponse, CreateLeadOutcome, CrmFailureDto, LifecycleUpdateResponse, StepTransitionResponse,
    SubmissionResponse, UpdateResult,
};
use crate::models::state::StepOutput;
use crate::wizard::steps::WizardStep;
use crate::wizard::{Wizard, WizardState};

pub struct LeadSession {
    session_id: String,
    wizard: Mutex<Wizard>,
}

fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn transition(wizard: &Wizard) -> StepTransitionResponse {
    StepTransitionResponse {
        step_index: wizard.state().step_index(),
        state: wizard.state().label().to_string(),
        field_errors: None,
        submission: None,
    }
}

fn submission(wizard: &Wizard, result: &Result<CreateLeadOutcome, WizardError>) -> SubmissionResponse {
    let payload_fingerprint = wizard.last_payload_fingerprint().map(str::to_string);
    match result {
        Ok(outcome) => SubmissionResponse {
            success: true,
            lead_reference: Some(outcome.reference.clone()),
            crm_response: Some(outcome.body.clone()),
            failure: None,
            payload_fingerprint,
        },
        Err(WizardError::Crm(e)) => SubmissionResponse {
            success: false,
            lead_reference: None,
            crm_response: None,
            failure: Some(CrmFailureDto::from(e)),
            payload_fingerprint,
        },
        Err(other) => SubmissionResponse {
            success: false,
            lead_reference: None,
            crm_response: None,
            failure: Some(CrmFailureDto {
                message: other.to_string(),
                status: None,
                body: None,
            }),
            payload_fingerprint,
        },
    }
}

impl LeadSession {
    pub fn new(wizard: Wizard) -> Self {
        let session_id = new_correlation_id();
        info!(
            "[PHASE: session] [STEP: new] Lead session opened (session_id={})",
            session_id
        );
        Self {
            session_id,
            wizard: Mutex::new(wizard),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Exclusive access to the wizard, or `InFlight` if another call holds it.
    fn lock(
        &self,
        action: &str,
        cid: &str,
    ) -> Result<tokio::sync::MutexGuard<'_, Wizard>, WizardError> {
        self.wizard.try_lock().map_err(|_| {
            warn!(
                "[PHASE: session] [STEP: {}] Busy; rejected (session_id={}, correlation_id={})",
                action, self.session_id, cid
            );
            WizardError::InFlight
        })
    }

    /// Accept the data of `step_index`; passing the last input step submits the lead in the
    /// same call.
    pub async fn submit_step(
        &self,
        step_index: usize,
        data: &Value,
    ) -> ApiResponse<StepTransitionResponse> {
        let cid = new_correlation_id();
        info!(
            "[PHASE: session] [STEP: submit_step] step_index={} (session_id={}, correlation_id={})",
            step_index, self.session_id, cid
        );

        let mut wizard = match self.lock("submit_step", &cid) {
            Ok(w) => w,
            Err(e) => return ApiResponse::fail(e.to_string(), &cid),
        };

        let Some(step) = WizardStep::from_index(step_index) else {
            return ApiResponse::fail(WizardError::UnknownStep(step_index).to_string(), &cid);
        };

        let output = match StepOutput::parse(step, data) {
            Ok(o) => o,
            Err(e) => {
                let mut response = transition(&wizard);
                let mut errors = crate::error::FieldErrors::new();
                errors.insert("form".to_string(), format!("Unreadable form data: {}", e));
                response.field_errors = Some(errors);
                return ApiResponse::fail_with(response, "Step data could not be read", &cid);
            }
        };

        if let Err(e) = wizard.advance(output).map(|_| ()) {
            let mut response = transition(&wizard);
            response.field_errors = e.field_errors().cloned();
            return ApiResponse::fail_with(response, e.to_string(), &cid);
        }

        if *wizard.state() != WizardState::Submitting {
            return ApiResponse::ok(transition(&wizard), &cid);
        }

        let result = wizard.submit().await;
        let mut response = transition(&wizard);
        response.submission = Some(submission(&wizard, &result));
        match result {
            Ok(_) => ApiResponse::ok(response, &cid),
            Err(e) => ApiResponse::fail_with(response, e.to_string(), &cid),
        }
    }

    pub async fn go_back(&self) -> ApiResponse<StepTransitionResponse> {
        let cid = new_correlation_id();
        let mut wizard = match self.lock("go_back", &cid) {
            Ok(w) => w,
            Err(e) => return ApiResponse::fail(e.to_string(), &cid),
        };
        match wizard.retreat().map(|_| ()) {
            Ok(_) => ApiResponse::ok(transition(&wizard), &cid),
            Err(e) => ApiResponse::fail_with(transition(&wizard), e.to_string(), &cid),
        }
    }

    /// Retry a failed submission with the form as it stands.
    pub async fn submit(&self) -> ApiResponse<StepTransitionResponse> {
        let cid = new_correlation_id();
        info!(
            "[PHASE: session] [STEP: submit] Submission requested (session_id={}, correlation_id={})",
            self.session_id, cid
        );
        let mut wizard = match self.lock("submit", &cid) {
            Ok(w) => w,
            Err(e) => return ApiResponse::fail(e.to_string(), &cid),
        };

        let result = wizard.submit().await;
        let mut response = transition(&wizard);
        if !matches!(result, Err(WizardError::IllegalTransition { .. })) {
            response.submission = Some(submission(&wizard, &result));
        }
        match result {
            Ok(_) => ApiResponse::ok(response, &cid),
            Err(e) => ApiResponse::fail_with(response, e.to_string(), &cid),
        }
    }

    pub async fn restart(&self) -> ApiResponse<StepTransitionResponse> {
        let cid = new_correlation_id();
        let mut wizard = match self.lock("restart", &cid) {
            Ok(w) => w,
            Err(e) => return ApiResponse::fail(e.to_string(), &cid),
        };
        match wizard.restart().map(|_| ()) {
            Ok(_) => ApiResponse::ok(transition(&wizard), &cid),
            Err(e) => ApiResponse::fail_with(transition(&wizard), e.to_string(), &cid),
        }
    }

    pub async fn enrich(&self, progress: LeadProgress) -> ApiResponse<LifecycleUpdateResponse> {
        let cid = new_correlation_id();
        info!(
            "[PHASE: session] [STEP: enrich] Partial update requested (session_id={}, correlation_id={})",
            self.session_id, cid
        );
        let mut wizard = match self.lock("enrich", &cid) {
            Ok(w) => w,
            Err(e) => return ApiResponse::fail(e.to_string(), &cid),
        };
        let result = wizard.enrich(progress).await;
        lifecycle_response(&wizard, result, &cid)
    }

    pub async fn convert(
        &self,
        object: SObjectKind,
        conversion: ConversionData,
        close_date: Option<NaiveDate>,
    ) -> ApiResponse<LifecycleUpdateResponse> {
        let cid = new_correlation_id();
        info!(
            "[PHASE: session] [STEP: convert] Status transition requested (object={}, session_id={}, correlation_id={})",
            object, self.session_id, cid
        );
        let mut wizard = match self.lock("convert", &cid) {
            Ok(w) => w,
            Err(e) => return ApiResponse::fail(e.to_string(), &cid),
        };
        let result = wizard.convert(object, conversion, close_date).await;
        lifecycle_response(&wizard, result, &cid)
    }
}

fn lifecycle_response(
    wizard: &Wizard,
    result: Result<UpdateResult, WizardError>,
    cid: &str,
) -> ApiResponse<LifecycleUpdateResponse> {
    let stage = wizard
        .stage()
        .map(|s| s.as_str())
        .unwrap_or("none")
        .to_string();
    match result {
        Ok(result) if result.success => ApiResponse::ok(LifecycleUpdateResponse { stage, result }, cid),
        Ok(result) => ApiResponse::fail_with(
            LifecycleUpdateResponse { stage, result },
            "CRM reported the update as unsuccessful",
            cid,
        ),
        Err(e) => ApiResponse::fail(e.to_string(), cid),
    }
}
