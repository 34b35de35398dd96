// Wizard state machine
//
// Owns the accumulated form state for one user session and sequences every CRM call the
// session makes, strictly one at a time:
//   Step[1..5] --advance past Payment--> Submitting --submit--> Confirmed | Failed
// Failed keeps the form intact and hands control back to the Payment step.

pub mod steps;

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;

use crate::crm::client::CrmGateway;
use crate::error::{CrmError, WizardError};
use crate::mapping::LeadMapper;
use crate::models::requests::{
    ConversionData, LeadEnvelope, LeadProgress, LeadRecord, SObjectKind,
};
use crate::models::responses::{CreateLeadOutcome, LeadReference, UpdateResult};
use crate::models::state::{FormState, SessionContext, StepOutput};
use crate::security::crypto::payload_fingerprint;
use crate::utils::validation::StepValidator;

use self::steps::{WizardStep, CONFIRMATION_INDEX};

#[derive(Debug, Clone, PartialEq)]
pub enum WizardState {
    Step(WizardStep),
    Submitting,
    Confirmed(CreateLeadOutcome),
    Failed { error: String },
}

impl WizardState {
    pub fn label(&self) -> &'static str {
        match self {
            WizardState::Step(_) => "step",
            WizardState::Submitting => "submitting",
            WizardState::Confirmed(_) => "confirmed",
            WizardState::Failed { .. } => "failed",
        }
    }

    /// Index of the screen the presentation layer should show.
    pub fn step_index(&self) -> usize {
        match self {
            WizardState::Step(step) => step.index(),
            WizardState::Submitting | WizardState::Failed { .. } => WizardStep::LAST_INPUT.index(),
            WizardState::Confirmed(_) => CONFIRMATION_INDEX,
        }
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardState::Step(step) => write!(f, "on step {} ({})", step.index(), step),
            WizardState::Submitting => f.write_str("submitting"),
            WizardState::Confirmed(_) => f.write_str("confirmed"),
            WizardState::Failed { .. } => f.write_str("failed"),
        }
    }
}

/// How far the CRM record has progressed since it was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadStage {
    Created,
    Enriched,
    Converted,
}

impl LeadStage {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStage::Created => "created",
            LeadStage::Enriched => "enriched",
            LeadStage::Converted => "converted",
        }
    }
}

/// Error recorded when a submission's future is dropped before the CRM answered.
pub const SUBMISSION_ABANDONED: &str = "submission abandoned before the CRM answered";

pub struct Wizard {
    crm: Arc<dyn CrmGateway>,
    validator: Arc<dyn StepValidator>,
    mapper: LeadMapper,
    context: SessionContext,
    state: WizardState,
    form: FormState,
    lead_reference: Option<LeadReference>,
    stage: Option<LeadStage>,
    last_fingerprint: Option<String>,
    in_flight: bool,
}

impl Wizard {
    pub fn new(
        crm: Arc<dyn CrmGateway>,
        validator: Arc<dyn StepValidator>,
        mapper: LeadMapper,
        context: SessionContext,
    ) -> Self {
        Self {
            crm,
            validator,
            mapper,
            context,
            state: WizardState::Step(WizardStep::FIRST),
            form: FormState::default(),
            lead_reference: None,
            stage: None,
            last_fingerprint: None,
            in_flight: false,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn form_state(&self) -> &FormState {
        &self.form
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn lead_reference(&self) -> Option<&LeadReference> {
        self.lead_reference.as_ref()
    }

    pub fn stage(&self) -> Option<LeadStage> {
        self.stage
    }

    pub fn last_payload_fingerprint(&self) -> Option<&str> {
        self.last_fingerprint.as_deref()
    }

    /// The create payload the form maps to, once every input step holds data.
    pub fn preview_payload(&self) -> Option<LeadEnvelope<LeadRecord>> {
        self.form
            .completed()
            .map(|form| self.mapper.create(&form, &self.context))
    }

    fn ensure_idle(&self) -> Result<(), WizardError> {
        if self.in_flight {
            warn!("[PHASE: wizard] [STEP: guard] Rejected re-entry while a CRM call is in flight");
            return Err(WizardError::InFlight);
        }
        Ok(())
    }

    fn illegal(&self, action: &'static str) -> WizardError {
        warn!(
            "[PHASE: wizard] [STEP: {}] Illegal transition (state={})",
            action, self.state
        );
        WizardError::IllegalTransition {
            action,
            state: self.state.to_string(),
        }
    }

    /// Validate `output` and merge it into the form.
    ///
    /// On validation failure nothing changes and no collaborator besides the validator runs.
    /// From `Failed`, the Payment step may be re-submitted.
    pub fn advance(&mut self, output: StepOutput) -> Result<&WizardState, WizardError> {
        self.ensure_idle()?;

        let current = match &self.state {
            WizardState::Step(step) => *step,
            WizardState::Failed { .. } => WizardStep::LAST_INPUT,
            _ => return Err(self.illegal("advance")),
        };
        if output.step() != current {
            return Err(self.illegal("advance"));
        }

        let errors = self.validator.validate(&output);
        if !errors.is_empty() {
            warn!(
                "[PHASE: wizard] [STEP: advance] Step {} failed validation (fields={:?})",
                current.index(),
                errors.keys().collect::<Vec<_>>()
            );
            return Err(WizardError::Validation {
                step: current,
                errors,
            });
        }

        self.form.apply(output);
        self.state = match current.next() {
            Some(next) => WizardState::Step(next),
            None => WizardState::Submitting,
        };
        info!(
            "[PHASE: wizard] [STEP: advance] Step {} accepted (now {})",
            current.index(),
            self.state
        );
        Ok(&self.state)
    }

    /// Back one step. Never touches the form.
    pub fn retreat(&mut self) -> Result<&WizardState, WizardError> {
        self.ensure_idle()?;

        self.state = match &self.state {
            WizardState::Step(step) => match step.prev() {
                Some(prev) => WizardState::Step(prev),
                None => return Err(self.illegal("retreat")),
            },
            WizardState::Submitting | WizardState::Failed { .. } => {
                WizardState::Step(WizardStep::LAST_INPUT)
            }
            WizardState::Confirmed(_) => return Err(self.illegal("retreat")),
        };
        info!("[PHASE: wizard] [STEP: retreat] Now {}", self.state);
        Ok(&self.state)
    }

    /// Map the form and create the lead, exactly once per call.
    ///
    /// Legal from `Submitting`, or from `Failed` to retry with the untouched form.
    pub async fn submit(&mut self) -> Result<CreateLeadOutcome, WizardError> {
        self.ensure_idle()?;
        if !matches!(
            self.state,
            WizardState::Submitting | WizardState::Failed { .. }
        ) {
            return Err(self.illegal("submit"));
        }

        let Some(payload) = self.preview_payload() else {
            return Err(self.illegal("submit"));
        };

        self.last_fingerprint = match payload_fingerprint(&payload) {
            Ok(fp) => Some(fp),
            Err(e) => {
                warn!(
                    "[PHASE: wizard] [STEP: submit] Could not fingerprint payload: {}",
                    e
                );
                None
            }
        };
        info!(
            "[PHASE: wizard] [STEP: submit] Creating lead (payload_sha256={})",
            self.last_fingerprint.as_deref().unwrap_or("-")
        );

        self.state = WizardState::Submitting;
        let crm = Arc::clone(&self.crm);
        let call = CallGuard::enter(
            self,
            Some(WizardState::Failed {
                error: SUBMISSION_ABANDONED.to_string(),
            }),
        );
        let result = crm.create_lead(&payload).await;
        call.finish();

        match result {
            Ok(outcome) => {
                self.lead_reference = Some(outcome.reference.clone());
                self.stage = Some(LeadStage::Created);
                self.state = WizardState::Confirmed(outcome.clone());
                info!(
                    "[PHASE: wizard] [STEP: submit] Lead confirmed (stage={})",
                    LeadStage::Created.as_str()
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    "[PHASE: wizard] [STEP: submit] Submission failed, form kept for retry: {} (status={:?})",
                    e,
                    e.status()
                );
                self.state = WizardState::Failed {
                    error: e.to_string(),
                };
                Err(WizardError::Crm(e))
            }
        }
    }

    /// Start a new orchestration run. Clears the form and everything learned from the CRM.
    pub fn restart(&mut self) -> Result<&WizardState, WizardError> {
        self.ensure_idle()?;
        if !matches!(
            self.state,
            WizardState::Confirmed(_) | WizardState::Failed { .. }
        ) {
            return Err(self.illegal("restart"));
        }

        self.form.clear();
        self.lead_reference = None;
        self.stage = None;
        self.last_fingerprint = None;
        self.state = WizardState::Step(WizardStep::FIRST);
        info!("[PHASE: wizard] [STEP: restart] Session restarted");
        Ok(&self.state)
    }

    fn require_reference(&self, action: &str) -> Result<LeadReference, WizardError> {
        match &self.lead_reference {
            Some(reference) => Ok(reference.clone()),
            None => {
                warn!(
                    "[PHASE: wizard] [STEP: {}] No lead reference yet; update refused",
                    action
                );
                Err(WizardError::Crm(CrmError::MissingLeadReference))
            }
        }
    }

    fn record_stage(&mut self, reached: LeadStage) {
        self.stage = Some(self.stage.map_or(reached, |s| s.max(reached)));
    }

    /// Custom partial update (status/stage, campaign, conversion fields).
    pub async fn enrich(&mut self, progress: LeadProgress) -> Result<UpdateResult, WizardError> {
        self.ensure_idle()?;
        let reference = self.require_reference("enrich")?;
        let update = self.mapper.update(&reference, &progress, &self.context)?;

        let crm = Arc::clone(&self.crm);
        let call = CallGuard::enter(self, None);
        let result = crm.update_lead(&reference, &update).await;
        call.finish();

        let result = result?;
        if result.success {
            self.record_stage(LeadStage::Enriched);
        }
        info!(
            "[PHASE: wizard] [STEP: enrich] Partial update finished (success={}, stage={:?})",
            result.success, self.stage
        );
        Ok(result)
    }

    /// Terminal won / qualified transition through the standard object API.
    pub async fn convert(
        &mut self,
        object: SObjectKind,
        conversion: ConversionData,
        close_date: Option<NaiveDate>,
    ) -> Result<UpdateResult, WizardError> {
        self.ensure_idle()?;
        let reference = self.require_reference("convert")?;
        let status = self.mapper.won_status(object, &conversion, close_date);

        let crm = Arc::clone(&self.crm);
        let call = CallGuard::enter(self, None);
        let result = crm.update_status(&reference, &status).await;
        call.finish();

        let result = result?;
        if result.success {
            self.record_stage(LeadStage::Converted);
        }
        info!(
            "[PHASE: wizard] [STEP: convert] Status transition finished (object={}, success={}, stage={:?})",
            object, result.success, self.stage
        );
        Ok(result)
    }
}

/// Holds the wizard busy for one CRM call.
///
/// Dropped without `finish` (the caller gave up on the future), it frees the wizard and moves
/// it to `on_abandon` when one is given.
struct CallGuard<'a> {
    wizard: &'a mut Wizard,
    on_abandon: Option<WizardState>,
}

impl<'a> CallGuard<'a> {
    fn enter(wizard: &'a mut Wizard, on_abandon: Option<WizardState>) -> Self {
        wizard.in_flight = true;
        Self { wizard, on_abandon }
    }

    fn finish(mut self) {
        self.on_abandon = None;
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.wizard.in_flight = false;
        if let Some(state) = self.on_abandon.take() {
            warn!(
                "[PHASE: wizard] [STEP: abandoned] CRM call dropped before it answered (now {})",
                state
            );
            self.wizard.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrors;
    use crate::models::requests::{LeadEnvelope, LeadRecord, StatusPayload, UpdateKind};
    use crate::models::state::{PersonalDetails, QuoteDetails, VehicleDetails};
    use crate::utils::validation::FormSchemaValidator;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory gateway: counts calls, records payloads, fails the first `failures` creates.
    struct StubCrm {
        failures: AtomicU32,
        create_calls: AtomicU32,
        update_calls: AtomicU32,
        status_calls: AtomicU32,
        payloads: Mutex<Vec<Value>>,
        updates: Mutex<Vec<UpdateKind>>,
    }

    impl StubCrm {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicU32::new(failures),
                create_calls: AtomicU32::new(0),
                update_calls: AtomicU32::new(0),
                status_calls: AtomicU32::new(0),
                payloads: Mutex::new(Vec::new()),
                updates: Mutex::new(Vec::new()),
            })
        }

        fn network_calls(&self) -> u32 {
            self.create_calls.load(Ordering::SeqCst)
                + self.update_calls.load(Ordering::SeqCst)
                + self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CrmGateway for StubCrm {
        async fn create_lead(
            &self,
            payload: &LeadEnvelope<LeadRecord>,
        ) -> Result<CreateLeadOutcome, CrmError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.payloads
                .lock()
                .unwrap()
                .push(serde_json::to_value(payload).unwrap());

            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(CrmError::Crm {
                    status: 500,
                    body: r#"[{"errorCode":"UNKNOWN_EXCEPTION"}]"#.to_string(),
                });
            }
            let body = json!({"leadResultId": "LR-1", "idFullOperation": "OP-1", "recordId": "00Q1"});
            Ok(CreateLeadOutcome {
                reference: LeadReference::from_response(&body).unwrap(),
                body,
            })
        }

        async fn update_lead(
            &self,
            _reference: &LeadReference,
            update: &UpdateKind,
        ) -> Result<UpdateResult, CrmError> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            self.updates.lock().unwrap().push(update.clone());
            Ok(UpdateResult::no_content())
        }

        async fn update_status(
            &self,
            _reference: &LeadReference,
            status: &StatusPayload,
        ) -> Result<UpdateResult, CrmError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.updates
                .lock()
                .unwrap()
                .push(UpdateKind::StandardObjectPatch {
                    object: status.object,
                    fields: status.to_fields(),
                });
            Ok(UpdateResult::no_content())
        }
    }

    /// Gateway that creates leads when `answers_create` is set and never answers anything else.
    struct Stalled {
        answers_create: bool,
    }

    #[async_trait]
    impl CrmGateway for Stalled {
        async fn create_lead(
            &self,
            _payload: &LeadEnvelope<LeadRecord>,
        ) -> Result<CreateLeadOutcome, CrmError> {
            if !self.answers_create {
                std::future::pending::<()>().await;
            }
            let body = json!({"leadResultId": "LR-2", "idFullOperation": "OP-2"});
            Ok(CreateLeadOutcome {
                reference: LeadReference::from_response(&body).unwrap(),
                body,
            })
        }

        async fn update_lead(
            &self,
            _reference: &LeadReference,
            _update: &UpdateKind,
        ) -> Result<UpdateResult, CrmError> {
            std::future::pending().await
        }

        async fn update_status(
            &self,
            _reference: &LeadReference,
            _status: &StatusPayload,
        ) -> Result<UpdateResult, CrmError> {
            std::future::pending().await
        }
    }

    fn stalled_wizard(answers_create: bool) -> Wizard {
        Wizard::new(
            Arc::new(Stalled { answers_create }),
            Arc::new(FormSchemaValidator::new().unwrap()),
            LeadMapper::default(),
            SessionContext::default(),
        )
    }

    /// Validator that rejects everything and counts how often it was asked.
    struct RejectAll {
        calls: AtomicU32,
    }

    impl StepValidator for RejectAll {
        fn validate(&self, output: &StepOutput) -> FieldErrors {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut errors = FieldErrors::new();
            errors.insert(
                "form".to_string(),
                format!("{} rejected", output.step().as_str()),
            );
            errors
        }
    }

    fn wizard_with(crm: Arc<StubCrm>) -> Wizard {
        Wizard::new(
            crm,
            Arc::new(FormSchemaValidator::new().unwrap()),
            LeadMapper::default(),
            SessionContext {
                utm_campaign: Some("spring".to_string()),
                ..Default::default()
            },
        )
    }

    fn ana_ruiz() -> (PersonalDetails, VehicleDetails, QuoteDetails) {
        let form = json!({
            "firstName": "Ana", "lastName": "Ruiz", "documentType": "DNI",
            "documentNumber": "123", "birthdate": "1990-01-01",
            "mobilePhone": "+17870000000", "phone": "+17870000000",
            "email": "ana@example.com", "numero_de_matricula": "1234ABC",
            "marca": "Toyota", "modelo": "Corolla", "ano_del_vehiculo": "2020",
            "numero_de_serie": "SN1", "effectiveDate": "2025-01-01",
            "expirationDate": "2026-01-01", "paymentMethod": "01",
            "paymentPeriodicity": "01", "paymentTerm": "01"
        });
        (
            serde_json::from_value(form.clone()).unwrap(),
            serde_json::from_value(form.clone()).unwrap(),
            serde_json::from_value(form).unwrap(),
        )
    }

    fn fill_all_steps(w: &mut Wizard) {
        let (personal, vehicle, quote) = ana_ruiz();
        w.advance(StepOutput::Personal(personal)).unwrap();
        w.advance(StepOutput::Vehicle(vehicle)).unwrap();
        w.advance(StepOutput::Quote(quote)).unwrap();
        w.advance(StepOutput::Additional).unwrap();
        w.advance(StepOutput::Payment).unwrap();
    }

    #[test]
    fn starts_on_first_step_with_empty_form() {
        let w = wizard_with(StubCrm::new(0));
        assert_eq!(w.state(), &WizardState::Step(WizardStep::PersonalDetails));
        assert!(w.form_state().is_empty());
        assert!(w.lead_reference().is_none());
        assert_eq!(w.state().step_index(), 1);
    }

    #[test]
    fn invalid_step_makes_no_network_call_and_keeps_state() {
        let crm = StubCrm::new(0);
        let validator = Arc::new(RejectAll {
            calls: AtomicU32::new(0),
        });
        let mut w = Wizard::new(
            crm.clone(),
            validator.clone(),
            LeadMapper::default(),
            SessionContext::default(),
        );

        let err = w
            .advance(StepOutput::Personal(PersonalDetails::default()))
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("form"));
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(crm.network_calls(), 0);
        assert_eq!(w.state(), &WizardState::Step(WizardStep::PersonalDetails));
        assert!(w.form_state().is_empty());
    }

    #[test]
    fn default_validator_reports_field_errors() {
        let crm = StubCrm::new(0);
        let mut w = wizard_with(crm.clone());
        let (mut personal, _, _) = ana_ruiz();
        personal.email = "not-an-email".to_string();

        match w.advance(StepOutput::Personal(personal)) {
            Err(WizardError::Validation { step, errors }) => {
                assert_eq!(step, WizardStep::PersonalDetails);
                assert!(errors.contains_key("email"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(crm.network_calls(), 0);
    }

    #[test]
    fn advance_rejects_output_for_another_step() {
        let mut w = wizard_with(StubCrm::new(0));
        let (_, vehicle, _) = ana_ruiz();
        assert!(matches!(
            w.advance(StepOutput::Vehicle(vehicle)),
            Err(WizardError::IllegalTransition {
                action: "advance",
                ..
            })
        ));
    }

    #[test]
    fn retreat_walks_back_without_touching_form() {
        let mut w = wizard_with(StubCrm::new(0));
        assert!(matches!(
            w.retreat(),
            Err(WizardError::IllegalTransition {
                action: "retreat",
                ..
            })
        ));

        let (personal, vehicle, _) = ana_ruiz();
        w.advance(StepOutput::Personal(personal)).unwrap();
        w.advance(StepOutput::Vehicle(vehicle)).unwrap();
        let before = w.form_state().clone();

        assert_eq!(
            w.retreat().unwrap(),
            &WizardState::Step(WizardStep::VehicleDetails)
        );
        assert_eq!(w.form_state(), &before);
    }

    #[test]
    fn resubmitting_a_step_overwrites_its_slot() {
        let mut w = wizard_with(StubCrm::new(0));
        let (personal, _, _) = ana_ruiz();
        w.advance(StepOutput::Personal(personal.clone())).unwrap();
        w.retreat().unwrap();

        let mut renamed = personal;
        renamed.first_name = "Anabel".to_string();
        w.advance(StepOutput::Personal(renamed)).unwrap();
        assert_eq!(
            w.form_state().personal.as_ref().unwrap().first_name,
            "Anabel"
        );
    }

    #[test]
    fn advancing_past_payment_reaches_submitting() {
        let crm = StubCrm::new(0);
        let mut w = wizard_with(crm.clone());
        fill_all_steps(&mut w);
        assert_eq!(w.state(), &WizardState::Submitting);
        assert_eq!(crm.network_calls(), 0);
    }

    #[tokio::test]
    async fn submit_outside_submitting_is_illegal() {
        let crm = StubCrm::new(0);
        let mut w = wizard_with(crm.clone());
        assert!(matches!(
            w.submit().await,
            Err(WizardError::IllegalTransition {
                action: "submit",
                ..
            })
        ));
        assert_eq!(crm.network_calls(), 0);
    }

    #[tokio::test]
    async fn end_to_end_submission_confirms_with_selected_quote_and_risk() {
        let crm = StubCrm::new(0);
        let mut w = wizard_with(crm.clone());
        fill_all_steps(&mut w);

        let outcome = w.submit().await.unwrap();
        assert_eq!(outcome.reference.partial_update_id(), Some("OP-1"));
        assert!(matches!(w.state(), WizardState::Confirmed(_)));
        assert_eq!(w.state().step_index(), CONFIRMATION_INDEX);
        assert_eq!(w.stage(), Some(LeadStage::Created));
        assert_eq!(crm.create_calls.load(Ordering::SeqCst), 1);

        let payloads = crm.payloads.lock().unwrap();
        let lead = &payloads[0]["leadWrappers"][0];
        assert_eq!(lead["interestProduct"]["quotes"][0]["isSelected"], true);
        let risk: Value =
            serde_json::from_str(lead["interestProduct"]["risk"].as_str().unwrap()).unwrap();
        assert_eq!(risk["Marca__c"], "Toyota");
    }

    #[tokio::test]
    async fn failed_submission_keeps_form_and_retry_sends_identical_payload() {
        let crm = StubCrm::new(1);
        let mut w = wizard_with(crm.clone());
        fill_all_steps(&mut w);
        let form_before = serde_json::to_vec(w.form_state()).unwrap();

        let err = w.submit().await.unwrap_err();
        assert!(matches!(
            err,
            WizardError::Crm(CrmError::Crm { status: 500, .. })
        ));
        assert!(matches!(w.state(), WizardState::Failed { .. }));
        assert_eq!(w.state().step_index(), WizardStep::LAST_INPUT.index());
        assert_eq!(serde_json::to_vec(w.form_state()).unwrap(), form_before);
        assert!(w.lead_reference().is_none());
        let first_fingerprint = w.last_payload_fingerprint().unwrap().to_string();

        w.submit().await.unwrap();
        assert_eq!(w.last_payload_fingerprint(), Some(first_fingerprint.as_str()));
        let payloads = crm.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], payloads[1]);
    }

    #[tokio::test]
    async fn failed_state_allows_going_back_and_resubmitting_payment() {
        let crm = StubCrm::new(1);
        let mut w = wizard_with(crm.clone());
        fill_all_steps(&mut w);
        w.submit().await.unwrap_err();

        assert_eq!(
            w.retreat().unwrap(),
            &WizardState::Step(WizardStep::Payment)
        );
        w.advance(StepOutput::Payment).unwrap();
        assert_eq!(w.state(), &WizardState::Submitting);
        w.submit().await.unwrap();
        assert_eq!(crm.create_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn updates_before_create_fail_fast() {
        let crm = StubCrm::new(0);
        let mut w = wizard_with(crm.clone());

        let err = w.enrich(LeadProgress::default()).await.unwrap_err();
        assert!(matches!(
            err,
            WizardError::Crm(CrmError::MissingLeadReference)
        ));
        let err = w
            .convert(SObjectKind::Lead, ConversionData::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WizardError::Crm(CrmError::MissingLeadReference)
        ));
        assert_eq!(crm.network_calls(), 0);
    }

    #[tokio::test]
    async fn lifecycle_moves_through_enriched_and_converted() {
        let crm = StubCrm::new(0);
        let mut w = wizard_with(crm.clone());
        fill_all_steps(&mut w);
        w.submit().await.unwrap();

        let result = w
            .enrich(LeadProgress {
                status: Some("Contacted".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(w.stage(), Some(LeadStage::Enriched));

        let conversion = ConversionData {
            converted: true,
            conversion_date: NaiveDate::from_ymd_opt(2025, 2, 1),
            policy_number: Some("POL-1".to_string()),
            premium_amount: Some(300.0),
        };
        w.convert(SObjectKind::Opportunity, conversion, None)
            .await
            .unwrap();
        assert_eq!(w.stage(), Some(LeadStage::Converted));

        let updates = crm.updates.lock().unwrap();
        match &updates[0] {
            UpdateKind::LeadPartial(record) => {
                assert_eq!(record.id_full_operation, "OP-1");
                assert_eq!(record.utm_data.utm_campaign.as_deref(), Some("spring"));
            }
            other => panic!("expected partial update, got {:?}", other),
        }
        match &updates[1] {
            UpdateKind::StandardObjectPatch { object, fields } => {
                assert_eq!(*object, SObjectKind::Opportunity);
                assert_eq!(fields["StageName"], "Closed Won");
                assert_eq!(fields["CloseDate"], "2025-02-01");
            }
            other => panic!("expected status patch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn restart_clears_everything() {
        let crm = StubCrm::new(0);
        let mut w = wizard_with(crm.clone());
        assert!(w.restart().is_err());

        fill_all_steps(&mut w);
        w.submit().await.unwrap();
        w.restart().unwrap();

        assert_eq!(w.state(), &WizardState::Step(WizardStep::PersonalDetails));
        assert!(w.form_state().is_empty());
        assert!(w.lead_reference().is_none());
        assert!(w.stage().is_none());
        assert!(w.last_payload_fingerprint().is_none());
    }

    #[test]
    fn preview_payload_needs_every_input_step() {
        let mut w = wizard_with(StubCrm::new(0));
        assert!(w.preview_payload().is_none());

        let (personal, vehicle, _) = ana_ruiz();
        w.advance(StepOutput::Personal(personal)).unwrap();
        w.advance(StepOutput::Vehicle(vehicle)).unwrap();
        assert!(w.preview_payload().is_none());
    }

    #[tokio::test]
    async fn preview_payload_is_what_submit_sends() {
        let crm = StubCrm::new(0);
        let mut w = wizard_with(crm.clone());
        fill_all_steps(&mut w);

        let preview = serde_json::to_value(w.preview_payload().unwrap()).unwrap();
        w.submit().await.unwrap();
        assert_eq!(crm.payloads.lock().unwrap()[0], preview);
    }

    #[tokio::test]
    async fn dropped_submit_fails_the_attempt_and_frees_the_wizard() {
        let mut w = stalled_wizard(false);
        fill_all_steps(&mut w);

        let elapsed = tokio::time::timeout(Duration::from_millis(50), w.submit()).await;
        assert!(elapsed.is_err());
        assert!(!w.in_flight);
        assert_eq!(
            w.state(),
            &WizardState::Failed {
                error: SUBMISSION_ABANDONED.to_string()
            }
        );
        assert!(w.preview_payload().is_some());

        assert_eq!(
            w.retreat().unwrap(),
            &WizardState::Step(WizardStep::Payment)
        );
        w.advance(StepOutput::Payment).unwrap();
        let elapsed = tokio::time::timeout(Duration::from_millis(50), w.submit()).await;
        assert!(elapsed.is_err());

        w.restart().unwrap();
        assert_eq!(w.state(), &WizardState::Step(WizardStep::PersonalDetails));
        assert!(w.form_state().is_empty());
    }

    #[tokio::test]
    async fn dropped_update_keeps_confirmed_lead() {
        let mut w = stalled_wizard(true);
        fill_all_steps(&mut w);
        w.submit().await.unwrap();

        let elapsed =
            tokio::time::timeout(Duration::from_millis(50), w.enrich(LeadProgress::default()))
                .await;
        assert!(elapsed.is_err());
        let elapsed = tokio::time::timeout(
            Duration::from_millis(50),
            w.convert(SObjectKind::Lead, ConversionData::default(), None),
        )
        .await;
        assert!(elapsed.is_err());

        assert!(!w.in_flight);
        assert!(matches!(w.state(), WizardState::Confirmed(_)));
        assert_eq!(w.stage(), Some(LeadStage::Created));
        assert!(w.lead_reference().is_some());
        w.restart().unwrap();
    }
}
