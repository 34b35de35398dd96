// Accumulated form state (in-memory, one per user session)
//
// NOTE: This is NOT persisted. Each step owns a typed slot; re-submitting a step replaces the
// slot wholesale (last write wins) and nothing is removed except by an explicit restart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wizard::steps::WizardStep;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalDetails {
    pub first_name: String,
    pub last_name: String,
    pub document_type: String,
    pub document_number: String,
    pub birthdate: String,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub mobile_phone: String,
    pub phone: String,
    pub email: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
}

/// Vehicle fields keep the form's original (Spanish) names on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleDetails {
    pub numero_de_matricula: String,
    pub marca: String,
    pub modelo: String,
    pub ano_del_vehiculo: String,
    pub numero_de_serie: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteDetails {
    pub effective_date: String,
    pub expiration_date: String,
    pub payment_method: String,
    pub payment_periodicity: String,
    pub payment_term: String,
}

/// Validated output of one wizard step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    Personal(PersonalDetails),
    Vehicle(VehicleDetails),
    Quote(QuoteDetails),
    Additional,
    Payment,
}

impl StepOutput {
    pub fn step(&self) -> WizardStep {
        match self {
            StepOutput::Personal(_) => WizardStep::PersonalDetails,
            StepOutput::Vehicle(_) => WizardStep::VehicleDetails,
            StepOutput::Quote(_) => WizardStep::Quote,
            StepOutput::Additional => WizardStep::Additional,
            StepOutput::Payment => WizardStep::Payment,
        }
    }

    /// Decode the raw form data the presentation layer posted for `step`.
    ///
    /// Only the fields the step owns are read, so a flat object holding every field of the
    /// form can be fed to each step in turn. Missing fields decode as empty and are left to the
    /// step validator to reject.
    pub fn parse(step: WizardStep, data: &Value) -> Result<Self, serde_json::Error> {
        let output = match step {
            WizardStep::PersonalDetails => StepOutput::Personal(serde_json::from_value(data.clone())?),
            WizardStep::VehicleDetails => StepOutput::Vehicle(serde_json::from_value(data.clone())?),
            WizardStep::Quote => StepOutput::Quote(serde_json::from_value(data.clone())?),
            WizardStep::Additional => StepOutput::Additional,
            WizardStep::Payment => StepOutput::Payment,
        };
        Ok(output)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub personal: Option<PersonalDetails>,
    pub vehicle: Option<VehicleDetails>,
    pub quote: Option<QuoteDetails>,
}

/// Borrowed view over a form state whose required steps are all present.
#[derive(Debug, Clone, Copy)]
pub struct CompletedForm<'a> {
    pub personal: &'a PersonalDetails,
    pub vehicle: &'a VehicleDetails,
    pub quote: &'a QuoteDetails,
}

impl FormState {
    /// Reducer: merge one step's output into the accumulated state.
    pub fn apply(&mut self, output: StepOutput) {
        match output {
            StepOutput::Personal(p) => self.personal = Some(p),
            StepOutput::Vehicle(v) => self.vehicle = Some(v),
            StepOutput::Quote(q) => self.quote = Some(q),
            StepOutput::Additional | StepOutput::Payment => {}
        }
    }

    pub fn completed(&self) -> Option<CompletedForm<'_>> {
        Some(CompletedForm {
            personal: self.personal.as_ref()?,
            vehicle: self.vehicle.as_ref()?,
            quote: self.quote.as_ref()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.personal.is_none() && self.vehicle.is_none() && self.quote.is_none()
    }

    pub fn clear(&mut self) {
        *self = FormState::default();
    }
}

/// Tracking data supplied by the host page. Never collected by a wizard step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub page_url: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub gclid: Option<String>,
    pub ga_client_id: Option<String>,
}
