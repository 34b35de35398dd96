// CRM request models (wire schema)
//
// Shapes match the CRM's custom lead REST resource (`/services/apexrest/core/lead/`) and the
// standard sObject API. The create record carries no id at all; the partial update record
// cannot be built without one, so the two shapes cannot be confused at compile time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// =========================
// Envelope
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadEnvelope<T> {
    pub lead_wrappers: Vec<T>,
}

impl<T> LeadEnvelope<T> {
    pub fn single(record: T) -> Self {
        Self {
            lead_wrappers: vec![record],
        }
    }
}

// =========================
// Create (full record)
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub first_name: String,
    pub last_name: String,
    pub document_type: String,
    pub document_number: String,
    pub birthdate: String,
    pub gender: String,         // two-digit code
    pub marital_status: String, // two-digit code
    pub contact_data: ContactData,
    pub interest_product: InterestProduct,
    pub source_data: SourceData,
    pub utm_data: UtmData,
    pub google_analytics_data: GoogleAnalyticsData,
    pub commercial_structure_data: CommercialStructureData,
    pub qualification_data: QualificationData,
    pub conversion_data: ConversionData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactData {
    pub mobile_phone: String,
    pub phone: String,
    pub email: String,
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestProduct {
    pub business_line: String,
    pub sector: String,
    pub product_code: String,
    /// JSON object encoded as a string: the CRM field is typed as text.
    pub risk: String,
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub effective_date: String,
    pub expiration_date: String,
    pub payment_method: String,
    pub payment_periodicity: String,
    pub payment_term: String,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceData {
    pub system_origin: String,
    pub device_type: String,
    pub lead_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    pub ip_data: IpData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtmData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAnalyticsData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialStructureData {
    pub intermediary_code: String,
    pub sales_channel: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionData {
    pub converted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_amount: Option<f64>,
}

// =========================
// Update (custom partial shape)
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdateRecord {
    pub id_full_operation: String,
    pub qualification_data: QualificationData,
    pub utm_data: CampaignData,
    pub conversion_data: ConversionData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
}

/// Caller-side description of how the lead progressed since creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadProgress {
    pub status: Option<String>,
    pub stage: Option<String>,
    pub campaign: Option<String>,
    pub conversion: Option<ConversionData>,
}

// =========================
// Update (standard sObject shape)
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SObjectKind {
    Lead,
    Opportunity,
}

impl SObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SObjectKind::Lead => "Lead",
            SObjectKind::Opportunity => "Opportunity",
        }
    }
}

impl fmt::Display for SObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two update styles the CRM accepts. The client dispatches on the tag; callers never
/// build request bodies themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    /// `POST /services/apexrest/core/lead/` with `{leadWrappers:[LeadUpdateRecord]}`.
    LeadPartial(LeadUpdateRecord),
    /// `PATCH /services/data/vXX.X/sobjects/{object}/{id}` with the fields as the body.
    StandardObjectPatch {
        object: SObjectKind,
        fields: Map<String, Value>,
    },
}

impl UpdateKind {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateKind::LeadPartial(_) => "lead_partial",
            UpdateKind::StandardObjectPatch { .. } => "standard_object_patch",
        }
    }
}

/// Terminal business transition ("won" opportunity / "qualified" lead).
///
/// Field names are CRM-schema specific and are sent verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub object: SObjectKind,
    #[serde(default)]
    pub stage_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub close_date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub policy_number: Option<String>,
    /// Additional sObject fields, passed through untouched.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

pub const POLICY_NUMBER_FIELD: &str = "PolicyNumber__c";

impl StatusPayload {
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.extra.clone();
        if let Some(v) = &self.stage_name {
            fields.insert("StageName".to_string(), Value::String(v.clone()));
        }
        if let Some(v) = &self.status {
            fields.insert("Status".to_string(), Value::String(v.clone()));
        }
        if let Some(v) = self.close_date {
            fields.insert(
                "CloseDate".to_string(),
                Value::String(v.format("%Y-%m-%d").to_string()),
            );
        }
        if let Some(v) = self.amount {
            fields.insert("Amount".to_string(), Value::from(v));
        }
        if let Some(v) = &self.policy_number {
            fields.insert(POLICY_NUMBER_FIELD.to_string(), Value::String(v.clone()));
        }
        fields
    }
}

// =========================
// OAuth2
// =========================

/// `application/x-www-form-urlencoded` body of the resource-owner password grant.
#[derive(Debug, Serialize)]
pub struct PasswordGrantForm<'a> {
    pub grant_type: &'static str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}
