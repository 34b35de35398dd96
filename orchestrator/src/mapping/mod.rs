// Field mapper: accumulated form state -> CRM wire schema
//
// Pure and deterministic. Constant values come from `LeadDefaults`; tracking values come from
// the `SessionContext`; everything else comes from the completed form.

pub mod codes;

use chrono::NaiveDate;
use log::debug;
use serde_json::json;

use crate::error::CrmError;
use crate::models::requests::{
    Address, CampaignData, CommercialStructureData, ContactData, ConversionData,
    GoogleAnalyticsData, InterestProduct, IpData, LeadEnvelope, LeadProgress, LeadRecord,
    LeadUpdateRecord, QualificationData, Quote, SObjectKind, SourceData, StatusPayload,
    UpdateKind, UtmData,
};
use crate::models::responses::LeadReference;
use crate::models::state::{CompletedForm, SessionContext, VehicleDetails};
use crate::settings::LeadDefaults;

/// Keys of the string-encoded vehicle risk object, as named by the CRM.
pub const RISK_PLATE_KEY: &str = "Número de matrícula__c";
pub const RISK_MAKE_KEY: &str = "Marca__c";
pub const RISK_MODEL_KEY: &str = "Modelo__c";
pub const RISK_YEAR_KEY: &str = "Año del vehículo__c";
pub const RISK_SERIAL_KEY: &str = "Número de serie__c";

#[derive(Debug, Clone, Default)]
pub struct LeadMapper {
    defaults: LeadDefaults,
}

impl LeadMapper {
    pub fn new(defaults: LeadDefaults) -> Self {
        Self { defaults }
    }

    /// Full create record. Never carries a record id.
    pub fn create(&self, form: &CompletedForm<'_>, ctx: &SessionContext) -> LeadEnvelope<LeadRecord> {
        let p = form.personal;
        let q = form.quote;
        let d = &self.defaults;

        let record = LeadRecord {
            first_name: p.first_name.trim().to_string(),
            last_name: p.last_name.trim().to_string(),
            document_type: p.document_type.trim().to_string(),
            document_number: p.document_number.trim().to_string(),
            birthdate: p.birthdate.trim().to_string(),
            gender: codes::gender_code(p.gender.as_deref()).to_string(),
            marital_status: codes::marital_status_code(p.marital_status.as_deref()).to_string(),
            contact_data: ContactData {
                mobile_phone: p.mobile_phone.trim().to_string(),
                phone: p.phone.trim().to_string(),
                email: p.email.trim().to_string(),
                address: Address {
                    street: non_blank(&p.street),
                    city: non_blank(&p.city),
                    postal_code: non_blank(&p.postal_code),
                    province: non_blank(&p.province),
                    country: non_blank(&p.country),
                },
            },
            interest_product: InterestProduct {
                business_line: d.business_line.clone(),
                sector: d.sector.clone(),
                product_code: d.product_code.clone(),
                risk: serialize_risk(form.vehicle),
                quotes: vec![Quote {
                    effective_date: q.effective_date.trim().to_string(),
                    expiration_date: q.expiration_date.trim().to_string(),
                    payment_method: q.payment_method.trim().to_string(),
                    payment_periodicity: q.payment_periodicity.trim().to_string(),
                    payment_term: q.payment_term.trim().to_string(),
                    is_selected: true,
                }],
            },
            source_data: SourceData {
                system_origin: d.system_origin.clone(),
                device_type: d.device_type.clone(),
                lead_source: d.lead_source.clone(),
                page_url: ctx.page_url.clone(),
                ip_data: IpData {
                    ip_address: ctx.ip_address.clone(),
                    user_agent: ctx.user_agent.clone(),
                },
            },
            utm_data: UtmData {
                utm_source: ctx.utm_source.clone(),
                utm_medium: ctx.utm_medium.clone(),
                utm_campaign: ctx.utm_campaign.clone(),
                utm_term: ctx.utm_term.clone(),
                utm_content: ctx.utm_content.clone(),
            },
            google_analytics_data: GoogleAnalyticsData {
                gclid: ctx.gclid.clone(),
                client_id: ctx.ga_client_id.clone(),
            },
            commercial_structure_data: CommercialStructureData {
                intermediary_code: d.intermediary_code.clone(),
                sales_channel: d.sales_channel.clone(),
            },
            qualification_data: QualificationData {
                status: Some(d.initial_status.clone()),
                stage: Some(d.initial_stage.clone()),
            },
            conversion_data: ConversionData::default(),
        };

        debug!(
            "[PHASE: mapping] [STEP: create] Create record mapped (quotes={}, gender={}, marital_status={})",
            record.interest_product.quotes.len(),
            record.gender,
            record.marital_status
        );

        LeadEnvelope::single(record)
    }

    /// Custom partial update: record id plus status/stage, campaign and conversion fields only.
    pub fn update(
        &self,
        reference: &LeadReference,
        progress: &LeadProgress,
        ctx: &SessionContext,
    ) -> Result<UpdateKind, CrmError> {
        let id = reference
            .partial_update_id()
            .ok_or(CrmError::MissingLeadReference)?;

        let record = LeadUpdateRecord {
            id_full_operation: id.to_string(),
            qualification_data: QualificationData {
                status: progress.status.clone(),
                stage: progress.stage.clone(),
            },
            utm_data: CampaignData {
                utm_campaign: progress
                    .campaign
                    .clone()
                    .or_else(|| ctx.utm_campaign.clone()),
            },
            conversion_data: progress.conversion.clone().unwrap_or_default(),
        };

        debug!(
            "[PHASE: mapping] [STEP: update] Partial update mapped (status={:?}, stage={:?})",
            record.qualification_data.status, record.qualification_data.stage
        );

        Ok(UpdateKind::LeadPartial(record))
    }

    /// Terminal "won / qualified" transition for `object`.
    ///
    /// A Lead is forced to the configured converted status (`Qualified` unless overridden);
    /// this value has not been confirmed by the CRM schema owner. An Opportunity moves to the
    /// configured won stage and closes on `close_date` (today if absent).
    pub fn won_status(
        &self,
        object: SObjectKind,
        conversion: &ConversionData,
        close_date: Option<NaiveDate>,
    ) -> StatusPayload {
        let mut payload = StatusPayload {
            object,
            stage_name: None,
            status: None,
            close_date: None,
            amount: conversion.premium_amount,
            policy_number: conversion.policy_number.clone(),
            extra: Default::default(),
        };
        match object {
            SObjectKind::Lead => {
                payload.status = Some(self.defaults.converted_lead_status.clone());
            }
            SObjectKind::Opportunity => {
                payload.stage_name = Some(self.defaults.won_opportunity_stage.clone());
                payload.close_date = Some(
                    close_date
                        .or(conversion.conversion_date)
                        .unwrap_or_else(|| chrono::Utc::now().date_naive()),
                );
            }
        }
        payload
    }
}

/// Vehicle attributes as a JSON object encoded into a string.
pub fn serialize_risk(vehicle: &VehicleDetails) -> String {
    json!({
        RISK_PLATE_KEY: vehicle.numero_de_matricula.trim(),
        RISK_MAKE_KEY: vehicle.marca.trim(),
        RISK_MODEL_KEY: vehicle.modelo.trim(),
        RISK_YEAR_KEY: vehicle.ano_del_vehiculo.trim(),
        RISK_SERIAL_KEY: vehicle.numero_de_serie.trim(),
    })
    .to_string()
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
