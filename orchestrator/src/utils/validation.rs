// Input validation utilities
//
// Step-schema validation is a pluggable collaborator: the wizard only needs `StepValidator`.
// `FormSchemaValidator` carries the default field rules of the quote form.

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;

use crate::error::FieldErrors;
use crate::models::state::{PersonalDetails, QuoteDetails, StepOutput, VehicleDetails};

pub trait StepValidator: Send + Sync {
    /// Validate one step's output. Empty map means valid.
    fn validate(&self, output: &StepOutput) -> FieldErrors;
}

pub struct FormSchemaValidator {
    email_re: Regex,
    phone_re: Regex,
    code_re: Regex,
    year_re: Regex,
}

impl FormSchemaValidator {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            email_re: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")?,
            phone_re: Regex::new(r"^\+?[0-9]{7,15}$")?,
            code_re: Regex::new(r"^[0-9]{2}$")?,
            year_re: Regex::new(r"^[0-9]{4}$")?,
        })
    }

    fn personal(&self, p: &PersonalDetails, errors: &mut FieldErrors) {
        required(errors, "firstName", &p.first_name, "First name is required");
        required(errors, "lastName", &p.last_name, "Last name is required");
        required(errors, "documentType", &p.document_type, "Document type is required");
        required(
            errors,
            "documentNumber",
            &p.document_number,
            "Document number is required",
        );

        match parse_date(&p.birthdate) {
            None => {
                errors.insert(
                    "birthdate".to_string(),
                    "Birthdate must be a date (YYYY-MM-DD)".to_string(),
                );
            }
            Some(d) if d > Utc::now().date_naive() => {
                errors.insert(
                    "birthdate".to_string(),
                    "Birthdate cannot be in the future".to_string(),
                );
            }
            Some(_) => {}
        }

        if !self.email_re.is_match(p.email.trim()) {
            errors.insert("email".to_string(), "Email address is invalid".to_string());
        }
        for (field, value) in [("mobilePhone", &p.mobile_phone), ("phone", &p.phone)] {
            if !self.phone_re.is_match(value.trim()) {
                errors.insert(field.to_string(), "Phone number is invalid".to_string());
            }
        }
    }

    fn vehicle(&self, v: &VehicleDetails, errors: &mut FieldErrors) {
        required(
            errors,
            "numero_de_matricula",
            &v.numero_de_matricula,
            "Plate number is required",
        );
        required(errors, "marca", &v.marca, "Make is required");
        required(errors, "modelo", &v.modelo, "Model is required");
        required(
            errors,
            "numero_de_serie",
            &v.numero_de_serie,
            "Serial number is required",
        );

        let year = v.ano_del_vehiculo.trim();
        let max_year = Utc::now().year() + 1;
        let valid_year = self.year_re.is_match(year)
            && year
                .parse::<i32>()
                .map(|y| (1900..=max_year).contains(&y))
                .unwrap_or(false);
        if !valid_year {
            errors.insert(
                "ano_del_vehiculo".to_string(),
                format!("Vehicle year must be between 1900 and {}", max_year),
            );
        }
    }

    fn quote(&self, q: &QuoteDetails, errors: &mut FieldErrors) {
        let effective = parse_date(&q.effective_date);
        let expiration = parse_date(&q.expiration_date);
        if effective.is_none() {
            errors.insert(
                "effectiveDate".to_string(),
                "Effective date must be a date (YYYY-MM-DD)".to_string(),
            );
        }
        if expiration.is_none() {
            errors.insert(
                "expirationDate".to_string(),
                "Expiration date must be a date (YYYY-MM-DD)".to_string(),
            );
        }
        if let (Some(from), Some(to)) = (effective, expiration) {
            if to <= from {
                errors.insert(
                    "expirationDate".to_string(),
                    "Expiration date must be after the effective date".to_string(),
                );
            }
        }

        for (field, value) in [
            ("paymentMethod", &q.payment_method),
            ("paymentPeriodicity", &q.payment_periodicity),
            ("paymentTerm", &q.payment_term),
        ] {
            if !self.code_re.is_match(value.trim()) {
                errors.insert(field.to_string(), "Select a valid option".to_string());
            }
        }
    }
}

impl StepValidator for FormSchemaValidator {
    fn validate(&self, output: &StepOutput) -> FieldErrors {
        let mut errors = FieldErrors::new();
        match output {
            StepOutput::Personal(p) => self.personal(p, &mut errors),
            StepOutput::Vehicle(v) => self.vehicle(v, &mut errors),
            StepOutput::Quote(q) => self.quote(q, &mut errors),
            StepOutput::Additional | StepOutput::Payment => {}
        }
        errors
    }
}

fn required(errors: &mut FieldErrors, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(field.to_string(), message.to_string());
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
