// LeadFlow lead lifecycle orchestrator
// Library entry point: logging bootstrap and CLI run modes

pub mod api;
pub mod auth;
pub mod crm;
pub mod error;
pub mod mapping;
pub mod models;
pub mod security;
pub mod settings;
pub mod utils;
pub mod wizard;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use serde_json::Value;

use crate::api::session::LeadSession;
use crate::crm::client::HttpCrmClient;
use crate::mapping::LeadMapper;
use crate::models::state::{SessionContext, StepOutput};
use crate::settings::{LoggingSettings, Settings};
use crate::utils::validation::FormSchemaValidator;
use crate::wizard::steps::WizardStep;
use crate::wizard::Wizard;

/// Initialize logging with dual format (JSON + human-readable) files, optionally echoed to stdout.
pub fn init_logging(with_stdout: bool, settings: &LoggingSettings) -> anyhow::Result<PathBuf> {
    let log_dir = utils::path_resolver::resolve_log_folder(settings.directory.as_ref())?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let json_log_file = log_dir.join(format!("leadflow-{}.log", timestamp));
    let txt_log_file = log_dir.join(format!("leadflow-{}.txt", timestamp));

    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_stdout || settings.stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(|out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let (phase, step, cleaned) =
                        utils::logging::parse_log_metadata(&message.to_string());
                    out.finish(format_args!(
                        "{}",
                        utils::logging::format_human_readable_log(
                            &timestamp_local.to_string(),
                            record.level(),
                            record.target(),
                            &cleaned,
                            phase.as_deref(),
                            step.as_deref(),
                        )
                    ))
                })
                // stdout carries the CLI's JSON output
                .chain(std::io::stderr()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let (phase, step, cleaned) =
                        utils::logging::parse_log_metadata(&message.to_string());
                    out.finish(format_args!(
                        "{}\n",
                        utils::logging::format_json_log(
                            &timestamp_utc,
                            record.level(),
                            record.target(),
                            &cleaned,
                            phase.as_deref(),
                            step.as_deref(),
                        )
                    ))
                })
                .chain(fern::log_file(&json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let (phase, step, cleaned) =
                        utils::logging::parse_log_metadata(&message.to_string());
                    out.finish(format_args!(
                        "{}\n",
                        utils::logging::format_human_readable_log(
                            &timestamp_local.to_string(),
                            record.level(),
                            record.target(),
                            &cleaned,
                            phase.as_deref(),
                            step.as_deref(),
                        )
                    ))
                })
                .chain(fern::log_file(&txt_log_file)?),
        );

    dispatch.apply()?;

    info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(log_dir)
}

fn bootstrap(config: Option<&Path>) -> Settings {
    // Settings drive where logs go, so read them before logging exists.
    let settings = match Settings::load(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            std::process::exit(2);
        }
    };
    if let Err(e) = init_logging(false, &settings.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    info!(
        "[PHASE: initialization] LeadFlow starting at {} (crm={:?})",
        chrono::Utc::now(),
        settings.crm
    );
    settings
}

/// A flat form document: every step field at the top level plus an optional `context` object.
fn load_form(path: &Path) -> anyhow::Result<(Value, SessionContext)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read form file {:?}", path))?;
    let form: Value =
        serde_json::from_str(&raw).with_context(|| format!("Form file {:?} is not JSON", path))?;
    if !form.is_object() {
        anyhow::bail!("Form file {:?} must hold a JSON object", path);
    }
    let context = match form.get("context") {
        Some(ctx) => serde_json::from_value(ctx.clone()).context("Invalid `context` object")?,
        None => SessionContext::default(),
    };
    Ok((form, context))
}

fn new_wizard(settings: &Settings, context: SessionContext) -> anyhow::Result<Wizard> {
    Ok(Wizard::new(
        Arc::new(HttpCrmClient::from_settings(&settings.crm)),
        Arc::new(FormSchemaValidator::new()?),
        LeadMapper::new(settings.lead_defaults.clone()),
        context,
    ))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to render output: {}", e),
    }
}

/// Print the configuration template.
pub fn print_default_config() {
    match Settings::default_toml() {
        Ok(toml) => print!("{}", toml),
        Err(e) => {
            eprintln!("Failed to render default settings: {}", e);
            std::process::exit(1);
        }
    }
}

/// Validate and map a form without touching the network.
/// Prints `{payload, fingerprint}` and exits 0, or the field errors and exits 1.
pub fn run_dry_run(form_path: &Path, config: Option<&Path>) {
    let settings = bootstrap(config);
    if let Err(e) = dry_run(&settings, form_path) {
        error!("[PHASE: dry_run] [STEP: fatal] {:#}", e);
        eprintln!("Dry run failed: {:#}", e);
        std::process::exit(1);
    }
}

fn dry_run(settings: &Settings, form_path: &Path) -> anyhow::Result<()> {
    let (form, context) = load_form(form_path)?;
    let mut wizard = new_wizard(settings, context)?;

    for step in WizardStep::all() {
        let output = StepOutput::parse(step, &form)
            .with_context(|| format!("Step {} data could not be read", step))?;
        if let Err(e) = wizard.advance(output).map(|_| ()) {
            if let Some(errors) = e.field_errors() {
                print_json(&serde_json::json!({ "step": step.index(), "fieldErrors": errors }));
            }
            return Err(e.into());
        }
    }

    let payload = wizard
        .preview_payload()
        .context("Form is incomplete after the last step")?;
    let fingerprint = security::crypto::payload_fingerprint(&payload)?;
    info!(
        "[PHASE: dry_run] [STEP: mapped] Payload ready (payload_sha256={})",
        fingerprint
    );
    print_json(&serde_json::json!({ "payload": payload, "fingerprint": fingerprint }));
    Ok(())
}

/// Drive a full session against the CRM: token, then lead creation.
/// Prints the final step response and exits 1 unless the lead was confirmed.
pub fn run_submit(form_path: &Path, config: Option<&Path>) {
    let settings = bootstrap(config);
    match submit(&settings, form_path) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("[PHASE: submit] [STEP: fatal] {:#}", e);
            eprintln!("Submission failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn submit(settings: &Settings, form_path: &Path) -> anyhow::Result<bool> {
    settings.crm.require_credentials()?;
    let (form, context) = load_form(form_path)?;
    let session = LeadSession::new(new_wizard(settings, context)?);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(async {
        for step in WizardStep::all() {
            let response = session.submit_step(step.index(), &form).await;
            if !response.success || step == WizardStep::LAST_INPUT {
                print_json(&response);
                return Ok(response.success);
            }
        }
        Ok::<_, anyhow::Error>(false)
    })
}
