use std::path::PathBuf;

const USAGE: &str = "\
Usage:
  leadflow --print-default-config
  leadflow --dry-run <form.json> [--config <path>]
  leadflow --submit <form.json> [--config <path>]";

/// Value following `flag`, if the flag is present.
fn flag_value(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .filter(|v| !v.starts_with("--"))
        .map(PathBuf::from)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let config = flag_value(&args, "--config");

    // Template for `leadflow.toml` / LEADFLOW_* overrides. No logging, no network.
    if args.iter().any(|a| a == "--print-default-config") {
        leadflow_orchestrator::print_default_config();
        return;
    }

    // Offline: validate every step and print the mapped create payload.
    if args.iter().any(|a| a == "--dry-run") {
        let Some(form) = flag_value(&args, "--dry-run") else {
            eprintln!("--dry-run needs a form file\n{}", USAGE);
            std::process::exit(2);
        };
        leadflow_orchestrator::run_dry_run(&form, config.as_deref());
        return;
    }

    // Real submission: token fetch, then lead creation.
    if args.iter().any(|a| a == "--submit") {
        let Some(form) = flag_value(&args, "--submit") else {
            eprintln!("--submit needs a form file\n{}", USAGE);
            std::process::exit(2);
        };
        leadflow_orchestrator::run_submit(&form, config.as_deref());
        return;
    }

    eprintln!("{}", USAGE);
    std::process::exit(2);
}
