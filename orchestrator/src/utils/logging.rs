// Logging utilities
// Structured logging with JSON and human-readable formats, plus secret masking.

use log::Level;
use serde_json::json;

/// Mask sensitive data in logs
pub fn mask_sensitive(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }

    let visible = 4;
    let start: String = chars[..visible].iter().collect();
    let end: String = chars[chars.len() - visible..].iter().collect();

    format!("{}...{}", start, end)
}

/// Mask an `Authorization` header value, keeping the scheme.
pub fn mask_bearer(header_value: &str) -> String {
    match header_value.split_once(' ') {
        Some((scheme, token)) => format!("{} {}", scheme, mask_sensitive(token.trim())),
        None => mask_sensitive(header_value),
    }
}

/// Parse phase and step from log message
/// Extracts [PHASE: ...] and [STEP: ...] patterns
pub fn parse_log_metadata(message: &str) -> (Option<String>, Option<String>, String) {
    let (phase, rest) = extract_tag(message, "[PHASE:");
    let (step, rest) = extract_tag(&rest, "[STEP:");
    (phase, step, rest)
}

fn extract_tag(message: &str, open: &str) -> (Option<String>, String) {
    let Some(start) = message.find(open) else {
        return (None, message.to_string());
    };
    let Some(len) = message[start..].find(']') else {
        return (None, message.to_string());
    };
    let value = message[start + open.len()..start + len].trim().to_string();
    let cleaned = format!("{} {}", &message[..start], &message[start + len + 1..])
        .trim()
        .to_string();
    (Some(value), cleaned)
}

/// Format log entry as JSON for structured logging
pub fn format_json_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_entry = json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    });

    if let Some(phase) = phase {
        log_entry["phase"] = json!(phase);
    }

    if let Some(step) = step {
        log_entry["step"] = json!(step);
    }

    log_entry.to_string()
}

/// Format log entry as human-readable text
pub fn format_human_readable_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_line = format!("[{}] [{}]", timestamp, level.as_str());

    if let Some(phase) = phase {
        log_line.push_str(&format!(" [PHASE: {}]", phase));
    }

    if let Some(step) = step {
        log_line.push_str(&format!(" [STEP: {}]", step));
    }

    log_line.push_str(&format!(" [{}] {}", target, message));
    log_line
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Secret masking
    // -------------------------------------------------------------------------

    #[test]
    fn mask_sensitive_short_values_fully_masked() {
        assert_eq!(mask_sensitive("abc"), "***");
        assert_eq!(mask_sensitive("12345678"), "***");
    }

    #[test]
    fn mask_sensitive_long_values_partially_masked() {
        let masked = mask_sensitive("abcdefghijklmnop");
        assert_eq!(masked, "abcd...mnop");
    }

    #[test]
    fn mask_sensitive_is_char_boundary_safe() {
        // Multi-byte characters must not cause a slicing panic.
        let masked = mask_sensitive("ñañañañañañañaña");
        assert!(masked.starts_with("ñaña"), "{}", masked);
    }

    #[test]
    fn mask_bearer_keeps_scheme_only() {
        let masked = mask_bearer("Bearer 00Dxx0000001gPL!AR8AQJXg5oj8jXSgxJfA0lBog");
        assert!(masked.starts_with("Bearer 00Dx"), "{}", masked);
        assert!(!masked.contains("AQJXg5oj8jXSgxJfA0"), "{}", masked);
    }

    // -------------------------------------------------------------------------
    // Log metadata
    // -------------------------------------------------------------------------

    #[test]
    fn parse_log_metadata_extracts_phase_and_step() {
        let (phase, step, msg) =
            parse_log_metadata("[PHASE: crm] [STEP: create_lead] Lead created (status=201)");
        assert_eq!(phase.as_deref(), Some("crm"));
        assert_eq!(step.as_deref(), Some("create_lead"));
        assert_eq!(msg, "Lead created (status=201)");
    }

    #[test]
    fn parse_log_metadata_without_tags_is_passthrough() {
        let (phase, step, msg) = parse_log_metadata("plain message");
        assert!(phase.is_none());
        assert!(step.is_none());
        assert_eq!(msg, "plain message");
    }

    #[test]
    fn json_log_includes_optional_fields() {
        let line = format_json_log(
            "2025-01-01T00:00:00Z",
            Level::Info,
            "leadflow",
            "hello",
            Some("wizard"),
            None,
        );
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["phase"], "wizard");
        assert!(v.get("step").is_none());
        assert_eq!(v["level"], "INFO");
    }

    #[test]
    fn human_readable_log_renders_tags() {
        let line = format_human_readable_log(
            "2025-01-01 00:00:00.000",
            Level::Warn,
            "leadflow",
            "oops",
            Some("auth"),
            Some("fetch_token"),
        );
        assert_eq!(
            line,
            "[2025-01-01 00:00:00.000] [WARN] [PHASE: auth] [STEP: fetch_token] [leadflow] oops"
        );
    }
}
