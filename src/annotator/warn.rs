fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One resend or cooldown decision reported on stderr.
#[derive(Debug, Clone, Default)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub action: &'a str,
    pub position: &'a str,
    pub reason: &'a str,
}

fn format_warn(event: &WarnEvent<'_>) -> String {
    format!(
        "ANNOTATOR_WARN code={} stage={} action={} position={} reason={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.action),
        sanitize_value(event.position),
        sanitize_value(event.reason),
    )
}

pub fn emit(event: &WarnEvent<'_>) {
    eprintln!("{}", format_warn(event));
}

fn format_progress(stage: &str, fields: &[(&str, String)]) -> String {
    let mut line = format!("ANNOTATOR_PROGRESS stage={}", sanitize_value(stage));
    for (key, value) in fields {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&sanitize_value(value));
    }
    line
}

pub fn progress(stage: &str, fields: &[(&str, String)]) {
    eprintln!("{}", format_progress(stage, fields));
}
