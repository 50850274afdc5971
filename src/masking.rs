use secrecy::{ExposeSecret, SecretString};

use crate::config::AxiomConfig;

/// Format a secret value, respecting the show_secrets flag.
pub fn format_secret(secret: &SecretString, show_secrets: bool) -> String {
    if show_secrets {
        secret.expose_secret().to_string()
    } else {
        "[REDACTED]".to_string()
    }
}

/// One-line description of the connection target for diagnostics.
pub fn describe_connection(config: Option<&AxiomConfig>, show_secrets: bool) -> String {
    match config {
        Some(c) => format!(
            "url={} token={} org_id={}",
            c.url,
            format_secret(&c.token, show_secrets),
            c.org_id.as_deref().unwrap_or("(not set)")
        ),
        None => "(not configured)".to_string(),
    }
}
