//! Bearer-token auth shared by the HTTP API and the MCP surface. When
//! disabled, every request passes; when enabled, every endpoint but
//! `/health` requires `Authorization: Bearer <token>` matching one of the
//! configured tokens, per the auth policy in the specification.

use crate::error::CodeDoxError;

/// Checks an `Authorization` header value against the configured tokens.
/// Returns `AuthError` (never leaking which part of the check failed) on
/// a missing header, a non-Bearer scheme, or a token not in `tokens`.
pub fn check_bearer(header_value: Option<&str>, tokens: &[String], enabled: bool) -> Result<(), CodeDoxError> {
    if !enabled {
        return Ok(());
    }
    let presented = header_value
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match presented {
        Some(token) if tokens.iter().any(|t| t == token) => Ok(()),
        _ => Err(CodeDoxError::Auth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_always_passes() {
        assert!(check_bearer(None, &[], false).is_ok());
    }

    #[test]
    fn enabled_requires_a_matching_token() {
        let tokens = vec!["secret".to_string()];
        assert!(check_bearer(Some("Bearer secret"), &tokens, true).is_ok());
        assert!(check_bearer(Some("Bearer wrong"), &tokens, true).is_err());
        assert!(check_bearer(None, &tokens, true).is_err());
        assert!(check_bearer(Some("secret"), &tokens, true).is_err());
    }

    #[test]
    fn blank_bearer_token_is_rejected() {
        let tokens = vec!["secret".to_string()];
        assert!(check_bearer(Some("Bearer "), &tokens, true).is_err());
    }
}
