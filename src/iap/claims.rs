//! Decoding of JWT claims for `mzcld iap --debug`

use std::io::Write;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

/// The subset of ID token claims worth showing an operator
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub aud: Option<String>,
    pub iss: Option<String>,
    pub email: Option<String>,
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT without verifying it
    pub fn decode(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::AuthError("invalid JWT format".to_string()));
        }
        let payload = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|e| Error::AuthError(format!("decode payload: {e}")))?;
        Ok(serde_json::from_slice(&payload)?)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

/// Print decoded claims, flagging an unexpected audience or an expired token
pub fn write_debug(
    out: &mut dyn Write,
    claims: &TokenClaims,
    expected_audience: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    writeln!(out, "\n=== Token Debug Info ===")?;
    if let Some(aud) = &claims.aud {
        writeln!(out, "Audience (aud): {aud}")?;
        if aud != expected_audience {
            writeln!(out, "WARNING: Audience does not match expected client ID!")?;
            writeln!(out, "Expected: {expected_audience}")?;
        }
    }
    if let Some(iss) = &claims.iss {
        writeln!(out, "Issuer (iss): {iss}")?;
    }
    if let Some(email) = &claims.email {
        writeln!(out, "Email: {email}")?;
    }
    if let Some(expires) = claims.expires_at() {
        writeln!(
            out,
            "Expires: {}",
            expires.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        if now > expires {
            writeln!(out, "WARNING: Token is expired!")?;
        }
    }
    writeln!(out, "========================\n")?;
    Ok(())
}
