//! HS256 token verification.
//!
//! Tokens are three base64url segments joined by `.`: header, claims,
//! signature. The signature is HMAC-SHA256 over the first two segments as
//! transmitted, keyed by the shared secret's UTF-8 bytes. Verification pins
//! the algorithm to HS256 before any cryptographic work, which closes the
//! `alg=none` family of downgrades.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AuthError, Result};
use crate::replay::ReplayCache;

/// Permitted clock skew, in seconds, applied to both `exp` and `iat`.
pub const CLOCK_SKEW_SECS: u64 = 30;

/// Upper bound on a token's lifetime, and therefore on the replay window.
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// The token header. Only `alg` and `typ` are inspected.
#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// Verified token claims.
///
/// Standard temporal claims are typed; everything else is preserved in
/// `extra` for handlers that care.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Issue time, seconds since epoch.
    #[serde(default)]
    pub iat: Option<u64>,
    /// Expiry, seconds since epoch.
    #[serde(default)]
    pub exp: Option<u64>,
    /// Unique token identifier enabling replay protection.
    #[serde(default)]
    pub jti: Option<String>,
    /// Any further claims, untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Verifies bearer tokens against the shared secret.
///
/// The verifier owns the replay cache; the secret is passed per call so that
/// rotation through the config store takes effect immediately.
#[derive(Debug, Default)]
pub struct TokenVerifier {
    replay: ReplayCache,
}

impl TokenVerifier {
    /// Create a verifier with an empty replay cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify `token` against `secret` at time `now` (seconds since epoch).
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] describing the first check that failed. All
    /// failures surface to clients as `AUTH_FAILED`; none is retryable.
    pub fn verify(&self, secret: &str, token: &str, now: u64) -> Result<Claims> {
        let mut segments = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => {
                    return Err(AuthError::Malformed(
                        "expected three dot-separated segments".into(),
                    ))
                }
            };

        let header: Header = decode_segment(header_b64, "header")?;
        if header.alg != "HS256" {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }
        if let Some(typ) = header.typ {
            if typ != "JWT" {
                return Err(AuthError::UnsupportedType(typ));
            }
        }

        // Sign exactly what was transmitted, then compare in constant time.
        let signing_input = format!("{header_b64}.{claims_b64}");
        let expected = sign(secret, signing_input.as_bytes())?;
        if !constant_time_eq(expected.as_bytes(), signature_b64.as_bytes()) {
            return Err(AuthError::InvalidSignature);
        }

        let claims: Claims = decode_segment(claims_b64, "claims")?;

        if let Some(exp) = claims.exp {
            if exp.saturating_add(CLOCK_SKEW_SECS) < now {
                return Err(AuthError::Expired);
            }
        }
        if let Some(iat) = claims.iat {
            if iat.saturating_sub(CLOCK_SKEW_SECS) > now {
                return Err(AuthError::IssuedInFuture);
            }
        }

        if let Some(jti) = &claims.jti {
            let ttl = claims.exp.map_or(MAX_TOKEN_LIFETIME_SECS, |exp| {
                exp.saturating_add(CLOCK_SKEW_SECS)
                    .saturating_sub(now)
                    .min(MAX_TOKEN_LIFETIME_SECS)
            });
            if !self.replay.check_and_insert(jti, now, ttl) {
                return Err(AuthError::Replayed);
            }
        }

        Ok(claims)
    }

    /// The replay cache backing this verifier.
    #[must_use]
    pub fn replay(&self) -> &ReplayCache {
        &self.replay
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed(format!("{what} is not valid base64url")))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::Malformed(format!("{what} is not a JSON object")))
}

fn sign(secret: &str, signing_input: &[u8]) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::Internal)?;
    mac.update(signing_input);
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Length check first, then a full XOR accumulation over every byte: the
/// comparison never short-circuits on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Mint a signed token for tests: a fixed HS256/JWT header over the given
/// claims object.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
#[allow(clippy::missing_panics_doc)]
pub fn mint_token(secret: &str, claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims serialize"));
    let signing_input = format!("{header}.{body}");
    let signature = sign(secret, signing_input.as_bytes()).expect("hmac accepts any key length");
    format!("{signing_input}.{signature}")
}
