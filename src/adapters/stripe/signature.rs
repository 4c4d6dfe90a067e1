//! `Stripe-Signature` header parsing and HMAC-SHA256 verification.
//!
//! Stripe signs `"{t}.{raw body}"` with the endpoint secret and sends
//! `t=<unix secs>,v1=<hex>[,v1=<hex>...]`. Several `v1` entries appear while
//! a secret is being rolled; any one of them may match.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::foundation::Timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Oldest signature accepted, in seconds.
pub const MAX_SIGNATURE_AGE_SECS: i64 = 300;

/// How far ahead of our clock a signature may be dated.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureParseError {
    #[error("signature header is empty")]
    Empty,
    #[error("signature header has no t= timestamp")]
    MissingTimestamp,
    #[error("signature header has no v1 signature")]
    MissingV1Signature,
    #[error("signature timestamp is not an integer")]
    InvalidTimestamp,
    #[error("v1 signature is not hex")]
    InvalidSignatureFormat,
    #[error("malformed signature element '{0}'")]
    MalformedElement(String),
}

/// Why a well-formed signature was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureRejection {
    #[error("signature is {age_secs}s old")]
    Stale { age_secs: i64 },
    #[error("signature is dated {skew_secs}s in the future")]
    FromFuture { skew_secs: i64 },
    #[error("no v1 signature matches the payload")]
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Hex-decoded HMAC digests.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::Empty);
        }

        let mut timestamp = None;
        let mut v1_signatures = Vec::new();
        for element in header.split(',').map(str::trim) {
            let Some((scheme, value)) = element.split_once('=') else {
                return Err(SignatureParseError::MalformedElement(element.to_string()));
            };
            match scheme {
                "t" => {
                    let secs = value
                        .parse::<i64>()
                        .map_err(|_| SignatureParseError::InvalidTimestamp)?;
                    timestamp = Some(secs);
                }
                "v1" => v1_signatures.push(
                    hex::decode(value).map_err(|_| SignatureParseError::InvalidSignatureFormat)?,
                ),
                // v0 and future schemes
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }
        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }

    /// Checks freshness against `now`, then the HMAC of `payload`.
    pub fn verify(
        &self,
        secret: &SecretString,
        payload: &[u8],
        now: Timestamp,
    ) -> Result<(), SignatureRejection> {
        let age_secs = now.as_unix_secs() - self.timestamp;
        if age_secs > MAX_SIGNATURE_AGE_SECS {
            return Err(SignatureRejection::Stale { age_secs });
        }
        if -age_secs > MAX_CLOCK_SKEW_SECS {
            return Err(SignatureRejection::FromFuture {
                skew_secs: -age_secs,
            });
        }

        let expected = sign(secret.expose_secret().as_bytes(), self.timestamp, payload);
        let matched = self
            .v1_signatures
            .iter()
            .any(|candidate| bool::from(expected.as_slice().ct_eq(candidate.as_slice())));
        if matched {
            Ok(())
        } else {
            Err(SignatureRejection::Mismatch)
        }
    }
}

/// HMAC-SHA256 over `"{timestamp}.{payload}"`.
pub fn sign(secret: &[u8], timestamp: i64, payload: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}
