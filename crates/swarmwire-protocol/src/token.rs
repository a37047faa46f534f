//! Invite tokens: compact signed JSON bearing swarm membership claims,
//! carried inside a `swarm://` URL.
//!
//! Wire shape: three base64url (no padding) segments joined by `.` —
//! a fixed EdDSA/JWT-shaped header, a claims payload, and an Ed25519
//! signature over `header.payload`.

use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::ProtocolError;

const B64URL: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl Default for TokenHeader {
    fn default() -> Self {
        Self {
            alg: "EdDSA".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by an invite token payload segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteClaims {
    pub swarm_id: String,
    pub master: String,
    pub endpoint: String,
    pub iat: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
}

/// Issue a signed invite token for `swarm_id`, returning the surface
/// `swarm://<swarm_id>@<host>?token=<hdr>.<payload>.<sig>` form.
pub fn make_invite(
    signing_key: &SigningKey,
    swarm_id: &str,
    master_id: &str,
    endpoint: &str,
    expires_at: Option<DateTime<Utc>>,
    max_uses: Option<u32>,
) -> Result<String, ProtocolError> {
    let claims = InviteClaims {
        swarm_id: swarm_id.to_string(),
        master: master_id.to_string(),
        endpoint: endpoint.to_string(),
        iat: Utc::now(),
        expires_at,
        max_uses,
    };
    let header_b64 = encode_segment(&TokenHeader::default())?;
    let payload_b64 = encode_segment(&claims)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig = crypto::sign_raw(signing_key, signing_input.as_bytes());
    let sig_b64 = B64URL.encode(sig);

    let host = endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or("");

    Ok(format!(
        "swarm://{swarm_id}@{host}?token={header_b64}.{payload_b64}.{sig_b64}"
    ))
}

/// Extract the `swarm_id` segment from the token URL without verifying
/// the signature. Used by the join state machine to locate the swarm
/// before a signing key is available to check the token.
pub fn peek_swarm_id(raw: &str) -> Result<String, ProtocolError> {
    let claims = decode_claims(extract_token_triple(raw)?.1.as_str())?;
    Ok(claims.swarm_id)
}

/// Verify an invite token, optionally pinning the expected swarm id.
pub fn verify_invite(
    raw: &str,
    verifying_key: &VerifyingKey,
    expected_swarm_id: Option<&str>,
) -> Result<InviteClaims, ProtocolError> {
    let (header_b64, payload_b64, sig_b64) = extract_token_triple(raw)?;

    let header: TokenHeader = decode_segment(&header_b64)?;
    if header.alg != "EdDSA" {
        return Err(ProtocolError::Payload(format!("unsupported alg {}", header.alg)));
    }

    let claims = decode_claims(&payload_b64)?;

    if let Some(expected) = expected_swarm_id {
        if claims.swarm_id != expected {
            return Err(ProtocolError::Payload("swarm_id mismatch".into()));
        }
    }

    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig_bytes = B64URL
        .decode(&sig_b64)
        .map_err(|e| ProtocolError::Payload(format!("invalid signature encoding: {e}")))?;
    if !crypto::verify_raw(verifying_key, signing_input.as_bytes(), &sig_bytes) {
        return Err(ProtocolError::InvalidSignature("invite token".into()));
    }

    if let Some(expires_at) = claims.expires_at {
        if Utc::now() > expires_at {
            return Err(ProtocolError::Expired);
        }
    }

    Ok(claims)
}

fn extract_token_triple(raw: &str) -> Result<(String, String, String), ProtocolError> {
    let query_start = raw
        .find("?token=")
        .ok_or_else(|| ProtocolError::Payload("missing token query parameter".into()))?;
    let token = &raw[query_start + "?token=".len()..];
    let parts: Vec<&str> = token.splitn(3, '.').collect();
    if parts.len() != 3 {
        return Err(ProtocolError::Payload("token must have three segments".into()));
    }
    Ok((parts[0].to_string(), parts[1].to_string(), parts[2].to_string()))
}

fn decode_claims(payload_b64: &str) -> Result<InviteClaims, ProtocolError> {
    decode_segment(payload_b64)
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| ProtocolError::Payload(format!("encode token segment: {e}")))?;
    Ok(B64URL.encode(json))
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, ProtocolError> {
    let bytes = B64URL
        .decode(segment)
        .map_err(|e| ProtocolError::Payload(format!("invalid base64 segment: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ProtocolError::Payload(format!("invalid token json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    #[test]
    fn issue_and_verify_roundtrip() {
        let key = generate_keypair();
        let vk = key.verifying_key();
        let token = make_invite(&key, "swarm-1", "agent-a", "https://a.example:8443", None, None).unwrap();
        assert!(token.starts_with("swarm://swarm-1@a.example:8443?token="));
        let claims = verify_invite(&token, &vk, Some("swarm-1")).unwrap();
        assert_eq!(claims.master, "agent-a");
        assert_eq!(claims.swarm_id, "swarm-1");
    }

    #[test]
    fn wrong_key_fails_signature() {
        let key = generate_keypair();
        let other = generate_keypair();
        let token = make_invite(&key, "swarm-1", "agent-a", "https://a.example", None, None).unwrap();
        let err = verify_invite(&token, &other.verifying_key(), None).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Signature);
    }

    #[test]
    fn expired_token_rejected() {
        let key = generate_keypair();
        let past = Utc::now() - chrono::Duration::seconds(10);
        let token = make_invite(&key, "swarm-1", "agent-a", "https://a.example", Some(past), None).unwrap();
        let err = verify_invite(&token, &key.verifying_key(), None).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Expired);
    }

    #[test]
    fn swarm_id_mismatch_is_payload_error() {
        let key = generate_keypair();
        let token = make_invite(&key, "swarm-1", "agent-a", "https://a.example", None, None).unwrap();
        let err = verify_invite(&token, &key.verifying_key(), Some("swarm-2")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Payload);
    }

    #[test]
    fn peek_swarm_id_does_not_require_key() {
        let key = generate_keypair();
        let token = make_invite(&key, "swarm-9", "agent-a", "https://a.example", None, None).unwrap();
        assert_eq!(peek_swarm_id(&token).unwrap(), "swarm-9");
    }
}
