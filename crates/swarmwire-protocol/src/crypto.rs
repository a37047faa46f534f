//! Ed25519 key handling: generation, on-disk persistence, mnemonic backup,
//! and the plain sign/verify primitives the rest of the workspace builds on.

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::ProtocolError;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Generate a new Ed25519 keypair.
pub fn generate_keypair() -> SigningKey {
    let mut rng = rand::thread_rng();
    SigningKey::generate(&mut rng)
}

/// Sign a payload, returning the base64 encoding of the raw signature bytes.
pub fn sign(signing_key: &SigningKey, payload: &[u8]) -> String {
    let sig: Signature = signing_key.sign(payload);
    B64.encode(sig.to_bytes())
}

/// Verify a base64-encoded signature over `payload` against `verifying_key`.
pub fn verify(verifying_key: &VerifyingKey, payload: &[u8], sig_b64: &str) -> bool {
    let Ok(sig_bytes) = B64.decode(sig_b64) else {
        return false;
    };
    verify_raw(verifying_key, payload, &sig_bytes)
}

/// Sign a payload, returning the raw 64-byte signature.
pub fn sign_raw(signing_key: &SigningKey, payload: &[u8]) -> [u8; 64] {
    signing_key.sign(payload).to_bytes()
}

/// Verify a raw signature over `payload` against `verifying_key`.
pub fn verify_raw(verifying_key: &VerifyingKey, payload: &[u8], sig_bytes: &[u8]) -> bool {
    let Ok(sig_bytes): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(payload, &signature).is_ok()
}

/// Encode a raw 32-byte Ed25519 public key as base64.
pub fn public_key_to_base64(key: &VerifyingKey) -> String {
    B64.encode(key.as_bytes())
}

/// Decode a base64-encoded raw 32-byte Ed25519 public key.
pub fn public_key_from_base64(s: &str) -> Result<VerifyingKey, ProtocolError> {
    let bytes = B64
        .decode(s)
        .map_err(|e| ProtocolError::Crypto(format!("invalid base64 public key: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ProtocolError::Crypto("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| ProtocolError::Crypto(format!("invalid public key: {e}")))
}

/// Compute SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// Load an Ed25519 keypair from a file, or create and persist a new one.
/// The file stores the raw 32-byte Ed25519 seed with mode 0600 on unix.
pub fn load_or_create_keypair(path: &Path) -> Result<SigningKey, ProtocolError> {
    if path.exists() {
        let seed_bytes =
            std::fs::read(path).map_err(|e| ProtocolError::Crypto(format!("read key file: {e}")))?;
        if seed_bytes.len() != 32 {
            return Err(ProtocolError::Crypto(format!(
                "key file is {} bytes, expected 32",
                seed_bytes.len()
            )));
        }
        let seed: [u8; 32] = seed_bytes.try_into().unwrap();
        Ok(SigningKey::from_bytes(&seed))
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ProtocolError::Crypto(format!("create dir: {e}")))?;
        }
        let key = generate_keypair();
        let seed = key.to_bytes();
        std::fs::write(path, seed)
            .map_err(|e| ProtocolError::Crypto(format!("write key file: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| ProtocolError::Crypto(format!("set permissions: {e}")))?;
        }
        Ok(key)
    }
}

/// Derive a 24-word BIP-39 mnemonic from an Ed25519 signing key's seed.
pub fn keypair_to_mnemonic(key: &SigningKey) -> Result<String, ProtocolError> {
    use bip39::Mnemonic;
    let seed = key.to_bytes();
    let mnemonic = Mnemonic::from_entropy(&seed)
        .map_err(|e| ProtocolError::Crypto(format!("mnemonic generation: {e}")))?;
    Ok(mnemonic.to_string())
}

/// Restore an Ed25519 signing key from a 24-word BIP-39 mnemonic, zeroizing
/// the decoded entropy once the key is constructed.
pub fn keypair_from_mnemonic(phrase: &str) -> Result<SigningKey, ProtocolError> {
    use bip39::Mnemonic;
    use zeroize::Zeroize;
    let mnemonic =
        Mnemonic::parse(phrase).map_err(|e| ProtocolError::Crypto(format!("invalid mnemonic: {e}")))?;
    let mut entropy = mnemonic.to_entropy();
    if entropy.len() < 32 {
        return Err(ProtocolError::Crypto("entropy too short".into()));
    }
    let seed: [u8; 32] = entropy[..32].try_into().unwrap();
    entropy.zeroize();
    Ok(SigningKey::from_bytes(&seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = generate_keypair();
        let vk = key.verifying_key();
        let payload = b"hello swarm";
        let sig = sign(&key, payload);
        assert!(verify(&vk, payload, &sig));
    }

    #[test]
    fn tampered_payload_fails_verify() {
        let key = generate_keypair();
        let vk = key.verifying_key();
        let sig = sign(&key, b"correct");
        assert!(!verify(&vk, b"wrong", &sig));
    }

    #[test]
    fn public_key_base64_roundtrip() {
        let key = generate_keypair();
        let vk = key.verifying_key();
        let encoded = public_key_to_base64(&vk);
        let decoded = public_key_from_base64(&encoded).unwrap();
        assert_eq!(vk, decoded);
    }

    #[test]
    fn load_or_create_persists_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.key");
        let k1 = load_or_create_keypair(&path).unwrap();
        let k2 = load_or_create_keypair(&path).unwrap();
        assert_eq!(k1.to_bytes(), k2.to_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn created_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.key");
        load_or_create_keypair(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn mnemonic_roundtrip() {
        let key = generate_keypair();
        let phrase = keypair_to_mnemonic(&key).unwrap();
        let restored = keypair_from_mnemonic(&phrase).unwrap();
        assert_eq!(key.to_bytes(), restored.to_bytes());
    }
}
