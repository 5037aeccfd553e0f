//! Hybrid token codec: encrypt-then-sign.
//!
//! Claims are sealed into a compact JWE (`alg: dir`, `enc: A256GCM`,
//! AAD = the base64url protected header), and the JWE string is carried
//! as the `jwe` claim of an outer HS256 JWS stamped with the same
//! `iat`/`exp`. Integrity can be checked cheaply at the edge by
//! verifying the outer signature; claims stay confidential until the
//! inner decrypt.
//!
//! Verification failures are deliberately indistinguishable: malformed,
//! tampered, expired, and mistyped tokens all decode to `None`.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::crypto;
use super::keys::TokenKeys;

/// JWE initialization vector size for A256GCM (12 bytes).
const NONCE_SIZE: usize = 12;
/// GCM authentication tag size (16 bytes).
const TAG_SIZE: usize = 16;

/// Protected header of every inner JWE. Direct symmetric encryption,
/// so the second compact segment (encrypted key) is empty.
const JWE_PROTECTED_HEADER: &str = r#"{"alg":"dir","enc":"A256GCM","typ":"JWT"}"#;

/// Outer JWS payload: the sealed JWE plus duplicated timestamps.
#[derive(Debug, Serialize, Deserialize)]
struct OuterClaims {
    jwe: String,
    iat: i64,
    exp: i64,
}

/// Inner protected header fields checked on decode.
#[derive(Debug, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
}

/// Successfully decoded token: typed claims plus the timestamps the
/// codec stamped at encode time.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub claims: T,
    pub iat: i64,
    pub exp: i64,
}

/// Seal `claims` into a hybrid token valid for `ttl_secs`.
///
/// The claims must serialize to a JSON object; `iat` and `exp` are
/// stamped into it (overwriting any caller-provided values).
pub fn encode<T: Serialize>(
    claims: &T,
    ttl_secs: i64,
    keys: &TokenKeys,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let exp = now + ttl_secs;

    let mut payload = match serde_json::to_value(claims) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => {
            return Err(AuthError::TokenError(
                "claims must serialize to a JSON object".into(),
            ));
        }
        Err(e) => return Err(AuthError::TokenError(format!("claims serialize: {e}"))),
    };
    payload.insert("iat".into(), now.into());
    payload.insert("exp".into(), exp.into());
    let plaintext = serde_json::to_vec(&serde_json::Value::Object(payload))
        .map_err(|e| AuthError::TokenError(format!("claims serialize: {e}")))?;

    let jwe = encrypt_jwe(&plaintext, &keys.enc_key)?;

    let outer = OuterClaims {
        jwe,
        iat: now,
        exp,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &outer,
        &EncodingKey::from_secret(&keys.sign_key),
    )
    .map_err(|e| AuthError::TokenError(format!("jws encode: {e}")))
}

/// Verify and open a hybrid token, returning the typed claims.
///
/// Checks, in order: outer HS256 signature and expiry (zero leeway),
/// inner segment structure, protected-header algorithm pin, GCM tag
/// (over the header as AAD), inner expiry, claims shape. Any failure
/// yields `None`.
pub fn decode<T: DeserializeOwned>(token: &str, keys: &TokenKeys) -> Option<Decoded<T>> {
    let key = DecodingKey::from_secret(&keys.sign_key);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    // The default 60s leeway would keep freshly expired tokens alive.
    validation.leeway = 0;
    let outer = jsonwebtoken::decode::<OuterClaims>(token, &key, &validation)
        .ok()?
        .claims;

    let plaintext = decrypt_jwe(&outer.jwe, &keys.enc_key)?;
    let value: serde_json::Value = serde_json::from_slice(&plaintext).ok()?;
    let iat = value.get("iat")?.as_i64()?;
    let exp = value.get("exp")?.as_i64()?;
    if exp <= Utc::now().timestamp() {
        return None;
    }
    let claims: T = serde_json::from_value(value).ok()?;
    Some(Decoded { claims, iat, exp })
}

/// Encrypt claims JSON into a five-segment compact JWE.
fn encrypt_jwe(plaintext: &[u8], enc_key: &[u8; 32]) -> Result<String, AuthError> {
    use aes_gcm::aead::{Aead, Payload};
    use aes_gcm::{Aes256Gcm, KeyInit, Nonce};

    let cipher = Aes256Gcm::new_from_slice(enc_key)
        .map_err(|e| AuthError::TokenError(format!("key init failed: {e}")))?;

    let header_b64 = crypto::b64url_encode(JWE_PROTECTED_HEADER.as_bytes());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: header_b64.as_bytes(),
            },
        )
        .map_err(|e| AuthError::TokenError(format!("encryption failed: {e}")))?;

    // aes-gcm appends the tag; compact JWE carries it as its own segment.
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    Ok(format!(
        "{header_b64}..{}.{}.{}",
        crypto::b64url_encode(&nonce_bytes),
        crypto::b64url_encode(ciphertext),
        crypto::b64url_encode(tag),
    ))
}

/// Open a five-segment compact JWE. None on any malformation.
fn decrypt_jwe(jwe: &str, enc_key: &[u8; 32]) -> Option<Vec<u8>> {
    use aes_gcm::aead::{Aead, Payload};
    use aes_gcm::{Aes256Gcm, KeyInit, Nonce};

    let parts: Vec<&str> = jwe.split('.').collect();
    if parts.len() != 5 || !parts[1].is_empty() {
        return None;
    }

    let header_bytes = crypto::b64url_decode(parts[0])?;
    let header: JweHeader = serde_json::from_slice(&header_bytes).ok()?;
    if header.alg != "dir" || header.enc != "A256GCM" {
        return None;
    }

    let nonce_bytes = crypto::b64url_decode(parts[2])?;
    if nonce_bytes.len() != NONCE_SIZE {
        return None;
    }
    let ciphertext = crypto::b64url_decode(parts[3])?;
    let tag = crypto::b64url_decode(parts[4])?;
    if tag.len() != TAG_SIZE {
        return None;
    }

    let cipher = Aes256Gcm::new_from_slice(enc_key).ok()?;

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);
    cipher
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &sealed,
                aad: parts[0].as_bytes(),
            },
        )
        .ok()
}
