//! Session token issue / verify.
//!
//! Sessions are hybrid tokens delivered in role-specific httpOnly
//! cookies. The claims duplicate the role as `typ` so a verifier can
//! pin the namespace it expects.

use super::AuthError;
use super::hybrid;
use super::keys::TokenKeys;
use crate::models::{Role, SessionClaims};

/// Session lifetime: 7 days.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Issue a session token for `email` in the given role namespace.
pub fn issue(role: Role, email: &str, keys: &TokenKeys) -> Result<String, AuthError> {
    let claims = SessionClaims {
        role,
        typ: role,
        sub: email.to_string(),
    };
    hybrid::encode(&claims, SESSION_TTL_SECS, keys)
}

/// Verify a session token against the expected role namespace.
///
/// Tokens from the other namespace, with a blank subject, or failing
/// any codec check return `None`.
pub fn verify(token: &str, expected_role: Role, keys: &TokenKeys) -> Option<SessionClaims> {
    let decoded = hybrid::decode::<SessionClaims>(token, keys)?;
    let claims = decoded.claims;
    if claims.role != expected_role || claims.typ != expected_role {
        return None;
    }
    if claims.sub.trim().is_empty() {
        return None;
    }
    Some(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> TokenKeys {
        TokenKeys {
            sign_key: b"unit-test-signing-secret-0123456789".to_vec(),
            enc_key: *b"0123456789abcdef0123456789abcdef",
            access_sign_key: b"unit-test-access-secret".to_vec(),
        }
    }

    #[test]
    fn issue_verify_round_trip() {
        let keys = test_keys();
        let token = issue(Role::Admin, "admin@toko.id", &keys).unwrap();

        let claims = verify(&token, Role::Admin, &keys).expect("session should verify");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.sub, "admin@toko.id");
    }

    #[test]
    fn role_namespaces_do_not_cross() {
        let keys = test_keys();
        let admin = issue(Role::Admin, "admin@toko.id", &keys).unwrap();
        let user = issue(Role::User, "budi@toko.id", &keys).unwrap();

        assert!(verify(&admin, Role::User, &keys).is_none());
        assert!(verify(&user, Role::Admin, &keys).is_none());
    }
}
