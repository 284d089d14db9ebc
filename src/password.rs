//! Event passwords: Argon2 hashing, strength policy and access tokens.

use crate::models::Event;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_PASSWORD_CHARS: usize = 6;
pub const MAX_PASSWORD_CHARS: usize = 128;

const TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password cannot be empty")]
    Empty,
    #[error("password must be at least {min} characters")]
    TooShort { min: usize },
    #[error("password must be at most {max} characters")]
    TooLong { max: usize },
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Creation-time policy. Verification never applies it.
pub fn validate_strength(password: &str) -> Result<(), PasswordError> {
    let chars = password.chars().count();
    if chars == 0 {
        Err(PasswordError::Empty)
    } else if chars < MIN_PASSWORD_CHARS {
        Err(PasswordError::TooShort {
            min: MIN_PASSWORD_CHARS,
        })
    } else if chars > MAX_PASSWORD_CHARS {
        Err(PasswordError::TooLong {
            max: MAX_PASSWORD_CHARS,
        })
    } else {
        Ok(())
    }
}

/// Hash a password using default Argon2 settings and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// `false` for a wrong password, an empty one, or a hash that does not parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if password.is_empty() {
        return false;
    }
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("termin-timing-equalizer").ok());

/// Does the same Argon2 work as a real check so that a missing event or a
/// missing password costs as much as a wrong one.
pub fn burn_verification_time(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Issues and checks the short tokens handed out after a correct password.
///
/// A token is a truncated HMAC over the event id and its current password
/// hash, so changing the password invalidates every token issued before.
#[derive(Clone)]
pub struct AccessTokens {
    secret: Vec<u8>,
}

impl fmt::Debug for AccessTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokens").finish_non_exhaustive()
    }
}

impl AccessTokens {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, event: &Event) -> Option<HmacSha256> {
        let hash = event.password_hash.as_deref()?;
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(event.id.to_string().as_bytes());
        mac.update(b":");
        mac.update(hash.as_bytes());
        Some(mac)
    }

    /// `None` when the event has no password to unlock.
    pub fn issue(&self, event: &Event) -> Option<String> {
        let digest = self.mac(event)?.finalize().into_bytes();
        Some(URL_SAFE_NO_PAD.encode(&digest[..TOKEN_BYTES]))
    }

    pub fn verify(&self, event: &Event, token: &str) -> bool {
        let Some(mac) = self.mac(event) else {
            return false;
        };
        match URL_SAFE_NO_PAD.decode(token) {
            Ok(bytes) if bytes.len() == TOKEN_BYTES => mac.verify_truncated_left(&bytes).is_ok(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn gated_event(id: i64, hash: &str) -> Event {
        let day = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        Event {
            id,
            share_id: "quiet-lynx-55".to_string(),
            name: "Team dinner".to_string(),
            start_date: day,
            end_date: day.succ_opt().unwrap(),
            creator_name: None,
            password_hash: Some(hash.to_string()),
            is_locked: false,
            calculated_date: None,
            created_at: day.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn hashing_is_salted_and_verifiable() {
        let first = hash_password("abc123").unwrap();
        let second = hash_password("abc123").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("abc123", &first));
        assert!(verify_password("abc123", &second));
        assert!(!verify_password("abc124", &first));
    }

    #[test]
    fn empty_and_corrupt_inputs_verify_false() {
        let hash = hash_password("abc123").unwrap();
        assert!(!verify_password("", &hash));
        assert!(!verify_password("abc123", ""));
        assert!(!verify_password("abc123", "not-a-phc-string"));
        assert!(!verify_password("abc123", &hash[..hash.len() - 4]));
    }

    #[test]
    fn empty_password_cannot_be_hashed() {
        assert_eq!(hash_password(""), Err(PasswordError::Empty));
    }

    #[test]
    fn strength_policy() {
        assert_eq!(validate_strength(""), Err(PasswordError::Empty));
        assert_eq!(
            validate_strength("abc12"),
            Err(PasswordError::TooShort { min: 6 })
        );
        assert_eq!(validate_strength("abc123"), Ok(()));
        assert_eq!(validate_strength(&"x".repeat(128)), Ok(()));
        assert_eq!(
            validate_strength(&"x".repeat(129)),
            Err(PasswordError::TooLong { max: 128 })
        );
        assert_ne!(
            PasswordError::Empty.to_string(),
            PasswordError::TooShort { min: 6 }.to_string()
        );
    }

    #[test]
    fn strength_counts_characters_not_bytes() {
        assert_eq!(validate_strength("zażółć"), Ok(()));
    }

    #[test]
    fn access_tokens_are_bound_to_event_and_password() {
        let tokens = AccessTokens::new(b"test-secret".to_vec());
        let event = gated_event(1, "$argon2id$v=19$first");
        let token = tokens.issue(&event).unwrap();
        assert!(tokens.verify(&event, &token));

        assert!(!tokens.verify(&gated_event(2, "$argon2id$v=19$first"), &token));
        assert!(!tokens.verify(&gated_event(1, "$argon2id$v=19$changed"), &token));
        assert!(!AccessTokens::new(b"other".to_vec()).verify(&event, &token));
        assert!(!tokens.verify(&event, "garbage!"));
        assert!(!tokens.verify(&event, ""));
    }

    #[test]
    fn open_events_have_no_tokens() {
        let tokens = AccessTokens::new(b"test-secret".to_vec());
        let mut event = gated_event(1, "unused");
        event.password_hash = None;
        assert_eq!(tokens.issue(&event), None);
        assert!(!tokens.verify(&event, "AAAAAAAAAAAAAAAAAAAAAA"));
    }
}
