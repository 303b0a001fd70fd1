//! HTTP Digest authentication gate
//!
//! Nonces are self-validating: `<issued-at hex>-<signature>` where the
//! signature is a SHA-256 over the timestamp and a per-process secret, so no
//! nonce table is kept. Nonces older than [`NONCE_LIFETIME`] are answered
//! with a `stale=true` challenge, which browsers retry without prompting.

pub mod digest;

use std::collections::HashMap;
use thiserror::Error;

use crate::config::AuthConfig;
use digest::{digest_eq, Algorithm, DigestParams};

/// Seconds a nonce stays valid
pub const NONCE_LIFETIME: i64 = 300;

/// Body of every 401 response
pub const ACCESS_DENIED: &str = "Access denied";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no credentials")]
    MissingCredentials,

    #[error("malformed digest: {0}")]
    Malformed(String),

    #[error("unsupported digest algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error("realm mismatch")]
    RealmMismatch,

    #[error("digest uri '{0}' does not match the request")]
    UriMismatch(String),

    #[error("invalid nonce")]
    InvalidNonce,

    #[error("stale nonce")]
    StaleNonce,

    #[error("wrong response for user '{0}'")]
    ResponseMismatch(String),
}

impl AuthError {
    /// Whether the client should retry with a fresh nonce without prompting
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleNonce)
    }
}

pub struct DigestAuth {
    realm: String,
    /// Keyed by lower-cased username
    users: HashMap<String, String>,
    opaque: String,
    secret: String,
}

impl DigestAuth {
    pub fn new(realm: impl Into<String>, users: HashMap<String, String>) -> Self {
        let realm = realm.into();
        let opaque = Algorithm::Md5.hash(&realm);
        let users = users
            .into_iter()
            .map(|(user, password)| (user.to_lowercase(), password))
            .collect();
        Self {
            realm,
            users,
            opaque,
            secret: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    /// `None` when authentication is disabled
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.realm.clone(), config.users.clone()))
    }

    /// Value of the `WWW-Authenticate` header for a 401
    pub fn challenge(&self, stale: bool) -> String {
        let mut header = format!(
            "Digest realm=\"{}\", qop=\"auth\", algorithm=MD5, nonce=\"{}\", opaque=\"{}\"",
            self.realm,
            self.issue_nonce(now()),
            self.opaque
        );
        if stale {
            header.push_str(", stale=true");
        }
        header
    }

    /// Check the `Authorization` header of a request, returning the user.
    ///
    /// `uri` is the request target (path and query) the header must have
    /// been computed for. Usernames match case-insensitively.
    pub fn verify(
        &self,
        method: &str,
        uri: &str,
        authorization: Option<&str>,
    ) -> Result<String, AuthError> {
        let header = authorization.ok_or(AuthError::MissingCredentials)?;
        let params = DigestParams::parse(header)?;

        let password = self
            .users
            .get(&params.username.to_lowercase())
            .ok_or_else(|| AuthError::UnknownUser(params.username.clone()))?;
        if params.realm.as_deref().is_some_and(|r| r != self.realm) {
            return Err(AuthError::RealmMismatch);
        }
        if params.uri != uri {
            return Err(AuthError::UriMismatch(params.uri));
        }
        self.check_nonce(&params.nonce, now())?;

        let expected = params.expected_response(method, &self.realm, password);
        if digest_eq(&expected, &params.response) {
            Ok(params.username)
        } else {
            Err(AuthError::ResponseMismatch(params.username))
        }
    }

    fn issue_nonce(&self, issued_at: i64) -> String {
        let stamp = format!("{issued_at:x}");
        let signature = self.sign(&stamp);
        format!("{stamp}-{signature}")
    }

    fn check_nonce(&self, nonce: &str, now: i64) -> Result<(), AuthError> {
        let (stamp, signature) = nonce.split_once('-').ok_or(AuthError::InvalidNonce)?;
        if !digest_eq(&self.sign(stamp), signature) {
            return Err(AuthError::InvalidNonce);
        }
        let issued_at = i64::from_str_radix(stamp, 16).map_err(|_| AuthError::InvalidNonce)?;
        if now.saturating_sub(issued_at) > NONCE_LIFETIME {
            return Err(AuthError::StaleNonce);
        }
        Ok(())
    }

    fn sign(&self, stamp: &str) -> String {
        let mut signature = Algorithm::Sha256.hash(&format!("{stamp}:{}", self.secret));
        signature.truncate(32);
        signature
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
