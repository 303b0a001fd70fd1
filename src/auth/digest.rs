//! Digest header parsing and response computation (RFC 2617 / RFC 7616,
//! `qop=auth` only)

use md5::Md5;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use super::AuthError;

/// Parameters every client response must carry
const REQUIRED: [&str; 7] = ["nonce", "nc", "cnonce", "qop", "username", "uri", "response"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Sha256,
}

impl Algorithm {
    pub fn parse(name: Option<&str>) -> Result<Self, AuthError> {
        match name {
            None => Ok(Self::Md5),
            Some(n) if n.eq_ignore_ascii_case("MD5") => Ok(Self::Md5),
            Some(n) if n.eq_ignore_ascii_case("SHA-256") => Ok(Self::Sha256),
            Some(n) => Err(AuthError::UnsupportedAlgorithm(n.to_string())),
        }
    }

    pub fn hash(self, data: &str) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data.as_bytes())),
            Self::Sha256 => hex::encode(Sha256::digest(data.as_bytes())),
        }
    }
}

/// Fields of an `Authorization: Digest ...` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestParams {
    pub username: String,
    pub realm: Option<String>,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub qop: String,
    pub nc: String,
    pub cnonce: String,
    pub algorithm: Algorithm,
}

impl DigestParams {
    /// Parse the header value, including the `Digest` scheme token
    pub fn parse(header: &str) -> Result<Self, AuthError> {
        let header = header.trim();
        let (scheme, rest) = header
            .split_once(char::is_whitespace)
            .ok_or_else(|| AuthError::Malformed("missing digest parameters".to_string()))?;
        if !scheme.eq_ignore_ascii_case("Digest") {
            return Err(AuthError::Malformed(format!(
                "unsupported scheme '{scheme}'"
            )));
        }

        let mut fields = parse_fields(rest)?;
        if let Some(missing) = REQUIRED.iter().find(|k| !fields.contains_key(**k)) {
            return Err(AuthError::Malformed(format!("missing '{missing}'")));
        }
        if !fields["qop"].eq_ignore_ascii_case("auth") {
            return Err(AuthError::Malformed(format!(
                "unsupported qop '{}'",
                fields["qop"]
            )));
        }

        let mut take = |key: &str| fields.remove(key).unwrap_or_default();
        Ok(Self {
            username: take("username"),
            nonce: take("nonce"),
            uri: take("uri"),
            response: take("response"),
            qop: take("qop"),
            nc: take("nc"),
            cnonce: take("cnonce"),
            realm: fields.remove("realm"),
            algorithm: Algorithm::parse(fields.get("algorithm").map(String::as_str))?,
        })
    }

    /// Response the client should have sent for `method` and `password`
    pub fn expected_response(&self, method: &str, realm: &str, password: &str) -> String {
        let ha1 = self
            .algorithm
            .hash(&format!("{}:{realm}:{password}", self.username));
        let ha2 = self.algorithm.hash(&format!("{method}:{}", self.uri));
        self.algorithm.hash(&format!(
            "{ha1}:{}:{}:{}:{}:{ha2}",
            self.nonce, self.nc, self.cnonce, self.qop
        ))
    }
}

/// Split `key=value, key="quoted, value"` pairs
fn parse_fields(input: &str) -> Result<HashMap<String, String>, AuthError> {
    let mut fields = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        if key.is_empty() {
            break;
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(AuthError::Malformed(format!("expected '=' after '{key}'")));
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    c => value.push(c),
                }
            }
            if !closed {
                return Err(AuthError::Malformed(format!("unterminated value for '{key}'")));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' || c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        fields.insert(key.to_ascii_lowercase(), value);
    }
    Ok(fields)
}

/// Compare two hex digests without early exit
pub fn digest_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x.to_ascii_lowercase() ^ y.to_ascii_lowercase()))
            == 0
}
