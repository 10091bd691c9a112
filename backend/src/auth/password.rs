//! Password hashing using argon2
//!
//! Hashes are stored in a single `$`-delimited string:
//!
//! ```text
//! $argon2id$v=19$m=65536,t=1,p=4$<salt>$<digest>
//! ```
//!
//! Salt and digest use the standard base64 alphabet without padding. The
//! digest length recorded in the string is the key length used when
//! re-deriving during verification.
//!
//! # Performance Considerations
//!
//! Argon2 is intentionally CPU-intensive. For async contexts, use the
//! `*_async` variants which run on the blocking thread pool.

use argon2::{
    password_hash::rand_core::{OsRng, RngCore},
    Algorithm, Argon2, Params, Version,
};
use base64ct::{Base64Unpadded, Encoding};
use folio_shared::AuthError;
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Algorithm tag embedded in every encoded hash
pub const ALGORITHM_ID: &str = "argon2id";

/// Argon2 version 0x13, the only one accepted
pub const ARGON2_VERSION: u32 = 0x13;

const SALT_LEN: usize = 16;

/// Largest memory cost accepted from a stored hash (1 GiB)
pub const MAX_MEMORY_KIB: u32 = 1024 * 1024;

/// Cost parameters for new hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u8,
    pub key_len: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 1,
            parallelism: 4,
            key_len: 32,
        }
    }
}

/// Reasons an encoded hash string cannot be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashDecodeError {
    #[error("expected 6 '$'-delimited segments, found {0}")]
    SegmentCount(usize),

    #[error("encoded hash must start with '$'")]
    UnexpectedPrefix,

    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("unsupported version '{0}'")]
    UnsupportedVersion(String),

    #[error("malformed parameter block '{0}'")]
    MalformedParameters(String),

    #[error("salt is not valid base64")]
    InvalidSalt,

    #[error("digest is not valid base64")]
    InvalidDigest,

    #[error("digest is empty")]
    EmptyDigest,

    /// Parsed cleanly but the argon2 engine refuses the values
    #[error("parameters rejected: {0}")]
    RejectedParameters(String),
}

/// Password hashing failures
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("random source failure: {0}")]
    RandomSource(String),

    #[error("hashing failed: {0}")]
    Hashing(String),

    #[error("invalid password hash: {0}")]
    Decode(#[from] HashDecodeError),
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::RandomSource(msg) => AuthError::RandomSource(msg),
            other => AuthError::System(other.to_string()),
        }
    }
}

/// A parsed Argon2id hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedHash {
    version: u32,
    memory_kib: u32,
    iterations: u32,
    parallelism: u8,
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl EncodedHash {
    /// Parse an encoded hash string
    pub fn decode(encoded: &str) -> Result<Self, HashDecodeError> {
        let parts: Vec<&str> = encoded.split('$').collect();
        if parts.len() != 6 {
            return Err(HashDecodeError::SegmentCount(parts.len()));
        }
        if !parts[0].is_empty() {
            return Err(HashDecodeError::UnexpectedPrefix);
        }
        if parts[1] != ALGORITHM_ID {
            return Err(HashDecodeError::UnsupportedAlgorithm(parts[1].to_string()));
        }

        let version = parts[2]
            .strip_prefix("v=")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v == ARGON2_VERSION)
            .ok_or_else(|| HashDecodeError::UnsupportedVersion(parts[2].to_string()))?;

        let (memory_kib, iterations, parallelism) = parse_params(parts[3])
            .ok_or_else(|| HashDecodeError::MalformedParameters(parts[3].to_string()))?;
        if memory_kib > MAX_MEMORY_KIB {
            return Err(HashDecodeError::RejectedParameters(format!(
                "memory cost {} KiB exceeds the {} KiB limit",
                memory_kib, MAX_MEMORY_KIB
            )));
        }

        let salt = Base64Unpadded::decode_vec(parts[4]).map_err(|_| HashDecodeError::InvalidSalt)?;
        let digest =
            Base64Unpadded::decode_vec(parts[5]).map_err(|_| HashDecodeError::InvalidDigest)?;
        if digest.is_empty() {
            return Err(HashDecodeError::EmptyDigest);
        }

        Ok(Self {
            version,
            memory_kib,
            iterations,
            parallelism,
            salt,
            digest,
        })
    }

    /// Render the canonical string form
    pub fn encode(&self) -> String {
        format!(
            "${}$v={}$m={},t={},p={}${}${}",
            ALGORITHM_ID,
            self.version,
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Base64Unpadded::encode_string(&self.salt),
            Base64Unpadded::encode_string(&self.digest),
        )
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn params(&self) -> HashParams {
        HashParams {
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
            key_len: self.digest.len(),
        }
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }
}

impl fmt::Display for EncodedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for EncodedHash {
    type Err = HashDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// `m=<u32>,t=<u32>,p=<u8>` in that order
fn parse_params(block: &str) -> Option<(u32, u32, u8)> {
    let mut fields = block.split(',');
    let m = fields.next()?.strip_prefix("m=")?.parse().ok()?;
    let t = fields.next()?.strip_prefix("t=")?.parse().ok()?;
    let p = fields.next()?.strip_prefix("p=")?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((m, t, p))
}

fn derive(
    password: &[u8],
    salt: &[u8],
    params: HashParams,
) -> Result<Vec<u8>, HashDecodeError> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        u32::from(params.parallelism),
        Some(params.key_len),
    )
    .map_err(|e| HashDecodeError::RejectedParameters(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut out = vec![0u8; params.key_len];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| HashDecodeError::RejectedParameters(e.to_string()))?;
    Ok(out)
}

/// Password hashing service
///
/// Uses Argon2id which is the recommended variant for password hashing.
/// It provides resistance against both side-channel and GPU-based attacks.
pub struct PasswordService;

impl PasswordService {
    /// Hash a password with the default parameters (blocking operation)
    pub fn hash(password: &str) -> Result<EncodedHash, PasswordError> {
        Self::hash_with_params(password, HashParams::default())
    }

    /// Hash a password with explicit cost parameters
    pub fn hash_with_params(
        password: &str,
        params: HashParams,
    ) -> Result<EncodedHash, PasswordError> {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| PasswordError::RandomSource(e.to_string()))?;

        let digest = derive(password.as_bytes(), &salt, params)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;

        Ok(EncodedHash {
            version: ARGON2_VERSION,
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
            salt,
            digest,
        })
    }

    /// Hash a password asynchronously (non-blocking)
    ///
    /// Spawns the CPU-intensive work on a blocking thread pool,
    /// preventing it from blocking the async runtime.
    pub async fn hash_async(password: String) -> Result<EncodedHash, PasswordError> {
        tokio::task::spawn_blocking(move || Self::hash(&password))
            .await
            .map_err(|e| PasswordError::Hashing(format!("task join error: {}", e)))?
    }

    /// Verify a password against an encoded hash (blocking operation)
    ///
    /// Returns `Ok(false)` for a well-formed hash that does not match and
    /// an error only when the stored hash cannot be used.
    pub fn verify(password: &str, encoded: &str) -> Result<bool, PasswordError> {
        let parsed = EncodedHash::decode(encoded)?;
        Self::verify_parsed(password, &parsed)
    }

    /// Verify against an already parsed hash
    pub fn verify_parsed(password: &str, hash: &EncodedHash) -> Result<bool, PasswordError> {
        let computed = derive(password.as_bytes(), hash.salt(), hash.params())?;
        Ok(bool::from(computed.as_slice().ct_eq(hash.digest())))
    }

    /// Verify a password asynchronously (non-blocking)
    ///
    /// Spawns the CPU-intensive work on a blocking thread pool.
    pub async fn verify_async(password: String, encoded: String) -> Result<bool, PasswordError> {
        tokio::task::spawn_blocking(move || Self::verify(&password, &encoded))
            .await
            .map_err(|e| PasswordError::Hashing(format!("task join error: {}", e)))?
    }
}
