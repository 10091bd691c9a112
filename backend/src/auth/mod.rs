//! Authentication module
//!
//! Argon2id password hashing, login lockout tracking, rotating JWT secrets,
//! per-IP request limiting, and the request extractors that enforce them.

mod brute_force;
mod jwt;
mod middleware;
mod password;
mod request_limit;

pub use brute_force::{
    BlockScope, BlockStatus, BruteForceProtector, LoginAttemptRecord, LockoutPolicy,
};
pub use jwt::{JwtConfig, JwtManager, TokenClaims, TokenType, SECRET_LEN};
pub use middleware::{client_ip, AdminUser, AuthUser, ClientInfo};
pub use password::{
    EncodedHash, HashDecodeError, HashParams, PasswordError, PasswordService, MAX_MEMORY_KIB,
};
pub use request_limit::{limit_requests, RequestLimiter};
