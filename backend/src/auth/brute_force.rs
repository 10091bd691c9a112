//! Brute-force protection for the login endpoint
//!
//! Failed logins are tracked in two independent scopes:
//!
//! - **account**: keyed by `"<ip>:<identifier>"`, blocks after 5 failures
//! - **ip**: keyed by `"<ip>"`, counts failures across every identifier
//!   tried from that address and blocks after 10
//!
//! A scope that keeps failing while blocked has its block length doubled,
//! up to 24 hours. Records live only in memory and are swept once their
//! block has expired and they have been idle long enough.

use crate::tasks::PeriodicTask;
use chrono::{DateTime, Duration, Utc};
use folio_shared::AuthError;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Thresholds and timings for lockout
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    pub account_threshold: u32,
    pub ip_threshold: u32,
    pub account_initial_block: Duration,
    pub ip_initial_block: Duration,
    pub max_block: Duration,
    /// Records idle for longer than this (and not blocked) are swept
    pub idle_window: Duration,
    pub sweep_interval: std::time::Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            account_threshold: 5,
            ip_threshold: 10,
            account_initial_block: Duration::seconds(30),
            ip_initial_block: Duration::seconds(60),
            max_block: Duration::hours(24),
            idle_window: Duration::minutes(30),
            sweep_interval: std::time::Duration::from_secs(3600),
        }
    }
}

/// Which scope produced a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockScope {
    Account,
    Ip,
}

/// Failed-attempt state for one scope key
#[derive(Debug, Clone)]
pub struct LoginAttemptRecord {
    pub scope_key: String,
    pub failed_count: u32,
    pub last_failed_at: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
    /// Length of the most recent block, the base for doubling
    block_duration: Option<Duration>,
}

impl LoginAttemptRecord {
    fn new(scope_key: String, now: DateTime<Utc>) -> Self {
        Self {
            scope_key,
            failed_count: 0,
            last_failed_at: now,
            blocked_until: None,
            block_duration: None,
        }
    }

    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }

    /// Count a failure; returns the new block length if this failure (re)blocks
    fn register_failure(
        &mut self,
        now: DateTime<Utc>,
        threshold: u32,
        initial: Duration,
        max: Duration,
    ) -> Option<Duration> {
        let was_blocked = self.is_blocked_at(now);
        self.failed_count = self.failed_count.saturating_add(1);
        self.last_failed_at = now;

        if self.failed_count < threshold {
            return None;
        }

        let duration = match self.block_duration {
            Some(prev) if was_blocked => prev.checked_mul(2).map_or(max, |next| next.min(max)),
            _ => initial,
        };
        self.block_duration = Some(duration);
        self.blocked_until = Some(now + duration);
        Some(duration)
    }

    fn is_stale_at(&self, now: DateTime<Utc>, idle_window: Duration) -> bool {
        !self.is_blocked_at(now) && self.last_failed_at + idle_window < now
    }
}

/// Result of a block check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStatus {
    pub blocked: bool,
    pub until: Option<DateTime<Utc>>,
    pub scope: Option<BlockScope>,
}

impl BlockStatus {
    fn clear() -> Self {
        Self {
            blocked: false,
            until: None,
            scope: None,
        }
    }

    fn blocked(until: DateTime<Utc>, scope: BlockScope) -> Self {
        Self {
            blocked: true,
            until: Some(until),
            scope: Some(scope),
        }
    }

    /// Time left until the block lifts, zero when not blocked
    pub fn retry_after_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        self.until
            .and_then(|until| (until - now).to_std().ok())
            .unwrap_or(std::time::Duration::ZERO)
    }

    pub fn retry_after(&self) -> std::time::Duration {
        self.retry_after_at(Utc::now())
    }
}

#[derive(Default)]
struct AttemptTables {
    accounts: HashMap<String, LoginAttemptRecord>,
    ips: HashMap<String, LoginAttemptRecord>,
}

fn account_key(ip: &str, identifier: &str) -> String {
    format!("{}:{}", ip, identifier)
}

/// Tracks failed logins and decides when to block
///
/// Both scope tables sit behind a single reader/writer lock: checks take the
/// read side, failures/successes/sweeps take the write side.
pub struct BruteForceProtector {
    tables: RwLock<AttemptTables>,
    policy: LockoutPolicy,
    sweeper: Mutex<Option<PeriodicTask>>,
}

impl BruteForceProtector {
    /// Create a protector; the periodic sweep is not running until [`start`](Self::start)
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            tables: RwLock::new(AttemptTables::default()),
            policy,
            sweeper: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Spawn the periodic sweep. Calling it again is a no-op.
    ///
    /// Must be called within a Tokio runtime context.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock();
        if slot.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        *slot = Some(PeriodicTask::spawn(
            "brute-force-sweep",
            self.policy.sweep_interval,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(protector) = weak.upgrade() {
                        protector.sweep();
                    }
                }
            },
        ));
    }

    /// Stop the periodic sweep and wait for it to exit
    pub async fn shutdown(&self) {
        let task = self.sweeper.lock().take();
        if let Some(task) = task {
            task.shutdown().await;
        }
    }

    /// Check whether `(ip, identifier)` may attempt a login
    pub fn is_blocked(&self, ip: &str, identifier: &str) -> BlockStatus {
        self.is_blocked_at(ip, identifier, Utc::now())
    }

    pub fn is_blocked_at(&self, ip: &str, identifier: &str, now: DateTime<Utc>) -> BlockStatus {
        let tables = self.tables.read();

        if let Some(record) = tables.accounts.get(&account_key(ip, identifier)) {
            if let Some(until) = record.blocked_until.filter(|until| *until > now) {
                return BlockStatus::blocked(until, BlockScope::Account);
            }
        }

        if let Some(record) = tables.ips.get(ip) {
            if let Some(until) = record.blocked_until.filter(|until| *until > now) {
                return BlockStatus::blocked(until, BlockScope::Ip);
            }
        }

        BlockStatus::clear()
    }

    /// Like [`is_blocked`](Self::is_blocked) but as a `RateLimited` error
    pub fn check(&self, ip: &str, identifier: &str) -> Result<(), AuthError> {
        let now = Utc::now();
        let status = self.is_blocked_at(ip, identifier, now);
        if status.blocked {
            metrics::counter!("auth_login_blocked_total").increment(1);
            return Err(AuthError::RateLimited {
                retry_after: status.retry_after_at(now),
            });
        }
        Ok(())
    }

    /// Count a failed login against both scopes
    pub fn record_failure(&self, ip: &str, identifier: &str) {
        self.record_failure_at(ip, identifier, Utc::now());
    }

    pub fn record_failure_at(&self, ip: &str, identifier: &str, now: DateTime<Utc>) {
        let policy = &self.policy;
        let mut tables = self.tables.write();

        let key = account_key(ip, identifier);
        let account = tables
            .accounts
            .entry(key.clone())
            .or_insert_with(|| LoginAttemptRecord::new(key, now));
        if let Some(duration) = account.register_failure(
            now,
            policy.account_threshold,
            policy.account_initial_block,
            policy.max_block,
        ) {
            warn!(
                username = %identifier,
                ip = %ip,
                failed_attempts = account.failed_count,
                blocked_until = ?account.blocked_until,
                block_secs = duration.num_seconds(),
                "Account temporarily blocked due to too many failed attempts"
            );
        }

        let ip_record = tables
            .ips
            .entry(ip.to_string())
            .or_insert_with(|| LoginAttemptRecord::new(ip.to_string(), now));
        if let Some(duration) = ip_record.register_failure(
            now,
            policy.ip_threshold,
            policy.ip_initial_block,
            policy.max_block,
        ) {
            warn!(
                ip = %ip,
                failed_attempts = ip_record.failed_count,
                blocked_until = ?ip_record.blocked_until,
                block_secs = duration.num_seconds(),
                "IP temporarily blocked due to too many failed attempts"
            );
        }
    }

    /// Clear the account-scope record for exactly this `(ip, identifier)`
    ///
    /// The IP-scope record is left alone so one account's success cannot
    /// reset tracking for other accounts attacked from the same address.
    pub fn record_success(&self, ip: &str, identifier: &str) {
        let removed = self
            .tables
            .write()
            .accounts
            .remove(&account_key(ip, identifier));
        if removed.is_some() {
            debug!(username = %identifier, ip = %ip, "Cleared failed login attempts");
        }
    }

    /// Drop records whose block expired and whose last failure is older than the idle window
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let idle = self.policy.idle_window;
        let mut tables = self.tables.write();
        let before = tables.accounts.len() + tables.ips.len();

        tables.accounts.retain(|_, record| !record.is_stale_at(now, idle));
        tables.ips.retain(|_, record| !record.is_stale_at(now, idle));

        let remaining_accounts = tables.accounts.len();
        let remaining_ips = tables.ips.len();
        let removed = before - remaining_accounts - remaining_ips;
        info!(
            removed,
            remaining_attempts = remaining_accounts,
            remaining_ip_attempts = remaining_ips,
            "Cleaned up brute force protection cache"
        );
        removed
    }

    /// Snapshot of one account-scope record
    pub fn account_record(&self, ip: &str, identifier: &str) -> Option<LoginAttemptRecord> {
        self.tables
            .read()
            .accounts
            .get(&account_key(ip, identifier))
            .cloned()
    }

    /// Snapshot of one IP-scope record
    pub fn ip_record(&self, ip: &str) -> Option<LoginAttemptRecord> {
        self.tables.read().ips.get(ip).cloned()
    }

    /// Number of tracked `(account, ip)` records
    pub fn tracked(&self) -> (usize, usize) {
        let tables = self.tables.read();
        (tables.accounts.len(), tables.ips.len())
    }
}

impl Default for BruteForceProtector {
    fn default() -> Self {
        Self::new(LockoutPolicy::default())
    }
}
