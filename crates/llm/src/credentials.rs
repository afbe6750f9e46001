//! Credential pool with per-credential health tracking.
//!
//! Each credential carries its own lock, so failures on one key never block
//! dispatch on another. Locks are only held for the state read or update
//! around a provider call, never across it.

use crate::client::FailureKind;
use crate::family::ProviderFamily;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Failure streaks stop counting here; backoff is capped well before.
pub const MAX_TRACKED_FAILURES: u32 = 16;

/// Exponential cooldown schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            cap: Duration::from_secs(120),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Cooldown after `failures` consecutive failures: `base * 2^(n-1)`, capped.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// Stable handle to one credential: family plus declared position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialId {
    pub family: ProviderFamily,
    pub index: usize,
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.family, self.index + 1)
    }
}

/// API key wrapper that never prints its value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretRef(String);

impl SecretRef {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw key, for building request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretRef(<redacted>)")
    }
}

/// Outcome reported back to the pool after a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthReport {
    Success,
    TransientFailure,
    FatalFailure,
}

impl From<FailureKind> for HealthReport {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Transient => Self::TransientFailure,
            FailureKind::Fatal => Self::FatalFailure,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CredentialState {
    cooldown_until: Option<Instant>,
    consecutive_failures: u32,
    disabled: bool,
    last_failure_at: Option<Instant>,
}

impl CredentialState {
    fn is_ready(&self, now: Instant) -> bool {
        !self.disabled && self.cooldown_until.map_or(true, |until| until <= now)
    }
}

struct Slot {
    id: CredentialId,
    secret: SecretRef,
    state: Mutex<CredentialState>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, CredentialState> {
        // Poisoning is recovered: the state is plain data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self, last_resort: bool) -> Credential {
        let state = self.lock().clone();
        Credential {
            id: self.id,
            identifier: self.id.to_string(),
            secret: self.secret.clone(),
            cooldown_until: state.cooldown_until,
            consecutive_failures: state.consecutive_failures,
            disabled: state.disabled,
            last_resort,
        }
    }
}

/// Point-in-time view of one credential, handed out by `acquire`.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: CredentialId,
    /// Log-safe name such as `openai#2`
    pub identifier: String,
    pub secret: SecretRef,
    pub cooldown_until: Option<Instant>,
    pub consecutive_failures: u32,
    pub disabled: bool,
    /// Handed out while cooling down because nothing else was ready
    pub last_resort: bool,
}

impl Credential {
    pub fn family(&self) -> ProviderFamily {
        self.id.family
    }
}

/// Log-safe status row for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub id: CredentialId,
    pub ready: bool,
    pub disabled: bool,
    pub consecutive_failures: u32,
    pub cooldown_remaining: Option<Duration>,
}

/// Ordered credentials per family with their health state.
pub struct CredentialPool {
    families: BTreeMap<ProviderFamily, Vec<Slot>>,
    backoff: BackoffPolicy,
}

impl CredentialPool {
    /// Create an empty pool.
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            families: BTreeMap::new(),
            backoff,
        }
    }

    /// Register a family's keys in priority order. Empty lists are ignored.
    pub fn with_family<I, S>(mut self, family: ProviderFamily, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots: Vec<Slot> = secrets
            .into_iter()
            .enumerate()
            .map(|(index, secret)| Slot {
                id: CredentialId { family, index },
                secret: SecretRef::new(secret),
                state: Mutex::new(CredentialState::default()),
            })
            .collect();

        if !slots.is_empty() {
            self.families.insert(family, slots);
        }
        self
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Families that hold at least one credential, in priority order.
    pub fn families(&self) -> Vec<ProviderFamily> {
        self.families.keys().copied().collect()
    }

    /// Number of credentials registered for a family.
    pub fn len(&self, family: ProviderFamily) -> usize {
        self.families.get(&family).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Acquire the first ready credential of `family`.
    pub fn acquire(&self, family: ProviderFamily) -> Option<Credential> {
        self.acquire_at(family, Instant::now(), &[])
    }

    /// Acquire with an explicit clock, skipping credentials in `exclude`.
    ///
    /// Returns the first ready credential in declared order. When no
    /// credential in any family is ready, falls back to this family's
    /// least-recently-failed enabled credential. Returns `None` when the
    /// family has nothing usable while another family still does.
    pub fn acquire_at(
        &self,
        family: ProviderFamily,
        now: Instant,
        exclude: &[CredentialId],
    ) -> Option<Credential> {
        let slots = self.families.get(&family)?;
        let candidates = || slots.iter().filter(move |slot| !exclude.contains(&slot.id));

        if let Some(slot) = candidates().find(|slot| slot.lock().is_ready(now)) {
            return Some(slot.snapshot(false));
        }

        if self.any_ready_at(now, exclude) {
            return None;
        }

        let fallback = candidates()
            .filter_map(|slot| {
                let state = slot.lock();
                (!state.disabled).then(|| (state.last_failure_at, slot))
            })
            .min_by_key(|(last_failure_at, _)| *last_failure_at)
            .map(|(_, slot)| slot)?;

        tracing::warn!(
            "All credentials cooling down; using {} as last resort",
            fallback.id
        );
        Some(fallback.snapshot(true))
    }

    /// Whether any non-excluded credential in any family is ready.
    pub fn any_ready_at(&self, now: Instant, exclude: &[CredentialId]) -> bool {
        self.families
            .values()
            .flatten()
            .filter(|slot| !exclude.contains(&slot.id))
            .any(|slot| slot.lock().is_ready(now))
    }

    /// Record the outcome of an attempt.
    pub fn report(&self, id: CredentialId, outcome: HealthReport) {
        self.report_at(id, outcome, Instant::now());
    }

    /// Record an outcome with an explicit clock.
    pub fn report_at(&self, id: CredentialId, outcome: HealthReport, now: Instant) {
        let Some(slot) = self.slot(id) else {
            tracing::warn!("Ignoring report for unknown credential {}", id);
            return;
        };

        let mut state = slot.lock();
        match outcome {
            HealthReport::Success => {
                state.consecutive_failures = 0;
                state.cooldown_until = None;
            }
            HealthReport::TransientFailure => {
                state.consecutive_failures =
                    (state.consecutive_failures + 1).min(MAX_TRACKED_FAILURES);
                let delay = self.backoff.delay(state.consecutive_failures);
                state.cooldown_until = Some(now + delay);
                state.last_failure_at = Some(now);
                tracing::debug!(
                    "Credential {} cooling down for {:?} (failures: {})",
                    id,
                    delay,
                    state.consecutive_failures
                );
            }
            HealthReport::FatalFailure => {
                state.consecutive_failures =
                    (state.consecutive_failures + 1).min(MAX_TRACKED_FAILURES);
                state.disabled = true;
                state.last_failure_at = Some(now);
                tracing::warn!("Credential {} disabled for this process", id);
            }
        }
    }

    /// Status of every credential in priority order.
    pub fn status_at(&self, now: Instant) -> Vec<CredentialStatus> {
        self.families
            .values()
            .flatten()
            .map(|slot| {
                let state = slot.lock();
                CredentialStatus {
                    id: slot.id,
                    ready: state.is_ready(now),
                    disabled: state.disabled,
                    consecutive_failures: state.consecutive_failures,
                    cooldown_remaining: state
                        .cooldown_until
                        .and_then(|until| until.checked_duration_since(now))
                        .filter(|d| !d.is_zero()),
                }
            })
            .collect()
    }

    fn slot(&self, id: CredentialId) -> Option<&Slot> {
        self.families.get(&id.family)?.get(id.index)
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<_, _> = self
            .families
            .iter()
            .map(|(family, slots)| (family.as_str(), slots.len()))
            .collect();
        f.debug_struct("CredentialPool")
            .field("families", &counts)
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const GROQ: ProviderFamily = ProviderFamily::GroqLike;
    const OPENAI: ProviderFamily = ProviderFamily::OpenAiLike;

    fn pool() -> CredentialPool {
        CredentialPool::new(BackoffPolicy::default())
            .with_family(GROQ, ["g1", "g2", "g3"])
            .with_family(OPENAI, ["o1"])
    }

    fn id(family: ProviderFamily, index: usize) -> CredentialId {
        CredentialId { family, index }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(6), Duration::from_secs(64));
        assert_eq!(policy.delay(7), Duration::from_secs(120));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(120));
    }

    #[test]
    fn test_backoff_monotonic_never_exceeds_cap() {
        let policy = BackoffPolicy::new(Duration::from_millis(1500), Duration::from_secs(90));
        let mut previous = Duration::ZERO;
        for failures in 0..=64 {
            let delay = policy.delay(failures);
            assert!(delay >= previous, "delay shrank at {}", failures);
            assert!(delay <= policy.cap);
            previous = delay;
        }
    }

    #[test]
    fn test_acquire_declared_order() {
        let pool = pool();
        let credential = pool.acquire(GROQ).unwrap();
        assert_eq!(credential.identifier, "groq#1");
        assert!(!credential.last_resort);
        assert_eq!(credential.secret.expose(), "g1");
    }

    #[test]
    fn test_transient_failure_cools_down_then_recovers() {
        let pool = pool();
        let now = Instant::now();
        pool.report_at(id(GROQ, 0), HealthReport::TransientFailure, now);

        let next = pool.acquire_at(GROQ, now, &[]).unwrap();
        assert_eq!(next.id, id(GROQ, 1));

        let later = now + Duration::from_secs(3);
        let recovered = pool.acquire_at(GROQ, later, &[]).unwrap();
        assert_eq!(recovered.id, id(GROQ, 0));
        assert_eq!(recovered.consecutive_failures, 1);
    }

    #[test]
    fn test_success_resets_failures() {
        let pool = pool();
        let now = Instant::now();
        for _ in 0..10 {
            pool.report_at(id(GROQ, 0), HealthReport::TransientFailure, now);
        }
        pool.report_at(id(GROQ, 0), HealthReport::Success, now);

        let credential = pool.acquire_at(GROQ, now, &[]).unwrap();
        assert_eq!(credential.id, id(GROQ, 0));
        assert_eq!(credential.consecutive_failures, 0);
        assert!(credential.cooldown_until.is_none());
    }

    #[test]
    fn test_failures_saturate() {
        let pool = pool();
        let now = Instant::now();
        for _ in 0..100 {
            pool.report_at(id(OPENAI, 0), HealthReport::TransientFailure, now);
        }
        let status = pool.status_at(now);
        let row = status.iter().find(|s| s.id == id(OPENAI, 0)).unwrap();
        assert_eq!(row.consecutive_failures, MAX_TRACKED_FAILURES);
        assert_eq!(row.cooldown_remaining, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_fatal_disables_permanently() {
        let pool = pool();
        let now = Instant::now();
        pool.report_at(id(OPENAI, 0), HealthReport::FatalFailure, now);

        let far_future = now + Duration::from_secs(24 * 3600);
        assert!(pool.acquire_at(OPENAI, far_future, &[]).is_none());
    }

    #[test]
    fn test_no_last_resort_while_other_family_ready() {
        let pool = pool();
        let now = Instant::now();
        for index in 0..3 {
            pool.report_at(id(GROQ, index), HealthReport::TransientFailure, now);
        }
        assert!(pool.acquire_at(GROQ, now, &[]).is_none());
        assert!(pool.acquire_at(OPENAI, now, &[]).is_some());
    }

    #[test]
    fn test_last_resort_is_least_recently_failed() {
        let pool = pool();
        let start = Instant::now();
        pool.report_at(id(GROQ, 0), HealthReport::TransientFailure, start + Duration::from_millis(30));
        pool.report_at(id(GROQ, 1), HealthReport::TransientFailure, start);
        pool.report_at(id(GROQ, 2), HealthReport::TransientFailure, start + Duration::from_millis(20));
        pool.report_at(id(OPENAI, 0), HealthReport::TransientFailure, start + Duration::from_millis(10));

        let now = start + Duration::from_millis(40);
        let credential = pool.acquire_at(GROQ, now, &[]).unwrap();
        assert_eq!(credential.id, id(GROQ, 1));
        assert!(credential.last_resort);
    }

    #[test]
    fn test_exclusions_are_skipped() {
        let pool = pool();
        let now = Instant::now();
        let credential = pool
            .acquire_at(GROQ, now, &[id(GROQ, 0), id(GROQ, 1)])
            .unwrap();
        assert_eq!(credential.id, id(GROQ, 2));
    }

    #[test]
    fn test_unknown_family_is_none() {
        let pool = pool();
        assert!(pool.acquire(ProviderFamily::GeminiLike).is_none());
        assert_eq!(pool.families(), vec![GROQ, OPENAI]);
    }

    #[test]
    fn test_concurrent_reports_do_not_lose_updates() {
        let pool = Arc::new(
            CredentialPool::new(BackoffPolicy::default()).with_family(GROQ, ["only"]),
        );
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    pool.report(id(GROQ, 0), HealthReport::TransientFailure);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let status = pool.status_at(Instant::now());
        assert_eq!(status[0].consecutive_failures, 8);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", pool().acquire(GROQ).unwrap());
        assert!(!rendered.contains("g1\""));
        assert!(rendered.contains("redacted"));
    }
}
