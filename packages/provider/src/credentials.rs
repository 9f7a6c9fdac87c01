//! Per-provider API credential pools.
//!
//! A [`CredentialPool`] is a ring buffer of keys with a rotation cursor and
//! a cooldown timestamp per key. [`CredentialPool::checkout`] hands out the
//! next key that is neither in use nor cooling down; the returned
//! [`CredentialLease`] goes back to the pool on [`CredentialPool::release`],
//! on [`CredentialPool::mark_rate_limited`], or when dropped.
//!
//! Pools are usually obtained through [`shared_pool`], which keeps one pool
//! per provider for the whole process so that concurrent requests share
//! the same rotation cursor.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a checkout produced no key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// The pool holds no keys at all.
    #[error("credential pool is empty")]
    Empty,

    /// Every key is in use or cooling down.
    #[error("all credentials busy (retry after {retry_after:?})")]
    Exhausted {
        /// Time until the earliest cooling key becomes usable, if any key
        /// is cooling. `None` when every key is merely in use.
        retry_after: Option<Duration>,
    },
}

#[derive(Debug)]
struct Slot {
    key: String,
    in_use: bool,
    cooling_until: Option<Instant>,
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<Slot>,
    cursor: usize,
}

#[derive(Debug)]
struct PoolInner {
    provider: String,
    cooldown: Duration,
    state: Mutex<PoolState>,
}

/// A rotating pool of API keys for one provider. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    inner: Arc<PoolInner>,
}

impl CredentialPool {
    /// Creates a pool over `keys`. Blank keys are ignored.
    #[must_use]
    pub fn new(provider: &str, keys: Vec<String>, cooldown: Duration) -> Self {
        let slots = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|key| Slot {
                key,
                in_use: false,
                cooling_until: None,
            })
            .collect();

        Self {
            inner: Arc::new(PoolInner {
                provider: provider.to_string(),
                cooldown,
                state: Mutex::new(PoolState { slots, cursor: 0 }),
            }),
        }
    }

    /// Creates a pool from a comma-separated key list.
    #[must_use]
    pub fn from_key_list(provider: &str, key_list: &str, cooldown: Duration) -> Self {
        Self::new(
            provider,
            key_list.split(',').map(str::to_string).collect(),
            cooldown,
        )
    }

    /// Provider this pool serves.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.inner.provider
    }

    /// Number of keys in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// Returns `true` if the pool holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks out the next available key.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError`] if the pool is empty or every key is in
    /// use or cooling down.
    pub fn checkout(&self) -> Result<CredentialLease, CheckoutError> {
        self.checkout_at(Instant::now())
    }

    fn checkout_at(&self, now: Instant) -> Result<CredentialLease, CheckoutError> {
        let mut state = self.lock();
        let len = state.slots.len();
        if len == 0 {
            return Err(CheckoutError::Empty);
        }

        for offset in 0..len {
            let index = (state.cursor + offset) % len;
            let slot = &mut state.slots[index];
            if slot.in_use {
                continue;
            }
            if let Some(until) = slot.cooling_until {
                if until > now {
                    continue;
                }
                slot.cooling_until = None;
            }
            slot.in_use = true;
            let key = slot.key.clone();
            state.cursor = (index + 1) % len;
            return Ok(CredentialLease {
                pool: self.clone(),
                index,
                key,
                returned: false,
            });
        }

        let retry_after = state
            .slots
            .iter()
            .filter(|s| !s.in_use)
            .filter_map(|s| s.cooling_until)
            .min()
            .map(|until| until.saturating_duration_since(now));

        Err(CheckoutError::Exhausted { retry_after })
    }

    /// Returns a key to the pool after a successful or non-rate-limit use.
    pub fn release(&self, mut lease: CredentialLease) {
        lease.returned = true;
        self.return_slot(lease.index, None);
    }

    /// Returns a key that hit a rate limit; it is skipped until the
    /// cooldown expires.
    pub fn mark_rate_limited(&self, lease: CredentialLease) {
        self.mark_rate_limited_at(lease, Instant::now());
    }

    fn mark_rate_limited_at(&self, mut lease: CredentialLease, now: Instant) {
        lease.returned = true;
        log::warn!(
            "{}: credential #{} rate limited, cooling down for {:?}",
            self.provider(),
            lease.index,
            self.inner.cooldown
        );
        self.return_slot(lease.index, Some(now + self.inner.cooldown));
    }

    fn return_slot(&self, index: usize, cooling_until: Option<Instant>) {
        let mut state = self.lock();
        if let Some(slot) = state.slots.get_mut(index) {
            slot.in_use = false;
            if cooling_until.is_some() {
                slot.cooling_until = cooling_until;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A checked-out key. Returns itself to the pool when dropped.
#[derive(Debug)]
pub struct CredentialLease {
    pool: CredentialPool,
    index: usize,
    key: String,
    returned: bool,
}

impl CredentialLease {
    /// The API key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Position of the key in its pool.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl Drop for CredentialLease {
    fn drop(&mut self) {
        if !self.returned {
            self.pool.return_slot(self.index, None);
        }
    }
}

static POOLS: LazyLock<Mutex<BTreeMap<String, CredentialPool>>> =
    LazyLock::new(|| Mutex::new(BTreeMap::new()));

/// Returns the process-wide pool for `provider`, creating it on first use
/// from the comma-separated keys in `env_var`.
///
/// Returns `None` when the variable is unset or holds no keys; nothing is
/// cached in that case so a later call can still pick the keys up.
#[must_use]
pub fn shared_pool(provider: &str, env_var: &str, cooldown: Duration) -> Option<CredentialPool> {
    let mut pools = POOLS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(pool) = pools.get(provider) {
        return Some(pool.clone());
    }

    let key_list = std::env::var(env_var).ok()?;
    let pool = CredentialPool::from_key_list(provider, &key_list, cooldown);
    if pool.is_empty() {
        log::warn!("{env_var} is set but contains no keys; {provider} disabled");
        return None;
    }

    log::info!("{provider}: loaded {} credential(s) from {env_var}", pool.len());
    pools.insert(provider.to_string(), pool.clone());
    Some(pool)
}

/// Installs `pool` as the process-wide pool for its provider, replacing
/// any existing one.
pub fn register_pool(pool: CredentialPool) {
    let mut pools = POOLS.lock().unwrap_or_else(PoisonError::into_inner);
    pools.insert(pool.provider().to_string(), pool);
}
