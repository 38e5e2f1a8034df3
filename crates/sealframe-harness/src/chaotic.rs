//! Chaotic session store for fault injection testing
//!
//! Wraps a [`SessionStore`] and fails operations at random with
//! [`StoreError::Io`], so tests can check that store failures propagate
//! unchanged and never leave a half-applied session behind.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sealframe_core::{SessionRecord, SessionStore, StoreError};
use sealframe_proto::ProtocolAddress;
use tracing::debug;

/// Error message of injected failures.
pub const INJECTED_FAILURE: &str = "chaotic failure injection";

/// Session store wrapper that injects failures.
///
/// Clones share the failure RNG and the operation counter.
#[derive(Clone)]
pub struct ChaoticSessionStore<S: SessionStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// Whether loads may fail too, or only stores
    fail_reads: bool,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<Mutex<usize>>,
}

/// Linear congruential generator; reproducible for a given seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: SessionStore> ChaoticSessionStore<S> {
    /// Wrap `inner`, failing loads and stores with probability
    /// `failure_rate` (clamped to [0.0, 1.0]).
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Like [`new`](Self::new) with an explicit seed.
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            fail_reads: true,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Only `store_session` fails; loads always reach the inner store.
    #[must_use]
    pub fn writes_only(mut self) -> Self {
        self.fail_reads = false;
        self
    }

    /// Underlying store, for checking state after chaos.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Operations attempted so far, failed ones included.
    pub fn operation_count(&self) -> usize {
        *self.operation_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn should_fail(&self, is_read: bool) -> bool {
        *self.operation_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if is_read && !self.fail_reads {
            return false;
        }
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).next() < self.failure_rate
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for ChaoticSessionStore<S> {
    async fn load_session(
        &self,
        address: &ProtocolAddress,
    ) -> sealframe_core::Result<Option<SessionRecord>> {
        if self.should_fail(true) {
            debug!(%address, "injecting load failure");
            return Err(StoreError::Io(INJECTED_FAILURE.to_string()).into());
        }
        self.inner.load_session(address).await
    }

    async fn store_session(
        &mut self,
        address: &ProtocolAddress,
        record: &SessionRecord,
    ) -> sealframe_core::Result<()> {
        if self.should_fail(false) {
            debug!(%address, "injecting store failure");
            return Err(StoreError::Io(INJECTED_FAILURE.to_string()).into());
        }
        self.inner.store_session(address, record).await
    }
}
