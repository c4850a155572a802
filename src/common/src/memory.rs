//! Per-operator soft memory budget.
//!
//! Spec.md §5: "each operator declares a soft budget; on exhaustion it
//! returns a `ResourceExhausted` error upward". §4.5 additionally requires
//! the hash-join build side to fail with `OutOfMemory` (not
//! `ResourceExhausted`) once it is fully materialised past its limit, so
//! [`MemoryContext`] lets the caller pick which `ErrorCode` a given
//! allocation site raises. Grounded on the teacher's own `MemoryContext`,
//! which its hash-agg and hash-join executors thread through for the same
//! reason (see `risingwave_batch::executor::hash_agg` constructor args).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::{ErrorCode, OpteryxError, Result};

#[derive(Clone)]
pub struct MemoryContext {
    used: Arc<AtomicI64>,
    limit_bytes: i64,
}

impl MemoryContext {
    pub fn new(limit_bytes: i64) -> Self {
        Self { used: Arc::new(AtomicI64::new(0)), limit_bytes }
    }

    pub fn unbounded() -> Self {
        Self::new(i64::MAX)
    }

    pub fn used_bytes(&self) -> i64 {
        self.used.load(Ordering::Relaxed)
    }

    /// Accounts `delta` bytes (may be negative on release) and fails with
    /// `ResourceExhausted` if the running total exceeds the limit.
    pub fn grow(&self, delta: i64, context: &str) -> Result<()> {
        let new_total = self.used.fetch_add(delta, Ordering::Relaxed) + delta;
        if new_total > self.limit_bytes {
            self.used.fetch_sub(delta, Ordering::Relaxed);
            return Err(OpteryxError::from(ErrorCode::ResourceExhausted(format!(
                "{context}: would use {new_total} bytes, limit is {}",
                self.limit_bytes
            ))));
        }
        Ok(())
    }

    /// Same as [`Self::grow`] but raises `OutOfMemory` — used by the
    /// hash-join build side per spec.md §4.5's "no spilling" policy.
    pub fn grow_or_oom(&self, delta: i64, context: &str) -> Result<()> {
        let new_total = self.used.fetch_add(delta, Ordering::Relaxed) + delta;
        if new_total > self.limit_bytes {
            self.used.fetch_sub(delta, Ordering::Relaxed);
            return Err(OpteryxError::from(ErrorCode::OutOfMemory(format!(
                "{context}: build side grew to {new_total} bytes, limit is {}",
                self.limit_bytes
            ))));
        }
        Ok(())
    }

    pub fn release(&self, delta: i64) {
        self.used.fetch_sub(delta, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_fails_past_limit() {
        let ctx = MemoryContext::new(100);
        assert!(ctx.grow(60, "probe").is_ok());
        assert!(ctx.grow(60, "probe").is_err());
        assert_eq!(ctx.used_bytes(), 60);
    }

    #[test]
    fn grow_or_oom_reports_out_of_memory() {
        let ctx = MemoryContext::new(10);
        let err = ctx.grow_or_oom(11, "build side").unwrap_err();
        assert!(matches!(err.code, ErrorCode::OutOfMemory(_)));
    }
}
