//! Driver statistics: one atomic counter per event kind, snapshot-readable.
//!
//! Increments are performed only by the thread that detected the event, so a
//! relaxed ordering is enough; no cross-field atomicity is claimed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Live, atomically-updated counters, one per event kind.
#[derive(Debug, Default)]
pub struct Statistics {
    pub bus_address_conflict: AtomicU64,
    pub ingress_total_frames: AtomicU64,
    pub ingress_total_octets: AtomicU64,
    pub ingress_echo_frames: AtomicU64,
    pub ingress_empty_frames: AtomicU64,
    pub ingress_short_frames: AtomicU64,
    pub ingress_errors: AtomicU64,
    pub ingress_err_frames: AtomicU64,
    pub ingress_err_octets: AtomicU64,
    pub ingress_err_timeout: AtomicU64,
    pub ingress_err_protocol: AtomicU64,
    pub ingress_emsplus_frames: AtomicU64,
    pub ingress_polreq_frames: AtomicU64,
    pub ingress_polrep_frames: AtomicU64,
    pub ingress_reareq_frames: AtomicU64,
    pub ingress_rearep_frames: AtomicU64,
    pub ingress_wrireq_frames: AtomicU64,
    pub ingress_wrirep_frames: AtomicU64,
    pub egress_total_frames: AtomicU64,
    pub egress_total_octets: AtomicU64,
    pub egress_polrep_frames: AtomicU64,
    pub egress_reareq_frames: AtomicU64,
    pub egress_rearep_frames: AtomicU64,
    pub egress_wrireq_frames: AtomicU64,
    pub egress_wrirep_frames: AtomicU64,
    pub egress_err_short_frames: AtomicU64,
    pub egress_err_long_frames: AtomicU64,
    pub egress_err_timeout: AtomicU64,
    pub egress_err_protocol: AtomicU64,
    start_time: OnceLock<Instant>,
}

/// A point-in-time, plain copy of [`Statistics`], returned by
/// [`Statistics::snapshot`] and by `Driver::get_statistics`.
#[derive(Debug, Clone, Default)]
pub struct StatisticsSnapshot {
    pub bus_address_conflict: u64,
    pub ingress_total_frames: u64,
    pub ingress_total_octets: u64,
    pub ingress_echo_frames: u64,
    pub ingress_empty_frames: u64,
    pub ingress_short_frames: u64,
    pub ingress_errors: u64,
    pub ingress_err_frames: u64,
    pub ingress_err_octets: u64,
    pub ingress_err_timeout: u64,
    pub ingress_err_protocol: u64,
    pub ingress_emsplus_frames: u64,
    pub ingress_polreq_frames: u64,
    pub ingress_polrep_frames: u64,
    pub ingress_reareq_frames: u64,
    pub ingress_rearep_frames: u64,
    pub ingress_wrireq_frames: u64,
    pub ingress_wrirep_frames: u64,
    pub egress_total_frames: u64,
    pub egress_total_octets: u64,
    pub egress_polrep_frames: u64,
    pub egress_reareq_frames: u64,
    pub egress_rearep_frames: u64,
    pub egress_wrireq_frames: u64,
    pub egress_wrirep_frames: u64,
    pub egress_err_short_frames: u64,
    pub egress_err_long_frames: u64,
    pub egress_err_timeout: u64,
    pub egress_err_protocol: u64,
    pub start_time: Option<Instant>,
}

impl Statistics {
    /// Increments a counter by 1. A free function rather than a method on
    /// `AtomicU64` so call sites read as `Statistics::bump(&stats.field)`.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    /// Marks `start_time` to now. Idempotent: only the first call (from
    /// `Driver::open`) has any effect.
    pub fn mark_started(&self) {
        let _ = self.start_time.set(Instant::now());
    }

    /// Reads every counter once into an owned snapshot.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let l = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatisticsSnapshot {
            bus_address_conflict: l(&self.bus_address_conflict),
            ingress_total_frames: l(&self.ingress_total_frames),
            ingress_total_octets: l(&self.ingress_total_octets),
            ingress_echo_frames: l(&self.ingress_echo_frames),
            ingress_empty_frames: l(&self.ingress_empty_frames),
            ingress_short_frames: l(&self.ingress_short_frames),
            ingress_errors: l(&self.ingress_errors),
            ingress_err_frames: l(&self.ingress_err_frames),
            ingress_err_octets: l(&self.ingress_err_octets),
            ingress_err_timeout: l(&self.ingress_err_timeout),
            ingress_err_protocol: l(&self.ingress_err_protocol),
            ingress_emsplus_frames: l(&self.ingress_emsplus_frames),
            ingress_polreq_frames: l(&self.ingress_polreq_frames),
            ingress_polrep_frames: l(&self.ingress_polrep_frames),
            ingress_reareq_frames: l(&self.ingress_reareq_frames),
            ingress_rearep_frames: l(&self.ingress_rearep_frames),
            ingress_wrireq_frames: l(&self.ingress_wrireq_frames),
            ingress_wrirep_frames: l(&self.ingress_wrirep_frames),
            egress_total_frames: l(&self.egress_total_frames),
            egress_total_octets: l(&self.egress_total_octets),
            egress_polrep_frames: l(&self.egress_polrep_frames),
            egress_reareq_frames: l(&self.egress_reareq_frames),
            egress_rearep_frames: l(&self.egress_rearep_frames),
            egress_wrireq_frames: l(&self.egress_wrireq_frames),
            egress_wrirep_frames: l(&self.egress_wrirep_frames),
            egress_err_short_frames: l(&self.egress_err_short_frames),
            egress_err_long_frames: l(&self.egress_err_long_frames),
            egress_err_timeout: l(&self.egress_err_timeout),
            egress_err_protocol: l(&self.egress_err_protocol),
            start_time: self.start_time.get().copied(),
        }
    }
}
