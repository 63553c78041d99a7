// src/engine/ledger.rs

//! Resource ledger: in-use worker slots, memory and task count against the
//! configured ceilings.
//!
//! Every read and write goes through one `Mutex`, so a reservation is either
//! fully applied (slots + memory + one pool seat) or not at all, and two
//! concurrent `try_reserve` calls can never jointly overshoot a ceiling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, trace};

use crate::types::ResourceCost;

/// Configured ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Ceiling on the sum of `worker_slots` over running tasks.
    pub max_workers: u32,
    /// Ceiling on the sum of `memory_mb` over running tasks.
    pub max_memory_mb: u64,
    /// Worker pool size: how many tasks may run at once, regardless of cost.
    pub max_concurrent_tasks: usize,
}

impl ResourceLimits {
    /// Pool size defaults to the worker ceiling.
    pub fn new(max_workers: u32, max_memory_mb: u64) -> Self {
        Self {
            max_workers,
            max_memory_mb,
            max_concurrent_tasks: max_workers as usize,
        }
    }

    pub fn with_max_concurrent_tasks(mut self, n: usize) -> Self {
        self.max_concurrent_tasks = n;
        self
    }

    /// Whether `cost` could ever be admitted (i.e. fits on an idle ledger).
    pub fn admits(&self, cost: ResourceCost) -> bool {
        cost.worker_slots <= self.max_workers
            && cost.memory_mb <= self.max_memory_mb
            && self.max_concurrent_tasks >= 1
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1) as u32;
        Self::new(cpus, 8192)
    }
}

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerUsage {
    pub workers_in_use: u32,
    pub memory_in_use_mb: u64,
    pub tasks_in_use: usize,
}

/// Cumulative counters, used to check that reserve/release stay balanced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub reservations: u64,
    pub releases: u64,
    pub rejections: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    usage: LedgerUsage,
    stats: LedgerStats,
}

#[derive(Debug)]
pub struct ResourceLedger {
    limits: ResourceLimits,
    state: Mutex<LedgerState>,
}

impl ResourceLedger {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    pub fn usage(&self) -> LedgerUsage {
        self.lock().usage
    }

    pub fn stats(&self) -> LedgerStats {
        self.lock().stats
    }

    /// Whether `cost` fits in the capacity that is free right now.
    pub fn fits(&self, cost: ResourceCost) -> bool {
        fits(&self.limits, &self.lock().usage, cost)
    }

    /// Atomically reserve `cost` (plus one pool seat) if everything fits.
    ///
    /// Returns `false` and changes nothing otherwise.
    pub fn try_reserve(&self, cost: ResourceCost) -> bool {
        let mut state = self.lock();
        if !fits(&self.limits, &state.usage, cost) {
            state.stats.rejections += 1;
            return false;
        }
        state.usage.workers_in_use += cost.worker_slots;
        state.usage.memory_in_use_mb += cost.memory_mb;
        state.usage.tasks_in_use += 1;
        state.stats.reservations += 1;
        trace!(
            worker_slots = cost.worker_slots,
            memory_mb = cost.memory_mb,
            usage = ?state.usage,
            "reserved resources"
        );
        true
    }

    /// Return `cost` (plus one pool seat) to the ledger.
    ///
    /// Never fails. Releasing more than is in use indicates an accounting
    /// bug; it is logged and the counters saturate at zero.
    pub fn release(&self, cost: ResourceCost) {
        let mut state = self.lock();
        let usage = &mut state.usage;
        if usage.workers_in_use < cost.worker_slots
            || usage.memory_in_use_mb < cost.memory_mb
            || usage.tasks_in_use == 0
        {
            error!(
                worker_slots = cost.worker_slots,
                memory_mb = cost.memory_mb,
                usage = ?*usage,
                "ledger release exceeds usage; accounting bug"
            );
        }
        usage.workers_in_use = usage.workers_in_use.saturating_sub(cost.worker_slots);
        usage.memory_in_use_mb = usage.memory_in_use_mb.saturating_sub(cost.memory_mb);
        usage.tasks_in_use = usage.tasks_in_use.saturating_sub(1);
        state.stats.releases += 1;
        trace!(
            worker_slots = cost.worker_slots,
            memory_mb = cost.memory_mb,
            "released resources"
        );
    }

    /// Scoped variant of [`try_reserve`](Self::try_reserve): the returned
    /// guard releases the reservation exactly once when dropped.
    pub fn try_acquire(self: &Arc<Self>, cost: ResourceCost) -> Option<Reservation> {
        if self.try_reserve(cost) {
            Some(Reservation {
                ledger: Arc::clone(self),
                cost,
            })
        } else {
            None
        }
    }
}

fn fits(limits: &ResourceLimits, usage: &LedgerUsage, cost: ResourceCost) -> bool {
    usage
        .workers_in_use
        .checked_add(cost.worker_slots)
        .is_some_and(|n| n <= limits.max_workers)
        && usage
            .memory_in_use_mb
            .checked_add(cost.memory_mb)
            .is_some_and(|n| n <= limits.max_memory_mb)
        && usage.tasks_in_use < limits.max_concurrent_tasks
}

/// Resources held by one running task. Released on drop.
#[derive(Debug)]
pub struct Reservation {
    ledger: Arc<ResourceLedger>,
    cost: ResourceCost,
}

impl Reservation {
    pub fn cost(&self) -> ResourceCost {
        self.cost
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.ledger.release(self.cost);
    }
}
