//! Global RAM budget shared by every stack of one application instance.
//!
//! The budget only counts bytes; the pixel data itself lives in the member
//! stacks. Accounting is lock-free, and the member list is copied out of its
//! mutex before any member is asked to free memory, so a sweep never holds
//! the budget lock and a stack lock together, nor two stack locks at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Weak};

use tracing::{debug, trace};

use crate::lock;
use crate::memory::{BudgetConfig, format_bytes};

/// A stack whose resident slices can be evicted on request.
///
/// Implementations take their own per-stack lock inside each call and must
/// not call back into the budget's sweep methods while holding it.
pub trait Evictable: Send + Sync {
    /// Stable member id.
    fn member_id(&self) -> u64;

    /// Bytes of original pixels currently resident.
    fn resident_bytes(&self) -> u64;

    /// Evicts slices until at least `bytes` are freed or nothing is left.
    fn free_at_least(&self, bytes: u64) -> u64;

    /// Evicts every evictable slice.
    fn free_all(&self) -> u64;
}

/// Snapshot of budget usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetReport {
    /// Configured limit.
    pub limit: u64,
    /// Configured safety margin.
    pub margin: u64,
    /// Bytes currently accounted as resident.
    pub resident: u64,
    /// Live member stacks.
    pub members: usize,
    /// Bytes freed on behalf of other stacks.
    pub cooperative_freed: u64,
}

impl std::fmt::Display for BudgetReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resident of {} (margin {}), {} stacks",
            format_bytes(self.resident),
            format_bytes(self.limit),
            format_bytes(self.margin),
            self.members
        )
    }
}

/// Byte accounting plus cooperative eviction across stacks.
pub struct RamBudget {
    config: BudgetConfig,
    resident: AtomicU64,
    cooperative_freed: AtomicU64,
    members: Mutex<Vec<Weak<dyn Evictable>>>,
}

impl std::fmt::Debug for RamBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RamBudget")
            .field("config", &self.config)
            .field("resident", &self.resident())
            .finish()
    }
}

impl RamBudget {
    /// Creates a budget.
    pub fn new(config: BudgetConfig) -> Self {
        debug!(
            limit = %format_bytes(config.limit_bytes),
            margin = %format_bytes(config.margin_bytes),
            "RAM budget"
        );
        Self {
            config,
            resident: AtomicU64::new(0),
            cooperative_freed: AtomicU64::new(0),
            members: Mutex::new(Vec::new()),
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> BudgetConfig {
        self.config
    }

    /// Bytes accounted as resident.
    #[inline]
    pub fn resident(&self) -> u64 {
        self.resident.load(Ordering::Acquire)
    }

    /// Bytes that can still be reserved.
    #[inline]
    pub fn available(&self) -> u64 {
        self.config.usable().saturating_sub(self.resident())
    }

    /// Adds a member stack. Dropped members are pruned lazily.
    pub fn register(&self, member: Weak<dyn Evictable>) {
        let mut members = lock(&self.members);
        members.retain(|m| m.strong_count() > 0);
        members.push(member);
    }

    /// Removes a member by id.
    pub fn unregister(&self, member_id: u64) {
        lock(&self.members).retain(|m| m.upgrade().is_some_and(|m| m.member_id() != member_id));
    }

    /// Reserves `bytes` if they fit without eviction.
    pub fn try_reserve(&self, bytes: u64) -> bool {
        let usable = self.config.usable();
        self.resident
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                cur.checked_add(bytes).filter(|&total| total <= usable)
            })
            .is_ok()
    }

    /// Accounts bytes unconditionally (data that already exists in RAM).
    pub fn force_reserve(&self, bytes: u64) {
        self.resident.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Returns bytes to the budget.
    pub fn release(&self, bytes: u64) {
        let _ = self
            .resident
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| Some(cur.saturating_sub(bytes)));
    }

    fn live_members(&self) -> Vec<std::sync::Arc<dyn Evictable>> {
        lock(&self.members).iter().filter_map(Weak::upgrade).collect()
    }

    /// Asks stacks other than `requester` to free at least `needed` bytes.
    ///
    /// Members are visited one at a time, each under its own lock only.
    pub fn free_others(&self, needed: u64, requester: u64) -> u64 {
        let mut freed = 0;
        for member in self.live_members() {
            if freed >= needed {
                break;
            }
            if member.member_id() == requester || member.resident_bytes() == 0 {
                continue;
            }
            let got = member.free_at_least(needed - freed);
            trace!(member = member.member_id(), freed = got, "cooperative eviction");
            freed += got;
        }
        if freed > 0 {
            self.cooperative_freed.fetch_add(freed, Ordering::Relaxed);
            debug!(requester, needed, freed, "freed memory in other stacks");
        }
        freed
    }

    /// Whether `bytes` more could be loaded, after asking other stacks to
    /// free memory if needed. Nothing is reserved.
    pub fn can_load(&self, bytes: u64, requester: u64) -> bool {
        if bytes <= self.available() {
            return true;
        }
        let short = bytes - self.available();
        self.free_others(short, requester);
        bytes <= self.available()
    }

    /// Reserves `bytes`, asking other stacks to free memory first if needed.
    ///
    /// The caller must not hold its own stack lock.
    pub fn acquire(&self, bytes: u64, requester: u64) -> bool {
        if self.try_reserve(bytes) {
            return true;
        }
        let short = bytes.saturating_sub(self.available());
        self.free_others(short, requester);
        self.try_reserve(bytes)
    }

    /// Usage snapshot.
    pub fn report(&self) -> BudgetReport {
        BudgetReport {
            limit: self.config.limit_bytes,
            margin: self.config.margin_bytes,
            resident: self.resident(),
            members: self.live_members().len(),
            cooperative_freed: self.cooperative_freed.load(Ordering::Relaxed),
        }
    }
}
