//! Memory detection and budget configuration.
//!
//! # Environment Variables
//!
//! - `BLINK_MEM_MB` - Explicit memory limit in megabytes
//! - `BLINK_RAM_MAX` - Maximum RAM usage in bytes
//! - `BLINK_RAM_PCT` - Maximum RAM as percentage of system RAM (clamped 10-95)
//! - `BLINK_RAM_MARGIN_MB` - Safety margin kept free, in megabytes

use std::env;
use std::sync::OnceLock;

/// Default share of system RAM available to pixel data.
pub const DEFAULT_RAM_PCT: u64 = 80;

/// Default safety margin (64 MB).
pub const DEFAULT_MARGIN: u64 = 64 * 1024 * 1024;

const MB: u64 = 1024 * 1024;

/// Cache for system memory detection.
static SYSTEM_MEMORY: OnceLock<u64> = OnceLock::new();

/// Detect total system RAM in bytes.
pub fn system_memory() -> u64 {
    *SYSTEM_MEMORY.get_or_init(|| {
        sys_info::mem_info()
            .map(|m| m.total * 1024) // KB to bytes
            .unwrap_or(8 * 1024 * 1024 * 1024) // 8 GB fallback
    })
}

/// Limits applied by a [`RamBudget`](crate::RamBudget).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetConfig {
    /// Upper bound on resident original pixel bytes.
    pub limit_bytes: u64,
    /// Bytes kept free below the limit.
    pub margin_bytes: u64,
}

impl BudgetConfig {
    /// Explicit limit with no margin. Mostly for tests.
    pub fn with_limit(limit_bytes: u64) -> Self {
        Self {
            limit_bytes,
            margin_bytes: 0,
        }
    }

    /// Sets the safety margin.
    pub fn margin(mut self, margin_bytes: u64) -> Self {
        self.margin_bytes = margin_bytes;
        self
    }

    /// Resolves the configuration from the process environment.
    ///
    /// Priority:
    /// 1. `BLINK_MEM_MB` - explicit MB limit
    /// 2. `BLINK_RAM_MAX` - explicit bytes limit
    /// 3. `BLINK_RAM_PCT` - percentage of system RAM
    /// 4. Default: 80% of system RAM
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok(), system_memory())
    }

    /// Resolves the configuration from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>, system: u64) -> Self {
        let num = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

        let limit_bytes = if let Some(mb) = num("BLINK_MEM_MB") {
            mb.saturating_mul(MB)
        } else if let Some(bytes) = num("BLINK_RAM_MAX") {
            bytes
        } else {
            let pct = num("BLINK_RAM_PCT").unwrap_or(DEFAULT_RAM_PCT).clamp(10, 95);
            system / 100 * pct
        };

        let margin_bytes = num("BLINK_RAM_MARGIN_MB").map_or(DEFAULT_MARGIN, |mb| mb.saturating_mul(MB));

        Self {
            limit_bytes,
            margin_bytes,
        }
    }

    /// Bytes usable for resident pixels.
    #[inline]
    pub fn usable(&self) -> u64 {
        self.limit_bytes.saturating_sub(self.margin_bytes)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
