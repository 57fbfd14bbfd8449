//! # Runtime Configuration
//!
//! Coroutine runtime tuning read from the environment.
//!
//! ## `LOOKUP_STACK_SIZE`
//!
//! Stack size for handler and connection coroutines, decimal (`65536`) or hex
//! (`0x10000`). Default `0x10000` (64 KB). The blocking HTTP client and JSON
//! decoding run on these stacks, so going much lower risks overflows.
//!
//! ## `LOOKUP_IO_WORKERS`
//!
//! Number of `may` scheduler threads. Unset keeps `may`'s default (one per
//! CPU).

use std::env;

use crate::worker_pool::DEFAULT_WORKER_STACK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub stack_size: usize,
    pub io_workers: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_WORKER_STACK_SIZE,
            io_workers: None,
        }
    }
}

fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let stack_size = lookup("LOOKUP_STACK_SIZE")
            .and_then(|v| parse_size(&v))
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_WORKER_STACK_SIZE);
        let io_workers = lookup("LOOKUP_IO_WORKERS")
            .and_then(|v| v.trim().parse().ok())
            .filter(|n: &usize| *n > 0);
        Self {
            stack_size,
            io_workers,
        }
    }

    /// Push the settings into `may`'s global config. Call before any
    /// coroutine is spawned.
    pub fn apply(&self) {
        let config = may::config();
        config.set_stack_size(self.stack_size);
        if let Some(workers) = self.io_workers {
            config.set_workers(workers);
        }
    }
}
