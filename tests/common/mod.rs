//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use runguard_core::{CancelScope, ExecutionGuard};

/// Guard with a millisecond deadline.
pub fn guard_ms(millis: u64) -> ExecutionGuard {
    ExecutionGuard::with_timeout(Duration::from_millis(millis)).expect("positive deadline")
}

/// Cancel `scope` after `delay` on the test runtime.
pub fn cancel_after(scope: &CancelScope, delay: Duration) {
    let scope = scope.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        scope.cancel();
    });
}

/// Counts how many times a work unit actually finished.
#[derive(Clone, Default)]
pub struct Finished(Arc<AtomicUsize>);

impl Finished {
    pub fn mark(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run the `runguard` binary with an isolated config location and logging off.
pub fn runguard(config_dir: &Path, args: &[&str]) -> Output {
    runguard_logged(config_dir, args, "off")
}

/// Like [`runguard`], with `RUST_LOG` set to `filter`.
pub fn runguard_logged(config_dir: &Path, args: &[&str], filter: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_runguard"))
        .args(args)
        .env("RUNGUARD_CONFIG", config_dir.join("config.toml"))
        .env_remove("RUNGUARD_TIMEOUT_MS")
        .env("RUST_LOG", filter)
        .output()
        .expect("runguard binary runs")
}
