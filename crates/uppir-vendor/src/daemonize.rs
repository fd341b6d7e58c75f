//! Best-effort daemonization behind `--foreground`.
//!
//! The original vendor detaches via a fork-based `daemon.daemonize()` once
//! startup has validated its inputs (`uppir_vendor.py`'s comment: detach
//! late enough that errors still reach the terminal, but before any worker
//! threads exist). Rust's ambient dependency set has no portable in-process
//! fork primitive, so this pulls in the `daemonize` crate (Unix-only,
//! `fork()`-based, same approach as the original) and falls back to staying
//! in the foreground on unsupported platforms.

use anyhow::Result;

#[cfg(unix)]
pub fn daemonize() -> Result<()> {
    daemonize::Daemonize::new()
        .start()
        .map_err(|err| anyhow::anyhow!("failed to daemonize: {err}"))
}

#[cfg(not(unix))]
pub fn daemonize() -> Result<()> {
    tracing::warn!("daemonization is Unix-only; continuing in the foreground");
    Ok(())
}
