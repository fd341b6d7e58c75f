//! Best-effort daemonization behind `--foreground`, same approach as the
//! vendor daemon's.

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
