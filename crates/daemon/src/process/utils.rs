use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Time in-flight transfers get to finish after SIGTERM
const SIGTERM_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
enum Stop {
    Interrupt,
    Terminate,
    Requested,
}

async fn next_stop(requested: &mut watch::Receiver<()>) -> std::io::Result<Stop> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::select! {
        _ = sigint.recv() => Stop::Interrupt,
        _ = sigterm.recv() => Stop::Terminate,
        _ = requested.changed() => Stop::Requested,
    })
}

/// Spawns a task that turns SIGINT, SIGTERM or a programmatic request into
/// one broadcast on a watch channel.
///
/// SIGINT stops at once; SIGTERM waits out a grace period first, cut short by
/// a following SIGINT. Returns the waiter's join handle, the sender (for
/// programmatic shutdown) and a receiver to clone into every task.
pub fn graceful_shutdown_blocker() -> (JoinHandle<()>, watch::Sender<()>, watch::Receiver<()>) {
    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();
    let mut requested = rx.clone();

    let handle = tokio::spawn(async move {
        match next_stop(&mut requested).await {
            Ok(Stop::Interrupt) => tracing::info!("SIGINT received, shutting down"),
            Ok(Stop::Requested) => tracing::info!("shutdown requested"),
            Ok(Stop::Terminate) => {
                tracing::info!(
                    grace_secs = SIGTERM_GRACE_PERIOD.as_secs(),
                    "SIGTERM received, shutting down after grace period"
                );
                tokio::select! {
                    _ = tokio::time::sleep(SIGTERM_GRACE_PERIOD) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for signals, only programmatic shutdown works");
                let _ = requested.changed().await;
            }
        }

        let _ = signal_tx.send(());
    });

    (handle, tx, rx)
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| {
        let location = panic.location();
        tracing::error!(
            message = %panic,
            panic.file = location.map(|l| l.file()),
            panic.line = location.map(|l| l.line()),
            "panic"
        );
    }));
}

pub fn report_build_info() {
    let build = common::prelude::build_info();

    tracing::info!(
        version = build.version,
        repo_version = build.repo_version,
        build_profile = build.build_profile,
        built_at = build.build_timestamp,
        "relay starting up"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_programmatic_shutdown_releases_waiter() {
        let (waiter, tx, mut rx) = graceful_shutdown_blocker();

        tx.send(()).unwrap();
        rx.changed().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter did not finish")
            .unwrap();
    }
}
