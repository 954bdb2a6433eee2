//! Dashboard rendering and the commands built on it.
//!
//! Every command re-reads the event log through the aggregation engine; nothing
//! is cached between refreshes.

use anyhow::{Context, Result};
use shared::aggregation::{AggregateSnapshot, AggregationEngine};
use shared::registry::ServiceMetrics;
use shared::storage::{EventLog, Records};
use std::fmt::Write as _;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// ANSI sequence clearing the terminal and moving the cursor home.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const RULE: &str = "═══════════════════════════════════════════════════════════════";

/// Renders a snapshot as the human-readable dashboard.
#[must_use]
pub fn render_dashboard(snapshot: &AggregateSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "╔{RULE}╗");
    let _ = writeln!(out, "║{:^63}║", "PULSEWATCH MONITOR");
    let _ = writeln!(out, "╚{RULE}╝");
    let _ = writeln!(out);

    if let Some(http) = &snapshot.http {
        let _ = writeln!(out, "HTTP REQUESTS:");
        let _ = writeln!(out, "   • Total: {}", http.total_requests);
        let _ = writeln!(out, "   • Avg response time: {}ms", http.avg_response_time);
        let _ = writeln!(
            out,
            "   • Max: {}ms, Min: {}ms",
            http.max_response_time, http.min_response_time
        );
        let _ = writeln!(
            out,
            "   • Status: 2xx={}, 4xx={}, 5xx={}",
            http.status_codes.success, http.status_codes.client_error, http.status_codes.server_error
        );
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "ERRORS:");
    let _ = writeln!(out, "   • Total errors: {}", snapshot.errors.total_errors);
    if !snapshot.errors.recent_errors.is_empty() {
        let _ = writeln!(out, "   • Recent errors:");
        for error in &snapshot.errors.recent_errors {
            let query = error.tag_str("query").unwrap_or_else(|| "Unknown".to_string());
            let _ = writeln!(out, "     - [{}] {query}", error.service);
        }
    }
    let _ = writeln!(out);

    if let Some(auth) = &snapshot.auth {
        let _ = writeln!(out, "AUTHENTICATION:");
        let _ = writeln!(out, "   • Attempts: {}", auth.total_attempts);
        let _ = writeln!(
            out,
            "   • Successful: {}, Failed: {}",
            auth.successful, auth.failed
        );
        let _ = writeln!(out, "   • Success rate: {}", auth.success_rate);
        let _ = writeln!(out);
    }

    if snapshot.orders.total_orders > 0 {
        let _ = writeln!(out, "ORDERS:");
        let _ = writeln!(out, "   • Total orders: {}", snapshot.orders.total_orders);
        if let Some(avg) = &snapshot.orders.avg_order_value {
            let _ = writeln!(out, "   • Avg order value (estimated): {avg}");
        }
        let _ = writeln!(out);
    }

    if let Some(db) = &snapshot.database {
        let _ = writeln!(out, "DATABASE:");
        let _ = writeln!(out, "   • Total queries: {}", db.total_queries);
        let _ = writeln!(out, "   • Avg query time: {}ms", db.avg_query_time);
        let _ = writeln!(
            out,
            "   • Slow queries: {} ({})",
            db.slow_queries, db.slow_queries_percent
        );
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Refreshed at: {}", snapshot.timestamp.to_rfc3339());
    let _ = writeln!(out, "Uptime: {}", snapshot.system_uptime);
    let _ = writeln!(out, "╚{RULE}╝");
    out
}

/// Writes the current snapshot as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_stats(engine: &AggregationEngine, out: &mut impl Write) -> Result<()> {
    let snapshot = engine.compute_snapshot();
    serde_json::to_writer_pretty(&mut *out, &snapshot).context("Failed to serialize snapshot")?;
    writeln!(out)?;
    Ok(())
}

/// Writes the `count` newest records, newest first.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_logs(engine: &AggregationEngine, count: usize, out: &mut impl Write) -> Result<()> {
    let records = engine.recent_records(count);

    writeln!(out, "Last {count} records:")?;
    writeln!(out)?;
    for (idx, record) in records.iter().enumerate() {
        writeln!(
            out,
            "{}. [{}] [{}] {} = {}",
            idx + 1,
            record.timestamp.to_rfc3339(),
            record.service,
            record.metric,
            record.value
        )?;
        if !record.tags.is_empty() {
            writeln!(out, "   Tags: {}", serde_json::to_string(&record.tags)?)?;
        }
    }
    Ok(())
}

/// Exports the current snapshot as pretty JSON to `path`.
///
/// The document is written to a sibling temporary file first and renamed into
/// place, so `path` is either left untouched or holds the complete export.
///
/// # Errors
///
/// Returns an error if serialization, writing or renaming fails.
pub fn export_snapshot(engine: &AggregationEngine, path: &Path) -> Result<PathBuf> {
    let snapshot = engine.compute_snapshot();
    let body = serde_json::to_vec_pretty(&snapshot).context("Failed to serialize snapshot")?;

    let file_name = path
        .file_name()
        .with_context(|| format!("Export path {} has no file name", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, &body)
        .with_context(|| format!("Failed to write export to {}", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to move export into {}", path.display()));
    }

    tracing::info!(path = %path.display(), bytes = body.len(), "Snapshot exported");
    Ok(path.to_path_buf())
}

/// Replays the event log into the standard service metrics and writes the
/// exposition text.
///
/// A missing log yields the metric headers without series.
///
/// # Errors
///
/// Returns an error if a record cannot be applied or writing fails.
pub fn write_exposition(log: &dyn EventLog, service: &str, out: &mut impl Write) -> Result<()> {
    let metrics = ServiceMetrics::new(service)?;

    let records = log.read_all().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Event log unavailable, exporting empty metrics");
        Records::empty()
    });

    let mut applied = 0usize;
    for record in records {
        if metrics
            .ingest(&record)
            .with_context(|| format!("Failed to apply '{}' record", record.metric))?
        {
            applied += 1;
        }
    }
    tracing::debug!(applied, service, "Event log replayed into service metrics");

    out.write_all(metrics.export()?.as_bytes())?;
    Ok(())
}

/// Redraws the dashboard every `period` until `shutdown` resolves.
///
/// A refresh always completes before the next one starts; `shutdown` is only
/// observed between refreshes.
///
/// # Errors
///
/// Returns an error if the snapshot task panics or writing fails.
pub async fn run_loop(
    engine: Arc<AggregationEngine>,
    period: Duration,
    out: &mut impl Write,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tracing::info!(interval_secs = period.as_secs_f64(), "Live monitoring started");

    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = tick.tick() => {
                let engine = Arc::clone(&engine);
                let snapshot = tokio::task::spawn_blocking(move || engine.compute_snapshot())
                    .await
                    .context("Snapshot task failed")?;
                write!(out, "{CLEAR_SCREEN}{}", render_dashboard(&snapshot))?;
                out.flush()?;
            }
        }
    }

    tracing::info!("Live monitoring stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping");
        }
    }
}
