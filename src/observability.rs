// Structured logging for the MLP/CRP core. Every level-barrier crossing and
// every top-level construction/load step logs through here so a production
// customization run can be reconstructed from its logs alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static CELLS_CUSTOMIZED: AtomicU64 = AtomicU64::new(0);
static LEVELS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static ARCHIVE_LOADS: AtomicU64 = AtomicU64::new(0);

/// Initialize the tracing subscriber with the default (non-verbose) filter.
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with_level(false, false)
}

/// Initialize logging with configurable verbosity. `quiet` takes precedence
/// over `RUST_LOG` so callers can force error-only logging regardless of the
/// ambient environment.
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> anyhow::Result<()> {
    let default_filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("mlcrp=debug,info")
    } else {
        EnvFilter::new("mlcrp=info,warn")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(default_filter)
    } else {
        default_filter
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => {
            if !quiet {
                info!("mlcrp observability initialized");
            }
            Ok(())
        }
        // Already initialized (common in tests that construct multiple fixtures).
        Err(_) => Ok(()),
    }
}

/// Structured events emitted during construction and customization.
#[derive(Debug, Clone)]
pub enum Operation {
    PartitionBuilt { node_count: usize, levels: usize },
    GraphBuilt { node_count: usize, edge_count: usize },
    CellStorageBuilt { cell_count: usize },
    LevelCustomized { level: u8, cells: usize, elapsed: Duration },
    ArchiveLoaded { block: String },
    ArchiveSaved { block: String },
}

/// Log a completed operation and bump the relevant counter.
pub fn log_operation(op: &Operation) {
    match op {
        Operation::PartitionBuilt { node_count, levels } => {
            info!(node_count, levels, "partition built");
        }
        Operation::GraphBuilt { node_count, edge_count } => {
            info!(node_count, edge_count, "graph built");
        }
        Operation::CellStorageBuilt { cell_count } => {
            info!(cell_count, "cell storage built");
        }
        Operation::LevelCustomized { level, cells, elapsed } => {
            info!(
                level,
                cells,
                elapsed_ms = elapsed.as_millis(),
                "level customization complete"
            );
            CELLS_CUSTOMIZED.fetch_add(*cells as u64, Ordering::Relaxed);
            LEVELS_COMPLETED.fetch_add(1, Ordering::Relaxed);
        }
        Operation::ArchiveLoaded { block } => {
            debug!(block, "archive block loaded");
            ARCHIVE_LOADS.fetch_add(1, Ordering::Relaxed);
        }
        Operation::ArchiveSaved { block } => {
            debug!(block, "archive block saved");
        }
    }
}

/// Snapshot of the process-wide counters, for diagnostics or test assertions.
pub fn metrics_snapshot() -> serde_json::Value {
    serde_json::json!({
        "cells_customized": CELLS_CUSTOMIZED.load(Ordering::Relaxed),
        "levels_completed": LEVELS_COMPLETED.load(Ordering::Relaxed),
        "archive_loads": ARCHIVE_LOADS.load(Ordering::Relaxed),
    })
}

/// Scoped timer that logs its own elapsed time on drop; used to wrap a
/// single level's customization pass without threading a `start` variable
/// through every return path.
pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[instrument(skip(name))]
    pub fn new(name: &'static str) -> Self {
        debug!(name, "timer started");
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        debug!(name = self.name, elapsed_ms = self.start.elapsed().as_millis(), "timer stopped");
    }
}
