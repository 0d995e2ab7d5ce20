//! GC Event Logging
//!
//! Records collector events around the liveness oracle:
//! - Collection cycles and their generation
//! - CAF marking and reverting
//! - Weak pointer sweeps
//! - Liveness query summaries
//!
//! Every event is also forwarded to the `log` facade, so an application
//! logger sees it whether or not console output is on.
//!
//! Log Levels:
//! - INFO: collection cycles, CAF reverts
//! - DEBUG: CAF marking, weak sweeps
//! - TRACE: CAF registration, query summaries

use crate::stats::LivenessSummary;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Log level for GC events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// GC event types
#[derive(Debug, Clone, PartialEq)]
pub enum GcEvent {
    /// Collection started
    CycleStart { generation: String, cycle: u64 },

    /// Collection finished
    CycleEnd {
        cycle: u64,
        duration_ms: f64,
        cafs_reverted: usize,
    },

    /// A CAF was entered for the first time and registered
    CafRegistered { address: usize, revertible: bool },

    /// CAF lists handed to the evacuator
    CafsMarked {
        retained: usize,
        revertible: usize,
        cycle: u64,
    },

    /// Revertible CAFs restored to their unevaluated state
    CafsReverted { count: usize, cycle: u64 },

    /// Weak pointer list swept
    WeakSweep {
        live: usize,
        dead: usize,
        finalizers: usize,
        cycle: u64,
    },

    /// Liveness queries answered during a cycle
    LivenessSummary {
        cycle: u64,
        summary: LivenessSummary,
    },
}

/// GC Logger configuration
#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            json: false,
            timestamps: true,
        }
    }
}

/// GC Logger - centralized logging for collector events
pub struct GcLogger {
    config: GcLoggerConfig,
    events: Mutex<Vec<(Instant, GcEvent)>>,
    enabled: AtomicBool,
}

impl GcLogger {
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &GcLoggerConfig {
        &self.config
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log a GC event
    pub fn log(&self, event: GcEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = event_level(&event);
        if level > self.config.level {
            return;
        }

        log::log!(log::Level::from(level), "{}", render_human(&event));

        if self.config.console {
            self.output_console(&event);
        }

        self.events.lock().push((Instant::now(), event));
    }

    fn output_console(&self, event: &GcEvent) {
        let line = if self.config.json {
            render_json(event)
        } else {
            render_human(event)
        };

        if self.config.timestamps {
            let now = chrono::Local::now();
            println!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S%.3f"), line);
        } else {
            println!("{}", line);
        }
    }

    pub fn get_events(&self) -> Vec<(Instant, GcEvent)> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(GcLoggerConfig::default())
    }
}

fn event_level(event: &GcEvent) -> LogLevel {
    match event {
        GcEvent::CycleStart { .. } | GcEvent::CycleEnd { .. } | GcEvent::CafsReverted { .. } => {
            LogLevel::Info
        },
        GcEvent::CafsMarked { .. } | GcEvent::WeakSweep { .. } => LogLevel::Debug,
        GcEvent::CafRegistered { .. } | GcEvent::LivenessSummary { .. } => LogLevel::Trace,
    }
}

/// Human-readable rendering
pub fn render_human(event: &GcEvent) -> String {
    match event {
        GcEvent::CycleStart { generation, cycle } => {
            format!("[GC] Cycle {} started ({} generation)", cycle, generation)
        },
        GcEvent::CycleEnd {
            cycle,
            duration_ms,
            cafs_reverted,
        } => format!(
            "[GC] Cycle {} completed ({:.2}ms, {} CAFs reverted)",
            cycle, duration_ms, cafs_reverted
        ),
        GcEvent::CafRegistered {
            address,
            revertible,
        } => format!(
            "[GC] CAF registered at {:#x}{}",
            address,
            if *revertible { " (revertible)" } else { "" }
        ),
        GcEvent::CafsMarked {
            retained,
            revertible,
            cycle,
        } => format!(
            "[GC] Cycle {}: marked {} retained and {} revertible CAFs",
            cycle, retained, revertible
        ),
        GcEvent::CafsReverted { count, cycle } => {
            format!("[GC] Cycle {}: reverted {} CAFs", cycle, count)
        },
        GcEvent::WeakSweep {
            live,
            dead,
            finalizers,
            cycle,
        } => format!(
            "[GC] Cycle {}: weak sweep kept {}, dropped {} ({} finalizers due)",
            cycle, live, dead, finalizers
        ),
        GcEvent::LivenessSummary { cycle, summary } => format!(
            "[GC] Cycle {}: {} liveness queries, {} alive, longest chase {}",
            cycle, summary.queries, summary.alive, summary.longest_chase
        ),
    }
}

/// JSON rendering, one object per event
pub fn render_json(event: &GcEvent) -> String {
    let json = match event {
        GcEvent::CycleStart { generation, cycle } => serde_json::json!({
            "type": "cycle_start",
            "cycle": cycle,
            "generation": generation
        }),
        GcEvent::CycleEnd {
            cycle,
            duration_ms,
            cafs_reverted,
        } => serde_json::json!({
            "type": "cycle_end",
            "cycle": cycle,
            "duration_ms": duration_ms,
            "cafs_reverted": cafs_reverted
        }),
        GcEvent::CafRegistered {
            address,
            revertible,
        } => serde_json::json!({
            "type": "caf_registered",
            "address": address,
            "revertible": revertible
        }),
        GcEvent::CafsMarked {
            retained,
            revertible,
            cycle,
        } => serde_json::json!({
            "type": "cafs_marked",
            "cycle": cycle,
            "retained": retained,
            "revertible": revertible
        }),
        GcEvent::CafsReverted { count, cycle } => serde_json::json!({
            "type": "cafs_reverted",
            "cycle": cycle,
            "count": count
        }),
        GcEvent::WeakSweep {
            live,
            dead,
            finalizers,
            cycle,
        } => serde_json::json!({
            "type": "weak_sweep",
            "cycle": cycle,
            "live": live,
            "dead": dead,
            "finalizers": finalizers
        }),
        GcEvent::LivenessSummary { cycle, summary } => serde_json::json!({
            "type": "liveness_summary",
            "cycle": cycle,
            "summary": summary
        }),
    };

    json.to_string()
}
