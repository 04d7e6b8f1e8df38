//! Collector event log
//!
//! Each cycle emits a fixed sequence of [`GcEvent`]s. The logger keeps the
//! most recent ones in memory for tests and tools, and echoes them to the
//! console when the collector runs verbose. Anything that is not a cycle
//! event goes through the `log` facade instead.
//!
//! Severity by event:
//! - ERROR: verifier failures
//! - INFO: cycle start and end
//! - DEBUG: phase boundaries, weak slot counts
//! - TRACE: relocation counts

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::gc::GcState;

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Things a collection cycle reports
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GcEvent {
    CycleStart {
        cycle: u64,
        reason: String,
    },
    PhaseStart {
        cycle: u64,
        phase: GcState,
    },
    PhaseEnd {
        cycle: u64,
        phase: GcState,
        duration_ms: f64,
    },
    CycleEnd {
        cycle: u64,
        duration_ms: f64,
        reclaimed_bytes: usize,
    },
    /// Weak slots found in live objects, and how many were cleared
    ReferenceStats {
        cycle: u64,
        weak_seen: usize,
        weak_cleared: u64,
    },
    RelocateStats {
        cycle: u64,
        relocated_count: usize,
        bytes_moved: usize,
        updated_slots: usize,
    },
    VerifyFailure {
        cycle: u64,
        message: String,
    },
}

impl GcEvent {
    pub fn level(&self) -> LogLevel {
        match self {
            GcEvent::VerifyFailure { .. } => LogLevel::Error,
            GcEvent::CycleStart { .. } | GcEvent::CycleEnd { .. } => LogLevel::Info,
            GcEvent::PhaseStart { .. } | GcEvent::PhaseEnd { .. } | GcEvent::ReferenceStats { .. } => {
                LogLevel::Debug
            }
            GcEvent::RelocateStats { .. } => LogLevel::Trace,
        }
    }

    pub fn cycle(&self) -> u64 {
        match self {
            GcEvent::CycleStart { cycle, .. }
            | GcEvent::PhaseStart { cycle, .. }
            | GcEvent::PhaseEnd { cycle, .. }
            | GcEvent::CycleEnd { cycle, .. }
            | GcEvent::ReferenceStats { cycle, .. }
            | GcEvent::RelocateStats { cycle, .. }
            | GcEvent::VerifyFailure { cycle, .. } => *cycle,
        }
    }

    /// One-line JSON rendering, tagged by `type`
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "type": "unserializable", "error": e.to_string() }).to_string()
        })
    }
}

impl fmt::Display for GcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[GC #{}] ", self.cycle())?;
        match self {
            GcEvent::CycleStart { reason, .. } => write!(f, "start ({})", reason),
            GcEvent::PhaseStart { phase, .. } => write!(f, "{} ...", phase.name()),
            GcEvent::PhaseEnd {
                phase, duration_ms, ..
            } => write!(f, "{} done in {:.2}ms", phase.name(), duration_ms),
            GcEvent::CycleEnd {
                duration_ms,
                reclaimed_bytes,
                ..
            } => write!(f, "end, {} bytes reclaimed in {:.2}ms", reclaimed_bytes, duration_ms),
            GcEvent::ReferenceStats {
                weak_seen,
                weak_cleared,
                ..
            } => write!(f, "{} weak slots seen, {} cleared", weak_seen, weak_cleared),
            GcEvent::RelocateStats {
                relocated_count,
                bytes_moved,
                updated_slots,
                ..
            } => write!(
                f,
                "moved {} objects ({} bytes), rewrote {} slots",
                relocated_count, bytes_moved, updated_slots
            ),
            GcEvent::VerifyFailure { message, .. } => write!(f, "verification failed: {}", message),
        }
    }
}

/// Console rendering of echoed events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Events above this level are dropped
    pub level: LogLevel,
    /// Echo kept events to stdout (stderr for errors)
    pub console: bool,
    pub format: LogFormat,
    /// Prefix echoed lines with local wall-clock time
    pub timestamps: bool,
    /// Oldest events are discarded past this many
    pub capacity: usize,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            format: LogFormat::Human,
            timestamps: true,
            capacity: 4096,
        }
    }
}

/// In-memory event log with optional console echo
pub struct GcLogger {
    config: GcLoggerConfig,
    events: Mutex<VecDeque<(Instant, GcEvent)>>,
    enabled: AtomicBool,
}

impl GcLogger {
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(config.capacity.min(256))),
            config,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &GcLoggerConfig {
        &self.config
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn log(&self, event: GcEvent) {
        if !self.is_enabled() || event.level() > self.config.level {
            return;
        }
        if self.config.console {
            self.echo(&event);
        }

        let mut events = self.events.lock();
        if events.len() == self.config.capacity {
            events.pop_front();
        }
        if self.config.capacity > 0 {
            events.push_back((Instant::now(), event));
        }
    }

    fn echo(&self, event: &GcEvent) {
        let body = match self.config.format {
            LogFormat::Human => event.to_string(),
            LogFormat::Json => event.to_json(),
        };
        let line = if self.config.timestamps {
            format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), body)
        } else {
            body
        };

        if event.level() == LogLevel::Error {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    /// Kept events, oldest first
    pub fn events(&self) -> Vec<GcEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Kept events with the instant they were logged
    pub fn timed_events(&self) -> Vec<(Instant, GcEvent)> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(GcLoggerConfig::default())
    }
}

lazy_static::lazy_static! {
    /// Process-wide log shared by every collector that has no logger of its own
    static ref GLOBAL_LOGGER: Mutex<GcLogger> = Mutex::new(GcLogger::default());
}

pub fn log_event(event: GcEvent) {
    GLOBAL_LOGGER.lock().log(event);
}

/// Replace the process-wide logger, dropping its kept events
pub fn configure_logger(config: GcLoggerConfig) {
    *GLOBAL_LOGGER.lock() = GcLogger::new(config);
}

pub fn global_event_count() -> usize {
    GLOBAL_LOGGER.lock().len()
}
