//! Harvest progress reporting.
//!
//! Reports observable progress during `aids stories` / `aids scenarios` so
//! users can see which search page is being walked and how many items have
//! been accepted so far. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts.

use std::io::Write;

use crate::models::ContentKind;

/// A single progress event for a harvest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarvestProgressEvent {
    /// A search page is being requested at `offset`.
    Paging { kind: ContentKind, offset: usize },
    /// A top-level result has been processed.
    Harvested {
        kind: ContentKind,
        top_level: u64,
        accepted: u64,
    },
}

/// Reports harvest progress. Implementations write to stderr (human or JSON).
pub trait HarvestProgress: Send + Sync {
    /// Emit a progress event. Called from the harvester.
    fn report(&self, event: HarvestProgressEvent);
}

/// Human-friendly progress on stderr: "harvest scenarios  1,234 seen  1,001 kept".
pub struct StderrProgress;

impl HarvestProgress for StderrProgress {
    fn report(&self, event: HarvestProgressEvent) {
        let line = match &event {
            HarvestProgressEvent::Paging { kind, offset } => {
                format!(
                    "harvest {}  page at offset {}\n",
                    kind.plural(),
                    format_number(*offset as u64)
                )
            }
            HarvestProgressEvent::Harvested {
                kind,
                top_level,
                accepted,
            } => format!(
                "harvest {}  {} seen  {} kept\n",
                kind.plural(),
                format_number(*top_level),
                format_number(*accepted)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl HarvestProgress for JsonProgress {
    fn report(&self, event: HarvestProgressEvent) {
        let obj = match &event {
            HarvestProgressEvent::Paging { kind, offset } => serde_json::json!({
                "event": "progress",
                "kind": kind,
                "phase": "paging",
                "offset": offset
            }),
            HarvestProgressEvent::Harvested {
                kind,
                top_level,
                accepted,
            } => serde_json::json!({
                "event": "progress",
                "kind": kind,
                "phase": "harvested",
                "top_level": top_level,
                "accepted": accepted
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl HarvestProgress for NoProgress {
    fn report(&self, _event: HarvestProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn HarvestProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
