use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use launcher_common::time::timestamp_ms;

use crate::error::StateError;
use crate::step::Step;

/// Append-only newline-delimited JSON event stream. Partial trailing
/// lines are tolerated by readers, so plain appends are sufficient.
pub struct Telemetry {
    path: PathBuf,
}

impl Telemetry {
    pub fn open(dir: &Path) -> Result<Self, StateError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join("telemetry.ndjson"),
        })
    }

    pub fn emit(&self, event: &str, mut fields: Value) -> Result<(), StateError> {
        let record = match fields.as_object_mut() {
            Some(map) => {
                map.insert("event".to_string(), json!(event));
                map.insert("ts_ms".to_string(), json!(timestamp_ms()));
                fields
            }
            None => json!({"event": event, "ts_ms": timestamp_ms()}),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(serde_json::to_string(&record)?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    pub fn step_complete(&self, step: Step, fields: Value) -> Result<(), StateError> {
        self.emit(&format!("{}_complete", step.name()), fields)
    }

    pub fn step_error(&self, step: Step, error: &str) -> Result<(), StateError> {
        self.emit(&format!("{}_error", step.name()), json!({"error": error}))
    }
}
