use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Diagnostics for one completed design cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Cycle index, counted from zero.
    pub cycle: usize,
    /// Setting that was measured.
    pub setting: Vec<f64>,
    /// Measured values.
    pub measured: Vec<f64>,
    /// Log evidence of the measurement.
    pub log_evidence: f64,
    /// Effective sample size before the update.
    pub ess_before: f64,
    /// Effective sample size after the update, before any resampling.
    pub ess_after: f64,
    /// Whether the cloud was resampled and diversified this cycle.
    pub resampled: bool,
    /// Posterior mean after the cycle.
    pub mean: Vec<f64>,
    /// Posterior standard deviation after the cycle.
    pub std: Vec<f64>,
}

/// Collects per-cycle records for CSV export.
#[derive(Debug, Default)]
pub struct CycleRecorder {
    records: Vec<CycleRecord>,
}

impl CycleRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&mut self, record: CycleRecord) {
        self.records.push(record);
    }

    /// Recorded cycles in order.
    pub fn records(&self) -> &[CycleRecord] {
        &self.records
    }

    /// Number of cycles that triggered a resample.
    pub fn resample_count(&self) -> usize {
        self.records.iter().filter(|r| r.resampled).count()
    }

    /// Writes the records to a CSV file; vector fields are `;` separated.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(
            file,
            "cycle,setting,measured,log_evidence,ess_before,ess_after,resampled,mean,std"
        )?;
        for record in &self.records {
            writeln!(
                file,
                "{},{},{},{:.6},{:.3},{:.3},{},{},{}",
                record.cycle,
                join(&record.setting),
                join(&record.measured),
                record.log_evidence,
                record.ess_before,
                record.ess_after,
                record.resampled,
                join(&record.mean),
                join(&record.std)
            )?;
        }
        Ok(())
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(";")
}
