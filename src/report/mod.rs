//! Run reports
//!
//! Renders the resolved kernel list as JSON, YAML, CSV or a plain
//! text table. Output ordering is deterministic: kernels are sorted
//! by distribution ascending, then distro-version and kernel name
//! descending, so repeated runs over the same listings diff clean.

use crate::errors::{KresError, Result};
use crate::resolver::{Kernel, Status};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Csv,
    Json,
    Yaml,
}

impl FromStr for ReportFormat {
    type Err = KresError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "table" => Ok(ReportFormat::Table),
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            "yaml" => Ok(ReportFormat::Yaml),
            other => Err(KresError::Configuration(format!(
                "unknown report format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "unknown"),
            Status::Fail => write!(f, "fail"),
            Status::Success => write!(f, "success"),
        }
    }
}

/// Everything one run resolved, plus its wall-clock bounds.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kernels: Vec<Kernel>,
}

impl ResolutionReport {
    /// Sorts the kernel list into report order on construction.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, mut kernels: Vec<Kernel>) -> Self {
        kernels.sort_by(|a, b| {
            a.distro
                .to_string()
                .cmp(&b.distro.to_string())
                .then(b.distro_version.cmp(&a.distro_version))
                .then(b.full_name().cmp(&a.full_name()))
        });
        Self { start, end, kernels }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => self.json_report(),
            ReportFormat::Yaml => self.yaml_report(),
            ReportFormat::Csv => Ok(self.csv_report()),
            ReportFormat::Table => Ok(self.table_report()),
        }
    }

    fn json_report(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn yaml_report(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn csv_report(&self) -> String {
        let mut out = String::new();
        for kernel in &self.kernels {
            out.push_str(&format!("{},{}\n", kernel.full_name(), kernel.compiled));
        }
        out
    }

    fn table_report(&self) -> String {
        let header = ["Distribution", "DistroVersion", "Kernel", "Success"];
        let mut rows: Vec<[String; 4]> = Vec::new();
        for kernel in &self.kernels {
            if kernel.minikube_versions.is_empty() {
                rows.push([
                    kernel.distro.to_string(),
                    kernel.distro_version.clone(),
                    kernel.full_name(),
                    kernel.compiled.to_string(),
                ]);
            } else {
                // One row per tag that resolved to this kernel.
                for tag in &kernel.minikube_versions {
                    rows.push([
                        kernel.distro.to_string(),
                        tag.clone(),
                        kernel.full_name(),
                        kernel.compiled.to_string(),
                    ]);
                }
            }
        }
        rows.sort_by(|a, b| a[0].cmp(&b[0]).then(b[1].cmp(&a[1])).then(b[2].cmp(&a[2])));

        let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let render_row = |cells: &[String; 4]| -> String {
            let mut line = String::from("|");
            for (i, cell) in cells.iter().enumerate() {
                line.push_str(&format!(" {:<width$} |", cell, width = widths[i]));
            }
            line.push('\n');
            line
        };
        let separator = {
            let mut line = String::from("+");
            for width in &widths {
                line.push_str(&"-".repeat(width + 2));
                line.push('+');
            }
            line.push('\n');
            line
        };

        let mut out = String::new();
        out.push_str(&separator);
        out.push_str(&render_row(&[
            header[0].to_string(),
            header[1].to_string(),
            header[2].to_string(),
            header[3].to_string(),
        ]));
        out.push_str(&separator);
        for row in &rows {
            out.push_str(&render_row(row));
        }
        out.push_str(&separator);
        let elapsed = self.end.signed_duration_since(self.start);
        out.push_str(&format!(
            "Time: {}.{:03}s  Kernels: {}\n",
            elapsed.num_seconds(),
            elapsed.num_milliseconds().rem_euclid(1000),
            self.kernels.len()
        ));
        out
    }
}
