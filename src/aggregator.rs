use crate::data::{Metric, Sample, TIMESTAMP_FORMAT};
use crate::monitor::{GpuSampler, MonitorError};
use chrono::NaiveDateTime;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.?\d*").unwrap());

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("report has no header line")]
    Empty,
    #[error("report header is missing column `{0}`")]
    MissingColumn(&'static str),
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: unrecognised timestamp `{value}`")]
    Timestamp { line: usize, value: String },
}

/// Returns the first numeric token in `field` (`"45.3 %"` gives 45.3).
/// Fields such as `"N/A"` or `"[Not Supported]"` give `None`.
pub fn extract_number(field: &str) -> Option<f64> {
    LEADING_NUMBER
        .find(field)
        .and_then(|m| m.as_str().parse().ok())
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    [TIMESTAMP_FORMAT, "%Y/%m/%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

// Header positions of the columns a sample is built from.
struct Columns {
    width: usize,
    timestamp: usize,
    name: usize,
    memory_used: usize,
    metrics: Vec<(Metric, usize)>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, ParseError> {
        let keys: Vec<&str> = header.split(',').map(column_key).collect();
        let find = |key: &'static str| {
            keys.iter()
                .position(|k| *k == key)
                .ok_or(ParseError::MissingColumn(key))
        };

        let mut metrics = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            metrics.push((metric, find(metric.column_key())?));
        }

        Ok(Self {
            width: keys.len(),
            timestamp: find("timestamp")?,
            name: find("name")?,
            memory_used: find("memory.used")?,
            metrics,
        })
    }
}

// "utilization.gpu [%]" -> "utilization.gpu"
fn column_key(header: &str) -> &str {
    let header = header.trim();
    header
        .split_once(" [")
        .map_or(header, |(key, _)| key)
        .trim()
}

/// Parses a comma-separated `nvidia-smi` report (header plus data rows).
///
/// Every data row is returned with `time_elapsed` left at zero; the table
/// fills it in on append.
pub fn parse_report(text: &str) -> Result<Vec<Sample>, ParseError> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let (_, header) = lines.next().ok_or(ParseError::Empty)?;
    let columns = Columns::from_header(header)?;

    let mut samples = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != columns.width {
            return Err(ParseError::FieldCount {
                line: line_no,
                expected: columns.width,
                found: fields.len(),
            });
        }

        let raw_ts = fields[columns.timestamp];
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| ParseError::Timestamp {
            line: line_no,
            value: raw_ts.to_string(),
        })?;

        let mut sample = Sample {
            timestamp,
            time_elapsed: 0.0,
            name: fields[columns.name].to_string(),
            memory_used: fields[columns.memory_used].to_string(),
            utilization_gpu: None,
            utilization_memory: None,
            temperature_gpu: None,
            power_draw: None,
            clock_graphics: None,
            clock_sm: None,
            clock_memory: None,
            clock_video: None,
        };
        for &(metric, pos) in &columns.metrics {
            *metric.slot(&mut sample) = extract_number(fields[pos]);
        }
        samples.push(sample);
    }
    Ok(samples)
}

pub fn read_report(path: &Path) -> Result<Vec<Sample>, MonitorError> {
    let text = std::fs::read_to_string(path).map_err(|source| MonitorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_report(&text).map_err(|source| MonitorError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs one sampler invocation and reads back the rows it produced.
pub fn poll_once(sampler: &dyn GpuSampler, path: &Path) -> Result<Vec<Sample>, MonitorError> {
    sampler.sample(path)?;
    read_report(path)
}
