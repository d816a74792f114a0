use chrono::NaiveDateTime;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Timestamp layout used by `nvidia-smi` CSV reports.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

/// Column headers in the order `nvidia-smi` reports them.
pub const REPORT_COLUMNS: [&str; 11] = [
    "timestamp",
    "name",
    "memory.used [MiB]",
    "utilization.gpu [%]",
    "utilization.memory [%]",
    "temperature.gpu",
    "power.draw [W]",
    "clocks.current.graphics [MHz]",
    "clocks.current.sm [MHz]",
    "clocks.current.memory [MHz]",
    "clocks.current.video [MHz]",
];

pub const ELAPSED_COLUMN: &str = "time_elapsed";

// One GPU reading. Numeric fields are `None` when the report held no number.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub time_elapsed: f64,
    pub name: String,
    pub memory_used: String,
    pub utilization_gpu: Option<f64>,
    pub utilization_memory: Option<f64>,
    pub temperature_gpu: Option<f64>,
    pub power_draw: Option<f64>,
    pub clock_graphics: Option<f64>,
    pub clock_sm: Option<f64>,
    pub clock_memory: Option<f64>,
    pub clock_video: Option<f64>,
}

/// Numeric metrics carried by a [`Sample`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    UtilizationGpu,
    UtilizationMemory,
    TemperatureGpu,
    PowerDraw,
    ClockGraphics,
    ClockSm,
    ClockMemory,
    ClockVideo,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::UtilizationGpu,
        Metric::UtilizationMemory,
        Metric::TemperatureGpu,
        Metric::PowerDraw,
        Metric::ClockGraphics,
        Metric::ClockSm,
        Metric::ClockMemory,
        Metric::ClockVideo,
    ];

    /// Header key without the bracketed unit.
    pub fn column_key(self) -> &'static str {
        match self {
            Metric::UtilizationGpu => "utilization.gpu",
            Metric::UtilizationMemory => "utilization.memory",
            Metric::TemperatureGpu => "temperature.gpu",
            Metric::PowerDraw => "power.draw",
            Metric::ClockGraphics => "clocks.current.graphics",
            Metric::ClockSm => "clocks.current.sm",
            Metric::ClockMemory => "clocks.current.memory",
            Metric::ClockVideo => "clocks.current.video",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::UtilizationGpu => "GPU utilization [%]",
            Metric::UtilizationMemory => "Memory utilization [%]",
            Metric::TemperatureGpu => "GPU temperature",
            Metric::PowerDraw => "Power draw [W]",
            Metric::ClockGraphics => "Graphics clock [MHz]",
            Metric::ClockSm => "SM clock [MHz]",
            Metric::ClockMemory => "Memory clock [MHz]",
            Metric::ClockVideo => "Video clock [MHz]",
        }
    }

    pub fn value(self, sample: &Sample) -> Option<f64> {
        match self {
            Metric::UtilizationGpu => sample.utilization_gpu,
            Metric::UtilizationMemory => sample.utilization_memory,
            Metric::TemperatureGpu => sample.temperature_gpu,
            Metric::PowerDraw => sample.power_draw,
            Metric::ClockGraphics => sample.clock_graphics,
            Metric::ClockSm => sample.clock_sm,
            Metric::ClockMemory => sample.clock_memory,
            Metric::ClockVideo => sample.clock_video,
        }
    }

    pub fn slot(self, sample: &mut Sample) -> &mut Option<f64> {
        match self {
            Metric::UtilizationGpu => &mut sample.utilization_gpu,
            Metric::UtilizationMemory => &mut sample.utilization_memory,
            Metric::TemperatureGpu => &mut sample.temperature_gpu,
            Metric::PowerDraw => &mut sample.power_draw,
            Metric::ClockGraphics => &mut sample.clock_graphics,
            Metric::ClockSm => &mut sample.clock_sm,
            Metric::ClockMemory => &mut sample.clock_memory,
            Metric::ClockVideo => &mut sample.clock_video,
        }
    }
}

/// Every sample collected since start, in acquisition order. Never evicts.
#[derive(Clone, Debug, Default)]
pub struct SampleTable {
    rows: Vec<Sample>,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Sample] {
        &self.rows
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.rows.last()
    }

    /// Appends `samples` and fills in their `time_elapsed`.
    ///
    /// The reference point is the first row ever appended, so earlier rows
    /// never need recomputing.
    pub fn append(&mut self, samples: impl IntoIterator<Item = Sample>) {
        for mut sample in samples {
            let reference = self
                .rows
                .first()
                .map_or(sample.timestamp, |first| first.timestamp);
            sample.time_elapsed = seconds_between(reference, sample.timestamp);
            self.rows.push(sample);
        }
    }

    /// Writes the table as CSV: the report header plus `time_elapsed`, one
    /// line per row, numbers without units and missing values left empty.
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);

        let mut header: Vec<&str> = REPORT_COLUMNS.to_vec();
        header.push(ELAPSED_COLUMN);
        writeln!(out, "{}", header.join(", "))?;

        for row in &self.rows {
            let mut fields = vec![
                row.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                row.name.clone(),
                row.memory_used.clone(),
            ];
            fields.extend(Metric::ALL.iter().map(|m| format_value(m.value(row))));
            fields.push(row.time_elapsed.to_string());
            writeln!(out, "{}", fields.join(", "))?;
        }
        out.flush()
    }
}

fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    delta
        .num_microseconds()
        .map_or(delta.num_milliseconds() as f64 / 1e3, |us| us as f64 / 1e6)
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) fn sample_at(secs: f64, util: Option<f64>) -> Sample {
        let base = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        Sample {
            timestamp: base + chrono::Duration::milliseconds((secs * 1000.0) as i64),
            time_elapsed: 0.0,
            name: "NVIDIA GeForce RTX 3080".to_string(),
            memory_used: "1024 MiB".to_string(),
            utilization_gpu: util,
            utilization_memory: Some(5.0),
            temperature_gpu: Some(50.0),
            power_draw: Some(120.5),
            clock_graphics: Some(1905.0),
            clock_sm: Some(1905.0),
            clock_memory: Some(9501.0),
            clock_video: Some(1695.0),
        }
    }

    #[test]
    fn first_row_has_zero_elapsed() {
        let mut table = SampleTable::default();
        table.append([sample_at(12.5, Some(1.0))]);
        assert_eq!(table.rows()[0].time_elapsed, 0.0);
    }

    #[test]
    fn elapsed_is_relative_to_first_row() {
        let mut table = SampleTable::default();
        table.append([sample_at(3.0, None)]);
        table.append([sample_at(4.25, None), sample_at(6.0, None)]);
        table.append([sample_at(10.0, None)]);

        let elapsed: Vec<f64> = table.rows().iter().map(|r| r.time_elapsed).collect();
        assert_eq!(elapsed, vec![0.0, 1.25, 3.0, 7.0]);
        assert!(elapsed.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn write_csv_emits_header_and_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("final_output.csv");

        let mut table = SampleTable::default();
        table.append([sample_at(0.0, Some(10.0)), sample_at(1.0, None)]);
        table.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp, name, memory.used [MiB]"));
        assert!(lines[0].ends_with(", time_elapsed"));
        assert_eq!(
            lines[1],
            "2024/01/15 10:00:00.000, NVIDIA GeForce RTX 3080, 1024 MiB, 10, 5, 50, 120.5, 1905, 1905, 9501, 1695, 0"
        );
        // Missing utilization is left blank.
        assert!(lines[2].contains("1024 MiB, , 5,"));
        assert!(lines[2].ends_with(", 1"));
    }

    #[test]
    fn metric_slots_and_values_agree() {
        let mut sample = sample_at(0.0, None);
        for (i, metric) in Metric::ALL.into_iter().enumerate() {
            *metric.slot(&mut sample) = Some(i as f64);
        }
        for (i, metric) in Metric::ALL.into_iter().enumerate() {
            assert_eq!(metric.value(&sample), Some(i as f64));
        }
    }
}
