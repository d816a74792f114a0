use std::path::PathBuf;
use std::time::Duration;

/// Metrics requested from `nvidia-smi`, in report column order.
pub const QUERY_FIELDS: &str = "timestamp,name,memory.used,utilization.gpu,utilization.memory,\
temperature.gpu,power.draw,clocks.gr,clocks.sm,clocks.mem,clocks.video";

// Fixed run parameters. Nothing here is read from the environment or the command line.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub program: String,
    pub interval: Duration,
    pub sample_path: PathBuf,
    pub results_path: PathBuf,
    /// Once the table holds more rows than this, panels only show the
    /// trailing `window_samples * interval` seconds.
    pub window_samples: usize,
}

impl MonitorConfig {
    pub fn interval_secs(&self) -> f64 {
        self.interval.as_secs_f64()
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            program: "nvidia-smi".to_string(),
            interval: Duration::from_secs(1),
            sample_path: PathBuf::from("./output_csv/monitor_output.csv"),
            results_path: PathBuf::from("./final_output.csv"),
            window_samples: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_constants() {
        let config = MonitorConfig::default();
        assert_eq!(config.program, "nvidia-smi");
        assert_eq!(config.interval_secs(), 1.0);
        assert_eq!(config.window_samples, 100);
        assert!(config.sample_path.ends_with("output_csv/monitor_output.csv"));
        assert!(config.results_path.ends_with("final_output.csv"));
    }

    #[test]
    fn query_lists_every_metric_once() {
        let fields: Vec<&str> = QUERY_FIELDS.split(',').collect();
        assert_eq!(fields.len(), 11);
        assert_eq!(fields[0], "timestamp");
        assert!(fields.contains(&"clocks.video"));
    }
}
