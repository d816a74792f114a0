use crate::aggregator::ParseError;
use crate::config::{MonitorConfig, QUERY_FIELDS};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed report {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to save results to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("GUI error: {0}")]
    Gui(String),
}

pub trait GpuSampler: Send {
    /// Writes a fresh report (header plus one row) to `dest`, replacing its contents.
    fn sample(&self, dest: &Path) -> Result<(), MonitorError>;
}

pub struct NvidiaSmiSampler {
    program: String,
}

impl NvidiaSmiSampler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl GpuSampler for NvidiaSmiSampler {
    fn sample(&self, dest: &Path) -> Result<(), MonitorError> {
        let output = Command::new(&self.program)
            .arg(format!("--query-gpu={QUERY_FIELDS}"))
            .arg("--format=csv")
            .arg("-f")
            .arg(dest)
            .output()
            .map_err(|source| MonitorError::Launch {
                program: self.program.clone(),
                source,
            })?;

        // A failed run is reported and otherwise ignored; the caller reads
        // whatever the report file currently holds.
        if !output.status.success() {
            error!(
                "{} error: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        } else {
            debug!("{} wrote {}", self.program, dest.display());
        }
        Ok(())
    }
}

pub fn create_sampler(config: &MonitorConfig) -> Result<Box<dyn GpuSampler>, MonitorError> {
    if let Some(dir) = config
        .sample_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(dir).map_err(|source| MonitorError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    info!(
        "sampling with {} every {:?} into {}",
        config.program,
        config.interval,
        config.sample_path.display()
    );
    Ok(Box::new(NvidiaSmiSampler::new(config.program.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = NvidiaSmiSampler::new("definitely-not-a-real-gpu-tool");
        let err = sampler.sample(&dir.path().join("out.csv")).unwrap_err();
        assert!(matches!(err, MonitorError::Launch { .. }));
        assert!(err.to_string().contains("definitely-not-a-real-gpu-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        std::fs::write(&dest, "stale").unwrap();

        // `false` ignores its arguments and exits with status 1.
        let sampler = NvidiaSmiSampler::new("false");
        sampler.sample(&dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "stale");
    }

    #[test]
    fn create_sampler_makes_report_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig {
            sample_path: dir.path().join("output_csv").join("monitor_output.csv"),
            ..MonitorConfig::default()
        };
        create_sampler(&config).unwrap();
        assert!(dir.path().join("output_csv").is_dir());
    }
}
