use crate::data::SampleTable;
use crate::monitor::MonitorError;
use crate::worker::SamplerEvent;
use crossbeam_channel::Receiver;
use std::path::Path;
use tracing::{error, info, warn};

/// State shared between the UI thread, the Ctrl+C handler and `main`.
#[derive(Debug, Default)]
pub struct Session {
    pub table: SampleTable,
    pub fault: Option<MonitorError>,
    interrupted: bool,
}

impl Session {
    /// Marks the run as stopping. Faults that arrive afterwards come from
    /// the tool being interrupted mid-write and are not fatal.
    pub fn interrupt(&mut self) {
        self.interrupted = true;
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Applies one sampler event. Returns `true` if sampling has stopped.
    pub fn absorb(&mut self, event: SamplerEvent) -> bool {
        match event {
            SamplerEvent::Samples(rows) => {
                self.table.append(rows);
                false
            }
            SamplerEvent::Fault(e) if self.interrupted => {
                warn!("ignoring sampler error during shutdown: {e}");
                true
            }
            SamplerEvent::Fault(e) => {
                self.fault = Some(e);
                true
            }
        }
    }

    /// Absorbs every queued event. Returns `true` if sampling has stopped.
    pub fn drain(&mut self, receiver: &Receiver<SamplerEvent>) -> bool {
        let mut stopped = false;
        while let Ok(event) = receiver.try_recv() {
            stopped |= self.absorb(event);
        }
        stopped
    }

    /// Persists the table, unless sampling died with a fault, in which case
    /// the fault is returned and nothing is written.
    pub fn finish(self, results_path: &Path) -> Result<usize, MonitorError> {
        if let Some(fault) = self.fault {
            error!("monitoring aborted, results not saved");
            return Err(fault);
        }
        self.table
            .write_csv(results_path)
            .map_err(|source| MonitorError::Persist {
                path: results_path.to_path_buf(),
                source,
            })?;
        info!(
            "saved {} sample(s) to {}",
            self.table.len(),
            results_path.display()
        );
        Ok(self.table.len())
    }
}
