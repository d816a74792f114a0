use crate::aggregator::poll_once;
use crate::data::Sample;
use crate::monitor::{GpuSampler, MonitorError};
use crossbeam_channel::Sender;
use eframe::egui;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, trace};

#[derive(Debug)]
pub enum SamplerEvent {
    Samples(Vec<Sample>),
    /// Sampling cannot continue; the thread exits after sending this.
    Fault(MonitorError),
}

pub fn spawn_sampler(
    sampler: Box<dyn GpuSampler>,
    report_path: PathBuf,
    interval: Duration,
    sender: Sender<SamplerEvent>,
    ctx: egui::Context,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        let (event, fatal) = match poll_once(sampler.as_ref(), &report_path) {
            Ok(rows) => {
                trace!("sampled {} row(s)", rows.len());
                (SamplerEvent::Samples(rows), false)
            }
            Err(e) => {
                error!("sampling stopped: {e}");
                (SamplerEvent::Fault(e), true)
            }
        };
        if sender.send(event).is_err() {
            break;
        }
        ctx.request_repaint();
        if fatal {
            break;
        }
        thread::sleep(interval);
    })
}
