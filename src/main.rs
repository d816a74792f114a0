mod aggregator;
mod app;
mod chart;
mod config;
mod data;
mod logger;
mod monitor;
mod session;
mod worker;

use crate::app::MonitorApp;
use crate::config::MonitorConfig;
use crate::monitor::{create_sampler, MonitorError};
use crate::session::Session;
use crossbeam_channel::bounded;
use eframe::egui::ViewportBuilder;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

fn run(config: MonitorConfig) -> Result<usize, MonitorError> {
    let sampler = create_sampler(&config)?;
    let session = Arc::new(Mutex::new(Session::default()));
    let (sender, receiver) = bounded(100);

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title("GPU Monitor")
            .with_inner_size([1000.0, 900.0]),
        ..Default::default()
    };

    let app_session = Arc::clone(&session);
    let app_channel = (sender, receiver.clone());
    let app_config = config.clone();
    eframe::run_native(
        "gpuplot",
        native_options,
        Box::new(move |cc| {
            let app = MonitorApp::new(cc, sampler, app_session, app_channel, app_config)?;
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| MonitorError::Gui(e.to_string()))?;

    // The window is gone, either closed or interrupted. Rows still queued
    // count too; a report cut short by the interrupt does not.
    let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
    guard.interrupt();
    guard.drain(&receiver);
    std::mem::take(&mut *guard).finish(&config.results_path)
}

fn main() -> ExitCode {
    logger::init_logging();

    match run(MonitorConfig::default()) {
        Ok(_) => {
            println!("\nMonitoring stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
