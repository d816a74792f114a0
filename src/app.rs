use crate::chart::{self, PanelView, PANELS};
use crate::config::MonitorConfig;
use crate::data::SampleTable;
use crate::monitor::{GpuSampler, MonitorError};
use crate::session::Session;
use crate::worker::{spawn_sampler, SamplerEvent};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui::{self, Color32, RichText};
use egui_plot::{HPlacement, Legend, Line, Plot, PlotBounds, PlotPoints};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

// ggplot colour cycle
const PALETTE: [Color32; 4] = [
    Color32::from_rgb(226, 74, 51),
    Color32::from_rgb(52, 138, 189),
    Color32::from_rgb(152, 142, 213),
    Color32::from_rgb(119, 119, 119),
];

pub struct MonitorApp {
    session: Arc<Mutex<Session>>,
    receiver: Receiver<SamplerEvent>,
    config: MonitorConfig,
}

impl MonitorApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        sampler: Box<dyn GpuSampler>,
        session: Arc<Mutex<Session>>,
        (sender, receiver): (Sender<SamplerEvent>, Receiver<SamplerEvent>),
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        // Ctrl+C behaves like closing the window, so the session still gets saved.
        let ctx = cc.egui_ctx.clone();
        let interrupted = Arc::clone(&session);
        ctrlc::set_handler(move || {
            info!("interrupt received, closing");
            interrupted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .interrupt();
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            ctx.request_repaint();
        })?;

        spawn_sampler(
            sampler,
            config.sample_path.clone(),
            config.interval,
            sender,
            cc.egui_ctx.clone(),
        );

        let mut style = (*cc.egui_ctx.style()).clone();
        style.visuals = egui::Visuals::light();
        style.visuals.extreme_bg_color = Color32::from_rgb(229, 229, 229);
        cc.egui_ctx.set_style(style);

        Ok(Self {
            session,
            receiver,
            config,
        })
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if ctx.input(|i| i.viewport().close_requested()) {
            session.interrupt();
        }
        if session.drain(&self.receiver) && !session.is_interrupted() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        egui::TopBottomPanel::top("latest_reading").show(ctx, |ui| {
            latest_reading(ui, &session.table);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            draw_panels(ui, &session.table, &self.config);
        });

        ctx.request_repaint_after(self.config.interval);
    }
}

fn latest_reading(ui: &mut egui::Ui, table: &SampleTable) {
    ui.horizontal(|ui| {
        ui.heading("GPU Monitor");
        let Some(latest) = table.latest() else {
            ui.label("waiting for nvidia-smi…");
            return;
        };
        ui.separator();
        ui.label(RichText::new(&latest.name).strong());
        ui.separator();
        ui.label(format!("GPU {}", reading(latest.utilization_gpu, "%")));
        ui.label(format!("Temp {}", reading(latest.temperature_gpu, "°C")));
        ui.label(format!("Power {}", reading(latest.power_draw, "W")));
        ui.label(format!("Memory {}", latest.memory_used));
        ui.separator();
        ui.label(format!("{} samples", table.len()));
    });
}

fn reading(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.1} {unit}"))
}

fn draw_panels(ui: &mut egui::Ui, table: &SampleTable, config: &MonitorConfig) {
    let Some(x) = chart::x_window(table, config.interval_secs(), config.window_samples) else {
        ui.centered_and_justified(|ui| {
            ui.label("Waiting for the first sample…");
        });
        return;
    };

    let gap = ui.spacing().item_spacing.y;
    let title = ui.text_style_height(&egui::TextStyle::Body) + gap;
    let height = ((ui.available_height() - PANELS.len() as f32 * (title + gap))
        / PANELS.len() as f32)
        .max(60.0);

    for (idx, panel) in PANELS.iter().enumerate() {
        match chart::build_panel(panel, table, &x) {
            Ok(view) => draw_panel(ui, idx, &view, height, idx + 1 == PANELS.len()),
            Err(e) => {
                warn!("Error while plotting: {e}");
                ui.colored_label(Color32::RED, format!("Error while plotting: {e}"));
                ui.add_space(height);
            }
        }
    }
}

fn draw_panel(ui: &mut egui::Ui, idx: usize, view: &PanelView, height: f32, bottom: bool) {
    ui.label(RichText::new(view.title).strong());

    // Panels share the time axis, so only the bottom one labels it.
    let mut plot = Plot::new(("gpu_panel", idx))
        .height(height)
        .legend(Legend::default())
        .y_axis_position(HPlacement::Right)
        .show_axes([bottom, true])
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .allow_double_click_reset(false);
    if bottom {
        plot = plot.x_axis_label("Time elapsed [s]");
    }

    let bounds = PlotBounds::from_min_max(view.min, view.max);
    plot.show(ui, |plot_ui| {
        plot_ui.set_plot_bounds(bounds);
        for (series, line) in view.lines.iter().enumerate() {
            let color = PALETTE[series % PALETTE.len()];
            for segment in &line.segments {
                plot_ui.line(Line::new(line.label, PlotPoints::new(segment.clone())).color(color));
            }
        }
    });
}
