//! Desktop front-end for a YouTube-to-ZIP download backend

// HTTP client for the download backend
mod backend;
// Environment configuration
mod config;
// Error types
mod error;
// Data models for job requests and UI state
mod model;
// Job submission and progress polling state machine
mod poller;
// Progress payload interpretation
mod progress;

use backend::HttpBackend;
use config::{AppConfig, PollerConfig};
use model::{FileFormat, JobRequest, UiStatus};
use poller::JobPoller;

// eframe/egui for GUI application framework
use eframe::{egui, App, Frame};
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use std::{sync::Arc, time::Duration};
use tokio::runtime::Runtime;
use egui::{Color32, Visuals};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Program entry point: initializes logging, config and runtime, then launches GUI
fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ytzip=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|err| {
        tracing::error!(error = %err, "Invalid configuration");
        std::process::exit(1);
    });

    // The runtime is owned by the app and outlives every job task
    let runtime = Runtime::new().unwrap_or_else(|err| {
        tracing::error!(error = %err, "Could not start async runtime");
        std::process::exit(1);
    });

    tracing::info!(
        backend = %config.backend_url,
        poll_interval = ?config.poller.poll_interval,
        "Starting ytzip"
    );

    let backend = HttpBackend::new(config.backend_url.clone(), &config.http).unwrap_or_else(|err| {
        tracing::error!(error = %err, "Could not set up the backend client");
        std::process::exit(1);
    });

    // Configure default native options for egui window
    let options = eframe::NativeOptions::default();
    // Run the application
    eframe::run_native(
        "YouTube Downloader",
        options,
        Box::new(move |cc| {
            // Use dark theme visuals
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(&cc.egui_ctx, Arc::new(runtime), backend, config.poller))
        }),
    )
}

/// Application state for the GUI
struct DownloaderApp {
    /// Input field for the video or playlist URL
    url_input: String,
    /// Selected output format
    format: FileFormat,
    /// Selected bitrate or resolution
    quality: String,
    /// Destination folder for the ZIP archive
    download_folder: String,
    /// Job state machine talking to the backend
    poller: JobPoller<HttpBackend>,
    /// Keeps job tasks alive; dropped after the poller
    _runtime: Arc<Runtime>,
}

impl DownloaderApp {
    fn new(ctx: &egui::Context, runtime: Arc<Runtime>, backend: HttpBackend, config: PollerConfig) -> Self {
        let repaint_ctx = ctx.clone();
        let poller = JobPoller::with_notifier(
            Arc::new(backend),
            runtime.handle().clone(),
            config,
            Some(Arc::new(move || repaint_ctx.request_repaint())),
        );
        let format = FileFormat::default();
        Self {
            url_input: String::new(),
            format,
            quality: format.default_quality().to_string(),
            download_folder: poller.config().download_dir.display().to_string(),
            poller,
            _runtime: runtime,
        }
    }

    fn start_download(&mut self) {
        let request = JobRequest::new(self.url_input.trim(), self.format, self.quality.clone());
        if let Err(err) = self.poller.submit(request) {
            tracing::debug!(error = %err, "Submission rejected");
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Clear inputs once a retrieved job has been reset
        if self.poller.take_reset() {
            self.url_input.clear();
        }
        let view = self.poller.snapshot();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("YouTube Downloader");

            // URL input field
            ui.label("YouTube URL:");
            ui.add(
                egui::TextEdit::singleline(&mut self.url_input)
                    .hint_text("https://www.youtube.com/playlist?list=..."),
            );

            // Format selection resets quality to the format's default
            ui.label("Format:");
            ui.horizontal(|ui| {
                for (format, label) in [(FileFormat::Mp3, "MP3"), (FileFormat::Mp4, "MP4")] {
                    if ui.radio_value(&mut self.format, format, label).changed() {
                        self.quality = format.default_quality().to_string();
                    }
                }
            });

            // Quality dropdown
            ui.label(self.format.quality_label());
            egui::ComboBox::from_id_source("quality")
                .selected_text(&self.quality)
                .show_ui(ui, |ui| {
                    for q in self.format.qualities() {
                        ui.selectable_value(&mut self.quality, q.to_string(), *q);
                    }
                });

            // Folder selection
            ui.horizontal(|ui| {
                ui.label("Save ZIP to:");
                ui.text_edit_singleline(&mut self.download_folder);
                if ui.button("Browse…").clicked() {
                    if let Some(folder) = FileDialog::new().set_directory(&self.download_folder).pick_folder() {
                        self.download_folder = folder.display().to_string();
                    }
                }
            });

            // Status panel
            if view.status != UiStatus::Idle {
                ui.separator();
                ui.horizontal(|ui| {
                    if view.status.is_terminal() {
                        let color = if view.status == UiStatus::Ready {
                            Color32::GREEN
                        } else {
                            Color32::RED
                        };
                        ui.colored_label(color, &view.message);
                    } else {
                        ui.spinner();
                        ui.label(&view.message);
                    }
                });
                if view.status == UiStatus::Downloading {
                    ui.add(egui::ProgressBar::new(view.progress / 100.0).show_percentage());
                }
            }

            ui.separator();
            match view.status {
                UiStatus::Ready => {
                    if ui
                        .add_enabled(!view.saving, egui::Button::new("⬇ Download ZIP File"))
                        .clicked()
                    {
                        self.poller.set_download_dir(self.download_folder.trim());
                        self.poller.retrieve();
                    }
                }
                UiStatus::Downloading => {
                    ui.horizontal(|ui| {
                        ui.add_enabled(false, egui::Button::new("Processing Playlist..."));
                        if ui.button("Cancel").clicked() {
                            self.poller.cancel();
                        }
                    });
                }
                UiStatus::Idle | UiStatus::Error => {
                    if ui.button("Start Download").clicked() {
                        self.start_download();
                    }
                }
            }

            ui.add_space(8.0);
            ui.small("Large playlists may take a few minutes to process.");
        });

        // Keep the spinner moving while a job task is alive
        if self.poller.is_polling() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
