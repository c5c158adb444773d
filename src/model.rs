use serde::Serialize;

use crate::error::DownloadError;

/// Bitrates (kbps) offered for audio jobs
pub const AUDIO_QUALITIES: [&str; 3] = ["128", "192", "320"];
/// Maximum resolutions offered for video jobs
pub const VIDEO_QUALITIES: [&str; 4] = ["360p", "480p", "720p", "1080p"];

/// Hosts a job URL must mention to be accepted
const KNOWN_HOSTS: [&str; 2] = ["youtube.com", "youtu.be"];

/// Output container requested from the backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Audio only, converted to MP3
    #[default]
    Mp3,
    /// Video, merged into MP4
    Mp4,
}

impl FileFormat {
    /// Quality values the backend accepts for this format
    pub fn qualities(self) -> &'static [&'static str] {
        match self {
            FileFormat::Mp3 => &AUDIO_QUALITIES,
            FileFormat::Mp4 => &VIDEO_QUALITIES,
        }
    }

    /// Quality preselected when the format is chosen
    pub fn default_quality(self) -> &'static str {
        match self {
            FileFormat::Mp3 => "192",
            FileFormat::Mp4 => "720p",
        }
    }

    /// Caption shown above the quality selector
    pub fn quality_label(self) -> &'static str {
        match self {
            FileFormat::Mp3 => "Bitrate (kbps)",
            FileFormat::Mp4 => "Max Resolution",
        }
    }
}

/// Body of the job creation call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    /// Video or playlist URL
    pub url: String,
    /// Bitrate or resolution, depending on `file_format`
    pub quality: String,
    /// Requested output container
    pub file_format: FileFormat,
}

impl JobRequest {
    pub fn new(url: impl Into<String>, file_format: FileFormat, quality: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
            file_format,
        }
    }

    /// Superficial client-side checks; nothing here touches the network.
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.url.is_empty() || !KNOWN_HOSTS.iter().any(|host| self.url.contains(host)) {
            return Err(DownloadError::Validation(
                "Please enter a valid YouTube URL".to_string(),
            ));
        }
        if !self.file_format.qualities().contains(&self.quality.as_str()) {
            return Err(DownloadError::Validation(format!(
                "Unsupported quality {} for {:?}",
                self.quality, self.file_format
            )));
        }
        Ok(())
    }
}

/// Where the widget is in the job lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiStatus {
    /// Waiting for input
    #[default]
    Idle,
    /// Job submitted, polling for progress
    Downloading,
    /// Backend finished; the archive can be retrieved
    Ready,
    /// Validation or backend failure
    Error,
}

impl UiStatus {
    /// `Ready` and `Error` only change through user action
    pub fn is_terminal(self) -> bool {
        matches!(self, UiStatus::Ready | UiStatus::Error)
    }
}

/// Everything the UI renders about the current job
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DownloadView {
    /// Current lifecycle state
    pub status: UiStatus,
    /// Human-readable status line
    pub message: String,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f32,
    /// Archive retrieval in flight
    pub saving: bool,
}

impl DownloadView {
    pub fn set_progress(&mut self, percentage: f32) {
        self.progress = if percentage.is_finite() {
            percentage.clamp(0.0, 100.0)
        } else {
            0.0
        };
    }

    /// Validation and backend failures end up looking the same to the user.
    pub fn fail(&mut self, err: DownloadError) {
        self.status = UiStatus::Error;
        self.message = err.to_string();
    }
}
