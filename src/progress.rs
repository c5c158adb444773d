use serde::Deserialize;

/// Status string the backend reports once the archive is built
const COMPLETION_MARKER: &str = "ready";
/// Any status containing this is a failed job
const ERROR_MARKER: &str = "error";

/// Raw body of `GET /progress`
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ProgressPayload {
    pub percentage: f32,
    pub status: String,
}

/// Backend job state after interpreting the status string
#[derive(Clone, Debug, PartialEq)]
pub enum JobStatus {
    InProgress { percentage: f32, message: String },
    Completed { percentage: f32 },
    Failed { percentage: f32, reason: String },
}

impl JobStatus {
    pub fn percentage(&self) -> f32 {
        match self {
            JobStatus::InProgress { percentage, .. }
            | JobStatus::Completed { percentage }
            | JobStatus::Failed { percentage, .. } => *percentage,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress { .. })
    }
}

impl From<ProgressPayload> for JobStatus {
    fn from(payload: ProgressPayload) -> Self {
        let ProgressPayload { percentage, status } = payload;
        if status == COMPLETION_MARKER {
            JobStatus::Completed { percentage }
        } else if status.contains(ERROR_MARKER) {
            JobStatus::Failed {
                percentage,
                reason: status,
            }
        } else {
            JobStatus::InProgress {
                percentage,
                message: status,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse_progress_body(body: &str) -> Result<JobStatus, serde_json::Error> {
        serde_json::from_str::<ProgressPayload>(body).map(JobStatus::from)
    }

    #[test]
    fn ready_marker_means_completed() {
        let status = parse_progress_body(r#"{"percentage": 100, "status": "ready"}"#).unwrap();
        assert_eq!(status, JobStatus::Completed { percentage: 100.0 });
    }

    #[test]
    fn error_substring_means_failed() {
        let status =
            parse_progress_body(r#"{"percentage": 12.5, "status": "error: Video unavailable"}"#).unwrap();
        assert_matches!(status, JobStatus::Failed { reason, .. } if reason == "error: Video unavailable");
    }

    #[test]
    fn anything_else_is_progress() {
        let status =
            parse_progress_body(r#"{"percentage": 40, "status": "Downloading 2 of 5"}"#).unwrap();
        assert_eq!(
            status,
            JobStatus::InProgress {
                percentage: 40.0,
                message: "Downloading 2 of 5".to_string()
            }
        );
        assert!(!status.is_terminal());
    }

    #[test]
    fn completion_marker_is_exact() {
        // "Already ready?" is a progress message, not completion
        let status = JobStatus::from(ProgressPayload {
            percentage: 90.0,
            status: "Already ready?".to_string(),
        });
        assert_matches!(status, JobStatus::InProgress { .. });
    }

    #[test]
    fn extra_fields_are_ignored() {
        let body = r#"{"percentage": 0, "status": "Initializing...", "current_item": 0, "total_items": 1, "is_downloading": true}"#;
        assert_matches!(parse_progress_body(body), Ok(JobStatus::InProgress { .. }));
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_progress_body(r#"{"status": "ready"}"#).is_err());
    }
}
