use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
}

impl GenerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown generation status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for GenerationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A tracked media-generation job as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub id: i32,
    pub prompt: String,
    pub style: Option<String>,
    pub aspect_ratio: String,
    pub status: GenerationStatus,
    pub progress: i32,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied creation fields, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGeneration {
    pub prompt: String,
    pub style: Option<String>,
    pub aspect_ratio: String,
}

/// Partial update of the mutable lifecycle fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationPatch {
    pub status: Option<GenerationStatus>,
    pub progress: Option<i32>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl GenerationPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.video_url.is_none()
            && self.thumbnail_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("progress {0} is outside 0..=100")]
    ProgressOutOfRange(i32),
    #[error("status cannot move from {from} back to {to}")]
    StatusRegression {
        from: GenerationStatus,
        to: GenerationStatus,
    },
    #[error("status cannot skip from {from} to {to}")]
    StatusSkipped {
        from: GenerationStatus,
        to: GenerationStatus,
    },
    #[error("progress cannot decrease from {from} to {to}")]
    ProgressRegression { from: i32, to: i32 },
    #[error("a pending generation must have zero progress, got {0}")]
    PendingWithProgress(i32),
    #[error("progress 100 requires status completed, got {0}")]
    PrematureCompletion(GenerationStatus),
    #[error("status completed requires progress 100, got {0}")]
    IncompleteCompletion(i32),
    #[error("media urls may only be set on completion")]
    MediaBeforeCompletion,
}

impl Generation {
    /// Applies `patch` if the result still honors the lifecycle:
    /// pending -> processing -> completed, progress non-decreasing, and
    /// progress 100 exactly when completed.
    pub fn apply(&self, patch: &GenerationPatch) -> Result<Generation, TransitionError> {
        let status = patch.status.unwrap_or(self.status);
        let progress = patch.progress.unwrap_or(self.progress);

        if !(0..=100).contains(&progress) {
            return Err(TransitionError::ProgressOutOfRange(progress));
        }
        if status < self.status {
            return Err(TransitionError::StatusRegression {
                from: self.status,
                to: status,
            });
        }
        if self.status == GenerationStatus::Pending && status == GenerationStatus::Completed {
            return Err(TransitionError::StatusSkipped {
                from: self.status,
                to: status,
            });
        }
        if progress < self.progress {
            return Err(TransitionError::ProgressRegression {
                from: self.progress,
                to: progress,
            });
        }
        match status {
            GenerationStatus::Pending if progress != 0 => {
                return Err(TransitionError::PendingWithProgress(progress));
            }
            GenerationStatus::Completed if progress != 100 => {
                return Err(TransitionError::IncompleteCompletion(progress));
            }
            s if s != GenerationStatus::Completed && progress == 100 => {
                return Err(TransitionError::PrematureCompletion(s));
            }
            _ => {}
        }

        let touches_media = patch.video_url.is_some() || patch.thumbnail_url.is_some();
        if touches_media && status != GenerationStatus::Completed {
            return Err(TransitionError::MediaBeforeCompletion);
        }

        let mut next = self.clone();
        next.status = status;
        next.progress = progress;
        if let Some(url) = &patch.video_url {
            next.video_url = Some(url.clone());
        }
        if let Some(url) = &patch.thumbnail_url {
            next.thumbnail_url = Some(url.clone());
        }
        Ok(next)
    }
}

/// One timed step of the simulated job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// processing, 25%
    Start,
    /// processing, 75%
    Midway,
    /// completed, 100%, media attached
    Finish,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Self::Start => Some(Self::Midway),
            Self::Midway => Some(Self::Finish),
            Self::Finish => None,
        }
    }

    /// First stage a record has not reached yet, or `None` once completed.
    pub fn resume_from(status: GenerationStatus, progress: i32) -> Option<Stage> {
        match status {
            GenerationStatus::Pending => Some(Self::Start),
            GenerationStatus::Processing if progress < 75 => Some(Self::Midway),
            GenerationStatus::Processing => Some(Self::Finish),
            GenerationStatus::Completed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Generation {
        Generation {
            id: 1,
            prompt: "waves at dusk".to_string(),
            style: None,
            aspect_ratio: "16:9".to_string(),
            status: GenerationStatus::Pending,
            progress: 0,
            video_url: None,
            thumbnail_url: None,
            created_at: Utc::now(),
        }
    }

    fn patch(status: Option<GenerationStatus>, progress: Option<i32>) -> GenerationPatch {
        GenerationPatch {
            status,
            progress,
            ..Default::default()
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
        ] {
            assert_eq!(s.as_str().parse::<GenerationStatus>().unwrap(), s);
        }
        assert!("failed".parse::<GenerationStatus>().is_err());
    }

    #[test]
    fn generation_serializes_camel_case() {
        let v = serde_json::to_value(pending()).unwrap();
        assert_eq!(v["status"], "pending");
        assert_eq!(v["aspectRatio"], "16:9");
        assert!(v["videoUrl"].is_null());
        assert!(v.get("createdAt").is_some());
    }

    #[test]
    fn simulated_path_is_accepted() {
        let g = pending();
        let g = g
            .apply(&patch(Some(GenerationStatus::Processing), Some(25)))
            .unwrap();
        let g = g.apply(&patch(None, Some(75))).unwrap();
        let g = g
            .apply(&GenerationPatch {
                status: Some(GenerationStatus::Completed),
                progress: Some(100),
                video_url: Some("v".to_string()),
                thumbnail_url: Some("t".to_string()),
            })
            .unwrap();
        assert_eq!(g.status, GenerationStatus::Completed);
        assert_eq!(g.progress, 100);
        assert_eq!(g.video_url.as_deref(), Some("v"));
    }

    #[test]
    fn skipping_processing_is_rejected() {
        let err = pending()
            .apply(&patch(Some(GenerationStatus::Completed), Some(100)))
            .unwrap_err();
        assert!(matches!(err, TransitionError::StatusSkipped { .. }));
    }

    #[test]
    fn regressions_are_rejected() {
        let g = pending()
            .apply(&patch(Some(GenerationStatus::Processing), Some(75)))
            .unwrap();
        assert!(matches!(
            g.apply(&patch(Some(GenerationStatus::Pending), Some(0))),
            Err(TransitionError::StatusRegression { .. })
        ));
        assert_eq!(
            g.apply(&patch(None, Some(25))),
            Err(TransitionError::ProgressRegression { from: 75, to: 25 })
        );
    }

    #[test]
    fn progress_100_only_when_completed() {
        let g = pending()
            .apply(&patch(Some(GenerationStatus::Processing), Some(25)))
            .unwrap();
        assert_eq!(
            g.apply(&patch(None, Some(100))),
            Err(TransitionError::PrematureCompletion(GenerationStatus::Processing))
        );
        assert_eq!(
            g.apply(&patch(Some(GenerationStatus::Completed), None)),
            Err(TransitionError::IncompleteCompletion(25))
        );
    }

    #[test]
    fn media_requires_completion() {
        let err = pending()
            .apply(&GenerationPatch {
                video_url: Some("v".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, TransitionError::MediaBeforeCompletion);
    }

    #[test]
    fn out_of_range_progress_is_rejected() {
        assert_eq!(
            pending().apply(&patch(Some(GenerationStatus::Processing), Some(101))),
            Err(TransitionError::ProgressOutOfRange(101))
        );
    }

    #[test]
    fn resume_picks_first_unreached_stage() {
        assert_eq!(
            Stage::resume_from(GenerationStatus::Pending, 0),
            Some(Stage::Start)
        );
        assert_eq!(
            Stage::resume_from(GenerationStatus::Processing, 25),
            Some(Stage::Midway)
        );
        assert_eq!(
            Stage::resume_from(GenerationStatus::Processing, 75),
            Some(Stage::Finish)
        );
        assert_eq!(Stage::resume_from(GenerationStatus::Completed, 100), None);
        assert_eq!(Stage::Finish.next(), None);
    }
}
