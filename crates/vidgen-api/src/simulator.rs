use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vidgen_core::Stage;

use crate::store::{CompletedMedia, GenerationStore, StoreError};

pub const FIRST_DELAY: Duration = Duration::from_secs(1);
pub const SECOND_DELAY: Duration = Duration::from_secs(2);
pub const THIRD_DELAY: Duration = Duration::from_secs(3);

pub const VIDEO_CATALOG: [&str; 4] = [
    "https://assets.mixkit.co/videos/preview/mixkit-waves-in-the-water-1164-large.mp4",
    "https://assets.mixkit.co/videos/preview/mixkit-tree-branches-in-the-breeze-1188-large.mp4",
    "https://assets.mixkit.co/videos/preview/mixkit-stars-in-space-1610-large.mp4",
    "https://assets.mixkit.co/videos/preview/mixkit-abstract-video-of-a-man-with-heads-like-a-fan-34407-large.mp4",
];

pub const THUMBNAIL_URL: &str =
    "https://images.unsplash.com/photo-1618005182384-a83a8bd57fbe?q=80&w=2564&auto=format&fit=crop";

fn delay_before(stage: Stage) -> Duration {
    match stage {
        Stage::Start => FIRST_DELAY,
        Stage::Midway => SECOND_DELAY,
        Stage::Finish => THIRD_DELAY,
    }
}

pub fn pick_media<R: Rng + ?Sized>(rng: &mut R) -> CompletedMedia {
    let video = VIDEO_CATALOG.choose(rng).copied().unwrap_or(VIDEO_CATALOG[0]);
    CompletedMedia {
        video_url: video.to_string(),
        thumbnail_url: THUMBNAIL_URL.to_string(),
    }
}

struct Inner {
    store: Arc<dyn GenerationStore>,
    root: CancellationToken,
    tracker: TaskTracker,
    next_run: AtomicU64,
    // Several runs may target one id; each is keyed by its run number.
    runs: Mutex<HashMap<i32, Vec<(u64, CancellationToken)>>>,
}

/// Drives generations through their timed stages on background tasks.
#[derive(Clone)]
pub struct StageSimulator {
    inner: Arc<Inner>,
}

impl StageSimulator {
    pub fn new(store: Arc<dyn GenerationStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
                next_run: AtomicU64::new(1),
                runs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Starts the full three-stage run for `id`.
    pub fn spawn(&self, id: i32) {
        self.spawn_from(id, Stage::Start);
    }

    pub fn spawn_from(&self, id: i32, stage: Stage) {
        if self.inner.root.is_cancelled() {
            tracing::warn!(id, "simulator is shut down; run not started");
            return;
        }

        let run = self.inner.next_run.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.root.child_token();
        {
            let mut runs = self.inner.runs.lock().unwrap_or_else(|e| e.into_inner());
            runs.entry(id).or_default().push((run, token.clone()));
        }

        let inner = self.inner.clone();
        self.inner.tracker.spawn(async move {
            drive(inner.store.as_ref(), id, stage, &token).await;
            inner.forget(id, run);
        });
    }

    /// Re-attaches a run to every generation that has not completed, starting
    /// from the first stage it has not reached.
    pub async fn resume_unfinished(&self) -> Result<usize, StoreError> {
        let unfinished = self.inner.store.list_unfinished().await?;
        let mut resumed = 0;
        for g in unfinished {
            if let Some(stage) = Stage::resume_from(g.status, g.progress) {
                tracing::info!(id = g.id, status = %g.status, progress = g.progress, "resuming simulation");
                self.spawn_from(g.id, stage);
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    /// Cancels every in-flight run for `id`. Returns false if none were running.
    pub fn cancel(&self, id: i32) -> bool {
        let removed = {
            let mut runs = self.inner.runs.lock().unwrap_or_else(|e| e.into_inner());
            runs.remove(&id)
        };
        match removed {
            Some(tokens) => {
                for (_, token) in tokens {
                    token.cancel();
                }
                true
            }
            None => false,
        }
    }

    pub fn in_flight(&self) -> usize {
        let runs = self.inner.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.values().map(Vec::len).sum()
    }

    /// Cancels all runs and waits for their tasks to exit.
    pub async fn shutdown(&self) {
        self.inner.root.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }
}

impl Inner {
    fn forget(&self, id: i32, run: u64) {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = runs.get_mut(&id) {
            list.retain(|(r, _)| *r != run);
            if list.is_empty() {
                runs.remove(&id);
            }
        }
    }
}

async fn drive(store: &dyn GenerationStore, id: i32, from: Stage, token: &CancellationToken) {
    let mut stage = Some(from);
    while let Some(current) = stage {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!(id, ?current, "simulation cancelled");
                return;
            }
            _ = tokio::time::sleep(delay_before(current)) => {}
        }

        let result = match current {
            Stage::Start => store.mark_processing(id).await,
            Stage::Midway => store.mark_progress(id, 75).await,
            Stage::Finish => {
                let media = pick_media(&mut rand::thread_rng());
                store.mark_completed(id, media).await
            }
        };

        match result {
            Ok(g) => {
                tracing::info!(id, status = %g.status, progress = g.progress, "generation advanced");
            }
            Err(err) => {
                tracing::warn!(id, %err, ?current, "simulation step failed; run abandoned");
                return;
            }
        }
        stage = current.next();
    }
}
