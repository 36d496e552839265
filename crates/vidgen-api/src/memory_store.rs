use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use vidgen_core::{Generation, GenerationPatch, GenerationStatus, NewGeneration};

use crate::store::{GenerationStore, StoreError, check_patch};

#[derive(Debug, Default)]
struct Rows {
    next_id: i32,
    last_created_at: Option<DateTime<Utc>>,
    by_id: BTreeMap<i32, Generation>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl GenerationStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Generation>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<Generation> = rows.by_id.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn get(&self, id: i32) -> Result<Option<Generation>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.by_id.get(&id).cloned())
    }

    async fn create(&self, input: NewGeneration) -> Result<Generation, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.next_id += 1;

        // Keep created_at non-decreasing even if the wall clock steps back.
        let now = Utc::now();
        let created_at = rows.last_created_at.map_or(now, |last| last.max(now));
        rows.last_created_at = Some(created_at);

        let generation = Generation {
            id: rows.next_id,
            prompt: input.prompt,
            style: input.style,
            aspect_ratio: input.aspect_ratio,
            status: GenerationStatus::Pending,
            progress: 0,
            video_url: None,
            thumbnail_url: None,
            created_at,
        };
        rows.by_id.insert(generation.id, generation.clone());
        Ok(generation)
    }

    async fn update(&self, id: i32, patch: GenerationPatch) -> Result<Generation, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let current = rows.by_id.get(&id).ok_or(StoreError::NotFound(id))?;
        let next = check_patch(current, &patch)?;
        rows.by_id.insert(id, next.clone());
        Ok(next)
    }

    async fn list_unfinished(&self) -> Result<Vec<Generation>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .by_id
            .values()
            .filter(|g| g.status != GenerationStatus::Completed)
            .cloned()
            .collect())
    }
}
