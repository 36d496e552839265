use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    NotSet, QueryFilter, QueryOrder, Set,
};
use vidgen_core::{Generation, GenerationPatch, GenerationStatus, NewGeneration, TransitionError};
use vidgen_db::entities::generations;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] DbErr),
    #[error("generation {0} not found")]
    NotFound(i32),
    #[error("generation {id}: {source}")]
    InvalidTransition {
        id: i32,
        #[source]
        source: TransitionError,
    },
    #[error("generation {0} changed while being updated")]
    Conflict(i32),
    #[error("generation {id} has unknown status {status:?}")]
    CorruptRow { id: i32, status: String },
}

/// Media attached to a generation when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedMedia {
    pub video_url: String,
    pub thumbnail_url: String,
}

#[async_trait::async_trait]
pub trait GenerationStore: Send + Sync {
    /// All generations, newest first.
    async fn list(&self) -> Result<Vec<Generation>, StoreError>;

    async fn get(&self, id: i32) -> Result<Option<Generation>, StoreError>;

    async fn create(&self, input: NewGeneration) -> Result<Generation, StoreError>;

    /// Applies `patch` after checking it against the lifecycle rules.
    async fn update(&self, id: i32, patch: GenerationPatch) -> Result<Generation, StoreError>;

    /// Generations not yet completed, oldest first.
    async fn list_unfinished(&self) -> Result<Vec<Generation>, StoreError>;

    async fn mark_processing(&self, id: i32) -> Result<Generation, StoreError> {
        let patch = GenerationPatch {
            status: Some(GenerationStatus::Processing),
            progress: Some(25),
            ..Default::default()
        };
        self.update(id, patch).await
    }

    async fn mark_progress(&self, id: i32, progress: i32) -> Result<Generation, StoreError> {
        let patch = GenerationPatch {
            progress: Some(progress),
            ..Default::default()
        };
        self.update(id, patch).await
    }

    async fn mark_completed(
        &self,
        id: i32,
        media: CompletedMedia,
    ) -> Result<Generation, StoreError> {
        let patch = GenerationPatch {
            status: Some(GenerationStatus::Completed),
            progress: Some(100),
            video_url: Some(media.video_url),
            thumbnail_url: Some(media.thumbnail_url),
        };
        self.update(id, patch).await
    }
}

pub(crate) fn check_patch(
    current: &Generation,
    patch: &GenerationPatch,
) -> Result<Generation, StoreError> {
    current
        .apply(patch)
        .map_err(|source| StoreError::InvalidTransition {
            id: current.id,
            source,
        })
}

fn from_row(row: generations::Model) -> Result<Generation, StoreError> {
    let status = row
        .status
        .parse::<GenerationStatus>()
        .map_err(|e| StoreError::CorruptRow {
            id: row.id,
            status: e.0,
        })?;

    Ok(Generation {
        id: row.id,
        prompt: row.prompt,
        style: row.style,
        aspect_ratio: row.aspect_ratio,
        status,
        progress: row.progress,
        video_url: row.video_url,
        thumbnail_url: row.thumbnail_url,
        created_at: row.created_at.with_timezone(&Utc),
    })
}

/// Writes the lifecycle fields of `next` only if the row still holds the
/// status and progress of `current`. Returns false when another writer got
/// there first.
async fn write_if_unchanged<C: ConnectionTrait>(
    db: &C,
    current: &Generation,
    next: &Generation,
) -> Result<bool, StoreError> {
    let result = generations::Entity::update_many()
        .col_expr(generations::Column::Status, Expr::value(next.status.as_str()))
        .col_expr(generations::Column::Progress, Expr::value(next.progress))
        .col_expr(generations::Column::VideoUrl, Expr::value(next.video_url.clone()))
        .col_expr(
            generations::Column::ThumbnailUrl,
            Expr::value(next.thumbnail_url.clone()),
        )
        .filter(generations::Column::Id.eq(current.id))
        .filter(generations::Column::Status.eq(current.status.as_str()))
        .filter(generations::Column::Progress.eq(current.progress))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Store backed by the `generations` table.
#[derive(Clone)]
pub struct DbStore {
    db: Arc<DatabaseConnection>,
}

impl DbStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl GenerationStore for DbStore {
    async fn list(&self) -> Result<Vec<Generation>, StoreError> {
        generations::Entity::find()
            .order_by_desc(generations::Column::CreatedAt)
            .order_by_desc(generations::Column::Id)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }

    async fn get(&self, id: i32) -> Result<Option<Generation>, StoreError> {
        generations::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(from_row)
            .transpose()
    }

    async fn create(&self, input: NewGeneration) -> Result<Generation, StoreError> {
        // Keep created_at non-decreasing even if the wall clock steps back.
        let newest = generations::Entity::find()
            .order_by_desc(generations::Column::CreatedAt)
            .one(&*self.db)
            .await?;
        let now = Utc::now();
        let created_at = newest.map_or(now, |row| row.created_at.with_timezone(&Utc).max(now));

        let model = generations::ActiveModel {
            id: NotSet,
            prompt: Set(input.prompt),
            style: Set(input.style),
            aspect_ratio: Set(input.aspect_ratio),
            status: Set(GenerationStatus::Pending.as_str().to_string()),
            progress: Set(0),
            video_url: Set(None),
            thumbnail_url: Set(None),
            created_at: Set(created_at.into()),
        };

        let row = model.insert(&*self.db).await?;
        from_row(row)
    }

    async fn update(&self, id: i32, patch: GenerationPatch) -> Result<Generation, StoreError> {
        let Some(row) = generations::Entity::find_by_id(id).one(&*self.db).await? else {
            return Err(StoreError::NotFound(id));
        };
        let current = from_row(row)?;
        if patch.is_empty() {
            return Ok(current);
        }
        let next = check_patch(&current, &patch)?;

        if !write_if_unchanged(&*self.db, &current, &next).await? {
            return Err(StoreError::Conflict(id));
        }
        Ok(next)
    }

    async fn list_unfinished(&self) -> Result<Vec<Generation>, StoreError> {
        generations::Entity::find()
            .filter(generations::Column::Status.ne(GenerationStatus::Completed.as_str()))
            .order_by_asc(generations::Column::Id)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }
}
