//! Postgres board store.
//!
//! DESIGN
//! ======
//! Implements [`BoardStore`] over the `boards`, `pixel_owners` and
//! `pixel_images` tables. Deployed schemas may predate the `owners_json`,
//! `images_json` and `version` columns, so reads and snapshot writes walk an
//! ordered chain of [`LoadShape`]s and settle on the first one the schema
//! accepts:
//!
//! ```text
//! Full(data, owners_json, images_json) -> OwnersOnly(data, owners_json)
//!     -> DataOnly(data) -> Unversioned(data, no version or updated_at)
//! ```
//!
//! Only an "undefined column" error moves down the chain. Any other failure
//! is returned as [`StoreError::Unavailable`]. An unversioned board always
//! reads as version 0 and cannot check an expected version, so writes to it
//! are unconditional.
//!
//! TRADE-OFFS
//! ==========
//! The version check of a conditional write happens inside the upsert
//! statement, so two writers racing with the same expected version cannot
//! both win. Unconditional writes still overwrite each other.

use async_trait::async_trait;
use canvas::grid::BoardId;
use canvas::store::{BoardRow, BoardStore, PixelImage, PixelOwner, StoreError, validate_row};
use sqlx::PgPool;
use tracing::{debug, warn};

/// Postgres SQLSTATE for a reference to a column that does not exist.
const UNDEFINED_COLUMN: &str = "42703";

// =============================================================================
// SHAPES
// =============================================================================

/// Which optional snapshot columns a query touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadShape {
    Full,
    OwnersOnly,
    DataOnly,
    Unversioned,
}

impl LoadShape {
    /// Probe order, richest first.
    pub const CHAIN: [LoadShape; 4] = [Self::Full, Self::OwnersOnly, Self::DataOnly, Self::Unversioned];

    fn has_owners(self) -> bool {
        matches!(self, Self::Full | Self::OwnersOnly)
    }

    fn has_images(self) -> bool {
        matches!(self, Self::Full)
    }

    fn has_version(self) -> bool {
        !matches!(self, Self::Unversioned)
    }

    /// Select for one board row. Missing columns come back as NULL so every
    /// shape decodes into the same tuple.
    #[must_use]
    pub fn select_sql(self) -> &'static str {
        match self {
            Self::Full => "SELECT id, size, data, owners_json, images_json, version FROM boards WHERE id = $1",
            Self::OwnersOnly => {
                "SELECT id, size, data, owners_json, NULL::TEXT, version FROM boards WHERE id = $1"
            }
            Self::DataOnly => "SELECT id, size, data, NULL::TEXT, NULL::TEXT, version FROM boards WHERE id = $1",
            Self::Unversioned => "SELECT id, size, data, NULL::TEXT, NULL::TEXT, 0::BIGINT FROM boards WHERE id = $1",
        }
    }

    /// Snapshot upsert. Binds: `$1` id, `$2` size, `$3` data, `$4` expected
    /// version (NULL for an unconditional write), then `$5` owners and `$6`
    /// images when the shape has them. Returns the new version, or no row
    /// when the expected version did not match. [`LoadShape::Unversioned`]
    /// binds only `$1..$3` and always returns version 0.
    #[must_use]
    pub fn upsert_sql(self) -> String {
        if !self.has_version() {
            return "INSERT INTO boards (id, size, data) VALUES ($1, $2, $3) \
                    ON CONFLICT (id) DO UPDATE SET size = EXCLUDED.size, data = EXCLUDED.data \
                    RETURNING 0::BIGINT"
                .to_owned();
        }
        let mut columns = vec!["data"];
        let mut values = vec!["$3"];
        if self.has_owners() {
            columns.push("owners_json");
            values.push("$5");
        }
        if self.has_images() {
            columns.push("images_json");
            values.push("$6");
        }
        let updates = columns
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO boards (id, size, {columns}, version, updated_at) \
             SELECT $1, $2, {values}, 1, now() \
             WHERE $4::BIGINT IS NULL OR $4 = 0 OR EXISTS (SELECT 1 FROM boards WHERE id = $1) \
             ON CONFLICT (id) DO UPDATE SET size = EXCLUDED.size, {updates}, \
             version = boards.version + 1, updated_at = now() \
             WHERE $4::BIGINT IS NULL OR boards.version = $4 \
             RETURNING version",
            columns = columns.join(", "),
            values = values.join(", "),
        )
    }
}

fn is_undefined_column(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNDEFINED_COLUMN),
        _ => false,
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn to_i32(value: u32, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::InvalidSnapshot(format!("{what} {value} out of range")))
}

type BoardTuple = (i64, i32, Option<String>, Option<String>, Option<String>, i64);

fn row_from_tuple((id, size, data, owners_json, images_json, version): BoardTuple) -> Result<BoardRow, StoreError> {
    let size = u32::try_from(size).map_err(|_| StoreError::InvalidSnapshot(format!("board {id} has size {size}")))?;
    Ok(BoardRow { id, size, data, owners_json, images_json, version })
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone)]
pub struct PgBoardStore {
    pool: PgPool,
}

impl PgBoardStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load a row with the richest shape the schema supports.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for a missing row, otherwise
    /// [`StoreError::Unavailable`].
    pub async fn load_with_shape(&self, board_id: BoardId) -> Result<(BoardRow, LoadShape), StoreError> {
        let mut last_err = None;
        for shape in LoadShape::CHAIN {
            let result = sqlx::query_as::<_, BoardTuple>(shape.select_sql())
                .bind(board_id)
                .fetch_optional(&self.pool)
                .await;
            match result {
                Ok(Some(tuple)) => return Ok((row_from_tuple(tuple)?, shape)),
                Ok(None) => return Err(StoreError::NotFound(board_id)),
                Err(e) if is_undefined_column(&e) => {
                    debug!(%board_id, ?shape, error = %e, "board select fell back");
                    last_err = Some(e);
                }
                Err(e) => return Err(unavailable(e)),
            }
        }
        Err(last_err.map_or_else(|| StoreError::Unavailable("no select shape".into()), unavailable))
    }

    async fn upsert_with_shape(
        &self,
        row: &BoardRow,
        expected_version: Option<i64>,
        shape: LoadShape,
    ) -> Result<Option<i64>, sqlx::Error> {
        let sql = shape.upsert_sql();
        let size = i32::try_from(row.size).unwrap_or(i32::MAX);
        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(row.id)
            .bind(size)
            .bind(row.data.as_deref());
        if shape.has_version() {
            query = query.bind(expected_version);
        }
        if shape.has_owners() {
            query = query.bind(row.owners_json.as_deref());
        }
        if shape.has_images() {
            query = query.bind(row.images_json.as_deref());
        }
        query.fetch_optional(&self.pool).await
    }

    async fn current_version(&self, board_id: BoardId) -> Result<i64, StoreError> {
        let version = sqlx::query_scalar::<_, i64>("SELECT version FROM boards WHERE id = $1")
            .bind(board_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(version.unwrap_or(0))
    }
}

#[async_trait]
impl BoardStore for PgBoardStore {
    async fn load_board(&self, board_id: BoardId) -> Result<BoardRow, StoreError> {
        let (row, _) = self.load_with_shape(board_id).await?;
        Ok(row)
    }

    async fn upsert_board(&self, row: &BoardRow, expected_version: Option<i64>) -> Result<i64, StoreError> {
        validate_row(row)?;
        let mut last_err = None;
        for shape in LoadShape::CHAIN {
            match self.upsert_with_shape(row, expected_version, shape).await {
                Ok(Some(version)) => {
                    if shape != LoadShape::Full {
                        warn!(board_id = row.id, ?shape, "board written without some snapshot columns");
                    }
                    if !shape.has_version() && expected_version.is_some() {
                        warn!(board_id = row.id, ?expected_version, "schema has no version column, write was unconditional");
                    }
                    return Ok(version);
                }
                Ok(None) => {
                    let actual = self.current_version(row.id).await?;
                    return Err(StoreError::Conflict { expected: expected_version.unwrap_or(0), actual });
                }
                Err(e) if is_undefined_column(&e) => {
                    debug!(board_id = row.id, ?shape, error = %e, "board upsert fell back");
                    last_err = Some(e);
                }
                Err(e) => return Err(unavailable(e)),
            }
        }
        Err(last_err.map_or_else(|| StoreError::Unavailable("no upsert shape".into()), unavailable))
    }

    async fn upsert_pixel_owner(&self, owner: &PixelOwner) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO pixel_owners (board_id, idx, owner, color_idx, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (board_id, idx) DO UPDATE SET owner = EXCLUDED.owner, \
             color_idx = EXCLUDED.color_idx, updated_at = now()",
        )
        .bind(owner.board_id)
        .bind(to_i32(owner.idx, "idx")?)
        .bind(owner.owner.as_deref())
        .bind(i32::from(owner.color_idx))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn upsert_pixel_image(&self, image: &PixelImage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO pixel_images (board_id, idx, path, owner, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (board_id, idx) DO UPDATE SET path = EXCLUDED.path, \
             owner = EXCLUDED.owner, updated_at = now()",
        )
        .bind(image.board_id)
        .bind(to_i32(image.idx, "idx")?)
        .bind(&image.path)
        .bind(image.owner.as_deref())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn list_pixel_owners(&self, board_id: BoardId) -> Result<Vec<PixelOwner>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, i32, Option<String>, i32)>(
            "SELECT board_id, idx, owner, color_idx FROM pixel_owners WHERE board_id = $1 ORDER BY idx",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(rows.into_iter().filter_map(owner_from_tuple).collect())
    }

    async fn pixel_owner(&self, board_id: BoardId, idx: u32) -> Result<Option<PixelOwner>, StoreError> {
        let row = sqlx::query_as::<_, (i64, i32, Option<String>, i32)>(
            "SELECT board_id, idx, owner, color_idx FROM pixel_owners WHERE board_id = $1 AND idx = $2",
        )
        .bind(board_id)
        .bind(to_i32(idx, "idx")?)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(row.and_then(owner_from_tuple))
    }
}

/// Rows with a negative index or an out-of-range color are skipped.
fn owner_from_tuple((board_id, idx, owner, color_idx): (i64, i32, Option<String>, i32)) -> Option<PixelOwner> {
    Some(PixelOwner {
        board_id,
        idx: u32::try_from(idx).ok()?,
        owner,
        color_idx: u16::try_from(color_idx).ok()?,
    })
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
