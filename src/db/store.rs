use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{ItemPatch, ItemRow, NewItem};

const ITEM_COLUMNS: &str = "id::text, title, description, found_location, handover_location, \
     reporter_roll_no, status, claimer_roll_no, category, image_url, image_public_id, created_at";

/// Persistence seam for items. The production implementation is Postgres;
/// tests run against [`crate::db::MemoryItemStore`].
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert(&self, item: NewItem) -> AppResult<ItemRow>;

    /// All items, newest first.
    async fn list(&self) -> AppResult<Vec<ItemRow>>;

    /// Case-insensitive substring match on title or description, newest first.
    async fn search(&self, query: &str) -> AppResult<Vec<ItemRow>>;

    /// Items created strictly after `since`, newest first.
    async fn created_after(&self, since: DateTime<Utc>) -> AppResult<Vec<ItemRow>>;

    async fn get(&self, id: &str) -> AppResult<Option<ItemRow>>;

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        claimer_roll_no: Option<&str>,
    ) -> AppResult<Option<ItemRow>>;

    async fn update_fields(&self, id: &str, patch: ItemPatch) -> AppResult<Option<ItemRow>>;

    /// Returns false when the id did not exist.
    async fn delete(&self, id: &str) -> AppResult<bool>;
}

pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escapes LIKE metacharacters so user queries match literally, the same
/// substring semantics as [`crate::db::MemoryItemStore`].
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn insert(&self, item: NewItem) -> AppResult<ItemRow> {
        let (image_url, image_public_id) = match &item.image {
            Some(img) => (Some(img.url.as_str()), Some(img.public_id.as_str())),
            None => (None, None),
        };

        let sql = format!(
            "INSERT INTO items (title, description, found_location, handover_location, \
             reporter_roll_no, category, image_url, image_public_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ITEM_COLUMNS}"
        );

        let row: ItemRow = sqlx::query_as(&sql)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.found_location)
            .bind(&item.handover_location)
            .bind(&item.reporter_roll_no)
            .bind(&item.category)
            .bind(image_url)
            .bind(image_public_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list(&self) -> AppResult<Vec<ItemRow>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at DESC");
        let rows: Vec<ItemRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn search(&self, query: &str) -> AppResult<Vec<ItemRow>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE title ILIKE '%' || $1 || '%' ESCAPE '\\' \
             OR description ILIKE '%' || $1 || '%' ESCAPE '\\' \
             ORDER BY created_at DESC"
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(escape_like(query))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn created_after(&self, since: DateTime<Utc>) -> AppResult<Vec<ItemRow>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE created_at > $1 ORDER BY created_at DESC"
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get(&self, id: &str) -> AppResult<Option<ItemRow>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1::uuid");
        let row: Option<ItemRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        claimer_roll_no: Option<&str>,
    ) -> AppResult<Option<ItemRow>> {
        let sql = format!(
            "UPDATE items SET status = $1, claimer_roll_no = COALESCE($2, claimer_roll_no) \
             WHERE id = $3::uuid \
             RETURNING {ITEM_COLUMNS}"
        );
        let row: Option<ItemRow> = sqlx::query_as(&sql)
            .bind(status)
            .bind(claimer_roll_no)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_fields(&self, id: &str, patch: ItemPatch) -> AppResult<Option<ItemRow>> {
        let (image_url, image_public_id) = match &patch.image {
            Some(img) => (Some(img.url.as_str()), Some(img.public_id.as_str())),
            None => (None, None),
        };

        let sql = format!(
            "UPDATE items SET \
             title = COALESCE($1, title), \
             description = COALESCE($2, description), \
             found_location = COALESCE($3, found_location), \
             handover_location = COALESCE($4, handover_location), \
             category = COALESCE($5, category), \
             image_url = COALESCE($6, image_url), \
             image_public_id = COALESCE($7, image_public_id) \
             WHERE id = $8::uuid \
             RETURNING {ITEM_COLUMNS}"
        );
        let row: Option<ItemRow> = sqlx::query_as(&sql)
            .bind(&patch.title)
            .bind(&patch.description)
            .bind(&patch.found_location)
            .bind(&patch.handover_location)
            .bind(&patch.category)
            .bind(image_url)
            .bind(image_public_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM items WHERE id = $1::uuid")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_makes_metacharacters_literal() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("found_location"), "found\\_location");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("Blue Backpack"), "Blue Backpack");
    }
}
