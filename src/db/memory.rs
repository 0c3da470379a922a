use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ItemPatch, ItemRow, NewItem};

use super::ItemStore;

/// In-memory item store. Backs the service tests; also handy for running
/// the crate without a database. `fail_next_insert` injects a storage
/// failure so the image-upload compensation path can be exercised.
#[derive(Default)]
pub struct MemoryItemStore {
    items: Mutex<Vec<ItemRow>>,
    fail_next_insert: AtomicBool,
    fail_next_query: AtomicBool,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_query(&self) {
        self.fail_next_query.store(true, Ordering::SeqCst);
    }

    fn sorted_desc(mut rows: Vec<ItemRow>) -> Vec<ItemRow> {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn insert(&self, item: NewItem) -> AppResult<ItemRow> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::Storage("simulated insert failure".to_string()));
        }

        let row = ItemRow {
            id: Uuid::new_v4().to_string(),
            title: item.title,
            description: item.description,
            found_location: item.found_location,
            handover_location: item.handover_location,
            reporter_roll_no: item.reporter_roll_no,
            status: "pending".to_string(),
            claimer_roll_no: None,
            category: item.category,
            image_url: item.image.as_ref().map(|i| i.url.clone()),
            image_public_id: item.image.as_ref().map(|i| i.public_id.clone()),
            created_at: Utc::now(),
        };

        self.items.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list(&self) -> AppResult<Vec<ItemRow>> {
        Ok(Self::sorted_desc(self.items.lock().unwrap().clone()))
    }

    async fn search(&self, query: &str) -> AppResult<Vec<ItemRow>> {
        let needle = query.to_lowercase();
        let rows = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.title.to_lowercase().contains(&needle)
                    || r.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(Self::sorted_desc(rows))
    }

    async fn created_after(&self, since: DateTime<Utc>) -> AppResult<Vec<ItemRow>> {
        if self.fail_next_query.swap(false, Ordering::SeqCst) {
            return Err(AppError::Storage("simulated query failure".to_string()));
        }

        let rows = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.created_at > since)
            .cloned()
            .collect();
        Ok(Self::sorted_desc(rows))
    }

    async fn get(&self, id: &str) -> AppResult<Option<ItemRow>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        claimer_roll_no: Option<&str>,
    ) -> AppResult<Option<ItemRow>> {
        let mut items = self.items.lock().unwrap();
        let Some(row) = items.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        row.status = status.to_string();
        if let Some(claimer) = claimer_roll_no {
            row.claimer_roll_no = Some(claimer.to_string());
        }
        Ok(Some(row.clone()))
    }

    async fn update_fields(&self, id: &str, patch: ItemPatch) -> AppResult<Option<ItemRow>> {
        let mut items = self.items.lock().unwrap();
        let Some(row) = items.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            row.title = title;
        }
        if let Some(description) = patch.description {
            row.description = description;
        }
        if let Some(found_location) = patch.found_location {
            row.found_location = found_location;
        }
        if let Some(handover_location) = patch.handover_location {
            row.handover_location = handover_location;
        }
        if let Some(category) = patch.category {
            row.category = Some(category);
        }
        if let Some(image) = patch.image {
            row.image_url = Some(image.url);
            row.image_public_id = Some(image.public_id);
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|r| r.id != id);
        Ok(items.len() < before)
    }
}
