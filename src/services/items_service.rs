use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::ItemStore;
use crate::error::{AppError, AppResult};
use crate::models::{ImageAttachment, Item, ItemPatch, ItemStatus, NewItem};
use crate::storage::{ImageUpload, MediaStore};

/// Where claimants pick items up when the reporter does not name a place.
pub const DEFAULT_HANDOVER_LOCATION: &str = "Security Office";

#[derive(Debug, Clone)]
pub struct NewItemRequest {
    pub title: String,
    pub description: String,
    pub found_location: String,
    pub handover_location: Option<String>,
    pub reporter_roll_no: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub found_location: Option<String>,
    pub handover_location: Option<String>,
    pub category: Option<String>,
}

/// Business logic over the item store and the media host. The two are
/// independent systems, so every image write is sequenced against the
/// record write with a compensating delete on failure.
pub struct ItemService {
    store: Arc<dyn ItemStore>,
    media: Option<Arc<dyn MediaStore>>,
}

impl ItemService {
    pub fn new(store: Arc<dyn ItemStore>, media: Option<Arc<dyn MediaStore>>) -> Self {
        Self { store, media }
    }

    fn media(&self) -> AppResult<&Arc<dyn MediaStore>> {
        self.media
            .as_ref()
            .ok_or_else(|| AppError::Storage("media storage is not configured".to_string()))
    }

    fn required(field: &str, value: &str) -> AppResult<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput(format!("{} is required", field)));
        }
        Ok(trimmed.to_string())
    }

    fn non_empty(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Best-effort release of an uploaded resource after the record write
    /// that should have referenced it failed.
    async fn compensate_upload(&self, asset: &ImageAttachment) {
        let Some(media) = self.media.as_ref() else {
            return;
        };
        match media.delete(&asset.public_id).await {
            Ok(()) => tracing::warn!(
                "released orphaned image after failed item write: public_id={}",
                asset.public_id
            ),
            Err(e) => tracing::error!(
                "failed to release orphaned image: public_id={}, error={}",
                asset.public_id,
                e
            ),
        }
    }

    pub async fn create_item(
        &self,
        req: NewItemRequest,
        image: Option<ImageUpload>,
    ) -> AppResult<Item> {
        let title = Self::required("title", &req.title)?;
        let description = Self::required("description", &req.description)?;
        let found_location = Self::required("foundLocation", &req.found_location)?;
        let reporter_roll_no = Self::required("reporterRollNo", &req.reporter_roll_no)?;
        let handover_location = Self::non_empty(req.handover_location)
            .unwrap_or_else(|| DEFAULT_HANDOVER_LOCATION.to_string());

        // Upload before persisting: the record must never reference a
        // resource that does not exist yet.
        let uploaded = match &image {
            Some(img) => Some(self.media()?.upload(img).await?),
            None => None,
        };

        let new_item = NewItem {
            title,
            description,
            found_location,
            handover_location,
            reporter_roll_no,
            category: Self::non_empty(req.category),
            image: uploaded.clone(),
        };

        match self.store.insert(new_item).await {
            Ok(row) => {
                tracing::info!("item created: id={}, title={}", row.id, row.title);
                Ok(row.into())
            }
            Err(e) => {
                if let Some(asset) = &uploaded {
                    self.compensate_upload(asset).await;
                }
                Err(e)
            }
        }
    }

    pub async fn list_items(&self) -> AppResult<Vec<Item>> {
        let rows = self.store.list().await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Case-insensitive substring match on title or description. An empty
    /// query returns the full list.
    pub async fn search_items(&self, query: &str) -> AppResult<Vec<Item>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_items().await;
        }
        let rows = self.store.search(query).await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Items created strictly after `since`, newest first. Polling cursor
    /// contract shared with [`crate::poll`].
    pub async fn items_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Item>> {
        let rows = self.store.created_after(since).await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: &str,
        claimer_roll_no: Option<&str>,
    ) -> AppResult<Item> {
        let parsed = ItemStatus::from_str(status)?;

        // Claimer identity only accompanies a claim.
        let claimer = match parsed {
            ItemStatus::Claimed => claimer_roll_no.map(str::trim).filter(|c| !c.is_empty()),
            ItemStatus::Pending => None,
        };

        let row = self
            .store
            .update_status(id, parsed.as_str(), claimer)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

        tracing::info!("item status updated: id={}, status={}", row.id, row.status);
        Ok(row.into())
    }

    pub async fn update_item(
        &self,
        id: &str,
        req: UpdateItemRequest,
        image: Option<ImageUpload>,
    ) -> AppResult<Item> {
        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

        // New image goes up first; the old one is released only after the
        // record points at its replacement. An upload failure leaves the
        // item untouched with its old image intact.
        let uploaded = match &image {
            Some(img) => Some(self.media()?.upload(img).await?),
            None => None,
        };

        let patch = ItemPatch {
            title: Self::non_empty(req.title),
            description: Self::non_empty(req.description),
            found_location: Self::non_empty(req.found_location),
            handover_location: Self::non_empty(req.handover_location),
            category: Self::non_empty(req.category),
            image: uploaded.clone(),
        };

        match self.store.update_fields(id, patch).await {
            Ok(Some(row)) => {
                if uploaded.is_some() {
                    if let Some(old) = existing.image() {
                        if let Some(media) = self.media.as_ref() {
                            if let Err(e) = media.delete(&old.public_id).await {
                                tracing::error!(
                                    "failed to release replaced image: public_id={}, error={}",
                                    old.public_id,
                                    e
                                );
                            }
                        }
                    }
                }
                Ok(row.into())
            }
            Ok(None) => {
                // Deleted between get and update.
                if let Some(asset) = &uploaded {
                    self.compensate_upload(asset).await;
                }
                Err(AppError::NotFound("Item not found".to_string()))
            }
            Err(e) => {
                if let Some(asset) = &uploaded {
                    self.compensate_upload(asset).await;
                }
                Err(e)
            }
        }
    }

    /// Releases the owned image first; a release failure aborts the delete
    /// so the handle is never orphaned.
    pub async fn delete_item(&self, id: &str) -> AppResult<()> {
        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

        if let Some(img) = existing.image() {
            self.media()?.delete(&img.public_id).await?;
        }

        if !self.store.delete(id).await? {
            return Err(AppError::NotFound("Item not found".to_string()));
        }

        tracing::info!("item deleted: id={}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryItemStore;
    use crate::storage::MemoryMediaStore;

    fn service() -> (ItemService, Arc<MemoryItemStore>, Arc<MemoryMediaStore>) {
        let store = Arc::new(MemoryItemStore::new());
        let media = Arc::new(MemoryMediaStore::new());
        let service = ItemService::new(store.clone(), Some(media.clone()));
        (service, store, media)
    }

    fn backpack_request() -> NewItemRequest {
        NewItemRequest {
            title: "Blue Backpack".to_string(),
            description: "Navy blue, one strap broken".to_string(),
            found_location: "Library 2F".to_string(),
            handover_location: None,
            reporter_roll_no: "20071A1205".to_string(),
            category: None,
        }
    }

    fn sample_image() -> ImageUpload {
        ImageUpload {
            filename: "backpack.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            data: vec![0xff, 0xd8, 0xff],
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_pending_and_security_office() {
        let (service, _, _) = service();
        let before = Utc::now();

        let item = service.create_item(backpack_request(), None).await.unwrap();

        assert_eq!(item.status, "pending");
        assert_eq!(item.handover_location, DEFAULT_HANDOVER_LOCATION);
        assert!(item.created_at >= before);
        assert!(item.claimer_roll_no.is_none());
    }

    #[tokio::test]
    async fn test_create_keeps_supplied_handover_location() {
        let (service, _, _) = service();
        let mut req = backpack_request();
        req.handover_location = Some("Main Gate".to_string());

        let item = service.create_item(req, None).await.unwrap();
        assert_eq!(item.handover_location, "Main Gate");
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required_fields() {
        let (service, _, _) = service();
        let mut req = backpack_request();
        req.title = "   ".to_string();

        let err = service.create_item(req, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_is_sorted_newest_first() {
        let (service, _, _) = service();
        for n in 1..=3 {
            let mut req = backpack_request();
            req.title = format!("Item {}", n);
            service.create_item(req, None).await.unwrap();
        }

        let items = service.list_items().await.unwrap();
        assert_eq!(items.len(), 3);
        for pair in items.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
        assert_eq!(items[0].title, "Item 3");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_over_title_and_description() {
        let (service, _, _) = service();
        service.create_item(backpack_request(), None).await.unwrap();
        let mut other = backpack_request();
        other.title = "Water Bottle".to_string();
        other.description = "Steel, dented".to_string();
        service.create_item(other, None).await.unwrap();

        let by_title = service.search_items("BACKPACK").await.unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].title, "Blue Backpack");

        let by_description = service.search_items("dented").await.unwrap();
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].title, "Water Bottle");

        let all = service.search_items("").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_items_since_returns_only_newer_items() {
        let (service, _, _) = service();
        service.create_item(backpack_request(), None).await.unwrap();

        let cursor = Utc::now();
        assert!(service.items_since(cursor).await.unwrap().is_empty());

        let mut req = backpack_request();
        req.title = "Umbrella".to_string();
        service.create_item(req, None).await.unwrap();

        let newer = service.items_since(cursor).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].title, "Umbrella");
    }

    #[tokio::test]
    async fn test_claim_records_claimer() {
        let (service, _, _) = service();
        let item = service.create_item(backpack_request(), None).await.unwrap();

        let claimed = service
            .update_status(&item.id, "claimed", Some("20071A0501"))
            .await
            .unwrap();
        assert_eq!(claimed.status, "claimed");
        assert_eq!(claimed.claimer_roll_no.as_deref(), Some("20071A0501"));
    }

    #[tokio::test]
    async fn test_update_status_rejects_unknown_status() {
        let (service, _, _) = service();
        let item = service.create_item(backpack_request(), None).await.unwrap();

        let err = service
            .update_status(&item.id, "handovered", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_status_unknown_id_is_not_found() {
        let (service, _, _) = service();
        let err = service
            .update_status("missing", "claimed", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    // Nothing blocks claiming an already-claimed item; the second claim
    // overwrites the recorded claimer.
    #[tokio::test]
    async fn test_reclaim_is_permitted_and_overwrites_claimer() {
        let (service, _, _) = service();
        let item = service.create_item(backpack_request(), None).await.unwrap();

        service
            .update_status(&item.id, "claimed", Some("20071A0501"))
            .await
            .unwrap();
        let reclaimed = service
            .update_status(&item.id, "claimed", Some("20071A1290"))
            .await
            .unwrap();
        assert_eq!(reclaimed.claimer_roll_no.as_deref(), Some("20071A1290"));
    }

    #[tokio::test]
    async fn test_create_with_image_attaches_uploaded_asset() {
        let (service, _, media) = service();

        let item = service
            .create_item(backpack_request(), Some(sample_image()))
            .await
            .unwrap();

        let attachment = item.image.unwrap();
        assert_eq!(media.live_handles(), vec![attachment.public_id]);
    }

    #[tokio::test]
    async fn test_failed_insert_releases_uploaded_image() {
        let (service, store, media) = service();
        store.fail_next_insert();

        let err = service
            .create_item(backpack_request(), Some(sample_image()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert!(media.live_handles().is_empty(), "upload should be compensated");
        assert_eq!(media.deleted_handles().len(), 1);
    }

    #[tokio::test]
    async fn test_update_with_new_image_releases_the_old_one() {
        let (service, _, media) = service();
        let item = service
            .create_item(backpack_request(), Some(sample_image()))
            .await
            .unwrap();
        let old_handle = item.image.unwrap().public_id;

        let updated = service
            .update_item(&item.id, UpdateItemRequest::default(), Some(sample_image()))
            .await
            .unwrap();
        let new_handle = updated.image.unwrap().public_id;

        assert_ne!(new_handle, old_handle);
        assert_eq!(media.live_handles(), vec![new_handle]);
        assert!(media.deleted_handles().contains(&old_handle));
    }

    #[tokio::test]
    async fn test_failed_replacement_upload_keeps_old_image() {
        let (service, _, media) = service();
        let item = service
            .create_item(backpack_request(), Some(sample_image()))
            .await
            .unwrap();
        let old_handle = item.image.unwrap().public_id;

        media.fail_next_upload();
        let err = service
            .update_item(&item.id, UpdateItemRequest::default(), Some(sample_image()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let items = service.list_items().await.unwrap();
        assert_eq!(items[0].image.as_ref().unwrap().public_id, old_handle);
        assert_eq!(media.live_handles(), vec![old_handle]);
    }

    #[tokio::test]
    async fn test_update_replaces_only_supplied_fields() {
        let (service, _, _) = service();
        let item = service.create_item(backpack_request(), None).await.unwrap();

        let updated = service
            .update_item(
                &item.id,
                UpdateItemRequest {
                    description: Some("Navy blue, both straps broken".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Blue Backpack");
        assert_eq!(updated.description, "Navy blue, both straps broken");
        assert_eq!(updated.found_location, "Library 2F");
    }

    #[tokio::test]
    async fn test_delete_releases_image_then_removes_item() {
        let (service, _, media) = service();
        let item = service
            .create_item(backpack_request(), Some(sample_image()))
            .await
            .unwrap();

        service.delete_item(&item.id).await.unwrap();

        assert!(service.list_items().await.unwrap().is_empty());
        assert!(media.live_handles().is_empty());
    }

    #[tokio::test]
    async fn test_delete_aborts_when_image_release_fails() {
        let (service, _, media) = service();
        let item = service
            .create_item(backpack_request(), Some(sample_image()))
            .await
            .unwrap();

        media.fail_next_delete();
        let err = service.delete_item(&item.id).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        // Item retained, handle still live: nothing orphaned either way.
        assert_eq!(service.list_items().await.unwrap().len(), 1);
        assert_eq!(media.live_handles().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_not_found() {
        let (service, _, _) = service();
        let err = service.delete_item("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
