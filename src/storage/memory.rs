use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::ImageAttachment;

use super::{ImageUpload, MediaStore};

/// In-memory media host fake. Tracks live handles so tests can assert that
/// every upload is eventually released exactly once.
#[derive(Default)]
pub struct MemoryMediaStore {
    live: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_next_upload: AtomicBool,
    fail_next_delete: AtomicBool,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_upload(&self) {
        self.fail_next_upload.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }

    /// Handles uploaded and not yet released.
    pub fn live_handles(&self) -> Vec<String> {
        self.live.lock().unwrap().clone()
    }

    pub fn deleted_handles(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, image: &ImageUpload) -> AppResult<ImageAttachment> {
        if self.fail_next_upload.swap(false, Ordering::SeqCst) {
            return Err(AppError::Storage("simulated upload failure".to_string()));
        }

        let public_id = format!("lost-found-items/{}", Uuid::new_v4());
        self.live.lock().unwrap().push(public_id.clone());
        Ok(ImageAttachment {
            url: format!("https://media.test/{}/{}", public_id, image.filename),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> AppResult<()> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(AppError::Storage("simulated delete failure".to_string()));
        }

        self.live.lock().unwrap().retain(|id| id != public_id);
        self.deleted.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}
