// Media host abstraction: the item store and the image host are separate
// systems, so callers sequence uploads and releases explicitly.

pub mod cloudinary;
pub mod memory;

pub use cloudinary::CloudinaryStore;
pub use memory::MemoryMediaStore;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::ImageAttachment;

/// Raw image bytes as received from a multipart request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// External media host storing uploaded images. `upload` returns the public
/// URL plus the handle required to release the resource later.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, image: &ImageUpload) -> AppResult<ImageAttachment>;

    /// Release the hosted resource behind `public_id`.
    async fn delete(&self, public_id: &str) -> AppResult<()>;
}
