use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinaryConfig;
use crate::error::{AppError, AppResult};
use crate::models::ImageAttachment;

use super::{ImageUpload, MediaStore};

pub struct CloudinaryStore {
    client: Client,
    config: CloudinaryConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Storage(format!("Cloudinary client error: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/{}",
            self.config.cloud_name, action
        )
    }

    /// SHA-256 signature over the alphabetically ordered request params,
    /// with the API secret appended (requires the account's
    /// signature_algorithm to be set to sha256).
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut pairs: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();

        let mut hasher = Sha256::new();
        hasher.update(pairs.join("&").as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, image: &ImageUpload) -> AppResult<ImageAttachment> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", &self.config.folder),
            ("timestamp", &timestamp),
        ]);

        let file_part = Part::bytes(image.data.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.content_type)
            .map_err(|e| AppError::Storage(format!("Cloudinary upload failed: {}", e)))?;

        let form = Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.config.folder.clone())
            .text("signature", signature)
            .part("file", file_part);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Cloudinary upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "Cloudinary upload failed: status={}, body={}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Cloudinary upload response error: {}", e)))?;

        tracing::info!(
            "Cloudinary upload: public_id={}, bytes={}",
            uploaded.public_id,
            image.data.len()
        );

        Ok(ImageAttachment {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> AppResult<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", &timestamp)]);

        let form = Form::new()
            .text("public_id", public_id.to_string())
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Cloudinary delete failed: {}", e)))?;

        let destroyed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Cloudinary delete response error: {}", e)))?;

        // "not found" counts as released: the resource is already gone.
        if destroyed.result != "ok" && destroyed.result != "not found" {
            return Err(AppError::Storage(format!(
                "Cloudinary delete failed: result={}",
                destroyed.result
            )));
        }

        tracing::info!("Cloudinary delete: public_id={}", public_id);
        Ok(())
    }
}
