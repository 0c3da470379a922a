use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::Item;
use crate::services::{ItemService, NewItemRequest, UpdateItemRequest};
use crate::storage::ImageUpload;

// 5MB cap on uploaded images.
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub fn router(service: Arc<ItemService>) -> Router {
    Router::new()
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/search", get(search_items))
        .route("/api/items/new", get(new_items))
        .route("/api/items/:id/status", put(update_status))
        .route("/api/items/:id", put(update_item).delete(delete_item))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

#[derive(Serialize)]
struct ItemEnvelope {
    success: bool,
    item: Item,
}

#[derive(Serialize)]
struct MessageEnvelope {
    success: bool,
    message: String,
}

/// Form fields shared by create and update. Field names mirror the wire
/// schema; an `image` file part carries the attachment bytes.
#[derive(Default)]
struct ItemForm {
    title: Option<String>,
    description: Option<String>,
    found_location: Option<String>,
    handover_location: Option<String>,
    reporter_roll_no: Option<String>,
    category: Option<String>,
    image: Option<ImageUpload>,
}

async fn read_item_form(mut multipart: Multipart) -> AppResult<ItemForm> {
    let mut form = ItemForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidInput(format!("failed to read image: {}", e)))?
                .to_vec();
            // Browsers submit an empty file part when no image was picked.
            if !data.is_empty() {
                form.image = Some(ImageUpload {
                    filename,
                    content_type,
                    data,
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::InvalidInput(format!("failed to read field: {}", e)))?;
            match name.as_str() {
                "title" => form.title = Some(value),
                "description" => form.description = Some(value),
                "foundLocation" => form.found_location = Some(value),
                "handoverLocation" => form.handover_location = Some(value),
                "reporterRollNo" => form.reporter_roll_no = Some(value),
                "category" => form.category = Some(value),
                _ => {}
            }
        }
    }

    Ok(form)
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct CreateItemBody {
    title: String,
    description: String,
    found_location: String,
    handover_location: Option<String>,
    reporter_roll_no: String,
    category: Option<String>,
}

/// Report submissions arrive as JSON or as multipart form data (the latter
/// when an image is attached). Field-level validation stays in the service.
struct CreateItemPayload {
    fields: NewItemRequest,
    image: Option<ImageUpload>,
}

#[async_trait]
impl<S> FromRequest<S> for CreateItemPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::InvalidInput(e.to_string()))?;
            let form = read_item_form(multipart).await?;
            Ok(CreateItemPayload {
                fields: NewItemRequest {
                    title: form.title.unwrap_or_default(),
                    description: form.description.unwrap_or_default(),
                    found_location: form.found_location.unwrap_or_default(),
                    handover_location: form.handover_location,
                    reporter_roll_no: form.reporter_roll_no.unwrap_or_default(),
                    category: form.category,
                },
                image: form.image,
            })
        } else {
            let Json(body): Json<CreateItemBody> = Json::from_request(req, state)
                .await
                .map_err(|e| AppError::InvalidInput(e.to_string()))?;
            Ok(CreateItemPayload {
                fields: NewItemRequest {
                    title: body.title,
                    description: body.description,
                    found_location: body.found_location,
                    handover_location: body.handover_location,
                    reporter_roll_no: body.reporter_roll_no,
                    category: body.category,
                },
                image: None,
            })
        }
    }
}

async fn list_items(State(service): State<Arc<ItemService>>) -> AppResult<Json<Vec<Item>>> {
    Ok(Json(service.list_items().await?))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SearchParams {
    query: Option<String>,
}

async fn search_items(
    State(service): State<Arc<ItemService>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<Item>>> {
    let query = params.query.unwrap_or_default();
    Ok(Json(service.search_items(&query).await?))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SinceParams {
    since: Option<String>,
}

fn parse_since(params: SinceParams) -> AppResult<DateTime<Utc>> {
    let raw = params
        .since
        .ok_or_else(|| AppError::InvalidInput("since is required".to_string()))?;
    let millis: i64 = raw
        .parse()
        .map_err(|_| AppError::InvalidInput("since must be epoch milliseconds".to_string()))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| AppError::InvalidInput("since is out of range".to_string()))
}

async fn new_items(
    State(service): State<Arc<ItemService>>,
    Query(params): Query<SinceParams>,
) -> AppResult<Json<Vec<Item>>> {
    let since = parse_since(params)?;
    Ok(Json(service.items_since(since).await?))
}

async fn create_item(
    State(service): State<Arc<ItemService>>,
    payload: CreateItemPayload,
) -> AppResult<impl IntoResponse> {
    let item = service.create_item(payload.fields, payload.image).await?;
    Ok((
        StatusCode::CREATED,
        Json(ItemEnvelope {
            success: true,
            item,
        }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStatusBody {
    status: String,
    claimer_roll_no: Option<String>,
}

async fn update_status(
    State(service): State<Arc<ItemService>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusBody>, JsonRejection>,
) -> AppResult<Json<ItemEnvelope>> {
    let Json(body) = body.map_err(|e| AppError::InvalidInput(e.to_string()))?;
    let item = service
        .update_status(&id, &body.status, body.claimer_roll_no.as_deref())
        .await?;
    Ok(Json(ItemEnvelope {
        success: true,
        item,
    }))
}

async fn update_item(
    State(service): State<Arc<ItemService>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<ItemEnvelope>> {
    let form = read_item_form(multipart).await?;
    let req = UpdateItemRequest {
        title: form.title,
        description: form.description,
        found_location: form.found_location,
        handover_location: form.handover_location,
        category: form.category,
    };
    let item = service.update_item(&id, req, form.image).await?;
    Ok(Json(ItemEnvelope {
        success: true,
        item,
    }))
}

async fn delete_item(
    State(service): State<Arc<ItemService>>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageEnvelope>> {
    service.delete_item(&id).await?;
    Ok(Json(MessageEnvelope {
        success: true,
        message: "Item deleted successfully".to_string(),
    }))
}
