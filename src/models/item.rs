use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Item lifecycle state. Two-state machine: every item starts out
/// `pending`; recording a claim moves it to `claimed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Claimed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Claimed => "claimed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "claimed" => Ok(ItemStatus::Claimed),
            _ => Err(AppError::InvalidInput(
                "status must be 'pending' or 'claimed'".to_string(),
            )),
        }
    }
}

/// Handle into the external media host: public URL for display plus the
/// host-side id needed to release the resource later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub url: String,
    pub public_id: String,
}

/// Database row shape. Image columns are flat here; the API type nests them.
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub found_location: String,
    pub handover_location: String,
    pub reporter_roll_no: String,
    pub status: String,
    pub claimer_roll_no: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub image_public_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ItemRow {
    pub fn image(&self) -> Option<ImageAttachment> {
        match (&self.image_url, &self.image_public_id) {
            (Some(url), Some(public_id)) => Some(ImageAttachment {
                url: url.clone(),
                public_id: public_id.clone(),
            }),
            _ => None,
        }
    }
}

/// Wire representation returned by the REST surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub description: String,
    pub found_location: String,
    pub handover_location: String,
    pub reporter_roll_no: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimer_roll_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
    pub created_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        let image = row.image();
        Item {
            id: row.id,
            title: row.title,
            description: row.description,
            found_location: row.found_location,
            handover_location: row.handover_location,
            reporter_roll_no: row.reporter_roll_no,
            status: row.status,
            claimer_roll_no: row.claimer_roll_no,
            category: row.category,
            image,
            created_at: row.created_at,
        }
    }
}

/// Fields for a new item, validated and defaulted by the service before
/// they reach the store. Status is always `pending` at insert.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub found_location: String,
    pub handover_location: String,
    pub reporter_roll_no: String,
    pub category: Option<String>,
    pub image: Option<ImageAttachment>,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub found_location: Option<String>,
    pub handover_location: Option<String>,
    pub category: Option<String>,
    pub image: Option<ImageAttachment>,
}
