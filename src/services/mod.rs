pub mod items_service;

pub use items_service::{ItemService, NewItemRequest, UpdateItemRequest, DEFAULT_HANDOVER_LOCATION};
