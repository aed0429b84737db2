//! Video metadata repository
//!
//! DynamoDB-backed record store. One table keyed by `videoId`; every video
//! item carries a constant `recordType = "video"` attribute so the
//! `recordType, createdAt` global secondary index serves the
//! reverse-chronological listing. The "latest completed video" pointer is a
//! singleton item under the reserved key `videoId = "latest"` with
//! `recordType = "pointer"`, which keeps it out of the listing index query.

use std::sync::Arc;

use aws_sdk_dynamodb::Client;

pub mod repository;

/// GSI used by `list_videos`.
pub const LISTING_INDEX: &str = "recordType-createdAt-index";

/// Reserved primary key of the latest-pointer item.
pub const LATEST_POINTER_KEY: &str = "latest";

/// Errors surfaced by the metadata repository.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("video already exists: {0}")]
    AlreadyExists(String),
    #[error("video not found: {0}")]
    NotFound(String),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("invalid cursor")]
    InvalidCursor,
    #[error("dynamodb request failed: {0}")]
    Request(String),
}

/// Repository handle bound to one table.
#[derive(Clone)]
pub struct VideoRepository {
    client: Arc<Client>,
    table: String,
}

impl VideoRepository {
    pub async fn new(table: String) -> Self {
        let aws_config = aws_config::load_from_env().await;
        Self {
            client: Arc::new(Client::new(&aws_config)),
            table,
        }
    }

    pub fn from_client(client: Client, table: String) -> Self {
        Self {
            client: Arc::new(client),
            table,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}
