use crate::models::{BookRecord, BookSummary};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Books generated since startup, oldest first.
#[derive(Default)]
pub struct BookCatalog {
    records: RwLock<Vec<BookRecord>>,
}

impl BookCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: BookRecord) {
        self.records.write().await.push(record);
    }

    pub async fn get(&self, id: Uuid) -> Option<BookRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub async fn list(&self) -> Vec<BookSummary> {
        self.records.read().await.iter().map(BookSummary::from).collect()
    }
}
