//! Call activity persistence boundary.
//!
//! The pipeline only writes a summary and reads/writes memory snapshots
//! through this trait; actual storage lives outside the server.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Pending,
    Completed,
    Failed,
}

/// Metadata for one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub status: ActivityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_state: Option<Value>,
}

impl Activity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ActivityStatus::Pending,
            summary: None,
            call_duration_secs: None,
            transcript: None,
            memory_state: None,
        }
    }
}

#[async_trait::async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Option<Activity>;
    async fn save(&self, activity: Activity);
}

/// In-memory repository, used standalone and in tests
#[derive(Default)]
pub struct InMemoryActivityRepository {
    activities: Mutex<HashMap<String, Activity>>,
}

impl InMemoryActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn find_by_id(&self, id: &str) -> Option<Activity> {
        self.activities.lock().get(id).cloned()
    }

    async fn save(&self, activity: Activity) {
        self.activities
            .lock()
            .insert(activity.id.clone(), activity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_find_round_trip() {
        let repo = InMemoryActivityRepository::new();
        assert!(repo.find_by_id("act-1").await.is_none());

        let mut activity = Activity::new("act-1");
        activity.summary = Some("Caller asked about pricing.".to_string());
        activity.status = ActivityStatus::Completed;
        repo.save(activity).await;

        let found = repo.find_by_id("act-1").await.unwrap();
        assert_eq!(found.status, ActivityStatus::Completed);
        assert!(found.summary.unwrap().contains("pricing"));
    }
}
