//! Shared test utilities for kbpick-core integration tests.
//!
//! [`FakeApi`] serves a small in-memory drive and records every remote call.
//! Failures and gates (calls that block until released) are scripted per test.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use kbpick_core::{
    Connection, InodePath, InodeType, KbError, KbResult, KnowledgeApi, KnowledgeBase,
    Organization, Resource, ResourceController, ResourceId, ResourceStatus,
};

/// Knowledge base id carried by `papers/report.pdf` in the sample drive.
pub const REPORT_KB: &str = "6f9619ff-8b86-d011-b42d-00cf4fc964ff";

pub fn resource(id: &str, kind: InodeType, path: &str, day: u32) -> Resource {
    Resource {
        resource_id: ResourceId::new(id),
        inode_type: kind,
        inode_path: InodePath {
            path: path.to_string(),
        },
        status: None,
        knowledge_base_id: None,
        modified_at: Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap(),
    }
}

/// Sample drive:
///
/// ```text
/// /papers/            d-papers
///     2024/           d-2024
///         q1.csv      f-q1
///     report.pdf      f-report (indexed)
///     draft.md        f-draft
/// /notes.txt          f-notes
/// ```
pub fn sample_drive() -> HashMap<Option<String>, Vec<Resource>> {
    let mut report = resource("f-report", InodeType::File, "papers/report.pdf", 4);
    report.status = Some(ResourceStatus::Indexed);
    report.knowledge_base_id = Some(Uuid::parse_str(REPORT_KB).unwrap());

    let mut drive = HashMap::new();
    drive.insert(
        None,
        vec![
            resource("f-notes", InodeType::File, "notes.txt", 2),
            resource("d-papers", InodeType::Directory, "papers", 1),
        ],
    );
    drive.insert(
        Some("d-papers".to_string()),
        vec![
            resource("f-draft", InodeType::File, "papers/draft.md", 6),
            report,
            resource("d-2024", InodeType::Directory, "papers/2024", 3),
        ],
    );
    drive.insert(
        Some("d-2024".to_string()),
        vec![resource("f-q1", InodeType::File, "papers/2024/q1.csv", 5)],
    );
    drive
}

fn server_error(endpoint: &str) -> KbError {
    KbError::UnexpectedStatus {
        endpoint: endpoint.to_string(),
        status: 500,
        body: "internal error".to_string(),
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub drive: Mutex<HashMap<Option<String>, Vec<Resource>>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_listing: Mutex<bool>,
    pub fail_create_for: Mutex<HashSet<String>>,
    pub fail_sync: Mutex<bool>,
    pub fail_delete: Mutex<bool>,
    /// Blocks the next listing call until notified.
    pub hold_next_listing: Mutex<Option<Arc<Notify>>>,
    /// Blocks every knowledge base creation until notified.
    pub hold_create: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn with_sample_drive() -> Arc<Self> {
        let api = Self::default();
        *api.drive.lock().unwrap() = sample_drive();
        Arc::new(api)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn hold_next_listing(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_next_listing.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn hold_create(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_create.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl KnowledgeApi for FakeApi {
    async fn list_connections(&self) -> KbResult<Vec<Connection>> {
        self.record("connections".into());
        Ok(vec![Connection {
            connection_id: "conn-1".into(),
            name: Some("Google Drive".into()),
            connection_provider: Some("gdrive".into()),
            created_at: None,
        }])
    }

    async fn list_children(&self, parent: Option<&ResourceId>) -> KbResult<Vec<Resource>> {
        let key = parent.map(|p| p.as_str().to_string());
        self.record(format!("list:{}", key.as_deref().unwrap_or("root")));

        let gate = self.hold_next_listing.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if *self.fail_listing.lock().unwrap() {
            return Err(server_error("/children"));
        }
        Ok(self
            .drive
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_knowledge_base(&self, resource_id: &ResourceId) -> KbResult<KnowledgeBase> {
        self.record(format!("create:{}", resource_id));

        let gate = self.hold_create.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_create_for.lock().unwrap().contains(resource_id.as_str()) {
            return Err(server_error("/knowledge_bases"));
        }
        Ok(KnowledgeBase {
            knowledge_base_id: Uuid::new_v4(),
            name: Some(format!("Knowledge Base for {}", resource_id)),
        })
    }

    async fn current_organization(&self) -> KbResult<Organization> {
        self.record("org".into());
        Ok(Organization {
            org_id: "org-1".into(),
        })
    }

    async fn trigger_sync(&self, knowledge_base_id: &Uuid, org_id: &str) -> KbResult<()> {
        self.record(format!("sync:{}:{}", knowledge_base_id, org_id));
        if *self.fail_sync.lock().unwrap() {
            return Err(server_error("/knowledge_bases/sync/trigger"));
        }
        Ok(())
    }

    async fn delete_knowledge_base_resource(
        &self,
        knowledge_base_id: &Uuid,
        resource_path: &str,
    ) -> KbResult<()> {
        self.record(format!("delete:{}:{}", knowledge_base_id, resource_path));
        if *self.fail_delete.lock().unwrap() {
            return Err(server_error("/knowledge_bases/resources"));
        }
        Ok(())
    }
}

pub fn controller(api: &Arc<FakeApi>) -> Arc<ResourceController> {
    let api: Arc<dyn KnowledgeApi> = api.clone();
    Arc::new(ResourceController::new(api))
}
