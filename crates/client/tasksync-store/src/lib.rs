//! In-memory task collection synchronized with the remote service.
//!
//! At quiescence (no in-flight operations) the collection exactly matches the
//! server's collection for the current session. Mutations are pessimistic —
//! they change structural content, where a rollback flicker is worse than
//! waiting — except `toggle_complete`, the highest-frequency, lowest-risk
//! interaction, which flips locally first and reverts on failure.
//!
//! The store does not serialize concurrent operations: two in-flight calls on
//! the same task id may reconcile out of order. Accepted limitation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tasksync_core::Task;
use tasksync_core::events::{InvalidationChannel, Subscription};
use tasksync_session::SessionManager;
use tasksync_transport::{ApiClient, ApiError};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("not authenticated")]
    NotAuthenticated,

    /// A request failed; the same message is readable via
    /// [`TaskStore::last_error`].
    #[error("{0}")]
    Request(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Partial update for `PUT /tasks/{id}`. Unset fields are left untouched by
/// the server.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize)]
struct CreateTaskRequest<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ToggleCompleteRequest {
    completed: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteConfirmation {
    #[serde(default)]
    #[allow(dead_code)]
    message: Option<String>,
}

pub struct TaskStore {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    tasks: RwLock<Vec<Task>>,
    last_error: RwLock<Option<String>>,
}

impl TaskStore {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionManager>) -> Self {
        Self {
            api,
            session,
            tasks: RwLock::new(Vec::new()),
            last_error: RwLock::new(None),
        }
    }

    /// Snapshot of the current collection.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    /// The most recent operation failure, if any. Cleared at the start of
    /// every operation.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    async fn begin_op(&self) {
        *self.last_error.write().await = None;
    }

    async fn fail(&self, operation: &str, err: ApiError) -> StoreError {
        let message = err.to_string();
        warn!(operation, "task operation failed: {}", message);
        *self.last_error.write().await = Some(message.clone());
        StoreError::Request(message)
    }

    /// Replace the entire collection with the server's. Triggered at session
    /// establishment and on every invalidation signal; a no-op while
    /// unauthenticated.
    pub async fn refresh(&self) -> StoreResult<()> {
        if !self.session.is_authenticated().await {
            debug!("skipping task refresh while unauthenticated");
            return Ok(());
        }
        self.begin_op().await;
        match self.api.get_json::<Vec<Task>>("/tasks").await {
            Ok(fetched) => {
                debug!(count = fetched.len(), "refreshed tasks");
                *self.tasks.write().await = fetched;
                Ok(())
            }
            Err(err) => Err(self.fail("refresh", err).await),
        }
    }

    /// Create a task and prepend the server-returned representation. The
    /// collection is left unchanged on failure.
    pub async fn create(&self, title: &str, description: Option<&str>) -> StoreResult<Task> {
        if title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        if !self.session.is_authenticated().await {
            return Err(StoreError::NotAuthenticated);
        }
        self.begin_op().await;
        match self
            .api
            .post_json::<_, Task>("/tasks", &CreateTaskRequest { title, description })
            .await
        {
            Ok(created) => {
                self.tasks.write().await.insert(0, created.clone());
                Ok(created)
            }
            Err(err) => Err(self.fail("create", err).await),
        }
    }

    /// Partial update; on success the matching entry is replaced with the
    /// server's representation, preserving its position.
    pub async fn update(&self, id: i64, fields: TaskUpdate) -> StoreResult<Task> {
        if !self.session.is_authenticated().await {
            return Err(StoreError::NotAuthenticated);
        }
        self.begin_op().await;
        match self
            .api
            .put_json::<_, Task>(&format!("/tasks/{id}"), &fields)
            .await
        {
            Ok(updated) => {
                self.reconcile(&updated).await;
                Ok(updated)
            }
            Err(err) => Err(self.fail("update", err).await),
        }
    }

    /// Delete on the server first; the entry is removed locally only upon
    /// success, so a failed delete leaves the task visible in place.
    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        if !self.session.is_authenticated().await {
            return Err(StoreError::NotAuthenticated);
        }
        self.begin_op().await;
        match self
            .api
            .delete_json::<DeleteConfirmation>(&format!("/tasks/{id}"))
            .await
        {
            Ok(_) => {
                self.tasks.write().await.retain(|task| task.id != id);
                Ok(())
            }
            Err(err) => Err(self.fail("delete", err).await),
        }
    }

    /// Optimistic completion toggle: the local flag flips before the request
    /// is issued and reverts to its pre-toggle value if the request fails.
    /// On success the entry is reconciled with the server's representation,
    /// which may carry server-computed fields (e.g. `updated_at`).
    pub async fn toggle_complete(&self, id: i64, completed: bool) -> StoreResult<()> {
        if !self.session.is_authenticated().await {
            return Err(StoreError::NotAuthenticated);
        }
        self.begin_op().await;

        let previous = {
            let mut tasks = self.tasks.write().await;
            tasks.iter_mut().find(|task| task.id == id).map(|task| {
                let previous = task.completed;
                task.completed = completed;
                previous
            })
        };

        match self
            .api
            .patch_json::<_, Task>(
                &format!("/tasks/{id}/complete"),
                &ToggleCompleteRequest { completed },
            )
            .await
        {
            Ok(updated) => {
                self.reconcile(&updated).await;
                Ok(())
            }
            Err(err) => {
                if let Some(previous) = previous {
                    let mut tasks = self.tasks.write().await;
                    if let Some(task) = tasks.iter_mut().find(|task| task.id == id) {
                        task.completed = previous;
                    }
                }
                Err(self.fail("toggle_complete", err).await)
            }
        }
    }

    async fn reconcile(&self, updated: &Task) {
        let mut tasks = self.tasks.write().await;
        if let Some(slot) = tasks.iter_mut().find(|task| task.id == updated.id) {
            *slot = updated.clone();
        }
    }

    /// Subscribe this store to the invalidation channel: every signal
    /// schedules a `refresh` on the current Tokio runtime. The listener
    /// itself stays synchronous; emission must therefore happen from within
    /// a runtime context. Dropping the store ends the subscription's effect.
    pub fn subscribe_invalidations(
        self: &Arc<Self>,
        channel: &InvalidationChannel,
    ) -> Subscription {
        let store = Arc::downgrade(self);
        channel.subscribe(move || {
            if let Some(store) = store.upgrade() {
                tokio::spawn(async move {
                    if let Err(err) = store.refresh().await {
                        debug!(%err, "invalidation-triggered refresh failed");
                    }
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_core::{InMemoryNavigator, Route, User};
    use tasksync_credentials::{CredentialStore, MemoryCredentialStore};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        server: MockServer,
        store: Arc<TaskStore>,
    }

    fn task_json(id: i64, title: &str, completed: bool) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": title,
            "description": null,
            "completed": completed,
        })
    }

    async fn authenticated_harness() -> Harness {
        let server = MockServer::start().await;
        let credentials = Arc::new(MemoryCredentialStore::new());
        credentials.set_token("session-token");
        credentials.set_user(&User {
            id: "u-1".to_string(),
            email: "test@example.com".to_string(),
            name: None,
        });
        let navigator = Arc::new(InMemoryNavigator::new(Route::Dashboard));
        let api = Arc::new(
            ApiClient::new(&server.uri(), credentials.clone(), navigator.clone()).unwrap(),
        );
        let session = Arc::new(SessionManager::new(
            api.clone(),
            credentials,
            navigator,
        ));
        session.initialize().await;
        let store = Arc::new(TaskStore::new(api, session));
        Harness { server, store }
    }

    async fn mount_list(server: &MockServer, tasks: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tasks))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn refresh_replaces_collection() {
        let h = authenticated_harness().await;
        mount_list(
            &h.server,
            serde_json::json!([task_json(2, "Second", false), task_json(1, "First", true)]),
        )
        .await;

        h.store.refresh().await.unwrap();

        let tasks = h.store.tasks().await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, 2);
        assert!(h.store.last_error().await.is_none());
    }

    #[tokio::test]
    async fn refresh_is_a_no_op_while_unauthenticated() {
        let server = MockServer::start().await;
        let credentials = Arc::new(MemoryCredentialStore::new());
        let navigator = Arc::new(InMemoryNavigator::new(Route::Landing));
        let api = Arc::new(
            ApiClient::new(&server.uri(), credentials.clone(), navigator.clone()).unwrap(),
        );
        let session = Arc::new(SessionManager::new(api.clone(), credentials, navigator));
        session.initialize().await;
        let store = TaskStore::new(api, session);

        store.refresh().await.unwrap();
        assert!(store.tasks().await.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_prepends_server_task() {
        let h = authenticated_harness().await;
        mount_list(&h.server, serde_json::json!([task_json(1, "Old", false)])).await;
        h.store.refresh().await.unwrap();

        Mock::given(method("POST"))
            .and(path("/tasks"))
            .and(body_string_contains("Buy milk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_json(7, "Buy milk", false)))
            .mount(&h.server)
            .await;

        let created = h.store.create("Buy milk", None).await.unwrap();
        assert_eq!(created.title, "Buy milk");
        assert!(!created.completed);

        let tasks = h.store.tasks().await;
        assert_eq!(tasks[0].id, 7);
        assert_eq!(tasks.len(), 2);
    }

    #[tokio::test]
    async fn create_rejects_empty_title_without_network() {
        let h = authenticated_harness().await;
        let result = h.store.create("   ", None).await;
        assert!(matches!(result, Err(StoreError::EmptyTitle)));
        assert!(h.server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_failure_leaves_collection_unchanged() {
        let h = authenticated_harness().await;
        mount_list(&h.server, serde_json::json!([task_json(1, "Old", false)])).await;
        h.store.refresh().await.unwrap();

        Mock::given(method("POST"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&h.server)
            .await;

        let result = h.store.create("New", None).await;
        assert!(result.is_err());
        assert_eq!(h.store.tasks().await.len(), 1);
        assert!(h.store.last_error().await.is_some());
    }

    #[tokio::test]
    async fn update_reconciles_in_place() {
        let h = authenticated_harness().await;
        mount_list(
            &h.server,
            serde_json::json!([task_json(1, "First", false), task_json(2, "Second", false)]),
        )
        .await;
        h.store.refresh().await.unwrap();

        Mock::given(method("PUT"))
            .and(path("/tasks/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_json(2, "Renamed", false)))
            .mount(&h.server)
            .await;

        let updated = h
            .store
            .update(
                2,
                TaskUpdate {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");

        let tasks = h.store.tasks().await;
        assert_eq!(tasks[1].title, "Renamed");
        assert_eq!(tasks[0].title, "First");
    }

    #[tokio::test]
    async fn failed_delete_leaves_task_in_prior_position() {
        let h = authenticated_harness().await;
        mount_list(
            &h.server,
            serde_json::json!([task_json(1, "First", false), task_json(2, "Second", false)]),
        )
        .await;
        h.store.refresh().await.unwrap();

        Mock::given(method("DELETE"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&h.server)
            .await;

        assert!(h.store.delete(1).await.is_err());

        let tasks = h.store.tasks().await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, 1);
        assert!(h.store.last_error().await.is_some());
    }

    #[tokio::test]
    async fn successful_delete_removes_task() {
        let h = authenticated_harness().await;
        mount_list(&h.server, serde_json::json!([task_json(1, "First", false)])).await;
        h.store.refresh().await.unwrap();

        Mock::given(method("DELETE"))
            .and(path("/tasks/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message": "Task deleted"})),
            )
            .mount(&h.server)
            .await;

        h.store.delete(1).await.unwrap();
        assert!(h.store.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn toggle_applies_optimistically_and_reconciles() {
        let h = authenticated_harness().await;
        mount_list(&h.server, serde_json::json!([task_json(1, "First", false)])).await;
        h.store.refresh().await.unwrap();

        // Server representation carries a server-computed timestamp.
        let mut body = task_json(1, "First", true);
        body["updated_at"] = serde_json::json!("2026-08-26T12:00:00Z");
        Mock::given(method("PATCH"))
            .and(path("/tasks/1/complete"))
            .and(body_string_contains("\"completed\":true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&h.server)
            .await;

        h.store.toggle_complete(1, true).await.unwrap();

        let tasks = h.store.tasks().await;
        assert!(tasks[0].completed);
        assert!(tasks[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn failed_toggle_reverts_to_pre_toggle_value() {
        let h = authenticated_harness().await;
        mount_list(&h.server, serde_json::json!([task_json(1, "First", false)])).await;
        h.store.refresh().await.unwrap();

        Mock::given(method("PATCH"))
            .and(path("/tasks/1/complete"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&h.server)
            .await;

        assert!(h.store.toggle_complete(1, true).await.is_err());
        assert!(!h.store.tasks().await[0].completed);
        assert!(h.store.last_error().await.is_some());
    }

    #[tokio::test]
    async fn invalidation_signal_triggers_refresh() {
        let h = authenticated_harness().await;
        mount_list(&h.server, serde_json::json!([task_json(9, "From chat", false)])).await;

        let channel = InvalidationChannel::new();
        let _subscription = h.store.subscribe_invalidations(&channel);
        assert_eq!(channel.listener_count(), 1);

        channel.emit();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let tasks = h.store.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, 9);
    }
}
