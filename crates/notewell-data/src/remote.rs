//! REST client for the managed backend data service.
//!
//! Speaks the backend's per-table REST dialect: `GET/POST/PATCH/DELETE
//! /rest/v1/<table>` with `column=eq.value` filter predicates and
//! `Prefer: return=representation` on writes. The wire protocol beyond that
//! shape is the backend's business.
//!
//! The change feed here is an ingest bus: the realtime transport (an
//! external collaborator that owns connection and reconnection policy)
//! pushes decoded events in via [`RestService::ingest`]; subscribers read
//! them out through the standard [`DataService::changes`] receiver.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use notewell_core::{
    defaults, ChangeEvent, ChangeFeed, DataService, Error, Flashcard, Folder, HistorySnapshot,
    HistoryVersion, NewFlashcard, NewFolder, NewNote, NewTag, Note, NoteChanges, NoteTagLink,
    Result, Tag,
};

/// Timeout for backend REST calls (seconds).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the REST data service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the backend, e.g. `https://project.example.dev`.
    pub base_url: String,
    /// Project API key sent as the `apikey` header.
    pub api_key: String,
    /// Per-session bearer token of the signed-in user.
    pub bearer: String,
    /// Owner id rows are scoped to.
    pub user_id: String,
}

impl RemoteConfig {
    /// Read connection settings from the environment.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `NOTEWELL_BACKEND_URL` | Backend base URL |
    /// | `NOTEWELL_BACKEND_KEY` | Project API key |
    /// | `NOTEWELL_BACKEND_TOKEN` | Session bearer token |
    /// | `NOTEWELL_USER_ID` | Owner id |
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| Error::Config(format!("{name} is not set")))
        };
        Ok(Self {
            base_url: var("NOTEWELL_BACKEND_URL")?,
            api_key: var("NOTEWELL_BACKEND_KEY")?,
            bearer: var("NOTEWELL_BACKEND_TOKEN")?,
            user_id: var("NOTEWELL_USER_ID")?,
        })
    }
}

/// REST implementation of [`DataService`].
pub struct RestService {
    client: Client,
    config: RemoteConfig,
    feed: ChangeFeed,
}

impl RestService {
    pub fn new(config: RemoteConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            config,
            feed: ChangeFeed::new(defaults::FEED_CAPACITY),
        }
    }

    /// Push one decoded realtime event onto the feed. Called by the
    /// realtime transport collaborator.
    pub fn ingest(&self, event: ChangeEvent) {
        self.feed.emit(event);
    }

    fn request(&self, method: Method, table: &str, query: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}{}", self.config.base_url, table, query);
        self.client
            .request(method, url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.bearer)
    }

    async fn rows<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Vec<T>> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "backend request failed");
            return Err(match status {
                StatusCode::CONFLICT => Error::InvalidInput(body),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(body),
                _ => Error::Backend(format!("{status}: {body}")),
            });
        }
        let body = resp.text().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(Into::into)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<()> {
        self.rows::<serde_json::Value>(builder).await.map(|_| ())
    }

    /// POST rows with `return=representation`, returning the stored rows.
    async fn insert_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        body: serde_json::Value,
    ) -> Result<Vec<T>> {
        self.rows(
            self.request(Method::POST, table, "")
                .header("Prefer", "return=representation")
                .json(&body),
        )
        .await
    }
}

#[async_trait]
impl DataService for RestService {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        let notes: Vec<Note> = self
            .rows(self.request(
                Method::GET,
                "notes",
                "?select=*&order=updated_at_utc.desc",
            ))
            .await?;
        debug!(result_count = notes.len(), "listed notes");
        Ok(notes)
    }

    async fn get_note(&self, id: Uuid) -> Result<Note> {
        let rows: Vec<Note> = self
            .rows(self.request(Method::GET, "notes", &format!("?id=eq.{id}&limit=1")))
            .await?;
        rows.into_iter().next().ok_or(Error::NoteNotFound(id))
    }

    async fn insert_note(&self, req: NewNote) -> Result<Note> {
        let body = json!([{
            "user_id": self.config.user_id,
            "title": req.title,
            "content": req.content,
            "folder_id": req.folder_id,
        }]);
        let note: Note = self
            .insert_rows("notes", body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend("insert returned no representation".into()))?;
        if !req.tag_ids.is_empty() {
            self.set_note_tags(note.id, &req.tag_ids).await?;
        }
        Ok(note)
    }

    async fn update_note(&self, id: Uuid, changes: NoteChanges) -> Result<Note> {
        let mut body = serde_json::Map::new();
        if let Some(title) = changes.title {
            body.insert("title".into(), json!(title));
        }
        if let Some(content) = changes.content {
            body.insert("content".into(), json!(content));
        }
        if let Some(starred) = changes.starred {
            body.insert("starred".into(), json!(starred));
        }
        if let Some(folder_id) = changes.folder_id {
            body.insert("folder_id".into(), json!(folder_id));
        }
        body.insert("updated_at_utc".into(), json!(chrono::Utc::now()));
        let rows: Vec<Note> = self
            .rows(
                self.request(Method::PATCH, "notes", &format!("?id=eq.{id}"))
                    .header("Prefer", "return=representation")
                    .json(&serde_json::Value::Object(body)),
            )
            .await?;
        rows.into_iter().next().ok_or(Error::NoteNotFound(id))
    }

    async fn set_starred(&self, id: Uuid, starred: bool) -> Result<Note> {
        let rows: Vec<Note> = self
            .rows(
                self.request(Method::PATCH, "notes", &format!("?id=eq.{id}"))
                    .header("Prefer", "return=representation")
                    .json(&json!({ "starred": starred })),
            )
            .await?;
        rows.into_iter().next().ok_or(Error::NoteNotFound(id))
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        self.execute(self.request(Method::DELETE, "notes", &format!("?id=eq.{id}")))
            .await
    }

    async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.rows(self.request(Method::GET, "folders", "?select=*&order=name"))
            .await
    }

    async fn insert_folder(&self, req: NewFolder) -> Result<Folder> {
        let body = json!([{
            "user_id": self.config.user_id,
            "name": req.name,
            "color": req.color,
        }]);
        self.insert_rows("folders", body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend("insert returned no representation".into()))
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.rows(self.request(Method::GET, "tags", "?select=*&order=name"))
            .await
    }

    async fn insert_tag(&self, req: NewTag) -> Result<Tag> {
        let body = json!([{
            "user_id": self.config.user_id,
            "name": req.name,
            "color": req.color,
        }]);
        self.insert_rows("tags", body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend("insert returned no representation".into()))
    }

    async fn list_note_tags(&self) -> Result<Vec<NoteTagLink>> {
        self.rows(self.request(Method::GET, "note_tags", "?select=*"))
            .await
    }

    async fn set_note_tags(&self, note_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        self.execute(self.request(
            Method::DELETE,
            "note_tags",
            &format!("?note_id=eq.{note_id}"),
        ))
        .await?;
        if tag_ids.is_empty() {
            return Ok(());
        }
        let body: Vec<serde_json::Value> = tag_ids
            .iter()
            .map(|tag_id| json!({ "note_id": note_id, "tag_id": tag_id }))
            .collect();
        self.execute(
            self.request(Method::POST, "note_tags", "")
                .json(&serde_json::Value::Array(body)),
        )
        .await
    }

    async fn list_history(&self, note_id: Uuid) -> Result<Vec<HistoryVersion>> {
        self.rows(self.request(
            Method::GET,
            "note_history",
            &format!("?note_id=eq.{note_id}&order=version_number.desc"),
        ))
        .await
    }

    async fn append_history(
        &self,
        note_id: Uuid,
        snapshot: HistorySnapshot,
    ) -> Result<HistoryVersion> {
        // Read the current max, then append. The backend's unique
        // (note_id, version_number) index catches a racing writer.
        let latest: Vec<HistoryVersion> = self
            .rows(self.request(
                Method::GET,
                "note_history",
                &format!("?note_id=eq.{note_id}&order=version_number.desc&limit=1"),
            ))
            .await?;
        let next = latest.first().map(|v| v.version_number).unwrap_or(0) + 1;
        let body = json!([{
            "note_id": note_id,
            "title": snapshot.title,
            "content": snapshot.content,
            "tag_ids": snapshot.tag_ids,
            "folder_id": snapshot.folder_id,
            "version_number": next,
        }]);
        self.insert_rows("note_history", body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend("insert returned no representation".into()))
    }

    async fn list_flashcards(&self) -> Result<Vec<Flashcard>> {
        self.rows(self.request(
            Method::GET,
            "flashcards",
            "?select=*&order=created_at_utc.desc",
        ))
        .await
    }

    async fn insert_flashcards(&self, batch: Vec<NewFlashcard>) -> Result<Vec<Flashcard>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let body: Vec<serde_json::Value> = batch
            .iter()
            .map(|card| {
                json!({
                    "user_id": self.config.user_id,
                    "note_id": card.note_id,
                    "question": card.question,
                    "answer": card.answer,
                    "difficulty": card.difficulty,
                })
            })
            .collect();
        self.insert_rows("flashcards", serde_json::Value::Array(body))
            .await
    }

    async fn delete_flashcard(&self, id: Uuid) -> Result<()> {
        self.execute(self.request(Method::DELETE, "flashcards", &format!("?id=eq.{id}")))
            .await
    }

    async fn delete_flashcards_for_note(&self, note_id: Uuid) -> Result<()> {
        self.execute(self.request(
            Method::DELETE,
            "flashcards",
            &format!("?note_id=eq.{note_id}"),
        ))
        .await
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notewell_core::{ChangeOp, Row};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> RemoteConfig {
        RemoteConfig {
            base_url: server.uri(),
            api_key: "test-key".into(),
            bearer: "test-token".into(),
            user_id: "user-1".into(),
        }
    }

    fn note_json(id: Uuid) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": "user-1",
            "title": "Grocery List",
            "content": "",
            "starred": false,
            "folder_id": null,
            "created_at_utc": "2024-01-15T10:00:00Z",
            "updated_at_utc": "2024-01-15T10:00:00Z",
        })
    }

    #[tokio::test]
    async fn test_list_notes_deserializes_rows() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([note_json(id)])))
            .mount(&server)
            .await;

        let svc = RestService::new(config(&server));
        let notes = svc.list_notes().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, id);
        assert_eq!(notes[0].title, "Grocery List");
    }

    #[tokio::test]
    async fn test_update_missing_note_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let svc = RestService::new(config(&server));
        let err = svc
            .update_note(Uuid::new_v4(), NoteChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));
    }

    #[tokio::test]
    async fn test_conflict_maps_to_invalid_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/tags"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let svc = RestService::new(config(&server));
        let err = svc
            .insert_tag(NewTag { name: "work".into(), color: "#fff".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let svc = RestService::new(config(&server));
        let err = svc.list_notes().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_append_history_numbers_from_latest() {
        let server = MockServer::start().await;
        let note_id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/rest/v1/note_history"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": Uuid::new_v4(),
                "note_id": note_id,
                "title": "old",
                "content": "",
                "tag_ids": [],
                "folder_id": null,
                "version_number": 4,
                "created_at_utc": "2024-01-15T10:00:00Z",
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/note_history"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": Uuid::new_v4(),
                "note_id": note_id,
                "title": "new",
                "content": "",
                "tag_ids": [],
                "folder_id": null,
                "version_number": 5,
                "created_at_utc": "2024-01-15T11:00:00Z",
            }])))
            .mount(&server)
            .await;

        let svc = RestService::new(config(&server));
        let version = svc
            .append_history(
                note_id,
                HistorySnapshot {
                    title: "new".into(),
                    content: String::new(),
                    tag_ids: vec![],
                    folder_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(version.version_number, 5);
    }

    #[tokio::test]
    async fn test_ingest_feeds_subscribers() {
        let server = MockServer::start().await;
        let svc = RestService::new(config(&server));
        let mut rx = svc.changes();

        let note: Note = serde_json::from_value(note_json(Uuid::new_v4())).unwrap();
        svc.ingest(ChangeEvent::inserted(Row::Note(note)));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.op, ChangeOp::Insert);
    }
}
