use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ApiError, ApiResult, NotesBackend};
use crate::config::ApiOptions;
use crate::model::{
    ChatReply, ChatRequest, Folder, FolderCreate, Label, LabelCreate, Note, NoteCreate,
    NoteUpdate,
};

/// Blocking JSON client for the notes REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(options: &ApiOptions) -> ApiResult<Self> {
        let base_url = normalize_base_url(&options.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs.max(1)))
            .build()
            .map_err(ApiError::Client)?;
        let token = options
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_owned);
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ApiError::InvalidUrl(format!("{}{}", self.base_url, path)))
    }

    fn request(&self, method: Method, path: &str) -> ApiResult<(Url, RequestBuilder)> {
        let url = self.endpoint(path)?;
        let mut builder = self
            .client
            .request(method, url.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok((url, builder))
    }

    fn send(&self, url: &Url, builder: RequestBuilder, resource: &str) -> ApiResult<Response> {
        tracing::debug!(%url, "sending request");
        let response = builder.send().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::not_found(resource));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "request rejected");
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, resource: &str) -> ApiResult<T> {
        let (url, builder) = self.request(Method::GET, path)?;
        let response = self.send(&url, builder, resource)?;
        decode(&url, response)
    }

    fn send_json<B, T>(&self, method: Method, path: &str, body: &B, resource: &str) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (url, builder) = self.request(method, path)?;
        let response = self.send(&url, builder.json(body), resource)?;
        decode(&url, response)
    }

    fn delete(&self, path: &str, resource: &str) -> ApiResult<()> {
        let (url, builder) = self.request(Method::DELETE, path)?;
        // The backend echoes the deleted record; nothing here depends on it.
        self.send(&url, builder, resource)?;
        Ok(())
    }
}

impl NotesBackend for HttpBackend {
    fn list_notes(&self) -> ApiResult<Vec<Note>> {
        self.get_json("notes/", "notes")
    }

    fn get_note(&self, note_id: i64) -> ApiResult<Note> {
        self.get_json(&format!("notes/{note_id}"), &format!("note {note_id}"))
    }

    fn create_note(&self, note: &NoteCreate) -> ApiResult<Note> {
        self.send_json(Method::POST, "notes/", note, "notes")
    }

    fn update_note(&self, note_id: i64, update: &NoteUpdate) -> ApiResult<Note> {
        self.send_json(
            Method::PUT,
            &format!("notes/{note_id}"),
            update,
            &format!("note {note_id}"),
        )
    }

    fn delete_note(&self, note_id: i64) -> ApiResult<()> {
        self.delete(&format!("notes/{note_id}"), &format!("note {note_id}"))
    }

    fn notes_in_folder(&self, folder_id: i64) -> ApiResult<Vec<Note>> {
        self.get_json(
            &format!("notes/by_folder/{folder_id}"),
            &format!("folder {folder_id}"),
        )
    }

    fn list_folders(&self) -> ApiResult<Vec<Folder>> {
        self.get_json("folders/", "folders")
    }

    fn create_folder(&self, folder: &FolderCreate) -> ApiResult<Folder> {
        self.send_json(Method::POST, "folders/", folder, "folders")
    }

    fn list_labels(&self) -> ApiResult<Vec<Label>> {
        self.get_json("labels/", "labels")
    }

    fn create_label(&self, label: &LabelCreate) -> ApiResult<Label> {
        self.send_json(Method::POST, "labels/", label, "labels")
    }

    fn delete_label(&self, label_id: i64) -> ApiResult<()> {
        self.delete(&format!("labels/{label_id}"), &format!("label {label_id}"))
    }

    fn chat(&self, message: &str) -> ApiResult<String> {
        let request = ChatRequest {
            message: message.to_owned(),
        };
        let reply: ChatReply =
            self.send_json(Method::POST, "api/ai-chat", &request, "assistant")?;
        Ok(reply.response)
    }
}

fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> ApiResult<T> {
    response.json::<T>().map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Parses the configured base URL and forces a trailing slash so relative
/// endpoint paths join underneath it instead of replacing the last segment.
fn normalize_base_url(raw: &str) -> ApiResult<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|_| ApiError::InvalidUrl(raw.to_owned()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ApiError::InvalidUrl(raw.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn backend_for(server: &Server, token: Option<&str>) -> HttpBackend {
        let options = ApiOptions {
            base_url: server.url(),
            timeout_secs: 5,
            token: token.map(str::to_owned),
        };
        HttpBackend::new(&options).expect("http backend")
    }

    #[test]
    fn base_url_keeps_path_prefix() -> anyhow::Result<()> {
        let url = normalize_base_url("https://notes.example.com/v1")?;
        assert_eq!(url.join("notes/")?.as_str(), "https://notes.example.com/v1/notes/");
        assert_matches!(
            normalize_base_url("ftp://notes.example.com"),
            Err(ApiError::InvalidUrl(_))
        );
        Ok(())
    }

    #[test]
    fn list_notes_decodes_records_and_sends_token() -> anyhow::Result<()> {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/notes/")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {
                        "id": 1,
                        "title": "Groceries",
                        "content": "milk",
                        "owner_id": 1,
                        "label_id": 2,
                        "label": { "id": 2, "name": "home" },
                        "folders": [{ "id": 5, "name": "Errands" }]
                    },
                    {
                        "id": 2,
                        "title": "Unlabeled",
                        "content": "",
                        "owner_id": 1,
                        "label": null,
                        "folders": []
                    }
                ])
                .to_string(),
            )
            .create();

        let backend = backend_for(&server, Some("secret"));
        let notes = backend.list_notes()?;
        mock.assert();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].label_name(), Some("home"));
        assert_eq!(notes[0].folder_names(), vec!["Errands"]);
        assert_eq!(notes[1].label_key(), None);
        Ok(())
    }

    #[test]
    fn update_sends_partial_body() -> anyhow::Result<()> {
        let mut server = Server::new();
        let mock = server
            .mock("PUT", "/notes/7")
            .match_body(Matcher::Json(json!({ "title": "New title" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": 7,
                    "title": "New title",
                    "content": "body",
                    "owner_id": 1,
                    "label": null,
                    "folders": []
                })
                .to_string(),
            )
            .create();

        let backend = backend_for(&server, None);
        let update = NoteUpdate {
            title: Some("New title".into()),
            ..NoteUpdate::default()
        };
        let note = backend.update_note(7, &update)?;
        mock.assert();
        assert_eq!(note.title, "New title");
        Ok(())
    }

    #[test]
    fn missing_note_maps_to_not_found() {
        let mut server = Server::new();
        let _mock = server
            .mock("DELETE", "/notes/3")
            .with_status(404)
            .with_body(r#"{"detail":"Note not found"}"#)
            .create();

        let backend = backend_for(&server, None);
        let err = backend.delete_note(3).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "note 3 not found");
    }

    #[test]
    fn server_errors_carry_status_and_body() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/labels/")
            .with_status(500)
            .with_body("boom")
            .create();

        let backend = backend_for(&server, None);
        let err = backend.list_labels().unwrap_err();
        assert_matches!(err, ApiError::Status { status: 500, ref body, .. } if body == "boom");
    }

    #[test]
    fn chat_returns_assistant_reply() -> anyhow::Result<()> {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/api/ai-chat")
            .match_body(Matcher::Json(json!({ "message": "hello" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":"hi there"}"#)
            .create();

        let backend = backend_for(&server, None);
        assert_eq!(backend.chat("hello")?, "hi there");
        mock.assert();
        Ok(())
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let mut server = Server::new();
        let _mock = server
            .mock("GET", "/folders/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("not json")
            .create();

        let backend = backend_for(&server, None);
        assert_matches!(backend.list_folders(), Err(ApiError::Decode { .. }));
    }
}
