//! Integration tests for the diagnosis and history pipeline
//!
//! The inference endpoint is replaced by a small HTTP stub bound to a local
//! port, so these tests exercise the real client, encoder and storage
//! backends end to end.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use plantdoc_core::config::{InferenceConfig, StorageBackend, StorageConfig};
use plantdoc_core::history::HISTORY_CAPACITY;
use plantdoc_core::storage::{self, FileStore, MemoryStore, SqliteStore};
use plantdoc_core::{
    AnalysisFailure, DiagnosisClient, DiagnosisResult, HistoryStore, NewHistoryEntry,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const LEAF_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
const COMPLETIONS_PATH: &str = "/v1/chat/completions";

// ============================================
// Stub HTTP endpoint
// ============================================

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

#[derive(Debug, Clone)]
struct StubResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl StubResponse {
    fn completion(content: &str) -> Self {
        let body = json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        });
        Self {
            status: 200,
            content_type: "application/json",
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    fn image(bytes: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "image/jpeg",
            body: bytes.to_vec(),
        }
    }
}

struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    async fn start(routes: Vec<(&'static str, StubResponse)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let Some(request) = read_request(&mut socket).await else {
                    continue;
                };

                let response = routes
                    .iter()
                    .find(|(path, _)| *path == request.path)
                    .map(|(_, response)| response.clone())
                    .unwrap_or_else(|| StubResponse::status(404, "{}"));
                recorded.lock().unwrap().push(request);

                let head = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    response.status,
                    response.content_type,
                    response.body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&response.body).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        path,
        headers,
        body: buf[header_end..].to_vec(),
    })
}

// ============================================
// Helpers
// ============================================

fn write_leaf(dir: &Path) -> PathBuf {
    let path = dir.join("leaf.jpg");
    std::fs::write(&path, LEAF_JPEG).unwrap();
    path
}

fn inference_config(endpoint: String) -> InferenceConfig {
    plantdoc_core::logging::init_test();
    InferenceConfig {
        endpoint,
        api_key: Some("sk-test".to_string()),
        timeout_secs: 5,
        ..Default::default()
    }
}

fn memory_history() -> HistoryStore {
    plantdoc_core::logging::init_test();
    HistoryStore::new(Box::new(MemoryStore::new()))
}

/// One history per in-process backend
fn in_memory_histories() -> Vec<HistoryStore> {
    plantdoc_core::logging::init_test();
    vec![
        HistoryStore::new(Box::new(MemoryStore::new())),
        HistoryStore::new(Box::new(SqliteStore::open_in_memory().unwrap())),
    ]
}

fn diagnosis(n: usize) -> NewHistoryEntry {
    NewHistoryEntry {
        image_uri: format!("file:///photos/leaf-{}.jpg", n),
        result: DiagnosisResult {
            is_plant: true,
            disease: Some(format!("Disease {}", n)),
            description: None,
            treatment: None,
            confidence: Some(0.8),
        },
        timestamp: format!("2024-01-15T14:{:02}:00.000Z", n % 60),
    }
}

// ============================================
// History Store
// ============================================

#[test]
fn test_append_lists_newest_first_with_unique_ids() {
    let dir = TempDir::new().unwrap();
    let history = HistoryStore::new(Box::new(
        SqliteStore::open(&dir.path().join("history.db")).unwrap(),
    ));

    for n in 0..10 {
        history.append(diagnosis(n)).unwrap();
    }

    let entries = history.list();
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[0].image_uri, "file:///photos/leaf-9.jpg");
    assert_eq!(entries[9].image_uri, "file:///photos/leaf-0.jpg");

    let mut ids: Vec<_> = entries.iter().map(|e| e.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);

    // Ids increase with creation order
    let numeric: Vec<i64> = entries.iter().map(|e| e.numeric_id().unwrap()).collect();
    assert!(numeric.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn test_capacity_evicts_oldest() {
    let history = memory_history();

    for n in 0..HISTORY_CAPACITY {
        history.append(diagnosis(n)).unwrap();
    }
    assert_eq!(history.len(), HISTORY_CAPACITY);

    history.append(diagnosis(HISTORY_CAPACITY)).unwrap();

    let entries = history.list();
    assert_eq!(entries.len(), HISTORY_CAPACITY);
    assert_eq!(
        entries[0].image_uri,
        format!("file:///photos/leaf-{}.jpg", HISTORY_CAPACITY)
    );
    assert_eq!(
        entries.last().unwrap().image_uri,
        "file:///photos/leaf-1.jpg"
    );
    assert!(entries
        .iter()
        .all(|e| e.image_uri != "file:///photos/leaf-0.jpg"));
}

#[test]
fn test_clear_is_idempotent() {
    for history in in_memory_histories() {
        history.clear().unwrap();
        assert!(history.list().is_empty());

        history.append(diagnosis(1)).unwrap();
        history.append(diagnosis(2)).unwrap();
        history.clear().unwrap();
        assert!(history.list().is_empty());

        history.clear().unwrap();
        assert!(history.list().is_empty());
    }
}

#[test]
fn test_history_survives_reopen_on_disk_backends() {
    let dir = TempDir::new().unwrap();

    for config in [
        StorageConfig {
            backend: StorageBackend::Sqlite,
            path: Some(dir.path().join("history.db")),
        },
        StorageConfig {
            backend: StorageBackend::File,
            path: Some(dir.path().join("history")),
        },
    ] {
        let stored = {
            let history = HistoryStore::new(storage::open(&config).unwrap());
            history.append(diagnosis(7)).unwrap()
        };

        let reopened = HistoryStore::new(storage::open(&config).unwrap());
        assert_eq!(reopened.list(), vec![stored]);
    }
}

#[test]
fn test_reads_record_written_by_mobile_app() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("plant_doctor_history.json"),
        r#"[
            {"id":"1705327500000","imageUri":"file:///a.jpg","isPlant":true,"disease":"Leaf Spot",
             "description":"Spots.","treatment":"Fungicide.","confidence":0.85,
             "timestamp":"2024-01-15T14:05:00.000Z"},
            {"id":"1705241100000","imageUri":"file:///b.jpg","isPlant":false,"disease":null,
             "description":null,"treatment":null,"confidence":null,
             "timestamp":"2024-01-14T14:05:00.000Z"}
        ]"#,
    )
    .unwrap();

    let history = HistoryStore::new(Box::new(FileStore::open(dir.path()).unwrap()));
    let entries = history.list();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].result.disease.as_deref(), Some("Leaf Spot"));
    assert!(!entries[1].result.is_plant);

    let added = history.append(diagnosis(3)).unwrap();
    assert!(added.numeric_id().unwrap() > 1705327500000);
    assert_eq!(history.list()[0], added);
}

// ============================================
// Diagnosis Client
// ============================================

#[tokio::test]
async fn test_analyze_fenced_completion_records_history() {
    let dir = TempDir::new().unwrap();
    let image = write_leaf(dir.path());
    let server = StubServer::start(vec![(
        COMPLETIONS_PATH,
        StubResponse::completion(
            "```json\n{\"isPlant\": true, \"disease\": \"Leaf Spot\", \"description\": \"Brown spots.\", \"treatment\": \"Remove infected leaves.\"}\n```",
        ),
    )])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();
    let image_ref = image.to_str().unwrap();

    let result = client.analyze(image_ref).await.unwrap();
    assert!(result.is_plant);
    assert_eq!(result.disease.as_deref(), Some("Leaf Spot"));
    assert_eq!(result.treatment.as_deref(), Some("Remove infected leaves."));
    assert_eq!(result.confidence, Some(0.8));

    let entries = client.history().list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].image_uri, image_ref);
    assert_eq!(entries[0].result, result);
    assert!(chrono::DateTime::parse_from_rfc3339(&entries[0].timestamp).is_ok());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
    assert_eq!(request.header("content-type"), Some("application/json"));

    let body = request.json();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(
        body["messages"][0]["content"][1]["image_url"]["url"],
        format!("data:image/jpeg;base64,{}", STANDARD.encode(LEAF_JPEG))
    );
}

#[tokio::test]
async fn test_analyze_unfenced_completion_keeps_confidence() {
    let dir = TempDir::new().unwrap();
    let image = write_leaf(dir.path());
    let server = StubServer::start(vec![(
        COMPLETIONS_PATH,
        StubResponse::completion(
            r#"{"isPlant":true,"disease":null,"description":"Healthy.","treatment":null,"confidence":0.92}"#,
        ),
    )])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();

    let result = client.analyze(image.to_str().unwrap()).await.unwrap();
    assert!(result.is_healthy());
    assert_eq!(result.confidence, Some(0.92));
}

#[tokio::test]
async fn test_analyze_remote_image() {
    let server = StubServer::start(vec![
        ("/photos/leaf.jpg", StubResponse::image(LEAF_JPEG)),
        (
            COMPLETIONS_PATH,
            StubResponse::completion(r#"{"isPlant":false,"disease":null,"description":null,"treatment":null}"#),
        ),
    ])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();
    let image_url = server.url("/photos/leaf.jpg");

    let result = client.analyze(&image_url).await.unwrap();
    assert!(!result.is_plant);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "GET");
    // The API key only goes to the inference endpoint
    assert!(requests[0].header("authorization").is_none());
    assert_eq!(
        requests[1].json()["messages"][0]["content"][1]["image_url"]["url"],
        format!("data:image/jpeg;base64,{}", STANDARD.encode(LEAF_JPEG))
    );
    assert_eq!(client.history().list()[0].image_uri, image_url);
}

#[tokio::test]
async fn test_transport_failure_leaves_history_unchanged() {
    let dir = TempDir::new().unwrap();
    let image = write_leaf(dir.path());

    // Grab a free port, then close it so the connection is refused
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let history = memory_history();
    history.append(diagnosis(1)).unwrap();

    let client = DiagnosisClient::new(
        inference_config(format!("http://{}{}", addr, COMPLETIONS_PATH)),
        history,
    )
    .unwrap();

    let err = client.analyze(image.to_str().unwrap()).await.unwrap_err();
    assert_eq!(err.analysis_failure(), Some(AnalysisFailure::Request));
    assert_eq!(
        err.to_string(),
        "Failed to analyze the image. Please try again."
    );
    assert_eq!(client.history().len(), 1);
}

#[tokio::test]
async fn test_error_status_is_request_failure() {
    let dir = TempDir::new().unwrap();
    let image = write_leaf(dir.path());
    let server = StubServer::start(vec![(
        COMPLETIONS_PATH,
        StubResponse::status(401, r#"{"error":{"message":"Incorrect API key provided"}}"#),
    )])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();

    let err = client.analyze(image.to_str().unwrap()).await.unwrap_err();
    assert_eq!(err.analysis_failure(), Some(AnalysisFailure::Request));
    assert!(client.history().is_empty());
}

#[tokio::test]
async fn test_malformed_envelope_is_request_failure() {
    let dir = TempDir::new().unwrap();
    let image = write_leaf(dir.path());
    let server = StubServer::start(vec![(
        COMPLETIONS_PATH,
        StubResponse::status(200, r#"{"choices":[]}"#),
    )])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();

    let err = client.analyze(image.to_str().unwrap()).await.unwrap_err();
    assert_eq!(err.analysis_failure(), Some(AnalysisFailure::Request));
    assert!(client.history().is_empty());
}

#[tokio::test]
async fn test_unparseable_completion_is_parse_failure() {
    let dir = TempDir::new().unwrap();
    let image = write_leaf(dir.path());
    let server = StubServer::start(vec![(
        COMPLETIONS_PATH,
        StubResponse::completion("I'm sorry, this does not look like a plant."),
    )])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();

    let err = client.analyze(image.to_str().unwrap()).await.unwrap_err();
    assert_eq!(err.analysis_failure(), Some(AnalysisFailure::Parse));
    assert_eq!(err.to_string(), "Failed to parse the analysis result.");
    assert!(client.history().is_empty());
}

#[tokio::test]
async fn test_missing_image_never_calls_endpoint() {
    let dir = TempDir::new().unwrap();
    let server = StubServer::start(vec![(
        COMPLETIONS_PATH,
        StubResponse::completion(r#"{"isPlant":true}"#),
    )])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();
    let missing = dir.path().join("missing.jpg");

    let err = client
        .analyze(missing.to_str().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.analysis_failure(), Some(AnalysisFailure::Request));
    assert!(server.requests().is_empty());
    assert!(client.history().is_empty());
}

#[tokio::test]
async fn test_analyze_without_saving() {
    let dir = TempDir::new().unwrap();
    let image = write_leaf(dir.path());
    let server = StubServer::start(vec![(
        COMPLETIONS_PATH,
        StubResponse::completion(r#"{"isPlant":true,"disease":"Rust"}"#),
    )])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();

    let result = client
        .analyze_without_saving(image.to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(result.disease.as_deref(), Some("Rust"));
    assert!(client.history().is_empty());
}

#[tokio::test]
async fn test_analyze_and_record_returns_stored_entry() {
    let dir = TempDir::new().unwrap();
    let image = write_leaf(dir.path());
    let server = StubServer::start(vec![(
        COMPLETIONS_PATH,
        StubResponse::completion(r#"{"isPlant":true,"disease":"Blight","confidence":0.7}"#),
    )])
    .await;

    let client =
        DiagnosisClient::new(inference_config(server.url(COMPLETIONS_PATH)), memory_history())
            .unwrap();

    let entry = client
        .analyze_and_record(image.to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(entry.result.confidence, Some(0.7));
    assert_eq!(client.history().get(&entry.id), Some(entry));
}
