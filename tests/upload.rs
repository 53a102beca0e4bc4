//! End-to-end upload scenarios against mock HTTP servers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bytehaul::{
    ErrorKind, SharedError, TransferAsset, TransferClient, TransferController, TransferListener,
    TransferOptions, UploadFileRequest, upload_files,
};

#[derive(Debug, Clone, PartialEq)]
enum FileEvent {
    Start(String),
    Progress(String, u64),
    End(String),
    Error(String, ErrorKind),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<FileEvent>>,
}

impl Recorder {
    fn events(&self) -> Vec<FileEvent> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, matches: impl Fn(&FileEvent) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }
}

impl TransferListener for Recorder {
    fn on_file_start(&self, asset: &TransferAsset) {
        self.events
            .lock()
            .unwrap()
            .push(FileEvent::Start(asset.metadata().name.clone()));
    }

    fn on_file_progress(&self, asset: &TransferAsset, transferred: u64) {
        self.events
            .lock()
            .unwrap()
            .push(FileEvent::Progress(asset.metadata().name.clone(), transferred));
    }

    fn on_file_end(&self, asset: &TransferAsset) {
        self.events
            .lock()
            .unwrap()
            .push(FileEvent::End(asset.metadata().name.clone()));
    }

    fn on_file_error(&self, asset: &TransferAsset, error: &SharedError) {
        self.events
            .lock()
            .unwrap()
            .push(FileEvent::Error(asset.metadata().name.clone(), error.kind()));
    }
}

fn client_with(options: TransferOptions) -> (TransferClient, Arc<Recorder>, Arc<TransferController>) {
    let recorder = Arc::new(Recorder::default());
    let mut controller = TransferController::new();
    controller.add_listener(recorder.clone());
    (
        TransferClient::new(options).unwrap(),
        recorder,
        Arc::new(controller),
    )
}

fn fast_retry() -> bytehaul::TransferOptionsBuilder {
    TransferOptions::builder()
        .retry_base_delay(Duration::from_millis(1))
        .retry_max_delay(Duration::from_millis(5))
}

fn direct_binary_initiate(server: &MockServer, token: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(serde_json::json!({
        "completeURI": "/content/dam.completeUpload.json",
        "folderPath": "/content/dam",
        "files": [{
            "uploadURIs": [format!("{}/upload/part-1", server.uri())],
            "uploadToken": token,
            "minPartSize": 1,
            "maxPartSize": 104857600,
            "mimeType": "image/jpeg"
        }]
    }))
}

#[tokio::test]
async fn direct_binary_upload_single_part() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content/dam.initiateUpload.json"))
        .and(body_string_contains("fileName=file-1.jpg"))
        .and(body_string_contains("fileSize=15"))
        .respond_with(direct_binary_initiate(&server, "upload-token-1"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/part-1"))
        .and(header("content-type", "image/jpeg"))
        .and(header("content-length", "15"))
        .and(wiremock::matchers::body_bytes(&b"hello world 123"[..]))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/content/dam.completeUpload.json"))
        .and(body_string_contains("fileName=file-1.jpg"))
        .and(body_string_contains("fileSize=15"))
        .and(body_string_contains("mimeType=image%2Fjpeg"))
        .and(body_string_contains("createVersion=true"))
        .and(body_string_contains("versionLabel="))
        .and(body_string_contains("versionComment="))
        .and(body_string_contains("replace=false"))
        .and(body_string_contains("uploadToken=upload-token-1"))
        .and(body_string_contains("uploadDuration="))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (client, recorder, controller) = client_with(fast_retry().build());
    let requests = vec![
        UploadFileRequest::builder()
            .file_url(Url::parse(&format!("{}/content/dam/file-1.jpg", server.uri())).unwrap())
            .blob(&b"hello world 123"[..])
            .file_size(15)
            .create_version(true)
            .build()
            .unwrap(),
    ];
    upload_files(&client, requests, controller).await;

    assert_eq!(
        recorder.events(),
        vec![
            FileEvent::Start("file-1.jpg".into()),
            FileEvent::Progress("file-1.jpg".into(), 15),
            FileEvent::End("file-1.jpg".into()),
        ]
    );
}

#[tokio::test]
async fn direct_binary_upload_reads_local_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content/dam.initiateUpload.json"))
        .respond_with(direct_binary_initiate(&server, "token-2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/part-1"))
        .and(wiremock::matchers::body_bytes(&b"hello world 123"[..]))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content/dam.completeUpload.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("file-1.jpg");
    std::fs::write(&source, b"hello world 123").unwrap();

    let (client, recorder, controller) = client_with(fast_retry().build());
    let requests = vec![
        UploadFileRequest::builder()
            .file_url(Url::parse(&format!("{}/content/dam/file-1.jpg", server.uri())).unwrap())
            .file_path(&source)
            .file_size(15)
            .build()
            .unwrap(),
    ];
    upload_files(&client, requests, controller).await;

    assert_eq!(recorder.count(|e| matches!(e, FileEvent::End(_))), 1);
    assert_eq!(recorder.count(|e| matches!(e, FileEvent::Error(..))), 0);
}

#[tokio::test]
async fn create_asset_servlet_chunked_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content/dam.initiateUpload.json"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(serde_json::json!({ "folderPath": "/content/dam" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/content/dam.createasset.html"))
        .and(header("x-chunked-content-type", "image/jpeg"))
        .and(header("x-chunked-total-size", "21"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let payload = b"abcdefghijklmnopqrstu"; // 21 bytes
    let (client, recorder, controller) = client_with(fast_retry().preferred_part_size(17).build());
    let requests = vec![
        UploadFileRequest::builder()
            .file_url(Url::parse(&format!("{}/content/dam/asset-1.jpg", server.uri())).unwrap())
            .blob(&payload[..])
            .file_size(21)
            .build()
            .unwrap(),
    ];
    upload_files(&client, requests, controller).await;

    assert_eq!(
        recorder.events(),
        vec![
            FileEvent::Start("asset-1.jpg".into()),
            FileEvent::Progress("asset-1.jpg".into(), 17),
            FileEvent::Progress("asset-1.jpg".into(), 21),
            FileEvent::End("asset-1.jpg".into()),
        ]
    );

    // Both servlet calls carry the chunk form fields and the file bytes.
    let servlet_requests: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/content/dam.createasset.html")
        .collect();
    assert_eq!(servlet_requests.len(), 2);

    let first = String::from_utf8_lossy(&servlet_requests[0].body).into_owned();
    assert!(first.contains("name=\"_charset_\""));
    assert!(first.contains("name=\"file@Offset\""));
    assert!(first.contains("name=\"chunk@Length\""));
    assert!(first.contains("name=\"file@Length\""));
    assert!(first.contains("abcdefghijklmnopq"));
    assert!(first.contains("filename=\"asset-1.jpg\""));

    let second = String::from_utf8_lossy(&servlet_requests[1].body).into_owned();
    assert!(second.contains("name=\"file@Offset\""));
    assert!(second.contains("rstu"));

    // Offsets and lengths describe the two chunks of a 21 byte file.
    assert!(first.contains("17"));
    assert!(second.contains("21"));
}

#[tokio::test]
async fn initiate_failure_reports_fileerror_and_siblings_proceed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content/broken.initiateUpload.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content/dam.initiateUpload.json"))
        .respond_with(direct_binary_initiate(&server, "token-3"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/part-1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content/dam.completeUpload.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (client, recorder, controller) = client_with(fast_retry().build());
    let requests = vec![
        UploadFileRequest::builder()
            .file_url(Url::parse(&format!("{}/content/broken/one.jpg", server.uri())).unwrap())
            .blob(&b"xx"[..])
            .file_size(2)
            .build()
            .unwrap(),
        UploadFileRequest::builder()
            .file_url(Url::parse(&format!("{}/content/dam/two.jpg", server.uri())).unwrap())
            .blob(&b"hello world 123"[..])
            .file_size(15)
            .build()
            .unwrap(),
    ];
    upload_files(&client, requests, controller).await;

    assert_eq!(
        recorder.count(|e| matches!(e, FileEvent::Error(name, kind)
            if name == "one.jpg" && *kind == ErrorKind::NotFound)),
        1
    );
    assert_eq!(
        recorder.count(|e| matches!(e, FileEvent::End(name) if name == "two.jpg")),
        1
    );
}

#[tokio::test]
async fn complete_failure_suppresses_fileend() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content/dam.initiateUpload.json"))
        .respond_with(direct_binary_initiate(&server, "token-4"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/part-1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content/dam.completeUpload.json"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let (client, recorder, controller) = client_with(fast_retry().build());
    let requests = vec![
        UploadFileRequest::builder()
            .file_url(Url::parse(&format!("{}/content/dam/file-1.jpg", server.uri())).unwrap())
            .blob(&b"hello world 123"[..])
            .file_size(15)
            .build()
            .unwrap(),
    ];
    upload_files(&client, requests, controller).await;

    assert_eq!(recorder.count(|e| matches!(e, FileEvent::End(_))), 0);
    assert_eq!(
        recorder.count(|e| matches!(e, FileEvent::Error(_, kind) if *kind == ErrorKind::Forbidden)),
        1
    );
    // The part itself still transferred before completion failed.
    assert_eq!(
        recorder.count(|e| matches!(e, FileEvent::Progress(_, 15))),
        1
    );
}

#[tokio::test]
async fn upload_part_5xx_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content/dam.initiateUpload.json"))
        .respond_with(direct_binary_initiate(&server, "token-5"))
        .expect(1)
        .mount(&server)
        .await;

    struct FailOnce {
        failed: Mutex<bool>,
    }
    impl wiremock::Respond for FailOnce {
        fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
            let mut failed = self.failed.lock().unwrap();
            if *failed {
                ResponseTemplate::new(201)
            } else {
                *failed = true;
                ResponseTemplate::new(503)
            }
        }
    }

    Mock::given(method("PUT"))
        .and(path("/upload/part-1"))
        .respond_with(FailOnce {
            failed: Mutex::new(false),
        })
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/content/dam.completeUpload.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (client, recorder, controller) = client_with(fast_retry().build());
    let requests = vec![
        UploadFileRequest::builder()
            .file_url(Url::parse(&format!("{}/content/dam/file-1.jpg", server.uri())).unwrap())
            .blob(&b"hello world 123"[..])
            .file_size(15)
            .build()
            .unwrap(),
    ];
    upload_files(&client, requests, controller).await;

    assert_eq!(recorder.count(|e| matches!(e, FileEvent::End(_))), 1);
    assert_eq!(recorder.count(|e| matches!(e, FileEvent::Error(..))), 0);
}
