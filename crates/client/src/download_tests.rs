use std::time::Duration;

use redmine_sweep_core::{ApiSettings, Attachment, AttachmentDownloader, Credentials, RetryPolicy, RunContext};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::RedmineClient;

fn client(base_url: String) -> RedmineClient {
    let fast = RetryPolicy::new(1, Duration::from_secs(5), Duration::ZERO, Duration::ZERO);
    RedmineClient::new(&ApiSettings {
        base_url,
        api_key: Some("list-key".to_owned()),
        credentials: Some(Credentials { username: "admin".to_owned(), password: "secret".to_owned() }),
        verify_ssl: true,
        list_retry: fast,
        download_retry: fast,
    })
    .unwrap()
}

fn attachment(content_url: String) -> Attachment {
    Attachment {
        id: 5,
        filename: "report%20final.pdf".to_owned(),
        content_url,
        filesize: 11,
        content_type: Some("application/pdf".to_owned()),
        description: None,
        author: None,
        created_on: None,
    }
}

#[tokio::test]
async fn test_download_writes_file_with_basic_auth() {
    let server = MockServer::start().await;
    let client = client(server.uri());
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/attachments/download/5/report.pdf"))
        .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let att = attachment(format!("{}/attachments/download/5/report.pdf", server.uri()));
    let ok = client.download_attachment(&att, dir.path(), "report final.pdf", &RunContext::new()).await;

    assert!(ok);
    let content = std::fs::read(dir.path().join("report final.pdf")).unwrap();
    assert_eq!(content, b"hello world");
}

#[tokio::test]
async fn test_download_resolves_relative_content_url() {
    let server = MockServer::start().await;
    let client = client(server.uri());
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/attachments/download/5/r.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
        .mount(&server)
        .await;

    let att = attachment("/attachments/download/5/r.bin".to_owned());
    assert!(client.download_attachment(&att, dir.path(), "r.bin", &RunContext::new()).await);
    assert_eq!(std::fs::read(dir.path().join("r.bin")).unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_download_retries_then_succeeds() {
    let server = MockServer::start().await;
    let client = client(server.uri());
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/attachments/download/5/x.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/attachments/download/5/x.txt"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let att = attachment(format!("{}/attachments/download/5/x.txt", server.uri()));
    assert!(client.download_attachment(&att, dir.path(), "x.txt", &RunContext::new()).await);
}

#[tokio::test]
async fn test_download_failure_returns_false_and_leaves_no_file() {
    let server = MockServer::start().await;
    let client = client(server.uri());
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/attachments/download/5/gone.txt"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .expect(2)
        .mount(&server)
        .await;

    let att = attachment(format!("{}/attachments/download/5/gone.txt", server.uri()));
    let ok = client.download_attachment(&att, dir.path(), "gone.txt", &RunContext::new()).await;

    assert!(!ok);
    assert!(!dir.path().join("gone.txt").exists());
}

#[tokio::test]
async fn test_download_cancelled_mid_request_returns_false_and_leaves_no_file() {
    let server = MockServer::start().await;
    let client = client(server.uri());
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/attachments/download/5/slow.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0; 64]).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let ctx = RunContext::new();
    let trigger = ctx.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        redmine_sweep_core::cancel::cancel(&trigger);
    });

    let att = attachment(format!("{}/attachments/download/5/slow.bin", server.uri()));
    let start = std::time::Instant::now();
    let ok = client.download_attachment(&att, dir.path(), "slow.bin", &ctx).await;

    assert!(!ok);
    // well before the 5s attempt timeout
    assert!(start.elapsed() < Duration::from_secs(4));
    assert!(!dir.path().join("slow.bin").exists());
}
