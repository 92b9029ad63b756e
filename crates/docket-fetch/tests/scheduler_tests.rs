//! Integration tests for the fetch scheduler
//!
//! A minimal scripted HTTP server stands in for the archive: each incoming
//! request consumes the next status code from the script (then 200 with a
//! small body once the script is exhausted).

use chrono::NaiveDate;
use docket_domain::traits::Manifest;
use docket_domain::{reason, DocumentRecord, Era, Stage};
use docket_fetch::{FetchConfig, FetchScheduler};
use docket_manifest::ManifestStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const BODY: &[u8] = b"SEC NEWS DIGEST\n\nADMINISTRATIVE PROCEEDINGS\n";

struct TestServer {
    addr: std::net::SocketAddr,
    requests: Arc<AtomicUsize>,
}

/// Start a server that answers each request with the next scripted status.
async fn start_server(script: Vec<u16>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let script = Arc::new(Mutex::new(script.into_iter().collect::<VecDeque<u16>>()));
    let requests = Arc::new(AtomicUsize::new(0));

    let requests_handle = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let script = Arc::clone(&script);
            let requests = Arc::clone(&requests_handle);
            tokio::spawn(async move {
                // Read the request head; the scheduler only sends GETs.
                let mut buf = vec![0u8; 4096];
                let mut head = Vec::new();
                loop {
                    let n = match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                requests.fetch_add(1, Ordering::SeqCst);
                let status = script.lock().unwrap().pop_front().unwrap_or(200);
                let (line, body): (&str, &[u8]) = match status {
                    200 => ("200 OK", BODY),
                    204 => ("200 OK", b""), // used to simulate an empty body
                    404 => ("404 Not Found", b""),
                    500 => ("500 Internal Server Error", b""),
                    503 => ("503 Service Unavailable", b""),
                    _ => ("500 Internal Server Error", b""),
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    line,
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.write_all(body).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    TestServer { addr, requests }
}

fn test_config() -> FetchConfig {
    FetchConfig {
        host_interval_ms: 0,
        max_retries: 3,
        concurrency: 3,
        timeout_secs: 5,
        backoff_ms: 1,
        ..FetchConfig::default()
    }
}

fn record_for(server: &TestServer, day: u32) -> DocumentRecord {
    let date = NaiveDate::from_ymd_opt(1995, 6, day).unwrap();
    DocumentRecord::register(
        Era::Text,
        date,
        format!("http://{}/1995/dig06{:02}95.txt", server.addr, day),
    )
}

fn setup() -> (Arc<Mutex<ManifestStore>>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manifest = Arc::new(Mutex::new(ManifestStore::new(":memory:").unwrap()));
    (manifest, dir)
}

#[tokio::test]
async fn test_successful_fetch_records_download() {
    let server = start_server(vec![200]).await;
    let (manifest, dir) = setup();
    let scheduler = FetchScheduler::new(test_config(), Arc::clone(&manifest), dir.path());

    let rec = record_for(&server, 1);
    let stats = scheduler.run(vec![rec.clone()]).await.unwrap();
    assert_eq!(stats.downloaded, 1);
    assert_eq!(stats.failed, 0);

    let loaded = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    assert_eq!(loaded.stage, Stage::Downloaded);
    assert_eq!(loaded.byte_size, Some(BODY.len() as u64));
    assert_eq!(loaded.fetch_retries, 0);
    assert!(loaded.downloaded_at.is_some());

    let raw = loaded.raw_path.unwrap();
    assert!(raw.ends_with("digest_1995-06-01.txt"), "path was {}", raw);
    assert_eq!(std::fs::read(raw).unwrap(), BODY);
}

#[tokio::test]
async fn test_not_found_fails_immediately_without_retry() {
    let server = start_server(vec![404]).await;
    let (manifest, dir) = setup();
    let scheduler = FetchScheduler::new(test_config(), Arc::clone(&manifest), dir.path());

    let rec = record_for(&server, 2);
    let stats = scheduler.run(vec![rec.clone()]).await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(server.requests.load(Ordering::SeqCst), 1);

    let loaded = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    assert_eq!(loaded.stage, Stage::Failed);
    assert_eq!(loaded.failed_stage, Some(Stage::Registered));
    assert_eq!(reason::code(loaded.last_error.as_deref().unwrap()), reason::NOT_FOUND);
    assert_eq!(loaded.fetch_retries, 0);
}

#[tokio::test]
async fn test_transient_failures_then_success_records_retry_count() {
    // Two 5xx responses, then success: retry count must be exactly 2.
    let server = start_server(vec![503, 500, 200]).await;
    let (manifest, dir) = setup();
    let scheduler = FetchScheduler::new(test_config(), Arc::clone(&manifest), dir.path());

    let rec = record_for(&server, 3);
    let stats = scheduler.run(vec![rec.clone()]).await.unwrap();
    assert_eq!(stats.downloaded, 1);

    let loaded = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    assert_eq!(loaded.stage, Stage::Downloaded);
    assert_eq!(loaded.fetch_retries, 2);
    assert_eq!(server.requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_ceiling_is_exact() {
    // Every attempt fails transiently: the document must fail after
    // exactly max_retries retries (max_retries + 1 requests), never more.
    let server = start_server(vec![503; 16]).await;
    let (manifest, dir) = setup();
    let scheduler = FetchScheduler::new(test_config(), Arc::clone(&manifest), dir.path());

    let rec = record_for(&server, 4);
    let stats = scheduler.run(vec![rec.clone()]).await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(server.requests.load(Ordering::SeqCst), 4);

    let loaded = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    assert_eq!(loaded.stage, Stage::Failed);
    assert_eq!(
        reason::code(loaded.last_error.as_deref().unwrap()),
        reason::FETCH_EXHAUSTED
    );
    assert_eq!(loaded.fetch_retries, 3);
}

#[tokio::test]
async fn test_empty_body_is_a_permanent_failure() {
    let server = start_server(vec![204]).await;
    let (manifest, dir) = setup();
    let scheduler = FetchScheduler::new(test_config(), Arc::clone(&manifest), dir.path());

    let rec = record_for(&server, 5);
    let stats = scheduler.run(vec![rec.clone()]).await.unwrap();
    assert_eq!(stats.failed, 1);

    let loaded = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    assert_eq!(reason::code(loaded.last_error.as_deref().unwrap()), reason::EMPTY_BODY);
}

#[tokio::test]
async fn test_downloaded_documents_are_skipped_on_rerun() {
    let server = start_server(vec![200]).await;
    let (manifest, dir) = setup();
    let scheduler = FetchScheduler::new(test_config(), Arc::clone(&manifest), dir.path());

    let rec = record_for(&server, 6);
    scheduler.run(vec![rec.clone()]).await.unwrap();
    assert_eq!(server.requests.load(Ordering::SeqCst), 1);

    // Re-run with the manifest's view of the record: no second request.
    let current = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    let stats = scheduler.run(vec![current]).await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(server.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_documents_are_skipped_unless_retry_requested() {
    let server = start_server(vec![404, 200]).await;
    let (manifest, dir) = setup();
    let scheduler = FetchScheduler::new(test_config(), Arc::clone(&manifest), dir.path());

    let rec = record_for(&server, 7);
    scheduler.run(vec![rec.clone()]).await.unwrap();

    let failed = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    assert_eq!(failed.stage, Stage::Failed);

    // Default policy: known failures stay failed.
    let stats = scheduler.run(vec![failed.clone()]).await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(server.requests.load(Ordering::SeqCst), 1);

    // With retry_failed the document is re-fetched and can advance.
    let mut retry_config = test_config();
    retry_config.retry_failed = true;
    let retry_scheduler = FetchScheduler::new(retry_config, Arc::clone(&manifest), dir.path());
    let stats = retry_scheduler.run(vec![failed]).await.unwrap();
    assert_eq!(stats.downloaded, 1);

    let loaded = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    assert_eq!(loaded.stage, Stage::Downloaded);
    assert_eq!(loaded.failed_stage, None);
}

#[tokio::test]
async fn test_bad_url_fails_without_network() {
    let (manifest, dir) = setup();
    let scheduler = FetchScheduler::new(test_config(), Arc::clone(&manifest), dir.path());

    let date = NaiveDate::from_ymd_opt(1995, 6, 8).unwrap();
    let rec = DocumentRecord::register(Era::Text, date, "not a url at all");
    let stats = scheduler.run(vec![rec.clone()]).await.unwrap();
    assert_eq!(stats.failed, 1);

    let loaded = manifest.lock().unwrap().get(&rec.id).unwrap().unwrap();
    assert_eq!(reason::code(loaded.last_error.as_deref().unwrap()), reason::BAD_URL);
}
