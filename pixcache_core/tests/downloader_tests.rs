//! Coalescing behaviour of the downloader over a scripted transport

use pixcache_core::{DownloadError, Downloader};
use pixcache_test_utils::MockTransport;
use std::sync::Arc;
use std::time::Duration;

const URL: &str = "https://img.example.com/banner.webp";

fn slow_transport() -> Arc<MockTransport> {
    Arc::new(MockTransport::new().with_delay(Duration::from_millis(50)))
}

#[tokio::test]
async fn test_many_concurrent_callers_share_one_transport_call() {
    let transport = slow_transport();
    transport.serve(URL, vec![1u8; 128], Some("\"b1\""));
    let downloader = Arc::new(Downloader::new(transport.clone()));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let downloader = Arc::clone(&downloader);
            tokio::spawn(async move { downloader.fetch(URL, None).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }

    assert_eq!(transport.call_count(), 1);
    let first = outcomes[0].clone().unwrap();
    assert_eq!(first.validator.as_deref(), Some("\"b1\""));
    assert!(outcomes.iter().all(|o| o.as_ref() == Ok(&first)));
    assert_eq!(downloader.in_flight_count(), 0);
}

#[tokio::test]
async fn test_distinct_resources_are_not_coalesced() {
    let transport = slow_transport();
    transport.serve(URL, vec![1u8; 8], None);
    transport.serve("https://img.example.com/other.webp", vec![2u8; 8], None);
    let downloader = Downloader::new(transport.clone());

    let (a, b) = tokio::join!(
        downloader.fetch(URL, None),
        downloader.fetch("https://img.example.com/other.webp", None)
    );

    assert_ne!(a.unwrap(), b.unwrap());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_not_changed_reaches_every_waiter() {
    let transport = slow_transport();
    transport.serve(URL, vec![1u8; 8], Some("\"b1\""));
    let downloader = Downloader::new(transport.clone());

    let (a, b) = tokio::join!(
        downloader.fetch(URL, Some("\"b1\"")),
        downloader.fetch(URL, Some("\"b1\""))
    );

    assert_eq!(a, Err(DownloadError::NotChanged));
    assert_eq!(b, Err(DownloadError::NotChanged));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_retry_after_failure_reaches_transport_again() {
    let transport = slow_transport();
    transport.fail_with_status(URL, 503);
    let downloader = Downloader::new(transport.clone());

    let error = downloader.fetch(URL, None).await.unwrap_err();
    assert!(error.is_transient());

    transport.serve(URL, vec![3u8; 8], None);
    assert!(downloader.fetch(URL, None).await.is_ok());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_plain_fetch_joins_revalidation_in_flight() {
    let transport = slow_transport();
    transport.serve(URL, vec![1u8; 8], Some("\"b1\""));
    let downloader = Downloader::new(transport.clone());

    let (conditional, plain) = tokio::join!(
        downloader.fetch(URL, Some("\"b1\"")),
        downloader.fetch(URL, None)
    );

    assert_eq!(transport.call_count(), 1);
    assert_eq!(conditional, Err(DownloadError::NotChanged));
    assert_eq!(plain, Err(DownloadError::NotChanged));
    assert_eq!(downloader.in_flight_count(), 0);
}
