use bytes::Bytes;
use range_dl::{
    EventSink, FallbackError, FallbackStreamer, TransferError, TransferEvent, TransferHandle,
};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 241) as u8).collect()
}

#[tokio::test]
async fn streams_whole_body_with_monotonic_progress() {
    let server = MockServer::start().await;
    let data = payload(64 * 1024);
    Mock::given(method("GET"))
        .and(path("/file/abc/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let (events, mut rx) = EventSink::channel();
    let handle = TransferHandle::new(events);
    let streamer = FallbackStreamer::new(reqwest::Client::new(), server.uri());

    let bytes = streamer.fetch(Some("abc"), 0, &handle).await.unwrap();
    assert_eq!(bytes, Bytes::from(data));

    let mut progress = Vec::new();
    let mut speeds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            TransferEvent::Progress { percent } => progress.push(percent),
            TransferEvent::Speed { bytes_per_second } => speeds.push(bytes_per_second),
            TransferEvent::FallbackStarted { .. } => {}
        }
    }
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(progress.last().copied(), Some(100.0));
    assert!(!speeds.is_empty());
    assert!(speeds.iter().all(|s| *s > 0.0));
}

#[tokio::test]
async fn offset_sends_open_ended_range_and_requires_partial_content() {
    let server = MockServer::start().await;
    let data = payload(1000);
    Mock::given(method("GET"))
        .and(path("/file/abc/download"))
        .and(header("range", "bytes=400-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 400-999/1000")
                .set_body_bytes(data[400..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let streamer = FallbackStreamer::new(reqwest::Client::new(), server.uri());
    let rest = streamer
        .fetch(Some("abc"), 400, &TransferHandle::default())
        .await
        .unwrap();
    assert_eq!(rest, Bytes::from(data[400..].to_vec()));
}

#[tokio::test]
async fn full_response_to_a_continuation_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/abc/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload(1000)))
        .mount(&server)
        .await;

    let streamer = FallbackStreamer::new(reqwest::Client::new(), server.uri());
    let result = streamer
        .fetch(Some("abc"), 400, &TransferHandle::default())
        .await;
    assert_eq!(
        result,
        Err(TransferError::Fallback(FallbackError::Status(200)))
    );
}

#[tokio::test]
async fn proxy_error_status_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/gone/download"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"success": false, "error": "not found"})),
        )
        .mount(&server)
        .await;

    let streamer = FallbackStreamer::new(reqwest::Client::new(), server.uri());
    let err = streamer
        .fetch(Some("gone"), 0, &TransferHandle::default())
        .await
        .unwrap_err();

    assert_eq!(err, TransferError::Fallback(FallbackError::Status(404)));
    assert!(err.is_terminal());
    assert!(err
        .to_string()
        .starts_with("both primary and fallback downloads failed"));
}

/// One-shot server that announces `announced` bytes, sends `sent` and hangs up.
async fn serve_truncated(announced: u64, sent: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let head = format!("HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n", announced);
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&vec![7u8; sent]).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    addr
}

#[tokio::test]
async fn truncated_body_fails_the_fallback() {
    let addr = serve_truncated(100, 40).await;

    let streamer = FallbackStreamer::new(reqwest::Client::new(), format!("http://{}", addr));
    let result = streamer
        .fetch(Some("abc"), 0, &TransferHandle::default())
        .await;

    assert!(matches!(
        result,
        Err(TransferError::Fallback(
            FallbackError::Read { .. } | FallbackError::Incomplete { .. }
        ))
    ));
}

#[tokio::test]
async fn huge_announced_length_is_not_reserved_up_front() {
    // 1 TiB announced; only a handful of bytes ever arrive.
    let addr = serve_truncated(1 << 40, 16).await;

    let streamer = FallbackStreamer::new(reqwest::Client::new(), format!("http://{}", addr));
    let result = streamer
        .fetch(Some("abc"), 0, &TransferHandle::default())
        .await;

    assert!(matches!(
        result,
        Err(TransferError::Fallback(
            FallbackError::Read { .. } | FallbackError::Incomplete { .. }
        ))
    ));
}

#[tokio::test]
async fn stop_during_stream_yields_stopped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/slow/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(payload(10))
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let handle = TransferHandle::default();
    let stopper = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        stopper.stop();
    });

    let streamer = FallbackStreamer::new(reqwest::Client::new(), server.uri());
    let result = streamer.fetch(Some("slow"), 0, &handle).await;
    assert_eq!(result, Err(TransferError::Stopped));
}
