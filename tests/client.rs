//! Sender behaviour against a scripted transport.
//!
//! Every test runs on a paused clock so back-off delays can be asserted
//! exactly from the timestamps the transport records.

use std::{io, time::Duration};

use async_stream::stream;
use bytes::Bytes;
use rstest::rstest;
use wirestream::{
    SegmentIndex,
    SendError,
    StreamId,
    StreamResponse,
    StreamingClient,
    TransportError,
    protocol::Method,
};
use wirestream_testing::{ScriptedTransport, chunks, failing_after, fast_backoff};

fn stream_id() -> StreamId { StreamId::new("abc").expect("non-empty id") }

fn client(transport: &ScriptedTransport, max_attempts: u32) -> StreamingClient<ScriptedTransport> {
    StreamingClient::new(transport.clone()).with_backoff(fast_backoff(max_attempts))
}

fn gaps(transport: &ScriptedTransport, index: u64) -> Vec<Duration> {
    let attempts = transport.attempts_for(index);
    attempts
        .windows(2)
        .map(|pair| pair[1].at - pair[0].at)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn start_returns_stream_id_from_body() {
    let transport = ScriptedTransport::new();
    transport.push_response(
        StreamResponse::json(200, &serde_json::json!({ "streamId": "s-1" })).expect("json"),
    );

    let id = client(&transport, 3).start().await.expect("start");

    assert_eq!(id.as_str(), "s-1");
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].request.method(), Method::Get);
}

#[rstest]
#[case::missing(serde_json::json!({ "other": 1 }))]
#[case::empty(serde_json::json!({ "streamId": "" }))]
#[case::not_a_string(serde_json::json!({ "streamId": 7 }))]
#[tokio::test(start_paused = true)]
async fn start_rejects_invalid_stream_id(#[case] body: serde_json::Value) {
    let transport = ScriptedTransport::new();
    transport.push_response(StreamResponse::json(200, &body).expect("json"));

    let err = client(&transport, 3).start().await.expect_err("invalid id");
    assert!(matches!(err, SendError::Protocol(ref msg) if msg.contains("invalid stream id")));
}

#[tokio::test(start_paused = true)]
async fn start_failure_status_is_protocol_error() {
    let transport = ScriptedTransport::new();
    transport.push_status(500);

    let err = client(&transport, 3).start().await.expect_err("500");
    assert!(matches!(err, SendError::Protocol(ref msg) if msg.contains("failed to start streaming")));
    assert_eq!(transport.requests().len(), 1, "start is not retried");
}

#[tokio::test(start_paused = true)]
async fn start_transport_failure_is_connectivity_error() {
    let transport = ScriptedTransport::new();
    transport.push_connection_error("refused");

    let err = client(&transport, 3).start().await.expect_err("offline");
    assert!(matches!(err, SendError::Connectivity(TransportError::Connection(_))));
}

#[tokio::test(start_paused = true)]
async fn sends_each_chunk_then_empty_terminal_segment() {
    let transport = ScriptedTransport::new();
    let outcome = client(&transport, 3)
        .send(&stream_id(), chunks(&[b"AB", b"CD"]))
        .await
        .expect("send");

    assert_eq!(outcome.segments(), 3);
    let requests = transport.requests();
    let bodies: Vec<_> = requests.iter().map(|r| r.request.body().clone()).collect();
    assert_eq!(
        bodies,
        [&b"AB"[..], b"CD", b""].map(Bytes::from_static).to_vec()
    );
    let flags: Vec<_> = requests.iter().map(|r| r.is_done()).collect();
    assert_eq!(flags, [false, false, true]);
    assert!(
        requests
            .iter()
            .all(|r| r.request.header("X-Stream-Id") == Some("abc"))
    );
}

#[tokio::test(start_paused = true)]
async fn empty_source_sends_only_terminal_segment() {
    let transport = ScriptedTransport::new();
    let outcome = client(&transport, 3)
        .send(&stream_id(), chunks(&[]))
        .await
        .expect("send");

    assert_eq!(outcome.segments(), 1);
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].segment(), Some(SegmentIndex::zero()));
    assert!(requests[0].is_done());
    assert!(requests[0].request.body().is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_growing_delays() {
    let transport = ScriptedTransport::new();
    transport.push_status(503);
    transport.push_timeout();
    transport.push_status(500);

    let outcome = client(&transport, 5)
        .send(&stream_id(), chunks(&[b"x"]))
        .await
        .expect("send eventually succeeds");

    assert_eq!(outcome.segments(), 2);
    assert_eq!(transport.attempts_for(0).len(), 4);
    assert_eq!(
        gaps(&transport, 0),
        [10, 20, 40].map(Duration::from_millis).to_vec()
    );
    assert_eq!(transport.attempts_for(1).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn delays_saturate_at_max_delay() {
    let transport = ScriptedTransport::new();
    for _ in 0..5 {
        transport.push_status(502);
    }

    client(&transport, 6)
        .send(&stream_id(), chunks(&[]))
        .await
        .expect("sixth attempt succeeds");

    assert_eq!(
        gaps(&transport, 0),
        [10, 20, 40, 80, 80].map(Duration::from_millis).to_vec()
    );
}

#[tokio::test(start_paused = true)]
async fn retry_budget_bounds_attempts() {
    let transport =
        ScriptedTransport::new().with_fallback(|_| Err(TransportError::connection("down")));

    let err = client(&transport, 4)
        .send(&stream_id(), chunks(&[b"a", b"b"]))
        .await
        .expect_err("budget exhausted");

    assert!(matches!(
        err,
        SendError::RetryExhausted { index, attempts: 4, .. } if index == SegmentIndex::zero()
    ));
    assert_eq!(transport.requests().len(), 4);
    assert!(transport.attempts_for(1).is_empty(), "later segments are not sent");
}

#[rstest]
#[case(400)]
#[case(404)]
#[tokio::test(start_paused = true)]
async fn client_error_aborts_without_retry(#[case] status: u16) {
    let transport = ScriptedTransport::new();
    transport.push_status(200);
    transport.push_status(status);

    let err = client(&transport, 10)
        .send(&stream_id(), chunks(&[b"a", b"b", b"c"]))
        .await
        .expect_err("4xx aborts");

    assert_eq!(err.status(), Some(status));
    assert!(!err.is_retryable());
    assert_eq!(err.is_session_not_found(), status == 404);
    assert_eq!(transport.attempts_for(1).len(), 1);
    assert!(transport.attempts_for(2).is_empty());
}

#[tokio::test(start_paused = true)]
async fn observer_sees_non_terminal_confirmations_in_order() {
    let transport = ScriptedTransport::new();
    let mut seen = Vec::new();

    let outcome = client(&transport, 3)
        .send_with(&stream_id(), chunks(&[b"a", b"b", b"c"]), |response, index| {
            assert!(response.is_success());
            seen.push(index.get());
        })
        .await
        .expect("send");

    assert_eq!(seen, [0, 1, 2]);
    assert_eq!(outcome.response().status(), 200);
}

#[tokio::test(start_paused = true)]
async fn observer_panic_does_not_abort_transfer() {
    let transport = ScriptedTransport::new();
    let mut calls = 0;

    let outcome = client(&transport, 3)
        .send_with(&stream_id(), chunks(&[b"a", b"b"]), |_, index| {
            calls += 1;
            assert_ne!(index, SegmentIndex::zero(), "observer failure");
        })
        .await
        .expect("panicking observer is tolerated");

    assert_eq!(calls, 2);
    assert_eq!(outcome.segments(), 3);
}

#[tokio::test(start_paused = true)]
async fn source_error_stops_transfer() {
    let transport = ScriptedTransport::new();

    let err = client(&transport, 3)
        .send(&stream_id(), failing_after(&[b"a"], io::ErrorKind::BrokenPipe))
        .await
        .expect_err("source fails");

    assert!(matches!(err, SendError::Source(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    assert_eq!(transport.requests().len(), 1);
    assert!(!transport.requests()[0].is_done());
}

#[tokio::test(start_paused = true)]
async fn next_chunk_is_read_only_after_confirmation() {
    let transport = ScriptedTransport::new();
    transport.push_status(503);
    let recorded = transport.clone();

    let source = stream! {
        yield Ok::<_, io::Error>(Bytes::from_static(b"first"));
        assert_eq!(recorded.attempts_for(0).len(), 2, "segment 0 confirmed before reading on");
        yield Ok(Bytes::from_static(b"second"));
    };

    let outcome = client(&transport, 3)
        .send(&stream_id(), source)
        .await
        .expect("send");
    assert_eq!(outcome.segments(), 3);
}
