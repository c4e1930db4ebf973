#![cfg(feature = "metrics")]
//! Metrics emitted while streams are handled.
//!
//! Recorders are thread-local, so each test drives its future on a
//! current-thread runtime inside the recorder scope.

use std::future::Future;

use bytes::Bytes;
use tokio::time::Instant;
use wirestream::{
    SEGMENT_RETRIES,
    SEGMENTS_ACCEPTED,
    SESSIONS_ACTIVE,
    SESSIONS_EVICTED,
    STREAMS_FINALIZED,
    SegmentHeader,
    SegmentIndex,
    StorageBackend,
    StreamId,
    StreamRequest,
    StreamingClient,
};
use wirestream_testing::{MetricsCapture, ScriptedTransport, chunks, fast_backoff, handler};

fn block_on<F: Future>(capture: &MetricsCapture, future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("runtime");
    capture.record(|| runtime.block_on(future))
}

fn request(id: &StreamId, index: u64, done: bool) -> StreamRequest {
    StreamRequest::segment(
        &SegmentHeader::new(id.clone(), SegmentIndex::new(index), done),
        Bytes::from_static(b"xy"),
    )
}

#[test]
fn finalized_stream_updates_counters_and_gauge() {
    let capture = MetricsCapture::new();
    block_on(&capture, async {
        let handler = handler(StorageBackend::Memory);
        let id = StreamId::new("counted").expect("id");
        handler.start(Some(id.clone())).expect("start");
        for (index, done) in [(0, false), (1, false), (2, true)] {
            handler.handle(&request(&id, index, done)).await.expect("segment");
        }
    });

    assert_eq!(capture.counter(SEGMENTS_ACCEPTED), 3);
    assert_eq!(capture.counter(STREAMS_FINALIZED), 1);
    assert_eq!(capture.gauge(SESSIONS_ACTIVE), Some(0.0));
}

#[test]
fn eviction_is_counted() {
    let capture = MetricsCapture::new();
    block_on(&capture, async {
        let handler = handler(StorageBackend::Memory);
        handler.start(None).expect("start");
        handler.start(None).expect("start");
        let later = Instant::now() + handler.registry().timeout();
        assert_eq!(handler.registry().purge_expired_at(later).await.len(), 2);
    });

    assert_eq!(capture.counter(SESSIONS_EVICTED), 2);
    assert_eq!(capture.counter(STREAMS_FINALIZED), 0);
}

#[test]
fn retries_are_counted() {
    let capture = MetricsCapture::new();
    let transport = ScriptedTransport::new();
    transport.push_status(503);
    transport.push_timeout();

    block_on(&capture, async {
        let client = StreamingClient::new(transport.clone()).with_backoff(fast_backoff(5));
        let id = StreamId::new("retried").expect("id");
        client.send(&id, chunks(&[b"a"])).await.expect("send");
    });

    assert_eq!(capture.counter(SEGMENT_RETRIES), 2);
}
