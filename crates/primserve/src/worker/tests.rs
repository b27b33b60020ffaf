use crate::worker::{HitSummary, SummaryEngine, Worker, WorkerConfig};
use bytes::Bytes;
use primserve_core::{
    Error, codec,
    channel::{
        LocalReplier, LocalRequester, PullSocket, PushSocket, ReplyChannel, push_pull,
        request_reply,
    },
    config::RunConfig,
    protocol::{Chunk, Primary, ProtocolState, ReplyErrorKind, WorkReply},
};
use std::time::Duration;
use tokio::task::JoinHandle;

fn chunk(event_id: i32, part: u32, n_parts: u32, size: usize) -> Bytes {
    let mut chunk = Chunk::end_of_work(2, 0);
    chunk.info.event_id = event_id;
    chunk.info.part = part;
    chunk.info.n_parts = n_parts;
    chunk.info.seed = 40 + event_id as u64;
    chunk.primaries = vec![
        Primary {
            e: 1.0,
            ..Primary::default()
        };
        size
    ];
    codec::encode(&WorkReply::Chunk(chunk)).unwrap()
}

fn end_of_work() -> Bytes {
    codec::encode(&WorkReply::Chunk(Chunk::end_of_work(2, 0))).unwrap()
}

/// Answers each request with the next scripted reply and returns the
/// requests it saw once the script runs out.
fn scripted_producer(mut rep: LocalReplier, replies: Vec<Bytes>) -> JoinHandle<Vec<Bytes>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        for reply in replies {
            seen.push(rep.receive(None).await.unwrap());
            rep.send(reply, None).await.unwrap();
        }
        seen
    })
}

fn new_worker(work: LocalRequester) -> (Worker<LocalRequester, PushSocket, SummaryEngine>, PullSocket) {
    let (push, pull) = push_pull(16);
    (Worker::new(7, work, push, SummaryEngine), pull)
}

#[tokio::test]
async fn processes_chunks_until_end_of_work() {
    let (req, rep) = request_reply(4);
    let producer = scripted_producer(
        rep,
        vec![chunk(1, 1, 2, 5), chunk(1, 2, 2, 3), chunk(2, 1, 1, 4), end_of_work()],
    );
    let (mut worker, mut sink) = new_worker(req);

    let stats = worker.run().await.unwrap();
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.primaries, 12);
    assert_eq!(stats.events_started, 2);
    assert_eq!(stats.empty_rounds, 0);

    let requests = producer.await.unwrap();
    assert!(requests.iter().all(|r| &r[..] == b"primrequest"));

    let mut parts = Vec::new();
    for _ in 0..3 {
        let payload = sink.receive(None).await.unwrap().unwrap();
        let summary: HitSummary = codec::decode(&payload).unwrap();
        parts.push((summary.event_id, summary.part, summary.n_primaries));
    }
    assert_eq!(parts, [(1, 1, 5), (1, 2, 3), (2, 1, 4)]);
}

#[tokio::test]
async fn idle_producers_are_not_asked_for_work() {
    let (work_req, work_rep) = request_reply(4);
    let (status_req, status_rep) = request_reply(4);
    let status = scripted_producer(
        status_rep,
        vec![Bytes::copy_from_slice(&ProtocolState::Idle.to_bytes())],
    );
    let (worker, _sink) = new_worker(work_req);
    let mut worker = worker.with_status(status_req);

    assert!(!worker.run_once().await.unwrap());
    assert_eq!(status.await.unwrap(), [Bytes::new()]);
    drop(work_rep);
}

#[tokio::test]
async fn status_probes() {
    let (work_req, _work_rep) = request_reply(4);
    let (status_req, status_rep) = request_reply(4);
    let status = scripted_producer(
        status_rep,
        vec![
            Bytes::copy_from_slice(&ProtocolState::WaitingEvent.to_bytes()),
            Bytes::copy_from_slice(&ProtocolState::Stopped.to_bytes()),
            Bytes::copy_from_slice(&9_i32.to_le_bytes()),
        ],
    );
    let (worker, _sink) = new_worker(work_req);
    let mut worker = worker.with_status(status_req);
    let timeout = Duration::from_secs(5);

    assert!(worker.poll_status(timeout).await);
    assert!(!worker.poll_status(timeout).await);
    assert!(!worker.poll_status(timeout).await);

    // The status endpoint is gone now.
    status.await.unwrap();
    assert!(!worker.poll_status(timeout).await);
}

#[tokio::test]
async fn status_queries_need_a_status_channel() {
    let (work_req, _work_rep) = request_reply(4);
    let (mut worker, _sink) = new_worker(work_req);
    assert!(matches!(
        worker.query_status(Duration::from_secs(1)).await,
        Err(Error::ChannelError { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_keep_the_request_outstanding() {
    let (req, mut rep) = request_reply(4);
    let (worker, mut sink) = new_worker(req);
    let mut worker = worker.with_config(WorkerConfig {
        request_timeout: Duration::from_millis(100),
        ..WorkerConfig::default()
    });

    assert!(worker.run_once().await.unwrap());
    assert_eq!(worker.stats().empty_rounds, 1);
    assert_eq!(worker.stats().chunks, 0);

    // The late reply is picked up without a second request.
    let request = rep.receive(None).await.unwrap();
    assert_eq!(&request[..], b"primrequest");
    rep.send(chunk(1, 1, 1, 2), None).await.unwrap();

    assert!(worker.run_once().await.unwrap());
    assert_eq!(worker.stats().chunks, 1);
    assert!(sink.receive(None).await.unwrap().is_some());
    assert!(
        rep.receive(Some(Duration::from_millis(10)))
            .await
            .unwrap_err()
            .is_timeout()
    );
}

#[tokio::test]
async fn error_replies_and_garbage_are_errors() {
    let (req, rep) = request_reply(4);
    let unknown = codec::encode(&WorkReply::Error {
        kind: ReplyErrorKind::UnknownRequest,
        message: "primrequest?".to_string(),
    })
    .unwrap();
    let producer = scripted_producer(rep, vec![unknown, Bytes::from_static(b"\xffjunk")]);
    let (mut worker, _sink) = new_worker(req);

    assert!(matches!(
        worker.run_once().await,
        Err(Error::UnknownRequest { .. })
    ));
    assert!(matches!(worker.run_once().await, Err(Error::Decode { .. })));
    producer.await.unwrap();
}

#[tokio::test]
async fn unreachable_producers_and_sinks_end_the_loop() {
    let (req, rep) = request_reply(4);
    drop(rep);
    let (mut worker, _sink) = new_worker(req);
    assert!(!worker.run_once().await.unwrap());

    let (req, rep) = request_reply(4);
    let _producer = scripted_producer(rep, vec![chunk(1, 1, 1, 1)]);
    let (mut worker, sink) = new_worker(req);
    drop(sink);
    assert!(!worker.run_once().await.unwrap());
    assert_eq!(worker.stats().chunks, 1);
}

#[tokio::test]
async fn fetches_the_run_configuration() {
    let (req, rep) = request_reply(4);
    let served = RunConfig {
        n_events: 12,
        mc_engine: "summary".to_string(),
        ..RunConfig::default()
    };
    let producer = scripted_producer(
        rep,
        vec![codec::encode(&WorkReply::Config(served.clone())).unwrap()],
    );
    let (mut worker, _sink) = new_worker(req);

    assert_eq!(worker.fetch_config().await.unwrap(), served);
    assert_eq!(producer.await.unwrap(), [Bytes::from_static(b"configrequest")]);
}
