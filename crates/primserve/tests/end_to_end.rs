use futures::future::join_all;
use primserve::{
    generator::GeneratorRegistry,
    producer::{PrimaryServer, ProducerStateMachine},
    worker::{HitSummary, SummaryEngine, Worker, WorkerConfig},
};
use primserve_core::{
    channel::{ChannelConfig, ChannelName, ChannelSet, PullSocket, Subscriber},
    codec,
    config::RunConfig,
};
use std::{collections::HashSet, time::Duration};
use tokio_util::sync::CancellationToken;

const DEADLINE: Duration = Duration::from_secs(30);

fn boxgen_config(n_events: u32, number: u32, chunk_size: u32) -> RunConfig {
    RunConfig {
        n_events,
        chunk_size,
        seed: Some(1234),
        key_values: format!("BoxGun.number={number}"),
        ..RunConfig::default()
    }
}

fn spawn_worker(
    channels: &ChannelSet,
    id: usize,
) -> tokio::task::JoinHandle<primserve::Result<primserve::worker::WorkerStats>> {
    let work = channels.requester(ChannelName::Work).unwrap();
    let status = channels.requester(ChannelName::Status).unwrap();
    let mut worker = Worker::new(id, work, channels.output(), SummaryEngine)
        .with_status(status)
        .with_config(WorkerConfig {
            request_timeout: Duration::from_secs(10),
            ..WorkerConfig::default()
        });
    tokio::spawn(async move { worker.run().await })
}

async fn drain(sink: &mut PullSocket) -> Vec<HitSummary> {
    let mut summaries = Vec::new();
    while let Some(payload) = sink.receive(Some(DEADLINE)).await.unwrap() {
        summaries.push(codec::decode(&payload).unwrap());
    }
    summaries
}

async fn wait_for(notifications: &mut Subscriber, message: &str) {
    let expected = format!("PRIMSERVER : STATUS : {message}");
    tokio::time::timeout(DEADLINE, async {
        while notifications.receive(None).await.unwrap() != expected.as_bytes() {}
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_primary_is_processed_exactly_once() {
    let (n_events, number, chunk_size) = (12, 7, 3);
    let (channels, endpoints, mut sink) = ChannelSet::new(ChannelConfig::default());
    let machine = ProducerStateMachine::new(
        boxgen_config(n_events, number, chunk_size),
        GeneratorRegistry::with_builtins(),
    )
    .unwrap();
    let mut server = PrimaryServer::new(machine, endpoints, CancellationToken::new());
    let producer = tokio::spawn(async move { server.run().await });

    let workers: Vec<_> = (0..4).map(|id| spawn_worker(&channels, id)).collect();
    // Only the workers may keep the output channel open.
    drop(channels);

    let stats = tokio::time::timeout(DEADLINE, join_all(workers)).await.unwrap();
    let stats: Vec<_> = stats
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    tokio::time::timeout(DEADLINE, producer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let summaries = drain(&mut sink).await;
    let parts_per_event = number.div_ceil(chunk_size);
    assert_eq!(summaries.len() as u32, n_events * parts_per_event);

    let distinct: HashSet<_> = summaries.iter().map(|s| (s.event_id, s.part)).collect();
    assert_eq!(distinct.len(), summaries.len());
    for event_id in 1..=n_events as i32 {
        for part in 1..=parts_per_event {
            assert!(distinct.contains(&(event_id, part)));
        }
    }

    let processed: u64 = summaries.iter().map(|s| s.n_primaries).sum();
    assert_eq!(processed, u64::from(n_events * number));
    assert_eq!(stats.iter().map(|s| s.primaries).sum::<u64>(), processed);
    assert_eq!(
        stats.iter().map(|s| s.events_started).sum::<u64>(),
        u64::from(n_events)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_service_serves_batch_after_batch() {
    let (channels, endpoints, mut sink) = ChannelSet::new(ChannelConfig::default());
    let mut notifications = channels.subscribe(ChannelName::Notifications).unwrap();
    let control = channels.publisher(ChannelName::Control).unwrap();

    let config = RunConfig {
        as_service: true,
        ..boxgen_config(2, 5, 500)
    };
    let machine = ProducerStateMachine::new(config, GeneratorRegistry::with_builtins()).unwrap();
    let mut server = PrimaryServer::new(machine, endpoints, CancellationToken::new());
    let producer = tokio::spawn(async move { server.run().await });

    let first = spawn_worker(&channels, 0).await.unwrap().unwrap();
    assert_eq!((first.chunks, first.primaries), (2, 10));
    wait_for(&mut notifications, "AWAITING INPUT").await;

    control.publish_str("-n 3 -g boxgen --seed 5");
    wait_for(&mut notifications, "RECONFIGURED").await;

    // The cached box gun keeps its five particles per event.
    let second = spawn_worker(&channels, 1).await.unwrap().unwrap();
    assert_eq!((second.chunks, second.primaries), (3, 15));
    wait_for(&mut notifications, "AWAITING INPUT").await;

    control.publish_str("--stop");
    tokio::time::timeout(DEADLINE, producer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    wait_for(&mut notifications, "STOPPED").await;

    drop(channels);
    let summaries = drain(&mut sink).await;
    let events: Vec<_> = summaries.iter().map(|s| s.event_id).collect();
    assert_eq!(events, [1, 2, 1, 2, 3]);
}
