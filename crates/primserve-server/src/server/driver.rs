//! Runs one producer, `num_workers` workers and an output sink inside the
//! process, connected through a [`ChannelSet`].
//!
//! In service mode the workers do not exit when a batch ends. They keep
//! probing the producer's status while it is idle and resume as soon as a
//! reconfiguration starts the next batch.

use super::config::ServerConfig;
use anyhow::Context;
use futures::future::join_all;
use primserve::{
    generator::GeneratorRegistry,
    producer::{DriverPipe, PrimaryServer, ProducerStateMachine},
    worker::{
        self, HitSummary, REQUEST_TIMEOUT, STATUS_TIMEOUT, TransportEngine, Worker, WorkerStats,
        engine_for,
    },
};
use primserve_core::{
    channel::{
        ChannelName, ChannelSet, OutputChannel, PullSocket, Publisher, RequestChannel, Subscriber,
    },
    codec,
    protocol::ProtocolState,
};
use std::{io::BufRead, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pause between status probes while the producer is idle.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What the output sink saw.
#[derive(Debug, Default, Clone, Copy)]
struct SinkTotals {
    chunks: u64,
    primaries: u64,
    hits: u64,
    energy_deposit: f64,
}

/// Runs the producer until it stops and every worker has finished.
///
/// # Errors
///
/// - Building the producer failed (invalid settings, unknown generator,
///   driver pipe that cannot be opened).
/// - The producer ended with an error.
pub async fn run(config: ServerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let service = config.run.as_service;
    let (channels, endpoints, sink) = ChannelSet::new(config.channels);

    let mut machine = ProducerStateMachine::new(config.run, GeneratorRegistry::with_builtins())?;
    if let Some(path) = &config.driver_pipe {
        machine = machine.with_driver_pipe(DriverPipe::open(path)?);
    }
    let mut server = PrimaryServer::new(machine, endpoints, shutdown.clone());

    let monitor = tokio::spawn(log_notifications(
        channels.subscribe(ChannelName::Notifications)?,
    ));
    let sink = tokio::spawn(drain_output(sink));
    let producer = tokio::spawn(async move { server.run().await });

    if service {
        forward_stdin(channels.publisher(ChannelName::Control)?)?;
    }

    let mut workers = Vec::with_capacity(config.num_workers);
    for id in 0..config.num_workers {
        let work = channels.requester(ChannelName::Work)?;
        let status = channels.requester(ChannelName::Status)?;
        workers.push(spawn_worker(
            id,
            work,
            status,
            channels.output(),
            service,
            shutdown.clone(),
        ));
    }
    // The sink finishes once the last worker drops its output handle.
    drop(channels);

    let stats: Vec<WorkerStats> = join_all(workers)
        .await
        .into_iter()
        .filter_map(|joined| match joined {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::error!("Worker task failed: {e}");
                None
            }
        })
        .collect();

    let outcome = producer.await.context("producer task failed")?;
    let totals = sink.await.context("output sink failed")?;
    if let Err(e) = monitor.await {
        tracing::warn!("Notification monitor failed: {e}");
    }

    tracing::info!(
        workers = stats.len(),
        chunks = totals.chunks,
        primaries = totals.primaries,
        hits = totals.hits,
        energy_deposit = totals.energy_deposit,
        "Run complete"
    );
    outcome.context("producer stopped with an error")
}

fn spawn_worker<R, O>(
    id: usize,
    work: R,
    status: R,
    output: O,
    service: bool,
    shutdown: CancellationToken,
) -> JoinHandle<WorkerStats>
where
    R: RequestChannel + Send + 'static,
    O: OutputChannel + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!(worker = id, "Shutdown requested, worker exits");
                WorkerStats::default()
            }
            stats = work_loop(id, work, status, output, service) => stats,
        }
    })
}

/// Learns the engine from the producer, then processes batches until the
/// producer stops or becomes unreachable.
async fn work_loop<R, O>(
    id: usize,
    mut work: R,
    status: R,
    output: O,
    service: bool,
) -> WorkerStats
where
    R: RequestChannel,
    O: OutputChannel,
{
    let engine = match worker::fetch_config(&mut work, REQUEST_TIMEOUT)
        .await
        .and_then(|run| engine_for(&run.mc_engine))
    {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(worker = id, "Worker could not be set up: {e}");
            return WorkerStats::default();
        }
    };

    let mut worker = Worker::new(id, work, output, engine).with_status(status);
    loop {
        if let Err(e) = worker.run().await {
            tracing::error!(worker = id, "Worker stopped: {e}");
            break;
        }
        if !service || !wait_for_next_batch(&mut worker).await {
            break;
        }
    }
    worker.stats()
}

/// Returns `true` once the producer has work again and `false` once it has
/// stopped or cannot be reached.
async fn wait_for_next_batch<R, O, E>(worker: &mut Worker<R, O, E>) -> bool
where
    R: RequestChannel,
    O: OutputChannel,
    E: TransportEngine,
{
    loop {
        match worker.query_status(STATUS_TIMEOUT).await {
            Ok(state) if state.has_work() => return true,
            Ok(ProtocolState::Idle) => {}
            Ok(state) => {
                tracing::info!(worker = worker.id(), %state, "Producer is done");
                return false;
            }
            Err(e) if e.is_timeout() => {}
            Err(e) => {
                tracing::info!(worker = worker.id(), "Producer unreachable: {e}");
                return false;
            }
        }
        tokio::time::sleep(IDLE_POLL_INTERVAL).await;
    }
}

/// Publishes every non-blank stdin line on the control channel. End of input
/// is treated as a stop command.
///
/// Runs on a plain thread: a blocked stdin read must not hold up runtime
/// shutdown.
fn forward_stdin(control: Publisher) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("primserve-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().is_empty() => {}
                    Ok(line) => control.publish_str(line.trim()),
                    Err(e) => {
                        tracing::warn!("Could not read stdin: {e}");
                        break;
                    }
                }
            }
            tracing::info!("No more control input, requesting stop");
            control.publish_str("--stop");
        })
        .context("failed to spawn the stdin reader")?;
    Ok(())
}

async fn log_notifications(mut notifications: Subscriber) {
    while let Ok(message) = notifications.receive(None).await {
        tracing::info!("{}", String::from_utf8_lossy(&message));
    }
}

async fn drain_output(mut sink: PullSocket) -> SinkTotals {
    let mut totals = SinkTotals::default();
    loop {
        let payload = match sink.receive(None).await {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Output sink failed: {e}");
                break;
            }
        };
        match codec::decode::<HitSummary>(&payload) {
            Ok(summary) => {
                tracing::debug!(
                    "Event {} part {}/{}: {} primaries, {} hits",
                    summary.event_id,
                    summary.part,
                    summary.n_parts,
                    summary.n_primaries,
                    summary.hits
                );
                totals.chunks += 1;
                totals.primaries += summary.n_primaries;
                totals.hits += summary.hits;
                totals.energy_deposit += summary.energy_deposit;
            }
            Err(e) => tracing::warn!("Discarding undecodable output: {e}"),
        }
    }
    totals
}
