use bytes::Bytes;
use primserve_core::{
    Error, Result, codec,
    protocol::{Primary, SubEventInfo},
};
use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// The per-chunk processing step a worker runs.
///
/// Engines get the chunk's primaries together with an RNG seeded from the
/// chunk, so that reprocessing a chunk reproduces its output.
pub trait TransportEngine: Send {
    fn name(&self) -> &str;

    /// Processes one chunk and returns the payload to push downstream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the chunk cannot be processed.
    fn process(
        &mut self,
        info: &SubEventInfo,
        primaries: &[Primary],
        rng: &mut StdRng,
    ) -> Result<Bytes>;
}

/// What the [`SummaryEngine`] reports per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitSummary {
    pub event_id: i32,
    pub part: u32,
    pub n_parts: u32,
    pub n_primaries: u64,
    /// Number of simulated detector hits.
    pub hits: u64,
    /// Deposited energy in GeV.
    pub energy_deposit: f64,
    /// Sum of `px` over the chunk's primaries, for bookkeeping.
    pub px_sum: f64,
    /// Scalar sum of total momenta in GeV/c.
    pub p_sum: f64,
    /// Scalar sum of transverse momenta in GeV/c.
    pub pt_sum: f64,
}

/// A stand-in transport step: every primary leaves up to three hits, each
/// depositing a random fraction of its energy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryEngine;

impl SummaryEngine {
    pub const NAME: &'static str = "summary";
}

impl TransportEngine for SummaryEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(
        &mut self,
        info: &SubEventInfo,
        primaries: &[Primary],
        rng: &mut StdRng,
    ) -> Result<Bytes> {
        let mut summary = HitSummary {
            event_id: info.event_id,
            part: info.part,
            n_parts: info.n_parts,
            n_primaries: primaries.len() as u64,
            hits: 0,
            energy_deposit: 0.0,
            px_sum: 0.0,
            p_sum: 0.0,
            pt_sum: 0.0,
        };

        for primary in primaries {
            if !primary.e.is_finite() || primary.e < 0.0 {
                return Err(Error::Transport {
                    reason: format!(
                        "primary with energy {} in event {} part {}",
                        primary.e, info.event_id, info.part
                    ),
                });
            }
            let hits = rng.random_range(0..=3_u64);
            for _ in 0..hits {
                summary.energy_deposit += primary.e * rng.random::<f64>() / 3.0;
            }
            summary.hits += hits;
            summary.px_sum += primary.px;
            summary.p_sum += primary.p();
            summary.pt_sum += primary.pt();
        }

        codec::encode(&summary)
    }
}

/// Builds the engine named in a run configuration.
///
/// # Errors
///
/// Returns [`Error::Transport`] for engines this build does not provide.
pub fn engine_for(name: &str) -> Result<SummaryEngine> {
    match name {
        SummaryEngine::NAME => Ok(SummaryEngine),
        other => Err(Error::Transport {
            reason: format!("unsupported transport engine {other:?}"),
        }),
    }
}
