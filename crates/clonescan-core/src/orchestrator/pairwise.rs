//! Pairwise scoring over a normalized corpus with optional Rayon parallelism.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::models::{SimilarityPair, UnavailableContract, UnavailableReason};
use crate::normalizer::NormalizedCorpus;
use crate::similarity::{PreparedSource, SimilarityEngine};

/// `n * (n - 1) / 2`.
pub fn expected_pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Index pairs `(i, j)` with `i < j`, in row-major order.
pub fn pair_indices(n: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(expected_pair_count(n));
    for i in 0..n {
        for j in (i + 1)..n {
            out.push((i, j));
        }
    }
    out
}

/// Output of a pairwise run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairTable {
    /// Ids that took part, sorted.
    pub compared: Vec<String>,
    /// Listed contracts dropped at enumeration time.
    pub skipped: Vec<UnavailableContract>,
    pub pairs: Vec<SimilarityPair>,
    pub elapsed_ms: u64,
}

impl PairTable {
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

pub struct PairwiseOrchestrator {
    engine: SimilarityEngine,
    workers: usize,
    progress_interval: usize,
}

impl PairwiseOrchestrator {
    pub fn new(engine: SimilarityEngine, config: &AnalysisConfig) -> Self {
        Self {
            engine,
            workers: config.workers,
            progress_interval: config.progress_interval.max(1),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        let config = config.clone().validated();
        Self::new(SimilarityEngine::new(config.similarity.clone()), &config)
    }

    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    /// Prepare every usable source; contracts with no text are skipped.
    pub fn prepare(&self, corpus: &NormalizedCorpus) -> (Vec<PreparedSource>, Vec<UnavailableContract>) {
        let mut prepared = Vec::with_capacity(corpus.sources.len());
        let mut skipped = Vec::new();
        for (id, source) in &corpus.sources {
            if source.canonical.trim().is_empty() {
                warn!("Contract {} has no canonical text; skipping it in all pairs", id);
                skipped.push(UnavailableContract {
                    id: id.clone(),
                    reason: UnavailableReason::MissingText,
                });
                continue;
            }
            prepared.push(self.engine.prepare(id, &source.canonical));
        }
        (prepared, skipped)
    }

    fn score_pair(
        &self,
        sources: &[PreparedSource],
        (i, j): (usize, usize),
        done: &AtomicUsize,
        total: usize,
    ) -> SimilarityPair {
        let (a, b) = (&sources[i], &sources[j]);
        let score = self.engine.score(a, b);
        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        if finished % self.progress_interval == 0 || finished == total {
            info!("[{}/{}] pairs scored", finished, total);
        }
        SimilarityPair {
            contract_a: a.id.clone(),
            contract_b: b.id.clone(),
            full_similarity: score.full.value,
            partial_similarity: score.partial,
            method: score.full.method,
            sampled: score.full.sampled(),
        }
    }

    fn score_all(&self, sources: &[PreparedSource]) -> Vec<SimilarityPair> {
        let jobs = pair_indices(sources.len());
        let total = jobs.len();
        let done = AtomicUsize::new(0);
        if jobs.is_empty() {
            return vec![];
        }

        if self.workers <= 1 {
            return jobs
                .iter()
                .map(|&job| self.score_pair(sources, job, &done, total))
                .collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build();
        match pool {
            Ok(pool) => pool.install(|| {
                jobs.par_iter()
                    .map(|&job| self.score_pair(sources, job, &done, total))
                    .collect()
            }),
            Err(e) => {
                warn!("Falling back to sequential scoring: {}", e);
                jobs.iter()
                    .map(|&job| self.score_pair(sources, job, &done, total))
                    .collect()
            }
        }
    }

    /// Score every unordered pair of available contracts exactly once.
    pub fn run(&self, corpus: &NormalizedCorpus) -> PairTable {
        let started = Instant::now();
        let (prepared, skipped) = self.prepare(corpus);
        debug!(
            "Scoring {} pairs over {} contracts with {} worker(s)",
            expected_pair_count(prepared.len()),
            prepared.len(),
            self.workers.max(1)
        );
        let pairs = self.score_all(&prepared);
        PairTable {
            compared: prepared.iter().map(|p| p.id.clone()).collect(),
            skipped,
            pairs,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}
