//! Prometheus metrics for the block processor.
//!
//! [`BlockProcessorMetrics`] owns a dedicated [`Registry`] that an exporter
//! can encode into the Prometheus text exposition format.

use lattice_ledger::ProcessOutcome;
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

pub struct BlockProcessorMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Classified blocks, labelled by outcome.
    pub outcomes: IntCounterVec,
    /// Blocks that received an outcome, whatever it was.
    pub blocks_processed: IntCounter,
    /// Blocks removed to make room for forced blocks.
    pub rollbacks: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub queue_size: IntGauge,
    pub forced_size: IntGauge,
    pub unchecked_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time a batch held the write transaction, in milliseconds.
    pub batch_duration_ms: Histogram,
}

impl BlockProcessorMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let outcomes = register_int_counter_vec_with_registry!(
            Opts::new(
                "lattice_block_processor_outcomes_total",
                "Blocks classified by the block processor, by outcome"
            ),
            &["outcome"],
            registry
        )
        .expect("failed to register outcomes counter");

        let blocks_processed = register_int_counter_with_registry!(
            Opts::new(
                "lattice_block_processor_blocks_processed_total",
                "Total blocks processed by the block processor"
            ),
            registry
        )
        .expect("failed to register blocks_processed counter");

        let rollbacks = register_int_counter_with_registry!(
            Opts::new(
                "lattice_block_processor_rollbacks_total",
                "Blocks rolled back for forced blocks"
            ),
            registry
        )
        .expect("failed to register rollbacks counter");

        let queue_size = register_int_gauge_with_registry!(
            Opts::new(
                "lattice_block_processor_queue_size",
                "Blocks waiting in the normal queue"
            ),
            registry
        )
        .expect("failed to register queue_size gauge");

        let forced_size = register_int_gauge_with_registry!(
            Opts::new(
                "lattice_block_processor_forced_size",
                "Blocks waiting in the forced queue"
            ),
            registry
        )
        .expect("failed to register forced_size gauge");

        let unchecked_count = register_int_gauge_with_registry!(
            Opts::new(
                "lattice_block_processor_unchecked_count",
                "Blocks waiting for a missing dependency"
            ),
            registry
        )
        .expect("failed to register unchecked_count gauge");

        // Exponential buckets covering 0.1 ms to ~1.6 s.
        let batch_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "lattice_block_processor_batch_duration_ms",
                "Write-transaction hold time per batch in milliseconds"
            )
            .buckets(exponential_buckets(0.1, 2.0, 15)),
            registry
        )
        .expect("failed to register batch_duration_ms histogram");

        Self {
            registry,
            outcomes,
            blocks_processed,
            rollbacks,
            queue_size,
            forced_size,
            unchecked_count,
            batch_duration_ms,
        }
    }

    pub fn record_outcome(&self, outcome: ProcessOutcome) {
        self.outcomes.with_label_values(&[outcome.as_str()]).inc();
        self.blocks_processed.inc();
    }

    pub fn outcome_count(&self, outcome: ProcessOutcome) -> u64 {
        self.outcomes.with_label_values(&[outcome.as_str()]).get()
    }
}

fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    prometheus::exponential_buckets(start, factor, count).unwrap_or_default()
}

impl Default for BlockProcessorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
