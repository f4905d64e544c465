//! Deterministic Simulation Testing for the LWW set and graph
//!
//! Seeded harness for replica convergence that enables:
//! - Deterministic random operation generation
//! - Skewed per-replica clocks (ties and out-of-order timestamps)
//! - Mid-run gossip and message drop simulation
//! - Invariant checking after each operation
//! - Seed-based reproducibility for debugging
//!
//! ```text
//! for seed in 0..100 {
//!     let mut harness = LwwGraphDstHarness::new(DstConfig::calm(seed));
//!     harness.run(500);
//!     harness.check_merge_order_independence();
//!     harness.sync_all();
//!     harness.check_convergence();  // violations carry the seed
//! }
//! ```

pub mod rng;

pub use rng::SimulatedRng;

use crate::config::GraphConfig;
use crate::crdt::{LwwElementSet, Merge};
use crate::graph::{Edge, LwwElementGraph};
use crate::time::Timestamp;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Configuration for a DST run
#[derive(Debug, Clone)]
pub struct DstConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of replicas
    pub num_replicas: usize,
    /// Probability of message drop during sync
    pub message_drop_prob: f64,
    /// Probability that a step is a one-way gossip exchange instead of a mutation
    pub gossip_prob: f64,
    /// Vertices (or set elements) are drawn from `0..element_space`
    pub element_space: u64,
    /// Upper bound of the fixed per-replica clock skew
    pub max_clock_skew_ms: u64,
    /// Cap on operations per `run` call
    pub max_operations: usize,
}

impl Default for DstConfig {
    fn default() -> Self {
        DstConfig {
            seed: 0,
            num_replicas: 3,
            message_drop_prob: 0.0,
            gossip_prob: 0.05,
            element_space: 8,
            max_clock_skew_ms: 0,
            max_operations: 500,
        }
    }
}

impl DstConfig {
    pub fn new(seed: u64, num_replicas: usize) -> Self {
        DstConfig {
            seed,
            num_replicas,
            ..Default::default()
        }
    }

    /// Calm mode - no message drops, synchronised clocks
    pub fn calm(seed: u64) -> Self {
        DstConfig {
            seed,
            ..Default::default()
        }
    }

    /// Moderate fault injection
    pub fn moderate(seed: u64) -> Self {
        DstConfig {
            seed,
            num_replicas: 5,
            message_drop_prob: 0.1,
            gossip_prob: 0.1,
            element_space: 10,
            max_clock_skew_ms: 5,
            max_operations: 500,
        }
    }

    /// Chaos mode - aggressive fault injection and clock skew
    pub fn chaos(seed: u64) -> Self {
        DstConfig {
            seed,
            num_replicas: 7,
            message_drop_prob: 0.3,
            gossip_prob: 0.15,
            element_space: 12,
            max_clock_skew_ms: 20,
            max_operations: 500,
        }
    }
}

/// Result of a DST run
#[derive(Debug, Clone, Serialize)]
pub struct DstResult {
    pub seed: u64,
    pub total_operations: u64,
    pub ops_per_replica: HashMap<usize, u64>,
    /// Mutations the data type refused (absent remove, edge without endpoint)
    pub rejected_operations: u64,
    pub gossip_exchanges: u64,
    pub syncs_performed: u64,
    pub messages_dropped: u64,
    /// Edges hidden by a missing endpoint after the final sync
    pub masked_edges: usize,
    pub invariant_violations: Vec<String>,
    pub converged: bool,
}

impl DstResult {
    pub fn new(seed: u64) -> Self {
        DstResult {
            seed,
            total_operations: 0,
            ops_per_replica: HashMap::new(),
            rejected_operations: 0,
            gossip_exchanges: 0,
            syncs_performed: 0,
            messages_dropped: 0,
            masked_edges: 0,
            invariant_violations: Vec::new(),
            converged: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty() && self.converged
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops ({} rejected), {} gossips, {} syncs, {} drops, converged={}, {} violations",
            self.seed,
            self.total_operations,
            self.rejected_operations,
            self.gossip_exchanges,
            self.syncs_performed,
            self.messages_dropped,
            self.converged,
            self.invariant_violations.len()
        )
    }

    fn violation(&mut self, message: String) {
        warn!(seed = self.seed, "{}", message);
        self.invariant_violations.push(message);
    }
}

/// Virtual time shared by all replicas plus a fixed skew per replica.
struct SkewedClock {
    now_ms: u64,
    skews: Vec<u64>,
}

impl SkewedClock {
    fn new(rng: &mut SimulatedRng, replicas: usize, max_skew_ms: u64) -> Self {
        let skews = (0..replicas)
            .map(|_| rng.gen_range(0, max_skew_ms + 1))
            .collect();
        SkewedClock { now_ms: 0, skews }
    }

    /// Advance by 0..=2ms; a zero step lets different replicas stamp equal times.
    fn tick(&mut self, rng: &mut SimulatedRng, replica: usize) -> Timestamp {
        self.now_ms += rng.gen_range(0, 3);
        Timestamp::from_millis(self.now_ms + self.skews[replica])
    }
}

/// Pairwise merge rounds with drops, then one drop-free anti-entropy round.
/// Each delivered exchange leaves both sides equal.
fn sync_replicas<S: Merge>(
    replicas: &mut [S],
    rng: &mut SimulatedRng,
    drop_prob: f64,
    result: &mut DstResult,
) {
    let lossy_rounds = 5;
    for _round in 0..lossy_rounds {
        for i in 0..replicas.len() {
            for j in (i + 1)..replicas.len() {
                if rng.gen_bool(drop_prob) {
                    result.messages_dropped += 1;
                    continue;
                }
                exchange(replicas, i, j);
                result.syncs_performed += 1;
            }
        }
    }

    // Gather into replica 0, then hand the join back to everyone
    for j in 1..replicas.len() {
        exchange(replicas, 0, j);
        result.syncs_performed += 1;
    }
    for j in 1..replicas.len() {
        exchange(replicas, 0, j);
        result.syncs_performed += 1;
    }
}

/// Two-way merge between replicas `i < j`.
fn exchange<S: Merge>(replicas: &mut [S], i: usize, j: usize) {
    let (left, right) = replicas.split_at_mut(j);
    left[i].merge_from(&right[0]);
    right[0].merge_from(&left[i]);
}

/// One-way state transfer between two random replicas.
fn gossip_once<S: Merge + Clone>(
    replicas: &mut [S],
    rng: &mut SimulatedRng,
    drop_prob: f64,
    result: &mut DstResult,
) {
    if replicas.len() < 2 {
        return;
    }
    let from = rng.gen_range(0, replicas.len() as u64) as usize;
    let mut to = rng.gen_range(0, replicas.len() as u64 - 1) as usize;
    if to >= from {
        to += 1;
    }

    if rng.gen_bool(drop_prob) {
        result.messages_dropped += 1;
        return;
    }
    let snapshot = replicas[from].clone();
    replicas[to].merge_from(&snapshot);
    result.gossip_exchanges += 1;
}

/// Fold all replicas in `order` into a fresh state.
fn fold_in_order<S: Merge + Clone + Default>(replicas: &[S], order: &[usize]) -> S {
    let mut acc = S::default();
    for &idx in order {
        acc.merge_from(&replicas[idx]);
    }
    acc
}

// =============================================================================
// LWW Set DST Harness
// =============================================================================

/// DST harness for the LWW element set
pub struct LwwSetDstHarness {
    config: DstConfig,
    rng: SimulatedRng,
    clock: SkewedClock,
    replicas: Vec<LwwElementSet<String>>,
    result: DstResult,
}

impl LwwSetDstHarness {
    pub fn new(config: DstConfig) -> Self {
        let mut rng = SimulatedRng::new(config.seed);
        let clock = SkewedClock::new(&mut rng, config.num_replicas, config.max_clock_skew_ms);
        let replicas = (0..config.num_replicas).map(|_| LwwElementSet::new()).collect();

        LwwSetDstHarness {
            result: DstResult::new(config.seed),
            config,
            rng,
            clock,
            replicas,
        }
    }

    /// Run random operations
    pub fn run(&mut self, operations: usize) {
        if self.replicas.is_empty() {
            return;
        }
        for _ in 0..operations.min(self.config.max_operations) {
            if self.rng.gen_bool(self.config.gossip_prob) {
                gossip_once(
                    &mut self.replicas,
                    &mut self.rng,
                    self.config.message_drop_prob,
                    &mut self.result,
                );
                continue;
            }

            let replica_idx = self.rng.gen_range(0, self.config.num_replicas as u64) as usize;
            let ts = self.clock.tick(&mut self.rng, replica_idx);
            let elem = format!("elem_{}", self.rng.gen_range(0, self.config.element_space));

            let set = &mut self.replicas[replica_idx];
            if self.rng.gen_bool(0.6) {
                set.add(elem, ts);
            } else if !set.remove(elem, ts) {
                self.result.rejected_operations += 1;
            }

            self.result.total_operations += 1;
            *self.result.ops_per_replica.entry(replica_idx).or_insert(0) += 1;
        }
    }

    pub fn sync_all(&mut self) {
        sync_replicas(
            &mut self.replicas,
            &mut self.rng,
            self.config.message_drop_prob,
            &mut self.result,
        );
    }

    /// Folding every replica must give the same state whatever the order.
    pub fn check_merge_order_independence(&mut self) {
        let forward: Vec<usize> = (0..self.replicas.len()).collect();
        let mut shuffled = forward.clone();
        self.rng.shuffle(&mut shuffled);

        let a = fold_in_order(&self.replicas, &forward);
        let b = fold_in_order(&self.replicas, &shuffled);
        if a != b {
            self.result.violation(format!(
                "Merge order {:?} and {:?} produced different states",
                forward, shuffled
            ));
        }
    }

    pub fn check_convergence(&mut self) {
        if self.replicas.is_empty() {
            self.result.converged = true;
            return;
        }

        let expected = self.replicas[0].effective_members();
        let mut violations = Vec::new();

        for (i, replica) in self.replicas.iter().enumerate() {
            let actual = replica.effective_members();
            if actual != expected {
                violations.push(format!(
                    "Replica {} has different elements: {:?} vs expected {:?}",
                    i, actual, expected
                ));
            }
            if replica.merged(replica) != *replica {
                violations.push(format!("Replica {} changed when merged with itself", i));
            }
        }

        for v in violations {
            self.result.violation(v);
        }
        self.result.converged = self.result.invariant_violations.is_empty();
        debug!("{}", self.result.summary());
    }

    pub fn replicas(&self) -> &[LwwElementSet<String>] {
        &self.replicas
    }

    pub fn result(&self) -> &DstResult {
        &self.result
    }

    pub fn into_result(self) -> DstResult {
        self.result
    }
}

// =============================================================================
// LWW Graph DST Harness
// =============================================================================

/// DST harness for the LWW element graph
pub struct LwwGraphDstHarness {
    config: DstConfig,
    rng: SimulatedRng,
    clock: SkewedClock,
    replicas: Vec<LwwElementGraph<u64>>,
    result: DstResult,
}

impl LwwGraphDstHarness {
    pub fn new(config: DstConfig) -> Self {
        Self::with_graph_config(config, GraphConfig::default())
    }

    /// All replicas share `graph_config`; differing policies cannot converge.
    pub fn with_graph_config(config: DstConfig, graph_config: GraphConfig) -> Self {
        let mut rng = SimulatedRng::new(config.seed);
        let clock = SkewedClock::new(&mut rng, config.num_replicas, config.max_clock_skew_ms);
        let replicas = (0..config.num_replicas)
            .map(|_| LwwElementGraph::with_config(graph_config))
            .collect();

        LwwGraphDstHarness {
            result: DstResult::new(config.seed),
            config,
            rng,
            clock,
            replicas,
        }
    }

    /// Run random operations
    pub fn run(&mut self, operations: usize) {
        if self.replicas.is_empty() {
            return;
        }
        for _ in 0..operations.min(self.config.max_operations) {
            if self.rng.gen_bool(self.config.gossip_prob) {
                gossip_once(
                    &mut self.replicas,
                    &mut self.rng,
                    self.config.message_drop_prob,
                    &mut self.result,
                );
                continue;
            }

            let replica_idx = self.rng.gen_range(0, self.config.num_replicas as u64) as usize;
            let accepted = self.apply_random_op(replica_idx);
            if !accepted {
                self.result.rejected_operations += 1;
            }

            if let Some(edge) = dangling_edge(&self.replicas[replica_idx]) {
                self.result.violation(format!(
                    "Replica {} reports edge {:?} with a missing endpoint",
                    replica_idx, edge
                ));
            }

            self.result.total_operations += 1;
            *self.result.ops_per_replica.entry(replica_idx).or_insert(0) += 1;
        }
    }

    fn apply_random_op(&mut self, replica_idx: usize) -> bool {
        let ts = self.clock.tick(&mut self.rng, replica_idx);
        let space = self.config.element_space;
        let roll = self.rng.gen_range(0, 100);
        let graph = &mut self.replicas[replica_idx];

        match roll {
            0..=34 => {
                graph.add_vertex(self.rng.gen_range(0, space), ts);
                true
            }
            35..=64 => {
                let from = self.rng.gen_range(0, space);
                let to = self.rng.gen_range(0, space);
                graph.add_edge_between(from, to, ts)
            }
            65..=79 => {
                // Sorted so the pick does not depend on hash iteration order
                let mut edges: Vec<Edge<u64>> = graph.edges().into_iter().collect();
                edges.sort();
                match self.rng.choose(&edges).cloned() {
                    Some(edge) => graph.remove_edge(edge, ts),
                    None => false,
                }
            }
            _ => graph.remove_vertex(self.rng.gen_range(0, space), ts),
        }
    }

    pub fn sync_all(&mut self) {
        sync_replicas(
            &mut self.replicas,
            &mut self.rng,
            self.config.message_drop_prob,
            &mut self.result,
        );
    }

    /// Folding every replica must give the same state and views whatever the order.
    pub fn check_merge_order_independence(&mut self) {
        let forward: Vec<usize> = (0..self.replicas.len()).collect();
        let reverse: Vec<usize> = forward.iter().rev().copied().collect();
        let mut shuffled = forward.clone();
        self.rng.shuffle(&mut shuffled);

        let reference: LwwElementGraph<u64> = fold_in_order(&self.replicas, &forward);
        for order in [reverse, shuffled] {
            let other: LwwElementGraph<u64> = fold_in_order(&self.replicas, &order);
            if other != reference
                || other.vertices() != reference.vertices()
                || other.edges() != reference.edges()
            {
                self.result.violation(format!(
                    "Merge order {:?} diverged from {:?}",
                    order, forward
                ));
            }
        }
    }

    pub fn check_convergence(&mut self) {
        if self.replicas.is_empty() {
            self.result.converged = true;
            return;
        }

        let expected_vertices: HashSet<u64> = self.replicas[0].vertices();
        let expected_edges: HashSet<Edge<u64>> = self.replicas[0].edges();
        let mut violations = Vec::new();

        for (i, replica) in self.replicas.iter().enumerate() {
            if replica.vertices() != expected_vertices {
                violations.push(format!(
                    "Replica {} has vertices {:?} but expected {:?}",
                    i,
                    replica.vertices(),
                    expected_vertices
                ));
            }
            if replica.edges() != expected_edges {
                violations.push(format!(
                    "Replica {} has edges {:?} but expected {:?}",
                    i,
                    replica.edges(),
                    expected_edges
                ));
            }
            if let Some(edge) = dangling_edge(replica) {
                violations.push(format!("Replica {} reports dangling edge {:?}", i, edge));
            }
            if replica.merged(replica) != *replica {
                violations.push(format!("Replica {} changed when merged with itself", i));
            }
        }

        for v in violations {
            self.result.violation(v);
        }
        self.result.masked_edges = self.replicas[0].masked_edges().len();
        self.result.converged = self.result.invariant_violations.is_empty();
        debug!("{}", self.result.summary());
    }

    pub fn replicas(&self) -> &[LwwElementGraph<u64>] {
        &self.replicas
    }

    pub fn result(&self) -> &DstResult {
        &self.result
    }

    pub fn into_result(self) -> DstResult {
        self.result
    }
}

fn dangling_edge(graph: &LwwElementGraph<u64>) -> Option<Edge<u64>> {
    let vertices = graph.vertices();
    graph
        .edges()
        .into_iter()
        .find(|edge| !vertices.contains(&edge.from) || !vertices.contains(&edge.to))
}

// =============================================================================
// Batch Runners
// =============================================================================

/// Run a batch of LWW set DST runs
pub fn run_set_batch(
    base_seed: u64,
    count: usize,
    ops_per_run: usize,
    config_fn: impl Fn(u64) -> DstConfig,
) -> Vec<DstResult> {
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        let seed = base_seed + i as u64;
        let mut harness = LwwSetDstHarness::new(config_fn(seed));
        harness.run(ops_per_run);
        harness.check_merge_order_independence();
        harness.sync_all();
        harness.check_convergence();

        results.push(harness.into_result());
    }

    results
}

/// Run a batch of LWW graph DST runs with shared graph policies
pub fn run_graph_batch(
    base_seed: u64,
    count: usize,
    ops_per_run: usize,
    graph_config: GraphConfig,
    config_fn: impl Fn(u64) -> DstConfig,
) -> Vec<DstResult> {
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        let seed = base_seed + i as u64;
        let mut harness = LwwGraphDstHarness::with_graph_config(config_fn(seed), graph_config);
        harness.run(ops_per_run);
        harness.check_merge_order_independence();
        harness.sync_all();
        harness.check_convergence();

        results.push(harness.into_result());
    }

    results
}

/// Summarize batch results
pub fn summarize_batch(results: &[DstResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed_seeds: Vec<u64> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.seed)
        .collect();

    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let total_syncs: u64 = results.iter().map(|r| r.syncs_performed).sum();
    let total_drops: u64 = results.iter().map(|r| r.messages_dropped).sum();
    let total_masked: usize = results.iter().map(|r| r.masked_edges).sum();

    let mut summary = format!(
        "Batch: {}/{} passed, {} total ops, {} syncs, {} drops, {} masked edges",
        passed, total, total_ops, total_syncs, total_drops, total_masked
    );

    if !failed_seeds.is_empty() {
        summary.push_str(&format!("\nFailed seeds: {:?}", failed_seeds));
    }

    summary
}
