//! Relational causal discovery.
//!
//! Phase I prunes the space of potential dependencies with conditional
//! independence tests, leaving an undirected skeleton. Phase II orients it with
//! collider detection, known non-colliders, cycle avoidance, Meek rule 3 and
//! relational bivariate orientation, reasoning over one abstract ground graph
//! per schema item at twice the hop threshold.

use crate::citest::CiTest;
use crate::error::RcdError;
use crate::orientation::{
    OrientationUsage, Rule, cycle_avoidance_candidates, is_undirected, known_non_collider_candidates,
    mr3_candidates, unshielded_triples_at,
};
use crate::sepset::{Sepset, SepsetMap};
use itertools::Itertools;
use rcd_core::config::{LearningConfig, RboOrder};
use rcd_core::space::relational_dependencies;
use rcd_core::validity::{check_relational_dependency, check_relational_variable_set};
use rcd_core::{RelationalDependency, RelationalVariable, Schema};
use rcd_dsep::{AbstractGroundGraph, AggNode, DSeparationError, DepId, DependencyTable, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// Number of CI tests run, split by phase and, for Phase I, by conditioning set size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CiRecord {
    pub phase_one: usize,
    pub phase_two: usize,
    pub total: usize,
    pub by_depth: BTreeMap<usize, usize>,
}

/// Summed node and edge counts over all abstract ground graphs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggStats {
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    One,
    Two,
}

type CiKey = (RelationalVariable, RelationalVariable, Vec<RelationalVariable>);

/// Relational causal discovery over one schema with one CI test.
pub struct Rcd<C: CiTest> {
    schema: Schema,
    citest: C,
    hop_threshold: usize,
    depth: Option<usize>,
    rbo_order: RboOrder,
    order_independent_skeleton: bool,
    transitive_skeleton_removal: bool,
    table: DependencyTable,
    /// One graph per schema item, in [`Schema::schema_items`] order.
    aggs: Vec<AbstractGroundGraph>,
    undirected: Option<Vec<RelationalDependency>>,
    sepsets: Option<SepsetMap>,
    oriented: Option<BTreeSet<RelationalDependency>>,
    ci_cache: HashMap<CiKey, bool>,
    ci_record: CiRecord,
    usage: OrientationUsage,
    max_depth_reached: Option<usize>,
    full_stats: Option<AggStats>,
    after_stats: Option<AggStats>,
}

impl<C: CiTest> Rcd<C> {
    /// `depth` caps the conditioning set size; `None` derives it from the
    /// largest abstract ground graph.
    pub fn new(schema: Schema, citest: C, hop_threshold: usize, depth: Option<usize>) -> Self {
        Self {
            schema,
            citest,
            hop_threshold,
            depth,
            rbo_order: RboOrder::default(),
            order_independent_skeleton: false,
            transitive_skeleton_removal: false,
            table: DependencyTable::new(),
            aggs: Vec::new(),
            undirected: None,
            sepsets: None,
            oriented: None,
            ci_cache: HashMap::new(),
            ci_record: CiRecord::default(),
            usage: OrientationUsage::default(),
            max_depth_reached: None,
            full_stats: None,
            after_stats: None,
        }
    }

    pub fn from_config(schema: Schema, citest: C, config: &LearningConfig) -> Self {
        Self::new(schema, citest, config.hop_threshold, config.depth)
            .with_rbo_order(config.rbo_order)
            .with_order_independent_skeleton(config.order_independent_skeleton)
            .with_transitive_skeleton_removal(config.transitive_skeleton_removal)
    }

    /// Rule order used by [`Rcd::run`].
    pub fn with_rbo_order(mut self, order: RboOrder) -> Self {
        self.rbo_order = order;
        self
    }

    pub fn with_order_independent_skeleton(mut self, enabled: bool) -> Self {
        self.order_independent_skeleton = enabled;
        self
    }

    pub fn with_transitive_skeleton_removal(mut self, enabled: bool) -> Self {
        self.transitive_skeleton_removal = enabled;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn citest(&self) -> &C {
        &self.citest
    }

    pub fn hop_threshold(&self) -> usize {
        self.hop_threshold
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    pub fn undirected_dependencies(&self) -> Option<&[RelationalDependency]> {
        self.undirected.as_deref()
    }

    pub fn oriented_dependencies(&self) -> Option<&BTreeSet<RelationalDependency>> {
        self.oriented.as_ref()
    }

    pub fn sepsets(&self) -> Option<&SepsetMap> {
        self.sepsets.as_ref()
    }

    pub fn ci_record(&self) -> &CiRecord {
        &self.ci_record
    }

    pub fn orientation_usage(&self) -> &OrientationUsage {
        &self.usage
    }

    pub fn reset_orientation_usage(&mut self) {
        self.usage = OrientationUsage::default();
    }

    /// Largest conditioning set size Phase I reached.
    pub fn max_depth_reached(&self) -> Option<usize> {
        self.max_depth_reached
    }

    /// Graph sizes right after Phase I built them.
    pub fn full_agg_stats(&self) -> Option<AggStats> {
        self.full_stats
    }

    /// Graph sizes after Phase II.
    pub fn oriented_agg_stats(&self) -> Option<AggStats> {
        self.after_stats
    }

    pub fn abstract_ground_graphs(&self) -> &[AbstractGroundGraph] {
        &self.aggs
    }

    pub fn abstract_ground_graph(&self, perspective: &str) -> Option<&AbstractGroundGraph> {
        self.aggs.iter().find(|agg| agg.perspective() == perspective)
    }

    /// Phase I followed by Phase II with the configured rule order.
    pub fn run(&mut self) -> Result<&BTreeSet<RelationalDependency>, RcdError> {
        self.identify_undirected_dependencies()?;
        self.orient_dependencies(self.rbo_order)
    }

    // Phase I

    /// Prune potential dependencies until only those no conditioning set
    /// separates remain.
    pub fn identify_undirected_dependencies(&mut self) -> Result<&[RelationalDependency], RcdError> {
        info!(hop_threshold = self.hop_threshold, "phase I: identifying undirected dependencies");
        let mut potential = relational_dependencies(&self.schema, self.hop_threshold, false);
        potential.sort();
        self.construct_aggs(&potential)?;
        self.full_stats = Some(self.agg_stats());
        self.sepsets = Some(SepsetMap::new());
        self.max_depth_reached = None;
        let depth = self.resolve_depth();
        info!(count = potential.len(), depth, "potential dependencies");

        let mut live: HashSet<RelationalDependency> = potential.iter().cloned().collect();
        let mut round = potential;
        for size in 0..=depth {
            self.max_depth_reached = Some(size);
            info!(size, remaining = round.len(), "conditioning set size");
            let mut tested_any = false;
            let mut deferred = Vec::new();
            for dep in &round {
                if !live.contains(dep) {
                    continue;
                }
                let (sepset, tested) = self.find_sepset(&dep.cause, &dep.effect, size, Phase::One)?;
                tested_any |= tested;
                let Some(sepset) = sepset else {
                    continue;
                };
                debug!(%dep, ?sepset, "removing dependency");
                if let Some(sepsets) = self.sepsets.as_mut() {
                    sepsets.insert_symmetric(&dep.cause, &dep.effect, sepset);
                }
                live.remove(dep);
                live.remove(&dep.reverse());
                if self.order_independent_skeleton {
                    deferred.push(dep.clone());
                } else {
                    self.remove_dependency(dep);
                }
            }
            for dep in &deferred {
                self.remove_dependency(dep);
            }
            round.retain(|dep| live.contains(dep));
            if !tested_any {
                break;
            }
        }

        info!(count = round.len(), "undirected dependencies");
        self.log_record();
        Ok(self.undirected.insert(round).as_slice())
    }

    /// Replace the skeleton, rebuilding the abstract ground graphs from it.
    pub fn set_undirected_dependencies(&mut self, dependencies: &[&str]) -> Result<(), RcdError> {
        let deps = dependencies
            .iter()
            .map(|s| s.parse::<RelationalDependency>())
            .collect::<Result<Vec<_>, _>>()?;
        self.replace_undirected_dependencies(deps)
    }

    /// [`Rcd::set_undirected_dependencies`] for already parsed dependencies.
    pub fn replace_undirected_dependencies(&mut self, deps: Vec<RelationalDependency>) -> Result<(), RcdError> {
        for dep in &deps {
            check_relational_dependency(&self.schema, dep)?;
        }
        self.construct_aggs(&deps)?;
        self.undirected = Some(deps);
        Ok(())
    }

    /// Replace the sepsets. Every entry, together with its pair, must be a valid
    /// variable set within the hop threshold.
    pub fn set_sepsets(&mut self, sepsets: SepsetMap) -> Result<(), RcdError> {
        for (a, b, sepset) in sepsets.iter() {
            check_relational_variable_set(
                &self.schema,
                self.hop_threshold,
                [a, b].into_iter().chain(sepset.iter()),
            )?;
        }
        self.sepsets = Some(sepsets);
        Ok(())
    }

    fn construct_aggs(&mut self, dependencies: &[RelationalDependency]) -> Result<(), RcdError> {
        let hop = 2 * self.hop_threshold;
        let mut table = DependencyTable::new();
        let mut aggs = Vec::new();
        for item in self.schema.schema_items() {
            aggs.push(AbstractGroundGraph::build(
                &self.schema,
                dependencies,
                item.name(),
                hop,
                &mut table,
            )?);
        }
        self.table = table;
        self.aggs = aggs;
        Ok(())
    }

    fn resolve_depth(&mut self) -> usize {
        *self.depth.get_or_insert_with(|| {
            self.aggs
                .iter()
                .map(AbstractGroundGraph::node_count)
                .max()
                .unwrap_or(0)
                .saturating_sub(2)
        })
    }

    fn agg_stats(&self) -> AggStats {
        self.aggs.iter().fold(AggStats::default(), |acc, agg| AggStats {
            nodes: acc.nodes + agg.node_count(),
            edges: acc.edges + agg.edge_count(),
        })
    }

    fn remove_dependency(&mut self, dep: &RelationalDependency) {
        let ids: Vec<DepId> = [self.table.id(dep), self.table.id(&dep.reverse())]
            .into_iter()
            .flatten()
            .collect();
        self.propagate_removal(ids, self.transitive_skeleton_removal);
    }

    /// Remove `seeds` from every graph. When `transitive`, dependencies that
    /// shared an edge with a removed one are removed as well, to a fixpoint.
    fn propagate_removal(&mut self, seeds: impl IntoIterator<Item = DepId>, transitive: bool) {
        let mut queue: Vec<DepId> = seeds.into_iter().collect();
        let mut seen: HashSet<DepId> = queue.iter().copied().collect();
        while let Some(id) = queue.pop() {
            for agg in &mut self.aggs {
                let others = agg.remove_edges_for_dependency(id);
                if transitive {
                    for other in others {
                        if seen.insert(other) {
                            queue.push(other);
                        }
                    }
                }
            }
        }
    }

    /// Search size-`size` subsets of the effect's neighbors for a set that
    /// separates `cause` from `effect`. Also reports whether any test was run.
    fn find_sepset(
        &mut self,
        cause: &RelationalVariable,
        effect: &RelationalVariable,
        size: usize,
        phase: Phase,
    ) -> Result<(Option<Sepset>, bool), RcdError> {
        let neighbors = self.sepset_candidates(cause, effect, phase)?;
        if size > neighbors.len() {
            return Ok((None, false));
        }

        let mut tested = false;
        for candidate in neighbors.into_iter().combinations(size) {
            tested = true;
            let key = (cause.clone(), effect.clone(), candidate);
            let independent = match self.ci_cache.get(&key) {
                Some(&cached) => cached,
                None => {
                    self.record_test(phase, size);
                    let result = self.citest.is_conditionally_independent(cause, effect, &key.2)?;
                    self.ci_cache.insert(key.clone(), result);
                    result
                }
            };
            if independent {
                return Ok((Some(key.2.into_iter().collect()), true));
            }
        }
        Ok((None, tested))
    }

    /// Variables adjacent to `effect` in its perspective's graph, minus `cause`.
    /// Intersections contribute both sources. Phase I keeps only variables
    /// within the hop threshold.
    fn sepset_candidates(
        &self,
        cause: &RelationalVariable,
        effect: &RelationalVariable,
        phase: Phase,
    ) -> Result<BTreeSet<RelationalVariable>, RcdError> {
        let agg = self
            .abstract_ground_graph(effect.base_item())
            .ok_or_else(|| DSeparationError::UnknownPerspective(effect.base_item().to_string()))?;
        let idx = agg
            .variable_index(effect)
            .ok_or_else(|| DSeparationError::NotANode(effect.to_string()))?;
        let bound = (phase == Phase::One).then_some(self.hop_threshold + 1);
        let within = |v: &RelationalVariable| bound.is_none_or(|b| v.path_len() <= b);

        let mut neighbors = BTreeSet::new();
        for n in agg.adjacent(idx) {
            match agg.node(n) {
                AggNode::Variable(v) => {
                    if within(v) {
                        neighbors.insert(v.clone());
                    }
                }
                AggNode::Intersection(i) => {
                    if i.sources().into_iter().all(within) {
                        neighbors.extend(i.sources().into_iter().cloned());
                    }
                }
            }
        }
        neighbors.remove(cause);
        Ok(neighbors)
    }

    fn record_test(&mut self, phase: Phase, size: usize) {
        match phase {
            Phase::One => {
                self.ci_record.phase_one += 1;
                *self.ci_record.by_depth.entry(size).or_insert(0) += 1;
            }
            Phase::Two => self.ci_record.phase_two += 1,
        }
        self.ci_record.total += 1;
    }

    fn log_record(&self) {
        info!(
            phase_one = self.ci_record.phase_one,
            phase_two = self.ci_record.phase_two,
            total = self.ci_record.total,
            "CI tests"
        );
    }

    // Phase II

    /// Orient the skeleton, returning every dependency that survives on some
    /// edge of some graph.
    pub fn orient_dependencies(&mut self, order: RboOrder) -> Result<&BTreeSet<RelationalDependency>, RcdError> {
        info!(%order, "phase II: orienting dependencies");
        if self.undirected.is_none() {
            return Err(RcdError::PrerequisiteMissing(
                "No undirected dependencies found. Try running Phase I first.",
            ));
        }
        if self.sepsets.is_none() {
            return Err(RcdError::PrerequisiteMissing("No sepsets found. Try running Phase I first."));
        }
        self.resolve_depth();

        loop {
            let fired = match order {
                RboOrder::Normal => {
                    let cd = self.apply_collider_detection()?;
                    let rbo = self.apply_rbo()?;
                    let rest = self.apply_sepset_free_rules();
                    cd | rbo | rest
                }
                RboOrder::First => {
                    let rbo = self.apply_rbo()?;
                    let cd = self.apply_collider_detection()?;
                    let rest = self.apply_sepset_free_rules();
                    rbo | cd | rest
                }
                RboOrder::Last => {
                    let cd = self.apply_collider_detection()?;
                    let rest = self.apply_sepset_free_rules();
                    let rbo = self.apply_rbo()?;
                    let more = self.apply_sepset_free_rules();
                    cd | rest | rbo | more
                }
            };
            if !fired {
                break;
            }
        }

        self.after_stats = Some(self.agg_stats());
        let mut oriented = BTreeSet::new();
        for agg in &self.aggs {
            for (_, _, tags) in agg.edges() {
                oriented.extend(tags.iter().filter_map(|&id| self.table.resolve(id)).cloned());
            }
        }
        info!(count = oriented.len(), "oriented dependencies");
        self.log_record();
        info!(
            cd = self.usage.cd,
            knc = self.usage.knc,
            ca = self.usage.ca,
            mr3 = self.usage.mr3,
            rbo = self.usage.rbo,
            "orientation rule usage"
        );
        Ok(&*self.oriented.insert(oriented))
    }

    /// The recorded sepset of `(a, c)`, searching for one over the full
    /// neighborhood of `c` when none is known.
    fn find_record_and_return_sepset(
        &mut self,
        a: &RelationalVariable,
        c: &RelationalVariable,
    ) -> Result<Option<Sepset>, RcdError> {
        if let Some(sepset) = self.sepsets.as_ref().and_then(|m| m.get(a, c)) {
            return Ok(Some(sepset.clone()));
        }
        debug!(%a, %c, "searching for sepset");
        for size in 0..=self.depth.unwrap_or(0) {
            let (found, tested) = self.find_sepset(a, c, size, Phase::Two)?;
            if let Some(sepset) = found {
                debug!(?sepset, "recording sepset");
                if let Some(sepsets) = self.sepsets.as_mut() {
                    sepsets.insert_symmetric(a, c, sepset.clone());
                }
                return Ok(Some(sepset));
            }
            if !tested {
                break;
            }
        }
        Ok(None)
    }

    /// Orient `from -> to` in graph `g` by removing the dependencies behind
    /// `to -> from` everywhere.
    fn orient(&mut self, g: usize, from: NodeIndex, to: NodeIndex, rule: Rule) {
        let agg = &self.aggs[g];
        let Some(tags) = agg.underlying_dependencies(to, from).cloned() else {
            return;
        };
        info!(%rule, edge = %format!("{} -> {}", agg.node(from), agg.node(to)), "oriented edge");
        self.propagate_removal(tags, true);
        self.usage.record(rule);
    }

    fn variables(&self, g: usize, nodes: &[NodeIndex]) -> Option<Vec<RelationalVariable>> {
        nodes
            .iter()
            .map(|&n| self.aggs[g].node(n).as_variable().cloned())
            .collect()
    }

    fn is_variable(&self, g: usize, n: NodeIndex) -> bool {
        self.aggs[g].node(n).is_variable()
    }

    fn apply_collider_detection(&mut self) -> Result<bool, RcdError> {
        let mut fired = false;
        for g in 0..self.aggs.len() {
            let nodes: Vec<NodeIndex> = self.aggs[g].node_indices().collect();
            for n1 in nodes {
                for (n2, n3) in unshielded_triples_at(&self.aggs[g], n1) {
                    let Some(vars) = self.variables(g, &[n1, n2, n3]) else {
                        continue;
                    };
                    let [v1, v2, v3] = [&vars[0], &vars[1], &vars[2]];
                    if v1.attr_name() == v3.attr_name() || v3.path_len() > 1 {
                        continue;
                    }
                    let agg = &self.aggs[g];
                    let still_collider = agg.has_edge(n1, n2)
                        && agg.has_edge(n3, n2)
                        && (agg.has_edge(n2, n1) || agg.has_edge(n2, n3));
                    if !still_collider {
                        continue;
                    }
                    debug!(%v1, %v2, %v3, "CD candidate");
                    let Some(sepset) = self.find_record_and_return_sepset(v1, v3)? else {
                        continue;
                    };
                    if sepset.contains(v2) || sepset.iter().any(|s| v2.intersects(s)) {
                        continue;
                    }
                    if is_undirected(&self.aggs[g], n1, n2) {
                        self.orient(g, n1, n2, Rule::ColliderDetection);
                        fired = true;
                    }
                    if is_undirected(&self.aggs[g], n2, n3) {
                        self.orient(g, n3, n2, Rule::ColliderDetection);
                        fired = true;
                    }
                }
            }
        }
        Ok(fired)
    }

    fn apply_rbo(&mut self) -> Result<bool, RcdError> {
        let mut fired = false;
        for g in 0..self.aggs.len() {
            let nodes: Vec<NodeIndex> = self.aggs[g].node_indices().collect();
            for n1 in nodes {
                for (n2, n3) in unshielded_triples_at(&self.aggs[g], n1) {
                    let Some(vars) = self.variables(g, &[n1, n2, n3]) else {
                        continue;
                    };
                    let [v1, v2, v3] = [&vars[0], &vars[1], &vars[2]];
                    if v1.attr_name() != v3.attr_name() || v3.path_len() > 1 {
                        continue;
                    }
                    let agg = &self.aggs[g];
                    if !(is_undirected(agg, n1, n2) && is_undirected(agg, n2, n3)) {
                        continue;
                    }
                    debug!(%v1, %v2, %v3, "RBO candidate");
                    let Some(sepset) = self.find_record_and_return_sepset(v1, v3)? else {
                        continue;
                    };
                    if !is_undirected(&self.aggs[g], n2, n3) {
                        continue;
                    }
                    let common_cause = sepset.contains(v2) || sepset.iter().any(|s| v2.intersects(s));
                    if common_cause {
                        self.orient(g, n2, n3, Rule::Rbo);
                    } else {
                        self.orient(g, n3, n2, Rule::Rbo);
                    }
                    fired = true;
                }
            }
        }
        Ok(fired)
    }

    /// Known non-colliders, cycle avoidance and MR3, the first that fires
    /// restarting the sequence, until none fires.
    fn apply_sepset_free_rules(&mut self) -> bool {
        let mut fired = false;
        while self.apply_known_non_colliders() || self.apply_cycle_avoidance() || self.apply_mr3() {
            fired = true;
        }
        fired
    }

    fn apply_known_non_colliders(&mut self) -> bool {
        let mut fired = false;
        for g in 0..self.aggs.len() {
            for (_, n2, n3) in known_non_collider_candidates(&self.aggs[g]) {
                if is_undirected(&self.aggs[g], n2, n3) && self.is_variable(g, n2) && self.is_variable(g, n3) {
                    self.orient(g, n2, n3, Rule::KnownNonColliders);
                    fired = true;
                }
            }
        }
        fired
    }

    fn apply_cycle_avoidance(&mut self) -> bool {
        let mut fired = false;
        for g in 0..self.aggs.len() {
            for (n1, _, n3) in cycle_avoidance_candidates(&self.aggs[g]) {
                if is_undirected(&self.aggs[g], n1, n3) && self.is_variable(g, n1) && self.is_variable(g, n3) {
                    self.orient(g, n1, n3, Rule::CycleAvoidance);
                    fired = true;
                }
            }
        }
        fired
    }

    fn apply_mr3(&mut self) -> bool {
        let mut fired = false;
        for g in 0..self.aggs.len() {
            for (n1, n2, _, _) in mr3_candidates(&self.aggs[g]) {
                if is_undirected(&self.aggs[g], n1, n2) && self.is_variable(g, n1) && self.is_variable(g, n2) {
                    self.orient(g, n1, n2, Rule::Mr3);
                    fired = true;
                }
            }
        }
        fired
    }
}

/// Run both phases with the default rule order and return the oriented dependencies.
pub fn run_rcd<C: CiTest>(
    schema: Schema,
    citest: C,
    hop_threshold: usize,
    depth: Option<usize>,
) -> Result<BTreeSet<RelationalDependency>, RcdError> {
    let mut rcd = Rcd::new(schema, citest, hop_threshold, depth);
    Ok(rcd.run()?.clone())
}
