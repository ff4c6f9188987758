use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::{debug, info};

use crate::as_graph::{ASGraph, ASN};
use crate::shared::{Relationships, SimError};

pub type Prefix = String;

/// Hard cap on propagation iterations; hitting it means the policies never
/// reached a fixed point.
const MAX_ITERATIONS: u32 = 20;

/// A route as installed in a RIB or queued for delivery. Immutable once
/// constructed; forwarding builds a new route. The AS path is newest hop
/// first, origin last, and the first element is always the ASN of the RIB
/// that holds the route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub prefix: Prefix,
    pub as_path: Vec<ASN>,
    pub learned_from: Relationships,
    pub rov_invalid: bool,
}

impl Route {
    /// An originated route. The from-customer class gives the origin
    /// unrestricted export rights over its own prefix.
    pub fn seed(prefix: Prefix, origin: ASN, rov_invalid: bool) -> Self {
        Route {
            prefix,
            as_path: vec![origin],
            learned_from: Relationships::Customers,
            rov_invalid,
        }
    }

    /// The route as it arrives at `receiver`: path prepended, class set to
    /// the sender's role from the receiver's viewpoint.
    pub fn forwarded(&self, receiver: ASN, learned_from: Relationships) -> Self {
        let mut as_path = Vec::with_capacity(self.as_path.len() + 1);
        as_path.push(receiver);
        as_path.extend_from_slice(&self.as_path);
        Route {
            prefix: self.prefix.clone(),
            as_path,
            learned_from,
            rov_invalid: self.rov_invalid,
        }
    }

    pub fn origin(&self) -> ASN {
        self.as_path[self.as_path.len() - 1]
    }

    /// Tie-break hop: the second path element, or the lone element for a
    /// seed route (only ever compared against itself at the origin).
    pub fn next_hop(&self) -> ASN {
        if self.as_path.len() >= 2 {
            self.as_path[1]
        } else {
            self.as_path[0]
        }
    }
}

/// Topological layering of the customer->provider DAG. Rank 0 holds the
/// ASes with no customers; rank k+1 holds the ASes whose customers are all
/// ranked by k.
pub struct RankTable {
    pub asn_to_rank: HashMap<ASN, usize>,
    pub rank_to_asns: Vec<Vec<ASN>>,
}

impl RankTable {
    /// Kahn layering by customer in-degree. Terminates because the cycle
    /// detector has already established the subgraph is a DAG.
    pub fn build(graph: &ASGraph) -> Self {
        let mut customer_count: HashMap<ASN, usize> = HashMap::new();
        for asn in graph.all_asns() {
            let customers = graph
                .neighbors(asn)
                .iter()
                .filter(|(_, rel)| *rel == Relationships::Customers)
                .count();
            customer_count.insert(asn, customers);
        }

        let mut queue: VecDeque<ASN> = customer_count
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&asn, _)| asn)
            .collect();

        let mut asn_to_rank = HashMap::new();
        let mut rank_to_asns: Vec<Vec<ASN>> = Vec::new();

        let mut current_rank = 0;
        while !queue.is_empty() {
            let layer_size = queue.len();
            rank_to_asns.push(Vec::with_capacity(layer_size));

            for _ in 0..layer_size {
                let asn = match queue.pop_front() {
                    Some(asn) => asn,
                    None => break,
                };
                asn_to_rank.insert(asn, current_rank);
                rank_to_asns[current_rank].push(asn);

                // The providers one layer up lose this customer
                for &(provider, rel) in graph.neighbors(asn) {
                    if rel != Relationships::Providers {
                        continue;
                    }
                    if let Some(count) = customer_count.get_mut(&provider) {
                        *count -= 1;
                        if *count == 0 {
                            queue.push_back(provider);
                        }
                    }
                }
            }
            current_rank += 1;
        }

        debug!(
            "flattened {} ASNs into {} ranks ({} at rank 0)",
            asn_to_rank.len(),
            rank_to_asns.len(),
            rank_to_asns.first().map_or(0, Vec::len),
        );

        RankTable {
            asn_to_rank,
            rank_to_asns,
        }
    }

    pub fn rank_of(&self, asn: ASN) -> Option<usize> {
        self.asn_to_rank.get(&asn).copied()
    }
}

/// Propagation engine: owns the graph, the per-AS RIBs, the per-AS inbound
/// queues, and the ROV set, and iterates UP/ACROSS/DOWN sweeps to a fixed
/// point.
pub struct SimulationEngine {
    as_graph: ASGraph,
    ribs: HashMap<ASN, HashMap<Prefix, Arc<Route>>>,
    message_queues: HashMap<ASN, HashMap<Prefix, Vec<Arc<Route>>>>,
    rov_asns: HashSet<ASN>,
}

impl SimulationEngine {
    pub fn new(as_graph: ASGraph) -> Self {
        SimulationEngine {
            as_graph,
            ribs: HashMap::new(),
            message_queues: HashMap::new(),
            rov_asns: HashSet::new(),
        }
    }

    pub fn set_rov_asns(&mut self, rov_asns: HashSet<ASN>) {
        self.rov_asns = rov_asns;
    }

    pub fn as_graph(&self) -> &ASGraph {
        &self.as_graph
    }

    pub fn ribs(&self) -> &HashMap<ASN, HashMap<Prefix, Arc<Route>>> {
        &self.ribs
    }

    pub fn rib(&self, asn: ASN) -> Option<&HashMap<Prefix, Arc<Route>>> {
        self.ribs.get(&asn)
    }

    pub fn rib_count(&self) -> usize {
        self.ribs.values().map(HashMap::len).sum()
    }

    /// Installs an originated route at `origin` and registers the ASN so an
    /// edge-less origin still gets a rank.
    pub fn seed_announcement(&mut self, origin: ASN, prefix: Prefix, rov_invalid: bool) {
        self.as_graph.register_asn(origin);
        debug!(
            "seeded AS {} -> {}{}",
            origin,
            prefix,
            if rov_invalid { " (ROV invalid)" } else { "" }
        );
        let route = Arc::new(Route::seed(prefix.clone(), origin, rov_invalid));
        self.ribs.entry(origin).or_default().insert(prefix, route);
    }

    /// Gao-Rexford export rule: customer-learned routes go everywhere,
    /// peer- and provider-learned routes go to customers only.
    pub fn can_export(route: &Route, outbound: Relationships) -> bool {
        match route.learned_from {
            Relationships::Customers => true,
            Relationships::Peers | Relationships::Providers => {
                outbound == Relationships::Customers
            }
        }
    }

    /// Queues `route` at `receiver`, unless the path already visited the
    /// receiver or export policy forbids the direction. `outbound` is the
    /// receiver's role relative to the sender.
    fn send_route(&mut self, receiver: ASN, route: &Arc<Route>, outbound: Relationships) {
        if route.as_path.contains(&receiver) {
            return;
        }
        if !Self::can_export(route, outbound) {
            return;
        }
        let forwarded = Arc::new(route.forwarded(receiver, outbound.invert()));
        self.message_queues
            .entry(receiver)
            .or_default()
            .entry(route.prefix.clone())
            .or_default()
            .push(forwarded);
    }

    /// Sends every RIB route of `sender` to every neighbor reached through
    /// the given direction.
    fn send_rib_to(&mut self, sender: ASN, direction: Relationships) {
        let routes: Vec<Arc<Route>> = match self.ribs.get(&sender) {
            Some(rib) => rib.values().cloned().collect(),
            None => return,
        };
        let receivers: Vec<ASN> = self
            .as_graph
            .neighbors(sender)
            .iter()
            .filter(|(_, rel)| *rel == direction)
            .map(|&(neighbor, _)| neighbor)
            .collect();

        for route in &routes {
            for &receiver in &receivers {
                self.send_route(receiver, route, direction);
            }
        }
    }

    /// Strict "candidate beats incumbent" decision: ROV validity (at
    /// ROV-enabled ASes), then relationship class, then path length, then
    /// smaller next hop. Total and deterministic; an exact identity tie
    /// keeps the incumbent.
    pub fn better_route(candidate: &Route, existing: &Route, rov_enabled: bool) -> bool {
        if rov_enabled && candidate.rov_invalid != existing.rov_invalid {
            return !candidate.rov_invalid;
        }

        let new_pref = candidate.learned_from.gao_rexford_preference();
        let existing_pref = existing.learned_from.gao_rexford_preference();
        if new_pref != existing_pref {
            return new_pref > existing_pref;
        }

        if candidate.as_path.len() != existing.as_path.len() {
            return candidate.as_path.len() < existing.as_path.len();
        }

        candidate.next_hop() < existing.next_hop()
    }

    /// Consumes every queued candidate at `asn`, installing each one that is
    /// strictly better than the incumbent, then clears the queue.
    fn process_messages(&mut self, asn: ASN) {
        let queues = match self.message_queues.get_mut(&asn) {
            Some(queues) => queues,
            None => return,
        };
        let rov_enabled = self.rov_asns.contains(&asn);
        let rib = self.ribs.entry(asn).or_default();

        for (prefix, candidates) in queues.drain() {
            for route in candidates {
                if rov_enabled && route.rov_invalid {
                    continue;
                }
                let install = match rib.get(&prefix) {
                    None => true,
                    Some(existing) => Self::better_route(&route, existing, rov_enabled),
                };
                if install {
                    rib.insert(prefix.clone(), route);
                }
            }
        }
    }

    /// Runs UP/ACROSS/DOWN sweeps until the total RIB entry count is stable,
    /// up to the iteration cap. Returns the number of iterations used.
    ///
    /// UP and DOWN process the next rank inside the rank loop, so a single
    /// iteration carries a route across many layers.
    pub fn propagate(&mut self) -> Result<u32, SimError> {
        let ranks = RankTable::build(&self.as_graph);
        let layers = &ranks.rank_to_asns;

        let mut iteration = 0;
        let mut prev_total = 0;

        loop {
            iteration += 1;

            // Phase UP: customers -> providers
            for rank in 0..layers.len() {
                for &asn in &layers[rank] {
                    self.send_rib_to(asn, Relationships::Providers);
                }
                if rank + 1 < layers.len() {
                    for &asn in &layers[rank + 1] {
                        self.process_messages(asn);
                    }
                }
            }

            // Phase ACROSS: peers <-> peers, one layer at a time
            for layer in layers {
                for &asn in layer {
                    self.send_rib_to(asn, Relationships::Peers);
                }
                for &asn in layer {
                    self.process_messages(asn);
                }
            }

            // Phase DOWN: providers -> customers
            for rank in (0..layers.len()).rev() {
                for &asn in &layers[rank] {
                    self.send_rib_to(asn, Relationships::Customers);
                }
                if rank > 0 {
                    for &asn in &layers[rank - 1] {
                        self.process_messages(asn);
                    }
                }
            }

            let total = self.rib_count();
            debug!("iteration {}: {} total routes", iteration, total);

            if total == prev_total {
                info!("converged after {} iterations", iteration);
                return Ok(iteration);
            }
            prev_total = total;

            if iteration >= MAX_ITERATIONS {
                return Err(SimError::NoConvergence {
                    iterations: iteration,
                });
            }
        }
    }
}
