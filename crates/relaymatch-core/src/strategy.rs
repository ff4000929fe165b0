//! The eight assignment strategies. Each one maps every session client to an eligible relay
//! datacenter, starting from a fresh [`Assignment`], and reports the resulting [`Outcome`].
//!
//! Strategies are dispatched through [`Strategy::ALL`], so adding a strategy means adding an enum
//! variant and an arm here; the driver iterates the table unchanged.

use itertools::Itertools;
use log::trace;
use ordered_float::OrderedFloat;
use rand::prelude::*;

use crate::assignment::Assignment;
use crate::eligibility::{DelayBounds, EligibleRelay, Eligibility};
use crate::evaluate::{self, Outcome};
use crate::topology::{ClientId, DcId, Topology};

/// An interchangeable client-to-relay assignment heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Cheapest relay by amortized combined price, evaluated with fractional server counts. The
    /// reported cost is a lower bound no realizable assignment can beat.
    LowerBound,
    /// Uniformly random eligible relay.
    Random,
    /// Eligible relay with the smallest client-to-relay delay.
    Nearest,
    /// Eligible relay with the smallest server price.
    LowestServerPrice,
    /// Eligible relay with the smallest bandwidth price.
    LowestBandwidthPrice,
    /// Same per-client rule as the lower bound, but evaluated with realized (ceiling) costs.
    LowestCombinedPrice,
    /// Iterative bin-filling: repeatedly give the datacenter with the fullest final server batch
    /// all of its unassigned coverable clients.
    LowestCapacityWastage,
    /// Iterative server opening: repeatedly open one server at the datacenter with the lowest
    /// projected average cost per client.
    LowestAverageCost,
}

impl Strategy {
    /// Every registered strategy, in reporting order. The lower bound comes first because the
    /// output aggregation normalizes total costs by it.
    pub const ALL: [Strategy; 8] = [
        Strategy::LowerBound,
        Strategy::Random,
        Strategy::Nearest,
        Strategy::LowestServerPrice,
        Strategy::LowestBandwidthPrice,
        Strategy::LowestCombinedPrice,
        Strategy::LowestCapacityWastage,
        Strategy::LowestAverageCost,
    ];

    /// Short name used in logs and output tables.
    pub fn short_name(self) -> &'static str {
        match self {
            Strategy::LowerBound => "LB",
            Strategy::Random => "RANDOM",
            Strategy::Nearest => "NEAREST",
            Strategy::LowestServerPrice => "LSP",
            Strategy::LowestBandwidthPrice => "LBP",
            Strategy::LowestCombinedPrice => "LCP",
            Strategy::LowestCapacityWastage => "LCW",
            Strategy::LowestAverageCost => "LAC",
        }
    }

    /// Assign every session client to one of its eligible relays and evaluate the result.
    ///
    /// PRECONDITION: the matchmaker guarantees every client in `clients` has a non-empty eligible
    /// set in `eligibility`; a client without one is a contract violation and panics.
    pub fn run_basic<R: Rng>(
        self,
        topology: &Topology,
        host: DcId,
        clients: &[ClientId],
        eligibility: &Eligibility,
        capacity: u32,
        rng: &mut R,
    ) -> (Assignment, Outcome) {
        let assignment = match self {
            Strategy::LowerBound | Strategy::LowestCombinedPrice => {
                assign_combined_price(topology, clients, eligibility, capacity)
            }
            Strategy::Random => assign_random(clients, eligibility, rng),
            Strategy::Nearest => assign_each(clients, eligibility, |_, r| {
                (OrderedFloat(r.delay), OrderedFloat(r.price_server))
            }),
            Strategy::LowestServerPrice => assign_each(clients, eligibility, |_, r| {
                (OrderedFloat(r.price_server), OrderedFloat(r.delay))
            }),
            Strategy::LowestBandwidthPrice => assign_each(clients, eligibility, |_, r| {
                (OrderedFloat(r.price_bandwidth), OrderedFloat(r.delay))
            }),
            // Batching by capacity is degenerate below 2; both iterative strategies fall back to
            // the combined-price rule there.
            Strategy::LowestCapacityWastage if capacity < 2 => {
                assign_combined_price(topology, clients, eligibility, capacity)
            }
            Strategy::LowestCapacityWastage => {
                assign_capacity_wastage(topology, eligibility, capacity)
            }
            Strategy::LowestAverageCost if capacity < 2 => {
                assign_combined_price(topology, clients, eligibility, capacity)
            }
            Strategy::LowestAverageCost => assign_average_cost(topology, eligibility, capacity),
        };
        let outcome = match self {
            Strategy::LowerBound => {
                evaluate::evaluate_fractional(topology, capacity, clients, host, &assignment)
            }
            _ => evaluate::evaluate(topology, capacity, clients, host, &assignment),
        };
        trace!(
            "{} at host {host}: total cost {:.3}",
            self.short_name(),
            outcome.total_cost
        );
        (assignment, outcome)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Pick each client's relay independently by a sort key. Ties on the full key go to the
/// first-encountered relay, i.e. the lowest datacenter id.
fn assign_each<K: Ord>(
    clients: &[ClientId],
    eligibility: &Eligibility,
    key: impl Fn(ClientId, &EligibleRelay) -> K,
) -> Assignment {
    let mut assignment = Assignment::new();
    for &client in clients {
        let relays = eligibility.relays(client);
        let best = relays
            .iter()
            .position_min_by_key(|r| key(client, r))
            .expect("session client has no eligible relays");
        assignment.assign(client, relays[best].dc);
    }
    assignment
}

fn assign_combined_price(
    topology: &Topology,
    clients: &[ClientId],
    eligibility: &Eligibility,
    capacity: u32,
) -> Assignment {
    assign_each(clients, eligibility, |client, relay| {
        let traffic = topology.client(client).traffic_volume;
        (
            OrderedFloat(relay.combined_price(capacity, traffic)),
            OrderedFloat(relay.delay),
        )
    })
}

fn assign_random<R: Rng>(
    clients: &[ClientId],
    eligibility: &Eligibility,
    rng: &mut R,
) -> Assignment {
    let mut assignment = Assignment::new();
    for &client in clients {
        let relay = eligibility
            .relays(client)
            .choose(rng)
            .expect("session client has no eligible relays");
        assignment.assign(client, relay.dc);
    }
    assignment
}

/// The datacenters that still have unassigned coverable clients, scanned in datacenter-id order,
/// each paired with those clients.
fn unassigned_candidates(
    topology: &Topology,
    eligibility: &Eligibility,
    assignment: &Assignment,
) -> Vec<(DcId, Vec<ClientId>)> {
    topology
        .dc_ids()
        .filter_map(|dc| {
            let unassigned = eligibility
                .coverable(dc)
                .iter()
                .copied()
                .filter(|&c| !assignment.is_assigned(c))
                .collect::<Vec<_>>();
            (!unassigned.is_empty()).then_some((dc, unassigned))
        })
        .collect()
}

/// Lowest capacity wastage: each round, every candidate datacenter's fill utilization is the
/// occupancy of its final server batch, `(n mod capacity) / capacity`, with an exact multiple
/// counting as fully used. The highest-utilization candidate (ties to the lower server price,
/// then to the first encountered) receives *all* of its unassigned coverable clients at once.
///
/// Each round assigns at least one client, so the loop terminates; when no datacenter retains
/// unassigned coverable clients, every coverable client is assigned.
fn assign_capacity_wastage(
    topology: &Topology,
    eligibility: &Eligibility,
    capacity: u32,
) -> Assignment {
    let cap = capacity as usize;
    let utilization = |n: usize| {
        if n % cap == 0 {
            1.0
        } else {
            (n % cap) as f64 / cap as f64
        }
    };
    let mut assignment = Assignment::new();
    loop {
        let candidates = unassigned_candidates(topology, eligibility, &assignment);
        if candidates.is_empty() {
            break;
        }
        let mut best = 0;
        for i in 1..candidates.len() {
            let util_i = utilization(candidates[i].1.len());
            let util_best = utilization(candidates[best].1.len());
            let price_i = topology.datacenter(candidates[i].0).price_server;
            let price_best = topology.datacenter(candidates[best].0).price_server;
            if util_i > util_best || (util_i == util_best && price_i < price_best) {
                best = i;
            }
        }
        let (dc, unassigned) = &candidates[best];
        for &client in unassigned {
            assignment.assign(client, *dc);
        }
    }
    assignment
}

/// Lowest average cost: each round simulates opening one server at every candidate datacenter and
/// opens it where the projected average cost per client is strictly minimal, assigning
/// `min(capacity, unassigned)` clients there. When a candidate has more unassigned coverable
/// clients than fit on one server, the projection uses the first `capacity` of them.
fn assign_average_cost(topology: &Topology, eligibility: &Eligibility, capacity: u32) -> Assignment {
    let cap = capacity as usize;
    let mut assignment = Assignment::new();
    loop {
        let candidates = unassigned_candidates(topology, eligibility, &assignment);
        if candidates.is_empty() {
            break;
        }
        let average_cost = |dc: DcId, unassigned: &[ClientId]| {
            let d = topology.datacenter(dc);
            let batch = &unassigned[..unassigned.len().min(cap)];
            let traffic = batch
                .iter()
                .map(|&c| topology.client(c).traffic_volume)
                .sum::<f64>();
            let n = batch.len() as f64;
            d.price_server / n + d.price_bandwidth * traffic / n
        };
        let best = candidates
            .iter()
            .position_min_by_key(|(dc, unassigned)| OrderedFloat(average_cost(*dc, unassigned)))
            .unwrap();
        let (dc, unassigned) = &candidates[best];
        for &client in unassigned.iter().take(cap) {
            assignment.assign(client, *dc);
        }
    }
    assignment
}

/// The outcome of a general-problem strategy run: the chosen hosting datacenter, the winning
/// assignment, and its (un-surcharged) outcome.
#[derive(Debug, Clone)]
pub struct GeneralOutcome {
    pub host: DcId,
    pub assignment: Assignment,
    pub outcome: Outcome,
}

/// Run a strategy for the general problem: for every candidate host, recompute eligibility
/// against it, run the basic strategy, and keep the cheapest result. When the host-hosting
/// surcharge is enabled it is added to the comparison cost only; the reported outcome stays
/// un-surcharged. Ties go to the first-encountered host.
pub fn run_general<R: Rng>(
    strategy: Strategy,
    topology: &Topology,
    clients: &[ClientId],
    eligible_hosts: &[DcId],
    bounds: DelayBounds,
    capacity: u32,
    include_host_server_cost: bool,
    rng: &mut R,
) -> GeneralOutcome {
    assert!(
        !eligible_hosts.is_empty(),
        "general strategy run without eligible hosts"
    );
    let mut best: Option<GeneralOutcome> = None;
    let mut best_cost = f64::INFINITY;
    for &host in eligible_hosts {
        let eligibility = Eligibility::compute(topology, host, clients.iter().copied(), bounds);
        let (assignment, outcome) =
            strategy.run_basic(topology, host, clients, &eligibility, capacity, rng);
        let mut comparison_cost = outcome.total_cost;
        if include_host_server_cost {
            comparison_cost += evaluate::host_server_surcharge(
                topology.datacenter(host).price_server,
                clients.len(),
            );
        }
        if comparison_cost < best_cost {
            best_cost = comparison_cost;
            best = Some(GeneralOutcome {
                host,
                assignment,
                outcome,
            });
        }
    }
    best.expect("at least one host was evaluated")
}
