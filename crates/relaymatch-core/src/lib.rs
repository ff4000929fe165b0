#![warn(unreachable_pub, missing_debug_implementations)]

//! The core relaymatch library. This crate implements the matchmaking-and-allocation engine for
//! multiplayer cloud-gaming sessions: it assembles a feasible session of clients around a hosting
//! datacenter, resolves each client's set of [eligible relays](Eligibility), and runs a table of
//! [assignment strategies](Strategy) that map clients to relay datacenters and report the
//! resulting cost, capacity-wastage, and delay metrics.

#[macro_use]
mod ident;

mod assignment;
mod eligibility;
mod evaluate;
mod matchmaker;
mod strategy;
mod topology;

#[cfg(test)]
pub(crate) mod testing;

pub use assignment::Assignment;
pub use eligibility::{DelayBounds, EligibleRelay, Eligibility};
pub use evaluate::{
    evaluate, host_server_surcharge, validate_assignment, AssignmentError, Outcome,
};
pub use matchmaker::{match_basic, match_general, GeneralSession, MatchError, Session};
pub use strategy::{run_general, GeneralOutcome, Strategy};
pub use topology::{
    Client, ClientId, Datacenter, DcId, Topology, TopologyError, TopologySpec,
};
