//! Feasibility search: assembling a session of clients around a hosting datacenter.
//!
//! The basic variant interleaves host selection and greedy client admission, so session
//! membership is host-dependent and changes under re-shuffle; callers that need reproducible
//! sessions must control the injected random source.

use log::debug;
use rand::prelude::*;

use crate::eligibility::{client_has_relay, DelayBounds, Eligibility};
use crate::topology::{ClientId, DcId, Topology};

/// A feasible session for the basic problem: a hosting datacenter, the admitted clients, and the
/// eligibility data resolved against that host during the search.
#[derive(Debug, Clone)]
pub struct Session {
    pub host: DcId,
    pub clients: Vec<ClientId>,
    pub eligibility: Eligibility,
}

impl Session {
    delegate::delegate! {
        to self.clients {
            #[call(len)]
            pub fn nr_clients(&self) -> usize;
        }
    }
}

/// A feasible session for the general problem: a fixed client set plus every datacenter that
/// could host it.
#[derive(Debug, Clone)]
pub struct GeneralSession {
    pub clients: Vec<ClientId>,
    /// Datacenters under which every session client has at least one eligible relay.
    pub eligible_hosts: Vec<DcId>,
}

/// Matchmaking failure. Infeasibility is a terminal result for the current session, not a bug;
/// the caller decides whether to abort the sweep or skip.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// No candidate host yields a session of the required size.
    #[error("no host yields a feasible session of {session_size} clients")]
    Infeasible { session_size: usize },

    /// A client set was found, but no datacenter can host it.
    #[error("no datacenter can host the matched session")]
    NoEligibleHost,
}

/// Find a hosting datacenter and a session of `session_size` clients that all have at least one
/// eligible relay under it.
///
/// Candidate hosts are tried in shuffled order; for each host, clients are scanned in shuffled
/// order and admitted if any relay satisfies the bounds. The search succeeds as soon as the
/// session reaches the target size. When a host is exhausted short of the target, all transient
/// eligibility state is discarded before the next host is tried.
pub fn match_basic<R: Rng>(
    topology: &Topology,
    session_size: usize,
    bounds: DelayBounds,
    rng: &mut R,
) -> Result<Session, MatchError> {
    let mut hosts = topology.dc_ids().collect::<Vec<_>>();
    hosts.shuffle(rng);
    let mut clients = topology.client_ids().collect::<Vec<_>>();

    for host in hosts {
        clients.shuffle(rng);
        let mut eligibility = Eligibility::new();
        let mut session = Vec::with_capacity(session_size);
        for &client in &clients {
            if eligibility.resolve_client(topology, host, client, bounds) {
                session.push(client);
                if session.len() == session_size {
                    debug!("matched a session of {session_size} clients at host {host}");
                    return Ok(Session {
                        host,
                        clients: session,
                        eligibility,
                    });
                }
            }
        }
        // Host exhausted short of the target; eligibility and the partial session are dropped so
        // nothing leaks into the next attempt.
        debug!(
            "host {host} exhausted with {}/{session_size} clients",
            session.len()
        );
    }
    Err(MatchError::Infeasible { session_size })
}

/// Find a session of clients plus the full set of datacenters able to host it.
///
/// The client set comes from a single basic search; the host set is then recomputed as a separate
/// existence check per datacenter: a host qualifies iff *every* session client has at least one
/// eligible relay under it.
pub fn match_general<R: Rng>(
    topology: &Topology,
    session_size: usize,
    bounds: DelayBounds,
    rng: &mut R,
) -> Result<GeneralSession, MatchError> {
    let Session { clients, .. } = match_basic(topology, session_size, bounds, rng)?;
    let eligible_hosts = topology
        .dc_ids()
        .filter(|&host| {
            clients
                .iter()
                .all(|&client| client_has_relay(topology, host, client, bounds))
        })
        .collect::<Vec<_>>();
    if eligible_hosts.is_empty() {
        return Err(MatchError::NoEligibleHost);
    }
    debug!(
        "matched a session of {} clients with {} eligible hosts",
        clients.len(),
        eligible_hosts.len()
    );
    Ok(GeneralSession {
        clients,
        eligible_hosts,
    })
}
