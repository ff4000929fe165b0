//! The eligibility resolver. For a fixed hosting datacenter and a pair of delay bounds, it
//! computes the set of datacenters that can legally relay each client's traffic to the host,
//! along with the datacenter-side view (which clients each datacenter can cover).
//!
//! Eligibility is a per-evaluation context object: it is built fresh for every session and every
//! candidate host, so no state can leak between evaluations.

use rustc_hash::FxHashMap;

use crate::topology::{ClientId, DcId, Topology};

/// The delay bounds a relay must satisfy: the client-to-host round trip through the relay and the
/// client-to-relay leg on its own.
#[derive(Debug, Clone, Copy, derive_new::new)]
pub struct DelayBounds {
    /// Bound on `delay(client, relay) + delay(relay, host)`.
    pub to_host: f64,
    /// Bound on `delay(client, relay)`.
    pub to_relay: f64,
}

/// A relay datacenter eligible for one client, captured at discovery time.
///
/// The combined (server + bandwidth) price is deliberately not recorded here: it depends on the
/// server capacity of the evaluation at hand, so the strategies compute it on the fly.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct EligibleRelay {
    pub dc: DcId,
    /// One-way delay from the client to this relay.
    pub delay: f64,
    pub price_server: f64,
    pub price_bandwidth: f64,
}

impl EligibleRelay {
    /// Amortized per-client cost of relaying through this datacenter: a `1/capacity` share of a
    /// server-unit plus the bandwidth charge for the client's traffic.
    pub fn combined_price(&self, capacity: u32, traffic_volume: f64) -> f64 {
        self.price_server / f64::from(capacity) + self.price_bandwidth * traffic_volume
    }
}

/// Per-session eligibility data: each client's eligible relays (in datacenter-id order) and each
/// datacenter's coverable clients (in client scan order).
#[derive(Debug, Default, Clone)]
pub struct Eligibility {
    relays: FxHashMap<ClientId, Vec<EligibleRelay>>,
    coverable: FxHashMap<DcId, Vec<ClientId>>,
}

impl Eligibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve eligibility for `clients` against the hosting datacenter `host`.
    pub fn compute(
        topology: &Topology,
        host: DcId,
        clients: impl IntoIterator<Item = ClientId>,
        bounds: DelayBounds,
    ) -> Self {
        let mut eligibility = Self::new();
        for client in clients {
            eligibility.resolve_client(topology, host, client, bounds);
        }
        eligibility
    }

    /// Compute and record one client's eligible relays. Returns `true` if at least one relay
    /// satisfies the bounds. Relays are discovered in datacenter-id order.
    pub(crate) fn resolve_client(
        &mut self,
        topology: &Topology,
        host: DcId,
        client: ClientId,
        bounds: DelayBounds,
    ) -> bool {
        let c = topology.client(client);
        let mut found = false;
        for dc in topology.datacenters() {
            let delay = c.delay_to(dc.id);
            if delay + dc.delay_to(host) <= bounds.to_host && delay <= bounds.to_relay {
                self.relays.entry(client).or_default().push(EligibleRelay {
                    dc: dc.id,
                    delay,
                    price_server: dc.price_server,
                    price_bandwidth: dc.price_bandwidth,
                });
                self.coverable.entry(dc.id).or_default().push(client);
                found = true;
            }
        }
        found
    }

    /// The client's eligible relays, empty if none were found.
    pub fn relays(&self, client: ClientId) -> &[EligibleRelay] {
        self.relays.get(&client).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The clients this datacenter can cover as a relay.
    pub fn coverable(&self, dc: DcId) -> &[ClientId] {
        self.coverable.get(&dc).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `dc` is an eligible relay for `client`.
    pub fn is_eligible(&self, client: ClientId, dc: DcId) -> bool {
        self.relays(client).iter().any(|r| r.dc == dc)
    }
}

/// Existence check used by the general matchmaker: does `client` have at least one eligible relay
/// under host `host`? No eligibility state is recorded.
pub(crate) fn client_has_relay(
    topology: &Topology,
    host: DcId,
    client: ClientId,
    bounds: DelayBounds,
) -> bool {
    let c = topology.client(client);
    topology.datacenters().any(|dc| {
        let delay = c.delay_to(dc.id);
        delay + dc.delay_to(host) <= bounds.to_host && delay <= bounds.to_relay
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn both_bounds_must_hold() {
        let topo = testing::two_dc_topology();
        let client = ClientId::new(0);
        // Client delays are (10, 20) and the inter-dc delay is 5.
        let host = DcId::new(0);

        // Generous bounds admit both relays, in datacenter-id order.
        let elig = Eligibility::compute(&topo, host, [client], DelayBounds::new(100.0, 50.0));
        let dcs = elig.relays(client).iter().map(|r| r.dc).collect::<Vec<_>>();
        assert_eq!(dcs, vec![DcId::new(0), DcId::new(1)]);

        // A tight relay bound removes the far datacenter even though the host bound holds.
        let elig = Eligibility::compute(&topo, host, [client], DelayBounds::new(100.0, 15.0));
        let dcs = elig.relays(client).iter().map(|r| r.dc).collect::<Vec<_>>();
        assert_eq!(dcs, vec![DcId::new(0)]);

        // A tight host bound removes the relay whose detour through the host is too long:
        // relay 1 has 20 + 5 = 25 > 20, relay 0 has 10 + 0 = 10 <= 20.
        let elig = Eligibility::compute(&topo, host, [client], DelayBounds::new(20.0, 50.0));
        let dcs = elig.relays(client).iter().map(|r| r.dc).collect::<Vec<_>>();
        assert_eq!(dcs, vec![DcId::new(0)]);
    }

    #[test]
    fn coverable_clients_mirror_relays() {
        let topo = testing::four_client_topology();
        let bounds = DelayBounds::new(100.0, 50.0);
        let host = DcId::new(0);
        let elig = Eligibility::compute(&topo, host, topo.client_ids(), bounds);
        for client in topo.client_ids() {
            for relay in elig.relays(client) {
                assert!(elig.coverable(relay.dc).contains(&client));
            }
        }
        for dc in topo.dc_ids() {
            for &client in elig.coverable(dc) {
                assert!(elig.is_eligible(client, dc));
            }
        }
    }

    #[test]
    fn no_state_leaks_between_hosts() {
        let topo = testing::four_client_topology();
        let bounds = DelayBounds::new(100.0, 50.0);
        let a = Eligibility::compute(&topo, DcId::new(0), topo.client_ids(), bounds);
        let _b = Eligibility::compute(&topo, DcId::new(1), topo.client_ids(), bounds);
        let a2 = Eligibility::compute(&topo, DcId::new(0), topo.client_ids(), bounds);
        for client in topo.client_ids() {
            assert_eq!(a.relays(client), a2.relays(client));
        }
    }

    #[test]
    fn existence_check_agrees_with_compute() {
        let topo = testing::four_client_topology();
        let bounds = DelayBounds::new(60.0, 30.0);
        for host in topo.dc_ids() {
            let elig = Eligibility::compute(&topo, host, topo.client_ids(), bounds);
            for client in topo.client_ids() {
                assert_eq!(
                    client_has_relay(&topo, host, client, bounds),
                    !elig.relays(client).is_empty(),
                );
            }
        }
    }
}
