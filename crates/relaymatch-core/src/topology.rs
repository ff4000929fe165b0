//! The static topology model: clients, datacenters, their pairwise one-way delays, and
//! per-datacenter prices. A [`Topology`] is built once per simulation run from a validated
//! [`TopologySpec`] and is immutable afterwards; all per-session state lives in separate context
//! objects ([`Eligibility`](crate::Eligibility), [`Assignment`](crate::Assignment)).

identifier!(ClientId, usize);
identifier!(DcId, usize);

/// A game client with precomputed one-way delays to every datacenter.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,
    delay_to_dc: Vec<f64>,
    /// Billable traffic unit used for bandwidth cost.
    pub traffic_volume: f64,
}

impl Client {
    /// One-way network delay from this client to datacenter `dc`.
    pub fn delay_to(&self, dc: DcId) -> f64 {
        self.delay_to_dc[dc.inner()]
    }
}

/// A candidate relay/hosting datacenter.
#[derive(Debug, Clone)]
pub struct Datacenter {
    pub id: DcId,
    delay_to_dc: Vec<f64>,
    /// Cost per server-unit of capacity opened.
    pub price_server: f64,
    /// Cost per unit of charged traffic.
    pub price_bandwidth: f64,
}

impl Datacenter {
    /// One-way network delay from this datacenter to datacenter `dc`.
    pub fn delay_to(&self, dc: DcId) -> f64 {
        self.delay_to_dc[dc.inner()]
    }
}

/// The raw numeric tables supplied by an external loader. Delays must already be one-way (the
/// loader is responsible for halving measured RTTs).
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct TopologySpec {
    /// Rows = clients, columns = datacenters.
    pub client_to_dc_delays: Vec<Vec<f64>>,
    /// Square, symmetric datacenter-to-datacenter delay matrix.
    pub dc_to_dc_delays: Vec<Vec<f64>>,
    /// Per-datacenter server price.
    pub price_server: Vec<f64>,
    /// Per-datacenter bandwidth price.
    pub price_bandwidth: Vec<f64>,
    /// Per-client charged traffic volume.
    pub traffic_volumes: Vec<f64>,
}

impl TopologySpec {
    /// Validate the input tables and produce a [`Topology`].
    ///
    /// Correctness properties:
    ///
    /// - Every client delay row has one entry per datacenter.
    /// - The datacenter delay matrix is square with one row per datacenter.
    /// - Price and traffic lists cover every datacenter and client respectively.
    pub fn validate(self) -> Result<Topology, TopologyError> {
        let nr_clients = self.client_to_dc_delays.len();
        if nr_clients == 0 {
            return Err(TopologyError::NoClients);
        }
        // The datacenter matrix is authoritative for the datacenter count; every other table is
        // checked against it, so a malformed client row cannot redefine the expected width.
        let nr_dcs = self.dc_to_dc_delays.len();
        if nr_dcs == 0 {
            return Err(TopologyError::NoDatacenters);
        }
        for (i, row) in self.dc_to_dc_delays.iter().enumerate() {
            if row.len() != nr_dcs {
                return Err(TopologyError::DcRowMismatch {
                    dc: DcId::new(i),
                    got: row.len(),
                    expected: nr_dcs,
                });
            }
        }
        for (i, row) in self.client_to_dc_delays.iter().enumerate() {
            if row.len() != nr_dcs {
                return Err(TopologyError::ClientRowMismatch {
                    client: ClientId::new(i),
                    got: row.len(),
                    expected: nr_dcs,
                });
            }
        }
        if self.price_server.len() != nr_dcs {
            return Err(TopologyError::PriceListMismatch {
                kind: "server",
                got: self.price_server.len(),
                expected: nr_dcs,
            });
        }
        if self.price_bandwidth.len() != nr_dcs {
            return Err(TopologyError::PriceListMismatch {
                kind: "bandwidth",
                got: self.price_bandwidth.len(),
                expected: nr_dcs,
            });
        }
        if self.traffic_volumes.len() != nr_clients {
            return Err(TopologyError::TrafficListMismatch {
                got: self.traffic_volumes.len(),
                expected: nr_clients,
            });
        }
        let clients = self
            .client_to_dc_delays
            .into_iter()
            .zip(self.traffic_volumes)
            .enumerate()
            .map(|(i, (delay_to_dc, traffic_volume))| Client {
                id: ClientId::new(i),
                delay_to_dc,
                traffic_volume,
            })
            .collect();
        let datacenters = self
            .dc_to_dc_delays
            .into_iter()
            .zip(self.price_server.into_iter().zip(self.price_bandwidth))
            .enumerate()
            .map(|(i, (delay_to_dc, (price_server, price_bandwidth)))| Datacenter {
                id: DcId::new(i),
                delay_to_dc,
                price_server,
                price_bandwidth,
            })
            .collect();
        Ok(Topology {
            clients,
            datacenters,
        })
    }
}

/// The immutable set of [`Client`] and [`Datacenter`] entities for one simulation run.
#[derive(Debug, Clone)]
pub struct Topology {
    clients: Vec<Client>,
    datacenters: Vec<Datacenter>,
}

impl Topology {
    pub fn client(&self, id: ClientId) -> &Client {
        &self.clients[id.inner()]
    }

    pub fn datacenter(&self, id: DcId) -> &Datacenter {
        &self.datacenters[id.inner()]
    }

    /// Client IDs in ascending order.
    pub fn client_ids(&self) -> impl Iterator<Item = ClientId> {
        (0..self.clients.len()).map(ClientId::new)
    }

    /// Datacenter IDs in ascending order.
    pub fn dc_ids(&self) -> impl Iterator<Item = DcId> {
        (0..self.datacenters.len()).map(DcId::new)
    }

    delegate::delegate! {
        to self.clients {
            #[call(iter)]
            pub fn clients(&self) -> impl Iterator<Item = &Client>;

            #[call(len)]
            pub fn nr_clients(&self) -> usize;
        }

        to self.datacenters {
            #[call(iter)]
            pub fn datacenters(&self) -> impl Iterator<Item = &Datacenter>;

            #[call(len)]
            pub fn nr_datacenters(&self) -> usize;
        }
    }
}

/// Topology construction error.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The client delay matrix has no rows.
    #[error("the client delay matrix has no rows")]
    NoClients,

    /// The datacenter delay matrix has no rows.
    #[error("the datacenter delay matrix has no rows")]
    NoDatacenters,

    /// A client delay row has the wrong number of entries.
    #[error("client {client} has {got} delay entries, expected {expected}")]
    ClientRowMismatch {
        client: ClientId,
        got: usize,
        expected: usize,
    },

    /// A datacenter delay row has the wrong number of entries.
    #[error("datacenter {dc} has {got} delay entries, expected {expected}")]
    DcRowMismatch {
        dc: DcId,
        got: usize,
        expected: usize,
    },

    /// A price list does not cover every datacenter.
    #[error("the {kind} price list has {got} entries, expected {expected}")]
    PriceListMismatch {
        kind: &'static str,
        got: usize,
        expected: usize,
    },

    /// The traffic volume list does not cover every client.
    #[error("the traffic volume list has {got} entries, expected {expected}")]
    TrafficListMismatch { got: usize, expected: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn valid_spec_succeeds() {
        let topo = testing::two_dc_spec().validate().unwrap();
        assert_eq!(topo.nr_clients(), 1);
        assert_eq!(topo.nr_datacenters(), 2);
        assert_eq!(topo.client(ClientId::new(0)).delay_to(DcId::new(1)), 20.0);
        assert_eq!(topo.datacenter(DcId::new(1)).price_server, 4.0);
    }

    // A malformed first client row must be reported as such; the expected width comes from the
    // datacenter matrix, not from the first client row.
    #[test]
    fn ragged_client_row_fails() {
        let mut spec = testing::two_dc_spec();
        spec.client_to_dc_delays[0].push(1.0);
        assert!(matches!(
            spec.validate(),
            Err(TopologyError::ClientRowMismatch {
                got: 3,
                expected: 2,
                ..
            })
        ));
    }

    #[test]
    fn non_square_dc_matrix_fails() {
        let mut spec = testing::two_dc_spec();
        spec.dc_to_dc_delays.pop();
        assert!(matches!(
            spec.validate(),
            Err(TopologyError::DcRowMismatch { .. })
        ));
    }

    #[test]
    fn missing_price_entry_fails() {
        let mut spec = testing::two_dc_spec();
        spec.price_bandwidth.pop();
        assert!(matches!(
            spec.validate(),
            Err(TopologyError::PriceListMismatch {
                kind: "bandwidth",
                ..
            })
        ));
    }

    #[test]
    fn missing_traffic_entry_fails() {
        let mut spec = testing::two_dc_spec();
        spec.traffic_volumes.clear();
        assert!(matches!(
            spec.validate(),
            Err(TopologyError::TrafficListMismatch { .. })
        ));
    }
}
