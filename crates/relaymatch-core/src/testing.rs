use crate::eligibility::{DelayBounds, Eligibility};
use crate::topology::{ClientId, DcId, Topology, TopologySpec};

/// Build a topology from raw tables, with unit traffic for every client.
pub(crate) fn topology(
    client_to_dc_delays: Vec<Vec<f64>>,
    dc_to_dc_delays: Vec<Vec<f64>>,
    price_server: Vec<f64>,
    price_bandwidth: Vec<f64>,
) -> Topology {
    let traffic_volumes = vec![1.0; client_to_dc_delays.len()];
    TopologySpec::builder()
        .client_to_dc_delays(client_to_dc_delays)
        .dc_to_dc_delays(dc_to_dc_delays)
        .price_server(price_server)
        .price_bandwidth(price_bandwidth)
        .traffic_volumes(traffic_volumes)
        .build()
        .validate()
        .unwrap()
}

/// One client with unit traffic and two datacenters: D0(server=10, bandwidth=1) nearby,
/// D1(server=4, bandwidth=3) farther away.
pub(crate) fn two_dc_spec() -> TopologySpec {
    TopologySpec::builder()
        .client_to_dc_delays(vec![vec![10.0, 20.0]])
        .dc_to_dc_delays(vec![vec![0.0, 5.0], vec![5.0, 0.0]])
        .price_server(vec![10.0, 4.0])
        .price_bandwidth(vec![1.0, 3.0])
        .traffic_volumes(vec![1.0])
        .build()
}

pub(crate) fn two_dc_topology() -> Topology {
    two_dc_spec().validate().unwrap()
}

/// The two-datacenter topology with eligibility resolved for its single client against host D0
/// under generous bounds, so both datacenters qualify as relays.
pub(crate) fn two_dc_session() -> (Topology, ClientId, DcId, Eligibility) {
    let topo = two_dc_topology();
    let client = ClientId::new(0);
    let host = DcId::new(0);
    let elig = Eligibility::compute(&topo, host, [client], DelayBounds::new(100.0, 50.0));
    (topo, client, host, elig)
}

/// Four clients and three datacenters. Clients 0 and 1 reach every datacenter; client 2 is out
/// of relay range of D1 and client 3 of D0, so sessions stay feasible for any host under a relay
/// bound of 50 while the relay sets differ per client.
pub(crate) fn four_client_topology() -> Topology {
    topology(
        vec![
            vec![10.0, 10.0, 25.0],
            vec![10.0, 10.0, 25.0],
            vec![10.0, 60.0, 25.0],
            vec![60.0, 10.0, 25.0],
        ],
        vec![
            vec![0.0, 5.0, 10.0],
            vec![5.0, 0.0, 10.0],
            vec![10.0, 10.0, 0.0],
        ],
        vec![10.0, 4.0, 6.0],
        vec![1.0, 3.0, 2.0],
    )
}
