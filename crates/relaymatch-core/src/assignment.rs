//! The client-to-relay assignment produced by a strategy run. Like [`Eligibility`], this is a
//! per-evaluation context object: every strategy run starts from a fresh, empty assignment, which
//! is what guarantees no assignment state survives between strategies or sessions.
//!
//! [`Eligibility`]: crate::Eligibility

use rustc_hash::FxHashMap;

use crate::topology::{ClientId, DcId};

/// A one-to-many mapping from relay datacenters to their assigned clients, with the client-side
/// view kept alongside.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Assignment {
    by_client: FxHashMap<ClientId, DcId>,
    by_dc: FxHashMap<DcId, Vec<ClientId>>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `client` relays through `dc`.
    ///
    /// A client is assigned to exactly one datacenter per strategy run; assigning the same client
    /// twice is a strategy bug.
    pub fn assign(&mut self, client: ClientId, dc: DcId) {
        let prev = self.by_client.insert(client, dc);
        assert!(prev.is_none(), "client {client} assigned twice");
        self.by_dc.entry(dc).or_default().push(client);
    }

    /// The relay datacenter chosen for `client`, if any.
    pub fn datacenter_of(&self, client: ClientId) -> Option<DcId> {
        self.by_client.get(&client).copied()
    }

    pub fn is_assigned(&self, client: ClientId) -> bool {
        self.by_client.contains_key(&client)
    }

    /// The clients assigned to `dc`, in assignment order.
    pub fn clients_of(&self, dc: DcId) -> &[ClientId] {
        self.by_dc.get(&dc).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total assigned-client count across all datacenters.
    pub fn nr_assigned(&self) -> usize {
        self.by_dc.values().map(Vec::len).sum()
    }
}
