//! Nodes and lookup candidates ranked by their distance to a target.
use std::net::SocketAddr;

use crate::common::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// A node with a known [Id] at a known address.
pub struct Node {
    pub id: Id,
    pub address: SocketAddr,
}

impl Node {
    /// Creates a new Node from an id and socket address.
    pub fn new(id: Id, address: SocketAddr) -> Node {
        Node { id, address }
    }

    /// Creates a node with a random Id for testing purposes.
    pub fn random() -> Node {
        Node {
            id: Id::random(),
            address: SocketAddr::from(([0, 0, 0, 0], 0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// An address we may query, with the [Id] it claimed if we learned one.
///
/// Bootstrapping addresses and nodes announced without an id are candidates
/// without an [Id], and always rank behind those with one.
pub struct Candidate {
    pub address: SocketAddr,
    pub id: Option<Id>,
}

impl Candidate {
    pub fn new(address: SocketAddr, id: Option<Id>) -> Candidate {
        Candidate { address, id }
    }

    /// A candidate whose [Id] is not known yet.
    pub fn unknown(address: SocketAddr) -> Candidate {
        Candidate { address, id: None }
    }
}

impl From<Node> for Candidate {
    fn from(node: Node) -> Self {
        Candidate {
            address: node.address,
            id: Some(node.id),
        }
    }
}

/// Anything that can be ranked by its distance to a target.
pub trait Ranked {
    /// The [Id] to measure the distance from, if known.
    fn id(&self) -> Option<&Id>;
    fn address(&self) -> &SocketAddr;
}

impl Ranked for Node {
    fn id(&self) -> Option<&Id> {
        Some(&self.id)
    }

    fn address(&self) -> &SocketAddr {
        &self.address
    }
}

impl Ranked for Candidate {
    fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    fn address(&self) -> &SocketAddr {
        &self.address
    }
}
