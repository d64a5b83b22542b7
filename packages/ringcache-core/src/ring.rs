//! Consistent-hash ring with virtual nodes.
//!
//! Ring positions are kept in a `BTreeMap<u32, Node>` so primary lookup is a
//! single `range` probe and replica enumeration is a bounded forward walk.
//! Mutation (membership join/leave) takes a write lock; lookups, the hot
//! path, take a read lock.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::hash::murmur3_32;
use crate::node::Node;

/// Virtual positions contributed by each physical node.
pub const VIRTUAL_NODES: u32 = 100;

struct RingInner {
    positions: BTreeMap<u32, Node>,
}

/// Ordered mapping from 32-bit hash position to `Node`.
///
/// `replication_factor` is fixed at construction time; it bounds how many
/// distinct physical nodes `replica_set` returns.
pub struct HashRing {
    replication_factor: usize,
    inner: RwLock<RingInner>,
}

impl HashRing {
    #[must_use]
    pub fn new(replication_factor: usize) -> Self {
        Self {
            replication_factor: replication_factor.max(1),
            inner: RwLock::new(RingInner {
                positions: BTreeMap::new(),
            }),
        }
    }

    /// Inserts `VIRTUAL_NODES` positions for `node`. Re-adding the same node
    /// hashes to the same positions, so the insert is a no-op in effect
    /// (each position's value is simply overwritten with an equal `Node`).
    pub fn add_physical(&self, node: Node) {
        let mut inner = self.inner.write();
        for i in 0..VIRTUAL_NODES {
            let position = vnode_hash(&node, i);
            inner.positions.insert(position, node.clone());
        }
        tracing::info!(node = %node, "added physical node to ring");
    }

    /// Removes every position mapped to `node` (by value).
    pub fn remove_physical(&self, node: &Node) {
        let mut inner = self.inner.write();
        inner.positions.retain(|_, n| n != node);
        tracing::info!(node = %node, "removed physical node from ring");
    }

    /// Returns the node owning `key`'s position, or `None` if the ring is empty.
    #[must_use]
    pub fn primary(&self, key: &str) -> Option<Node> {
        let inner = self.inner.read();
        lookup(&inner.positions, murmur3_32(key.as_bytes()))
    }

    /// Up to `replication_factor` distinct physical nodes, primary first,
    /// walking clockwise and skipping virtual-node duplicates. Bounded to at
    /// most `2 * positions.len()` visits so a small ring with `R` larger
    /// than the physical node count still terminates.
    #[must_use]
    pub fn replica_set(&self, key: &str) -> Vec<Node> {
        let inner = self.inner.read();
        if inner.positions.is_empty() {
            return Vec::new();
        }

        let hash = murmur3_32(key.as_bytes());
        let mut result: Vec<Node> = Vec::with_capacity(self.replication_factor);
        let max_visits = inner.positions.len() * 2;

        let start = inner
            .positions
            .range(hash..)
            .next()
            .or_else(|| inner.positions.iter().next())
            .map(|(&pos, _)| pos);

        let Some(start) = start else {
            return Vec::new();
        };

        let mut visited = 0;
        let mut cursor = start;
        loop {
            if visited >= max_visits || result.len() >= self.replication_factor {
                break;
            }
            let node = &inner.positions[&cursor];
            if !result.contains(node) {
                result.push(node.clone());
            }
            visited += 1;

            let next = cursor
                .checked_add(1)
                .and_then(|after| inner.positions.range(after..).next());
            cursor = match next {
                Some((&pos, _)) => pos,
                None => match inner.positions.iter().next() {
                    Some((&pos, _)) => pos,
                    None => break,
                },
            };
            // Full loop back to the start with no progress left to make.
            if cursor == start && visited >= inner.positions.len() {
                break;
            }
        }

        if result.len() < self.replication_factor {
            tracing::warn!(
                key,
                found = result.len(),
                wanted = self.replication_factor,
                "replica set smaller than replication factor"
            );
        }

        result
    }

    /// Distinct physical nodes currently present in the ring.
    #[must_use]
    pub fn physical_nodes(&self) -> Vec<Node> {
        let inner = self.inner.read();
        let mut seen = Vec::new();
        for node in inner.positions.values() {
            if !seen.contains(node) {
                seen.push(node.clone());
            }
        }
        seen
    }

    /// Whether `node` currently contributes any position to the ring.
    #[must_use]
    pub fn contains(&self, node: &Node) -> bool {
        self.inner.read().positions.values().any(|n| n == node)
    }
}

fn vnode_hash(node: &Node, index: u32) -> u32 {
    let key = format!("{}-{}", node.address(), index);
    murmur3_32(key.as_bytes())
}

fn lookup(positions: &BTreeMap<u32, Node>, hash: u32) -> Option<Node> {
    positions
        .range(hash..)
        .next()
        .or_else(|| positions.iter().next())
        .map(|(_, node)| node.clone())
}
