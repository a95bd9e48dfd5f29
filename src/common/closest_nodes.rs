use std::{cmp::Ordering, convert::TryFrom, fmt, num::NonZeroUsize};

use tracing::debug;

use crate::common::{DistanceOrder, Id, Node, TieBreaker};
use crate::tree::{self, Tree};

/// K = the default maximum number of [ClosestNodes].
pub const DEFAULT_K: usize = 8;

const DEFAULT_K_NON_ZERO: NonZeroUsize = match NonZeroUsize::new(DEFAULT_K) {
    Some(k) => k,
    None => panic!("DEFAULT_K must not be zero"),
};

#[derive(Debug, Clone, Copy)]
/// [ClosestNodes] configurations
pub struct Config {
    /// Maximum number of nodes to keep.
    ///
    /// Defaults to [DEFAULT_K]
    pub k: NonZeroUsize,
    /// Breaks ties between nodes at equal distance to the target.
    ///
    /// Defaults to [TieBreaker::random]
    pub tie_breaker: TieBreaker,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            k: DEFAULT_K_NON_ZERO,
            tie_breaker: TieBreaker::random(),
        }
    }
}

/// The `k` closest nodes to a target seen so far, each with some associated data.
///
/// Immutable: [ClosestNodes::push] returns a new version sharing most of its
/// structure with the previous one, which stays valid and unchanged. Cloning
/// is O(1).
pub struct ClosestNodes<V> {
    order: DistanceOrder,
    k: usize,
    tree: Tree<Node, V>,
}

impl<V> ClosestNodes<V> {
    /// Create an empty set of the [DEFAULT_K] closest nodes to `target`.
    pub fn new(target: Id) -> Self {
        Self::with_config(target, Config::default())
    }

    pub fn with_config(target: Id, config: Config) -> Self {
        ClosestNodes {
            order: DistanceOrder::new(target, config.tie_breaker),
            k: config.k.get(),
            tree: Tree::new(),
        }
    }

    // === Getters ===

    pub fn target(&self) -> Id {
        self.order.target()
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn order(&self) -> &DistanceOrder {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns `true` if this set holds `k` nodes, so that pushing
    /// a new node will evict the farthest one.
    pub fn is_full(&self) -> bool {
        self.len() >= self.k
    }

    // === Public Methods ===

    pub fn get(&self, node: &Node) -> Option<&V> {
        self.tree
            .get(node, &self.comparator())
            .map(|(_, value)| value)
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.get(node).is_some()
    }

    pub fn closest(&self) -> Option<(&Node, &V)> {
        self.tree.first()
    }

    /// The node that would be evicted next, or `None` if empty.
    pub fn farthest(&self) -> Option<(&Node, &V)> {
        self.tree.last()
    }

    /// Iterate over nodes and their data from the closest to the farthest.
    ///
    /// Can be called any number of times on the same version.
    pub fn iter(&self) -> ClosestNodesIter<'_, V> {
        ClosestNodesIter(self.tree.iter())
    }

    /// Export the nodes from the closest to the farthest.
    pub fn nodes(&self) -> Vec<Node> {
        self.iter().map(|(node, _)| *node).collect()
    }

    /// An estimation of the Dht size from the distribution of the closest nodes
    /// to the target.
    ///
    /// Assuming node ids are uniformly distributed, seeing the `i`th closest node
    /// at distance `d_i` suggests the network has `i * d_max / d_i` nodes.
    /// This returns the average of these estimations over all held nodes.
    ///
    /// A single lookup is noisy; average the estimations of many lookups toward
    /// uniformly distributed targets for an accurate result.
    ///
    /// Read more at [A New Method for Estimating P2P Network Size](https://eli.sohl.com/2020/06/05/dht-size-estimation.html#fnref:query-count)
    pub fn dht_size_estimate(&self) -> usize {
        if self.is_empty() {
            return 0;
        };

        let target = self.target();
        let mut sum: usize = 0;
        let mut count = 0;

        for (node, _) in self.iter() {
            count += 1;

            let xor = node.id.xor(&target);

            // Only the top 128 bits matter, rounded up to avoid dividing by zero.
            let mut high = [0_u8; 16];
            high.copy_from_slice(&xor.as_bytes()[..16]);
            let distance = u128::from_be_bytes(high).saturating_add(1);

            let intervals = usize::try_from(u128::MAX / distance).unwrap_or(usize::MAX);
            let estimated_n = intervals.saturating_mul(count);

            sum = sum.saturating_add(estimated_n);
        }

        sum / count
    }

    // === Private Methods ===

    fn comparator(&self) -> impl Fn(&Node, &Node) -> Ordering + '_ {
        move |a: &Node, b: &Node| self.order.compare(a, b)
    }
}

impl<V: Clone> ClosestNodes<V> {
    /// Returns a new version with `node` mapped to `value`, overwriting the
    /// value of `node` if it is already present.
    ///
    /// If that makes the set hold more than `k` nodes, the farthest node is
    /// evicted.
    pub fn push(&self, node: Node, value: V) -> Self {
        if self.is_full() {
            if let Some((farthest, _)) = self.tree.last() {
                if self.order.compare(&node, farthest) == Ordering::Greater {
                    return self.clone();
                }
            }
        }

        let mut tree = self.tree.insert(node, value, &self.comparator());

        if tree.len() > self.k {
            if let Some((rest, evicted, _)) = tree.remove_last() {
                debug!(id = ?self.target(), ?evicted, "Evicted farthest node");
                tree = rest;
            }
        }

        ClosestNodes {
            order: self.order,
            k: self.k,
            tree,
        }
    }

    /// Returns a new version without `node`, or the same version if `node` is
    /// not present.
    pub fn remove(&self, node: &Node) -> Self {
        match self.tree.remove(node, &self.comparator()) {
            Some(tree) => ClosestNodes {
                order: self.order,
                k: self.k,
                tree,
            },
            None => self.clone(),
        }
    }
}

impl<V> Clone for ClosestNodes<V> {
    fn clone(&self) -> Self {
        ClosestNodes {
            order: self.order,
            k: self.k,
            tree: self.tree.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for ClosestNodes<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosestNodes")
            .field("target", &self.target())
            .field("k", &self.k)
            .field("nodes", &self.tree)
            .finish()
    }
}

/// Iterator over [ClosestNodes], closest first.
pub struct ClosestNodesIter<'a, V>(tree::Iter<'a, Node, V>);

impl<'a, V> Iterator for ClosestNodesIter<'a, V> {
    type Item = (&'a Node, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<V> ExactSizeIterator for ClosestNodesIter<'_, V> {}

impl<'a, V> IntoIterator for &'a ClosestNodes<V> {
    type Item = (&'a Node, &'a V);
    type IntoIter = ClosestNodesIter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
