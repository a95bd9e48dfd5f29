//! Candidates of an iterative lookup, ordered by their distance to its target.
use std::{cmp::Ordering, fmt};

use tracing::trace;

use crate::common::{Candidate, DistanceOrder, Id, TieBreaker};
use crate::tree::{self, Tree};

/// An immutable set of candidates ordered by [DistanceOrder].
///
/// Updates return a new set and leave the receiver untouched.
pub trait CandidateSet: Sized {
    /// Returns a set that also contains `candidate`. If a candidate that compares
    /// equal is already present, the returned set is the same as this one.
    fn add(&self, candidate: Candidate) -> Self;

    /// Returns a set without the candidate comparing equal to `candidate`.
    /// Deleting a candidate that is not present is a no-op.
    fn delete(&self, candidate: &Candidate) -> Self;

    /// The closest candidate to the target, or `None` if the set is empty.
    fn peek_closest(&self) -> Option<&Candidate>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
/// Persistent [CandidateSet] backed by a weight balanced tree.
///
/// Cloning is O(1) and every update copies O(log n) nodes, sharing the rest
/// with previous versions, which stay valid and can be read concurrently.
pub struct ClosestCandidates {
    order: DistanceOrder,
    tree: Tree<Candidate, ()>,
}

impl ClosestCandidates {
    /// Creates an empty set ordered by distance to `target`, with a random
    /// [TieBreaker].
    pub fn new(target: Id) -> Self {
        Self::with_tie_breaker(target, TieBreaker::random())
    }

    pub fn with_tie_breaker(target: Id, tie_breaker: TieBreaker) -> Self {
        ClosestCandidates {
            order: DistanceOrder::new(target, tie_breaker),
            tree: Tree::new(),
        }
    }

    // === Getters ===

    pub fn target(&self) -> Id {
        self.order.target()
    }

    pub fn order(&self) -> &DistanceOrder {
        &self.order
    }

    // === Public Methods ===

    pub fn contains(&self, candidate: &Candidate) -> bool {
        self.tree.get(candidate, &self.comparator()).is_some()
    }

    /// Returns the closest candidate and the set without it.
    pub fn pop_closest(&self) -> Option<(Candidate, Self)> {
        let (tree, candidate, _) = self.tree.remove_first()?;

        Some((
            candidate,
            ClosestCandidates {
                order: self.order,
                tree,
            },
        ))
    }

    /// Iterate over candidates from the closest to the farthest.
    pub fn iter(&self) -> CandidateIter<'_> {
        CandidateIter(self.tree.iter())
    }

    // === Private Methods ===

    fn comparator(&self) -> impl Fn(&Candidate, &Candidate) -> Ordering + '_ {
        move |a: &Candidate, b: &Candidate| self.order.compare(a, b)
    }
}

impl CandidateSet for ClosestCandidates {
    fn add(&self, candidate: Candidate) -> Self {
        if self.contains(&candidate) {
            return self.clone();
        }

        trace!(?candidate, size = self.len() + 1, "Adding candidate");

        ClosestCandidates {
            order: self.order,
            tree: self.tree.insert(candidate, (), &self.comparator()),
        }
    }

    fn delete(&self, candidate: &Candidate) -> Self {
        match self.tree.remove(candidate, &self.comparator()) {
            Some(tree) => {
                trace!(?candidate, size = tree.len(), "Deleted candidate");

                ClosestCandidates {
                    order: self.order,
                    tree,
                }
            }
            None => self.clone(),
        }
    }

    fn peek_closest(&self) -> Option<&Candidate> {
        self.tree.first().map(|(candidate, _)| candidate)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }
}

impl fmt::Debug for ClosestCandidates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosestCandidates")
            .field("target", &self.target())
            .field("candidates", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

/// Iterator over [ClosestCandidates], closest first.
pub struct CandidateIter<'a>(tree::Iter<'a, Candidate, ()>);

impl<'a> Iterator for CandidateIter<'a> {
    type Item = &'a Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(candidate, _)| candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for CandidateIter<'_> {}

impl<'a> IntoIterator for &'a ClosestCandidates {
    type Item = &'a Candidate;
    type IntoIter = CandidateIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
