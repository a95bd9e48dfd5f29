//! Strict total "closer than" order of nodes and candidates relative to a target.
use std::{
    cmp::Ordering,
    fmt::{self, Write},
    hash::Hasher,
    net::SocketAddr,
};

use rand::Rng;
use siphasher::sip::SipHasher13;
use tracing::trace;

use crate::common::{Id, Ranked};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Seeded hash of addresses, used to order candidates at equal distance.
///
/// Every collection holds one for its whole lifetime so that all of its
/// comparisons agree. The order is not stable across seeds, and so not across
/// restarts unless the seed is persisted by the caller.
pub struct TieBreaker {
    seed: u64,
}

impl TieBreaker {
    pub fn new(seed: u64) -> Self {
        TieBreaker { seed }
    }

    /// Draw a seed from the thread rng.
    pub fn random() -> Self {
        let seed: u64 = rand::thread_rng().gen();
        trace!(?seed, "New tie breaker");

        TieBreaker { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// 64 bit SipHash-1-3 of the address' string form.
    pub fn hash(&self, address: &SocketAddr) -> u64 {
        let mut writer = HashWriter(SipHasher13::new_with_keys(self.seed, 0));
        // Writing into a hasher never fails.
        let _ = write!(writer, "{}", address);

        writer.0.finish()
    }
}

impl Default for TieBreaker {
    fn default() -> Self {
        TieBreaker::random()
    }
}

struct HashWriter(SipHasher13);

impl Write for HashWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write(s.as_bytes());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Orders [Ranked] items by how close they are to a fixed target:
///
/// 1. Items with a known [Id] before items without one.
/// 2. Smaller XOR distance from their [Id] to the target first.
/// 3. Otherwise, smaller [TieBreaker::hash] of their address first,
///    falling back to comparing the addresses themselves if hashes collide.
pub struct DistanceOrder {
    target: Id,
    tie_breaker: TieBreaker,
}

impl DistanceOrder {
    pub fn new(target: Id, tie_breaker: TieBreaker) -> Self {
        DistanceOrder {
            target,
            tie_breaker,
        }
    }

    // === Getters ===

    pub fn target(&self) -> Id {
        self.target
    }

    pub fn tie_breaker(&self) -> TieBreaker {
        self.tie_breaker
    }

    // === Public Methods ===

    /// [Ordering::Less] if `l` is closer to the target than `r`.
    pub fn compare<L, R>(&self, l: &L, r: &R) -> Ordering
    where
        L: Ranked + ?Sized,
        R: Ranked + ?Sized,
    {
        match (l.id(), r.id()) {
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (Some(l_id), Some(r_id)) => {
                let ordering = l_id.xor(&self.target).cmp(&r_id.xor(&self.target));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (None, None) => {}
        }

        self.tie_break(l.address(), r.address(), |address| {
            self.tie_breaker.hash(address)
        })
    }

    pub fn closer_than<L, R>(&self, l: &L, r: &R) -> bool
    where
        L: Ranked + ?Sized,
        R: Ranked + ?Sized,
    {
        self.compare(l, r) == Ordering::Less
    }

    // === Private Methods ===

    /// Orders distinct addresses by `hash`, then by the addresses themselves
    /// when the hashes collide.
    fn tie_break<H>(&self, l: &SocketAddr, r: &SocketAddr, hash: H) -> Ordering
    where
        H: Fn(&SocketAddr) -> u64,
    {
        if l == r {
            return Ordering::Equal;
        }

        hash(l).cmp(&hash(r)).then_with(|| l.cmp(r))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::{Candidate, Node, ID_SIZE};
    use proptest::prelude::*;

    fn id_from_last_byte(byte: u8) -> Id {
        let mut bytes = [0; ID_SIZE];
        bytes[ID_SIZE - 1] = byte;
        Id::from(bytes)
    }

    fn address(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn known_before_unknown() {
        let order = DistanceOrder::new(Id::ZERO, TieBreaker::new(1));

        let known = Candidate::new(address(1), Some(Id::MAX));
        let unknown = Candidate::unknown(address(2));

        assert!(order.closer_than(&known, &unknown));
        assert!(!order.closer_than(&unknown, &known));
    }

    #[test]
    fn smaller_distance_first() {
        let target = id_from_last_byte(0b1000);
        let order = DistanceOrder::new(target, TieBreaker::new(1));

        // distance 5 and 3
        let a = Node::new(id_from_last_byte(0b1101), address(1));
        let b = Node::new(id_from_last_byte(0b1011), address(2));

        assert_eq!(order.compare(&b, &a), Ordering::Less);
        assert_eq!(order.compare(&a, &b), Ordering::Greater);
        assert_eq!(order.compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn ties_are_broken_by_address_hash() {
        let tie_breaker = TieBreaker::new(42);
        let order = DistanceOrder::new(Id::random(), tie_breaker);

        let a = Candidate::unknown(address(1));
        let b = Candidate::unknown(address(2));

        let expected = tie_breaker
            .hash(&a.address)
            .cmp(&tie_breaker.hash(&b.address));

        assert_ne!(expected, Ordering::Equal);
        assert_eq!(order.compare(&a, &b), expected);
        assert_eq!(order.compare(&b, &a), expected.reverse());

        let id = Id::random();
        let a = Node::new(id, address(1));
        let b = Node::new(id, address(2));

        assert_eq!(order.compare(&a, &b), expected);
    }

    #[test]
    fn nodes_and_candidates_compare() {
        let order = DistanceOrder::new(Id::ZERO, TieBreaker::new(7));

        let node = Node::new(id_from_last_byte(1), address(1));
        let candidate = Candidate::from(node);

        assert_eq!(order.compare(&node, &candidate), Ordering::Equal);
        assert!(order.closer_than(&node, &Candidate::unknown(address(1))));
    }

    #[test]
    fn hash_is_seeded() {
        let addr = address(6881);

        assert_eq!(
            TieBreaker::new(3).hash(&addr),
            TieBreaker::new(3).hash(&addr)
        );
        assert_ne!(
            TieBreaker::new(3).hash(&addr),
            TieBreaker::new(4).hash(&addr)
        );
    }

    #[test]
    fn hash_collisions_fall_back_to_addresses() {
        let order = DistanceOrder::new(Id::ZERO, TieBreaker::new(0));
        let collide = |_: &SocketAddr| 7;

        let (a, b) = (address(1), address(2));

        assert_eq!(order.tie_break(&a, &b, collide), Ordering::Less);
        assert_eq!(order.tie_break(&b, &a, collide), Ordering::Greater);
        assert_eq!(order.tie_break(&a, &a, collide), Ordering::Equal);
    }

    fn any_candidate() -> impl Strategy<Value = Candidate> {
        (
            any::<u16>(),
            prop::option::of(any::<[u8; ID_SIZE]>().prop_map(Id::from)),
        )
            .prop_map(|(port, id)| Candidate::new(address(port), id))
    }

    proptest! {
        #[test]
        fn order_is_total_and_consistent(
            seed in any::<u64>(),
            target in any::<[u8; ID_SIZE]>().prop_map(Id::from),
            x in any_candidate(),
            y in any_candidate(),
        ) {
            let order = DistanceOrder::new(target, TieBreaker::new(seed));

            if x == y {
                prop_assert_eq!(order.compare(&x, &y), Ordering::Equal);
            } else {
                prop_assert!(order.closer_than(&x, &y) != order.closer_than(&y, &x));
            }
            prop_assert_eq!(order.compare(&x, &y), order.compare(&x, &y));
        }

        #[test]
        fn order_is_transitive(
            seed in any::<u64>(),
            candidates in prop::collection::vec(any_candidate(), 3..24),
        ) {
            let order = DistanceOrder::new(Id::ZERO, TieBreaker::new(seed));

            let mut sorted = candidates;
            sorted.sort_by(|a, b| order.compare(a, b));

            for (i, a) in sorted.iter().enumerate() {
                for b in &sorted[i + 1..] {
                    prop_assert_ne!(order.compare(a, b), Ordering::Greater);
                }
            }
        }
    }
}
