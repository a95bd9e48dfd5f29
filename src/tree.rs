//! Persistent weight balanced search tree with `Arc` path copying.
//!
//! Every update copies the nodes on the path from the root to the change and
//! shares everything else with the previous version, so clones are O(1) and old
//! versions stay valid and readable from any thread.
//!
//! The tree does not own an ordering. Callers pass the same comparator to every
//! operation on a given lineage of trees.

use std::{cmp::Ordering, fmt, sync::Arc};

/// Rebalance once one side is more than `DELTA` times the other.
const DELTA: usize = 3;
/// Single rotation if the inner grandchild is smaller than `RATIO` times the outer one.
const RATIO: usize = 2;

type Link<K, V> = Option<Arc<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    size: usize,
    left: Link<K, V>,
    right: Link<K, V>,
}

pub(crate) struct Tree<K, V> {
    root: Link<K, V>,
}

impl<K, V> Tree<K, V> {
    pub fn new() -> Self {
        Tree { root: None }
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn get<F>(&self, key: &K, cmp: &F) -> Option<(&K, &V)>
    where
        F: Fn(&K, &K) -> Ordering,
    {
        let mut link = &self.root;

        while let Some(node) = link {
            match cmp(key, &node.key) {
                Ordering::Less => link = &node.left,
                Ordering::Greater => link = &node.right,
                Ordering::Equal => return Some((&node.key, &node.value)),
            }
        }

        None
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        let mut node = self.root.as_ref()?;
        while let Some(left) = &node.left {
            node = left;
        }

        Some((&node.key, &node.value))
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        let mut node = self.root.as_ref()?;
        while let Some(right) = &node.right {
            node = right;
        }

        Some((&node.key, &node.value))
    }

    /// In order iterator, from the smallest to the largest key.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            stack: Vec::new(),
            remaining: self.len(),
        };
        iter.push_left_spine(&self.root);

        iter
    }
}

impl<K: Clone, V: Clone> Tree<K, V> {
    /// Returns a new tree with `key` mapped to `value`, replacing the entry
    /// comparing equal to `key` if any.
    pub fn insert<F>(&self, key: K, value: V, cmp: &F) -> Self
    where
        F: Fn(&K, &K) -> Ordering,
    {
        Tree {
            root: Some(insert(&self.root, key, value, cmp)),
        }
    }

    /// Returns a new tree without the entry comparing equal to `key`, or
    /// `None` if there is no such entry.
    pub fn remove<F>(&self, key: &K, cmp: &F) -> Option<Self>
    where
        F: Fn(&K, &K) -> Ordering,
    {
        remove(&self.root, key, cmp).map(|root| Tree { root })
    }

    /// Returns a new tree without its largest entry, and that entry.
    pub fn remove_last(&self) -> Option<(Self, K, V)> {
        self.root.as_ref().map(|root| {
            let (key, value, rest) = remove_max(root);
            (Tree { root: rest }, key, value)
        })
    }

    /// Returns a new tree without its smallest entry, and that entry.
    pub fn remove_first(&self) -> Option<(Self, K, V)> {
        self.root.as_ref().map(|root| {
            let (key, value, rest) = remove_min(root);
            (Tree { root: rest }, key, value)
        })
    }
}

impl<K, V> Clone for Tree<K, V> {
    fn clone(&self) -> Self {
        Tree {
            root: self.root.clone(),
        }
    }
}

impl<K, V> Default for Tree<K, V> {
    fn default() -> Self {
        Tree::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Tree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

pub(crate) struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left_spine(&mut self, mut link: &'a Link<K, V>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = &node.left;
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(&node.right);
        self.remaining -= 1;

        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

// === Private Functions ===

fn size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

fn make<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<Node<K, V>> {
    Arc::new(Node {
        size: size(&left) + size(&right) + 1,
        key,
        value,
        left,
        right,
    })
}

/// Rebuilds a node whose subtrees were balanced before a single insert or
/// removal on one side.
fn balance<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Arc<Node<K, V>> {
    let (size_left, size_right) = (size(&left), size(&right));

    if size_left + size_right <= 1 {
        return make(key, value, left, right);
    }

    if size_right > DELTA * size_left {
        if let Some(r) = &right {
            return if size(&r.left) < RATIO * size(&r.right) {
                rotate_single_left(key, value, left, r)
            } else {
                rotate_double_left(key, value, left, r)
            };
        }
    }

    if size_left > DELTA * size_right {
        if let Some(l) = &left {
            return if size(&l.right) < RATIO * size(&l.left) {
                rotate_single_right(key, value, l, right)
            } else {
                rotate_double_right(key, value, l, right)
            };
        }
    }

    make(key, value, left, right)
}

fn rotate_single_left<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    r: &Arc<Node<K, V>>,
) -> Arc<Node<K, V>> {
    make(
        r.key.clone(),
        r.value.clone(),
        Some(make(key, value, left, r.left.clone())),
        r.right.clone(),
    )
}

fn rotate_single_right<K: Clone, V: Clone>(
    key: K,
    value: V,
    l: &Arc<Node<K, V>>,
    right: Link<K, V>,
) -> Arc<Node<K, V>> {
    make(
        l.key.clone(),
        l.value.clone(),
        l.left.clone(),
        Some(make(key, value, l.right.clone(), right)),
    )
}

fn rotate_double_left<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    r: &Arc<Node<K, V>>,
) -> Arc<Node<K, V>> {
    match &r.left {
        Some(rl) => make(
            rl.key.clone(),
            rl.value.clone(),
            Some(make(key, value, left, rl.left.clone())),
            Some(make(
                r.key.clone(),
                r.value.clone(),
                rl.right.clone(),
                r.right.clone(),
            )),
        ),
        // An empty inner grandchild always takes the single rotation.
        None => rotate_single_left(key, value, left, r),
    }
}

fn rotate_double_right<K: Clone, V: Clone>(
    key: K,
    value: V,
    l: &Arc<Node<K, V>>,
    right: Link<K, V>,
) -> Arc<Node<K, V>> {
    match &l.right {
        Some(lr) => make(
            lr.key.clone(),
            lr.value.clone(),
            Some(make(
                l.key.clone(),
                l.value.clone(),
                l.left.clone(),
                lr.left.clone(),
            )),
            Some(make(key, value, lr.right.clone(), right)),
        ),
        None => rotate_single_right(key, value, l, right),
    }
}

fn insert<K: Clone, V: Clone, F>(link: &Link<K, V>, key: K, value: V, cmp: &F) -> Arc<Node<K, V>>
where
    F: Fn(&K, &K) -> Ordering,
{
    let node = match link {
        None => return make(key, value, None, None),
        Some(node) => node,
    };

    match cmp(&key, &node.key) {
        Ordering::Less => balance(
            node.key.clone(),
            node.value.clone(),
            Some(insert(&node.left, key, value, cmp)),
            node.right.clone(),
        ),
        Ordering::Greater => balance(
            node.key.clone(),
            node.value.clone(),
            node.left.clone(),
            Some(insert(&node.right, key, value, cmp)),
        ),
        Ordering::Equal => Arc::new(Node {
            key,
            value,
            size: node.size,
            left: node.left.clone(),
            right: node.right.clone(),
        }),
    }
}

fn remove<K: Clone, V: Clone, F>(link: &Link<K, V>, key: &K, cmp: &F) -> Option<Link<K, V>>
where
    F: Fn(&K, &K) -> Ordering,
{
    let node = link.as_ref()?;

    let rebuilt = match cmp(key, &node.key) {
        Ordering::Less => {
            let left = remove(&node.left, key, cmp)?;
            balance(node.key.clone(), node.value.clone(), left, node.right.clone())
        }
        Ordering::Greater => {
            let right = remove(&node.right, key, cmp)?;
            balance(node.key.clone(), node.value.clone(), node.left.clone(), right)
        }
        Ordering::Equal => return Some(glue(&node.left, &node.right)),
    };

    Some(Some(rebuilt))
}

/// Joins the two subtrees of a removed node.
fn glue<K: Clone, V: Clone>(left: &Link<K, V>, right: &Link<K, V>) -> Link<K, V> {
    match (left, right) {
        (None, _) => right.clone(),
        (_, None) => left.clone(),
        (Some(l), Some(r)) => {
            if l.size > r.size {
                let (key, value, rest) = remove_max(l);
                Some(balance(key, value, rest, right.clone()))
            } else {
                let (key, value, rest) = remove_min(r);
                Some(balance(key, value, left.clone(), rest))
            }
        }
    }
}

fn remove_min<K: Clone, V: Clone>(node: &Arc<Node<K, V>>) -> (K, V, Link<K, V>) {
    match &node.left {
        None => (node.key.clone(), node.value.clone(), node.right.clone()),
        Some(left) => {
            let (key, value, rest) = remove_min(left);
            let rebuilt = balance(
                node.key.clone(),
                node.value.clone(),
                rest,
                node.right.clone(),
            );

            (key, value, Some(rebuilt))
        }
    }
}

fn remove_max<K: Clone, V: Clone>(node: &Arc<Node<K, V>>) -> (K, V, Link<K, V>) {
    match &node.right {
        None => (node.key.clone(), node.value.clone(), node.left.clone()),
        Some(right) => {
            let (key, value, rest) = remove_max(right);
            let rebuilt = balance(
                node.key.clone(),
                node.value.clone(),
                node.left.clone(),
                rest,
            );

            (key, value, Some(rebuilt))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn cmp(a: &u32, b: &u32) -> Ordering {
        a.cmp(b)
    }

    fn is_balanced<K, V>(link: &Link<K, V>) -> bool {
        match link {
            None => true,
            Some(node) => {
                let (l, r) = (size(&node.left), size(&node.right));

                node.size == l + r + 1
                    && (l + r <= 1 || (l <= DELTA * r && r <= DELTA * l))
                    && is_balanced(&node.left)
                    && is_balanced(&node.right)
            }
        }
    }

    #[test]
    fn insert_get_and_replace() {
        let tree = Tree::new()
            .insert(2, "b", &cmp)
            .insert(1, "a", &cmp)
            .insert(3, "c", &cmp);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(&2, &cmp), Some((&2, &"b")));
        assert_eq!(tree.get(&4, &cmp), None);

        let replaced = tree.insert(2, "B", &cmp);

        assert_eq!(replaced.len(), 3);
        assert_eq!(replaced.get(&2, &cmp), Some((&2, &"B")));
        assert_eq!(tree.get(&2, &cmp), Some((&2, &"b")));
    }

    #[test]
    fn first_and_last() {
        let empty: Tree<u32, ()> = Tree::new();
        assert!(empty.first().is_none());
        assert!(empty.last().is_none());
        assert!(empty.remove_last().is_none());

        let tree = (0..100).fold(Tree::new(), |tree, i| tree.insert((i * 37) % 100, (), &cmp));

        assert_eq!(tree.first(), Some((&0, &())));
        assert_eq!(tree.last(), Some((&99, &())));

        let (rest, key, _) = tree.remove_last().expect("not empty");
        assert_eq!(key, 99);
        assert_eq!(rest.len(), 99);
        assert_eq!(rest.last(), Some((&98, &())));

        let (rest, key, _) = rest.remove_first().expect("not empty");
        assert_eq!(key, 0);
        assert_eq!(rest.first(), Some((&1, &())));
    }

    #[test]
    fn remove_missing_is_none() {
        let tree = Tree::new().insert(1, (), &cmp);

        assert!(tree.remove(&2, &cmp).is_none());
        assert!(Tree::<u32, ()>::new().remove(&2, &cmp).is_none());

        let removed = tree.remove(&1, &cmp).expect("present");
        assert!(removed.is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn sequential_inserts_stay_balanced() {
        let tree = (0..1000).fold(Tree::new(), |tree, i| tree.insert(i, i, &cmp));

        assert!(is_balanced(&tree.root));
        assert!(tree.iter().map(|(k, _)| *k).eq(0..1000));
        assert_eq!(tree.iter().len(), 1000);
    }

    proptest! {
        #[test]
        fn matches_btree_map(ops in prop::collection::vec((any::<bool>(), 0..64_u32), 0..200)) {
            let mut model = BTreeMap::new();
            let mut tree = Tree::new();
            let mut versions = Vec::new();

            for (is_insert, key) in ops {
                versions.push((tree.clone(), model.clone()));

                if is_insert {
                    model.insert(key, key * 2);
                    tree = tree.insert(key, key * 2, &cmp);
                } else {
                    let existed = model.remove(&key).is_some();
                    match tree.remove(&key, &cmp) {
                        Some(next) => {
                            prop_assert!(existed);
                            tree = next;
                        }
                        None => prop_assert!(!existed),
                    }
                }

                prop_assert!(is_balanced(&tree.root));
                prop_assert_eq!(tree.len(), model.len());
            }

            prop_assert!(tree.iter().map(|(k, v)| (*k, *v)).eq(model.into_iter()));

            // Older versions are untouched by later updates.
            for (old, old_model) in versions {
                prop_assert!(old.iter().map(|(k, v)| (*k, *v)).eq(old_model.into_iter()));
            }
        }
    }
}
