//! # avl-rs
//!
//! A compact ordered map backed by an arena-allocated AVL tree.
//!
//! Nodes live in a slot arena and link to each other through copyable
//! `u32` handles instead of child pointers, so the per-node footprint
//! stays small and entry identity is stable across rebalancing
//! rotations. The tree stores no parent links; iteration finds each
//! in-order successor by re-descending from the root, trading O(log n)
//! per step for the smaller node layout.
//!
//! Key order is supplied by the caller as a strict-weak-ordering
//! predicate (see [`Comparator`]); plain `Ord` keys work out of the box.
//!
//! ## Example
//!
//! ```rust
//! use avl_rs::AvlMap;
//!
//! let mut map: AvlMap<&str, u64> = AvlMap::new();
//! map.insert("hello", 1);
//! map.insert("world", 2);
//!
//! assert_eq!(map.get(&"hello"), Some(&1));
//! assert_eq!(map.get(&"world"), Some(&2));
//! assert_eq!(map.len(), 2);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Arc;

// =============================================================================
// Key ordering
// =============================================================================

/// A strict weak ordering over keys.
///
/// Implementors supply only the `less` predicate; the map derives the
/// 3-way comparison it descends with by evaluating the predicate in both
/// directions. Neither direction holding means the keys are equivalent.
///
/// The predicate must be total, deterministic, and side-effect-free. A
/// comparator that violates strict weak ordering yields an unspecified
/// entry order but never memory unsafety.
pub trait Comparator<K> {
    /// Returns true when `a` orders strictly before `b`.
    fn less(&self, a: &K, b: &K) -> bool;

    /// 3-way comparison derived from the boolean predicate.
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        match (self.less(a, b), self.less(b, a)) {
            (true, _) => Ordering::Less,
            (_, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }
}

/// Orders keys by their `Ord` instance. The default comparator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord> Comparator<K> for NaturalOrder {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// Orders `Rc`/`Arc` handles by allocation address, so shared handles can
/// be used as keys compared by identity rather than by pointee value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddressOrder;

impl<T> Comparator<Rc<T>> for AddressOrder {
    #[inline]
    fn less(&self, a: &Rc<T>, b: &Rc<T>) -> bool {
        Rc::as_ptr(a) < Rc::as_ptr(b)
    }
}

impl<T> Comparator<Arc<T>> for AddressOrder {
    #[inline]
    fn less(&self, a: &Arc<T>, b: &Arc<T>) -> bool {
        Arc::as_ptr(a) < Arc::as_ptr(b)
    }
}

impl<K, F: Fn(&K, &K) -> bool> Comparator<K> for F {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        self(a, b)
    }
}

// =============================================================================
// Node storage
// =============================================================================

/// Arena handle for a node. `NIL` is the null sentinel, playing the role
/// a null child pointer would in a pointer-linked tree.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct NodeId(u32);

impl NodeId {
    const NIL: NodeId = NodeId(u32::MAX);

    #[inline]
    fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    fn index(self) -> usize {
        debug_assert!(!self.is_nil());
        self.0 as usize
    }
}

struct Node<K, V> {
    key: K,
    value: V,
    left: NodeId,
    right: NodeId,
    /// Cached subtree height; a leaf has height 1.
    height: i32,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Self {
        Node {
            key,
            value,
            left: NodeId::NIL,
            right: NodeId::NIL,
            height: 1,
        }
    }
}

/// Slot arena with a free list of released slots.
///
/// A slot is reused only after its entry has been erased, so a `NodeId`
/// stays valid for exactly the lifetime of the entry it was allocated
/// for, rotations included.
struct NodeArena<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<u32>,
}

impl<K, V> NodeArena<K, V> {
    fn new() -> Self {
        NodeArena {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn with_capacity(cap: usize) -> Self {
        NodeArena {
            slots: Vec::with_capacity(cap),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        if let Some(slot) = self.free.pop() {
            debug_assert!(self.slots[slot as usize].is_none());
            self.slots[slot as usize] = Some(node);
            return NodeId(slot);
        }
        debug_assert!(self.slots.len() < u32::MAX as usize);
        let slot = self.slots.len() as u32;
        self.slots.push(Some(node));
        NodeId(slot)
    }

    fn release(&mut self, id: NodeId) -> Node<K, V> {
        let node = self.slots[id.index()].take().expect("released slot is live");
        self.free.push(id.0);
        node
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<K, V> {
        self.slots[id.index()].as_ref().expect("node slot is live")
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.slots[id.index()].as_mut().expect("node slot is live")
    }

    #[cfg(test)]
    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
    }
}

// =============================================================================
// AvlMap
// =============================================================================

/// An ordered map: unique keys, caller-supplied ordering, O(log n)
/// lookup/insert/remove, in-order iteration.
///
/// The tree keeps the AVL balance invariant: for every node the heights
/// of its two subtrees differ by at most one, which bounds the tree
/// height at ~1.44·log2(n).
pub struct AvlMap<K, V, C = NaturalOrder> {
    arena: NodeArena<K, V>,
    root: NodeId,
    size: usize,
    cmp: C,
}

impl<K: Ord, V> AvlMap<K, V> {
    /// Creates an empty map ordered by the keys' `Ord` instance.
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder)
    }
}

impl<K, V, C: Comparator<K>> AvlMap<K, V, C> {
    /// Creates an empty map ordered by `cmp`.
    pub fn with_comparator(cmp: C) -> Self {
        AvlMap {
            arena: NodeArena::new(),
            root: NodeId::NIL,
            size: 0,
            cmp,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Removes every entry. The arena is dropped wholesale; the map stays
    /// valid and reusable.
    pub fn clear(&mut self) {
        self.arena = NodeArena::new();
        self.root = NodeId::NIL;
        self.size = 0;
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let id = self.find_id(key);
        if id.is_nil() {
            None
        } else {
            Some(&self.node(id).value)
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let id = self.find_id(key);
        if id.is_nil() {
            None
        } else {
            Some(&mut self.node_mut(id).value)
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        !self.find_id(key).is_nil()
    }

    /// Returns a cursor at the entry with this key, or the end cursor.
    pub fn find(&self, key: &K) -> Cursor<'_, K, V, C> {
        Cursor {
            map: self,
            at: self.find_id(key),
        }
    }

    /// Mutable counterpart of [`find`](Self::find).
    pub fn find_mut(&mut self, key: &K) -> CursorMut<'_, K, V, C> {
        let at = self.find_id(key);
        CursorMut { map: self, at }
    }

    /// Cursor at the first entry whose key is not less than `key`.
    pub fn lower_bound(&self, key: &K) -> Cursor<'_, K, V, C> {
        Cursor {
            map: self,
            at: self.lower_bound_id(key),
        }
    }

    /// Mutable counterpart of [`lower_bound`](Self::lower_bound).
    pub fn lower_bound_mut(&mut self, key: &K) -> CursorMut<'_, K, V, C> {
        let at = self.lower_bound_id(key);
        CursorMut { map: self, at }
    }

    /// Cursor at the smallest entry; the end cursor when empty.
    pub fn front(&self) -> Cursor<'_, K, V, C> {
        Cursor {
            map: self,
            at: self.min_in(self.root),
        }
    }

    /// Mutable counterpart of [`front`](Self::front).
    pub fn front_mut(&mut self) -> CursorMut<'_, K, V, C> {
        let at = self.min_in(self.root);
        CursorMut { map: self, at }
    }

    /// The past-the-last cursor.
    pub fn end(&self) -> Cursor<'_, K, V, C> {
        Cursor {
            map: self,
            at: NodeId::NIL,
        }
    }

    /// Inserts `key -> value` if the key is absent.
    ///
    /// The first insert wins: when the key already exists the stored
    /// value is left untouched, the bool is false, and the cursor points
    /// at the existing entry. Otherwise a new leaf is allocated, the
    /// descent path is rebalanced bottom-up, and the bool is true.
    pub fn insert(&mut self, key: K, value: V) -> (Cursor<'_, K, V, C>, bool) {
        let existing = self.find_id(&key);
        if !existing.is_nil() {
            return (
                Cursor {
                    map: &*self,
                    at: existing,
                },
                false,
            );
        }
        let root = self.root;
        let (new_root, entry, inserted) = self.insert_at(root, key, value);
        debug_assert!(inserted);
        self.root = new_root;
        self.size += 1;
        (
            Cursor {
                map: &*self,
                at: entry,
            },
            true,
        )
    }

    /// Returns a mutable reference to the value for `key`, inserting a
    /// default value first if the key is absent.
    pub fn get_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let found = self.find_id(&key);
        let id = if found.is_nil() {
            let root = self.root;
            let (new_root, entry, inserted) = self.insert_at(root, key, V::default());
            debug_assert!(inserted);
            self.root = new_root;
            self.size += 1;
            entry
        } else {
            found
        };
        &mut self.node_mut(id).value
    }

    /// Removes the entry with this key, returning its value. Removing an
    /// absent key is not an error.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let id = self.find_id(key);
        if id.is_nil() {
            return None;
        }
        let ((_, value), _) = self.remove_entry_at(id);
        Some(value)
    }

    pub fn iter(&self) -> Iter<'_, K, V, C> {
        Iter {
            map: self,
            at: self.min_in(self.root),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, C> {
        // The traversal order is captured up front so that every slot
        // access during iteration derives from one raw pointer into the
        // arena. Reborrowing the map on each step would invalidate the
        // `&mut V` borrows handed out by earlier steps.
        let mut order = Vec::with_capacity(self.size);
        let mut at = self.min_in(self.root);
        while !at.is_nil() {
            order.push(at);
            at = self.successor_of(at);
        }
        let slots = NonNull::new(self.arena.slots.as_mut_ptr()).expect("vec pointer is non-null");
        IterMut {
            slots,
            order: order.into_iter(),
            _map: PhantomData,
        }
    }

    /// Estimated heap footprint of the node storage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.arena.slots.capacity() * mem::size_of::<Option<Node<K, V>>>()
            + self.arena.free.capacity() * mem::size_of::<u32>()
    }

    pub fn shrink_to_fit(&mut self) {
        self.arena.shrink_to_fit();
    }

    /// Rebuilds the arena without free-list holes, renumbering every
    /// node. Returns the number of nodes rewritten.
    pub fn compact(&mut self) -> usize {
        if self.root.is_nil() {
            self.arena = NodeArena::new();
            return 0;
        }
        let old = mem::replace(&mut self.arena, NodeArena::with_capacity(self.size));
        let mut old_slots = old.slots;
        let root = self.root;
        self.root = rebuild_into(&mut old_slots, &mut self.arena, root);
        self.size
    }

    // =========================================================================
    // Descent helpers
    // =========================================================================

    #[inline]
    fn node(&self, id: NodeId) -> &Node<K, V> {
        self.arena.node(id)
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.arena.node_mut(id)
    }

    fn find_id(&self, key: &K) -> NodeId {
        let mut cur = self.root;
        while !cur.is_nil() {
            cur = match self.cmp.compare(key, &self.node(cur).key) {
                Ordering::Less => self.node(cur).left,
                Ordering::Greater => self.node(cur).right,
                Ordering::Equal => return cur,
            };
        }
        NodeId::NIL
    }

    fn lower_bound_id(&self, key: &K) -> NodeId {
        let mut cur = self.root;
        let mut candidate = NodeId::NIL;
        while !cur.is_nil() {
            if self.cmp.less(&self.node(cur).key, key) {
                cur = self.node(cur).right;
            } else {
                candidate = cur;
                cur = self.node(cur).left;
            }
        }
        candidate
    }

    fn min_in(&self, mut id: NodeId) -> NodeId {
        if id.is_nil() {
            return id;
        }
        loop {
            let left = self.node(id).left;
            if left.is_nil() {
                return id;
            }
            id = left;
        }
    }

    /// In-order successor of a live node.
    ///
    /// With a right subtree the successor is its minimum. Without one,
    /// there are no parent links to climb, so this re-descends from the
    /// root and records the last ancestor passed on a left turn.
    fn successor_of(&self, id: NodeId) -> NodeId {
        let right = self.node(id).right;
        if !right.is_nil() {
            return self.min_in(right);
        }
        let mut cur = self.root;
        let mut succ = NodeId::NIL;
        while !cur.is_nil() {
            match self.cmp.compare(&self.node(cur).key, &self.node(id).key) {
                Ordering::Greater => {
                    succ = cur;
                    cur = self.node(cur).left;
                }
                Ordering::Less => cur = self.node(cur).right,
                Ordering::Equal => break,
            }
        }
        succ
    }

    // =========================================================================
    // Height and rotation bookkeeping
    // =========================================================================

    #[inline]
    fn height_of(&self, id: NodeId) -> i32 {
        if id.is_nil() {
            0
        } else {
            self.node(id).height
        }
    }

    fn update_height(&mut self, id: NodeId) {
        let (left, right) = {
            let n = self.node(id);
            (n.left, n.right)
        };
        let height = 1 + self.height_of(left).max(self.height_of(right));
        self.node_mut(id).height = height;
    }

    #[inline]
    fn balance_of(&self, id: NodeId) -> i32 {
        let n = self.node(id);
        self.height_of(n.left) - self.height_of(n.right)
    }

    /// Rotates `id` left and returns the new subtree root. Only the two
    /// participants' heights need recomputation afterwards.
    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let pivot = self.node(id).right;
        let pivot_left = self.node(pivot).left;
        self.node_mut(id).right = pivot_left;
        self.update_height(id);
        self.node_mut(pivot).left = id;
        self.update_height(pivot);
        pivot
    }

    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let pivot = self.node(id).left;
        let pivot_right = self.node(pivot).right;
        self.node_mut(id).left = pivot_right;
        self.update_height(id);
        self.node_mut(pivot).right = id;
        self.update_height(pivot);
        pivot
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Recursive insert. Returns the subtree root after rebalancing, the
    /// id of the entry for `key`, and whether a node was allocated.
    fn insert_at(&mut self, cur: NodeId, key: K, value: V) -> (NodeId, NodeId, bool) {
        if cur.is_nil() {
            let id = self.arena.alloc(Node::new(key, value));
            return (id, id, true);
        }
        match self.cmp.compare(&key, &self.node(cur).key) {
            Ordering::Less => {
                let left = self.node(cur).left;
                let (new_left, entry, inserted) = self.insert_at(left, key, value);
                self.node_mut(cur).left = new_left;
                let cur = if inserted {
                    self.rebalance_after_insert(cur, entry)
                } else {
                    cur
                };
                (cur, entry, inserted)
            }
            Ordering::Greater => {
                let right = self.node(cur).right;
                let (new_right, entry, inserted) = self.insert_at(right, key, value);
                self.node_mut(cur).right = new_right;
                let cur = if inserted {
                    self.rebalance_after_insert(cur, entry)
                } else {
                    cur
                };
                (cur, entry, inserted)
            }
            Ordering::Equal => (cur, cur, false),
        }
    }

    /// Rebalances one node on the insertion unwind.
    ///
    /// The rotation case is chosen from this node's balance factor and
    /// the inserted key's position relative to the child on the heavy
    /// side. The heavy child's own stored balance can mis-select single
    /// vs. double rotation on ties; the inserted key never does.
    fn rebalance_after_insert(&mut self, cur: NodeId, inserted: NodeId) -> NodeId {
        self.update_height(cur);
        let balance = self.balance_of(cur);
        if balance > 1 {
            let left = self.node(cur).left;
            if self.cmp.less(&self.node(inserted).key, &self.node(left).key) {
                return self.rotate_right(cur);
            }
            let new_left = self.rotate_left(left);
            self.node_mut(cur).left = new_left;
            return self.rotate_right(cur);
        }
        if balance < -1 {
            let right = self.node(cur).right;
            if self.cmp.less(&self.node(right).key, &self.node(inserted).key) {
                return self.rotate_left(cur);
            }
            let new_right = self.rotate_right(right);
            self.node_mut(cur).right = new_right;
            return self.rotate_left(cur);
        }
        cur
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Removes a live node, returning its key/value pair and the id that
    /// now denotes the entry's in-order successor.
    ///
    /// With two children the successor's pair moves into the victim node
    /// and the successor's slot is the one released, so the victim id is
    /// the surviving position of the "next" entry. A cursor that pointed
    /// at the successor node itself is invalidated by this, even though
    /// its entry logically survives.
    fn remove_entry_at(&mut self, id: NodeId) -> ((K, V), NodeId) {
        let (left, right) = {
            let n = self.node(id);
            (n.left, n.right)
        };
        let next = if !left.is_nil() && !right.is_nil() {
            id
        } else {
            self.successor_of(id)
        };
        let root = self.root;
        let (new_root, removed) = self.remove_node_at(root, id);
        self.root = new_root;
        self.size -= 1;
        let removed = removed.expect("target node is reachable from the root");
        (removed, next)
    }

    /// Recursive removal of `target` from the subtree at `cur`. Returns
    /// the subtree root after rebalancing and the removed pair.
    fn remove_node_at(&mut self, cur: NodeId, target: NodeId) -> (NodeId, Option<(K, V)>) {
        if cur.is_nil() {
            return (cur, None);
        }
        if cur == target {
            let (left, right) = {
                let n = self.node(cur);
                (n.left, n.right)
            };
            if left.is_nil() || right.is_nil() {
                let replacement = if left.is_nil() { right } else { left };
                let node = self.arena.release(cur);
                return (replacement, Some((node.key, node.value)));
            }
            // Two children: detach the minimum of the right subtree and
            // move its pair into this node. Ordering holds because that
            // key is still the boundary between the two subtrees.
            let (new_right, min_id) = self.detach_min(right);
            let succ = self.arena.release(min_id);
            let node = self.node_mut(cur);
            let old_key = mem::replace(&mut node.key, succ.key);
            let old_value = mem::replace(&mut node.value, succ.value);
            node.right = new_right;
            return (self.rebalance_after_remove(cur), Some((old_key, old_value)));
        }
        match self.cmp.compare(&self.node(target).key, &self.node(cur).key) {
            Ordering::Less => {
                let left = self.node(cur).left;
                let (new_left, removed) = self.remove_node_at(left, target);
                self.node_mut(cur).left = new_left;
                let cur = if removed.is_some() {
                    self.rebalance_after_remove(cur)
                } else {
                    cur
                };
                (cur, removed)
            }
            Ordering::Greater => {
                let right = self.node(cur).right;
                let (new_right, removed) = self.remove_node_at(right, target);
                self.node_mut(cur).right = new_right;
                let cur = if removed.is_some() {
                    self.rebalance_after_remove(cur)
                } else {
                    cur
                };
                (cur, removed)
            }
            Ordering::Equal => unreachable!("keys are unique"),
        }
    }

    /// Unlinks the minimum node of a non-empty subtree, rebalancing the
    /// unwind path. Returns the remaining subtree and the detached id.
    fn detach_min(&mut self, id: NodeId) -> (NodeId, NodeId) {
        let left = self.node(id).left;
        if left.is_nil() {
            return (self.node(id).right, id);
        }
        let (new_left, min) = self.detach_min(left);
        self.node_mut(id).left = new_left;
        (self.rebalance_after_remove(id), min)
    }

    /// Rebalances one node on the removal unwind. Unlike insertion this
    /// selects the rotation case from the heavy child's own balance sign;
    /// which key was removed is irrelevant here.
    fn rebalance_after_remove(&mut self, cur: NodeId) -> NodeId {
        self.update_height(cur);
        let balance = self.balance_of(cur);
        if balance > 1 {
            let left = self.node(cur).left;
            if self.balance_of(left) < 0 {
                let new_left = self.rotate_left(left);
                self.node_mut(cur).left = new_left;
            }
            return self.rotate_right(cur);
        }
        if balance < -1 {
            let right = self.node(cur).right;
            if self.balance_of(right) > 0 {
                let new_right = self.rotate_right(right);
                self.node_mut(cur).right = new_right;
            }
            return self.rotate_left(cur);
        }
        cur
    }
}

fn rebuild_into<K, V>(
    old: &mut [Option<Node<K, V>>],
    arena: &mut NodeArena<K, V>,
    id: NodeId,
) -> NodeId {
    let mut node = old[id.index()].take().expect("rebuilt node is live");
    if !node.left.is_nil() {
        node.left = rebuild_into(old, arena, node.left);
    }
    if !node.right.is_nil() {
        node.right = rebuild_into(old, arena, node.right);
    }
    arena.alloc(node)
}

// =============================================================================
// Cursors
// =============================================================================

/// A read-only position in the map: either an entry or the end.
///
/// Advancing recomputes the in-order successor, an O(log n) re-descent.
/// Equality is entry identity: two cursors are equal when they denote
/// the same entry of the same map, so cursors from different maps never
/// compare equal.
pub struct Cursor<'a, K, V, C = NaturalOrder> {
    map: &'a AvlMap<K, V, C>,
    at: NodeId,
}

impl<'a, K, V, C: Comparator<K>> Cursor<'a, K, V, C> {
    #[inline]
    pub fn is_end(&self) -> bool {
        self.at.is_nil()
    }

    pub fn key(&self) -> Option<&'a K> {
        if self.at.is_nil() {
            None
        } else {
            Some(&self.map.node(self.at).key)
        }
    }

    pub fn value(&self) -> Option<&'a V> {
        if self.at.is_nil() {
            None
        } else {
            Some(&self.map.node(self.at).value)
        }
    }

    pub fn entry(&self) -> Option<(&'a K, &'a V)> {
        if self.at.is_nil() {
            None
        } else {
            let node = self.map.node(self.at);
            Some((&node.key, &node.value))
        }
    }

    /// Advances to the in-order successor; saturates at the end.
    pub fn move_next(&mut self) {
        if !self.at.is_nil() {
            self.at = self.map.successor_of(self.at);
        }
    }
}

impl<K, V, C> Clone for Cursor<'_, K, V, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, C> Copy for Cursor<'_, K, V, C> {}

impl<K, V, C> PartialEq for Cursor<'_, K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.map, other.map) && self.at == other.at
    }
}

impl<K, V, C> Eq for Cursor<'_, K, V, C> {}

impl<K: fmt::Debug, V: fmt::Debug, C: Comparator<K>> fmt::Debug for Cursor<'_, K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("entry", &self.entry()).finish()
    }
}

/// A mutable position in the map.
///
/// Holds the map exclusively, so the position it tracks can only be
/// invalidated by its own [`remove_current`](Self::remove_current).
pub struct CursorMut<'a, K, V, C = NaturalOrder> {
    map: &'a mut AvlMap<K, V, C>,
    at: NodeId,
}

impl<K, V, C: Comparator<K>> CursorMut<'_, K, V, C> {
    #[inline]
    pub fn is_end(&self) -> bool {
        self.at.is_nil()
    }

    pub fn key(&self) -> Option<&K> {
        if self.at.is_nil() {
            None
        } else {
            Some(&self.map.node(self.at).key)
        }
    }

    pub fn value(&self) -> Option<&V> {
        if self.at.is_nil() {
            None
        } else {
            Some(&self.map.node(self.at).value)
        }
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        if self.at.is_nil() {
            None
        } else {
            Some(&mut self.map.node_mut(self.at).value)
        }
    }

    /// Advances to the in-order successor; saturates at the end.
    pub fn move_next(&mut self) {
        if !self.at.is_nil() {
            self.at = self.map.successor_of(self.at);
        }
    }

    /// Removes the current entry and leaves the cursor at what was the
    /// entry's in-order successor before removal. On the end cursor this
    /// is a no-op returning `None`.
    pub fn remove_current(&mut self) -> Option<V> {
        if self.at.is_nil() {
            return None;
        }
        let ((_, value), next) = self.map.remove_entry_at(self.at);
        self.at = next;
        Some(value)
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Forward in-order iterator over `(&K, &V)`.
pub struct Iter<'a, K, V, C = NaturalOrder> {
    map: &'a AvlMap<K, V, C>,
    at: NodeId,
}

impl<'a, K, V, C: Comparator<K>> Iterator for Iter<'a, K, V, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.at.is_nil() {
            return None;
        }
        let node = self.map.node(self.at);
        self.at = self.map.successor_of(self.at);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.map.size))
    }
}

impl<K, V, C: Comparator<K>> FusedIterator for Iter<'_, K, V, C> {}

impl<K, V, C> Clone for Iter<'_, K, V, C> {
    fn clone(&self) -> Self {
        Iter {
            map: self.map,
            at: self.at,
        }
    }
}

/// Forward in-order iterator over `(&K, &mut V)`.
///
/// The in-order slot sequence is computed when the iterator is created;
/// iteration itself only dereferences into the arena buffer, so the
/// yielded borrows all stem from a single provenance and stay valid for
/// the iterator's whole lifetime.
pub struct IterMut<'a, K, V, C = NaturalOrder> {
    slots: NonNull<Option<Node<K, V>>>,
    order: std::vec::IntoIter<NodeId>,
    _map: PhantomData<&'a mut AvlMap<K, V, C>>,
}

impl<'a, K, V, C: Comparator<K>> Iterator for IterMut<'a, K, V, C> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.order.next()?;
        // SAFETY: `order` holds each live node id exactly once, every id
        // is in bounds of the slot buffer `slots` points into, and the
        // map is exclusively borrowed for 'a, so each slot reborrow is
        // disjoint from every other and outlives the yielded references.
        let node = unsafe {
            let slot = &mut *self.slots.as_ptr().add(id.index());
            slot.as_mut().expect("node slot is live")
        };
        Some((&node.key, &mut node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<K, V, C: Comparator<K>> ExactSizeIterator for IterMut<'_, K, V, C> {}

impl<K, V, C: Comparator<K>> FusedIterator for IterMut<'_, K, V, C> {}

/// Consuming in-order iterator. Pops the minimum entry repeatedly,
/// rebalancing as it goes, so the map drains the same way clearing by
/// repeated erase would.
pub struct IntoIter<K, V, C = NaturalOrder> {
    map: AvlMap<K, V, C>,
}

impl<K, V, C: Comparator<K>> Iterator for IntoIter<K, V, C> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.map.root.is_nil() {
            return None;
        }
        let root = self.map.root;
        let (new_root, min) = self.map.detach_min(root);
        self.map.root = new_root;
        self.map.size -= 1;
        let node = self.map.arena.release(min);
        Some((node.key, node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.map.size, Some(self.map.size))
    }
}

impl<K, V, C: Comparator<K>> ExactSizeIterator for IntoIter<K, V, C> {}

impl<K, V, C: Comparator<K>> FusedIterator for IntoIter<K, V, C> {}

impl<'a, K, V, C: Comparator<K>> IntoIterator for &'a AvlMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, C: Comparator<K>> IntoIterator for &'a mut AvlMap<K, V, C> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, C: Comparator<K>> IntoIterator for AvlMap<K, V, C> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { map: self }
    }
}

// =============================================================================
// Std trait impls
// =============================================================================

impl<K: Ord, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep copy: every entry of the source is re-inserted in iteration
/// order, so the copy shares no storage with the original.
impl<K: Clone, V: Clone, C: Comparator<K> + Clone> Clone for AvlMap<K, V, C> {
    fn clone(&self) -> Self {
        let mut out = Self::with_comparator(self.cmp.clone());
        for (k, v) in self.iter() {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C: Comparator<K>> fmt::Debug for AvlMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C: Comparator<K>> Extend<(K, V)> for AvlMap<K, V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for AvlMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AvlMap::new();
        map.extend(iter);
        map
    }
}


#[cfg(test)]
mod proptests;
