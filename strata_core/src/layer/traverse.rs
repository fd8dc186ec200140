// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use alloc::vec::Vec;

use super::id::{INVALID, LayerId};
use super::store::LayerStore;

/// An iterator over the direct children of a layer, back to front.
///
/// Created by [`LayerStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a LayerStore,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a LayerStore, first: u32) -> Self {
        Self {
            store,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.store.next_sibling[idx as usize];
        Some(LayerId {
            idx,
            generation: self.store.generation[idx as usize],
        })
    }
}

/// A depth-first pre-order iterator over a subtree.
///
/// Visits a layer before its children, and children back to front, which is
/// exactly the order layers are composited. Created by
/// [`LayerStore::preorder`].
#[derive(Debug)]
pub struct Preorder<'a> {
    store: &'a LayerStore,
    stack: Vec<u32>,
}

impl<'a> Preorder<'a> {
    pub(crate) fn new(store: &'a LayerStore, root: u32) -> Self {
        let mut stack = Vec::new();
        stack.push(root);
        Self { store, stack }
    }
}

impl Iterator for Preorder<'_> {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        let idx = self.stack.pop()?;

        // Push children in reverse so the first child pops first.
        let mut rev = Vec::new();
        let mut child = self.store.first_child[idx as usize];
        while child != INVALID {
            rev.push(child);
            child = self.store.next_sibling[child as usize];
        }
        self.stack.extend(rev.into_iter().rev());

        Some(LayerId {
            idx,
            generation: self.store.generation[idx as usize],
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::super::kind::LayerKind;
    use super::*;

    #[test]
    fn preorder_visits_parent_then_children_in_order() {
        let mut store = LayerStore::new();
        let root = store.create_layer(LayerKind::Container);
        let a = store.create_layer(LayerKind::Container);
        let b = store.create_layer(LayerKind::Container);
        let a1 = store.create_layer(LayerKind::Container);
        store.insert_after(root, a, None);
        store.insert_after(root, b, Some(a));
        store.insert_after(a, a1, None);

        let order: Vec<_> = store.preorder(root).collect();
        assert_eq!(order, vec![root, a, a1, b]);
    }

    #[test]
    fn preorder_of_leaf_is_just_the_leaf() {
        let mut store = LayerStore::new();
        let leaf = store.create_layer(LayerKind::Container);
        let order: Vec<_> = store.preorder(leaf).collect();
        assert_eq!(order, vec![leaf]);
    }
}
