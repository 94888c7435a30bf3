//! Sorted Vault Index
//!
//! One doubly-linked list per collateral asset, ordered head to tail by
//! descending adjusted risk score. Nodes live in an arena keyed by the
//! vault's stable id, so a splice is O(1) when the caller supplies a
//! valid (prev, next) hint and O(n) otherwise.
//!
//! The list stores no scores. Hint validation and searching query the
//! caller through a live score callback, because scores drift as
//! interest accrues; hints computed against an older view are simply
//! discarded.

use std::collections::BTreeMap;

use crate::check;
use crate::errors::{EngineError, EngineResult};
use crate::types::{Address, VaultId};

#[derive(Debug, Clone, Copy, Default)]
struct Node {
    prev: Option<VaultId>,
    next: Option<VaultId>,
}

#[derive(Debug, Clone, Default)]
struct AssetList {
    head: Option<VaultId>,
    tail: Option<VaultId>,
    nodes: BTreeMap<VaultId, Node>,
}

/// Per-asset sorted lists over the shared vault arena
#[derive(Debug, Clone, Default)]
pub struct SortedIndex {
    lists: BTreeMap<Address, AssetList>,
}

impl SortedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is linked into the list for `asset`
    pub fn contains(&self, asset: Address, id: VaultId) -> bool {
        self.lists
            .get(&asset)
            .map(|l| l.nodes.contains_key(&id))
            .unwrap_or(false)
    }

    /// Number of linked vaults for `asset`
    pub fn size(&self, asset: Address) -> u64 {
        self.lists
            .get(&asset)
            .map(|l| l.nodes.len() as u64)
            .unwrap_or(0)
    }

    /// Largest-score end of the list
    pub fn head(&self, asset: Address) -> Option<VaultId> {
        self.lists.get(&asset).and_then(|l| l.head)
    }

    /// Smallest-score end of the list
    pub fn tail(&self, asset: Address) -> Option<VaultId> {
        self.lists.get(&asset).and_then(|l| l.tail)
    }

    /// Neighbor toward the tail
    pub fn next(&self, asset: Address, id: VaultId) -> Option<VaultId> {
        self.lists
            .get(&asset)
            .and_then(|l| l.nodes.get(&id))
            .and_then(|n| n.next)
    }

    /// Neighbor toward the head
    pub fn prev(&self, asset: Address, id: VaultId) -> Option<VaultId> {
        self.lists
            .get(&asset)
            .and_then(|l| l.nodes.get(&id))
            .and_then(|n| n.prev)
    }

    /// Head-to-tail traversal
    pub fn iter(&self, asset: Address) -> impl Iterator<Item = VaultId> + '_ {
        let list = self.lists.get(&asset);
        let mut cursor = list.and_then(|l| l.head);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = list.and_then(|l| l.nodes.get(&current)).and_then(|n| n.next);
            Some(current)
        })
    }

    /// Links `id` with score `ars`, splicing at the hinted position when
    /// it is still valid and searching otherwise.
    pub fn insert<F>(
        &mut self,
        asset: Address,
        id: VaultId,
        ars: u128,
        prev_hint: Option<VaultId>,
        next_hint: Option<VaultId>,
        ars_of: F,
    ) -> EngineResult<()>
    where
        F: Fn(VaultId) -> u128,
    {
        check!(
            id != 0,
            EngineError::InvalidParameter {
                what: "vault id zero is reserved",
            }
        );
        check!(
            ars != 0,
            EngineError::InvalidParameter {
                what: "cannot rank a zero risk score",
            }
        );
        check!(
            !self.contains(asset, id),
            EngineError::InvalidParameter {
                what: "vault already ranked",
            }
        );

        let (prev, next) = if self.is_valid_position(asset, prev_hint, next_hint, ars, &ars_of) {
            (prev_hint, next_hint)
        } else {
            self.find_position(asset, ars, prev_hint, next_hint, &ars_of)
        };

        let list = self.lists.entry(asset).or_default();
        list.nodes.insert(id, Node { prev, next });
        match (prev, next) {
            (None, None) => {
                list.head = Some(id);
                list.tail = Some(id);
            }
            (None, Some(n)) => {
                if let Some(node) = list.nodes.get_mut(&n) {
                    node.prev = Some(id);
                }
                list.head = Some(id);
            }
            (Some(p), None) => {
                if let Some(node) = list.nodes.get_mut(&p) {
                    node.next = Some(id);
                }
                list.tail = Some(id);
            }
            (Some(p), Some(n)) => {
                if let Some(node) = list.nodes.get_mut(&p) {
                    node.next = Some(id);
                }
                if let Some(node) = list.nodes.get_mut(&n) {
                    node.prev = Some(id);
                }
            }
        }
        Ok(())
    }

    /// Unlinks `id`, splicing its neighbors together.
    pub fn remove(&mut self, asset: Address, id: VaultId) -> EngineResult<()> {
        let list = self
            .lists
            .get_mut(&asset)
            .ok_or(EngineError::InvalidParameter {
                what: "vault not ranked",
            })?;
        let node = list
            .nodes
            .remove(&id)
            .ok_or(EngineError::InvalidParameter {
                what: "vault not ranked",
            })?;

        match node.prev {
            Some(p) => {
                if let Some(prev_node) = list.nodes.get_mut(&p) {
                    prev_node.next = node.next;
                }
            }
            None => list.head = node.next,
        }
        match node.next {
            Some(n) => {
                if let Some(next_node) = list.nodes.get_mut(&n) {
                    next_node.prev = node.prev;
                }
            }
            None => list.tail = node.prev,
        }
        Ok(())
    }

    /// Re-ranks `id` at a new score.
    pub fn re_insert<F>(
        &mut self,
        asset: Address,
        id: VaultId,
        new_ars: u128,
        prev_hint: Option<VaultId>,
        next_hint: Option<VaultId>,
        ars_of: F,
    ) -> EngineResult<()>
    where
        F: Fn(VaultId) -> u128,
    {
        self.remove(asset, id)?;
        self.insert(asset, id, new_ars, prev_hint, next_hint, ars_of)
    }

    /// Walks the list to produce a (prev, next) hint pair for `ars`,
    /// for callers that have no better starting point.
    pub fn approx_hint<F>(
        &self,
        asset: Address,
        ars: u128,
        ars_of: F,
    ) -> (Option<VaultId>, Option<VaultId>)
    where
        F: Fn(VaultId) -> u128,
    {
        self.descend(asset, ars, self.head(asset), &ars_of)
    }

    fn is_valid_position<F>(
        &self,
        asset: Address,
        prev: Option<VaultId>,
        next: Option<VaultId>,
        ars: u128,
        ars_of: &F,
    ) -> bool
    where
        F: Fn(VaultId) -> u128,
    {
        match (prev, next) {
            (None, None) => self.size(asset) == 0,
            (None, Some(n)) => self.head(asset) == Some(n) && ars >= ars_of(n),
            (Some(p), None) => self.tail(asset) == Some(p) && ars <= ars_of(p),
            (Some(p), Some(n)) => {
                self.contains(asset, p)
                    && self.next(asset, p) == Some(n)
                    && ars_of(p) >= ars
                    && ars >= ars_of(n)
            }
        }
    }

    fn find_position<F>(
        &self,
        asset: Address,
        ars: u128,
        prev_hint: Option<VaultId>,
        next_hint: Option<VaultId>,
        ars_of: &F,
    ) -> (Option<VaultId>, Option<VaultId>)
    where
        F: Fn(VaultId) -> u128,
    {
        // A hint survives only if it still exists and sits on the correct
        // side of the new score.
        let prev = prev_hint.filter(|&p| self.contains(asset, p) && ars_of(p) >= ars);
        let next = next_hint.filter(|&n| self.contains(asset, n) && ars_of(n) <= ars);

        match (prev, next) {
            (Some(p), None) => self.descend(asset, ars, Some(p), ars_of),
            (None, Some(n)) => self.ascend(asset, ars, Some(n), ars_of),
            _ => self.descend(asset, ars, self.head(asset), ars_of),
        }
    }

    fn descend<F>(
        &self,
        asset: Address,
        ars: u128,
        start: Option<VaultId>,
        ars_of: &F,
    ) -> (Option<VaultId>, Option<VaultId>)
    where
        F: Fn(VaultId) -> u128,
    {
        let Some(start) = start else {
            return (None, None);
        };
        if self.head(asset) == Some(start) && ars >= ars_of(start) {
            return (None, Some(start));
        }

        let mut prev = Some(start);
        let mut next = self.next(asset, start);
        while prev.is_some() && !self.is_valid_position(asset, prev, next, ars, ars_of) {
            prev = next;
            next = prev.and_then(|p| self.next(asset, p));
        }
        (prev, next)
    }

    fn ascend<F>(
        &self,
        asset: Address,
        ars: u128,
        start: Option<VaultId>,
        ars_of: &F,
    ) -> (Option<VaultId>, Option<VaultId>)
    where
        F: Fn(VaultId) -> u128,
    {
        let Some(start) = start else {
            return (None, None);
        };
        if self.tail(asset) == Some(start) && ars <= ars_of(start) {
            return (Some(start), None);
        }

        let mut next = Some(start);
        let mut prev = self.prev(asset, start);
        while next.is_some() && !self.is_valid_position(asset, prev, next, ars, ars_of) {
            next = prev;
            prev = next.and_then(|n| self.prev(asset, n));
        }
        (prev, next)
    }
}
