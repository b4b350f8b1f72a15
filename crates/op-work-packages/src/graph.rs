//! Schedule graph
//!
//! Arena of the work packages taking part in a scheduling pass, indexed by
//! id, with plain edge lists for the hierarchy and the follows/precedes
//! relations. Malformed data may contain cycles, so every walk keeps a
//! visited set and none of them recurse.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use op_core::Id;
use op_models::{Relation, WorkPackage};

#[derive(Debug, Clone, Default)]
pub struct ScheduleGraph {
    items: BTreeMap<Id, WorkPackage>,
    children: BTreeMap<Id, BTreeSet<Id>>,
    relations: BTreeMap<Id, Relation>,
    /// follower -> predecessor -> lag
    predecessors: BTreeMap<Id, BTreeMap<Id, i32>>,
    /// predecessor -> followers
    followers: BTreeMap<Id, BTreeSet<Id>>,
}

impl ScheduleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        work_packages: impl IntoIterator<Item = WorkPackage>,
        relations: impl IntoIterator<Item = Relation>,
    ) -> Self {
        let mut graph = Self::new();
        for work_package in work_packages {
            graph.insert(work_package);
        }
        for relation in relations {
            graph.add_relation(relation);
        }
        graph
    }

    /// Insert or replace a work package, keeping the child index current
    pub fn insert(&mut self, work_package: WorkPackage) {
        let id = work_package.id;
        let parent_id = work_package.parent_id;
        if let Some(previous) = self.items.insert(id, work_package) {
            if let Some(old_parent) = previous.parent_id {
                self.detach_child(old_parent, id);
            }
        }
        if let Some(parent_id) = parent_id {
            self.children.entry(parent_id).or_default().insert(id);
        }
    }

    /// Register a follows/precedes edge. Self references are dropped and a
    /// relation id seen twice is only counted once. Parallel relations
    /// between the same pair keep the largest lag.
    pub fn add_relation(&mut self, relation: Relation) {
        if relation.is_self_referencing() || self.relations.contains_key(&relation.id) {
            return;
        }
        let lags = self.predecessors.entry(relation.follower_id).or_default();
        let lag = lags.entry(relation.predecessor_id).or_insert(relation.lag);
        *lag = (*lag).max(relation.lag);
        self.followers
            .entry(relation.predecessor_id)
            .or_default()
            .insert(relation.follower_id);
        self.relations.insert(relation.id, relation);
    }

    pub fn contains(&self, id: Id) -> bool {
        self.items.contains_key(&id)
    }

    pub fn contains_relation(&self, id: Id) -> bool {
        self.relations.contains_key(&id)
    }

    pub fn get(&self, id: Id) -> Option<&WorkPackage> {
        self.items.get(&id)
    }

    /// Mutable access for date updates. Parent changes must go through
    /// [`ScheduleGraph::set_parent`].
    pub(crate) fn get_mut(&mut self, id: Id) -> Option<&mut WorkPackage> {
        self.items.get_mut(&id)
    }

    /// Returns false when the work package is not part of the graph
    pub fn set_parent(&mut self, id: Id, parent_id: Option<Id>) -> bool {
        let Some(work_package) = self.items.get_mut(&id) else {
            return false;
        };
        let old_parent = std::mem::replace(&mut work_package.parent_id, parent_id);
        if let Some(old_parent) = old_parent {
            self.detach_child(old_parent, id);
        }
        if let Some(parent_id) = parent_id {
            self.children.entry(parent_id).or_default().insert(id);
        }
        true
    }

    fn detach_child(&mut self, parent_id: Id, child_id: Id) {
        if let Some(children) = self.children.get_mut(&parent_id) {
            children.remove(&child_id);
            if children.is_empty() {
                self.children.remove(&parent_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.items.keys().copied()
    }

    pub fn work_packages(&self) -> impl Iterator<Item = &WorkPackage> {
        self.items.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn parent_of(&self, id: Id) -> Option<Id> {
        self.items.get(&id).and_then(|wp| wp.parent_id)
    }

    /// Loaded children of `id`, lowest id first
    pub fn children_of(&self, id: Id) -> impl Iterator<Item = Id> + '_ {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |child| self.items.contains_key(child))
    }

    pub fn has_children(&self, id: Id) -> bool {
        self.children_of(id).next().is_some()
    }

    /// `id` followed by its ancestors, nearest first.
    ///
    /// Stops at the first work package that is not loaded or already seen.
    pub fn chain_from(&self, id: Option<Id>) -> Vec<Id> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = id;
        while let Some(id) = current {
            if !self.items.contains_key(&id) || !seen.insert(id) {
                break;
            }
            chain.push(id);
            current = self.parent_of(id);
        }
        chain
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors_of(&self, id: Id) -> Vec<Id> {
        let mut ancestors = self.chain_from(self.parent_of(id));
        // a parent loop leads back to the item itself
        if let Some(position) = ancestors.iter().position(|ancestor| *ancestor == id) {
            ancestors.truncate(position);
        }
        ancestors
    }

    /// All loaded descendants of `id`, breadth first
    pub fn descendants_of(&self, id: Id) -> Vec<Id> {
        let mut descendants = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current) {
                if seen.insert(child) {
                    descendants.push(child);
                    queue.push_back(child);
                }
            }
        }
        descendants
    }

    /// Direct predecessors of `id` with their lag
    pub fn predecessors_of(&self, id: Id) -> impl Iterator<Item = (Id, i32)> + '_ {
        self.predecessors
            .get(&id)
            .into_iter()
            .flatten()
            .map(|(predecessor, lag)| (*predecessor, *lag))
    }

    /// Direct followers of `id`
    pub fn followers_of(&self, id: Id) -> impl Iterator<Item = Id> + '_ {
        self.followers.get(&id).into_iter().flatten().copied()
    }

    /// Predecessors constraining `id`: its own and those of its ancestors.
    ///
    /// Only loaded predecessors are returned. A predecessor reached through
    /// several paths keeps the largest lag.
    pub fn effective_predecessors(&self, id: Id) -> BTreeMap<Id, i32> {
        let mut effective = BTreeMap::new();
        for holder in std::iter::once(id).chain(self.ancestors_of(id)) {
            for (predecessor, lag) in self.predecessors_of(holder) {
                if predecessor == id || !self.items.contains_key(&predecessor) {
                    continue;
                }
                let entry = effective.entry(predecessor).or_insert(lag);
                *entry = (*entry).max(lag);
            }
        }
        effective
    }

    pub fn into_work_packages(self) -> impl Iterator<Item = WorkPackage> {
        self.items.into_values()
    }
}
