//! Ancestor set loader
//!
//! Mirrors: app/services/work_packages/update_ancestors/loader.rb
//!
//! When a work package changes its parent, the date ranges of its new
//! ancestors and, optionally, of its former ancestors have to be
//! recomputed. The loader returns them nearest first and without
//! duplicates.

use op_core::Id;

use crate::graph::ScheduleGraph;

/// Ordered, duplicate-free set of ancestor ids, nearest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ancestors(Vec<Id>);

impl Ancestors {
    pub fn iter(&self) -> std::slice::Iter<'_, Id> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.0.contains(&id)
    }

    pub fn as_slice(&self) -> &[Id] {
        &self.0
    }
}

impl IntoIterator for Ancestors {
    type Item = Id;
    type IntoIter = std::vec::IntoIter<Id>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Ancestors {
    type Item = &'a Id;
    type IntoIter = std::slice::Iter<'a, Id>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

pub struct AncestorLoader<'g> {
    graph: &'g ScheduleGraph,
}

impl<'g> AncestorLoader<'g> {
    pub fn new(graph: &'g ScheduleGraph) -> Self {
        Self { graph }
    }

    /// Ancestors affected by `work_package_id` moving away from
    /// `former_parent_id` to its current parent in the graph.
    pub fn select(
        &self,
        work_package_id: Id,
        former_parent_id: Option<Id>,
        include_former_ancestors: bool,
    ) -> Ancestors {
        let ancestors = self.between(
            self.graph.parent_of(work_package_id),
            former_parent_id,
            include_former_ancestors,
        );
        Ancestors(ancestors.0.into_iter().filter(|id| *id != work_package_id).collect())
    }

    /// Current chain from `parent_id` followed by the former chain from
    /// `former_parent_id`.
    ///
    /// Where both chains meet again, the former ancestors below the meeting
    /// point come before it so every ancestor is listed after its children.
    pub fn between(
        &self,
        parent_id: Option<Id>,
        former_parent_id: Option<Id>,
        include_former_ancestors: bool,
    ) -> Ancestors {
        let current = self.graph.chain_from(parent_id);
        if !include_former_ancestors {
            return Ancestors(current);
        }
        let former = self.graph.chain_from(former_parent_id);

        let meeting = current
            .iter()
            .enumerate()
            .find_map(|(ix, id)| former.iter().position(|f| f == id).map(|jx| (ix, jx)));

        let ordered: Vec<Id> = match meeting {
            None => current.into_iter().chain(former).collect(),
            Some((ix, jx)) => current[..ix]
                .iter()
                .chain(&former[..jx])
                .chain(&current[ix..])
                .copied()
                .collect(),
        };

        let mut seen = std::collections::BTreeSet::new();
        Ancestors(ordered.into_iter().filter(|id| seen.insert(*id)).collect())
    }
}
