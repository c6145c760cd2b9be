use crate::foundation::ids::NodeId;
use crate::scene::graph::Scene;
use crate::selector::filter::{CustomFilter, StaticEntry, StaticSelection, TypeFilter};
use crate::selector::pattern::{Candidate, Pattern};
use std::collections::BTreeSet;

/// Selector flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorKind {
    /// Current selector: pattern, static selection and type filter.
    Simple,
    /// Legacy selector; `include_hierarchy` expands matches to DAG descendants before
    /// filtering.
    Basic {
        /// Expand matches to their DAG descendants.
        include_hierarchy: bool,
    },
}

/// Produces the set of scene nodes a collection targets.
///
/// Results are cached until the selector is marked dirty. While deactivated, scene-driven
/// dirtying is ignored; edits to the selector's own inputs always dirty it.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    kind: SelectorKind,
    pattern: String,
    static_selection: StaticSelection,
    type_filter: TypeFilter,
    custom_filter: String,
    members: Vec<NodeId>,
    dirty: bool,
    active: bool,
    pattern_error: Option<String>,
}

impl Default for Selector {
    fn default() -> Self {
        Self::simple()
    }
}

impl Selector {
    /// Empty simple selector.
    pub fn simple() -> Self {
        Self::with_kind(SelectorKind::Simple)
    }

    /// Empty legacy basic selector.
    pub fn basic(include_hierarchy: bool) -> Self {
        Self::with_kind(SelectorKind::Basic { include_hierarchy })
    }

    fn with_kind(kind: SelectorKind) -> Self {
        Self {
            kind,
            pattern: String::new(),
            static_selection: StaticSelection::default(),
            type_filter: TypeFilter::All,
            custom_filter: String::new(),
            members: Vec::new(),
            dirty: true,
            active: true,
            pattern_error: None,
        }
    }

    /// Builder-style pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.set_pattern(pattern);
        self
    }

    /// Builder-style type filter.
    pub fn with_type_filter(mut self, filter: TypeFilter) -> Self {
        self.set_type_filter(filter);
        self
    }

    /// Builder-style custom filter value.
    pub fn with_custom_filter(mut self, value: impl Into<String>) -> Self {
        self.set_custom_filter(value);
        self
    }

    /// Builder-style static selection.
    pub fn with_static_selection(mut self, selection: StaticSelection) -> Self {
        self.set_static_selection(selection);
        self
    }

    /// Flavor.
    pub fn kind(&self) -> SelectorKind {
        self.kind
    }

    /// Return `true` for legacy basic selectors.
    pub fn is_legacy(&self) -> bool {
        matches!(self.kind, SelectorKind::Basic { .. })
    }

    /// Pattern expression.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Replace the pattern expression.
    pub fn set_pattern(&mut self, pattern: impl Into<String>) {
        self.pattern = pattern.into();
        self.dirty = true;
    }

    /// Static selection.
    pub fn static_selection(&self) -> &StaticSelection {
        &self.static_selection
    }

    /// Replace the static selection.
    pub fn set_static_selection(&mut self, selection: StaticSelection) {
        self.static_selection = selection;
        self.dirty = true;
    }

    /// Type filter.
    pub fn type_filter(&self) -> TypeFilter {
        self.type_filter
    }

    /// Replace the type filter.
    pub fn set_type_filter(&mut self, filter: TypeFilter) {
        self.type_filter = filter;
        self.dirty = true;
    }

    /// Raw `kCustom` filter value.
    pub fn custom_filter(&self) -> &str {
        &self.custom_filter
    }

    /// Replace the `kCustom` filter value.
    pub fn set_custom_filter(&mut self, value: impl Into<String>) {
        self.custom_filter = value.into();
        self.dirty = true;
    }

    /// Cached members, sorted by full path. May be stale while [`Self::is_dirty`].
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Return `true` when the cache must be recomputed before use.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return `true` unless the selector was deactivated for an apply.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Error from the last evaluation of an unparsable pattern.
    pub fn pattern_error(&self) -> Option<&str> {
        self.pattern_error.as_deref()
    }

    /// Invalidate the cache because the scene changed. Ignored while deactivated.
    pub fn mark_dirty(&mut self) {
        if self.active {
            self.dirty = true;
        }
    }

    /// Stop scene changes from invalidating the cache.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Let scene changes invalidate the cache again.
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Rewrite static selection paths after a rename or reparent.
    pub(crate) fn rename_static_paths(&mut self, old: &str, new: &str) {
        if self.static_selection.rename_prefix(old, new) {
            self.dirty = true;
        }
    }

    /// Static selection entries with their `missing` and `filtered_out` bits.
    pub fn static_entries(&self, scene: &Scene) -> Vec<StaticEntry> {
        self.static_selection.entries(
            scene,
            self.type_filter,
            &CustomFilter::parse(&self.custom_filter),
        )
    }

    /// Recompute the cache when dirty. `parent` is the enclosing collection's member universe
    /// (`None` for top-level collections, which see every user node).
    ///
    /// Returns `true` when the member list changed.
    pub(crate) fn refresh(&mut self, scene: &Scene, parent: Option<&[NodeId]>) -> bool {
        if !self.dirty {
            return false;
        }
        let next = self.compute(scene, parent);
        self.dirty = false;
        if next == self.members {
            return false;
        }
        self.members = next;
        true
    }

    /// Force recomputation regardless of the dirty bit.
    pub(crate) fn force_refresh(&mut self, scene: &Scene, parent: Option<&[NodeId]>) -> bool {
        self.dirty = true;
        self.refresh(scene, parent)
    }

    fn compute(&mut self, scene: &Scene, parent: Option<&[NodeId]>) -> Vec<NodeId> {
        let universe: BTreeSet<NodeId> = match parent {
            None => scene.user_node_ids().collect(),
            Some(p) => sub_universe(scene, p, self.type_filter),
        };

        let mut picked = BTreeSet::new();
        self.pattern_error = None;
        match Pattern::parse(&self.pattern) {
            Ok(p) if !p.is_empty() => {
                let candidates: Vec<Candidate> = universe
                    .iter()
                    .map(|id| Candidate {
                        id: *id,
                        leaf: scene.leaf_name(*id).to_owned(),
                        path: scene.full_path(*id),
                    })
                    .collect();
                picked = p.select(&candidates);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(pattern = %self.pattern, "invalid selector pattern: {e}");
                self.pattern_error = Some(e.to_string());
            }
        }

        let custom = CustomFilter::parse(&self.custom_filter);
        for entry in self
            .static_selection
            .entries(scene, TypeFilter::All, &custom)
        {
            if let Some(id) = entry.node
                && universe.contains(&id)
            {
                picked.insert(id);
            }
        }

        if let SelectorKind::Basic {
            include_hierarchy: true,
        } = self.kind
        {
            let roots: Vec<NodeId> = picked.iter().copied().collect();
            for r in roots {
                picked.extend(
                    scene
                        .dag_descendants(r)
                        .into_iter()
                        .filter(|d| scene.node(*d).is_some_and(|n| !n.is_internal())),
                );
            }
        }

        let mut out: Vec<(String, NodeId)> = picked
            .into_iter()
            .filter(|id| self.type_filter.accepts(scene, *id, &custom))
            .map(|id| (scene.full_path(id), id))
            .collect();
        out.sort();
        out.into_iter().map(|(_, id)| id).collect()
    }

    /// Unique names of the cached members.
    pub fn names(&self, scene: &Scene) -> BTreeSet<String> {
        self.members
            .iter()
            .filter(|id| scene.node(**id).is_some())
            .map(|id| scene.unique_name(*id))
            .collect()
    }
}

/// Universe of a nested collection: the parent's members and their DAG descendants. The
/// shading network (shading engines and surface shaders) assigned to any of those shapes is
/// added only for filters that can select shading nodes.
pub(crate) fn sub_universe(
    scene: &Scene,
    parent: &[NodeId],
    filter: TypeFilter,
) -> BTreeSet<NodeId> {
    let mut out = BTreeSet::new();
    for id in parent {
        if scene.node(*id).is_none() {
            continue;
        }
        out.insert(*id);
        out.extend(scene.dag_descendants(*id));
    }
    if filter.selects_shading() {
        let shapes: Vec<NodeId> = out.iter().copied().collect();
        for s in shapes {
            if let Some(sg) = scene.assigned_shading_engine(s) {
                out.insert(sg);
                if let Some(shader) = scene.surface_shader(sg) {
                    out.insert(shader);
                }
            }
        }
    }
    out.retain(|id| scene.node(*id).is_some_and(|n| !n.is_internal()));
    out
}

#[cfg(test)]
#[path = "../../tests/unit/selector/eval.rs"]
mod tests;
