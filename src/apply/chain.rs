use crate::apply::node::{ORIGINAL, OUT};
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::{ItemId, NodeId};
use crate::plug::handle::Plug;
use crate::scene::graph::Scene;
use std::collections::BTreeMap;

/// One apply-override node in a chain, with the override that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyRecord {
    /// Apply-override node.
    pub node: NodeId,
    /// Override item.
    pub item: ItemId,
}

/// Apply-override chains of the visible layer, keyed by target plug.
///
/// Each chain runs tail to head: the tail reads the pre-render-setup value or connection, the
/// head drives the target. Chains are ordered by the document order of their overrides, so
/// a later override sits closer to the target.
#[derive(Clone, Debug, Default)]
pub struct ApplyIndex {
    chains: BTreeMap<Plug, Vec<ApplyRecord>>,
}

/// Plug that node `pos` of `chain` (or the target, past the head) reads its input from.
fn downstream(chain: &[ApplyRecord], pos: usize, target: &Plug) -> Plug {
    match chain.get(pos) {
        Some(r) => Plug::new(r.node, ORIGINAL),
        None => target.clone(),
    }
}

impl ApplyIndex {
    /// Targets with at least one apply-override node.
    pub fn targets(&self) -> impl Iterator<Item = &Plug> {
        self.chains.keys()
    }

    /// Chain on `target`, tail first.
    pub fn chain(&self, target: &Plug) -> &[ApplyRecord] {
        self.chains.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Return `true` when no chain exists.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Total number of apply-override nodes.
    pub fn len(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    /// `original` plug of the tail of the chain on `target`, where the pre-render-setup value
    /// lives while the chain exists.
    pub fn tail_original(&self, target: &Plug) -> Option<Plug> {
        self.chains
            .get(target)
            .and_then(|c| c.first())
            .map(|r| Plug::new(r.node, ORIGINAL))
    }

    /// Target and apply node of every record created by `item`.
    pub(crate) fn records_of(&self, item: ItemId) -> Vec<(Plug, NodeId)> {
        self.chains
            .iter()
            .flat_map(|(t, c)| {
                c.iter()
                    .filter(move |r| r.item == item)
                    .map(move |r| (t.clone(), r.node))
            })
            .collect()
    }

    /// Splice `node` into the chain on `target` at the position given by document order.
    ///
    /// Whatever fed the downstream plug (a connection or a stored value) moves to
    /// `node.original`, and `node.out` drives the downstream plug.
    pub(crate) fn insert(
        &mut self,
        scene: &mut Scene,
        target: &Plug,
        record: ApplyRecord,
        order: &BTreeMap<ItemId, usize>,
    ) -> RenderSetupResult<()> {
        let rank = |item: ItemId| order.get(&item).copied().unwrap_or(usize::MAX);
        let chain = self.chains.entry(target.clone()).or_default();
        let pos = chain
            .iter()
            .position(|r| rank(r.item) > rank(record.item))
            .unwrap_or(chain.len());

        let down = downstream(chain, pos, target);
        let original = Plug::new(record.node, ORIGINAL);
        match scene.input(&down).cloned() {
            Some(src) => {
                scene.disconnect(&src, &down)?;
                scene.connect(&src, &original)?;
            }
            None => {
                let v = scene.stored_value(&down)?.clone();
                scene.write_stored(&original, v)?;
            }
        }
        scene.connect(&Plug::new(record.node, OUT), &down)?;
        chain.insert(pos, record);
        tracing::debug!(
            plug = %target.name(scene),
            node = %scene.leaf_name(record.node),
            pos,
            len = chain.len(),
            "spliced apply-override node"
        );
        Ok(())
    }

    /// Unsplice `node` from the chain on `target` and delete it, reconnecting its upstream
    /// to its downstream (or copying its stored `original` back).
    pub(crate) fn remove(
        &mut self,
        scene: &mut Scene,
        target: &Plug,
        node: NodeId,
    ) -> RenderSetupResult<()> {
        let chain = self.chains.get_mut(target).ok_or_else(|| {
            RenderSetupError::structural(format!("no apply chain on '{}'", target.name(scene)))
        })?;
        let pos = chain.iter().position(|r| r.node == node).ok_or_else(|| {
            RenderSetupError::structural(format!(
                "{node} is not in the apply chain on '{}'",
                target.name(scene)
            ))
        })?;

        let down = downstream(chain, pos + 1, target);
        let out = Plug::new(node, OUT);
        let original = Plug::new(node, ORIGINAL);
        if scene.input(&down) == Some(&out) {
            scene.disconnect(&out, &down)?;
        }
        match scene.input(&original).cloned() {
            Some(src) => {
                scene.disconnect(&src, &original)?;
                scene.connect(&src, &down)?;
            }
            None => {
                let v = scene.stored_value(&original)?.clone();
                scene.write_stored(&down, v)?;
            }
        }
        chain.remove(pos);
        if chain.is_empty() {
            self.chains.remove(target);
        }
        scene.delete_node(node)?;
        Ok(())
    }

    /// Remove every record, heads first, restoring every target.
    pub(crate) fn clear(&mut self, scene: &mut Scene) -> RenderSetupResult<()> {
        let targets: Vec<Plug> = self.chains.keys().cloned().collect();
        for t in targets {
            while let Some(head) = self.chains.get(&t).and_then(|c| c.last()).copied() {
                self.remove(scene, &t, head.node)?;
            }
        }
        Ok(())
    }

    /// Drop records whose target or node vanished from the scene, deleting the apply nodes left
    /// behind by a deleted target.
    pub(crate) fn prune(&mut self, scene: &mut Scene) -> RenderSetupResult<()> {
        let orphaned: Vec<NodeId> = self
            .chains
            .iter()
            .filter(|(t, _)| scene.node(t.node).is_none())
            .flat_map(|(_, c)| c.iter().map(|r| r.node))
            .collect();
        for n in orphaned {
            if scene.node(n).is_some() {
                scene.delete_node(n)?;
            }
        }
        self.chains.retain(|t, c| {
            c.retain(|r| scene.node(r.node).is_some());
            scene.node(t.node).is_some() && !c.is_empty()
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/apply/chain.rs"]
mod tests;
