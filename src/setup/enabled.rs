use crate::foundation::error::RenderSetupResult;
use crate::foundation::ids::ItemId;
use crate::setup::tree::{ItemKind, RenderSetup};

/// Recompute isolate counters and effective enabled flags below `layer`.
///
/// A collection is enabled when it is self-enabled, its parent is enabled, and either no
/// collection of the layer is isolated or it lies on an isolated path (isolated itself, an
/// isolated descendant, or an isolated ancestor). An override is enabled when it is
/// self-enabled and its collection is enabled. A disabled ancestor always wins over isolate.
///
/// Returns the items whose effective state flipped, in document order.
pub(crate) fn refresh(rs: &mut RenderSetup, layer: ItemId) -> RenderSetupResult<Vec<ItemId>> {
    let collections = rs.collections_recursive(layer);
    let isolated: Vec<ItemId> = collections
        .iter()
        .copied()
        .filter(|c| rs.collection_at(*c).is_ok_and(|c| c.isolate_selected))
        .collect();

    for c in &collections {
        let below = rs
            .collections_recursive(*c)
            .into_iter()
            .filter(|d| isolated.contains(d))
            .count() as u32;
        rs.collection_mut(*c)?.num_isolated_children = below;
    }
    rs.layer_mut(layer)?.num_isolated_children = isolated.len() as u32;
    let isolation = !isolated.is_empty();

    let mut changed = Vec::new();
    let layer_enabled = rs.get(layer)?.self_enabled;
    set(rs, layer, layer_enabled, &mut changed)?;

    // (item, parent enabled, an ancestor collection is isolated)
    let mut stack: Vec<(ItemId, bool, bool)> = rs
        .children(layer)
        .iter()
        .rev()
        .map(|c| (*c, layer_enabled, false))
        .collect();
    while let Some((id, parent_enabled, under_isolated)) = stack.pop() {
        let item = rs.get(id)?;
        let self_enabled = item.self_enabled;
        let (enabled, isolated_here) = match &item.kind {
            ItemKind::Collection(c) => {
                let on_path =
                    c.isolate_selected || c.num_isolated_children > 0 || under_isolated;
                (
                    self_enabled && parent_enabled && (!isolation || on_path),
                    c.isolate_selected,
                )
            }
            _ => (self_enabled && parent_enabled, false),
        };
        set(rs, id, enabled, &mut changed)?;
        stack.extend(
            rs.children(id)
                .iter()
                .rev()
                .map(|c| (*c, enabled, under_isolated || isolated_here)),
        );
    }
    Ok(changed)
}

fn set(
    rs: &mut RenderSetup,
    id: ItemId,
    enabled: bool,
    changed: &mut Vec<ItemId>,
) -> RenderSetupResult<()> {
    let item = rs.get_mut(id)?;
    if item.enabled != enabled {
        item.enabled = enabled;
        changed.push(id);
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/setup/enabled.rs"]
mod tests;
