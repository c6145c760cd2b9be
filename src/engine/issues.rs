use super::Engine;
use super::command::Command;
use crate::foundation::error::RenderSetupResult;
use crate::foundation::ids::ItemId;
use crate::selector::eval::{Selector, SelectorKind};
use crate::selector::filter::TypeFilter;
use crate::selector::pattern::ALL_NAMESPACES;
use crate::setup::collection::{Collection, CollectionKind};
use crate::setup::observe::{Issue, IssueKind, TreeEvent};
use crate::setup::tree::{Item, ItemKind, RenderSetup};

impl Engine {
    /// Re-detect issues and notify listeners when the list changed. Legacy selectors are
    /// converted right away when `auto_convert_legacy_selectors` is set.
    pub(crate) fn refresh_issues(&mut self) -> RenderSetupResult<()> {
        let legacy: Vec<ItemId> = self
            .all_collections()
            .into_iter()
            .filter(|c| {
                self.setup
                    .collection_at(*c)
                    .is_ok_and(|c| c.selector().is_legacy())
            })
            .collect();
        let issue = (!legacy.is_empty()).then(|| Issue {
            kind: IssueKind::LegacySelectors,
            description: format!(
                "{} collection(s) use legacy basic selectors and should be converted",
                legacy.len()
            ),
            items: legacy.clone(),
        });
        if self.issues.set(IssueKind::LegacySelectors, issue) {
            self.notify(TreeEvent::IssuesChanged);
        }
        if !legacy.is_empty() && self.config.auto_convert_legacy_selectors {
            tracing::info!(collections = legacy.len(), "auto-converting legacy selectors");
            self.resolve_issue(IssueKind::LegacySelectors)?;
        }
        Ok(())
    }

    /// Run the resolver of the current issue of `kind`, as one undoable step. Returns `false`
    /// when there is no such issue.
    pub fn resolve_issue(&mut self, kind: IssueKind) -> RenderSetupResult<bool> {
        let Some(issue) = self.issues.get(kind).cloned() else {
            return Ok(false);
        };
        match kind {
            IssueKind::LegacySelectors => {
                let mut next = self.setup.clone();
                for c in &issue.items {
                    convert_legacy_selector(&mut next, *c)?;
                }
                self.execute(Command::ReplaceSetup {
                    setup: Box::new(next),
                })?;
            }
        }
        Ok(true)
    }
}

/// Turn the basic selector of `collection` into a simple one. `include_hierarchy` is emulated
/// by a `<name>_hierarchy` sub-collection that matches everything below the parent with the old
/// type filter and takes over the collection's children.
pub(crate) fn convert_legacy_selector(
    rs: &mut RenderSetup,
    collection: ItemId,
) -> RenderSetupResult<Option<ItemId>> {
    let old = rs.collection_at(collection)?.selector().clone();
    let include_hierarchy = match old.kind() {
        SelectorKind::Simple => return Ok(None),
        SelectorKind::Basic { include_hierarchy } => include_hierarchy,
    };
    let simple = Selector::simple()
        .with_pattern(old.pattern())
        .with_type_filter(if include_hierarchy {
            TypeFilter::All
        } else {
            old.type_filter()
        })
        .with_custom_filter(old.custom_filter())
        .with_static_selection(old.static_selection().clone());
    rs.collection_mut(collection)?.selector = simple;
    if !include_hierarchy {
        return Ok(None);
    }

    let base = format!("{}_hierarchy", rs.get(collection)?.name());
    let name = rs.unique_name(&base);
    let selector = Selector::simple()
        .with_pattern(ALL_NAMESPACES)
        .with_type_filter(old.type_filter())
        .with_custom_filter(old.custom_filter());
    let sub = Item::new(
        name,
        ItemKind::Collection(Collection::new(CollectionKind::Standard, selector)),
    );
    let sub = rs.insert(sub, Some(collection), None)?;
    rs.adopt_children(collection, sub)?;
    Ok(Some(sub))
}

#[cfg(test)]
#[path = "../../tests/unit/engine/issues.rs"]
mod tests;
