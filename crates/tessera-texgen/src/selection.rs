//! Which remote mesh the current selection is bound to

use std::collections::BTreeSet;
use tessera_core::{MeshBinding, ObjectId, SceneHost};

/// The selection is bound to a remote mesh when its first object carries a
/// mesh id, every selected object carries the same id, and no unselected
/// object in the scene carries it.
pub fn resolve_bound_mesh(
    selection: &[ObjectId],
    all_objects: &[ObjectId],
    binding_of: impl Fn(ObjectId) -> Option<MeshBinding>,
) -> Option<MeshBinding> {
    let first = binding_of(*selection.first()?)?;
    if first.id.is_empty() {
        return None;
    }

    let selected_match = selection
        .iter()
        .all(|id| binding_of(*id).is_some_and(|b| b.id == first.id));
    if !selected_match {
        return None;
    }

    let distinct: BTreeSet<ObjectId> = selection.iter().copied().collect();
    let scene_count = all_objects
        .iter()
        .filter(|id| binding_of(**id).is_some_and(|b| b.id == first.id))
        .count();
    if scene_count != distinct.len() {
        return None;
    }

    Some(first)
}

/// The host's selection as an ordered set: repeated handles are dropped,
/// first occurrence wins
pub fn selected(host: &dyn SceneHost) -> Vec<ObjectId> {
    let mut seen = BTreeSet::new();
    host.selection()
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Recompute the bound mesh from the host's current selection
pub fn bound_mesh(host: &dyn SceneHost) -> Option<MeshBinding> {
    let selection = selected(host);
    let objects = host.objects();
    resolve_bound_mesh(&selection, &objects, |id| host.mesh_binding(id))
}
