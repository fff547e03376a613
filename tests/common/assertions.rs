//! Graph invariant assertions shared by the integration tests

use campus_atlas::{EntityGraph, EntityKind};

/// Every parent chain terminates at the root with no cycle, and the
/// entity is listed in `children_flat` of every ancestor on its chain.
pub fn assert_forest_invariant(graph: &EntityGraph) {
    for entity in graph.iter() {
        if entity.kind == EntityKind::Root {
            assert!(
                entity.parents.is_empty(),
                "root must not have parents, got {:?}",
                entity.parents
            );
            continue;
        }
        assert_eq!(
            entity.parents.first().map(String::as_str),
            Some("root"),
            "{} chain does not start at root: {:?}",
            entity.id,
            entity.parents
        );
        let mut seen = std::collections::HashSet::new();
        for ancestor_id in &entity.parents {
            assert!(
                seen.insert(ancestor_id.clone()),
                "{} has a cyclic/duplicated chain: {:?}",
                entity.id,
                entity.parents
            );
            let ancestor = graph
                .get(ancestor_id)
                .unwrap_or_else(|| panic!("{} references unknown ancestor {ancestor_id}", entity.id));
            assert!(
                ancestor.children_flat.contains(&entity.id),
                "{} missing from children_flat of {ancestor_id}",
                entity.id
            );
        }
    }
}

/// Every non-root entity has a non-null, non-zero coordinate.
pub fn assert_coordinate_completeness(graph: &EntityGraph) {
    for entity in graph.iter() {
        if entity.kind == EntityKind::Root {
            continue;
        }
        let coords = entity
            .coords
            .as_ref()
            .unwrap_or_else(|| panic!("{} has no coordinates", entity.id));
        assert!(coords.lat != 0.0, "{} has zero latitude", entity.id);
        assert!(coords.lon != 0.0, "{} has zero longitude", entity.id);
        let utm = coords
            .utm
            .as_ref()
            .unwrap_or_else(|| panic!("{} has no UTM representation", entity.id));
        assert!(utm.easting != 0.0 && utm.northing != 0.0);
    }
}

/// Every entity carries a combined rank.
pub fn assert_ranking_complete(graph: &EntityGraph) {
    for entity in graph.iter() {
        assert!(
            entity.ranking_factors.is_some(),
            "{} has no ranking factors",
            entity.id
        );
    }
}
