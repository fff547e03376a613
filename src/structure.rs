//! Structural derivation: children, transitive descendants, statistics
//!
//! Runs right after the merged records are bound to typed entities.
//! `add_children_properties` establishes the invariant every later stage
//! leans on: an entity id is registered in the `children_flat` of every
//! ancestor on its parent chain.

use tracing::warn;

use crate::entity::{ComputedProp, EntityGraph, EntityKind, Stats};
use crate::error::{AtlasError, Result};

/// Derive `children` and `children_flat` from the `parents` relation.
///
/// Walks each entity's parent chain from nearest to farthest ancestor:
/// the id is registered in every ancestor's `children_flat` and in the
/// nearest ancestor's `children` only. A dangling parent reference breaks
/// the forest invariant and aborts the build.
pub fn add_children_properties(graph: &mut EntityGraph) -> Result<()> {
    for id in graph.ids() {
        let parents: Vec<String> = graph
            .get(&id)
            .map(|e| e.parents.iter().rev().cloned().collect())
            .unwrap_or_default();

        for (hops, parent_id) in parents.iter().enumerate() {
            let ancestor = graph
                .get_mut(parent_id)
                .ok_or_else(|| AtlasError::MissingParent {
                    id: id.clone(),
                    parent: parent_id.clone(),
                })?;
            if hops == 0 {
                ancestor.children.push(id.clone());
            }
            ancestor.children_flat.push(id.clone());
        }
    }
    Ok(())
}

/// Count rooms and buildings over each entity's transitive descendants.
///
/// A `joined_building` counts once; a plain `building` only counts when
/// its direct parent is not a `joined_building`, so building parts do not
/// double-count their joined parent. An aggregate entity without any
/// descendants is degraded data, not an error.
pub fn add_stats(graph: &mut EntityGraph) {
    for id in graph.ids() {
        let entity = match graph.get(&id) {
            Some(e) => e,
            None => continue,
        };
        if entity.children_flat.is_empty() {
            if entity.kind.is_aggregate() {
                warn!(id = %id, kind = %entity.kind, "aggregate entity has no children");
            }
            continue;
        }

        let mut stats = Stats::default();
        for child_id in entity.children_flat.clone() {
            let Some(child) = graph.get(&child_id) else {
                continue;
            };
            match child.kind {
                EntityKind::Room => {
                    stats.n_rooms += 1;
                    if !is_circulation(child.usage.as_ref().and_then(|u| u.din_277.as_deref())) {
                        stats.n_rooms_reg += 1;
                    }
                }
                EntityKind::JoinedBuilding => stats.n_buildings += 1,
                EntityKind::Building => {
                    let parent_is_joined = child
                        .direct_parent()
                        .and_then(|pid| graph.get(pid))
                        .map(|p| p.kind == EntityKind::JoinedBuilding)
                        .unwrap_or(false);
                    if !parent_is_joined {
                        stats.n_buildings += 1;
                    }
                }
                _ => {}
            }
        }

        if let Some(entity) = graph.get_mut(&id) {
            entity.props.stats = Some(stats);
        }
    }
}

/// DIN-277 circulation family (corridors, stairs, lifts)
fn is_circulation(din_277: Option<&str>) -> bool {
    din_277.map(|code| code.starts_with("VF")).unwrap_or(false)
}

/// Assemble human-readable display rows from derived properties.
pub fn add_computed_props(graph: &mut EntityGraph) {
    for id in graph.ids() {
        let Some(entity) = graph.get(&id) else {
            continue;
        };

        let mut computed = Vec::new();
        if let Some(address) = &entity.props.address {
            if let Some(street) = &address.street {
                let mut text = street.clone();
                if let (Some(zip), Some(city)) = (&address.zip, &address.city) {
                    text = format!("{street}, {zip} {city}");
                }
                computed.push(ComputedProp {
                    name: "Address".into(),
                    text,
                });
            }
        }
        if let Some(stats) = &entity.props.stats {
            if entity.kind.is_aggregate() && stats.n_buildings > 0 {
                computed.push(ComputedProp {
                    name: "Buildings".into(),
                    text: stats.n_buildings.to_string(),
                });
            }
            if stats.n_rooms > 0 {
                computed.push(ComputedProp {
                    name: "Rooms".into(),
                    text: stats.n_rooms.to_string(),
                });
            }
        }
        if let Some(usage) = &entity.usage {
            if !usage.name.is_empty() {
                computed.push(ComputedProp {
                    name: "Usage".into(),
                    text: usage.name.clone(),
                });
            }
        }

        if !computed.is_empty() {
            if let Some(entity) = graph.get_mut(&id) {
                entity.props.computed = computed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, Usage};
    use crate::value::Value;

    fn entity(id: &str, kind: &str, parents: &[&str]) -> Entity {
        let json = serde_json::json!({
            "id": id,
            "type": kind,
            "name": id,
            "parents": parents,
        });
        let record = match Value::from_json(&json) {
            Value::Map(m) => m,
            _ => unreachable!(),
        };
        Entity::from_record(id, &record).unwrap()
    }

    fn graph_from(entities: Vec<Entity>) -> EntityGraph {
        let mut graph = EntityGraph::new();
        for e in entities {
            graph.insert(e);
        }
        graph
    }

    #[test]
    fn test_children_flat_covers_whole_chain() {
        let mut graph = graph_from(vec![
            entity("root", "root", &[]),
            entity("site", "site", &["root"]),
            entity("0101", "building", &["root", "site"]),
            entity("0101.EG.001", "room", &["root", "site", "0101"]),
        ]);
        add_children_properties(&mut graph).unwrap();

        assert_eq!(graph.get("site").unwrap().children, ["0101"]);
        assert_eq!(
            graph.get("root").unwrap().children_flat,
            ["site", "0101", "0101.EG.001"]
        );
        assert_eq!(
            graph.get("site").unwrap().children_flat,
            ["0101", "0101.EG.001"]
        );
        assert_eq!(graph.get("0101").unwrap().children, ["0101.EG.001"]);
    }

    #[test]
    fn test_missing_parent_is_fatal() {
        let mut graph = graph_from(vec![
            entity("root", "root", &[]),
            entity("0101", "building", &["root", "ghost"]),
        ]);
        let err = add_children_properties(&mut graph).unwrap_err();
        assert!(matches!(err, AtlasError::MissingParent { .. }));
    }

    #[test]
    fn test_stats_exclude_circulation_and_building_parts() {
        let mut graph = graph_from(vec![
            entity("root", "root", &[]),
            entity("site", "site", &["root"]),
            entity("chem", "joined_building", &["root", "site"]),
            entity("5401", "building", &["root", "site", "chem"]),
            entity("5402", "building", &["root", "site", "chem"]),
            entity("0101", "building", &["root", "site"]),
            entity("r1", "room", &["root", "site", "0101"]),
            entity("r2", "room", &["root", "site", "0101"]),
        ]);
        graph.get_mut("r2").unwrap().usage = Some(Usage {
            name: "Corridor".into(),
            din_277: Some("VF9.1".into()),
            din_277_desc: None,
        });

        add_children_properties(&mut graph).unwrap();
        add_stats(&mut graph);

        let site_stats = graph.get("site").unwrap().props.stats.clone().unwrap();
        // Building parts under the joined building do not double-count
        assert_eq!(site_stats.n_buildings, 2);
        assert_eq!(site_stats.n_rooms, 2);
        assert_eq!(site_stats.n_rooms_reg, 1);
    }

    #[test]
    fn test_childless_aggregate_is_only_warned() {
        let mut graph = graph_from(vec![
            entity("root", "root", &[]),
            entity("empty-site", "site", &["root"]),
        ]);
        add_children_properties(&mut graph).unwrap();
        add_stats(&mut graph);
        assert!(graph.get("empty-site").unwrap().props.stats.is_none());
    }

    #[test]
    fn test_computed_props_from_stats() {
        let mut graph = graph_from(vec![
            entity("root", "root", &[]),
            entity("site", "site", &["root"]),
            entity("0101", "building", &["root", "site"]),
            entity("r1", "room", &["root", "site", "0101"]),
        ]);
        add_children_properties(&mut graph).unwrap();
        add_stats(&mut graph);
        add_computed_props(&mut graph);

        let computed = &graph.get("site").unwrap().props.computed;
        assert!(computed.iter().any(|p| p.name == "Buildings" && p.text == "1"));
        assert!(computed.iter().any(|p| p.name == "Rooms" && p.text == "1"));
    }
}
