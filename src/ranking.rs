//! Deterministic relevance ranking
//!
//! Every entity gets `ranking_factors` for the downstream full-text
//! index. The rank is a pure function of entity type, room usage, derived
//! statistics and an optional manual override:
//!
//! ```text
//! rank_combined = floor(rank_type * rank_usage / 100) + rank_boost + rank_custom
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::entity::{EntityGraph, EntityKind, RankingFactors};

/// Rank for an entity that somehow ended up without ranking inputs
pub const RANK_FALLBACK: i64 = 1;

/// Usage rank when the DIN-277 code is not listed (or absent)
const DEFAULT_USAGE_RANK: i64 = 10;

/// Boost cap shared by all entity types
const MAX_BOOST: i64 = 99;

/// Usage ranks by DIN-277 code. Teaching spaces dominate the directory's
/// search traffic; circulation and plant rooms sink to the bottom.
static USAGE_RANKS: Lazy<HashMap<&'static str, i64>> = Lazy::new(|| {
    HashMap::from([
        ("NF5.1", 100), // lecture halls
        ("NF5.2", 95),  // seminar rooms
        ("NF5.4", 80),  // libraries
        ("NF5.5", 70),  // sports facilities
        ("NF3.4", 50),  // laboratories
        ("NF2.1", 20),  // offices
        ("NF2.2", 20),  // open-plan offices
        ("NF4.1", 5),   // storage rooms
        ("TF8.1", 2),   // technical plant rooms
        ("VF9.1", 2),   // corridors
        ("VF9.2", 2),   // stairwells
    ])
});

fn rank_type_for(kind: EntityKind) -> i64 {
    match kind {
        EntityKind::Root => 0,
        EntityKind::Site | EntityKind::Campus | EntityKind::Area | EntityKind::JoinedBuilding => {
            1100
        }
        EntityKind::Building => 1000,
        EntityKind::Room | EntityKind::Poi => 100,
        EntityKind::VirtualRoom => 200,
    }
}

/// Compute ranking factors for every entity in the graph.
pub fn compute_ranking(graph: &mut EntityGraph) {
    for id in graph.ids() {
        let Some(entity) = graph.get(&id) else {
            continue;
        };

        let rank_type = rank_type_for(entity.kind);

        let rank_usage = if matches!(entity.kind, EntityKind::Room | EntityKind::VirtualRoom) {
            entity
                .usage
                .as_ref()
                .and_then(|u| u.din_277.as_deref())
                .and_then(|code| USAGE_RANKS.get(code).copied())
                .unwrap_or(DEFAULT_USAGE_RANK)
        } else {
            100
        };

        let stats = entity.props.stats.as_ref();
        let rank_boost = match entity.kind {
            EntityKind::Room | EntityKind::VirtualRoom => {
                entity.props.seats.map(|seats| seats as i64 / 10)
            }
            EntityKind::Building | EntityKind::JoinedBuilding => {
                stats.map(|s| s.n_rooms_reg as i64 / 20)
            }
            kind if kind.is_aggregate() => stats.map(|s| s.n_buildings as i64),
            _ => None,
        }
        .map(|boost| boost.min(MAX_BOOST));

        let rank_custom = entity.ranking_factors.as_ref().and_then(|f| f.rank_custom);

        let rank_combined = rank_type * rank_usage / 100
            + rank_boost.unwrap_or(0)
            + rank_custom.unwrap_or(0);

        if let Some(entity) = graph.get_mut(&id) {
            entity.ranking_factors = Some(RankingFactors {
                rank_type,
                rank_usage,
                rank_boost,
                rank_custom,
                rank_combined,
            });
        }
    }

    // Safety net for records that slipped through without rankable data.
    for id in graph.ids() {
        if let Some(entity) = graph.get_mut(&id) {
            if entity.ranking_factors.is_none() {
                entity.ranking_factors = Some(RankingFactors {
                    rank_combined: RANK_FALLBACK,
                    ..Default::default()
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, Stats, Usage};
    use crate::value::Value;

    fn entity(id: &str, kind: &str) -> Entity {
        let json = serde_json::json!({
            "id": id, "type": kind, "name": id, "parents": ["root"],
        });
        let record = match Value::from_json(&json) {
            Value::Map(m) => m,
            _ => unreachable!(),
        };
        Entity::from_record(id, &record).unwrap()
    }

    fn ranked(graph: &EntityGraph, id: &str) -> RankingFactors {
        graph.get(id).unwrap().ranking_factors.clone().unwrap()
    }

    #[test]
    fn test_type_ranks() {
        let mut graph = EntityGraph::new();
        for (id, kind) in [
            ("root", "root"),
            ("site", "site"),
            ("0101", "building"),
            ("r1", "room"),
            ("v1", "virtual_room"),
        ] {
            graph.insert(entity(id, kind));
        }
        compute_ranking(&mut graph);

        assert_eq!(ranked(&graph, "root").rank_type, 0);
        assert_eq!(ranked(&graph, "site").rank_type, 1100);
        assert_eq!(ranked(&graph, "0101").rank_type, 1000);
        assert_eq!(ranked(&graph, "r1").rank_type, 100);
        assert_eq!(ranked(&graph, "v1").rank_type, 200);
    }

    #[test]
    fn test_usage_rank_with_default() {
        let mut graph = EntityGraph::new();
        let mut lecture = entity("r1", "room");
        lecture.usage = Some(Usage {
            name: "Lecture hall".into(),
            din_277: Some("NF5.1".into()),
            din_277_desc: None,
        });
        graph.insert(lecture);

        let mut odd = entity("r2", "room");
        odd.usage = Some(Usage {
            name: "Pigeon loft".into(),
            din_277: Some("NF9.9".into()),
            din_277_desc: None,
        });
        graph.insert(odd);
        graph.insert(entity("r3", "room"));

        compute_ranking(&mut graph);
        assert_eq!(ranked(&graph, "r1").rank_usage, 100);
        assert_eq!(ranked(&graph, "r1").rank_combined, 100);
        assert_eq!(ranked(&graph, "r2").rank_usage, 10);
        assert_eq!(ranked(&graph, "r3").rank_usage, 10);
        // floor(100 * 10 / 100) = 10
        assert_eq!(ranked(&graph, "r3").rank_combined, 10);
    }

    #[test]
    fn test_seat_boost_is_monotonic_and_capped() {
        let mut previous = 0;
        for seats in [0u32, 5, 10, 95, 200, 5000] {
            let mut graph = EntityGraph::new();
            let mut room = entity("r1", "room");
            room.props.seats = Some(seats);
            graph.insert(room);
            compute_ranking(&mut graph);

            let boost = ranked(&graph, "r1").rank_boost.unwrap();
            assert!(boost >= previous, "boost dropped at {seats} seats");
            assert!(boost <= 99);
            previous = boost;
        }
    }

    #[test]
    fn test_building_and_aggregate_boosts() {
        let mut graph = EntityGraph::new();
        let mut building = entity("0101", "building");
        building.props.stats = Some(Stats {
            n_rooms: 240,
            n_rooms_reg: 200,
            n_buildings: 0,
        });
        graph.insert(building);

        let mut site = entity("site", "site");
        site.props.stats = Some(Stats {
            n_rooms: 240,
            n_rooms_reg: 200,
            n_buildings: 7,
        });
        graph.insert(site);

        compute_ranking(&mut graph);
        assert_eq!(ranked(&graph, "0101").rank_boost, Some(10));
        assert_eq!(ranked(&graph, "0101").rank_combined, 1010);
        assert_eq!(ranked(&graph, "site").rank_boost, Some(7));
    }

    #[test]
    fn test_custom_rank_preserved() {
        let mut graph = EntityGraph::new();
        let mut room = entity("r1", "room");
        room.ranking_factors = Some(RankingFactors {
            rank_custom: Some(-5),
            ..Default::default()
        });
        graph.insert(room);
        compute_ranking(&mut graph);

        let factors = ranked(&graph, "r1");
        assert_eq!(factors.rank_custom, Some(-5));
        assert_eq!(factors.rank_combined, 5);
    }
}
