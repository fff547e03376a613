//! Integration tests for campus-atlas
//!
//! These tests run the full pipeline end-to-end over tempfile data
//! directories built by the `TestCampus` fixture. Unit tests for the
//! individual stages live in `src/*.rs`; this file covers cross-stage
//! behavior: precedence between sources, invariants over the compiled
//! graph, and fatal abort paths.

mod common;

use campus_atlas::coords::{haversine_m, MAX_ROOM_DRIFT_M};
use campus_atlas::entity::CoordAccuracy;
use campus_atlas::{AtlasError, EntityKind};
use common::{
    assert_coordinate_completeness, assert_forest_invariant, assert_ranking_complete,
    standard_campus, TestCampus,
};

#[test]
fn compiles_standard_campus() {
    let campus = standard_campus();
    let (graph, report) = campus.compile().unwrap();

    assert_eq!(report.n_entities, graph.len());
    assert!(graph.contains("root"));
    assert!(graph.contains("city"));
    assert!(graph.contains("0101.EG.001"));

    assert_forest_invariant(&graph);
    assert_coordinate_completeness(&graph);
    assert_ranking_complete(&graph);
}

#[test]
fn source_created_rooms_are_anchored_under_their_building() {
    let graph = standard_campus().compile_ok();
    let room = graph.get("0101.EG.001").unwrap();
    assert_eq!(room.kind, EntityKind::Room);
    assert_eq!(room.parents, ["root", "city", "0101"]);

    let building = graph.get("0101").unwrap();
    assert!(building.children.contains(&"0101.EG.001".to_string()));
}

#[test]
fn rooms_inherit_building_coordinate_exactly() {
    let graph = standard_campus().compile_ok();
    let room = graph.get("0101.EG.001").unwrap().coords.clone().unwrap();
    let building = graph.get("0101").unwrap().coords.clone().unwrap();

    assert_eq!(room.lat, building.lat);
    assert_eq!(room.lon, building.lon);
    assert_eq!(room.accuracy, Some(CoordAccuracy::Building));
    assert_eq!(room.source.as_deref(), Some("inferred"));

    // And the drift bound holds trivially for inherited coordinates
    assert!(haversine_m(room.lat, room.lon, building.lat, building.lon) <= MAX_ROOM_DRIFT_M);
}

#[test]
fn aggregates_average_over_building_descendants() {
    let graph = standard_campus().compile_ok();
    let site = graph.get("city").unwrap().coords.clone().unwrap();
    // Mean over the four plain buildings (joined buildings are skipped,
    // their parts are counted directly)
    let expected_lat = (48.1490 + 48.1510 + 48.1475 + 48.1478) / 4.0;
    assert!((site.lat - expected_lat).abs() < 1e-9, "got {}", site.lat);
    assert_eq!(site.source.as_deref(), Some("inferred"));
}

#[test]
fn joined_building_owns_the_floor_catalog() {
    let graph = standard_campus().compile_ok();

    let joined = graph.get("chem").unwrap();
    let floors = joined.props.floors.as_ref().unwrap();
    let raws: Vec<&str> = floors.iter().map(|f| f.raw.as_str()).collect();
    assert_eq!(raws, ["EG", "1"]);

    // Parts defer to the joined parent
    assert!(graph.get("5401").unwrap().props.floors.is_none());

    // Rooms of both parts resolve through the joined catalog
    let lab = graph.get("5402.1.020").unwrap();
    assert_eq!(lab.props.floor.as_ref().unwrap().id, 1);
}

#[test]
fn stats_and_boosts_flow_into_ranking() {
    let graph = standard_campus().compile_ok();

    let main = graph.get("0101").unwrap();
    let stats = main.props.stats.as_ref().unwrap();
    assert_eq!(stats.n_rooms, 4);
    assert_eq!(stats.n_rooms_reg, 3); // corridor excluded

    let factors = main.ranking_factors.as_ref().unwrap();
    assert_eq!(factors.rank_type, 1000);
    assert_eq!(factors.rank_combined, 1000); // 3 // 20 = 0 boost

    let lecture = graph.get("0101.EG.001").unwrap();
    let factors = lecture.ranking_factors.as_ref().unwrap();
    assert_eq!(factors.rank_usage, 100);
    assert_eq!(factors.rank_boost, Some(74));
    assert_eq!(factors.rank_combined, 174);
}

#[test]
fn buildings_get_maps_and_rooms_inherit_them() {
    let graph = standard_campus().compile_ok();

    let building_maps = graph.get("0101").unwrap().maps.as_ref().unwrap();
    let rf = building_maps.roomfinder.as_ref().unwrap();
    assert_eq!(rf.default.as_deref(), Some("city-2000"));
    assert_eq!(rf.available.len(), 2);

    let room_maps = graph.get("0101.EG.001").unwrap().maps.as_ref().unwrap();
    assert_eq!(room_maps.inherits_from.as_deref(), Some("0101"));
    let resolved = graph.resolved_maps("0101.EG.001").unwrap();
    assert_eq!(
        resolved.roomfinder.as_ref().unwrap().default.as_deref(),
        Some("city-2000")
    );
}

#[test]
fn patches_win_over_scraped_sources() {
    let campus = standard_campus();
    campus.add_patches(
        "\
0101:
  name: Corrected Main Building
  coords:
    lat: 48.1492
    lon: 11.5672
    source: survey
",
    );
    let graph = campus.compile_ok();
    let main = graph.get("0101").unwrap();
    // The fill-only timetable source cannot override the correction
    assert_eq!(main.name, "Corrected Main Building");
    let coords = main.coords.as_ref().unwrap();
    assert_eq!(coords.lat, 48.1492);
    assert_eq!(coords.source.as_deref(), Some("survey"));
}

#[test]
fn patch_delete_directive_removes_entity() {
    let campus = standard_campus();
    campus.add_patches("\"0102\": ~\n");
    let graph = campus.compile_ok();
    assert!(!graph.contains("0102"));
    assert_forest_invariant(&graph);
}

#[test]
fn overlays_can_declare_new_pois() {
    let campus = standard_campus();
    campus.add_overlays(
        "\
poi-fountain:
  type: poi
  name: Courtyard Fountain
  parents: [\"0101\"]
",
    );
    let graph = campus.compile_ok();
    let poi = graph.get("poi-fountain").unwrap();
    assert_eq!(poi.kind, EntityKind::Poi);
    assert_eq!(poi.parents, ["root", "city", "0101"]);
    // No own coordinate: inherited from the building like a room
    assert_eq!(
        poi.coords.as_ref().unwrap().accuracy,
        Some(CoordAccuracy::Building)
    );
}

#[test]
fn localized_overlay_values_stay_atomic() {
    let campus = standard_campus();
    campus.add_overlays(
        "\
0101.EG.001:
  description:
    de: Größter Hörsaal
    en: Largest lecture hall
",
    );
    let graph = campus.compile_ok();
    let room = graph.get("0101.EG.001").unwrap();
    let description = room.extra.get("description").unwrap();
    assert_eq!(
        description,
        &serde_json::json!({ "de": "Größter Hörsaal", "en": "Largest lecture hall" })
    );
}

#[test]
fn roomfinder_only_rooms_are_dropped() {
    let campus = standard_campus();
    campus.add_source(
        "roomfinder",
        serde_json::json!({
            "0101": { "props": { "ids": { "roomfinder": 9601 } } },
            "legacy.room.1": {
                "type": "room",
                "name": "Room only the legacy system remembers",
                "parents": ["0101"]
            }
        }),
    );
    let (graph, report) = campus.compile().unwrap();
    assert!(!graph.contains("legacy.room.1"));
    assert_eq!(report.n_dropped_outdated, 1);
    // The building was confirmed by other passes and keeps the legacy id
    let ids = graph.get("0101").unwrap().props.ids.as_ref().unwrap();
    assert_eq!(ids.roomfinder.as_deref(), Some("9601"));
}

#[test]
fn custom_floor_plan_is_assigned_by_building_and_floor() {
    let campus = standard_campus();
    campus.add_custom_maps(
        "\
- building: \"0101\"
  floor: \"1\"
  id: plan-0101-1
  name: Main Building first floor
  scale: 500
  width: 1200
  height: 900
  latlonbox:
    north: 48.1495
    south: 48.1485
    east: 11.5675
    west: 11.5665
    rotation: 0.0
",
    );
    // The seminar room needs its own coordinate, otherwise it only
    // inherits the building's map assignment.
    campus.add_overlays(
        "\
0101.1.101:
  coords:
    lat: 48.14905
    lon: 11.56705
    source: survey
",
    );
    let graph = campus.compile_ok();
    let room_maps = graph.get("0101.1.101").unwrap().maps.as_ref().unwrap();
    let overlays = room_maps.overlays.as_ref().unwrap();
    assert_eq!(overlays.default.as_deref(), Some("plan-0101-1"));
}

#[test]
fn missing_building_coordinate_aborts() {
    let campus = TestCampus::new();
    campus.add_areatree(":City:city[site]\n  0101:Main Building:0101\n");
    let err = campus.compile_err();
    match err {
        AtlasError::MissingBuildingCoordinate { ids } => assert_eq!(ids, ["0101"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn room_far_from_building_aborts() {
    let campus = standard_campus();
    campus.add_overlays(
        "\
0101.EG.001:
  coords:
    lat: 48.1600
    lon: 11.5670
    source: survey
",
    );
    let err = campus.compile_err();
    assert!(matches!(err, AtlasError::CoordinateDriftTooLarge { .. }));
}

#[test]
fn unknown_floor_code_aborts() {
    let campus = standard_campus();
    campus.add_source(
        "natdir",
        serde_json::json!({
            "0101.XX.001": {
                "type": "room",
                "name": "Mystery Room",
                "parents": ["0101"],
                "props": { "floor_raw": "MEZZ" }
            }
        }),
    );
    let err = campus.compile_err();
    match err {
        AtlasError::UnknownFloorCode { building, code } => {
            assert_eq!(building, "0101");
            assert_eq!(code, "MEZZ");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_areatree_aborts_without_partial_tree() {
    let campus = standard_campus();
    campus.add_areatree(":City:city[site]\n   0101:Main Building:0101\n");
    let err = campus.compile_err();
    assert!(matches!(err, AtlasError::BadIndentation { line: 2 }));
}

#[test]
fn translation_table_feeds_floor_names_and_reports_misses() {
    let campus = standard_campus();
    campus.add_translations("floor.EG:\n  de: Erdgeschoss\n  en: Ground floor\n");

    let inputs = campus_atlas::InputSet::discover(campus.path());
    let translator = inputs.load_translations().unwrap();
    let (graph, _) = campus_atlas::compile(&inputs, &translator).unwrap();

    let floors = graph.get("0101").unwrap().props.floors.clone().unwrap();
    let ground = floors.iter().find(|f| f.raw == "EG").unwrap();
    assert_eq!(ground.name.de, "Erdgeschoss");
    assert!(!ground.trivial);

    // U1 and 1 had no curated names
    let missing = translator.missing_keys();
    assert!(missing.contains(&"floor.1".to_string()));
    assert!(missing.contains(&"floor.U1".to_string()));
}

#[test]
fn compiling_twice_is_deterministic() {
    let campus = standard_campus();
    let a = campus.compile_ok().to_json().unwrap();
    let b = campus.compile_ok().to_json().unwrap();
    assert_eq!(a, b);
}
