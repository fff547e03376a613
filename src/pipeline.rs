//! Pipeline orchestration
//!
//! Drives the stages strictly sequentially: every stage is a total pass
//! over the graph and must complete (with its invariants intact) before
//! the next one starts, because later stages depend on state only the
//! earlier ones establish. Any invariant violation aborts the whole
//! batch; there are no partial results.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::areatree;
use crate::coords;
use crate::entity::{Entity, EntityGraph};
use crate::error::Result;
use crate::floors::{self, FloorPatches};
use crate::input::{read_value, InputSet};
use crate::maps;
use crate::merge::{self, RawGraph, SourcePass};
use crate::ranking;
use crate::structure;
use crate::translate::TranslationService;
use crate::value::Value;

/// The out-of-date legacy source whose exclusive entities are dropped
const OUTDATED_SOURCE: &str = "roomfinder";

/// Summary of one compile run
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub generated_at: DateTime<Utc>,
    pub n_entities: usize,
    pub n_created_by_sources: usize,
    pub n_dropped_outdated: usize,
}

/// Run the full pipeline over an input set and return the populated
/// entity graph, ready for the exporter.
pub fn compile(
    inputs: &InputSet,
    translator: &dyn TranslationService,
) -> Result<(EntityGraph, CompileReport)> {
    let started = Utc::now();

    // Skeleton
    let entries = areatree::parse(&inputs.read_areatree()?)?;
    let mut raw = areatree::seed_records(&entries);
    info!(entities = raw.len(), "areatree skeleton built");

    // Source fusion: authoritative corrections first, then the scraped
    // sources fill-only in precedence order, then authoritative overlays.
    let mut created = 0;
    let mut tombstones: Vec<String> = Vec::new();
    if let Some(path) = &inputs.patches {
        let patches = read_value(path)?;
        let (applied, deleted) =
            merge::apply_patches(&mut raw, &patches, &SourcePass::curated("patches"));
        tombstones = deleted;
        info!(applied, "manual patches applied");
    }
    for (name, path) in [
        ("timetable", &inputs.timetable),
        ("natdir", &inputs.natdir),
        ("roomfinder", &inputs.roomfinder),
    ] {
        let Some(path) = path else { continue };
        let snapshot = read_value(path)?;
        let (touched, fresh) =
            merge::apply_source(&mut raw, &snapshot, &SourcePass::scraped(name, None));
        created += fresh;
        info!(source = name, touched, created = fresh, "source merged");
    }
    let floor_patches = match &inputs.overlays {
        Some(path) => {
            let mut overlays = read_value(path)?;
            let floor_patches = split_floor_patches(&mut overlays)?;
            let (touched, fresh) =
                merge::apply_source(&mut raw, &overlays, &SourcePass::curated("overlays"));
            created += fresh;
            info!(touched, created = fresh, "manual overlays applied");
            floor_patches
        }
        None => FloorPatches::new(),
    };

    // Deleted entities must stay deleted even when a later scraped
    // source still knows them.
    for id in &tombstones {
        raw.shift_remove(id);
    }

    merge::expand_parent_chains(&mut raw, areatree::ROOT_ID);
    let dropped = merge::drop_exclusive_to(&mut raw, OUTDATED_SOURCE);

    // Binding and derivation
    let mut graph = bind(raw)?;
    structure::add_children_properties(&mut graph)?;
    structure::add_stats(&mut graph);
    structure::add_computed_props(&mut graph);
    info!(entities = graph.len(), "structure derived");

    coords::resolve(&mut graph)?;
    info!("coordinates resolved");

    floors::infer_floors(&mut graph, &floor_patches, translator)?;
    info!("floor catalogs inferred");

    let catalogs = inputs.load_map_catalogs()?;
    maps::assign_maps(&mut graph, &catalogs)?;
    info!(
        generic = catalogs.generic.len(),
        custom = catalogs.custom.len(),
        "maps assigned"
    );

    ranking::compute_ranking(&mut graph);
    info!("ranking computed");

    let report = CompileReport {
        generated_at: started,
        n_entities: graph.len(),
        n_created_by_sources: created,
        n_dropped_outdated: dropped.len(),
    };
    Ok((graph, report))
}

fn bind(raw: RawGraph) -> Result<EntityGraph> {
    let mut graph = EntityGraph::new();
    for (id, record) in &raw {
        graph.insert(Entity::from_record(id, record)?);
    }
    Ok(graph)
}

/// Overlay documents may carry a top-level `floor_patches` table next to
/// the entity-keyed edits; split it off before merging.
fn split_floor_patches(overlays: &mut Value) -> Result<FloorPatches> {
    let Some(map) = overlays.as_map_mut() else {
        return Ok(FloorPatches::new());
    };
    match map.shift_remove("floor_patches") {
        Some(value) => Ok(serde_json::from_value(value.to_json())?),
        None => Ok(FloorPatches::new()),
    }
}
