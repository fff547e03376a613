//! Recursive source merger
//!
//! Applies each upstream dataset onto the raw entity records with one of
//! two disciplines:
//!
//! - *authoritative* (`overwrite = true`) for hand-authored YAML patches
//!   and overlays, which take precedence over everything merged so far
//! - *fill-only* (`overwrite = false`) for machine-scraped sources, which
//!   must never clobber an already-present field (so a later,
//!   lower-precedence source cannot override an applied correction)
//!
//! Maps are merged key-by-key; scalars, lists and localized strings are
//! atomic leaves. Every source pass that touches an entity appends a
//! provenance descriptor to its `sources.base` list in call order; the
//! ordered list later decides exclusion rules.

use tracing::{debug, warn};

use indexmap::IndexMap;

use crate::value::{Value, ValueMap};

/// Raw entity records keyed by id, the pre-binding form of the graph
pub type RawGraph = IndexMap<String, ValueMap>;

/// Merge discipline of a source pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Hand-authored data, replaces whatever is present
    Authoritative,
    /// Scraped data, only fills absent or null slots
    FillOnly,
}

impl Discipline {
    fn overwrite(&self) -> bool {
        matches!(self, Discipline::Authoritative)
    }
}

/// Name and optional URL of a source pass, recorded as provenance
#[derive(Debug, Clone)]
pub struct SourcePass {
    pub name: String,
    pub url: Option<String>,
    pub discipline: Discipline,
}

impl SourcePass {
    pub fn scraped(name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            url,
            discipline: Discipline::FillOnly,
        }
    }

    pub fn curated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            discipline: Discipline::Authoritative,
        }
    }
}

/// Recursively merge `overlay` onto `base` in place.
///
/// Only map-onto-map merges recurse; any other shape pairing is a leaf
/// replacement governed by `overwrite`. Localized strings are their own
/// value variant, so `{de, en}` pairs replace atomically and are never
/// merged field-by-field.
pub fn merge(base: &mut Value, overlay: &Value, overwrite: bool) {
    match (base, overlay) {
        (Value::Map(base_map), Value::Map(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge(base_value, overlay_value, overwrite),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            if overwrite || base.is_null() {
                *base = overlay.clone();
            }
        }
    }
}

/// Apply one source snapshot onto the raw graph.
///
/// The snapshot must be a map keyed by entity id. Entities unknown to the
/// graph are created by the source (e.g. a room known only to one
/// upstream). Returns the number of touched and created entities.
pub fn apply_source(graph: &mut RawGraph, snapshot: &Value, pass: &SourcePass) -> (usize, usize) {
    let Some(records) = snapshot.as_map() else {
        warn!(source = %pass.name, "source snapshot is not a map of entities, skipping");
        return (0, 0);
    };

    let mut touched = 0;
    let mut created = 0;
    for (id, overlay) in records {
        let Some(overlay_map) = overlay.as_map() else {
            warn!(source = %pass.name, id = %id, "source record is not a map, skipping");
            continue;
        };

        if !graph.contains_key(id) {
            created += 1;
            let mut fresh = ValueMap::new();
            fresh.insert("id".into(), Value::Str(id.clone()));
            graph.insert(id.clone(), fresh);
        }
        let base = graph.get_mut(id).expect("present or just inserted");

        let mut base_value = Value::Map(std::mem::take(base));
        merge(
            &mut base_value,
            &Value::Map(overlay_map.clone()),
            pass.discipline.overwrite(),
        );
        *base = match base_value {
            Value::Map(map) => map,
            _ => unreachable!("map merged onto map stays a map"),
        };

        append_provenance(base, pass);
        touched += 1;
    }

    debug!(source = %pass.name, touched, created, "source applied");
    (touched, created)
}

/// Apply a patch document: entity-keyed authoritative edits, where a
/// `null` body is an explicit delete directive. A patch addressing an
/// unknown id is left unapplied with a warning.
///
/// Returns the number of applied patches and the deleted ids. Deleted
/// ids are tombstones: the caller must keep them out of later source
/// passes, otherwise a scraped source would silently resurrect the
/// entity.
pub fn apply_patches(
    graph: &mut RawGraph,
    patches: &Value,
    pass: &SourcePass,
) -> (usize, Vec<String>) {
    let Some(records) = patches.as_map() else {
        warn!(source = %pass.name, "patch document is not a map of entities, skipping");
        return (0, Vec::new());
    };

    let mut applied = 0;
    let mut deleted = Vec::new();
    for (id, body) in records {
        if body.is_null() {
            if graph.shift_remove(id).is_some() {
                debug!(id = %id, "entity removed by patch directive");
                applied += 1;
            } else {
                warn!(id = %id, source = %pass.name, "unapplied patch: unknown entity");
            }
            deleted.push(id.clone());
            continue;
        }

        let Some(base) = graph.get_mut(id) else {
            warn!(id = %id, source = %pass.name, "unapplied patch: unknown entity");
            continue;
        };
        let Some(overlay_map) = body.as_map() else {
            warn!(id = %id, source = %pass.name, "unapplied patch: body is not a map");
            continue;
        };

        let mut base_value = Value::Map(std::mem::take(base));
        merge(&mut base_value, &Value::Map(overlay_map.clone()), true);
        *base = match base_value {
            Value::Map(map) => map,
            _ => unreachable!("map merged onto map stays a map"),
        };
        append_provenance(base, pass);
        applied += 1;
    }
    (applied, deleted)
}

/// Drop entities known exclusively from the named out-of-date source.
///
/// An entity whose entire provenance list consists of `source_name`
/// passes was never confirmed by the skeleton or any other source and is
/// excluded before derivation. Returns the removed ids.
pub fn drop_exclusive_to(graph: &mut RawGraph, source_name: &str) -> Vec<String> {
    let exclusive: Vec<String> = graph
        .iter()
        .filter(|(_, record)| {
            let names = provenance_names(record);
            !names.is_empty() && names.iter().all(|n| n == source_name)
        })
        .map(|(id, _)| id.clone())
        .collect();

    for id in &exclusive {
        graph.shift_remove(id);
    }
    if !exclusive.is_empty() {
        debug!(
            source = source_name,
            dropped = exclusive.len(),
            "entities known exclusively from out-of-date source removed"
        );
    }
    exclusive
}

/// Expand short parent chains to full root-anchored chains.
///
/// Scraped sources only know an entity's direct parent (a room's
/// building); the skeleton knows full chains. After all merges, any
/// record whose chain does not start at the root is re-anchored through
/// its direct parent's chain. Chains pointing at unknown parents are left
/// alone and fail the forest check during structural derivation.
pub fn expand_parent_chains(graph: &mut RawGraph, root_id: &str) {
    // Skeleton chains are already full, so one hop per nesting level of
    // source-created entities suffices; iterate to a fixpoint.
    for _ in 0..16 {
        let mut updates: Vec<(String, Vec<String>)> = Vec::new();
        for (id, record) in graph.iter() {
            let parents = parent_ids(record);
            if parents.is_empty() || parents[0] == root_id {
                continue;
            }
            let direct = parents.last().expect("non-empty").clone();
            let Some(parent_record) = graph.get(&direct) else {
                continue;
            };
            let parent_chain = parent_ids(parent_record);
            if direct != root_id && parent_chain.first().map(String::as_str) != Some(root_id) {
                // Parent not anchored yet, try again next round.
                continue;
            }
            let mut full = parent_chain;
            full.push(direct);
            updates.push((id.clone(), full));
        }
        if updates.is_empty() {
            break;
        }
        for (id, full) in updates {
            if let Some(record) = graph.get_mut(&id) {
                record.insert(
                    "parents".into(),
                    Value::List(full.into_iter().map(Value::Str).collect()),
                );
            }
        }
    }
}

fn parent_ids(record: &ValueMap) -> Vec<String> {
    record
        .get("parents")
        .and_then(Value::as_list)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn append_provenance(record: &mut ValueMap, pass: &SourcePass) {
    let mut entry = ValueMap::new();
    entry.insert("name".into(), Value::Str(pass.name.clone()));
    if let Some(url) = &pass.url {
        entry.insert("url".into(), Value::Str(url.clone()));
    }

    let sources = record
        .entry("sources".to_string())
        .or_insert_with(|| Value::Map(ValueMap::new()));
    let Some(sources_map) = sources.as_map_mut() else {
        return;
    };
    let base = sources_map
        .entry("base".to_string())
        .or_insert_with(|| Value::List(vec![]));
    if let Value::List(list) = base {
        list.push(Value::Map(entry));
    }
}

fn provenance_names(record: &ValueMap) -> Vec<String> {
    record
        .get("sources")
        .and_then(Value::as_map)
        .and_then(|s| s.get("base"))
        .and_then(Value::as_list)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_map)
                .filter_map(|entry| entry.get("name"))
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
