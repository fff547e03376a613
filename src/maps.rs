//! Map selection and geometric projection
//!
//! Two catalogs feed this stage: scraped floor-plan/area maps and
//! manually curated custom maps. Every entity gets the maps that
//! geometrically cover its coordinate (plus custom maps matched by
//! building and floor), each with the entity's projected pixel position,
//! sorted so that the most detailed map becomes the default.
//!
//! A room whose coordinate is merely inherited from its building gets an
//! `inherits_from` marker instead of its own assignment; readers resolve
//! it through `EntityGraph::resolved_maps`.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::entity::{
    AssignedMap, CoordAccuracy, EntityGraph, EntityKind, MapAssignment, Maps,
};
use crate::error::{AtlasError, Result};

/// Geographic extent of a map image plus its rotation in degrees
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LatLonBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    #[serde(default)]
    pub rotation: f64,
}

impl LatLonBox {
    /// Comparative bounding-box area in square degrees.
    pub fn area(&self) -> f64 {
        (self.north - self.south).abs() * (self.east - self.west).abs()
    }
}

/// One map image with its metadata
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MapEntry {
    pub id: String,
    pub name: String,
    /// Scale denominator; smaller means larger/more detailed
    pub scale: f64,
    pub width: u32,
    pub height: u32,
    pub latlonbox: LatLonBox,
    #[serde(default)]
    pub source: Option<String>,
    /// Digest of the image file, computed by the scraper
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// A curated map pinned to one building (and optionally one floor)
#[derive(Debug, Clone, Deserialize)]
pub struct CustomMap {
    pub building: String,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(flatten)]
    pub entry: MapEntry,
}

/// Both map catalogs, already loaded from disk
#[derive(Debug, Clone, Default)]
pub struct MapCatalogs {
    pub generic: Vec<MapEntry>,
    pub custom: Vec<CustomMap>,
}

impl MapCatalogs {
    /// Deduplicate the scraped catalog and reject conflicting custom maps.
    pub fn prepare(mut self) -> Result<Self> {
        self.generic = dedup_maps(self.generic);
        validate_custom(&self.custom)?;
        Ok(self)
    }
}

/// Project a geodetic point into map pixel space.
///
/// The fractional position inside the un-rotated bounding box is scaled
/// to pixels and then rotated about the image center. Returns `None` when
/// the rotated position falls outside `[0, W] x [0, H]`, which also
/// serves as the coverage test.
pub fn project(lat: f64, lon: f64, entry: &MapEntry) -> Option<(f64, f64)> {
    let bbox = &entry.latlonbox;
    let rel_x = (bbox.west - lon).abs() / (bbox.west - bbox.east).abs();
    let rel_y = (bbox.north - lat).abs() / (bbox.north - bbox.south).abs();

    let (width, height) = (entry.width as f64, entry.height as f64);
    let (x0, y0) = (rel_x * width, rel_y * height);

    let (cx, cy) = (width / 2.0, height / 2.0);
    let theta = bbox.rotation.to_radians();
    let (dx, dy) = (x0 - cx, y0 - cy);
    let x = cx + dx * theta.cos() - dy * theta.sin();
    let y = cy + dx * theta.sin() + dy * theta.cos();

    if (0.0..=width).contains(&x) && (0.0..=height).contains(&y) {
        Some((x, y))
    } else {
        None
    }
}

/// Merge map records whose image files are byte-identical.
///
/// Metadata of merged records combines text fields by interleaving the
/// differing middle segment between the common prefix and suffix, and
/// averages numeric fields.
pub fn dedup_maps(entries: Vec<MapEntry>) -> Vec<MapEntry> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<MapEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(hash) = entry.content_hash.clone() else {
            out.push(entry);
            continue;
        };
        match seen.get(&hash) {
            Some(&index) => {
                let kept = &mut out[index];
                kept.name = merge_text(&kept.name, &entry.name);
                kept.scale = (kept.scale + entry.scale) / 2.0;
                kept.latlonbox.rotation = (kept.latlonbox.rotation + entry.latlonbox.rotation) / 2.0;
            }
            None => {
                seen.insert(hash, out.len());
                out.push(entry);
            }
        }
    }
    out
}

/// Combine two text values: common prefix and suffix are kept, the
/// differing middles are interleaved as `"prefix a/b suffix"`.
pub fn merge_text(a: &str, b: &str) -> String {
    if a == b {
        return a.to_string();
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let prefix = a_chars
        .iter()
        .zip(&b_chars)
        .take_while(|(x, y)| x == y)
        .count();
    let max_suffix = a_chars.len().min(b_chars.len()) - prefix;
    let suffix = a_chars
        .iter()
        .rev()
        .zip(b_chars.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
        .min(max_suffix);

    let prefix_str: String = a_chars[..prefix].iter().collect();
    let suffix_str: String = a_chars[a_chars.len() - suffix..].iter().collect();
    let mid_a: String = a_chars[prefix..a_chars.len() - suffix].iter().collect();
    let mid_b: String = b_chars[prefix..b_chars.len() - suffix].iter().collect();
    format!("{prefix_str}{mid_a}/{mid_b}{suffix_str}")
}

fn validate_custom(custom: &[CustomMap]) -> Result<()> {
    let mut seen: HashMap<(String, String), ()> = HashMap::new();
    for map in custom {
        let key = (
            map.building.clone(),
            map.floor.clone().unwrap_or_default(),
        );
        if seen.insert(key, ()).is_some() {
            return Err(AtlasError::DuplicateBuildingMapping {
                building: map.building.clone(),
                floor: map.floor.clone().unwrap_or_default(),
            });
        }
    }
    Ok(())
}

/// Assign maps to every entity in the graph.
pub fn assign_maps(graph: &mut EntityGraph, catalogs: &MapCatalogs) -> Result<()> {
    for id in graph.ids() {
        let Some(entity) = graph.get(&id) else {
            continue;
        };
        if entity.kind == EntityKind::Root {
            continue;
        }
        let Some(coords) = entity.coords.clone() else {
            continue;
        };

        // Inherited coordinate: the room shows its building's maps.
        if entity.kind.is_room_like() && coords.accuracy == Some(CoordAccuracy::Building) {
            let ancestors = graph.building_ancestors(entity);
            if let [building] = ancestors.as_slice() {
                let building_id = building.id.clone();
                if let Some(entity) = graph.get_mut(&id) {
                    entity.maps = Some(Maps {
                        inherits_from: Some(building_id),
                        ..Default::default()
                    });
                }
            }
            continue;
        }

        let custom_key = custom_key_for(graph, entity);
        let child_coords: Vec<(f64, f64)> = entity
            .children
            .iter()
            .filter_map(|cid| graph.get(cid))
            .filter_map(|c| c.coords.as_ref())
            .map(|c| (c.lat, c.lon))
            .collect();

        let mut generic: Vec<AssignedMap> = Vec::new();
        for entry in &catalogs.generic {
            if let Some(assigned) = candidate(coords.lat, coords.lon, entry, &child_coords) {
                generic.push(assigned);
            }
        }
        sort_candidates(&mut generic);

        let mut overlays: Vec<AssignedMap> = Vec::new();
        if let Some((building, floor)) = &custom_key {
            for map in &catalogs.custom {
                if map.building != *building || map.floor != *floor {
                    continue;
                }
                match candidate(coords.lat, coords.lon, &map.entry, &child_coords) {
                    Some(assigned) => overlays.push(assigned),
                    None => warn!(
                        id = %id,
                        map = %map.entry.id,
                        "custom map matched by key but does not cover the entity"
                    ),
                }
            }
            sort_candidates(&mut overlays);
        }

        if generic.is_empty() && overlays.is_empty() {
            warn!(id = %id, "no maps cover this entity");
            continue;
        }

        let maps = Maps {
            roomfinder: assignment_from(generic),
            overlays: assignment_from(overlays),
            inherits_from: None,
        };
        if let Some(entity) = graph.get_mut(&id) {
            entity.maps = Some(maps);
        }
    }
    Ok(())
}

/// Custom maps are keyed by building and floor: buildings match their own
/// floor-less entries, rooms match through their building ancestor and
/// raw floor code.
fn custom_key_for(
    graph: &EntityGraph,
    entity: &crate::entity::Entity,
) -> Option<(String, Option<String>)> {
    match entity.kind {
        EntityKind::Building | EntityKind::JoinedBuilding => Some((entity.id.clone(), None)),
        EntityKind::Room | EntityKind::VirtualRoom | EntityKind::Poi => {
            let ancestors = graph.building_ancestors(entity);
            match ancestors.as_slice() {
                [building] => Some((building.id.clone(), entity.props.floor_raw.clone())),
                _ => None,
            }
        }
        _ => None,
    }
}

/// A map is a candidate when it covers the entity and, for entities with
/// direct children, every child as well (so the map visually covers all
/// shown sub-entities).
fn candidate(
    lat: f64,
    lon: f64,
    entry: &MapEntry,
    child_coords: &[(f64, f64)],
) -> Option<AssignedMap> {
    let (x, y) = project(lat, lon, entry)?;
    if !child_coords
        .iter()
        .all(|(clat, clon)| project(*clat, *clon, entry).is_some())
    {
        return None;
    }
    Some(AssignedMap {
        id: entry.id.clone(),
        name: entry.name.clone(),
        x: x.round() as u32,
        y: y.round() as u32,
        scale: entry.scale,
        width: entry.width,
        height: entry.height,
    })
}

fn sort_candidates(candidates: &mut [AssignedMap]) {
    candidates.sort_by(|a, b| {
        a.scale
            .total_cmp(&b.scale)
            .then_with(|| (a.width as u64 * a.height as u64).cmp(&(b.width as u64 * b.height as u64)))
    });
}

fn assignment_from(available: Vec<AssignedMap>) -> Option<MapAssignment> {
    if available.is_empty() {
        return None;
    }
    let default = Some(available[0].id.clone());
    Some(MapAssignment { available, default })
}
