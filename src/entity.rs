//! Typed entity model and the shared entity graph
//!
//! During source fusion entities exist as dynamic records (`value::ValueMap`).
//! Once every source has been applied the records are bound into the typed
//! `Entity` shape below, and all derivation stages operate on the typed
//! graph. Keys a source merged that the model does not know survive in the
//! `extra` bag so curated data is never silently dropped.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AtlasError, Result};
use crate::value::{Localized, Value, ValueMap};

/// Closed set of entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Root,
    Site,
    Campus,
    Area,
    JoinedBuilding,
    Building,
    Room,
    VirtualRoom,
    Poi,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Site => "site",
            Self::Campus => "campus",
            Self::Area => "area",
            Self::JoinedBuilding => "joined_building",
            Self::Building => "building",
            Self::Room => "room",
            Self::VirtualRoom => "virtual_room",
            Self::Poi => "poi",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Some(match s {
            "root" => Self::Root,
            "site" => Self::Site,
            "campus" => Self::Campus,
            "area" => Self::Area,
            "joined_building" => Self::JoinedBuilding,
            "building" => Self::Building,
            "room" => Self::Room,
            "virtual_room" => Self::VirtualRoom,
            "poi" => Self::Poi,
            _ => return None,
        })
    }

    /// Aggregate types group buildings and are expected to have children.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Root | Self::Site | Self::Campus | Self::Area)
    }

    /// Room-like types inherit their coordinate from a building ancestor
    /// when no source provides one.
    pub fn is_room_like(&self) -> bool {
        matches!(self, Self::Room | Self::VirtualRoom | Self::Poi)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How precisely a coordinate is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordAccuracy {
    /// Inherited from the building ancestor, not independently known
    Building,
}

/// UTM representation of a coordinate (WGS84 datum)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtmCoords {
    pub easting: f64,
    pub northing: f64,
    pub zone_number: u8,
    pub zone_letter: char,
}

/// Geographic coordinate with provenance
///
/// `lat`/`lon` default to 0.0 when a source only delivered the UTM
/// representation; the resolver fills the missing side before validation,
/// and a zero that survives normalization is rejected as invalid data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Coords {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<CoordAccuracy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm: Option<UtmCoords>,
}

/// Provenance descriptor for one contributing source pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SourceRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }
}

/// Append-only provenance list, one entry per contributing source pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sources {
    #[serde(default)]
    pub base: Vec<SourceRef>,
}

/// Room usage classification (DIN 277)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub din_277: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub din_277_desc: Option<String>,
}

/// Identifiers in the upstream systems, used for cross-source matching
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub roomfinder: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub timetable: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub natdir: Option<String>,
    /// Architectural/legacy room identifier, distinct from the room code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch_name: Option<String>,
}

/// Postal address, when any source knows it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Aggregate counts over `children_flat`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub n_rooms: u32,
    /// Rooms excluding the DIN-277 circulation family (`VF*`)
    #[serde(default)]
    pub n_rooms_reg: u32,
    #[serde(default)]
    pub n_buildings: u32,
}

/// One display row derived from other properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedProp {
    pub name: String,
    pub text: String,
}

/// Physical position of a floor in a building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloorCategory {
    Ground,
    Roof,
    Tp,
    Basement,
    Mezzanine,
    Upper,
}

impl FloorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Roof => "roof",
            Self::Tp => "tp",
            Self::Basement => "basement",
            Self::Mezzanine => "mezzanine",
            Self::Upper => "upper",
        }
    }
}

/// One floor of a building's derived floor catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    /// Sequential id relative to the ground floor (ground = 0)
    pub id: i32,
    /// Short display label
    pub label: String,
    /// Raw floor code as found in the sources
    pub raw: String,
    pub category: FloorCategory,
    /// Long localized name
    pub name: Localized,
    /// Mezzanines at or above ground level below this floor
    pub mezzanine_shift: u32,
    /// True when the long name adds nothing beyond the short label
    pub trivial: bool,
}

/// Open bag of derived/curated sub-records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Props {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<ExternalIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    /// Building's full floor catalog (buildings only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floors: Option<Vec<Floor>>,
    /// This room's floor record (rooms only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<Floor>,
    /// Raw floor code delivered by the scraped sources (rooms only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_raw: Option<String>,
    /// Seat count from the timetable system (rooms only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub computed: Vec<ComputedProp>,
    /// Source-provided props the model has no typed slot for
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One map selected for an entity, with the entity's projected pixel position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedMap {
    pub id: String,
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub scale: f64,
    pub width: u32,
    pub height: u32,
}

/// Selected maps of one catalog, with the default choice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapAssignment {
    #[serde(default)]
    pub available: Vec<AssignedMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Map assignments of an entity
///
/// A room whose coordinate is only inherited carries `inherits_from`
/// instead of its own assignment; `EntityGraph::resolved_maps` follows the
/// marker at read time. This replaces the shared-mutable-record aliasing
/// the upstream systems used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Maps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roomfinder: Option<MapAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlays: Option<MapAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
}

impl Maps {
    pub fn is_empty(&self) -> bool {
        self.roomfinder.is_none() && self.overlays.is_none() && self.inherits_from.is_none()
    }
}

/// Deterministic relevance rank
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingFactors {
    #[serde(default)]
    pub rank_type: i64,
    #[serde(default)]
    pub rank_usage: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_boost: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_custom: Option<i64>,
    #[serde(default)]
    pub rank_combined: i64,
}

/// Data-quality markers carried through the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub areatree_uncertain: bool,
}

impl DataQuality {
    pub fn is_default(&self) -> bool {
        !self.areatree_uncertain
    }
}

/// Building prefix from the areatree: one building id or a list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BPrefix {
    One(String),
    Many(Vec<String>),
}

/// The central record of the directory, keyed by a globally unique id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b_prefix: Option<BPrefix>,
    /// Ancestor ids, `root` first, nearest ancestor last; empty only on root
    #[serde(default)]
    pub parents: Vec<String>,
    /// Direct children, derived
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Full transitive descendant set, derived
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_flat: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coords>,
    #[serde(default, skip_serializing_if = "is_default_props")]
    pub props: Props,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub sources: Sources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps: Option<Maps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking_factors: Option<RankingFactors>,
    #[serde(default, skip_serializing_if = "DataQuality::is_default")]
    pub data_quality: DataQuality,
    /// Merged keys without a typed slot
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn is_default_props(props: &Props) -> bool {
    *props == Props::default()
}

impl Entity {
    /// Bind a merged dynamic record into the typed shape.
    pub fn from_record(id: &str, record: &ValueMap) -> Result<Entity> {
        let json = Value::Map(record.clone()).to_json();
        let mut entity: Entity =
            serde_json::from_value(json).map_err(|e| AtlasError::InvalidRecord {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        entity.id = id.to_string();
        Ok(entity)
    }

    /// Direct parent id, if any.
    pub fn direct_parent(&self) -> Option<&str> {
        self.parents.last().map(String::as_str)
    }
}

/// The shared in-memory entity graph every pipeline stage mutates in place
///
/// Entities are stored in a hash map with a separate insertion-order list
/// so iteration and serialization stay deterministic.
#[derive(Debug, Default)]
pub struct EntityGraph {
    entities: ahash::AHashMap<String, Entity>,
    order: Vec<String>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn insert(&mut self, entity: Entity) {
        if !self.entities.contains_key(&entity.id) {
            self.order.push(entity.id.clone());
        }
        self.entities.insert(entity.id.clone(), entity);
    }

    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        let removed = self.entities.remove(id);
        if removed.is_some() {
            self.order.retain(|e| e != id);
        }
        removed
    }

    /// Snapshot of all ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// All ancestors of `entity` of type `building`.
    pub fn building_ancestors(&self, entity: &Entity) -> Vec<&Entity> {
        entity
            .parents
            .iter()
            .filter_map(|pid| self.get(pid))
            .filter(|p| p.kind == EntityKind::Building)
            .collect()
    }

    /// Map assignment of `id`, following `inherits_from` markers.
    pub fn resolved_maps(&self, id: &str) -> Option<&Maps> {
        let mut current = id;
        // Inheritance chains are at most room -> building, but guard anyway.
        for _ in 0..8 {
            let maps = self.get(current)?.maps.as_ref()?;
            match &maps.inherits_from {
                Some(parent) => current = parent.as_str(),
                None => return Some(maps),
            }
        }
        None
    }

    /// Serialize the whole graph as a JSON object keyed by entity id.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut out = serde_json::Map::new();
        for entity in self.iter() {
            out.insert(entity.id.clone(), serde_json::to_value(entity)?);
        }
        Ok(serde_json::Value::Object(out))
    }
}

/// Accept strings or numbers for identifier-shaped fields; legacy sources
/// deliver numeric ids.
fn de_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected string or number id, got {other}"
            )))
        }
    })
}
