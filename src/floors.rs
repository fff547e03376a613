//! Floor catalog inference
//!
//! Buildings do not come with an authored floor list; it is derived from
//! the raw floor codes of their rooms. Codes are ranked into physical
//! order, assigned sequential ids relative to the ground floor, and given
//! localized long names. Building parts defer to their joined parent, so
//! a joined building gets one catalog spanning all of its parts.
//!
//! Raw code ranking:
//!
//! | code  | rank    | category  |
//! |-------|---------|-----------|
//! | `U<n>`| `-10n`  | basement  |
//! | `TP`  | `-5`    | tp        |
//! | `EG`  | `0`     | ground    |
//! | `Z<n>`| `10n-5` | mezzanine |
//! | `<n>` | `10n`   | upper     |
//! | `DG`  | `1000`  | roof      |
//!
//! A mezzanine sits just below the following upper floor by default; a
//! manual floor patch can override id and display name per code.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::entity::{EntityGraph, EntityKind, Floor, FloorCategory};
use crate::error::{AtlasError, Result};
use crate::translate::TranslationService;
use crate::value::Localized;

static BASEMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^U(\d+)$").unwrap());
static MEZZANINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Z(\d+)$").unwrap());
static UPPER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)$").unwrap());

/// Manual override for one floor code of one building
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FloorPatch {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: Option<Localized>,
}

/// Floor patches keyed by building id, then raw code
pub type FloorPatches = HashMap<String, HashMap<String, FloorPatch>>;

struct RankedCode {
    rank: i64,
    category: FloorCategory,
    number: Option<u32>,
}

fn classify(building: &str, code: &str) -> Result<RankedCode> {
    if code == "EG" {
        return Ok(RankedCode {
            rank: 0,
            category: FloorCategory::Ground,
            number: None,
        });
    }
    if code == "DG" {
        return Ok(RankedCode {
            rank: 1000,
            category: FloorCategory::Roof,
            number: None,
        });
    }
    if code == "TP" {
        return Ok(RankedCode {
            rank: -5,
            category: FloorCategory::Tp,
            number: None,
        });
    }
    if let Some(caps) = BASEMENT_RE.captures(code) {
        let n: u32 = caps[1].parse().unwrap_or(0);
        return Ok(RankedCode {
            rank: -10 * n as i64,
            category: FloorCategory::Basement,
            number: Some(n),
        });
    }
    if let Some(caps) = MEZZANINE_RE.captures(code) {
        let n: u32 = caps[1].parse().unwrap_or(0);
        return Ok(RankedCode {
            rank: 10 * n as i64 - 5,
            category: FloorCategory::Mezzanine,
            number: Some(n),
        });
    }
    if let Some(caps) = UPPER_RE.captures(code) {
        let n: u32 = caps[1].parse().unwrap_or(0);
        return Ok(RankedCode {
            rank: 10 * n as i64,
            category: FloorCategory::Upper,
            number: Some(n),
        });
    }
    Err(AtlasError::UnknownFloorCode {
        building: building.to_string(),
        code: code.to_string(),
    })
}

/// Derive floor catalogs and attach per-room floor records.
pub fn infer_floors(
    graph: &mut EntityGraph,
    patches: &FloorPatches,
    translator: &dyn TranslationService,
) -> Result<()> {
    for id in graph.ids() {
        let Some(entity) = graph.get(&id) else {
            continue;
        };
        if !matches!(
            entity.kind,
            EntityKind::Building | EntityKind::JoinedBuilding
        ) {
            continue;
        }
        // Building parts defer to their joined parent's catalog.
        let parent_is_joined = entity
            .direct_parent()
            .and_then(|pid| graph.get(pid))
            .map(|p| p.kind == EntityKind::JoinedBuilding)
            .unwrap_or(false);
        if parent_is_joined {
            continue;
        }

        let rooms: Vec<(String, String)> = entity
            .children_flat
            .iter()
            .filter_map(|cid| graph.get(cid))
            .filter(|c| matches!(c.kind, EntityKind::Room | EntityKind::VirtualRoom))
            .filter_map(|c| {
                c.props
                    .floor_raw
                    .as_ref()
                    .map(|raw| (c.id.clone(), raw.clone()))
            })
            .collect();
        if rooms.is_empty() {
            continue;
        }

        let mut codes: Vec<String> = rooms.iter().map(|(_, raw)| raw.clone()).collect();
        codes.sort();
        codes.dedup();

        let catalog = build_catalog(&id, codes, patches.get(&id), translator)?;

        let by_raw: HashMap<String, Floor> = catalog
            .iter()
            .map(|f| (f.raw.clone(), f.clone()))
            .collect();
        if let Some(building) = graph.get_mut(&id) {
            building.props.floors = Some(catalog);
        }
        for (room_id, raw) in rooms {
            if let (Some(room), Some(floor)) = (graph.get_mut(&room_id), by_raw.get(&raw)) {
                room.props.floor = Some(floor.clone());
            }
        }
    }
    Ok(())
}

fn build_catalog(
    building: &str,
    codes: Vec<String>,
    patches: Option<&HashMap<String, FloorPatch>>,
    translator: &dyn TranslationService,
) -> Result<Vec<Floor>> {
    let mut ranked: Vec<(RankedCode, String)> = codes
        .into_iter()
        .map(|code| classify(building, &code).map(|r| (r, code)))
        .collect::<Result<_>>()?;
    ranked.sort_by(|(a, ac), (b, bc)| a.rank.cmp(&b.rank).then_with(|| ac.cmp(bc)));

    let eg_index = ranked
        .iter()
        .position(|(r, _)| r.category == FloorCategory::Ground)
        .unwrap_or(0);

    let mut catalog = Vec::with_capacity(ranked.len());
    let mut mezzanine_shift: u32 = 0;
    for (index, (code, raw)) in ranked.iter().enumerate() {
        if code.category == FloorCategory::Mezzanine && index >= eg_index {
            mezzanine_shift += 1;
        }

        let patch = patches.and_then(|p| p.get(raw));
        let id = patch
            .and_then(|p| p.id)
            .unwrap_or(index as i32 - eg_index as i32);

        let (name, trivial) = floor_name(code, raw, mezzanine_shift, patch, translator);

        catalog.push(Floor {
            id,
            label: raw.clone(),
            raw: raw.clone(),
            category: code.category,
            name,
            mezzanine_shift,
            trivial,
        });
    }
    Ok(catalog)
}

/// Long localized floor name: patch override first, then the translation
/// table, then a generated fallback (the only case counted as trivial
/// when no mezzanine disambiguation applies).
fn floor_name(
    code: &RankedCode,
    raw: &str,
    mezzanine_shift: u32,
    patch: Option<&FloorPatch>,
    translator: &dyn TranslationService,
) -> (Localized, bool) {
    if let Some(name) = patch.and_then(|p| p.name.clone()) {
        return (name, false);
    }

    let key = if code.category == FloorCategory::Upper && mezzanine_shift > 0 {
        format!("floor.{raw}+{mezzanine_shift}")
    } else {
        format!("floor.{raw}")
    };
    if let Some(name) = translator.lookup(&key) {
        return (name, false);
    }
    translator.record_missing(&key);

    let generated = generate_name(code, mezzanine_shift);
    let trivial = mezzanine_shift == 0 || code.category != FloorCategory::Upper;
    (generated, trivial)
}

fn generate_name(code: &RankedCode, mezzanine_shift: u32) -> Localized {
    let n = code.number.unwrap_or(0);
    match code.category {
        FloorCategory::Ground => Localized::new("Erdgeschoss", "Ground floor"),
        FloorCategory::Roof => Localized::new("Dachgeschoss", "Roof floor"),
        FloorCategory::Tp => Localized::new("Tiefparterre", "Sunken ground floor"),
        FloorCategory::Basement => {
            Localized::new(format!("{n}. Untergeschoss"), format!("Basement {n}"))
        }
        FloorCategory::Mezzanine => {
            Localized::new(format!("{n}. Zwischengeschoss"), format!("Mezzanine {n}"))
        }
        FloorCategory::Upper => {
            let mut de = format!("{n}. Obergeschoss");
            let mut en = format!("{} floor", english_ordinal(n));
            if mezzanine_shift > 0 {
                let de_word = if mezzanine_shift == 1 {
                    "Zwischengeschoss"
                } else {
                    "Zwischengeschosse"
                };
                let en_word = if mezzanine_shift == 1 {
                    "mezzanine"
                } else {
                    "mezzanines"
                };
                de = format!("{de} + {mezzanine_shift} {de_word}");
                en = format!("{en} + {mezzanine_shift} {en_word}");
            }
            Localized::new(de, en)
        }
    }
}

fn english_ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
