//! Coordinate resolution, conversion and validation
//!
//! After source merging every building must already carry a coordinate.
//! This stage fills in the rest of the hierarchy (rooms inherit from their
//! building, aggregates average over their building descendants), keeps
//! the geodetic and UTM representations in sync, and then validates the
//! whole graph: zero components are always invalid data, and a room more
//! than 250 m from its building indicates a wrong building assignment.

use crate::entity::{CoordAccuracy, Coords, EntityGraph, EntityKind, UtmCoords};
use crate::error::{AtlasError, Result};

/// Maximum allowed distance between a room and its building
pub const MAX_ROOM_DRIFT_M: f64 = 250.0;

/// Fixed Earth radius for great-circle distances
const EARTH_RADIUS_M: f64 = 6_371_000.0;

// WGS84 ellipsoid
const EQUATORIAL_RADIUS: f64 = 6_378_137.0;
const ECC_SQUARED: f64 = 0.006_694_38;
const K0: f64 = 0.9996;

const ZONE_LETTERS: &[u8] = b"CDEFGHJKLMNPQRSTUVWXX";

/// Source tag for curated coordinates that carry no explicit tag
const DEFAULT_COORD_SOURCE: &str = "atlas";
/// Source tag for coordinates this stage derived itself
const INFERRED_COORD_SOURCE: &str = "inferred";

/// Run the full coordinate stage over the graph.
pub fn resolve(graph: &mut EntityGraph) -> Result<()> {
    require_building_coords(graph)?;
    normalize_representations(graph);
    infer_missing_coords(graph)?;
    apply_default_source(graph);
    normalize_representations(graph);
    validate(graph)
}

/// Every building must have a merged coordinate before inference starts.
fn require_building_coords(graph: &EntityGraph) -> Result<()> {
    let missing: Vec<String> = graph
        .iter()
        .filter(|e| e.kind == EntityKind::Building && e.coords.is_none())
        .map(|e| e.id.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AtlasError::MissingBuildingCoordinate { ids: missing })
    }
}

fn infer_missing_coords(graph: &mut EntityGraph) -> Result<()> {
    for id in graph.ids() {
        let entity = match graph.get(&id) {
            Some(e) => e,
            None => continue,
        };
        if entity.coords.is_some() || entity.kind == EntityKind::Root {
            continue;
        }

        let coords = match entity.kind {
            EntityKind::Room | EntityKind::VirtualRoom | EntityKind::Poi => {
                let ancestors = graph.building_ancestors(entity);
                if ancestors.len() != 1 {
                    return Err(AtlasError::AmbiguousParentBuilding {
                        id: id.clone(),
                        found: ancestors.len(),
                    });
                }
                let building = ancestors[0].coords.clone().unwrap_or_default();
                Coords {
                    lat: building.lat,
                    lon: building.lon,
                    utm: building.utm,
                    source: Some(INFERRED_COORD_SOURCE.into()),
                    accuracy: Some(CoordAccuracy::Building),
                }
            }
            EntityKind::Site
            | EntityKind::Campus
            | EntityKind::Area
            | EntityKind::JoinedBuilding => {
                // Plain arithmetic mean over the transitive building
                // descendants, not a recursive average through
                // intermediate aggregates.
                let positions: Vec<(f64, f64)> = entity
                    .children_flat
                    .iter()
                    .filter_map(|cid| graph.get(cid))
                    .filter(|c| c.kind == EntityKind::Building)
                    .filter_map(|c| c.coords.as_ref())
                    .map(|c| (c.lat, c.lon))
                    .collect();
                if positions.is_empty() {
                    return Err(AtlasError::NoBuildingDescendants { id: id.clone() });
                }
                let n = positions.len() as f64;
                let (lat_sum, lon_sum) = positions
                    .iter()
                    .fold((0.0, 0.0), |(la, lo), (lat, lon)| (la + lat, lo + lon));
                Coords {
                    lat: lat_sum / n,
                    lon: lon_sum / n,
                    source: Some(INFERRED_COORD_SOURCE.into()),
                    accuracy: None,
                    utm: None,
                }
            }
            kind => {
                return Err(AtlasError::UnknownCoordinateInference {
                    id: id.clone(),
                    kind: kind.to_string(),
                })
            }
        };

        if let Some(entity) = graph.get_mut(&id) {
            entity.coords = Some(coords);
        }
    }
    Ok(())
}

fn apply_default_source(graph: &mut EntityGraph) {
    for id in graph.ids() {
        if let Some(coords) = graph.get_mut(&id).and_then(|e| e.coords.as_mut()) {
            if coords.source.is_none() {
                coords.source = Some(DEFAULT_COORD_SOURCE.into());
            }
        }
    }
}

/// Fill whichever coordinate representation is missing so both are always
/// available afterward. A zero lat/lon pair counts as missing since zero
/// never denotes an on-campus location.
fn normalize_representations(graph: &mut EntityGraph) {
    for id in graph.ids() {
        let Some(coords) = graph.get_mut(&id).and_then(|e| e.coords.as_mut()) else {
            continue;
        };
        if coords.utm.is_none() && (coords.lat != 0.0 || coords.lon != 0.0) {
            coords.utm = Some(utm_from_latlon(coords.lat, coords.lon));
        } else if coords.lat == 0.0 && coords.lon == 0.0 {
            if let Some(utm) = &coords.utm {
                let (lat, lon) = latlon_from_utm(utm);
                coords.lat = lat;
                coords.lon = lon;
            }
        }
    }
}

fn validate(graph: &EntityGraph) -> Result<()> {
    for entity in graph.iter() {
        if entity.kind == EntityKind::Root {
            continue;
        }
        let coords = entity
            .coords
            .as_ref()
            .ok_or_else(|| AtlasError::UnknownCoordinateInference {
                id: entity.id.clone(),
                kind: entity.kind.to_string(),
            })?;

        let mut components = vec![coords.lat, coords.lon];
        if let Some(utm) = &coords.utm {
            components.push(utm.easting);
            components.push(utm.northing);
        }
        if components.iter().any(|c| *c == 0.0) {
            return Err(AtlasError::ZeroCoordinate {
                id: entity.id.clone(),
            });
        }

        if matches!(entity.kind, EntityKind::Room | EntityKind::VirtualRoom) {
            let ancestors = graph.building_ancestors(entity);
            // Building parts nest under joined buildings, never under
            // plain buildings, so more than one match is a data defect.
            if let [building] = ancestors.as_slice() {
                let bc = building.coords.as_ref().expect("buildings are resolved");
                let distance = haversine_m(coords.lat, coords.lon, bc.lat, bc.lon);
                if distance > MAX_ROOM_DRIFT_M {
                    return Err(AtlasError::CoordinateDriftTooLarge {
                        id: entity.id.clone(),
                        building: building.id.clone(),
                        distance_m: distance,
                        limit_m: MAX_ROOM_DRIFT_M,
                    });
                }
            } else if ancestors.len() > 1 {
                return Err(AtlasError::AmbiguousParentBuilding {
                    id: entity.id.clone(),
                    found: ancestors.len(),
                });
            }
        }
    }
    Ok(())
}

/// Great-circle distance in meters between two geodetic points.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Convert a geodetic coordinate to its UTM representation (WGS84).
pub fn utm_from_latlon(lat: f64, lon: f64) -> UtmCoords {
    let e2 = ECC_SQUARED * ECC_SQUARED;
    let e3 = e2 * ECC_SQUARED;
    let e_p2 = ECC_SQUARED / (1.0 - ECC_SQUARED);

    let m1 = 1.0 - ECC_SQUARED / 4.0 - 3.0 * e2 / 64.0 - 5.0 * e3 / 256.0;
    let m2 = 3.0 * ECC_SQUARED / 8.0 + 3.0 * e2 / 32.0 + 45.0 * e3 / 1024.0;
    let m3 = 15.0 * e2 / 256.0 + 45.0 * e3 / 1024.0;
    let m4 = 35.0 * e3 / 3072.0;

    let lat_rad = lat.to_radians();
    let lat_sin = lat_rad.sin();
    let lat_cos = lat_rad.cos();
    let lat_tan = lat_sin / lat_cos;
    let lat_tan2 = lat_tan * lat_tan;
    let lat_tan4 = lat_tan2 * lat_tan2;

    let zone_number = zone_number_for(lat, lon);
    let zone_letter = zone_letter_for(lat);
    let central_lon = (zone_number as f64 - 1.0) * 6.0 - 180.0 + 3.0;

    let n = EQUATORIAL_RADIUS / (1.0 - ECC_SQUARED * lat_sin * lat_sin).sqrt();
    let c = e_p2 * lat_cos * lat_cos;
    let a = lat_cos * (lon.to_radians() - central_lon.to_radians());
    let (a2, a3) = (a * a, a * a * a);
    let (a4, a5, a6) = (a3 * a, a3 * a2, a3 * a3);

    let m = EQUATORIAL_RADIUS
        * (m1 * lat_rad - m2 * (2.0 * lat_rad).sin() + m3 * (4.0 * lat_rad).sin()
            - m4 * (6.0 * lat_rad).sin());

    let easting = K0
        * n
        * (a + a3 / 6.0 * (1.0 - lat_tan2 + c)
            + a5 / 120.0 * (5.0 - 18.0 * lat_tan2 + lat_tan4 + 72.0 * c - 58.0 * e_p2))
        + 500_000.0;
    let mut northing = K0
        * (m + n
            * lat_tan
            * (a2 / 2.0
                + a4 / 24.0 * (5.0 - lat_tan2 + 9.0 * c + 4.0 * c * c)
                + a6 / 720.0 * (61.0 - 58.0 * lat_tan2 + lat_tan4 + 600.0 * c - 330.0 * e_p2)));
    if lat < 0.0 {
        northing += 10_000_000.0;
    }

    UtmCoords {
        easting,
        northing,
        zone_number,
        zone_letter,
    }
}

/// Convert a UTM coordinate back to geodetic latitude and longitude.
pub fn latlon_from_utm(utm: &UtmCoords) -> (f64, f64) {
    let e2 = ECC_SQUARED * ECC_SQUARED;
    let e3 = e2 * ECC_SQUARED;
    let e_p2 = ECC_SQUARED / (1.0 - ECC_SQUARED);

    let m1 = 1.0 - ECC_SQUARED / 4.0 - 3.0 * e2 / 64.0 - 5.0 * e3 / 256.0;

    let sqrt_e = (1.0 - ECC_SQUARED).sqrt();
    let e_ = (1.0 - sqrt_e) / (1.0 + sqrt_e);
    let e_2 = e_ * e_;
    let e_3 = e_2 * e_;
    let e_4 = e_3 * e_;
    let e_5 = e_4 * e_;

    let p2 = 3.0 / 2.0 * e_ - 27.0 / 32.0 * e_3;
    let p3 = 21.0 / 16.0 * e_2 - 55.0 / 32.0 * e_4;
    let p4 = 151.0 / 96.0 * e_3 - 417.0 / 128.0 * e_5;
    let p5 = 1097.0 / 512.0 * e_4;

    let x = utm.easting - 500_000.0;
    let mut y = utm.northing;
    if utm.zone_letter < 'N' {
        y -= 10_000_000.0;
    }

    let m = y / K0;
    let mu = m / (EQUATORIAL_RADIUS * m1);

    let p_rad = mu
        + p2 * (2.0 * mu).sin()
        + p3 * (4.0 * mu).sin()
        + p4 * (6.0 * mu).sin()
        + p5 * (8.0 * mu).sin();
    let p_sin = p_rad.sin();
    let p_cos = p_rad.cos();
    let p_tan = p_sin / p_cos;
    let p_tan2 = p_tan * p_tan;
    let p_tan4 = p_tan2 * p_tan2;

    let ep_sin = 1.0 - ECC_SQUARED * p_sin * p_sin;
    let n = EQUATORIAL_RADIUS / ep_sin.sqrt();
    let r = (1.0 - ECC_SQUARED) / ep_sin;
    let c = e_p2 * p_cos * p_cos;
    let c2 = c * c;

    let d = x / (n * K0);
    let (d2, d3) = (d * d, d * d * d);
    let (d4, d5, d6) = (d3 * d, d3 * d2, d3 * d3);

    let lat = p_rad
        - (p_tan / r)
            * (d2 / 2.0 - d4 / 24.0 * (5.0 + 3.0 * p_tan2 + 10.0 * c - 4.0 * c2 - 9.0 * e_p2)
                + d6 / 720.0
                    * (61.0 + 90.0 * p_tan2 + 298.0 * c + 45.0 * p_tan4 - 252.0 * e_p2
                        - 3.0 * c2));
    let lon = (d - d3 / 6.0 * (1.0 + 2.0 * p_tan2 + c)
        + d5 / 120.0 * (5.0 - 2.0 * c + 28.0 * p_tan2 - 3.0 * c2 + 8.0 * e_p2 + 24.0 * p_tan4))
        / p_cos;

    let central_lon = (utm.zone_number as f64 - 1.0) * 6.0 - 180.0 + 3.0;
    (lat.to_degrees(), lon.to_degrees() + central_lon)
}

fn zone_number_for(lat: f64, lon: f64) -> u8 {
    // Norway and Svalbard grid exceptions
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }
    if (72.0..84.0).contains(&lat) {
        if (0.0..9.0).contains(&lon) {
            return 31;
        } else if (9.0..21.0).contains(&lon) {
            return 33;
        } else if (21.0..33.0).contains(&lon) {
            return 35;
        } else if (33.0..42.0).contains(&lon) {
            return 37;
        }
    }
    (((lon + 180.0) / 6.0).floor() as u8) + 1
}

fn zone_letter_for(lat: f64) -> char {
    let clamped = lat.clamp(-80.0, 84.0);
    let index = ((clamped + 80.0) / 8.0).floor() as usize;
    ZONE_LETTERS[index.min(ZONE_LETTERS.len() - 1)] as char
}
