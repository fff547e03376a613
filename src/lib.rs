//! campus-atlas: campus location directory compiler
//!
//! Builds a single consistent hierarchical directory of campus locations
//! (sites, campuses, areas, buildings, rooms, points of interest) by
//! fusing several independently-sourced, structurally inconsistent
//! datasets into one entity graph, then deriving the attributes that are
//! missing or contradictory across sources: coordinates, floor catalogs,
//! map placements, search rank and structural statistics.
//!
//! # Pipeline
//!
//! ```text
//! areatree skeleton
//!     -> source merges (patches, timetable, natdir, roomfinder, overlays)
//!     -> outdated-source exclusion
//!     -> typed binding
//!     -> children / stats derivation
//!     -> coordinate resolution (geodetic <-> UTM, drift validation)
//!     -> floor inference          -> map assignment
//!     -> ranking
//! ```
//!
//! Each stage is a total pass over the shared [`entity::EntityGraph`];
//! any invariant violation aborts the whole batch. The populated graph is
//! the handoff artifact for the exporter.

pub mod areatree;
pub mod cli;
pub mod commands;
pub mod coords;
pub mod entity;
pub mod error;
pub mod floors;
pub mod input;
pub mod maps;
pub mod merge;
pub mod pipeline;
pub mod ranking;
pub mod structure;
pub mod translate;
pub mod value;

// Re-export commonly used types
pub use cli::{Cli, Commands};
pub use entity::{Entity, EntityGraph, EntityKind};
pub use error::{AtlasError, Result};
pub use input::InputSet;
pub use pipeline::{compile, CompileReport};
pub use translate::{TranslationService, TranslationTable};
pub use value::{Localized, Value};
