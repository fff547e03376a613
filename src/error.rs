//! Error types and exit codes for campus-atlas

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for campus-atlas operations
///
/// Every variant is fatal: the compiled graph feeds a public directory, so
/// a partially derived output is worse than a failed build. Degraded-but-
/// usable conditions (missing maps, childless aggregates, overlong short
/// names, unapplied patches) are logged as warnings instead.
#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("line {line}: indentation is not a multiple of two spaces")]
    BadIndentation { line: usize },

    #[error("line {line}: indentation increases by more than one level")]
    OrphanIndent { line: usize },

    #[error("line {line}: {reason}")]
    InvalidLineShape { line: usize, reason: String },

    #[error("line {line}: no id inferable (empty id field and no scalar building prefix)")]
    NoIdInferable { line: usize },

    #[error("buildings without coordinates after source merging: {ids:?}")]
    MissingBuildingCoordinate { ids: Vec<String> },

    #[error("entity '{id}' has {found} ancestors of type building, expected exactly one")]
    AmbiguousParentBuilding { id: String, found: usize },

    #[error("entity '{id}' references unknown parent '{parent}'")]
    MissingParent { id: String, parent: String },

    #[error("aggregate '{id}' has no building descendants to derive a coordinate from")]
    NoBuildingDescendants { id: String },

    #[error("entity '{id}' has a zero-valued coordinate component")]
    ZeroCoordinate { id: String },

    #[error("room '{id}' is {distance_m:.0} m away from its building '{building}' (limit {limit_m:.0} m)")]
    CoordinateDriftTooLarge {
        id: String,
        building: String,
        distance_m: f64,
        limit_m: f64,
    },

    #[error("building '{building}': unknown floor code '{code}'")]
    UnknownFloorCode { building: String, code: String },

    #[error("cannot infer a coordinate for entity '{id}' of type '{kind}'")]
    UnknownCoordinateInference { id: String, kind: String },

    #[error("duplicate custom map for building '{building}', floor '{floor}'")]
    DuplicateBuildingMapping { building: String, floor: String },

    #[error("entity '{id}': merged record does not bind to a typed entity: {message}")]
    InvalidRecord { id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AtlasError {
    /// Convert error to an exit code:
    /// - 0: Success
    /// - 1: IO / malformed input file
    /// - 2: Areatree syntax error
    /// - 3: Merge / binding error
    /// - 4: Derivation invariant violation
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::from(1),
            Self::BadIndentation { .. }
            | Self::OrphanIndent { .. }
            | Self::InvalidLineShape { .. }
            | Self::NoIdInferable { .. } => ExitCode::from(2),
            Self::InvalidRecord { .. } => ExitCode::from(3),
            _ => ExitCode::from(4),
        }
    }
}

/// Result type alias for campus-atlas operations
pub type Result<T> = std::result::Result<T, AtlasError>;
