//! TestCampus builder for integration tests
//!
//! Creates a temporary data directory with the conventional layout and
//! runs the pipeline in-process. Tests use tempfile fixtures instead of
//! checked-in data directories.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use campus_atlas::pipeline::CompileReport;
use campus_atlas::{compile, EntityGraph, InputSet, Result, TranslationTable};

/// Builder for a test data directory
pub struct TestCampus {
    dir: TempDir,
}

impl TestCampus {
    /// Create a new empty data directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Get the path to the data directory root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Add a file with the given content.
    pub fn add_file(&self, relative_path: &str, content: &str) -> &Self {
        let full_path = self.dir.path().join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        self
    }

    pub fn add_areatree(&self, content: &str) -> &Self {
        self.add_file("areatree.txt", content)
    }

    pub fn add_source(&self, name: &str, json: serde_json::Value) -> &Self {
        self.add_file(
            &format!("sources/{name}.json"),
            &serde_json::to_string_pretty(&json).unwrap(),
        )
    }

    pub fn add_patches(&self, yaml: &str) -> &Self {
        self.add_file("patches.yaml", yaml)
    }

    pub fn add_overlays(&self, yaml: &str) -> &Self {
        self.add_file("overlays.yaml", yaml)
    }

    pub fn add_generic_maps(&self, yaml: &str) -> &Self {
        self.add_file("maps/roomfinder.yaml", yaml)
    }

    pub fn add_custom_maps(&self, yaml: &str) -> &Self {
        self.add_file("maps/custom.yaml", yaml)
    }

    pub fn add_translations(&self, yaml: &str) -> &Self {
        self.add_file("translations.yaml", yaml)
    }

    /// Run the full pipeline over this data directory.
    pub fn compile(&self) -> Result<(EntityGraph, CompileReport)> {
        let inputs = InputSet::discover(self.path());
        let translator = inputs.load_translations()?;
        compile(&inputs, &translator)
    }

    /// Run the pipeline and panic on failure.
    pub fn compile_ok(&self) -> EntityGraph {
        match self.compile() {
            Ok((graph, _)) => graph,
            Err(e) => panic!("pipeline failed: {e}"),
        }
    }

    /// Run the pipeline, expecting an error.
    pub fn compile_err(&self) -> campus_atlas::AtlasError {
        match self.compile() {
            Ok(_) => panic!("pipeline unexpectedly succeeded"),
            Err(e) => e,
        }
    }
}

impl Default for TestCampus {
    fn default() -> Self {
        Self::new()
    }
}

/// A small but fully populated campus: one site, two plain buildings,
/// one joined building with two parts, rooms across several floors.
pub fn standard_campus() -> TestCampus {
    let campus = TestCampus::new();
    campus.add_areatree(
        "\
# City campus of the test university
:City Campus|City:city[site]
  0101:Main Building|MB:0101
  0102:Library:0102
  5401,5402:Chemistry:chem,CH[joined_building]
    5401:Chemistry I:5401
    5402:Chemistry II:5402
",
    );
    campus.add_source(
        "timetable",
        serde_json::json!({
            "0101": {
                "coords": { "lat": 48.1490, "lon": 11.5670, "source": "timetable" },
                "props": { "address": { "street": "Arcisstr. 21", "zip": "80333", "city": "Munich" } }
            },
            "0102": {
                "coords": { "lat": 48.1510, "lon": 11.5690, "source": "timetable" }
            },
            "5401": {
                "coords": { "lat": 48.1475, "lon": 11.5655, "source": "timetable" }
            },
            "5402": {
                "coords": { "lat": 48.1478, "lon": 11.5660, "source": "timetable" }
            },
            "0101.EG.001": {
                "type": "room",
                "name": "Lecture Hall 1",
                "parents": ["0101"],
                "props": { "floor_raw": "EG", "seats": 740 },
                "usage": { "name": "Lecture hall", "din_277": "NF5.1" }
            },
            "0101.1.101": {
                "type": "room",
                "name": "Seminar Room 101",
                "parents": ["0101"],
                "props": { "floor_raw": "1", "seats": 30 },
                "usage": { "name": "Seminar room", "din_277": "NF5.2" }
            },
            "0101.U1.001": {
                "type": "room",
                "name": "Archive",
                "parents": ["0101"],
                "props": { "floor_raw": "U1" },
                "usage": { "name": "Storage", "din_277": "NF4.1" }
            },
            "0101.EG.090": {
                "type": "room",
                "name": "Main Corridor",
                "parents": ["0101"],
                "props": { "floor_raw": "EG" },
                "usage": { "name": "Corridor", "din_277": "VF9.1" }
            },
            "5401.EG.010": {
                "type": "room",
                "name": "Organic Chemistry Lab",
                "parents": ["5401"],
                "props": { "floor_raw": "EG" },
                "usage": { "name": "Laboratory", "din_277": "NF3.4" }
            },
            "5402.1.020": {
                "type": "room",
                "name": "Inorganic Chemistry Lab",
                "parents": ["5402"],
                "props": { "floor_raw": "1" },
                "usage": { "name": "Laboratory", "din_277": "NF3.4" }
            }
        }),
    );
    campus.add_generic_maps(
        "\
- id: city-2000
  name: City Campus 1:2000
  scale: 2000
  width: 1024
  height: 768
  latlonbox:
    north: 48.1600
    south: 48.1400
    east: 11.5800
    west: 11.5600
    rotation: 0.0
- id: region-10000
  name: Munich Region 1:10000
  scale: 10000
  width: 2048
  height: 1536
  latlonbox:
    north: 48.2500
    south: 48.0500
    east: 11.7000
    west: 11.4000
    rotation: 0.0
",
    );
    campus
}
