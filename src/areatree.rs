//! AreaTree parser: the hand-authored hierarchy skeleton
//!
//! The areatree is an indentation-based description of the campus
//! hierarchy. Each line has the shape
//!
//! ```text
//! building-id(s):name(s):internal-id[,visible-id][type]
//! ```
//!
//! with two-space indentation encoding depth. `#` starts a comment, blank
//! lines are skipped. Any parse failure aborts the whole build; there is
//! no partial tree.

use indexmap::IndexMap;
use tracing::warn;

use crate::entity::{BPrefix, EntityKind};
use crate::error::{AtlasError, Result};
use crate::merge::RawGraph;
use crate::value::{Value, ValueMap};

/// Id of the single root entity every parent chain terminates at.
pub const ROOT_ID: &str = "root";

/// One parsed areatree line
#[derive(Debug, Clone, PartialEq)]
pub struct AreaTreeEntry {
    pub id: String,
    pub visible_id: Option<String>,
    pub kind: EntityKind,
    pub name: String,
    pub short_name: Option<String>,
    pub b_prefix: Option<BPrefix>,
    pub areatree_uncertain: bool,
    /// Ancestor stack snapshot at this line, root-exclusive, nearest last
    pub parents: Vec<String>,
}

/// Parse the areatree text into entity stubs, keyed by id.
pub fn parse(text: &str) -> Result<IndexMap<String, AreaTreeEntry>> {
    let mut entries: IndexMap<String, AreaTreeEntry> = IndexMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut prev_depth = 0usize;
    let mut prev_id: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw_line.split('#').next().unwrap_or("");
        if content.trim().is_empty() {
            continue;
        }

        let indent = content.len() - content.trim_start_matches(' ').len();
        if indent % 2 != 0 {
            return Err(AtlasError::BadIndentation { line });
        }
        let depth = indent / 2;

        if depth > prev_depth + 1 {
            return Err(AtlasError::OrphanIndent { line });
        } else if depth == prev_depth + 1 {
            match prev_id.take() {
                Some(parent) => stack.push(parent),
                None => return Err(AtlasError::OrphanIndent { line }),
            }
        } else {
            stack.truncate(depth);
        }

        let entry = parse_line(content.trim(), line, &stack)?;
        if entries.contains_key(&entry.id) {
            return Err(AtlasError::InvalidLineShape {
                line,
                reason: format!("duplicate id '{}'", entry.id),
            });
        }
        prev_id = Some(entry.id.clone());
        prev_depth = depth;
        entries.insert(entry.id.clone(), entry);
    }

    Ok(entries)
}

fn parse_line(content: &str, line: usize, stack: &[String]) -> Result<AreaTreeEntry> {
    let fields: Vec<&str> = content.split(':').collect();
    if fields.len() != 3 {
        return Err(AtlasError::InvalidLineShape {
            line,
            reason: format!(
                "expected exactly 3 colon-separated fields, got {}",
                fields.len()
            ),
        });
    }

    let (b_prefix, areatree_uncertain) = parse_building_field(fields[0].trim());
    let (name, short_name) = parse_name_field(fields[1].trim(), line)?;
    let (id, visible_id, explicit_kind) = parse_id_field(fields[2].trim(), &b_prefix, line)?;

    let kind = explicit_kind.unwrap_or_else(|| match &b_prefix {
        Some(BPrefix::One(prefix)) if *prefix == id => EntityKind::Building,
        _ => EntityKind::Area,
    });

    Ok(AreaTreeEntry {
        id,
        visible_id,
        kind,
        name,
        short_name,
        b_prefix,
        areatree_uncertain,
        parents: stack.to_vec(),
    })
}

fn parse_building_field(field: &str) -> (Option<BPrefix>, bool) {
    let uncertain = field.starts_with('-');
    let field = field.strip_prefix('-').unwrap_or(field);
    let b_prefix = if field.is_empty() {
        None
    } else if field.contains(',') {
        Some(BPrefix::Many(
            field.split(',').map(|s| s.trim().to_string()).collect(),
        ))
    } else {
        Some(BPrefix::One(field.to_string()))
    };
    (b_prefix, uncertain)
}

fn parse_name_field(field: &str, line: usize) -> Result<(String, Option<String>)> {
    let parts: Vec<&str> = field.split('|').collect();
    match parts.as_slice() {
        [name] => Ok((name.to_string(), None)),
        [name, short] => {
            if short.chars().count() > 20 {
                warn!(line, short_name = %short, "short name longer than 20 characters");
            }
            Ok((name.to_string(), Some(short.to_string())))
        }
        _ => Err(AtlasError::InvalidLineShape {
            line,
            reason: "name field has more than two '|' parts".to_string(),
        }),
    }
}

fn parse_id_field(
    field: &str,
    b_prefix: &Option<BPrefix>,
    line: usize,
) -> Result<(String, Option<String>, Option<EntityKind>)> {
    let (rest, explicit_kind) = match (field.rfind('['), field.ends_with(']')) {
        (Some(start), true) => {
            let type_str = &field[start + 1..field.len() - 1];
            let kind = EntityKind::parse_str(type_str).ok_or_else(|| {
                AtlasError::InvalidLineShape {
                    line,
                    reason: format!("unknown entity type '{type_str}'"),
                }
            })?;
            (&field[..start], Some(kind))
        }
        _ => (field, None),
    };

    if rest.is_empty() {
        return match b_prefix {
            Some(BPrefix::One(prefix)) => Ok((prefix.clone(), None, explicit_kind)),
            _ => Err(AtlasError::NoIdInferable { line }),
        };
    }

    match rest.split_once(',') {
        Some((id, visible)) => Ok((
            id.trim().to_string(),
            Some(visible.trim().to_string()),
            explicit_kind,
        )),
        None => Ok((rest.to_string(), None, explicit_kind)),
    }
}

/// Convert parsed entries into seed records for the source merger.
///
/// Creates the single root entity, prepends `root` to every parent chain
/// and stamps the areatree itself as the first provenance entry. The
/// returned records are the base every source overlay merges onto.
pub fn seed_records(entries: &IndexMap<String, AreaTreeEntry>) -> RawGraph {
    let mut graph = RawGraph::new();

    let mut root = ValueMap::new();
    root.insert("id".into(), Value::Str(ROOT_ID.into()));
    root.insert("type".into(), Value::Str("root".into()));
    root.insert("name".into(), Value::Str("Locations".into()));
    root.insert("parents".into(), Value::List(vec![]));
    graph.insert(ROOT_ID.to_string(), root);

    for entry in entries.values() {
        let mut record = ValueMap::new();
        record.insert("id".into(), Value::Str(entry.id.clone()));
        record.insert("type".into(), Value::Str(entry.kind.as_str().into()));
        record.insert("name".into(), Value::Str(entry.name.clone()));
        if let Some(short) = &entry.short_name {
            record.insert("short_name".into(), Value::Str(short.clone()));
        }
        if let Some(visible) = &entry.visible_id {
            record.insert("visible_id".into(), Value::Str(visible.clone()));
        }
        match &entry.b_prefix {
            Some(BPrefix::One(prefix)) => {
                record.insert("b_prefix".into(), Value::Str(prefix.clone()));
            }
            Some(BPrefix::Many(prefixes)) => {
                record.insert(
                    "b_prefix".into(),
                    Value::List(prefixes.iter().cloned().map(Value::Str).collect()),
                );
            }
            None => {}
        }

        let mut parents = vec![Value::Str(ROOT_ID.into())];
        parents.extend(entry.parents.iter().cloned().map(Value::Str));
        record.insert("parents".into(), Value::List(parents));

        if entry.areatree_uncertain {
            let mut quality = ValueMap::new();
            quality.insert("areatree_uncertain".into(), Value::Bool(true));
            record.insert("data_quality".into(), Value::Map(quality));
        }

        let mut source = ValueMap::new();
        source.insert("name".into(), Value::Str("areatree".into()));
        let mut sources = ValueMap::new();
        sources.insert("base".into(), Value::List(vec![Value::Map(source)]));
        record.insert("sources".into(), Value::Map(sources));

        graph.insert(entry.id.clone(), record);
    }

    graph
}
