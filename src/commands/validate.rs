//! `validate` command: run the pipeline without writing output

use std::fmt::Write as _;

use crate::cli::ValidateArgs;
use crate::entity::EntityKind;
use crate::error::Result;
use crate::input::InputSet;
use crate::pipeline;

pub fn run(args: &ValidateArgs) -> Result<String> {
    let inputs = InputSet::discover(&args.data_dir);
    let translator = inputs.load_translations()?;

    let (graph, report) = pipeline::compile(&inputs, &translator)?;

    let mut counts: Vec<(EntityKind, usize)> = Vec::new();
    for entity in graph.iter() {
        match counts.iter_mut().find(|(kind, _)| *kind == entity.kind) {
            Some((_, n)) => *n += 1,
            None => counts.push((entity.kind, 1)),
        }
    }

    let mut out = String::new();
    writeln!(out, "valid: {} entities", report.n_entities).ok();
    for (kind, n) in counts {
        writeln!(out, "  {kind}: {n}").ok();
    }
    writeln!(
        out,
        "  created by sources: {}, dropped as outdated-only: {}",
        report.n_created_by_sources, report.n_dropped_outdated
    )
    .ok();

    let missing = translator.missing_keys();
    if !missing.is_empty() {
        writeln!(out, "missing translations ({}):", missing.len()).ok();
        for key in missing {
            writeln!(out, "  {key}").ok();
        }
    }
    Ok(out)
}
