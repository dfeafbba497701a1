use crate::cli::ScoreArgs;
use crate::commands::{require_input, CommandContext};
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::layout::PipelineLayout;
use crate::output_types::ScoreOutput;
use anyhow::{Context, Result};
use glof_core::table;
use glof_model::scoring::{score_records, write_scores_csv, write_scores_geojson};
use glof_model::ModelArtifact;
use std::path::Path;

pub fn execute(args: ScoreArgs, ctx: &CommandContext) -> Result<()> {
    let output = &ctx.output;
    let layout = PipelineLayout::new(&args.out_dir);
    let model_path = args.model.clone().unwrap_or_else(|| layout.model());
    let table_path = args.table.clone().unwrap_or_else(|| layout.imputed());
    require_input(&model_path, "train")?;
    require_input(&table_path, "impute")?;

    if ctx.dry_run {
        let actions = vec![
            PlannedAction::read(&model_path),
            PlannedAction::read(&table_path),
            PlannedAction::new(ActionType::RunStage, "Score lakes with the saved model"),
            PlannedAction::write(&layout.risk_csv()),
            PlannedAction::write(&layout.risk_geojson()),
        ];
        return display_planned_actions(output, &actions);
    }

    let result = perform(&model_path, &table_path, &layout)?;
    if output.is_json() {
        return output.result(result);
    }
    output.success(format!("Scored {} lake-years", result.scored));
    if result.skipped > 0 {
        output.warning(format!("{} record(s) skipped for missing features", result.skipped));
    }
    output.artifact("Risk table", &layout.risk_csv());
    output.artifact("Risk map", &layout.risk_geojson());
    Ok(())
}

pub(crate) fn perform(model_path: &Path, table_path: &Path, layout: &PipelineLayout) -> Result<ScoreOutput> {
    let artifact = ModelArtifact::load(model_path)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;
    let records = table::read_records(table_path)
        .with_context(|| format!("Failed to read {}", table_path.display()))?;

    let report = score_records(&artifact, &records)?;

    layout.ensure()?;
    write_scores_csv(layout.risk_csv(), &report.scores)?;
    write_scores_geojson(layout.risk_geojson(), &report.scores)?;

    Ok(ScoreOutput {
        scored: report.scores.len(),
        skipped: report.skipped,
        csv_path: layout.risk_csv().display().to_string(),
        geojson_path: layout.risk_geojson().display().to_string(),
    })
}
