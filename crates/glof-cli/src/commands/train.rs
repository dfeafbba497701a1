use crate::cli::TrainArgs;
use crate::commands::{require_input, CommandContext};
use crate::config_loader::load_config;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::layout::PipelineLayout;
use crate::output::OutputWriter;
use crate::output_types::TrainOutput;
use crate::progress::{create_spinner, finish_error, finish_success};
use anyhow::{Context, Result};
use glof_core::config::{parse_selection_metric, CliConfigOverrides, LayeredConfig};
use glof_core::table;
use glof_model::{train_and_select, Dataset, TrainerOptions};
use std::path::Path;
use tabled::Tabled;

pub fn execute(args: TrainArgs, ctx: &CommandContext) -> Result<()> {
    let output = &ctx.output;
    let overrides = CliConfigOverrides {
        test_fraction: args.test_fraction,
        selection_metric: args.metric.as_deref().map(parse_selection_metric).transpose()?,
        seed: args.seed,
        ..Default::default()
    };
    let config = load_config(ctx.config_path.as_deref(), overrides)?;
    let layout = PipelineLayout::new(&args.out_dir);
    let table_path = args.table.clone().unwrap_or_else(|| layout.imputed());
    require_input(&table_path, "impute")?;

    if ctx.dry_run {
        let actions = vec![
            PlannedAction::read(&table_path),
            PlannedAction::new(ActionType::RunStage, "Fit and compare classifiers")
                .with_detail("Models: logistic_regression, random_forest, gradient_boosting, support_vector")
                .with_detail(format!("Test fraction: {}", config.test_fraction.value))
                .with_detail(format!("Selection metric: {}", config.selection_metric.value)),
            PlannedAction::write(&layout.model()),
        ];
        return display_planned_actions(output, &actions);
    }

    let result = perform(&table_path, &config, &layout, output)?;
    if output.is_json() {
        return output.result(result);
    }
    show(output, &result);
    Ok(())
}

pub(crate) fn show(output: &OutputWriter, result: &TrainOutput) {
    #[derive(Tabled)]
    struct ScoreRow {
        #[tabled(rename = "Model")]
        model: String,
        #[tabled(rename = "ROC AUC")]
        roc_auc: String,
        #[tabled(rename = "F1")]
        f1: String,
        #[tabled(rename = "Precision")]
        precision: String,
        #[tabled(rename = "Recall")]
        recall: String,
    }

    output.section("Held-out evaluation");
    output.table(
        result
            .scores
            .iter()
            .map(|s| ScoreRow {
                model: s.kind.to_string(),
                roc_auc: format!("{:.3}", s.evaluation.roc_auc),
                f1: format!("{:.3}", s.evaluation.f1),
                precision: format!("{:.3}", s.evaluation.precision),
                recall: format!("{:.3}", s.evaluation.recall),
            })
            .collect(),
    );
    output.success(format!(
        "Selected {} by {} ({} train / {} test rows)",
        result.selected, result.selection_metric, result.train_rows, result.test_rows
    ));
    output.kv("Model", &result.model_path);
}

/// Train on the imputed table and save the selected model
pub(crate) fn perform(
    table_path: &Path,
    config: &LayeredConfig,
    layout: &PipelineLayout,
    output: &OutputWriter,
) -> Result<TrainOutput> {
    let records = table::read_records(table_path)
        .with_context(|| format!("Failed to read {}", table_path.display()))?;
    let dataset = Dataset::from_records(&records)?;

    let options = TrainerOptions {
        test_fraction: config.test_fraction.value,
        seed: config.seed.value,
        selection_metric: config.selection_metric.value,
    };
    let spinner = create_spinner("Training classifiers...", output.is_json());
    let artifact = match train_and_select(&dataset, &options) {
        Ok(artifact) => artifact,
        Err(error) => {
            finish_error(&spinner, "Training failed");
            return Err(error.into());
        }
    };
    finish_success(&spinner, &format!("Trained {} models", artifact.scores.len()));

    layout.ensure()?;
    artifact.save(layout.model())?;

    Ok(TrainOutput {
        selected: artifact.kind.to_string(),
        selection_metric: artifact.selection_metric.to_string(),
        train_rows: artifact.train_rows,
        test_rows: artifact.test_rows,
        scores: artifact.scores.clone(),
        model_path: layout.model().display().to_string(),
    })
}
