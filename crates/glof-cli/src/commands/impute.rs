use crate::cli::ImputeArgs;
use crate::commands::{require_input, CommandContext};
use crate::config_loader::load_config;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::layout::PipelineLayout;
use crate::output_types::ImputeOutput;
use crate::progress::{create_spinner, finish_error, finish_success};
use anyhow::{Context, Result};
use glof_core::config::{CliConfigOverrides, LayeredConfig};
use glof_core::table::{self, partition_by_label, FeatureMatrix};
use glof_model::MiceImputer;

pub fn execute(args: ImputeArgs, ctx: &CommandContext) -> Result<()> {
    let output = &ctx.output;
    let overrides = CliConfigOverrides {
        imputation_iterations: args.iterations,
        seed: args.seed,
        ..Default::default()
    };
    let config = load_config(ctx.config_path.as_deref(), overrides)?;
    let layout = PipelineLayout::new(&args.out_dir);

    for path in [layout.labelled(), layout.positive(), layout.negative()] {
        require_input(&path, "label --catalogue <inventory.csv>")?;
    }

    if ctx.dry_run {
        let actions = vec![
            PlannedAction::read(&layout.labelled()),
            PlannedAction::read(&layout.positive()),
            PlannedAction::read(&layout.negative()),
            PlannedAction::new(ActionType::RunStage, "Impute each partition by chained equations")
                .with_detail(format!("Iterations: {}", config.imputation_iterations.value))
                .with_detail(format!("Seed: {}", config.seed.value)),
            PlannedAction::write(&layout.positive_imputed()),
            PlannedAction::write(&layout.negative_imputed()),
            PlannedAction::write(&layout.imputed()),
        ];
        return display_planned_actions(output, &actions);
    }

    let spinner = create_spinner("Imputing partitions...", output.is_json());
    let result = match perform(&config, &layout) {
        Ok(result) => result,
        Err(error) => {
            finish_error(&spinner, "Imputation failed");
            return Err(error);
        }
    };
    finish_success(
        &spinner,
        &format!(
            "Filled {} cell(s)",
            result.positive.filled_cells + result.negative.filled_cells
        ),
    );

    if output.is_json() {
        return output.result(result);
    }
    output.kv("Positive partition", format!(
        "{} rows, {} cells filled",
        result.positive.rows, result.positive.filled_cells
    ));
    output.kv("Negative partition", format!(
        "{} rows, {} cells filled",
        result.negative.rows, result.negative.filled_cells
    ));
    output.artifact("Imputed table", &layout.imputed());
    Ok(())
}

/// Impute both partitions and write them plus the combined labelled table
pub(crate) fn perform(config: &LayeredConfig, layout: &PipelineLayout) -> Result<ImputeOutput> {
    let mut records = table::read_records(layout.labelled())
        .with_context(|| format!("Failed to read {}", layout.labelled().display()))?;
    // Refuses while anything awaits review
    partition_by_label(&records)?;

    let positive = FeatureMatrix::read_partition(layout.positive())?;
    let negative = FeatureMatrix::read_partition(layout.negative())?;

    let imputer = MiceImputer::new(config.imputation_iterations.value, config.seed.value);
    let imputed = imputer
        .impute_partitions(&positive, &negative)
        .context("Failed to impute partitions")?;

    imputed.positive.write_partition(layout.positive_imputed())?;
    imputed.negative.write_partition(layout.negative_imputed())?;

    imputed.positive.apply_to_records(&mut records)?;
    imputed.negative.apply_to_records(&mut records)?;
    table::write_records(layout.imputed(), &records)?;

    Ok(ImputeOutput {
        positive: imputed.positive_summary,
        negative: imputed.negative_summary,
        imputed_path: layout.imputed().display().to_string(),
    })
}
