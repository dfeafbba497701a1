use crate::cli::LabelArgs;
use crate::commands::{require_input, CommandContext};
use crate::config_loader::load_config;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::errors::pending_review;
use crate::layout::PipelineLayout;
use crate::output_types::LabelOutput;
use anyhow::{Context, Result};
use glof_core::config::CliConfigOverrides;
use glof_core::models::{Adjudication, CatalogueEntry, LakeRecord};
use glof_core::table::{self, partition_by_label, FeatureMatrix};
use glof_geo::labels::{apply_adjudications, LabelAssembler};
use std::fs;
use std::path::Path;

pub fn execute(args: LabelArgs, ctx: &CommandContext) -> Result<()> {
    let output = &ctx.output;
    let overrides = CliConfigOverrides { match_tolerance_m: args.match_tolerance, ..Default::default() };
    let config = load_config(ctx.config_path.as_deref(), overrides)?;
    let layout = PipelineLayout::new(&args.out_dir);
    let features = args.features.clone().unwrap_or_else(|| layout.features());

    require_input(&features, "extract <manifest.json>")?;
    require_input(&args.catalogue, "label --catalogue <inventory.csv>")?;
    if let Some(path) = &args.adjudications {
        require_input(path, "label --adjudications <decisions.csv>")?;
    }

    if ctx.dry_run {
        let mut actions = vec![PlannedAction::read(&features), PlannedAction::read(&args.catalogue)];
        if let Some(path) = &args.adjudications {
            actions.push(PlannedAction::read(path));
        }
        actions.push(
            PlannedAction::new(ActionType::RunStage, "Match records against the catalogue")
                .with_detail(format!("Match tolerance: {} m", config.match_tolerance_m.value)),
        );
        actions.extend([
            PlannedAction::write(&layout.labelled()),
            PlannedAction::write(&layout.positive()),
            PlannedAction::write(&layout.negative()),
        ]);
        return display_planned_actions(output, &actions);
    }

    let result = perform(
        &features,
        &args.catalogue,
        args.adjudications.as_deref(),
        config.match_tolerance_m.value,
        &layout,
    )?;

    if output.is_json() {
        output.result(&result)?;
    } else {
        output.success(format!(
            "Labelled {} positive and {} negative records",
            result.positives, result.negatives
        ));
        output.kv("Unmatched (labelled 0)", result.unmatched);
        if result.adjudicated > 0 {
            output.kv("Adjudicated", result.adjudicated);
        }
        output.artifact("Labelled table", &layout.labelled());
        output.artifact("Positive partition", &layout.positive());
        output.artifact("Negative partition", &layout.negative());
        if result.review_path.is_some() {
            output.artifact("Review queue", &layout.review());
        }
    }

    if result.pending_review > 0 {
        return Err(pending_review(result.pending_review, &layout.review()).into());
    }
    Ok(())
}

/// Label, apply adjudications and, once nothing awaits review, partition
pub(crate) fn perform(
    features: &Path,
    catalogue: &Path,
    adjudications: Option<&Path>,
    tolerance_m: f64,
    layout: &PipelineLayout,
) -> Result<LabelOutput> {
    let mut records = table::read_records(features)
        .with_context(|| format!("Failed to read feature table {}", features.display()))?;
    let catalogue: Vec<CatalogueEntry> = table::read_csv(catalogue)
        .with_context(|| format!("Failed to read catalogue {}", catalogue.display()))?;

    let assembler = LabelAssembler::new(&catalogue, tolerance_m)?;
    let report = assembler.assemble(&mut records);

    let adjudicated = match adjudications {
        Some(path) => {
            let decisions: Vec<Adjudication> = table::read_csv(path)
                .with_context(|| format!("Failed to read adjudications {}", path.display()))?;
            apply_adjudications(&mut records, &decisions)?
        }
        None => 0,
    };

    layout.ensure()?;
    table::write_records(layout.labelled(), &records)?;

    let still_flagged = |lake_id: &str, year: i32| {
        records.iter().any(|r| r.needs_review && r.lake_id == lake_id && r.year == year)
    };
    let open_items: Vec<_> =
        report.review.iter().filter(|item| still_flagged(&item.lake_id, item.year)).cloned().collect();
    let pending = records.iter().filter(|r| r.needs_review).count();

    let review_path = if open_items.is_empty() {
        if layout.review().exists() {
            fs::remove_file(layout.review())?;
        }
        None
    } else {
        table::write_csv(layout.review(), &open_items)?;
        Some(layout.review().display().to_string())
    };

    let partitions_written = pending == 0;
    if partitions_written {
        let (positive, negative) = partition_by_label(&records)?;
        FeatureMatrix::from_records(&positive).write_partition(layout.positive())?;
        FeatureMatrix::from_records(&negative).write_partition(layout.negative())?;
    }

    let count = |value: u8| records.iter().filter(|r: &&LakeRecord| r.glof == Some(value)).count();
    Ok(LabelOutput {
        positives: count(1),
        negatives: count(0),
        unmatched: report.unmatched,
        adjudicated,
        pending_review: pending,
        labelled_path: layout.labelled().display().to_string(),
        review_path,
        partitions_written,
    })
}
