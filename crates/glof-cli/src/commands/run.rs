use crate::cli::RunArgs;
use crate::commands::{extract, impute, label, require_input, score, train, CommandContext};
use crate::config_loader::load_config;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::errors::pending_review;
use crate::layout::PipelineLayout;
use crate::output_types::RunOutput;
use anyhow::{Context, Result};
use glof_core::config::CliConfigOverrides;
use glof_geo::manifest::ExtractionManifest;

pub fn execute(args: RunArgs, ctx: &CommandContext) -> Result<()> {
    let output = &ctx.output;
    let config = load_config(ctx.config_path.as_deref(), CliConfigOverrides::default())?;
    require_input(&args.manifest, "run <manifest.json>")?;
    if let Some(path) = &args.adjudications {
        require_input(path, "run <manifest.json> --adjudications <decisions.csv>")?;
    }
    let manifest = ExtractionManifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    let layout = PipelineLayout::new(&args.out_dir);

    if ctx.dry_run {
        let mut actions = extract::plan(&manifest, &config, &layout);
        actions.push(PlannedAction::new(ActionType::RunStage, "Label records against the catalogue"));
        actions.push(PlannedAction::write(&layout.labelled()));
        actions.push(
            PlannedAction::new(ActionType::RunStage, "Impute each partition")
                .with_detail(format!("Iterations: {}", config.imputation_iterations.value)),
        );
        actions.push(PlannedAction::write(&layout.imputed()));
        actions.push(
            PlannedAction::new(ActionType::RunStage, "Fit and compare classifiers")
                .with_detail(format!("Selection metric: {}", config.selection_metric.value)),
        );
        actions.push(PlannedAction::write(&layout.model()));
        if args.score {
            actions.push(PlannedAction::write(&layout.risk_csv()));
            actions.push(PlannedAction::write(&layout.risk_geojson()));
        }
        return display_planned_actions(output, &actions);
    }

    output.section("Extract");
    let extracted = extract::perform(&manifest, &config, &layout, output)?;
    output.success(format!("{} records for {} lakes", extracted.records, extracted.lakes));

    output.section("Label");
    let labelled = label::perform(
        &layout.features(),
        &manifest.lake_inventory,
        args.adjudications.as_deref(),
        config.match_tolerance_m.value,
        &layout,
    )?;
    output.success(format!(
        "{} positive, {} negative",
        labelled.positives, labelled.negatives
    ));
    if labelled.pending_review > 0 {
        return Err(pending_review(labelled.pending_review, &layout.review()).into());
    }

    output.section("Impute");
    let imputed = impute::perform(&config, &layout)?;
    output.success(format!(
        "Filled {} cell(s)",
        imputed.positive.filled_cells + imputed.negative.filled_cells
    ));

    let trained = train::perform(&layout.imputed(), &config, &layout, output)?;
    train::show(output, &trained);

    let scored = if args.score {
        output.section("Score");
        let scored = score::perform(&layout.model(), &layout.imputed(), &layout)?;
        output.success(format!("Scored {} lake-years", scored.scored));
        Some(scored)
    } else {
        None
    };

    if output.is_json() {
        return output.result(RunOutput {
            extract: extracted,
            label: labelled,
            impute: imputed,
            train: trained,
            score: scored,
        });
    }
    output.info(format!("Pipeline outputs are in {}", layout.root().display()));
    Ok(())
}
