use crate::cli::ExtractArgs;
use crate::commands::{require_input, CommandContext};
use crate::config_loader::load_config;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::layout::PipelineLayout;
use crate::output::OutputWriter;
use crate::output_types::{DroppedInfo, ExtractOutput};
use crate::progress::{create_progress_bar, finish_success};
use anyhow::{Context, Result};
use glof_core::config::{CliConfigOverrides, LayeredConfig};
use glof_core::models::CatalogueEntry;
use glof_core::table;
use glof_geo::features::FeatureContext;
use glof_geo::glaciers::{read_glacier_inventory, GlacierIndex};
use glof_geo::imagery::{PreprocessOptions, QaMask, ReflectanceScale};
use glof_geo::manifest::ExtractionManifest;
use glof_geo::pipeline::{plan_jobs, run_extraction, write_lakes_geojson, ManifestScenes};
use std::collections::BTreeSet;
use tabled::Tabled;

pub fn execute(args: ExtractArgs, ctx: &CommandContext) -> Result<()> {
    let output = &ctx.output;
    let overrides = CliConfigOverrides { ndwi_threshold: args.ndwi_threshold, ..Default::default() };
    let config = load_config(ctx.config_path.as_deref(), overrides)?;
    require_input(&args.manifest, "extract <manifest.json>")?;
    let manifest = ExtractionManifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    let layout = PipelineLayout::new(&args.out_dir);

    if ctx.dry_run {
        return display_planned_actions(output, &plan(&manifest, &config, &layout));
    }

    let result = perform(&manifest, &config, &layout, output)?;

    if output.is_json() {
        return output.result(result);
    }
    output.success(format!(
        "Extracted {} records for {} lakes",
        result.records, result.lakes
    ));
    output.artifact("Feature table", &layout.features());
    output.artifact("Lake outlines", &layout.lakes());
    if result.scenes_excluded > 0 {
        output.warning(format!("{} scene(s) excluded from composites", result.scenes_excluded));
    }
    if !result.dropped.is_empty() {
        #[derive(Tabled)]
        struct DroppedRow {
            #[tabled(rename = "Lake")]
            lake_id: String,
            #[tabled(rename = "Year")]
            year: i32,
            #[tabled(rename = "Reason")]
            reason: String,
        }

        output.section("Dropped records");
        output.table(
            result
                .dropped
                .into_iter()
                .map(|d| DroppedRow { lake_id: d.lake_id, year: d.year, reason: d.reason })
                .collect(),
        );
    }
    Ok(())
}

pub(crate) fn plan(
    manifest: &ExtractionManifest,
    config: &LayeredConfig,
    layout: &PipelineLayout,
) -> Vec<PlannedAction> {
    let mut actions = vec![
        PlannedAction::read(&manifest.lake_inventory),
        PlannedAction::read(&manifest.glacier_inventory),
    ];
    if let Some(dem) = &manifest.dem {
        actions.push(PlannedAction::read(&dem.path));
    }
    actions.push(
        PlannedAction::new(ActionType::RunStage, "Composite scenes and extract lake features")
            .with_detail(format!("Scenes: {}", manifest.scenes.len()))
            .with_detail(format!("Reference years: {:?}", manifest.reference_years))
            .with_detail(format!("NDWI threshold: {}", config.ndwi_threshold.value)),
    );
    actions.push(PlannedAction::write(&layout.features()));
    actions.push(PlannedAction::write(&layout.lakes()));
    actions
}

/// Run the extraction stage and write the feature table and lake outlines
pub(crate) fn perform(
    manifest: &ExtractionManifest,
    config: &LayeredConfig,
    layout: &PipelineLayout,
    output: &OutputWriter,
) -> Result<ExtractOutput> {
    let catalogue: Vec<CatalogueEntry> = table::read_csv(&manifest.lake_inventory)
        .with_context(|| format!("Failed to read lake inventory {}", manifest.lake_inventory.display()))?;
    let glaciers = GlacierIndex::new(read_glacier_inventory(&manifest.glacier_inventory).with_context(
        || format!("Failed to read glacier inventory {}", manifest.glacier_inventory.display()),
    )?);
    let dem = manifest
        .dem
        .as_ref()
        .map(|source| source.load())
        .transpose()
        .context("Failed to load DEM")?;

    let features = FeatureContext::new(&glaciers, dem.as_ref(), config.glacier_search_radius_m.value);
    let options = PreprocessOptions {
        scale: ReflectanceScale::new(config.reflectance_gain.value, config.reflectance_offset.value),
        qa_mask: QaMask::landsat_c2(),
        ndwi_threshold: config.ndwi_threshold.value,
    };

    let jobs = plan_jobs(&catalogue, &manifest.reference_years);
    let lakes: BTreeSet<&str> = jobs.iter().map(|job| job.lake_id.as_str()).collect();
    let provider = ManifestScenes::new(&manifest.scenes);

    let pb = create_progress_bar(lakes.len() as u64, "Extracting lakes", output.is_json());
    let report = run_extraction(&jobs, &provider, &features, &options, &|_: &str| pb.inc(1))?;
    finish_success(&pb, &format!("Extracted {} lakes", lakes.len()));

    layout.ensure()?;
    table::write_records(layout.features(), &report.records)?;
    write_lakes_geojson(layout.lakes(), &report.polygons)?;

    Ok(ExtractOutput {
        lakes: lakes.len(),
        records: report.records.len(),
        dropped: report
            .dropped
            .into_iter()
            .map(|d| DroppedInfo { lake_id: d.lake_id, year: d.year, reason: d.reason })
            .collect(),
        scenes_excluded: report.scenes_excluded,
        features_path: layout.features().display().to_string(),
        lakes_path: layout.lakes().display().to_string(),
    })
}
