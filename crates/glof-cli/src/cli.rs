use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GLOF - Glacial lake outburst flood susceptibility pipeline
#[derive(Parser, Debug)]
#[command(name = "glof")]
#[command(about = "Glacial lake outburst flood susceptibility pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Show planned actions without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Configuration file (defaults to the nearest glof.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the feature table from scenes, glaciers and the DEM
    Extract(ExtractArgs),

    /// Label records against the event catalogue and write partitions
    Label(LabelArgs),

    /// Fill missing features in the positive and negative partitions
    Impute(ImputeArgs),

    /// Compare classifiers and save the best one
    Train(TrainArgs),

    /// Score lakes with a saved model
    Score(ScoreArgs),

    /// Run extract, label, impute and train in sequence
    Run(RunArgs),

    /// Show the resolved configuration and where each value came from
    Config,
}

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Extraction manifest (JSON)
    pub manifest: PathBuf,

    /// Directory for pipeline outputs
    #[arg(long, default_value = "glof-output")]
    pub out_dir: PathBuf,

    /// NDWI water threshold
    #[arg(long)]
    pub ndwi_threshold: Option<f64>,
}

#[derive(Parser, Debug)]
pub struct LabelArgs {
    /// Lake inventory / event catalogue (CSV)
    #[arg(long)]
    pub catalogue: PathBuf,

    /// Feature table to label (defaults to <out-dir>/features.csv)
    #[arg(long)]
    pub features: Option<PathBuf>,

    /// Human decisions for flagged records (CSV: lake_id, Year_final, GLOF)
    #[arg(long)]
    pub adjudications: Option<PathBuf>,

    /// Directory for pipeline outputs
    #[arg(long, default_value = "glof-output")]
    pub out_dir: PathBuf,

    /// Spatial match tolerance in metres
    #[arg(long)]
    pub match_tolerance: Option<f64>,
}

#[derive(Parser, Debug)]
pub struct ImputeArgs {
    /// Directory for pipeline outputs
    #[arg(long, default_value = "glof-output")]
    pub out_dir: PathBuf,

    /// Chained-equation rounds
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct TrainArgs {
    /// Directory for pipeline outputs
    #[arg(long, default_value = "glof-output")]
    pub out_dir: PathBuf,

    /// Training table (defaults to <out-dir>/imputed.csv)
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// Held-out fraction
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Selection metric (roc_auc or f1)
    #[arg(long)]
    pub metric: Option<String>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Directory for pipeline outputs
    #[arg(long, default_value = "glof-output")]
    pub out_dir: PathBuf,

    /// Model artifact (defaults to <out-dir>/model.json)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Records to score (defaults to <out-dir>/imputed.csv)
    #[arg(long)]
    pub table: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Extraction manifest (JSON)
    pub manifest: PathBuf,

    /// Directory for pipeline outputs
    #[arg(long, default_value = "glof-output")]
    pub out_dir: PathBuf,

    /// Human decisions for flagged records
    #[arg(long)]
    pub adjudications: Option<PathBuf>,

    /// Also score every lake once the model is trained
    #[arg(long)]
    pub score: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["glof", "impute", "--json", "--dry-run", "--seed", "3"]);
        assert!(cli.json);
        assert!(cli.dry_run);
        let Commands::Impute(args) = cli.command else {
            panic!("expected impute");
        };
        assert_eq!(args.seed, Some(3));
        assert_eq!(args.out_dir, PathBuf::from("glof-output"));
    }
}
