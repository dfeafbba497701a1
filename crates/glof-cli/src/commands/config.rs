use crate::commands::CommandContext;
use crate::config_loader::{find_config_file, load_config};
use crate::output_types::{ConfigEntry, ConfigOutput};
use anyhow::Result;
use glof_core::config::CliConfigOverrides;
use tabled::Tabled;

pub fn execute(ctx: &CommandContext) -> Result<()> {
    let output = &ctx.output;
    let config_file = find_config_file(ctx.config_path.as_deref())?;
    let config = load_config(ctx.config_path.as_deref(), CliConfigOverrides::default())?;
    let map = config.to_inspection_map();

    if output.is_json() {
        let values = map
            .into_iter()
            .map(|(key, (value, source))| (key, ConfigEntry { value, source: format!("{:?}", source) }))
            .collect();
        return output.result(ConfigOutput {
            config_file: config_file.map(|p| p.display().to_string()),
            values,
        });
    }

    #[derive(Tabled)]
    struct ConfigRow {
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    output.section("Configuration");
    match &config_file {
        Some(path) => output.kv("Config file", path.display()),
        None => output.kv("Config file", "(none, using defaults)"),
    }
    let rows = map
        .into_iter()
        .map(|(key, (value, source))| ConfigRow { key, value, source: format!("{:?}", source) })
        .collect();
    output.table(rows);
    Ok(())
}
