use console::style;
use glof_core::GlofError;
use std::fmt;
use std::path::Path;

/// Error with remediation suggestions
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "error",
            "message": self.message,
            "context": self.context,
            "suggestions": self.suggestions,
        })
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// A stage input produced by an earlier command is absent
pub fn missing_stage_output(path: &Path, producer: &str) -> CliError {
    CliError::new("Input file not found")
        .with_context(format!("Expected an earlier stage to have written:\n\n  {}", path.display()))
        .with_suggestion(format!("Run: glof {}", producer))
        .with_suggestion("Or point --out-dir at the directory used for the earlier stages")
        .with_help(format!("Run: glof {} --help", producer))
}

/// Records still await adjudication
pub fn pending_review(count: usize, review_path: &Path) -> CliError {
    CliError::new(format!("{} record(s) need manual review", count))
        .with_context(format!(
            "Ambiguous catalogue matches must be resolved before imputation or training.\n\nReview queue: {}",
            review_path.display()
        ))
        .with_suggestion("Decide each flagged lake-year and write lake_id,Year_final,GLOF rows to a CSV")
        .with_suggestion("Then run: glof label --catalogue <inventory.csv> --adjudications <decisions.csv>")
        .with_help("Run: glof label --help")
}

pub fn invalid_config(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid configuration: {}", key))
        .with_context(format!("Configuration value is invalid.\n\nReason: {}", reason))
        .with_suggestion("Check glof.toml and GLOF_* environment variables")
        .with_suggestion("Inspect resolved values: glof config")
        .with_help("Run: glof config")
}

/// Map an error chain to a `CliError`, adding suggestions for known failures
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    let error = match error.downcast::<CliError>() {
        Ok(cli_error) => return cli_error,
        Err(error) => error,
    };

    let chain = format!("{:#}", error);
    match error.downcast_ref::<GlofError>() {
        Some(GlofError::ConfigInvalid { key, reason }) => invalid_config(key, reason),
        Some(GlofError::ConfigMissing { key }) => invalid_config(key, "value is required"),
        Some(GlofError::PendingReview { count }) => {
            CliError::new(format!("{} record(s) need manual review", count))
                .with_context(chain)
                .with_suggestion("Resolve the review queue with: glof label --adjudications <decisions.csv>")
        }
        Some(GlofError::Training { .. }) => CliError::new("Training failed")
            .with_context(chain)
            .with_suggestion("Check that both GLOF and non-GLOF lakes survive labelling")
            .with_suggestion("Or lower --test-fraction for small catalogues"),
        Some(GlofError::Imputation { .. }) => CliError::new("Imputation failed")
            .with_context(chain)
            .with_suggestion("A feature with no observed value in a partition cannot be imputed"),
        Some(GlofError::ModelArtifact { .. }) => CliError::new("Model artifact is unusable")
            .with_context(chain)
            .with_suggestion("Retrain with: glof train"),
        _ if chain.contains("No such file or directory") => CliError::new("File not found")
            .with_context(format!("Error: {}", chain))
            .with_suggestion("Check the file path and try again"),
        _ => CliError::new(chain),
    }
}

/// Print a failed command's error in the selected output mode
pub fn report(error: anyhow::Error, json: bool) {
    let error = from_anyhow(error);
    if json {
        eprintln!("{}", error.to_json());
    } else {
        error.display();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_cli_error_passes_through() {
        let error = anyhow::Error::new(CliError::new("boom").with_suggestion("retry"));
        let converted = from_anyhow(error);
        assert_eq!(converted.message, "boom");
        assert_eq!(converted.suggestions, vec!["retry".to_string()]);
    }

    #[test]
    fn test_glof_error_behind_context() {
        let result: Result<(), GlofError> = Err(GlofError::PendingReview { count: 2 });
        let error = result.context("Failed to impute").unwrap_err();

        let converted = from_anyhow(error);
        assert!(converted.message.contains("2 record(s)"));
        assert!(!converted.suggestions.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let json = invalid_config("seed", "not a number").to_json();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Invalid configuration: seed");
    }
}
