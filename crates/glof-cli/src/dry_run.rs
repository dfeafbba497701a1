use crate::output::OutputWriter;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

/// A step a command would take, reported by --dry-run
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    pub action_type: ActionType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ReadFile,
    RunStage,
    WriteFile,
}

impl PlannedAction {
    pub fn new(action_type: ActionType, description: impl Into<String>) -> Self {
        Self {
            action_type,
            description: description.into(),
            path: None,
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn read(path: &Path) -> Self {
        Self::file(ActionType::ReadFile, "Read", path)
    }

    pub fn write(path: &Path) -> Self {
        Self::file(ActionType::WriteFile, "Write", path)
    }

    fn file(action_type: ActionType, verb: &str, path: &Path) -> Self {
        let path = path.display().to_string();
        Self {
            action_type,
            description: format!("{} {}", verb, path),
            path: Some(path),
            details: Vec::new(),
        }
    }
}

fn paths_of(actions: &[PlannedAction], action_type: ActionType) -> Vec<&str> {
    actions
        .iter()
        .filter(|a| a.action_type == action_type)
        .filter_map(|a| a.path.as_deref())
        .collect()
}

/// Print the plan; nothing is read beyond what the command already loaded
pub fn display_planned_actions(output: &OutputWriter, actions: &[PlannedAction]) -> anyhow::Result<()> {
    if output.is_json() {
        return output.result(serde_json::json!({
            "dry_run": true,
            "reads": paths_of(actions, ActionType::ReadFile),
            "writes": paths_of(actions, ActionType::WriteFile),
            "actions": actions,
        }));
    }

    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "#")]
        step: usize,
        #[tabled(rename = "Action")]
        action: &'static str,
        #[tabled(rename = "Target")]
        target: String,
    }

    output.section("Planned Actions (Dry Run)");
    output.table(
        actions
            .iter()
            .enumerate()
            .map(|(i, action)| PlanRow {
                step: i + 1,
                action: match action.action_type {
                    ActionType::ReadFile => "read",
                    ActionType::RunStage => "run",
                    ActionType::WriteFile => "write",
                },
                target: match &action.path {
                    Some(path) => path.clone(),
                    None => std::iter::once(action.description.as_str())
                        .chain(action.details.iter().map(String::as_str))
                        .collect::<Vec<_>>()
                        .join("\n  "),
                },
            })
            .collect(),
    );
    output.info(format!(
        "{} file(s) would be written. Run without --dry-run to execute.",
        paths_of(actions, ActionType::WriteFile).len()
    ));
    Ok(())
}
