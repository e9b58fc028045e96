//! Command-backed repair actions
//!
//! Each `[actions]` entry in the config maps a fix kind to a shell command.
//! The command runs with the option in its environment:
//! MEDIC_FIX, MEDIC_CATEGORY, MEDIC_DESCRIPTION.

use medic_common::{
    ActionOutcome, ActionRegistry, MedicConfig, MedicResult, RepairAction, RepairError,
    RepairOption,
};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info};

/// Runs one shell command for a fix kind
#[derive(Debug, Clone)]
pub struct CommandAction {
    command: String,
}

impl CommandAction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl RepairAction for CommandAction {
    fn apply(&self, option: &RepairOption) -> MedicResult<ActionOutcome> {
        debug!("[EXECUTOR] Running '{}' for {}", self.command, option.fix);

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("MEDIC_FIX", option.fix.as_str())
            .env(
                "MEDIC_CATEGORY",
                option.category.map(|c| c.as_str()).unwrap_or(""),
            )
            .env("MEDIC_DESCRIPTION", &option.description)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| RepairError::Handler(format!("spawning '{}': {}", self.command, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let first_line = |s: &str| s.lines().next().unwrap_or("").trim().to_string();

        if output.status.success() {
            let line = first_line(&stdout);
            let description = if line.is_empty() {
                format!("{} completed", option.fix)
            } else {
                line
            };
            Ok(ActionOutcome::ok(description))
        } else {
            Ok(ActionOutcome::failed(format!(
                "{} exited with {}: {}",
                option.fix,
                output.status,
                first_line(&stderr)
            )))
        }
    }
}

/// Build the handler registry from `[actions]`
pub fn registry_from_config(config: &MedicConfig) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    for (kind, command) in config.action_commands() {
        info!("[BOOT] Handler for {}: {}", kind, command);
        registry.register(kind, Arc::new(CommandAction::new(command)));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_common::{FixKind, MetricCategory, OptionSource};

    fn option() -> RepairOption {
        RepairOption {
            fix: FixKind::ClearCaches,
            description: "drop caches".into(),
            confidence: 0.3,
            category: Some(MetricCategory::Memory),
            source: OptionSource::Generic,
        }
    }

    #[test]
    fn test_command_success_reports_stdout() {
        let action = CommandAction::new("echo \"$MEDIC_FIX on $MEDIC_CATEGORY\"");
        let outcome = action.apply(&option()).unwrap();
        assert_eq!(outcome.success, Some(true));
        assert_eq!(outcome.description.as_deref(), Some("clear_caches on memory"));
    }

    #[test]
    fn test_command_failure() {
        let action = CommandAction::new("echo nope >&2; exit 3");
        let outcome = action.apply(&option()).unwrap();
        assert_eq!(outcome.success, Some(false));
        assert!(outcome.description.unwrap().contains("nope"));
    }

    #[test]
    fn test_registry_from_config() {
        let mut config = MedicConfig::default();
        config.actions.insert("clear_caches".into(), "true".into());
        config.actions.insert("not_a_fix".into(), "true".into());
        let registry = registry_from_config(&config);
        assert_eq!(registry.kinds(), vec![FixKind::ClearCaches]);
    }
}
