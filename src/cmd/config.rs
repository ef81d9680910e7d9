//! Checklist config validation: `prchecklist config validate`.

use anyhow::Result;

use prchecklist::checklist::ChecklistConfig;

use super::super::ConfigCommands;

pub fn cmd_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { file } => {
            println!();
            println!("Validating {}...", file.display());
            println!();

            let config = ChecklistConfig::load(&file)?;
            let warnings = config.validate();

            println!("Stages: {}", config.stages.len());
            println!("Channels: {}", config.notification.channels.len());
            println!();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
    }
    Ok(())
}
