//! Config command handler.
//!
//! Shows the effective settings with secrets redacted, then validates them.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{GREEN, RED, RESET, YELLOW, print_settings_summary};

/// Execute the config command.
pub fn execute(ctx: &CliContext) -> Result<()> {
    let settings = &ctx.settings;
    print_settings_summary(settings);
    println!();

    for advisory in settings.advisories() {
        println!(
            "{YELLOW}! {}: {}{RESET}",
            advisory.field.label(),
            advisory.message
        );
    }

    match settings.validate() {
        Ok(()) => {
            println!("{GREEN}✓ Settings are complete{RESET}");
            Ok(())
        }
        Err(e) => {
            for issue in &e.issues {
                println!("{RED}✗ {issue}{RESET}");
            }
            Err(CliError::Config(e.to_string()).into())
        }
    }
}
