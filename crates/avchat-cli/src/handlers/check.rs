//! Check command handler.
//!
//! Validates the settings, then probes each configured service once.

use std::fmt::Display;

use anyhow::Result;
use avchat_chat::{probe_chat, probe_search};
use avchat_core::AvatarError;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{BOLD, GREEN, RED, RESET, YELLOW, print_separator};

/// Execute the check command.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let settings = &ctx.settings;

    println!("{BOLD}avchat setup check{RESET}");
    print_separator(60);

    if let Err(e) = settings.validate() {
        for issue in &e.issues {
            fail("Settings", issue);
        }
        return Err(CliError::Config(e.to_string()).into());
    }
    pass("Settings", "complete");
    for advisory in settings.advisories() {
        println!(
            "  {YELLOW}! {}: {}{RESET}",
            advisory.field.label(),
            advisory.message
        );
    }

    let mut failures = 0;

    let speech = settings.speech();
    match ctx.speech_backend.probe(&speech).await {
        Ok(()) => pass("Speech", format!("token issued ({})", speech.endpoint())),
        Err(e) => {
            failures += 1;
            fail("Speech", AvatarError::from(e));
        }
    }

    let chat = settings.chat();
    match probe_chat(&ctx.chat, &chat).await {
        Ok(()) => pass("Chat", format!("deployment '{}' answered", chat.deployment)),
        Err(e) => {
            failures += 1;
            fail("Chat", AvatarError::from(e));
        }
    }

    match settings.retrieval() {
        None => println!("  {YELLOW}○{RESET} {:<10} not configured", "Search"),
        Some(retrieval) => match probe_search(&ctx.chat, &retrieval).await {
            Ok(probe) if probe.index_found => {
                pass("Search", format!("index '{}' found", retrieval.index));
            }
            Ok(probe) => {
                failures += 1;
                let available = if probe.indexes.is_empty() {
                    "none".to_string()
                } else {
                    probe.indexes.join(", ")
                };
                fail(
                    "Search",
                    format!(
                        "index '{}' not found (available: {available})",
                        retrieval.index
                    ),
                );
            }
            Err(e) => {
                failures += 1;
                fail("Search", AvatarError::from(e));
            }
        },
    }

    println!();
    if failures == 0 {
        println!("{GREEN}All checks passed.{RESET}");
        Ok(())
    } else {
        println!("{RED}{failures} check(s) failed.{RESET}");
        Err(CliError::ChecksFailed(failures).into())
    }
}

fn pass(name: &str, detail: impl Display) {
    println!("  {GREEN}✓{RESET} {name:<10} {detail}");
}

fn fail(name: &str, reason: impl Display) {
    println!("  {RED}✗{RESET} {name:<10} {reason}");
}
