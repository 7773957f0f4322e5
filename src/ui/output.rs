//! Terminal report rendering and prompts. ASCII only, colored.

use std::io::{self, BufRead, Write};

use owo_colors::OwoColorize;

use crate::app::{ApplyPlan, StatusReport};
use crate::config::BlacklistEntry;
use crate::device::PnpDevice;
use crate::history::OverrideRecord;
use crate::power::{ApplyOutcome, BatchStatus, RemovalOutcome};

/// Ask a yes/no question on stdin. Anything but `y`/`yes` is a no.
pub fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt.bold());
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// One line per device: name, class, instance id.
pub fn print_device_list(devices: &[PnpDevice]) {
    for (i, device) in devices.iter().enumerate() {
        println!(
            "  {:>2}. {}  {}  {}",
            i + 1,
            device.display_name().bold(),
            format!("[{}]", device.class_name).cyan(),
            device.instance_id.dimmed()
        );
    }
}

pub fn print_plan(plan: &ApplyPlan) {
    println!();
    println!(
        "Found {} candidate {} device(s){}:",
        plan.devices.len().to_string().bold(),
        plan.category,
        if plan.excluded > 0 {
            format!(" ({} blacklisted)", plan.excluded).yellow().to_string()
        } else {
            String::new()
        }
    );
    print_device_list(&plan.devices);
}

pub fn print_apply_outcome(outcome: &ApplyOutcome) {
    println!();
    match outcome.status() {
        BatchStatus::Empty => println!("{}", "No devices to fix.".yellow()),
        BatchStatus::FullyFixed => println!(
            "{}",
            format!("[OK] All {} device(s) fixed.", outcome.results.len()).bright_green()
        ),
        BatchStatus::PartiallyFixed => {
            println!(
                "{}",
                format!(
                    "[PARTIAL] {} of {} device(s) fixed.",
                    outcome.fixed_count(),
                    outcome.results.len()
                )
                .yellow()
            );
            for result in outcome.failed() {
                println!("  {} {}", "failed:".bright_red(), result.device.display_name());
            }
        }
        BatchStatus::Failed => {
            println!("{}", "[FAILED] No overrides were accepted.".bright_red())
        }
    }
    for result in outcome.fixed() {
        println!(
            "  {} {} ({}/{} variants accepted)",
            "fixed:".bright_green(),
            result.device.display_name(),
            result.succeeded_variants,
            result.attempted_variants
        );
    }
    if outcome.scheme_reset {
        println!("  {}", "Power schemes were reset to defaults first.".dimmed());
    }
}

pub fn print_status(report: &StatusReport) {
    println!();
    println!("{}", "Current sleep blockers (drivers):".bold());
    if report.blockers.is_empty() {
        println!("  {}", "none".bright_green());
    } else {
        for blocker in &report.blockers {
            println!("  {}", blocker.bright_red());
        }
    }

    println!();
    println!("{}", "Devices fixed by the last apply run:".bold());
    print_history(&report.history);

    println!();
    println!(
        "Boot persistence: {}   Scope: {}   Reset schemes on apply: {}   Blacklist: {} entr{}",
        if report.persistence_enabled {
            "enabled".bright_green().to_string()
        } else {
            "disabled".dimmed().to_string()
        },
        report.persistence_mode,
        report.reset_power_options,
        report.blacklist_len,
        if report.blacklist_len == 1 { "y" } else { "ies" }
    );
}

pub fn print_history(records: &[OverrideRecord]) {
    if records.is_empty() {
        println!("  {}", "none".dimmed());
        return;
    }
    for record in records {
        println!(
            "  {}  {}  {}",
            record.timestamp.dimmed(),
            record.device_name.bold(),
            record.instance_id.dimmed()
        );
    }
}

pub fn print_overrides(entries: &[String]) {
    println!();
    println!("{}", "Registered driver overrides:".bold());
    if entries.is_empty() {
        println!("  {}", "none".dimmed());
        return;
    }
    for entry in entries {
        println!("  {entry}");
    }
}

pub fn print_removal(outcome: &RemovalOutcome) {
    println!();
    if outcome.attempted == 0 {
        println!("{}", "Nothing to undo.".yellow());
        return;
    }
    if outcome.all_removed() {
        println!(
            "{}",
            format!("[OK] Removed overrides for {} entr{}.", outcome.removed,
                if outcome.removed == 1 { "y" } else { "ies" })
            .bright_green()
        );
    } else {
        println!(
            "{}",
            format!(
                "[PARTIAL] Removed {} of {}; history cleared anyway.",
                outcome.removed, outcome.attempted
            )
            .yellow()
        );
        for name in &outcome.failed {
            println!("  {} {}", "failed:".bright_red(), name);
        }
    }
}

pub fn print_blacklist(entries: &[BlacklistEntry]) {
    println!();
    println!("{}", "Blacklisted devices:".bold());
    if entries.is_empty() {
        println!("  {}", "none".dimmed());
        return;
    }
    for entry in entries {
        println!(
            "  {}  {}  {}  {}",
            entry.date_added.dimmed(),
            entry.friendly_name.bold(),
            format!("[{}]", entry.class_name).cyan(),
            entry.instance_id.dimmed()
        );
    }
}

pub fn print_error(error: &anyhow::Error) {
    eprintln!("{} {error:#}", "error:".bright_red().bold());
}
