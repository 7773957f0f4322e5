//! Interactive menu for operators who launch the tool without arguments.
//!
//! Each action maps onto the same session operations the subcommands use.
//! Errors are printed and the menu keeps running; only quitting leaves the
//! loop.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::app::Session;
use crate::device::DeviceCategory;

use super::output;

fn prompt(text: &str) -> String {
    print!("{text}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}

/// Run the interactive menu until the operator quits.
pub fn run_menu(session: &mut Session) -> Result<()> {
    loop {
        println!();
        println!("{}", "USB Wake Fix".bold().underline());
        println!("  1. Fix audio devices");
        println!("  2. Fix all USB devices");
        println!("  3. Show status");
        println!("  4. List registered overrides");
        println!("  5. Undo (history only)");
        println!("  6. Undo everything (all USB devices)");
        println!("  7. Boot persistence");
        println!("  8. Settings");
        println!("  0. Quit");

        match prompt("> ").as_str() {
            "1" => run_apply(session, DeviceCategory::Audio),
            "2" => run_apply(session, DeviceCategory::All),
            "3" => report(session.status().map(|r| output::print_status(&r))),
            "4" => report(session.list_overrides().map(|e| output::print_overrides(&e))),
            "5" => run_undo(session, false),
            "6" => run_undo(session, true),
            "7" => persistence_menu(session),
            "8" => settings_menu(session),
            "0" | "q" => break,
            _ => println!("{}", "Unrecognized choice.".yellow()),
        }
    }
    Ok(())
}

fn report(result: Result<()>) {
    if let Err(e) = result {
        output::print_error(&e);
    }
}

fn run_apply(session: &mut Session, category: DeviceCategory) {
    let plan = match session.plan_apply(category) {
        Ok(plan) => plan,
        Err(e) => return output::print_error(&e),
    };
    output::print_plan(&plan);
    if plan.devices.is_empty() {
        return;
    }
    if !output::confirm("Apply power request overrides to these devices?") {
        println!("{}", "Cancelled.".dimmed());
        return;
    }
    match session.run_apply(&plan) {
        Ok(outcome) => output::print_apply_outcome(&outcome),
        Err(e) => output::print_error(&e),
    }
}

fn run_undo(session: &mut Session, nuclear: bool) {
    let question = if nuclear {
        "Remove overrides from EVERY present USB device, including ones this tool never touched?"
    } else {
        "Remove the overrides recorded by the last apply run?"
    };
    if !output::confirm(question) {
        println!("{}", "Cancelled.".dimmed());
        return;
    }
    match session.undo(nuclear) {
        Ok(outcome) => output::print_removal(&outcome),
        Err(e) => output::print_error(&e),
    }
}

fn persistence_menu(session: &mut Session) {
    let enabled = match session.persistence_status() {
        Ok(enabled) => enabled,
        Err(e) => return output::print_error(&e),
    };
    println!();
    println!(
        "Boot persistence is {} (scope: {}).",
        if enabled {
            "enabled".bright_green().to_string()
        } else {
            "disabled".dimmed().to_string()
        },
        session.config.persistence_mode
    );

    if enabled {
        if output::confirm("Disable the boot task?") {
            match session.persistence_disable() {
                Ok(_) => println!("{}", "Boot persistence disabled.".bright_green()),
                Err(e) => output::print_error(&e),
            }
        }
    } else if output::confirm("Register a boot task that reapplies the fix after every startup?") {
        match session.persistence_enable() {
            Ok(_) => println!("{}", "Boot persistence enabled.".bright_green()),
            Err(e) => output::print_error(&e),
        }
    }
}

fn settings_menu(session: &mut Session) {
    loop {
        println!();
        println!("{}", "Settings".bold());
        println!(
            "  1. Reset power schemes before apply: {}",
            session.config.reset_power_options
        );
        println!(
            "  2. Persistence scope: {}",
            session.config.persistence_mode
        );
        println!("  3. Show blacklist");
        println!("  4. Blacklist a device");
        println!("  5. Remove a blacklist entry");
        println!("  0. Back");

        match prompt("> ").as_str() {
            "1" => {
                let flipped = !session.config.reset_power_options;
                report(session.config_set("resetPowerOptions", &flipped.to_string()));
            }
            "2" => {
                let next = match session.config.persistence_mode {
                    crate::config::PersistenceMode::Audio => "all",
                    crate::config::PersistenceMode::All => "audio",
                };
                report(session.config_set("persistenceMode", next));
            }
            "3" => output::print_blacklist(&session.config.blacklisted_devices),
            "4" => blacklist_add(session),
            "5" => blacklist_remove(session),
            "0" => break,
            _ => println!("{}", "Unrecognized choice.".yellow()),
        }
    }
}

fn blacklist_add(session: &mut Session) {
    let plan = match session.plan_apply(DeviceCategory::All) {
        Ok(plan) => plan,
        Err(e) => return output::print_error(&e),
    };
    if plan.devices.is_empty() {
        println!("{}", "No eligible devices found.".yellow());
        return;
    }
    println!();
    println!("Pick a device to exclude from all apply runs:");
    output::print_device_list(&plan.devices);
    let choice = prompt("number (blank to cancel) > ");
    if choice.is_empty() {
        return;
    }
    let Some(device) = choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| plan.devices.get(i))
        .cloned()
    else {
        println!("{}", "Not a listed device.".yellow());
        return;
    };
    match session.blacklist_add_device(&device) {
        Ok(entry) => println!(
            "{} {}",
            "Blacklisted:".bright_green(),
            entry.friendly_name.bold()
        ),
        Err(e) => output::print_error(&e),
    }
}

fn blacklist_remove(session: &mut Session) {
    let entries = session.config.blacklisted_devices.clone();
    if entries.is_empty() {
        println!("{}", "The blacklist is empty.".yellow());
        return;
    }
    output::print_blacklist(&entries);
    let choice = prompt("instance id or name to remove (blank to cancel) > ");
    if choice.is_empty() {
        return;
    }
    match session.blacklist_remove(&choice) {
        Ok(true) => println!("{}", "Entry removed.".bright_green()),
        Ok(false) => println!("{}", "No matching entry.".yellow()),
        Err(e) => output::print_error(&e),
    }
}
