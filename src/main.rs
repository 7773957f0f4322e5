use anyhow::Result;
use clap::{Parser, Subcommand};

use usb_wake_fix::app::Session;
use usb_wake_fix::device::DeviceCategory;
use usb_wake_fix::persist::{DisableOutcome, EnableOutcome};
use usb_wake_fix::ui::{menu, output};
use usb_wake_fix::{logging, Paths};

#[derive(Parser)]
#[command(name = "usb-wake-fix")]
#[command(about = "Stops USB peripherals from keeping the machine awake", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose logging to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply power request overrides to the selected device category
    Apply {
        /// Device category to fix
        #[arg(long, default_value = "audio")]
        category: DeviceCategory,

        /// Non-interactive boot-task mode: wait for drivers, then apply
        #[arg(long)]
        scheduled: bool,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show current sleep blockers, history, and settings
    Status,

    /// List the driver overrides currently registered
    ListOverrides,

    /// Remove applied overrides
    Undo {
        /// Sweep every present USB device instead of following history
        #[arg(long)]
        nuclear: bool,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Manage the boot-time reapplication task
    Persistence {
        #[command(subcommand)]
        action: PersistenceAction,
    },

    /// Inspect or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum PersistenceAction {
    /// Register the boot task
    Enable,
    /// Remove the boot task
    Disable,
    /// Report whether the boot task exists
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the whole configuration
    Show,
    /// Print one field
    Get { field: String },
    /// Set one field (resetPowerOptions, persistenceMode)
    Set { field: String, value: String },
    /// Manage the device blacklist
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },
}

#[derive(Subcommand)]
enum BlacklistAction {
    /// Show blacklist entries
    List,
    /// Exclude a present device by instance id or friendly name
    Add { device: String },
    /// Drop entries matching an instance id or friendly name
    Remove { device: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Apply {
            scheduled: true, ..
        }) => {
            let paths = Paths::resolve()?;
            logging::init_scheduled(&paths.run_log)?;
        }
        _ => logging::init(cli.verbose),
    }

    let mut session = Session::open()?;

    let result = match cli.command {
        None => menu::run_menu(&mut session),
        Some(Commands::Apply {
            category,
            scheduled,
            yes,
        }) => apply(&session, category, scheduled, yes),
        Some(Commands::Status) => session.status().map(|r| output::print_status(&r)),
        Some(Commands::ListOverrides) => {
            session.list_overrides().map(|e| output::print_overrides(&e))
        }
        Some(Commands::Undo { nuclear, yes }) => undo(&session, nuclear, yes),
        Some(Commands::Persistence { action }) => persistence(&session, action),
        Some(Commands::Config { action }) => config(&mut session, action),
    };

    if let Err(e) = result {
        output::print_error(&e);
        std::process::exit(1);
    }
    Ok(())
}

fn apply(session: &Session, category: DeviceCategory, scheduled: bool, yes: bool) -> Result<()> {
    if scheduled {
        let outcome = session.run_scheduled_apply(category)?;
        tracing::info!(
            fixed = outcome.fixed_count(),
            total = outcome.results.len(),
            "scheduled apply finished"
        );
        return Ok(());
    }

    let plan = session.plan_apply(category)?;
    output::print_plan(&plan);
    if plan.devices.is_empty() {
        return Ok(());
    }
    if !yes && !output::confirm("Apply power request overrides to these devices?") {
        println!("Cancelled.");
        return Ok(());
    }
    let outcome = session.run_apply(&plan)?;
    output::print_apply_outcome(&outcome);
    Ok(())
}

fn undo(session: &Session, nuclear: bool, yes: bool) -> Result<()> {
    let question = if nuclear {
        "Remove overrides from EVERY present USB device, including ones this tool never touched?"
    } else {
        "Remove the overrides recorded by the last apply run?"
    };
    if !yes && !output::confirm(question) {
        println!("Cancelled.");
        return Ok(());
    }
    let outcome = session.undo(nuclear)?;
    output::print_removal(&outcome);
    Ok(())
}

fn persistence(session: &Session, action: PersistenceAction) -> Result<()> {
    match action {
        PersistenceAction::Enable => match session.persistence_enable()? {
            EnableOutcome::Registered => println!("Boot persistence enabled."),
            EnableOutcome::AlreadyRegistered => println!("Boot persistence was already enabled."),
        },
        PersistenceAction::Disable => match session.persistence_disable()? {
            DisableOutcome::Unregistered => println!("Boot persistence disabled."),
            DisableOutcome::NotRegistered => println!("Boot persistence was not enabled."),
        },
        PersistenceAction::Status => {
            let enabled = session.persistence_status()?;
            println!(
                "Boot persistence is {} (scope: {}).",
                if enabled { "enabled" } else { "disabled" },
                session.config.persistence_mode
            );
        }
    }
    Ok(())
}

fn config(session: &mut Session, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&session.config)?);
        }
        ConfigAction::Get { field } => println!("{}", session.config_get(&field)?),
        ConfigAction::Set { field, value } => {
            session.config_set(&field, &value)?;
            println!("{field} = {}", session.config_get(&field)?);
        }
        ConfigAction::Blacklist { action } => match action {
            BlacklistAction::List => {
                output::print_blacklist(&session.config.blacklisted_devices)
            }
            BlacklistAction::Add { device } => {
                let entry = session.blacklist_add(&device)?;
                println!("Blacklisted: {} ({})", entry.friendly_name, entry.instance_id);
            }
            BlacklistAction::Remove { device } => {
                if session.blacklist_remove(&device)? {
                    println!("Entry removed.");
                } else {
                    println!("No matching entry.");
                }
            }
        },
    }
    Ok(())
}
