use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::{Confirm, MultiSelect, Select};
use tracing::{info, warn};

use listen_rs::change::ChangeOptions;
use listen_rs::commands::{self, AlbumChange, ChangeOutcome, MembershipChange};
use listen_rs::common::{initialize_logging, LogOutput, VERSION};
use listen_rs::generator::GenerationReport;
use listen_rs::orphans::Removal;
use listen_rs::{Config, Library, ListenError, ListenSession};

#[derive(Parser)]
#[command(name = "listen", version = VERSION, about = "Keep monthly and yearly listening playlists in sync with an album library")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to read instead of the default one
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to the log file in the state directory instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add albums to playlists
    Add(MembershipArgs),
    /// Remove albums from playlists
    Rm(MembershipArgs),
    /// Generate or update the playlists. Family names may be passed as arguments.
    Gen {
        /// Families to regenerate (all of them when omitted)
        #[arg(value_name = "FAMILY")]
        names: Vec<String>,
    },
    /// Regenerate every playlist, then offer to delete the stale ones
    Prune {
        /// Move stale playlists to the trash instead of deleting them
        #[arg(long)]
        trash: bool,
    },
}

#[derive(Args)]
pub struct MembershipArgs {
    /// `@YYYY-MM` playlist tags and album query terms
    #[arg(value_name = "QUERY")]
    pub tokens: Vec<String>,
    /// Move files in the library directory
    #[arg(short = 'm', long = "move", conflicts_with = "nomove")]
    pub move_files: bool,
    /// Don't move files in the library
    #[arg(short = 'M', long)]
    pub nomove: bool,
    /// Request a metadata write along with the change (the library store keeps the attributes itself)
    #[arg(short = 'w', long, conflicts_with = "nowrite")]
    pub write: bool,
    /// Don't request a metadata write (opposite of -w)
    #[arg(short = 'W', long)]
    pub nowrite: bool,
    /// Skip confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

fn flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl MembershipArgs {
    fn options(&self) -> ChangeOptions {
        ChangeOptions {
            write: flag(self.write, self.nowrite),
            move_files: flag(self.move_files, self.nomove),
            confirm: if self.yes { Some(false) } else { None },
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let output = if cli.log_file { LogOutput::File } else { LogOutput::Stderr };
    let _guard = initialize_logging(output, cli.verbose)?;

    let config = Config::parse(cli.config.as_deref())?;
    let mut library = Library::open(&config.library).with_context(|| format!("Failed to open library {}", config.library.display()))?;
    if let Some(directory) = &config.directory {
        library = library.with_directory(directory.clone(), config.replacements.clone());
    }
    let mut session = ListenSession::new(config)?;

    let result = match cli.command {
        Commands::Add(args) => cmd_change(&mut session, &mut library, &args, MembershipChange::Add),
        Commands::Rm(args) => cmd_change(&mut session, &mut library, &args, MembershipChange::Remove),
        Commands::Gen { names } => cmd_gen(&mut session, &library, &names),
        Commands::Prune { trash } => cmd_prune(&mut session, &library, trash),
    };

    // Whatever the command did, changes it stored still get their playlists regenerated.
    Ok(session.finish(&library, result, print_report)?)
}

fn cmd_change(session: &mut ListenSession, library: &mut Library, args: &MembershipArgs, change: MembershipChange) -> listen_rs::Result<()> {
    let request = session.change_request(&args.tokens, args.options())?;
    match commands::change_membership(session, library, &request, change, confirm_changes)? {
        ChangeOutcome::NothingToDo => {}
        ChangeOutcome::Declined => println!("Nothing modified."),
        ChangeOutcome::Stored { albums } => println!("Modified {albums} albums."),
    }
    Ok(())
}

fn dialog_error(e: dialoguer::Error) -> ListenError {
    ListenError::Generic(format!("Prompt failed: {e}"))
}

/// Ask the operator whether to apply all, none or a selection of the changes.
fn confirm_changes(prompt: &str, changes: Vec<AlbumChange>) -> listen_rs::Result<Vec<AlbumChange>> {
    for change in &changes {
        println!("{}", change.album.logtext());
        for c in &change.changes {
            println!("  {c}");
        }
    }

    let choice = Select::new()
        .with_prompt(format!("{prompt}?"))
        .items(&["Yes", "No", "Select"])
        .default(0)
        .interact()
        .map_err(dialog_error)?;
    match choice {
        0 => Ok(changes),
        1 => Ok(Vec::new()),
        _ => {
            let labels: Vec<String> = changes.iter().map(|c| c.album.logtext()).collect();
            let picked = MultiSelect::new()
                .with_prompt("Albums to modify")
                .items(&labels)
                .interact()
                .map_err(dialog_error)?;
            let picked: BTreeSet<usize> = picked.into_iter().collect();
            Ok(changes.into_iter().enumerate().filter(|(i, _)| picked.contains(i)).map(|(_, c)| c).collect())
        }
    }
}

fn cmd_gen(session: &mut ListenSession, library: &Library, names: &[String]) -> listen_rs::Result<()> {
    let report = commands::regenerate(session, library, names)?;
    print_report(&report);
    Ok(())
}

fn cmd_prune(session: &mut ListenSession, library: &Library, trash: bool) -> listen_rs::Result<()> {
    let removal = if trash { Removal::Trash } else { Removal::Unlink };
    let (report, removed) = commands::prune(session, library, removal, |stale| {
        for key in stale {
            println!("  {key}");
        }
        Confirm::new()
            .with_prompt(format!("Remove {} stale playlists?", stale.len()))
            .default(false)
            .interact()
            .map_err(dialog_error)
    })?;
    print_report(&report);

    if let Some(removed) = removed {
        println!("Removed {} stale playlists.", removed.removed.len());
        for (key, error) in &removed.failures {
            warn!("Could not remove {}: {}", key, error);
        }
    }
    Ok(())
}

fn print_report(report: &GenerationReport) {
    info!("Regenerated {}: {} playlists written", report.families.join(", "), report.written.len());
    for failure in &report.failures {
        warn!("{}", failure);
    }
    if let Some(orphans) = &report.orphans {
        if !orphans.stale.is_empty() {
            println!("{} stale playlists (run `listen prune` to remove them):", orphans.stale.len());
            for key in &orphans.stale {
                println!("  {key}");
            }
        }
    }
}
