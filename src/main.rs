use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use splitlist::actions::{PlanWriter, PlaylistAction, PlaylistMutator};
use splitlist::catalog::DumpSource;
use splitlist::models::{PlaylistHealth, SavedSplit, Suggestion};
use splitlist::session::Session;
use splitlist::store::Store;
use splitlist::thresholds::{EditOutcome, Preset, ThresholdField, ThresholdState};

#[derive(Parser)]
#[command(name = "splitlist", version, about = "Split a big playlist into smaller ones")]
struct Cli {
    /// Path to the state database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Directory with catalog playlist dumps
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionKind {
    Create,
    Remove,
}

#[derive(Subcommand)]
enum Commands {
    /// Import listening-history export files (replaces any previous import)
    Import {
        /// Files or directories (defaults to config history_dirs)
        paths: Vec<PathBuf>,
    },

    /// Show listening statistics for a playlist
    Health {
        /// Playlist id
        playlist: String,
    },

    /// List split suggestions for a playlist
    Suggest {
        /// Playlist id
        playlist: String,

        /// Ignore imported listening history
        #[arg(long)]
        no_usage: bool,

        /// Print suggestions as JSON
        #[arg(long)]
        json: bool,

        /// List the tracks of each suggestion
        #[arg(short, long)]
        tracks: bool,
    },

    /// Show or change classification thresholds
    Thresholds {
        #[command(subcommand)]
        command: ThresholdCommand,
    },

    /// Save (or unsave) a suggestion's current tracks as a split
    Save {
        playlist: String,
        suggestion: String,

        /// Track ids to leave out of the saved selection
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },

    /// List saved splits
    Splits {
        /// Only show splits for this playlist
        playlist: Option<String>,
    },

    /// Write a create/remove action for a suggestion as a JSON line
    Plan {
        playlist: String,
        suggestion: String,

        #[arg(value_enum)]
        action: ActionKind,

        /// Name for a created playlist
        #[arg(long)]
        name: Option<String>,

        /// Track ids to leave out
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Append to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ThresholdCommand {
    /// Print the active thresholds
    Show,
    /// Switch to a named preset (balanced, conservative, aggressive)
    Preset { name: Preset },
    /// Set a single value, e.g. `coreFavorites.minPlays 15`
    Set { field: ThresholdField, value: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = splitlist::config::AppConfig::load();

    // Resolve store path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(splitlist::config::default_db_path);
    log::info!("State database: {}", db_path.display());

    let store = Store::open(&db_path).context("Failed to open state database")?;
    let catalog_dir = cli
        .catalog_dir
        .unwrap_or_else(|| config.resolve_catalog_dir());
    let source = DumpSource::new(&catalog_dir);
    let thresholds = store.load_thresholds_or(config.default_preset.unwrap_or_default());

    match cli.command {
        Commands::Import { paths } => {
            let paths = if !paths.is_empty() {
                paths
            } else if !config.history_dirs.is_empty() {
                config.history_dirs.clone()
            } else {
                anyhow::bail!(
                    "No history files given. Pass paths as arguments or set history_dirs in config."
                );
            };

            // On failure the previously imported index stays untouched.
            let index = splitlist::history::import_paths(&paths).context("History import failed")?;
            store
                .save_usage_index(&index)
                .context("Failed to store usage index")?;

            let plays: u64 = index.iter().map(|(_, r)| r.plays as u64).sum();
            println!(
                "Import complete: {} tracks, {} plays",
                index.len(),
                plays
            );
        }

        Commands::Health { playlist } => {
            let session = load_session(&source, &store, &playlist, false, thresholds)?;
            match session.health() {
                Some(h) => print_health(&playlist, session.tracks().len(), h),
                None => println!(
                    "No listening history for this playlist. Run `splitlist import` first."
                ),
            }
        }

        Commands::Suggest { playlist, no_usage, json, tracks } => {
            let session = load_session(&source, &store, &playlist, no_usage, thresholds)?;

            if json {
                let out = serde_json::to_string_pretty(session.suggestions())?;
                println!("{out}");
                return Ok(());
            }

            if session.suggestions().is_empty() {
                println!("No suggestions for {} ({} tracks).", playlist, session.tracks().len());
                return Ok(());
            }

            let saved = store.load_saved_splits();
            println!(
                "{} suggestions for {} ({} tracks, thresholds: {}):",
                session.suggestions().len(),
                playlist,
                session.tracks().len(),
                session.thresholds().preset
            );
            println!();
            print_suggestion_table(session.suggestions(), &saved, &playlist);

            if tracks {
                for s in session.suggestions() {
                    println!();
                    println!("{} [{}]", s.label, s.rule_description);
                    for t in &s.tracks {
                        println!("  {:<24} {} — {}", t.id, t.name, t.artists.join(", "));
                    }
                }
            }
        }

        Commands::Thresholds { command } => {
            let mut state = thresholds;
            match command {
                ThresholdCommand::Show => {}
                ThresholdCommand::Preset { name } => {
                    if name == Preset::Custom {
                        anyhow::bail!("'custom' is not a preset; use `thresholds set` instead");
                    }
                    state.select_preset(name);
                    store.save_thresholds(&state).context("Failed to save thresholds")?;
                }
                ThresholdCommand::Set { field, value } => {
                    match state.edit_str(field, &value) {
                        EditOutcome::Applied => {
                            store.save_thresholds(&state).context("Failed to save thresholds")?;
                        }
                        EditOutcome::Rejected => {
                            println!(
                                "Ignored '{}' for {} (needs a non-negative number)",
                                value,
                                field.key()
                            );
                        }
                    }
                }
            }
            print_thresholds(&state);
        }

        Commands::Save { playlist, suggestion, exclude } => {
            let mut session = load_session(&source, &store, &playlist, false, thresholds)?;
            for id in &exclude {
                session.toggle_track(&suggestion, id);
            }
            let s = session
                .suggestion(&suggestion)
                .with_context(|| format!("No suggestion '{suggestion}' for {playlist}"))?;

            let mut splits = store.load_saved_splits();
            let selected = session.selection.selected_track_ids(s);
            let outcome =
                splitlist::splits::toggle_saved(&mut splits, &playlist, s, selected, Utc::now());
            store
                .save_saved_splits(&splits)
                .context("Failed to save splits")?;
            match outcome {
                splitlist::splits::Toggled::Saved => {
                    println!("Saved {} for {}.", s.label, playlist)
                }
                splitlist::splits::Toggled::Removed => {
                    println!("Removed saved {} for {}.", s.label, playlist)
                }
            }
        }

        Commands::Splits { playlist } => {
            let splits = store.load_saved_splits();
            let shown: Vec<&SavedSplit> = match &playlist {
                Some(p) => splitlist::splits::for_playlist(&splits, p),
                None => splits.iter().collect(),
            };
            if shown.is_empty() {
                println!("No saved splits.");
                return Ok(());
            }
            print_saved_splits(&shown);
        }

        Commands::Plan { playlist, suggestion, action, name, exclude, out } => {
            let mut session = load_session(&source, &store, &playlist, false, thresholds)?;
            for id in &exclude {
                session.toggle_track(&suggestion, id);
            }
            let s = session
                .suggestion(&suggestion)
                .with_context(|| format!("No suggestion '{suggestion}' for {playlist}"))?;

            let planned = match action {
                ActionKind::Create => {
                    PlaylistAction::create(&playlist, s, &session.selection, name.as_deref())
                }
                ActionKind::Remove => PlaylistAction::remove(&playlist, s, &session.selection),
            }?;

            let sink: Box<dyn Write> = match &out {
                Some(path) => Box::new(
                    File::options()
                        .create(true)
                        .append(true)
                        .open(path)
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                ),
                None => Box::new(io::stdout()),
            };
            let mut writer = PlanWriter::new(sink);
            if out.is_some() {
                session.apply(&planned, &mut writer, &source)?;
                println!(
                    "Planned {} track(s) for {}",
                    planned.track_ids().len(),
                    suggestion
                );
            } else {
                writer.apply(&planned)?;
            }
        }
    }

    Ok(())
}

/// Fetch the playlist and build a session with the stored usage index.
fn load_session(
    source: &DumpSource,
    store: &Store,
    playlist: &str,
    no_usage: bool,
    thresholds: ThresholdState,
) -> Result<Session> {
    let usage = if no_usage { None } else { store.load_usage_index() };
    if usage.is_none() && !no_usage {
        log::info!("No imported history; usage-based suggestions are off");
    }
    let session = Session::load(source, playlist, usage, thresholds, Utc::now())
        .context("Failed to load playlist tracks")?;
    Ok(session)
}

fn print_health(playlist: &str, track_count: usize, h: &PlaylistHealth) {
    println!("Playlist health: {} ({} tracks)", playlist, track_count);
    println!("==================");
    println!("Never played:        {:>3}%", h.never_played_pct);
    println!("Frequently skipped:  {:>3}%", h.frequently_skipped_pct);
    println!("Median plays:        {:>3}", h.median_plays);
    match h.avg_last_play_age_days {
        Some(days) => println!("Avg last play:       {:>3} days ago", days),
        None => println!("Avg last play:         -"),
    }
}

/// Print one row per suggestion.
fn print_suggestion_table(suggestions: &[Suggestion], saved: &[SavedSplit], playlist: &str) {
    println!(
        "{:<26} {:<20} {:>6} {:>5}  {}",
        "Id", "Label", "Tracks", "Saved", "Rule"
    );
    println!("{}", "-".repeat(90));

    for s in suggestions {
        let mark = if splitlist::splits::is_saved(saved, playlist, &s.id) {
            "*"
        } else {
            ""
        };
        println!(
            "{:<26} {:<20} {:>6} {:>5}  {}",
            s.id,
            s.label,
            s.tracks.len(),
            mark,
            s.rule_description
        );
    }
}

fn print_thresholds(state: &ThresholdState) {
    println!("Preset: {}", state.preset);
    for field in ThresholdField::ALL {
        println!("  {:<26} {}", field.key(), field.get(&state.config));
    }
}

fn print_saved_splits(splits: &[&SavedSplit]) {
    println!(
        "{:<24} {:<26} {:>6}  {:<20} {}",
        "Playlist", "Suggestion", "Tracks", "Saved at", "Rule"
    );
    println!("{}", "-".repeat(100));

    for s in splits {
        println!(
            "{:<24} {:<26} {:>6}  {:<20} {}",
            s.playlist_id,
            s.suggestion_id,
            s.track_ids.len(),
            s.saved_at.format("%Y-%m-%d %H:%M"),
            s.rule_description
        );
    }
}
