//! Scroll Resistance CLI
//!
//! Manage persisted settings and drive the resistance engine from a terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use resist_core::{host_from_url, ListKind, ResistanceField, ScrollDelta, WheelEvent};
use resist_runtime::{forward_changes, PageController, PageEvent, PageRuntime, RecordingViewport, Viewport, PAGE_QUEUE_CAPACITY};
use resist_store::{FileStore, SharedStore, FILE_POLL_INTERVAL};
use resist_surfaces::{ensure_defaults, ListEdit, OptionsPage, Popup, ResistanceForm, Trigger};

#[derive(Parser)]
#[command(name = "scroll-resistance")]
#[command(author, version, about = "Scroll Resistance: make endless feeds push back", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file
    #[arg(long, env = "SCROLL_RESISTANCE_STORE", default_value = "scroll-resistance.json", global = true)]
    store: PathBuf,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed defaults and repair malformed settings
    Init,

    /// Print the current settings
    Show,

    /// Switch between whitelist and blacklist mode
    Mode {
        /// `whitelist` or `blacklist`
        mode: String,
    },

    /// Add a host to a list
    Add {
        /// `whitelist` or `blacklist`
        list: ListKind,
        /// Hostname or URL
        host: String,
    },

    /// Remove a host from a list
    Remove {
        /// `whitelist` or `blacklist`
        list: ListKind,
        host: String,
    },

    /// Edit the resistance curve
    Resistance {
        #[command(subcommand)]
        action: ResistanceAction,
    },

    /// Show what the popup would show for a tab
    Site {
        /// Tab URL
        url: String,

        /// Add the site to the list of the current mode
        #[arg(long)]
        add: bool,
    },

    /// Replay wheel deltas through the engine without a live page
    Simulate {
        /// Page URL
        #[arg(short, long)]
        url: String,

        /// Vertical wheel deltas, in order
        #[arg(short, long = "delta", allow_negative_numbers = true, num_args = 1..)]
        deltas: Vec<f64>,

        /// Idle seconds to recover after the last delta
        #[arg(long, default_value = "0")]
        idle: u32,
    },

    /// Run a live page reading `dx dy` wheel lines from stdin; settings
    /// edited from another shell apply while it runs
    Watch {
        /// Page URL
        #[arg(short, long)]
        url: String,
    },
}

#[derive(Subcommand)]
enum ResistanceAction {
    /// Update curve parameters; omitted ones keep their value
    Set(CurveArgs),

    /// Restore the default curve
    Reset,
}

#[derive(Args)]
struct CurveArgs {
    #[arg(long, allow_hyphen_values = true)]
    base: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    increment: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    max: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    recovery: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    distance_weight: Option<String>,
}

impl From<CurveArgs> for ResistanceForm {
    fn from(args: CurveArgs) -> Self {
        Self {
            base_multiplier: args.base,
            increment_per_scroll: args.increment,
            max_multiplier: args.max,
            recovery_per_second: args.recovery,
            distance_weight: args.distance_weight,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let file_store = Arc::new(FileStore::new(&cli.store));
    let store: SharedStore = file_store.clone();

    match cli.command {
        Commands::Init => run_init(store).await?,
        Commands::Show => run_show(store).await?,
        Commands::Mode { mode } => {
            let mut options = hydrated(store).await?;
            let mode = options.set_mode(&mode).await?;
            println!("Mode set to {}", mode);
        }
        Commands::Add { list, host } => {
            let mut options = hydrated(store).await?;
            print_edit(options.add_host(list, &host).await?, list);
        }
        Commands::Remove { list, host } => {
            let mut options = hydrated(store).await?;
            print_edit(options.remove_host(list, &host).await?, list);
        }
        Commands::Resistance { action } => run_resistance(store, action).await?,
        Commands::Site { url, add } => run_site(store, &url, add).await?,
        Commands::Simulate { url, deltas, idle } => run_simulate(store, &url, &deltas, idle).await?,
        Commands::Watch { url } => run_watch(file_store, &url).await?,
    }

    Ok(())
}

async fn hydrated(store: SharedStore) -> Result<OptionsPage> {
    let mut options = OptionsPage::new(store);
    options.hydrate().await?;
    Ok(options)
}

async fn run_init(store: SharedStore) -> Result<()> {
    let report = ensure_defaults(store.as_ref(), Trigger::Installed).await?;

    if report.is_clean() {
        println!("✅ Settings already valid");
    } else {
        println!("🔧 Repaired: {}", report.repaired.join(", "));
    }
    Ok(())
}

async fn run_show(store: SharedStore) -> Result<()> {
    let options = hydrated(store).await?;
    let settings = options.settings();

    println!("Mode: {}", settings.mode);
    for kind in [ListKind::Whitelist, ListKind::Blacklist] {
        let hosts = options.sorted_list(kind);
        if hosts.is_empty() {
            println!("{}: (none)", kind);
        } else {
            println!("{}: {}", kind, hosts.join(", "));
        }
    }

    println!("\nResistance:");
    let curve = settings.resistance;
    println!("   Base multiplier:      {}", curve.base_multiplier);
    println!("   Increment per scroll: {}", curve.increment_per_scroll);
    println!("   Max multiplier:       {}", curve.max_multiplier);
    println!("   Recovery per second:  {}", curve.recovery_per_second);
    println!("   Distance weight:      {}", curve.distance_weight);
    Ok(())
}

fn print_edit(edit: ListEdit, kind: ListKind) {
    match edit {
        ListEdit::Added(host) => println!("Added {} to {}", host, kind),
        ListEdit::AlreadyPresent(host) => println!("{} is already in {}", host, kind),
        ListEdit::Removed(host) => println!("Removed {} from {}", host, kind),
        ListEdit::NotPresent(host) => println!("{} is not in {}", host, kind),
    }
}

async fn run_resistance(store: SharedStore, action: ResistanceAction) -> Result<()> {
    let mut options = hydrated(store).await?;

    let saved = match action {
        ResistanceAction::Set(args) => options.save_resistance(&ResistanceForm::from(args)).await?,
        ResistanceAction::Reset => options.reset_resistance().await?,
    };

    for field in &saved.rejected {
        println!("⚠️  Ignored invalid {}", field_flag(*field));
    }
    println!("{}", saved.status);
    println!("{}", saved.config.to_value());
    Ok(())
}

fn field_flag(field: ResistanceField) -> &'static str {
    match field {
        ResistanceField::BaseMultiplier => "--base",
        ResistanceField::IncrementPerScroll => "--increment",
        ResistanceField::MaxMultiplier => "--max",
        ResistanceField::RecoveryPerSecond => "--recovery",
        ResistanceField::DistanceWeight => "--distance-weight",
    }
}

async fn run_site(store: SharedStore, url: &str, add: bool) -> Result<()> {
    let mut popup = Popup::open(store, Some(url)).await;

    if add {
        let edit = popup.add_current_site().await?;
        print_edit(edit, popup.mode().list_kind());
    }

    let status = popup.status();
    println!("Mode: {}", popup.mode());
    println!("{}", status.message);
    if status.action_enabled {
        println!("Action: {} (scroll-resistance site --add {})", status.action_label, url);
    } else if !status.action_label.is_empty() {
        println!("Action: {}", status.action_label);
    }
    Ok(())
}

fn page_host(url: &str) -> Result<String> {
    host_from_url(url).ok_or_else(|| anyhow!("Cannot take a hostname from {:?}", url))
}

async fn run_simulate(store: SharedStore, url: &str, deltas: &[f64], idle: u32) -> Result<()> {
    let mut page = PageController::new(&page_host(url)?);
    page.load_settings(store.as_ref())
        .await
        .context("Failed to load settings")?;

    println!(
        "🖱️  {} on {} ({:?})\n",
        if page.is_active() { "Resistance enabled" } else { "Resistance disabled" },
        page.hostname(),
        page.phase()
    );

    let mut viewport = RecordingViewport::new();
    for delta in deltas {
        let event = WheelEvent::vertical(*delta);
        if page.handle_wheel(&event, &mut viewport) {
            let applied = viewport.scrolls.last().map(|d| d.top).unwrap_or_default();
            println!(
                "wheel {:>8.1} -> {:>8.2}   units {:>6.2}   x{:.2}",
                delta,
                applied,
                page.engine().scroll_units(),
                page.engine().multiplier()
            );
        } else {
            println!("wheel {:>8.1} -> native", delta);
        }
    }

    for second in 1..=idle {
        let result = page.tick();
        println!(
            "idle {:>3}s   units {:>6.2}   x{:.2}",
            second, result.scroll_units, result.multiplier
        );
        if result.stop_timer {
            break;
        }
    }

    println!("\n📜 Scrolled {:.2} of {:.2} requested", viewport.top, deltas.iter().sum::<f64>());
    Ok(())
}

/// Prints every adjusted scroll
struct StdoutViewport {
    top: f64,
}

impl Viewport for StdoutViewport {
    fn scroll_by(&mut self, delta: ScrollDelta) -> Result<()> {
        self.top += delta.top;
        println!("scroll ({:.2}, {:.2}) -> top {:.2}", delta.left, delta.top, self.top);
        Ok(())
    }
}

async fn run_watch(file_store: Arc<FileStore>, url: &str) -> Result<()> {
    let host = page_host(url)?;
    let (tx, rx) = mpsc::channel(PAGE_QUEUE_CAPACITY);

    // Picks up edits made by other `scroll-resistance` invocations
    let watcher = file_store
        .watch(FILE_POLL_INTERVAL)
        .await
        .context("Failed to read settings file")?;
    let store: SharedStore = file_store;

    let forwarder = forward_changes(&store, tx.clone());
    let runtime = PageRuntime::new(&host, store.clone(), StdoutViewport { top: 0.0 });
    let page = tokio::spawn(runtime.run(rx));

    println!("👀 Watching {}. Enter `dx dy` per wheel event, `mode <m>`, `add <list> <host>` or `remove <list> <host>`.", host);

    let mut options = hydrated(store).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => continue,
            ["mode", mode] => {
                if let Err(e) = options.set_mode(mode).await {
                    warn!("{}", e);
                }
            }
            ["add", list, host] | ["remove", list, host] => {
                let kind: ListKind = match list.parse() {
                    Ok(kind) => kind,
                    Err(e) => {
                        warn!("{}", e);
                        continue;
                    }
                };
                let edit = if words[0] == "add" {
                    options.add_host(kind, host).await
                } else {
                    options.remove_host(kind, host).await
                };
                match edit {
                    Ok(edit) => print_edit(edit, kind),
                    Err(e) => warn!("{}", e),
                }
            }
            _ => match parse_wheel(&words) {
                Some(event) => {
                    if tx.send(PageEvent::Wheel(event)).await.is_err() {
                        break;
                    }
                }
                None => warn!("Unrecognized input: {}", line),
            },
        }
    }

    let _ = tx.send(PageEvent::Unload).await;
    let session = page.await?;
    forwarder.abort();
    watcher.abort();

    println!(
        "\n📊 {} wheel events, {} resisted, {} recovery ticks",
        session.stats.wheel_events, session.stats.handled, session.stats.recovery_ticks
    );
    Ok(())
}

/// `dy`, `dx dy`, optionally followed by `ctrl`, `meta` or `prevented`.
/// Only finite deltas are accepted.
fn parse_wheel(words: &[&str]) -> Option<WheelEvent> {
    let numbers: Vec<f64> = words
        .iter()
        .map_while(|w| w.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();

    let mut event = match numbers.as_slice() {
        [dy] => WheelEvent::vertical(*dy),
        [dx, dy] => WheelEvent::new(*dx, *dy),
        _ => return None,
    };

    for flag in &words[numbers.len()..] {
        match *flag {
            "ctrl" => event.ctrl_key = true,
            "meta" => event.meta_key = true,
            "prevented" => event.default_prevented = true,
            _ => return None,
        }
    }
    Some(event)
}
