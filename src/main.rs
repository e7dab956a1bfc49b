use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};

use proctide::action::{ActionRequest, CpuSet, ProcessAction, Signal};
use proctide::bridge::services::{ServiceCommand, ServiceManager};
use proctide::bridge::startup;
use proctide::config::{Config, load_config, load_config_from_path};
use proctide::error::ActionError;
use proctide::logging;
use proctide::report;
use proctide::sampler;
use proctide::system::collector::Collector;
use proctide::system::control::ActionExecutor;
use proctide::system::details;
use proctide::system::snapshot::Snapshot;
use proctide::system::sort::{SortKey, SortOrder};

/// Gap between the two passes of one-shot commands, so CPU rates are real.
const PRIMING_GAP: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(
    name = "proctide",
    version,
    about = "Live process and resource monitor with process controls"
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Refresh rate in milliseconds
    #[arg(long, global = true)]
    refresh_rate: Option<u64>,

    /// Include system processes
    #[arg(long, global = true, conflicts_with = "hide_system")]
    show_system: bool,

    /// Exclude system processes
    #[arg(long, global = true)]
    hide_system: bool,

    /// Case-insensitive filter over pid, name, user and command
    #[arg(long, global = true)]
    search: Option<String>,

    /// Sort column: pid, name, user, cpu, mem, status, nice, threads, fds, start, cmd
    #[arg(long, global = true)]
    sort: Option<String>,

    /// Sort ascending instead of descending
    #[arg(long, global = true)]
    ascending: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the status line and top processes after every pass
    Watch {
        /// Stop after this many passes
        #[arg(long)]
        passes: Option<u64>,
        /// Rows shown per pass
        #[arg(long, default_value_t = 15)]
        top: usize,
    },
    /// Print one refreshed process table
    List {
        /// Maximum rows to print
        #[arg(long)]
        limit: Option<usize>,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-user totals
    Users {
        #[arg(long)]
        json: bool,
    },
    /// Detailed properties of one process
    Inspect {
        pid: u32,
        #[arg(long)]
        json: bool,
    },
    /// Ask a process to terminate
    Term { pid: u32 },
    /// Kill a process outright
    Kill { pid: u32 },
    /// Suspend a process
    Stop { pid: u32 },
    /// Resume a suspended process
    Cont { pid: u32 },
    /// Change a process's nice value
    Renice {
        pid: u32,
        #[arg(allow_hyphen_values = true)]
        nice: i32,
    },
    /// Show or set the processors a process may run on (`*`, `0,2-3`)
    Affinity { pid: u32, cpus: Option<String> },
    /// List or control system services
    Services {
        #[command(subcommand)]
        action: Option<ServicesAction>,
    },
    /// List or toggle desktop autostart entries
    Startup {
        #[command(subcommand)]
        action: Option<StartupAction>,
    },
}

#[derive(Subcommand)]
enum ServicesAction {
    List,
    Start { unit: String },
    Stop { unit: String },
    Restart { unit: String },
}

#[derive(Subcommand)]
enum StartupAction {
    List,
    /// Enable or disable a user-scope entry
    Toggle { path: PathBuf },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.log_json)?;
    let config = load_config_for_cli(&cli);
    let sort = (
        SortKey::from_str_config(&config.general.default_sort),
        if config.general.sort_descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        },
    );

    match cli.command.unwrap_or(Command::Watch {
        passes: None,
        top: 15,
    }) {
        Command::Watch { passes, top } => watch(config, sort, passes, top).await,
        Command::List { limit, json } => {
            let snapshot = sample_once(&config).await?;
            let rows = snapshot.sorted(sort.0, sort.1);
            let rows = &rows[..limit.unwrap_or(rows.len()).min(rows.len())];
            if json {
                println!("{}", serde_json::to_string_pretty(rows)?);
            } else {
                print!("{}", report::host_lines(&snapshot));
                print!("{}", report::process_table(rows, SystemTime::now()));
            }
            Ok(())
        }
        Command::Users { json } => {
            let snapshot = sample_once(&config).await?;
            let owners = snapshot.owners();
            if json {
                println!("{}", serde_json::to_string_pretty(&owners)?);
            } else {
                print!("{}", report::owner_table(&owners));
            }
            Ok(())
        }
        Command::Inspect { pid, json } => {
            let found = tokio::task::spawn_blocking(move || details::inspect(pid)).await?;
            match found {
                Ok(details) if json => {
                    println!("{}", serde_json::to_string_pretty(&details)?);
                    Ok(())
                }
                Ok(details) => {
                    print!("{}", report::details(&details, SystemTime::now()));
                    Ok(())
                }
                Err(err) => Err(eyre!("{} ({})", err, err.kind().label())),
            }
        }
        Command::Term { pid } => signal(&config, pid, Signal::Terminate).await,
        Command::Kill { pid } => signal(&config, pid, Signal::Kill).await,
        Command::Stop { pid } => signal(&config, pid, Signal::Stop).await,
        Command::Cont { pid } => signal(&config, pid, Signal::Continue).await,
        Command::Renice { pid, nice } => {
            apply(&config, ActionRequest::new(pid, ProcessAction::Renice(nice))).await
        }
        Command::Affinity { pid, cpus } => affinity(&config, pid, cpus).await,
        Command::Services { action } => {
            service_units(&config, action.unwrap_or(ServicesAction::List)).await
        }
        Command::Startup { action } => {
            startup_entries(&config, action.unwrap_or(StartupAction::List))
        }
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if cli.show_system {
        config.filter.show_system_processes = true;
    }
    if cli.hide_system {
        config.filter.show_system_processes = false;
    }
    if let Some(ref search) = cli.search {
        config.filter.search_text = search.clone();
    }
    if let Some(ref sort) = cli.sort {
        config.general.default_sort = sort.clone();
    }
    if cli.ascending {
        config.general.sort_descending = false;
    }

    config
}

async fn watch(
    config: Config,
    sort: (SortKey, SortOrder),
    passes: Option<u64>,
    top: usize,
) -> Result<()> {
    let collector = Collector::new(config.classification(), config.general.history_length);
    let handle = sampler::spawn(
        collector,
        config.sampling_settings(),
        config.pass_timeout(),
        config.action_timeout(),
        ActionExecutor::new(),
    );
    let mut snapshots = handle.subscribe();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }

        let snapshot: Arc<Snapshot> = Arc::clone(&snapshots.borrow_and_update());
        let rows = snapshot.sorted(sort.0, sort.1);
        println!();
        print!("{}", report::host_lines(&snapshot));
        print!(
            "{}",
            report::process_table(&rows[..top.min(rows.len())], SystemTime::now())
        );

        if passes.is_some_and(|limit| snapshot.pass >= limit) {
            break;
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Two passes a short gap apart; the second carries real CPU rates.
async fn sample_once(config: &Config) -> Result<Snapshot> {
    let settings = config.sampling_settings();
    let mut collector = Collector::new(config.classification(), config.general.history_length);
    let snapshot = tokio::task::spawn_blocking(move || {
        collector.refresh(&settings);
        std::thread::sleep(PRIMING_GAP);
        collector.refresh(&settings)
    })
    .await
    .wrap_err("sampling pass failed")?;
    Ok(snapshot)
}

fn report_action(result: Result<String, ActionError>) -> Result<()> {
    match result {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(err) => Err(eyre!("{} ({})", err, err.kind().label())),
    }
}

async fn signal(config: &Config, pid: u32, signal: Signal) -> Result<()> {
    apply(config, ActionRequest::new(pid, ProcessAction::Signal(signal))).await
}

async fn apply(config: &Config, request: ActionRequest) -> Result<()> {
    let pid = request.pid;
    let result = sampler::run_bounded(pid, config.action_timeout(), move || {
        ActionExecutor::new().apply(&request)
    })
    .await;
    report_action(result.map(|outcome| outcome.message))
}

async fn affinity(config: &Config, pid: u32, cpus: Option<String>) -> Result<()> {
    let result = sampler::run_bounded(pid, config.action_timeout(), move || {
        let executor = ActionExecutor::new();
        match cpus {
            None => executor
                .current_affinity(pid)
                .map(|set| format!("PID {pid} may run on CPUs {set}")),
            Some(text) => {
                let set = CpuSet::parse(&text, executor.logical_cpus())?;
                let request = ActionRequest::new(pid, ProcessAction::Affinity(set));
                executor.apply(&request).map(|outcome| outcome.message)
            }
        }
    })
    .await;
    report_action(result)
}

async fn service_units(config: &Config, action: ServicesAction) -> Result<()> {
    let manager = ServiceManager::new(config.bridges.command_timeout());
    let (command, unit) = match action {
        ServicesAction::List => {
            let units = manager.list().await?;
            print!("{}", report::service_table(&units));
            return Ok(());
        }
        ServicesAction::Start { unit } => (ServiceCommand::Start, unit),
        ServicesAction::Stop { unit } => (ServiceCommand::Stop, unit),
        ServicesAction::Restart { unit } => (ServiceCommand::Restart, unit),
    };
    manager.control(command, &unit).await?;
    println!("{} {unit}: ok", command.verb());
    Ok(())
}

fn startup_entries(config: &Config, action: StartupAction) -> Result<()> {
    let user_dir = config.bridges.user_autostart_dir();
    match action {
        StartupAction::List => {
            let entries = startup::scan(user_dir.as_deref(), &config.bridges.system_autostart_dirs);
            print!("{}", report::startup_table(&entries));
        }
        StartupAction::Toggle { path } => {
            let user_dir =
                user_dir.ok_or_else(|| eyre!("no user autostart directory on this host"))?;
            let enabled = startup::toggle(&path, &user_dir)?;
            println!(
                "{} {}",
                if enabled { "Enabled" } else { "Disabled" },
                path.display()
            );
        }
    }
    Ok(())
}
