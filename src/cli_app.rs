//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use uu_booster_panel::agent::rpc::AgentClient;
use uu_booster_panel::agent::ubus::UbusTransport;
use uu_booster_panel::cli::runtime::{self, PanelRunConfig};
use uu_booster_panel::cli::signals::SignalHandler;
use uu_booster_panel::cli::watch::{self, WatchConfig};
use uu_booster_panel::core::config::Config;
use uu_booster_panel::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
use uu_booster_panel::logger::jsonl::JsonlConfig;
use uu_booster_panel::panel::controller::ViewController;
use uu_booster_panel::panel::executor::{ActionExecutor, Outcome};
use uu_booster_panel::panel::gate::{self, ActionRequest};
use uu_booster_panel::panel::status::{Status, StatusSource};
use uu_booster_panel::panel::view::PanelView;

/// UU booster panel: status, update checks, and service control over ubus.
#[derive(Debug, Parser)]
#[command(
    name = "ubp",
    author,
    version,
    about = "UU Booster Panel - status and control for the UU game booster",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Fetch and show booster status once.
    Status,
    /// Ask the agent for the latest published version.
    Check(ActionArgs),
    /// Install the latest version.
    Update(ActionArgs),
    /// Start the booster service.
    Start(ActionArgs),
    /// Stop the booster service.
    Stop(ActionArgs),
    /// Restart the booster service.
    Restart(ActionArgs),
    /// Interactive panel with live status and keyboard controls.
    Panel(PanelArgs),
    /// Print one status line per poll until interrupted.
    Watch(WatchArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Serialize)]
struct ActionArgs {
    /// Run even when the current status does not offer the action.
    #[arg(long)]
    force: bool,
    /// Give up waiting for the action and its status refresh after this long.
    #[arg(long, default_value_t = 120, value_name = "SECONDS")]
    wait_secs: u64,
}

impl Default for ActionArgs {
    fn default() -> Self {
        Self {
            force: false,
            wait_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Args, Serialize)]
struct PanelArgs {
    /// Redraw interval when nothing changes.
    #[arg(long, default_value_t = 1_000, value_name = "MILLISECONDS")]
    refresh_ms: u64,
}

impl Default for PanelArgs {
    fn default() -> Self {
        Self { refresh_ms: 1_000 }
    }
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct WatchArgs {
    /// Poll interval override in seconds.
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
    /// Exit after this many lines.
    #[arg(long, value_name = "N")]
    count: Option<usize>,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print the config file path in use.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration file and env overrides.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input, or an action the current status does not offer.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure, including an unreachable agent.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// The agent ran the action and reported failure.
    #[error("{0}")]
    ActionFailed(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::ActionFailed(_) => 4,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Status => run_status(cli),
        Command::Check(args) => run_action(cli, ActionRequest::CheckVersion, args),
        Command::Update(args) => run_action(cli, ActionRequest::Update, args),
        Command::Start(args) => run_action(cli, ActionRequest::Start, args),
        Command::Stop(args) => run_action(cli, ActionRequest::Stop, args),
        Command::Restart(args) => run_action(cli, ActionRequest::Restart, args),
        Command::Panel(args) => run_panel(cli, args),
        Command::Watch(args) => run_watch(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── session plumbing ────────────────────

/// Loaded config plus a running activity logger. Dropping the session flushes
/// the log.
struct Session {
    config: Config,
    client: AgentClient,
    log: ActivityLoggerHandle,
    logger_join: Option<JoinHandle<()>>,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let config =
            Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))?;
        let hash = config
            .stable_hash()
            .map_err(|e| CliError::Internal(e.to_string()))?;

        let (log, logger_join) = match spawn_logger(JsonlConfig::from_paths(&config.paths)) {
            Ok((handle, join)) => (handle, Some(join)),
            Err(e) => {
                eprintln!("[UBP-CLI] activity log disabled: {e}");
                (ActivityLoggerHandle::disabled(), None)
            }
        };
        log.send(ActivityEvent::ConfigLoaded {
            path: config.paths.config_file.to_string_lossy().into_owned(),
            config_hash: hash.clone(),
        });

        if cli.verbose {
            eprintln!(
                "config: {} (hash {hash})",
                config.paths.config_file.display()
            );
            eprintln!(
                "agent: {} call {} via {}",
                config.agent.ubus_bin.display(),
                config.agent.object,
                config.agent.status_call.method().name()
            );
        }

        let transport = UbusTransport::from_config(&config.agent);
        let client = AgentClient::new(Arc::new(transport));
        Ok(Self {
            config,
            client,
            log,
            logger_join,
        })
    }

    fn controller(&self) -> ViewController {
        ViewController::new(self.client.clone(), &self.config, self.log.clone())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.log.shutdown();
        if let Some(join) = self.logger_join.take() {
            let _ = join.join();
        }
    }
}

// ──────────────────── status ────────────────────

fn run_status(cli: &Cli) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let source = StatusSource::new(
        session.client.clone(),
        session.config.agent.status_call,
        session.log.clone(),
    );

    let (status, error) = match source.try_fetch() {
        Ok(status) => (status, None),
        Err(e) => (Status::unavailable(), Some(e)),
    };
    let availability = gate::derive(&status, session.config.panel.availability_policy);
    let actions: Vec<&str> = ActionRequest::ALL
        .into_iter()
        .filter(|a| availability.allows(*a))
        .map(ActionRequest::label)
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                print_status_human(&session.config, &status, &actions);
            }
            if let Some(e) = &error
                && cli.verbose
            {
                eprintln!("  Error: {e}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "status",
                "object": session.config.agent.object,
                "status": status,
                "actions": actions,
                "error": error.as_ref().map(|e| json!({"code": e.code(), "message": e.to_string()})),
            });
            write_json_line(&payload)?;
        }
    }

    match error {
        Some(e) => Err(CliError::Runtime(format!("booster agent unavailable: {e}"))),
        None => Ok(()),
    }
}

fn print_status_human(config: &Config, status: &Status, actions: &[&str]) {
    println!("UU Booster ({})", config.agent.object);
    if !status.available {
        println!(
            "  Status:   {}",
            status.status_text.as_deref().unwrap_or("unavailable").red()
        );
        return;
    }
    println!(
        "  Version:  {}",
        status.installed_version.as_deref().unwrap_or("Not installed")
    );
    let service = if status.running {
        "Running".green()
    } else {
        "Stopped".yellow()
    };
    println!("  Service:  {service}");
    let update = if status.update_available {
        "Update Available".yellow()
    } else {
        "Up to date".green()
    };
    println!("  Update:   {update}");
    if let Some(latest) = &status.latest_version {
        println!("  Latest:   {latest}");
    }
    if let Some(text) = &status.status_text {
        println!("  Note:     {text}");
    }
    println!(
        "  Actions:  {}",
        if actions.is_empty() {
            "none".to_string()
        } else {
            actions.join(", ")
        }
    );
}

// ──────────────────── one-shot actions ────────────────────

fn run_action(cli: &Cli, action: ActionRequest, args: &ActionArgs) -> Result<(), CliError> {
    let session = Session::open(cli)?;
    let mut controller = session.controller();
    controller
        .mount()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let outcome = if controller.click(action) {
        if !controller.settle(Duration::from_secs(args.wait_secs)) {
            controller.unmount();
            return Err(CliError::Runtime(format!(
                "{action} did not finish within {}s",
                args.wait_secs
            )));
        }
        controller
            .model()
            .last_outcome
            .as_ref()
            .filter(|(a, _)| *a == action)
            .map(|(_, outcome)| outcome.clone())
            .ok_or_else(|| CliError::Internal(format!("{action} finished without an outcome")))?
    } else if args.force {
        if cli.verbose {
            eprintln!("{action} is not offered by the current status; running anyway (--force)");
        }
        let executor = ActionExecutor::new(session.client.clone(), session.config.agent.update_call);
        executor.run(action)
    } else {
        let view = controller.view();
        controller.unmount();
        let reason = view
            .status_text
            .clone()
            .unwrap_or_else(|| format!("service is {}", view.running_label.to_lowercase()));
        return Err(CliError::User(format!(
            "{} is not available right now ({reason}); use --force to run it anyway",
            action.caption()
        )));
    };

    let view = controller.view();
    controller.unmount();
    report_outcome(cli, action, &outcome, &view)
}

fn report_outcome(
    cli: &Cli,
    action: ActionRequest,
    outcome: &Outcome,
    view: &PanelView,
) -> Result<(), CliError> {
    let notice = view.message.as_ref().map(|m| m.text.clone());
    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                match outcome {
                    Outcome::Success { output, .. } => {
                        let text = notice.as_deref().unwrap_or("Done");
                        println!("{} {text}", "✔".green());
                        if let Some(report) = output {
                            println!("{report}");
                        }
                    }
                    Outcome::Failure { message } => {
                        println!("{} {message}", "✖".red());
                    }
                }
                println!(
                    "  Version: {}  Service: {}  Update: {}",
                    view.version_label, view.running_label, view.update_label
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": action.label(),
                "outcome": outcome,
                "notice": notice,
                "view": view,
            });
            write_json_line(&payload)?;
        }
    }

    match outcome {
        Outcome::Success { .. } => Ok(()),
        Outcome::Failure { message } => Err(CliError::ActionFailed(format!(
            "{} failed: {message}",
            action.caption()
        ))),
    }
}

// ──────────────────── long-running views ────────────────────

fn run_panel(cli: &Cli, args: &PanelArgs) -> Result<(), CliError> {
    if !io::stdout().is_terminal() {
        return Err(CliError::User(
            "the interactive panel needs a terminal; use `ubp watch` instead".to_string(),
        ));
    }
    let session = Session::open(cli)?;
    let mut controller = session.controller();
    let signals = SignalHandler::new();
    let config = PanelRunConfig {
        object: session.config.agent.object.clone(),
        redraw: Duration::from_millis(args.refresh_ms.max(50)),
        color: !cli.no_color,
    };
    runtime::run(&mut controller, &signals, &config)
        .map_err(|e| CliError::Runtime(format!("panel: {e}")))
}

fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<(), CliError> {
    let mut session = Session::open(cli)?;
    if let Some(secs) = args.interval {
        session.config.panel.poll_interval_secs = secs;
        session
            .config
            .validate()
            .map_err(|e| CliError::User(e.to_string()))?;
    }
    let mut controller = session.controller();
    let signals = SignalHandler::new();
    let config = WatchConfig {
        json: output_mode(cli) == OutputMode::Json,
        count: args.count,
        ..WatchConfig::default()
    };
    let mut stdout = io::stdout().lock();
    watch::run(&mut controller, &signals, &config, &mut stdout)?;
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())
                .map_err(|e| CliError::Runtime(e.to_string()))?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── output helpers ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("UBP_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
