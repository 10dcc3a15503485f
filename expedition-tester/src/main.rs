mod common;
mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use common::scenario::{get_scenario, list_scenarios};
use common::{parse_seeds, split_csv};
use expedition_game::{
    ExpeditionController, HttpGameClient, MapOverlay, MapRenderer, NodeType, ServiceConfig,
    TerminalGrid,
};
use logic::{LogicTester, MapSpec, ServiceMode, SimulatedServer, default_team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TestMode {
    /// Seeded in-process server (fast, deterministic)
    Simulated,
    /// A live game server over HTTP
    Remote,
}

#[derive(Debug, Parser)]
#[command(name = "expedition-tester", version)]
#[command(about = "Automated expedition runs against a simulated or live game server")]
struct Args {
    /// Where expeditions are sent
    #[arg(long, value_enum, default_value_t = TestMode::Simulated)]
    mode: TestMode,

    /// Scenarios to run (comma-separated, `all` for every scenario)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 5)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print each seed's simulated map with the planned goal route
    #[arg(long)]
    show_map: bool,

    /// Base URL of the game server (remote mode)
    #[arg(long)]
    server_url: Option<String>,

    /// JSON file with endpoint paths, token and timeout (remote mode)
    #[arg(long)]
    service_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = parse_seeds(&args.seeds).context("invalid --seeds")?;
    let mode = build_service_mode(&args)?;

    if args.show_map {
        for &seed in &seeds {
            print_map_preview(seed).await;
        }
    }

    let results = run_scenarios(&args, mode, &scenarios, &seeds).await;
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:20} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🗺  Expedition Automated Tester".bright_cyan().bold());
    println!("{}", "==============================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for (key, _) in list_scenarios() {
            if !scenarios.iter().any(|s| s == key) {
                scenarios.push(key.to_string());
            }
        }
    }
    scenarios
}

fn load_service_config(args: &Args) -> Result<ServiceConfig> {
    let mut config = match &args.service_config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ServiceConfig::from_json(&raw)
                .map_err(|err| anyhow::anyhow!("invalid service config {}: {err}", path.display()))?
        }
        None => ServiceConfig::default(),
    };
    if let Some(url) = &args.server_url {
        config = config.with_base_url(url.clone());
    }
    Ok(config)
}

fn build_service_mode(args: &Args) -> Result<ServiceMode> {
    match args.mode {
        TestMode::Simulated => Ok(ServiceMode::Simulated),
        TestMode::Remote => {
            let config = load_service_config(args)?;
            log::info!("sending expeditions to {}", config.base_url);
            let client = HttpGameClient::new(config).context("failed to build HTTP client")?;
            Ok(ServiceMode::Remote(Arc::new(client)))
        }
    }
}

async fn run_scenarios(
    args: &Args,
    mode: ServiceMode,
    scenarios: &[String],
    seeds: &[u64],
) -> Vec<logic::ScenarioResult> {
    println!(
        "{}",
        format!("🧭 Running Expedition Tests ({})", mode.label())
            .bright_yellow()
            .bold()
    );
    println!("{}", "-".repeat(30).yellow());

    let tester = LogicTester::new(mode, args.verbose);
    let mut results = Vec::new();
    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            results.extend(tester.run_scenario(&scenario, seeds, args.iterations).await);
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }
    results
}

/// Start a throwaway expedition on the simulated server and draw its map.
async fn print_map_preview(seed: u64) {
    let server = Arc::new(SimulatedServer::new(seed, MapSpec::default(), Default::default()));
    let mut controller =
        ExpeditionController::new(Arc::clone(&server), server, Default::default());
    let started = controller
        .start_expedition(logic::sim_server::SIM_ISLAND, logic::sim_server::SIM_FACILITY, default_team())
        .await;
    if let Err(err) = started {
        eprintln!("⚠️  Could not preview seed {seed}: {err}");
        return;
    }
    let Some(session) = controller.session() else {
        return;
    };
    let goal = session
        .map()
        .nodes()
        .iter()
        .find(|node| node.node_type == NodeType::Goal)
        .map(|node| node.id.clone());
    let route = goal
        .and_then(|goal| controller.plan_move(&goal).ok())
        .map(|plan| plan.positions)
        .unwrap_or_default();
    let grid = TerminalGrid::default().render(
        session.map(),
        MapOverlay {
            current_node_id: Some(session.current_node_id()),
            path: &route,
        },
    );
    println!("{} (seed {seed}, {} steps to goal)", "Map".bold(), route.len().saturating_sub(1));
    println!("{grid}");
}

fn write_reports(args: &Args, results: &[logic::ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                logic::reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Expedition Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
