mod config;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use config::{select_protocols, OutputFormat, RunArgs, Settings};
use gas_analysis::metrics::{format_amount, format_eth, format_gwei};
use gas_data::chain::{ChainClients, RpcChainClient};
use gas_data::store::{BenchmarkRecord, ReportStore, DEFAULT_REPORT_PATH};
use gas_data::types::GasMetrics;
use gas_protocols::{run_all, ProtocolReport};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gas-benchmarks")]
#[command(about = "Average on-chain gas cost of privacy protocol operations")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Report file read and rewritten by the benchmarks.
    #[arg(long, global = true, env = "BENCHMARKS_PATH", default_value = DEFAULT_REPORT_PATH)]
    benchmarks_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample recent transactions and rewrite the report.
    Run(RunArgs),
    /// Print the current report without touching the chain.
    Show(ShowArgs),
    /// List the events and topic hashes each operation is matched on.
    Topics(TopicsArgs),
}

#[derive(Args, Debug)]
struct ShowArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Args, Debug)]
struct TopicsArgs {
    /// Protocol to list; repeat to select several. Defaults to all.
    #[arg(long = "protocol", value_name = "NAME")]
    protocols: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let store = ReportStore::new(cli.benchmarks_path);

    match cli.command {
        Commands::Run(args) => handle_run(&store, args).await,
        Commands::Show(args) => handle_show(&store, args).await,
        Commands::Topics(args) => handle_topics(args),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn handle_run(store: &ReportStore, args: RunArgs) -> Result<()> {
    let settings = Settings::from_args(&args).wrap_err("invalid configuration")?;

    let mut clients = ChainClients::new();
    for endpoint in &settings.endpoints {
        // operations on an unreachable network fail on their own
        match RpcChainClient::new(endpoint, &settings.benchmark.scan.retry).await {
            Ok(client) => clients.insert(client),
            Err(e) => tracing::error!(network = %endpoint.network, error = %e, "skipping network"),
        }
    }

    let mut record = store.load().await;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.set_message(format!(
        "benchmarking {} protocol(s)",
        settings.protocols.len()
    ));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let started = chrono::Utc::now();
    let reports = run_all(&settings.protocols, &clients, &settings.benchmark).await;
    let elapsed = chrono::Utc::now() - started;

    pb.finish_and_clear();

    let written: usize = reports
        .iter()
        .map(|report| report.merge_into(&mut record))
        .sum();
    let failed: usize = reports.iter().map(|report| report.failures().count()).sum();

    store
        .save(&record)
        .await
        .wrap_err("failed to write benchmark report")?;

    info!(
        written,
        failed,
        elapsed_secs = elapsed.num_seconds(),
        path = %store.path().display(),
        "run command finished"
    );

    match args.output {
        OutputFormat::Table => print_run_table(&reports),
        OutputFormat::Json => print!("{}", record.to_json()?),
    }

    Ok(())
}

async fn handle_show(store: &ReportStore, args: ShowArgs) -> Result<()> {
    let record = store.load().await;

    match args.output {
        OutputFormat::Json => print!("{}", record.to_json()?),
        OutputFormat::Table if record.is_empty() => {
            println!("No benchmarks recorded in {}", store.path().display());
        }
        OutputFormat::Table => print_record_table(&record),
    }

    Ok(())
}

fn handle_topics(args: TopicsArgs) -> Result<()> {
    let protocols = select_protocols(&args.protocols).wrap_err("invalid --protocol")?;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Protocol", "Operation", "Network", "Scanned", "Matching", "Event", "Topic",
    ]);

    for protocol in &protocols {
        for op in &protocol.operations {
            let scanned: Vec<_> = op.scan_events.iter().map(|e| e.topic()).collect();
            let pattern = match &op.pattern {
                gas_protocols::EventPattern::Sequence(events) => events
                    .iter()
                    .enumerate()
                    .map(|(i, event)| (format!("#{}", i + 1), *event))
                    .collect::<Vec<_>>(),
                gas_protocols::EventPattern::Topics {
                    required,
                    forbidden,
                } => required
                    .iter()
                    .map(|(address, event)| (format!("requires @ {address}"), *event))
                    .chain(
                        forbidden
                            .iter()
                            .map(|(address, event)| (format!("forbids @ {address}"), *event)),
                    )
                    .collect(),
            };

            for (role, event) in pattern {
                let topic = event.topic();
                table.add_row(vec![
                    protocol.key(),
                    op.name.to_string(),
                    op.network.to_string(),
                    if scanned.contains(&topic) { "yes" } else { "" }.to_string(),
                    role,
                    event.signature(),
                    topic.to_string(),
                ]);
            }
        }
    }

    println!("{table}");
    Ok(())
}

fn metrics_cells(metrics: &GasMetrics) -> [String; 3] {
    [
        format_amount(&metrics.average_gas_used),
        format_gwei(&metrics.average_gas_price),
        format_eth(&metrics.average_tx_fee),
    ]
}

fn print_run_table(reports: &[ProtocolReport]) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Protocol",
        "Operation",
        "Status",
        "Avg Gas Used",
        "Avg Gas Price (gwei)",
        "Avg Fee (ETH)",
    ]);

    for report in reports {
        for (operation, result) in &report.operations {
            let mut row = vec![report.key.clone(), operation.clone()];
            match result {
                Ok(metrics) => {
                    row.push("ok".to_string());
                    row.extend(metrics_cells(metrics));
                }
                Err(e) => {
                    row.push("failed".to_string());
                    row.push(format!("{e}"));
                }
            }
            table.add_row(row);
        }
    }

    println!("{table}");
}

fn print_record_table(record: &BenchmarkRecord) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Protocol",
        "Operation",
        "Avg Gas Used",
        "Avg Gas Price (gwei)",
        "Avg Fee (ETH)",
    ]);

    for (protocol, operation, metrics) in record.iter() {
        let mut row = vec![protocol.to_string(), operation.to_string()];
        row.extend(metrics_cells(metrics));
        table.add_row(row);
    }

    println!("{table}");
}
