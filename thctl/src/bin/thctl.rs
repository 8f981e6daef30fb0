//! Command-line interface for thctl.
//!
//! Connection settings come from `.thctl.env` (working directory, then
//! home), then the environment, then flags. Results go to stdout as an
//! aligned table or JSON; logs and errors go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use thctl::config::{self, ClientConfig};
use thctl::context::CallContext;
use thctl::error::{ClientError, ErrorKind};
use thctl::lotus::LotusClient;
use thctl::lotus::endpoint;
use thctl::lotus::types::SectorRecord;
use thctl::miner::{self, AggregateError, ListedSector, MinerAggregate};
use thctl::tracing::prelude::*;
use thctl::types::{TokenAmount, format_fil};

const ENV_FILE: &str = ".thctl.env";

#[derive(Parser, Debug)]
#[command(name = "thctl", version, about = "Query Filecoin storage providers through a Lotus node")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Log client activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Node RPC URL or multiaddress [env: LOTUS_API_URL]
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token [env: LOTUS_API_TOKEN]
    #[arg(long, global = true)]
    auth_token: Option<String>,

    /// Per-request timeout, e.g. "30s" [env: LOTUS_API_TIMEOUT]
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Retries for transient failures [env: LOTUS_API_RETRIES]
    #[arg(long, global = true)]
    retries: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filecoin storage provider queries
    Fil {
        #[command(subcommand)]
        command: FilCommand,
    },

    /// Check configuration and node connectivity
    Doctor,
}

#[derive(Subcommand, Debug)]
enum FilCommand {
    /// Miner-level information
    Miner {
        #[command(subcommand)]
        command: MinerCommand,
    },

    /// Sector-level information
    Sectors {
        #[command(subcommand)]
        command: SectorsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MinerCommand {
    /// Full summary: addresses, power, funds, sectors, proving
    Info { miner: String },
    /// Raw and quality-adjusted power with network share
    Power { miner: String },
    /// Available balance and locked funds
    Balance { miner: String },
    /// Current proving deadline
    Deadline { miner: String },
}

#[derive(Args, Debug)]
struct SectorArgs {
    /// Miner id, e.g. f01234
    #[arg(short, long)]
    miner: String,

    /// Sector number
    sector: u64,
}

#[derive(Subcommand, Debug)]
enum SectorsCommand {
    /// List sectors
    List {
        /// Miner id, e.g. f01234
        #[arg(short, long)]
        miner: String,

        /// Include sectors that are not active
        #[arg(long)]
        all: bool,
    },
    /// On-chain sector details
    Info(SectorArgs),
    /// Proving state within its partition
    Status(SectorArgs),
    /// Termination penalty if terminated now
    Penalty(SectorArgs),
    /// Funds vested for the sector
    Vested(SectorArgs),
}

impl Command {
    /// Miner the command is about, for error messages.
    fn miner(&self) -> Option<&str> {
        let Command::Fil { command } = self else {
            return None;
        };
        match command {
            FilCommand::Miner { command } => match command {
                MinerCommand::Info { miner }
                | MinerCommand::Power { miner }
                | MinerCommand::Balance { miner }
                | MinerCommand::Deadline { miner } => Some(miner.as_str()),
            },
            FilCommand::Sectors { command } => match command {
                SectorsCommand::List { miner, .. } => Some(miner.as_str()),
                SectorsCommand::Info(args)
                | SectorsCommand::Status(args)
                | SectorsCommand::Penalty(args)
                | SectorsCommand::Vested(args) => Some(args.miner.as_str()),
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_file = load_env_file();
    let cli = Cli::parse();
    thctl::tracing::init(cli.verbose);
    if let Err(err) = &env_file {
        warn!(error = %format!("{err:#}"), "Ignoring configuration file");
    }

    let config = ClientConfig::from_env().with_overrides(
        cli.connection.api_url.clone(),
        cli.connection.auth_token.clone(),
        cli.connection.timeout,
        cli.connection.retries,
    );

    let ctx = CallContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let result = match &cli.command {
        Command::Doctor => doctor(&ctx, &config, &env_file).await,
        Command::Fil { command } => run_fil(&ctx, &config, command, cli.output).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", describe(&err, cli.command.miner(), &config));
            ExitCode::FAILURE
        }
    }
}

/// Load `.thctl.env` from the working directory, else from home.
///
/// Variables already set in the environment are not overridden.
fn load_env_file() -> Result<Option<PathBuf>> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from);
    let dirs: Vec<PathBuf> = std::iter::once(PathBuf::from(".")).chain(home).collect();
    load_env_file_from(&dirs)
}

/// Load the first `.thctl.env` found in `dirs`.
///
/// A file that exists but does not parse is an error; variables read
/// before the bad line may already be set.
fn load_env_file_from(dirs: &[PathBuf]) -> Result<Option<PathBuf>> {
    let Some(path) = dirs
        .iter()
        .map(|dir| dir.join(ENV_FILE))
        .find(|path| path.is_file())
    else {
        return Ok(None);
    };
    dotenvy::from_path(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(Some(path))
}

/// Turn an error into the message shown to the user.
fn describe(err: &anyhow::Error, miner: Option<&str>, config: &ClientConfig) -> String {
    let client_err = err.chain().find_map(|cause| {
        cause
            .downcast_ref::<ClientError>()
            .or_else(|| cause.downcast_ref::<AggregateError>().map(|e| e.client_error()))
    });
    let Some(client_err) = client_err else {
        return format!("{err:#}");
    };

    match client_err.kind() {
        ErrorKind::NotFound => match miner {
            // Missing sectors already name themselves
            Some(_) if client_err.message().starts_with("sector ") => client_err.to_string(),
            Some(miner) => format!("miner {miner} not found"),
            None => client_err.to_string(),
        },
        ErrorKind::Authentication => {
            "authentication failed: check LOTUS_API_TOKEN or --auth-token".to_string()
        }
        ErrorKind::Connection => format!("could not reach node at {}", config.endpoint),
        ErrorKind::RpcTimeout => "request timed out".to_string(),
        ErrorKind::Canceled => "interrupted".to_string(),
        _ => format!("{err:#}"),
    }
}

async fn run_fil(
    ctx: &CallContext,
    config: &ClientConfig,
    command: &FilCommand,
    output: OutputFormat,
) -> Result<()> {
    let client = LotusClient::new(config)?;

    match command {
        FilCommand::Miner { command } => match command {
            MinerCommand::Info { miner } => miner_info(ctx, &client, miner, output).await,
            MinerCommand::Power { miner } => {
                let power = client.get_miner_power(ctx, miner).await?;
                let share = miner::power_share(
                    power.miner_power.raw_byte_power,
                    power.total_power.raw_byte_power,
                );
                render(output, &power, || {
                    vec![
                        ("Miner", miner.clone()),
                        ("Raw byte power", power.miner_power.raw_byte_power.to_string()),
                        ("Quality adj power", power.miner_power.quality_adj_power.to_string()),
                        ("Network raw power", power.total_power.raw_byte_power.to_string()),
                        ("Network QA power", power.total_power.quality_adj_power.to_string()),
                        ("Network share", format_share(share)),
                        ("Has min power", power.has_min_power.to_string()),
                    ]
                })
            }
            MinerCommand::Balance { miner } => {
                let (available, state) = tokio::try_join!(
                    client.get_miner_available_balance(ctx, miner),
                    client.get_miner_state(ctx, miner),
                )?;
                let balance = BalanceView {
                    miner: miner.clone(),
                    balance: state.balance,
                    available,
                    initial_pledge: state.state.initial_pledge,
                    pre_commit_deposits: state.state.pre_commit_deposits,
                    vesting_funds: state.state.locked_funds,
                    fee_debt: state.state.fee_debt,
                };
                render(output, &balance, || {
                    vec![
                        ("Miner", balance.miner.clone()),
                        ("Balance", balance.balance.to_string()),
                        ("Available", balance.available.to_string()),
                        ("Initial pledge", balance.initial_pledge.to_string()),
                        ("Pre-commit deposits", balance.pre_commit_deposits.to_string()),
                        ("Vesting", balance.vesting_funds.to_string()),
                        ("Fee debt", balance.fee_debt.to_string()),
                    ]
                })
            }
            MinerCommand::Deadline { miner } => {
                let dl = client.get_miner_proving_deadline(ctx, miner).await?;
                render(output, &dl, || {
                    vec![
                        ("Miner", miner.clone()),
                        ("Current epoch", dl.current_epoch.to_string()),
                        ("Deadline", format!("{} of {}", dl.index, dl.period_deadlines)),
                        ("Proving period start", dl.period_start.to_string()),
                        ("Open", dl.open.to_string()),
                        ("Close", dl.close.to_string()),
                        ("Challenge", dl.challenge.to_string()),
                        ("Fault cutoff", dl.fault_cutoff.to_string()),
                    ]
                })
            }
        },
        FilCommand::Sectors { command } => match command {
            SectorsCommand::List { miner, all } => {
                let sectors = miner::list_sector_states(&client, ctx, miner, !all).await?;
                match output {
                    OutputFormat::Table => {
                        print_sector_table(&sectors);
                        Ok(())
                    }
                    _ => print_encoded(output, &sectors),
                }
            }
            SectorsCommand::Info(args) => {
                let sector = client.get_sector_info(ctx, &args.miner, args.sector).await?;
                render(output, &sector, || sector_fields(&sector))
            }
            SectorsCommand::Status(args) => {
                let status = miner::sector_status(&client, ctx, &args.miner, args.sector).await?;
                render(output, &status, || {
                    vec![
                        ("Sector", status.sector_number.to_string()),
                        ("State", status.state.to_string()),
                        ("Deadline", status.deadline.to_string()),
                        ("Partition", status.partition.to_string()),
                        ("Activation", status.activation.to_string()),
                        ("Expiration", status.expiration.to_string()),
                    ]
                })
            }
            SectorsCommand::Penalty(args) => {
                let penalty = client
                    .get_sector_penalty(ctx, &args.miner, args.sector)
                    .await?;
                render_amount(output, args, "Penalty", penalty)
            }
            SectorsCommand::Vested(args) => {
                let vested = client
                    .get_sector_vested(ctx, &args.miner, args.sector)
                    .await?;
                render_amount(output, args, "Vested", vested)
            }
        },
    }
}

#[derive(Serialize)]
struct BalanceView {
    miner: String,
    balance: TokenAmount,
    available: TokenAmount,
    initial_pledge: TokenAmount,
    pre_commit_deposits: TokenAmount,
    vesting_funds: TokenAmount,
    fee_debt: TokenAmount,
}

#[derive(Serialize)]
struct SectorAmount<'a> {
    miner: &'a str,
    sector: u64,
    amount: TokenAmount,
}

async fn miner_info(
    ctx: &CallContext,
    client: &LotusClient,
    miner: &str,
    output: OutputFormat,
) -> Result<()> {
    match miner::aggregate(client, ctx, miner).await {
        Ok(agg) => render(output, &agg, || aggregate_fields(&agg)),
        Err(AggregateError::Incomplete { partial, source }) => {
            render(output, partial.as_ref(), || aggregate_fields(&partial))?;
            Err(anyhow::Error::new(source).context("miner summary is incomplete"))
        }
        Err(err) => Err(err.into()),
    }
}

fn aggregate_fields(agg: &MinerAggregate) -> Vec<(&'static str, String)> {
    let balance = |b: &Option<TokenAmount>| {
        b.map(|b| b.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    };

    let mut rows = vec![
        ("Miner", agg.miner_id.clone()),
        ("Owner", format!("{} ({})", agg.owner.address, balance(&agg.owner.balance))),
        ("Worker", format!("{} ({})", agg.worker.address, balance(&agg.worker.balance))),
    ];
    if let Some(beneficiary) = &agg.beneficiary {
        rows.push((
            "Beneficiary",
            format!("{} ({})", beneficiary.address, balance(&beneficiary.balance)),
        ));
    }
    for control in &agg.control_addresses {
        rows.push((
            "Control",
            format!("{} ({})", control.address, balance(&control.balance)),
        ));
    }
    rows.extend([
        ("Peer ID", agg.peer_id.clone().unwrap_or_default()),
        ("Sector size", agg.sector_size.to_string()),
        ("Raw byte power", agg.raw_byte_power.to_string()),
        ("Quality adj power", agg.quality_adj_power.to_string()),
        ("QAP per sector", agg.qap_per_sector.to_string()),
        ("Network raw power", agg.network_raw_byte_power.to_string()),
        ("Network share", format_share(agg.network_power_share)),
        ("Has min power", agg.has_min_power.to_string()),
        ("Available balance", agg.available_balance.to_string()),
        ("Initial pledge", agg.initial_pledge.to_string()),
        ("Pre-commit deposits", agg.pre_commit_deposits.to_string()),
        ("Vesting", agg.vesting_funds.to_string()),
        ("Total locked", agg.total_locked.to_string()),
        ("Fee debt", agg.fee_debt.to_string()),
        (
            "Sectors",
            format!(
                "{} total, {} live, {} active",
                agg.total_sectors, agg.live_sectors, agg.active_sectors
            ),
        ),
        ("Faulty", agg.faulty_sectors.len().to_string()),
        ("Fault rate", format_share(agg.fault_rate)),
        ("Recovering", agg.recovering_sectors.len().to_string()),
        ("Current epoch", agg.current_epoch.to_string()),
        (
            "Deadline",
            format!(
                "{} of {} (open {}, close {})",
                agg.current_deadline, agg.deadline_count, agg.deadline_open, agg.deadline_close
            ),
        ),
        ("Proving period start", agg.proving_period_start.to_string()),
    ]);
    if !agg.faulty_sector_sample.is_empty() {
        let listed: Vec<String> = agg
            .faulty_sector_sample
            .iter()
            .map(u64::to_string)
            .collect();
        let rest = agg.faulty_sectors.len() - agg.faulty_sector_sample.len();
        let mut sample = listed.join(", ");
        if rest > 0 {
            sample.push_str(&format!(" and {rest} more"));
        }
        let at = rows
            .iter()
            .position(|(key, _)| *key == "Fault rate")
            .map_or(rows.len(), |i| i + 1);
        rows.insert(at, ("Faulty sectors", sample));
    }
    rows
}

fn sector_fields(sector: &SectorRecord) -> Vec<(&'static str, String)> {
    vec![
        ("Sector", sector.sector_number.to_string()),
        ("Seal proof", sector.seal_proof.to_string()),
        ("Sealed CID", sector.sealed_cid.root.clone()),
        ("Deals", sector.deal_ids.len().to_string()),
        ("Activation", sector.activation.to_string()),
        ("Expiration", sector.expiration.to_string()),
        ("Deal weight", sector.deal_weight.clone()),
        ("Verified deal weight", sector.verified_deal_weight.clone()),
        ("Initial pledge", format_fil(&sector.initial_pledge)),
        ("Expected day reward", format_fil(&sector.expected_day_reward)),
        ("Expected storage pledge", format_fil(&sector.expected_storage_pledge)),
    ]
}

fn print_sector_table(sectors: &[ListedSector]) {
    let header = [
        "SECTOR",
        "STATE",
        "SEALED CID",
        "ACTIVATION",
        "EXPIRATION",
        "DEALS",
        "INITIAL PLEDGE",
    ];
    let rows: Vec<[String; 7]> = sectors
        .iter()
        .map(|listed| {
            let s = &listed.sector;
            [
                s.sector_number.to_string(),
                listed.state.to_string(),
                s.sealed_cid.root.clone(),
                s.activation.to_string(),
                s.expiration.to_string(),
                s.deal_ids.len().to_string(),
                format_fil(&s.initial_pledge),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: &[&str]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    println!("{}", line(&header[..]));
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        println!("{}", line(&cells));
    }
    println!("\n{} sectors", sectors.len());
}

fn render_amount(
    output: OutputFormat,
    args: &SectorArgs,
    label: &'static str,
    amount: TokenAmount,
) -> Result<()> {
    let view = SectorAmount {
        miner: &args.miner,
        sector: args.sector,
        amount,
    };
    render(output, &view, || {
        vec![
            ("Miner", args.miner.clone()),
            ("Sector", args.sector.to_string()),
            (label, amount.to_string()),
        ]
    })
}

/// Print `value` as JSON or YAML, or the rows from `fields` as an aligned
/// table.
fn render<T: Serialize + ?Sized>(
    output: OutputFormat,
    value: &T,
    fields: impl FnOnce() -> Vec<(&'static str, String)>,
) -> Result<()> {
    match output {
        OutputFormat::Json | OutputFormat::Yaml => print_encoded(output, value),
        OutputFormat::Table => {
            let rows = fields();
            let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
            for (key, value) in rows {
                println!("{:<width$}  {value}", format!("{key}:"), width = width + 1);
            }
            Ok(())
        }
    }
}

fn print_encoded<T: Serialize + ?Sized>(output: OutputFormat, value: &T) -> Result<()> {
    let encoded = encode(output, value)?;
    println!("{}", encoded.trim_end());
    Ok(())
}

/// Serialize `value` for the machine-readable formats.
fn encode<T: Serialize + ?Sized>(output: OutputFormat, value: &T) -> Result<String> {
    match output {
        OutputFormat::Yaml => serde_yaml::to_string(value).context("failed to encode output as YAML"),
        _ => serde_json::to_string_pretty(value).context("failed to encode output as JSON"),
    }
}

fn format_share(share: f64) -> String {
    format!("{:.4}%", share * 100.0)
}

/// Report configuration and reachability; fails if the node is unusable.
async fn doctor(
    ctx: &CallContext,
    config: &ClientConfig,
    env_file: &Result<Option<PathBuf>>,
) -> Result<()> {
    let mut problems = 0;

    match env_file {
        Ok(Some(path)) => println!("[ok]   config file: {}", path.display()),
        Ok(None) => println!("[info] no {ENV_FILE} in working or home directory"),
        Err(err) => {
            println!("[fail] config file: {err:#}");
            problems += 1;
        }
    }

    if config.endpoint == config::DEFAULT_ENDPOINT {
        println!("[info] endpoint: {} (default)", config.endpoint);
    } else {
        println!("[ok]   endpoint: {}", config.endpoint);
    }

    let resolved = match endpoint::resolve(&config.endpoint) {
        Ok(url) => {
            if url != config.endpoint {
                println!("[ok]   resolves to: {url}");
            }
            true
        }
        Err(err) => {
            println!("[fail] endpoint is invalid: {err}");
            problems += 1;
            false
        }
    };

    if config.auth_token.is_some() {
        println!("[ok]   auth token is configured");
    } else {
        println!("[warn] no auth token; set {}", config::env::API_TOKEN);
    }
    println!(
        "[ok]   timeout {}, {} retries",
        humantime::format_duration(config.timeout),
        config.retry_count
    );

    if resolved {
        let client = LotusClient::new(config)?;
        let check = ctx.child_with_timeout(config.timeout);
        match client.version(&check).await {
            Ok(version) => println!(
                "[ok]   node reachable: {} (API {:#x})",
                version.version, version.api_version
            ),
            Err(err) => {
                println!("[fail] node check failed ({}): {err}", err.kind());
                problems += 1;
            }
        }
    }

    if problems > 0 {
        anyhow::bail!("{problems} check(s) failed");
    }
    println!("\nAll checks passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thctl::types::ByteSize;

    #[test]
    fn cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "thctl", "-o", "json", "--timeout", "10s", "fil", "sectors", "status", "-m", "f01234",
            "42",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.connection.timeout, Some(Duration::from_secs(10)));
        assert_eq!(cli.command.miner(), Some("f01234"));
    }

    #[test]
    fn yaml_output_flag() {
        let cli = Cli::try_parse_from(["thctl", "fil", "miner", "power", "f01234", "-o", "yaml"])
            .unwrap();
        assert_eq!(cli.output, OutputFormat::Yaml);
    }

    #[test]
    fn yaml_encodes_summary_fields() {
        let agg = MinerAggregate {
            miner_id: "f01234".to_string(),
            total_sectors: 10,
            faulty_sectors: vec![3, 4],
            ..MinerAggregate::default()
        };

        let yaml = encode(OutputFormat::Yaml, &agg).unwrap();

        assert!(yaml.contains("miner_id: f01234"), "{yaml}");
        assert!(yaml.contains("total_sectors: 10"), "{yaml}");
        assert!(yaml.contains("faulty_sectors:\n- 3\n- 4"), "{yaml}");
        assert!(!yaml.contains("blocks_mined"), "{yaml}");
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let found = load_env_file_from(&[dir.path().to_path_buf()]).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn malformed_env_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ENV_FILE), "THCTL BROKEN=1\n").unwrap();

        let err = load_env_file_from(&[dir.path().to_path_buf()]).unwrap_err();

        assert!(format!("{err:#}").contains("failed to load"), "{err:#}");
    }

    #[test]
    fn env_file_found_in_later_directory() {
        let empty = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join(ENV_FILE),
            "THCTL_ENV_FILE_TEST=loaded\n",
        )
        .unwrap();

        let found = load_env_file_from(&[empty.path().to_path_buf(), home.path().to_path_buf()])
            .unwrap();

        assert_eq!(found, Some(home.path().join(ENV_FILE)));
        assert_eq!(std::env::var("THCTL_ENV_FILE_TEST").as_deref(), Ok("loaded"));
    }

    #[test]
    fn summary_lists_first_faulty_sectors() {
        let rows = aggregate_fields(&MinerAggregate {
            total_sectors: 20,
            faulty_sectors: (1..=7).collect(),
            faulty_sector_sample: (1..=5).collect(),
            fault_rate: 0.35,
            ..MinerAggregate::default()
        });
        let value = |key: &str| rows.iter().find(|(k, _)| *k == key).unwrap().1.clone();

        assert_eq!(value("Fault rate"), "35.0000%");
        assert_eq!(value("Faulty sectors"), "1, 2, 3, 4, 5 and 2 more");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["thctl", "fil", "miner", "info", "f01234", "--retries", "0"])
                .unwrap();
        assert_eq!(cli.connection.retries, Some(0));
        assert_eq!(cli.output, OutputFormat::Table);
    }

    #[test]
    fn describes_errors_by_kind() {
        let config = ClientConfig::default();
        let not_found = anyhow::Error::new(ClientError::from_rpc_error(
            1,
            "resolution lookup failed (f09999): actor not found",
        ));
        assert_eq!(
            describe(&not_found, Some("f09999"), &config),
            "miner f09999 not found"
        );

        let missing = anyhow::Error::new(ClientError::from_http_status(404));
        assert_eq!(
            describe(&missing, Some("f09999"), &config),
            "miner f09999 not found"
        );

        let sector = anyhow::Error::new(ClientError::new(
            ErrorKind::NotFound,
            "sector 7 of miner f01234 not found",
        ));
        assert_eq!(
            describe(&sector, Some("f01234"), &config),
            "sector 7 of miner f01234 not found"
        );

        let auth = anyhow::Error::new(ClientError::from_http_status(401));
        assert!(describe(&auth, None, &config).starts_with("authentication failed"));

        let down = anyhow::Error::new(ClientError::from_http_status(502));
        assert_eq!(
            describe(&down, None, &config),
            "could not reach node at http://127.0.0.1:1234/rpc/v0"
        );

        let slow = anyhow::Error::new(ClientError::deadline_exceeded()).context("miner summary");
        assert_eq!(describe(&slow, None, &config), "request timed out");
    }

    #[test]
    fn share_formatting() {
        assert_eq!(format_share(0.25), "25.0000%");
        assert_eq!(format_share(0.0), "0.0000%");
    }

    #[test]
    fn byte_sizes_render_in_tables() {
        let rows = aggregate_fields(&MinerAggregate {
            sector_size: ByteSize::from(34_359_738_368_u64),
            ..MinerAggregate::default()
        });
        let size = rows.iter().find(|(k, _)| *k == "Sector size").unwrap();
        assert_eq!(size.1, "32.00 GiB");
    }
}
