use clap::{
    ArgGroup,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use darkpool_client::{
    ChainStateClient,
    ClientConfig,
    NetworkEnv,
    TransactionBuilder,
    TransitionInput,
    config::resolve_config_path,
    types::{
        MarketId,
        MarketInfo,
        Microcredits,
        PoolState,
        Resolution,
        TransactionId,
    },
};
use std::path::PathBuf;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

#[derive(Parser, Debug)]
#[command(
    name = "darkpool",
    about = "Read dark pool markets and encode their transitions",
    version,
    group(
        ArgGroup::new("network")
            .args(["testnet", "mainnet", "local"])
            .multiple(false)
    )
)]
struct Args {
    /// Use Aleo testnet (default)
    #[arg(long)]
    testnet: bool,

    /// Use Aleo mainnet
    #[arg(long)]
    mainnet: bool,

    /// Use a local devnet node
    #[arg(long)]
    local: bool,

    /// Override the node REST endpoint
    #[arg(long)]
    rpc_url: Option<String>,

    /// Override the program id
    #[arg(long)]
    program: Option<String>,

    /// Config file (defaults to ~/.config/darkpool/config.json when present)
    #[arg(long)]
    config: Option<String>,

    /// Also write daily rolling logs into this directory
    #[arg(long)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the program is deployed and print the latest block height
    Status,
    /// Show a market record
    Market { market_id: String },
    /// Show a market's pool totals
    Pool { market_id: String },
    /// Show market and pool together
    Snapshot { market_id: String },
    /// Print a raw mapping value
    Mapping { mapping: String, key: String },
    /// Fetch a transaction by id
    Tx { transaction_id: String },
    /// List the program's most recent transactions
    Txs {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Print the wallet request for a transition as JSON
    #[command(subcommand)]
    Encode(Encode),
    /// Derive a market id from its question text
    DeriveId { question: String },
}

#[derive(Subcommand, Debug)]
enum Encode {
    PlaceBet {
        market_id: String,
        outcome: String,
        amount: String,
    },
    CreateMarket {
        market_id: String,
        resolution_height: String,
    },
    ResolveMarket {
        market_id: String,
        winning_outcome: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = init_tracing(args.log_dir.as_deref())?;

    let config = load_config(&args)?;
    tracing::debug!(
        network = %config.network,
        program = %config.program_id,
        rpc = %config.rpc_url,
        "config loaded"
    );

    match args.command {
        Command::Status => status(&config).await,
        Command::Market { market_id } => {
            let client = chain_client(config)?;
            let market_id = parse_market_id(&market_id)?;
            let info = client
                .market(&market_id)
                .await
                .ok_or_else(|| eyre!("market {market_id} not found"))?;
            print_market(&market_id, &info);
            Ok(())
        }
        Command::Pool { market_id } => {
            let client = chain_client(config)?;
            let market_id = parse_market_id(&market_id)?;
            let pool = client
                .pool(&market_id)
                .await
                .ok_or_else(|| eyre!("no pool for market {market_id}"))?;
            print_pool(&pool);
            Ok(())
        }
        Command::Snapshot { market_id } => {
            let client = chain_client(config)?;
            let market_id = parse_market_id(&market_id)?;
            let snapshot = client
                .market_snapshot(&market_id)
                .await
                .ok_or_else(|| eyre!("market {market_id} not found"))?;
            print_market(&snapshot.market_id, &snapshot.info);
            print_pool(&snapshot.pool);
            Ok(())
        }
        Command::Mapping { mapping, key } => {
            let client = chain_client(config)?;
            match client
                .mapping_value(&mapping, &key)
                .await
                .wrap_err_with(|| format!("reading {mapping}[{key}]"))?
            {
                Some(value) => println!("{value}"),
                None => println!("{mapping}[{key}] is not set"),
            }
            Ok(())
        }
        Command::Tx { transaction_id } => {
            let client = chain_client(config)?;
            let id = TransactionId::new(transaction_id);
            let transaction = client
                .transaction(&id)
                .await
                .wrap_err("fetching transaction")?
                .ok_or_else(|| eyre!("transaction {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&transaction)?);
            println!("{}", client.config().explorer_transaction_url(&id));
            Ok(())
        }
        Command::Txs { limit } => {
            let client = chain_client(config)?;
            let transactions = client
                .recent_transactions(limit)
                .await
                .wrap_err("fetching recent transactions")?;
            if transactions.is_empty() {
                println!("no transactions for {}", client.config().program_id);
            }
            for transaction in &transactions {
                println!("{}", serde_json::to_string_pretty(transaction)?);
            }
            Ok(())
        }
        Command::Encode(encode) => {
            let input = match encode {
                Encode::PlaceBet {
                    market_id,
                    outcome,
                    amount,
                } => TransitionInput::place_bet(market_id, outcome, amount),
                Encode::CreateMarket {
                    market_id,
                    resolution_height,
                } => TransitionInput::CreateMarket {
                    market_id,
                    resolution_height,
                },
                Encode::ResolveMarket {
                    market_id,
                    winning_outcome,
                } => TransitionInput::ResolveMarket {
                    market_id,
                    winning_outcome,
                },
            };
            let intent = input.validate()?;
            let call = TransactionBuilder::new(&config).build(&intent)?;
            println!("{}", serde_json::to_string_pretty(&call)?);
            Ok(())
        }
        Command::DeriveId { question } => {
            let market_id = MarketId::derive(&question);
            println!("{}", market_id.to_input());
            Ok(())
        }
    }
}

fn init_tracing(log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let dir = PathBuf::from(shellexpand::tilde(dir).into_owned());
            std::fs::create_dir_all(&dir)
                .wrap_err_with(|| format!("creating log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, "darkpool.log"));
            fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| eyre!("initialising tracing: {e}"))?;
            Ok(Some(guard))
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| eyre!("initialising tracing: {e}"))?;
            Ok(None)
        }
    }
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let explicit = args.config.is_some();
    let path =
        resolve_config_path(args.config.as_deref()).wrap_err("resolving config path")?;
    let mut config = if explicit || path.exists() {
        ClientConfig::load(&path).wrap_err_with(|| format!("loading {}", path.display()))?
    } else {
        ClientConfig::default()
    };

    let network = if args.mainnet {
        Some(NetworkEnv::Mainnet)
    } else if args.local {
        Some(NetworkEnv::Local)
    } else if args.testnet {
        Some(NetworkEnv::Testnet)
    } else {
        None
    };
    if let Some(network) = network.filter(|network| *network != config.network) {
        let defaults = ClientConfig::for_network(network);
        config.network = network;
        config.rpc_url = defaults.rpc_url;
        config.explorer_url = defaults.explorer_url;
    }
    if let Some(rpc_url) = &args.rpc_url {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(program) = &args.program {
        config.program_id = program.clone();
    }
    config.validate()?;
    Ok(config)
}

fn chain_client(config: ClientConfig) -> Result<ChainStateClient> {
    ChainStateClient::new(config).wrap_err("building HTTP client")
}

fn parse_market_id(raw: &str) -> Result<MarketId> {
    raw.parse()
        .wrap_err_with(|| format!("invalid market id `{raw}`"))
}

async fn status(config: &ClientConfig) -> Result<()> {
    let client = chain_client(config.clone())?;
    let live = client.program_live().await;
    println!("network: {}", config.network);
    let deployed = if live { "deployed" } else { "not found" };
    println!("program: {} ({deployed})", config.program_id);
    match client.latest_height().await {
        Ok(height) => println!("height:  {height}"),
        Err(error) => println!("height:  unavailable ({error})"),
    }
    if !live {
        return Err(eyre!("program not reachable at {client}"));
    }
    Ok(())
}

fn print_market(market_id: &MarketId, info: &MarketInfo) {
    println!("market:     {}", market_id.to_input());
    println!("creator:    {}", info.creator);
    match info.resolution {
        Resolution::Height(height) => println!("resolves:   block {height}"),
        Resolution::Timestamp(time) => println!("resolves:   unix time {time}"),
    }
    let state = match (info.resolved, info.winner()) {
        (false, _) => "open".to_owned(),
        (true, Some(outcome)) => format!("resolved ({outcome})"),
        (true, None) => format!("resolved (invalid outcome {})", info.winning_outcome),
    };
    println!("state:      {state}");
}

fn print_pool(pool: &PoolState) {
    let credits = |amount| Microcredits::new(amount).to_credits_string();
    println!("yes:        {}", credits(pool.total_yes));
    println!("no:         {}", credits(pool.total_no));
    println!("total:      {}", credits(pool.total_pool));
    if !pool.is_consistent() {
        println!("warning:    totals do not add up");
    }
}
