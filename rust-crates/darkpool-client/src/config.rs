use crate::{
    codec::MarketSchema,
    types::{
        Microcredits,
        TransactionId,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use thiserror::Error;

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://api.explorer.provable.com/v1";
pub const DEFAULT_MAINNET_RPC_URL: &str = "https://api.explorer.provable.com/v1";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:3030";
pub const DEFAULT_TESTNET_EXPLORER_URL: &str = "https://testnet.explorer.provable.com";
pub const DEFAULT_MAINNET_EXPLORER_URL: &str = "https://explorer.provable.com";
pub const DEFAULT_PROGRAM_ID: &str = "zk_dark_pool.aleo";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOME environment variable not set")]
    NoHome,

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("program id `{0}` must end in `.aleo`")]
    ProgramId(String),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkEnv {
    #[default]
    Testnet,
    Mainnet,
    Local,
}

impl NetworkEnv {
    /// Network segment of node API paths. A local devnet runs the testnet
    /// parameters.
    pub fn path_segment(self) -> &'static str {
        match self {
            NetworkEnv::Testnet | NetworkEnv::Local => "testnet",
            NetworkEnv::Mainnet => "mainnet",
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            NetworkEnv::Testnet => DEFAULT_TESTNET_RPC_URL,
            NetworkEnv::Mainnet => DEFAULT_MAINNET_RPC_URL,
            NetworkEnv::Local => DEFAULT_LOCAL_RPC_URL,
        }
    }

    pub fn default_explorer_url(self) -> &'static str {
        match self {
            NetworkEnv::Testnet | NetworkEnv::Local => DEFAULT_TESTNET_EXPLORER_URL,
            NetworkEnv::Mainnet => DEFAULT_MAINNET_EXPLORER_URL,
        }
    }
}

impl fmt::Display for NetworkEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkEnv::Testnet => "Testnet",
            NetworkEnv::Mainnet => "Mainnet",
            NetworkEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingNames {
    pub markets: String,
    pub pools: String,
}

impl Default for MappingNames {
    fn default() -> Self {
        Self {
            markets: "markets".to_owned(),
            pools: "pools".to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub place_bet: Microcredits,
    pub create_market: Microcredits,
    pub resolve_market: Microcredits,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            place_bet: Microcredits::new(500_000),
            create_market: Microcredits::new(1_000_000),
            resolve_market: Microcredits::new(500_000),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub network: NetworkEnv,
    pub rpc_url: String,
    pub program_id: String,
    pub mappings: MappingNames,
    pub fees: FeeSchedule,
    pub fee_private: bool,
    pub explorer_url: String,
    pub market_schema: MarketSchema,
}

/// On-disk form; every key is optional and network-derived defaults follow the
/// `network` key.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    network: Option<NetworkEnv>,
    rpc_url: Option<String>,
    program_id: Option<String>,
    mappings: Option<MappingNames>,
    fees: Option<FeeSchedule>,
    fee_private: Option<bool>,
    explorer_url: Option<String>,
    market_schema: Option<MarketSchema>,
}

impl From<ConfigFile> for ClientConfig {
    fn from(file: ConfigFile) -> Self {
        let defaults = ClientConfig::for_network(file.network.unwrap_or_default());
        ClientConfig {
            network: defaults.network,
            rpc_url: file.rpc_url.unwrap_or(defaults.rpc_url),
            program_id: file.program_id.unwrap_or(defaults.program_id),
            mappings: file.mappings.unwrap_or(defaults.mappings),
            fees: file.fees.unwrap_or(defaults.fees),
            fee_private: file.fee_private.unwrap_or(defaults.fee_private),
            explorer_url: file.explorer_url.unwrap_or(defaults.explorer_url),
            market_schema: file.market_schema.unwrap_or(defaults.market_schema),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_network(NetworkEnv::default())
    }
}

impl ClientConfig {
    pub fn for_network(network: NetworkEnv) -> Self {
        Self {
            network,
            rpc_url: network.default_rpc_url().to_owned(),
            program_id: DEFAULT_PROGRAM_ID.to_owned(),
            mappings: MappingNames::default(),
            fees: FeeSchedule::default(),
            fee_private: false,
            explorer_url: network.default_explorer_url().to_owned(),
            market_schema: MarketSchema::default(),
        }
    }

    /// Reads a JSON config; absent keys take the defaults of the configured network.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile =
            serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from(file);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.program_id.ends_with(".aleo") || self.program_id.len() <= ".aleo".len()
        {
            return Err(ConfigError::ProgramId(self.program_id.clone()));
        }
        Ok(())
    }

    pub fn program_url(&self) -> String {
        format!(
            "{}/{}/program/{}",
            self.rpc_url.trim_end_matches('/'),
            self.network.path_segment(),
            self.program_id
        )
    }

    pub fn network_url(&self) -> String {
        format!(
            "{}/{}",
            self.rpc_url.trim_end_matches('/'),
            self.network.path_segment()
        )
    }

    pub fn explorer_transaction_url(&self, id: &TransactionId) -> String {
        format!("{}/transaction/{id}", self.explorer_url.trim_end_matches('/'))
    }
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config").join("darkpool"))
}

/// Expands `~` in a user supplied path, falling back to
/// `~/.config/darkpool/config.json`.
pub fn resolve_config_path(path: Option<&str>) -> Result<PathBuf, ConfigError> {
    match path {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => Ok(default_config_dir()?.join(CONFIG_FILE)),
    }
}
