use crate::error::ValidationError;
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    cmp::Ordering,
    fmt,
    str::FromStr,
};

/// Order of the scalar field every `field` value lives in.
pub const FIELD_MODULUS: &str =
    "8444461749428370424248824938781546531375899335154063827935233455917409239041";
pub const MICROCREDITS_PER_CREDIT: u64 = 1_000_000;
const ADDRESS_PREFIX: &str = "aleo1";

/// A field element kept as its decimal digits, never narrowed to a machine integer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldElement(String);

impl FieldElement {
    /// Accepts only the canonical form the node emits: no sign, no leading zeros,
    /// strictly below the modulus.
    pub(crate) fn from_canonical(digits: &str) -> Option<Self> {
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'));
        (canonical && below_modulus(digits)).then(|| Self(digits.to_owned()))
    }

    pub fn from_u128(value: u128) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn below_modulus(digits: &str) -> bool {
    match digits.len().cmp(&FIELD_MODULUS.len()) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => digits < FIELD_MODULUS,
    }
}

impl FromStr for FieldElement {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::MarketId(raw.to_owned());
        let trimmed = raw.trim();
        let digits = trimmed.strip_suffix("field").unwrap_or(trimmed);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let normalized = match digits.trim_start_matches('0') {
            "" => "0",
            rest => rest,
        };
        Self::from_canonical(normalized).ok_or_else(invalid)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of both the `markets` and `pools` mappings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MarketId(FieldElement);

impl MarketId {
    /// Deterministic id for a market question: the first 16 bytes of its SHA-256
    /// digest read as a big-endian integer, which always fits in the field.
    pub fn derive(question: &str) -> Self {
        let digest = Sha256::digest(question.trim().as_bytes());
        let mut head = [0u8; 16];
        head.copy_from_slice(&digest[..16]);
        Self(FieldElement::from_u128(u128::from_be_bytes(head)))
    }

    pub fn element(&self) -> &FieldElement {
        &self.0
    }

    /// Tagged form used as a mapping key and as a transition input.
    pub fn to_input(&self) -> String {
        format!("{}field", self.0)
    }
}

impl FromStr for MarketId {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.parse().map(Self)
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `aleo1...abcd`, for status lines.
    pub fn short(&self) -> String {
        let len = self.0.len();
        if len <= 12 {
            return self.0.clone();
        }
        format!("{}...{}", &self.0[..6], &self.0[len - 4..])
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let valid = raw.strip_prefix(ADDRESS_PREFIX).is_some_and(|rest| {
            !rest.is_empty()
                && rest
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        });
        if valid {
            Ok(Self(raw.to_owned()))
        } else {
            Err(ValidationError::Address(raw.to_owned()))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    No = 0,
    Yes = 1,
}

impl Outcome {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Outcome {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Outcome::No),
            1 => Ok(Outcome::Yes),
            other => Err(ValidationError::Outcome(other.to_string())),
        }
    }
}

impl FromStr for Outcome {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "0" => Ok(Outcome::No),
            "1" => Ok(Outcome::Yes),
            _ => Err(ValidationError::Outcome(raw.to_owned())),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::No => f.write_str("NO"),
            Outcome::Yes => f.write_str("YES"),
        }
    }
}

/// Amount in the network's smallest unit.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Microcredits(u64);

impl Microcredits {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn to_credits_string(self) -> String {
        let whole = self.0 / MICROCREDITS_PER_CREDIT;
        let fraction = self.0 % MICROCREDITS_PER_CREDIT;
        if fraction == 0 {
            return format!("{whole} credits");
        }
        let fraction = format!("{fraction:06}");
        format!("{whole}.{} credits", fraction.trim_end_matches('0'))
    }
}

impl FromStr for Microcredits {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let digits = raw.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::Amount(raw.to_owned()));
        }
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ValidationError::Amount(raw.to_owned()))
    }
}

impl fmt::Display for Microcredits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// When a market may be resolved. Which variant the program reports depends on
/// the deployed schema revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Height(u32),
    Timestamp(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketInfo {
    pub creator: Address,
    pub resolution: Resolution,
    pub resolved: bool,
    /// Raw value from the program; only meaningful once `resolved` is set.
    pub winning_outcome: u8,
}

impl MarketInfo {
    pub fn winner(&self) -> Option<Outcome> {
        if !self.resolved {
            return None;
        }
        Outcome::try_from(self.winning_outcome).ok()
    }

    pub fn is_resolvable(&self, current_height: u32) -> bool {
        match self.resolution {
            Resolution::Height(height) => !self.resolved && current_height >= height,
            Resolution::Timestamp(_) => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolState {
    pub total_yes: u64,
    pub total_no: u64,
    pub total_pool: u64,
}

impl PoolState {
    pub fn is_consistent(&self) -> bool {
        u128::from(self.total_yes) + u128::from(self.total_no)
            == u128::from(self.total_pool)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub market_id: MarketId,
    pub info: MarketInfo,
    pub pool: PoolState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletIdentity {
    pub public_address: Address,
    pub provider_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
