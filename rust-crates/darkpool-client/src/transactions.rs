use crate::{
    codec::{
        Scalar,
        ScalarType,
    },
    config::ClientConfig,
    error::ValidationError,
    types::{
        MarketId,
        Microcredits,
        Outcome,
    },
};
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    PlaceBet,
    CreateMarket,
    ResolveMarket,
}

impl Transition {
    pub fn function_name(self) -> &'static str {
        match self {
            Transition::PlaceBet => "place_bet",
            Transition::CreateMarket => "create_market",
            Transition::ResolveMarket => "resolve_market",
        }
    }

    /// Parameter types of the deployed transition, in declaration order.
    pub fn signature(self) -> &'static [ScalarType] {
        match self {
            Transition::PlaceBet => &[ScalarType::Field, ScalarType::U8, ScalarType::U64],
            Transition::CreateMarket => &[ScalarType::Field, ScalarType::U32],
            Transition::ResolveMarket => &[ScalarType::Field, ScalarType::U8],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetIntent {
    pub market_id: MarketId,
    pub outcome: Outcome,
    pub amount: Microcredits,
}

impl BetIntent {
    pub fn new(
        market_id: MarketId,
        outcome: Outcome,
        amount: Microcredits,
    ) -> Result<Self, ValidationError> {
        if amount.get() == 0 {
            return Err(ValidationError::Amount(amount.to_string()));
        }
        Ok(Self {
            market_id,
            outcome,
            amount,
        })
    }

    pub fn parse(
        market_id: &str,
        outcome: &str,
        amount: &str,
    ) -> Result<Self, ValidationError> {
        Self::new(market_id.parse()?, outcome.parse()?, amount.parse()?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateMarketIntent {
    pub market_id: MarketId,
    pub resolution_height: u32,
}

impl CreateMarketIntent {
    pub fn parse(
        market_id: &str,
        resolution_height: &str,
    ) -> Result<Self, ValidationError> {
        let market_id = market_id.parse()?;
        let trimmed = resolution_height.trim();
        let invalid = || ValidationError::ResolutionHeight(resolution_height.to_owned());
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let resolution_height = trimmed.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self {
            market_id,
            resolution_height,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveMarketIntent {
    pub market_id: MarketId,
    pub winning_outcome: Outcome,
}

impl ResolveMarketIntent {
    pub fn parse(
        market_id: &str,
        winning_outcome: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            market_id: market_id.parse()?,
            winning_outcome: winning_outcome.parse()?,
        })
    }
}

/// A validated transition request, kept with the submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionIntent {
    PlaceBet(BetIntent),
    CreateMarket(CreateMarketIntent),
    ResolveMarket(ResolveMarketIntent),
}

impl TransitionIntent {
    pub fn transition(&self) -> Transition {
        match self {
            TransitionIntent::PlaceBet(_) => Transition::PlaceBet,
            TransitionIntent::CreateMarket(_) => Transition::CreateMarket,
            TransitionIntent::ResolveMarket(_) => Transition::ResolveMarket,
        }
    }

    pub fn market_id(&self) -> &MarketId {
        match self {
            TransitionIntent::PlaceBet(intent) => &intent.market_id,
            TransitionIntent::CreateMarket(intent) => &intent.market_id,
            TransitionIntent::ResolveMarket(intent) => &intent.market_id,
        }
    }

    fn arguments(&self) -> Vec<Scalar> {
        match self {
            TransitionIntent::PlaceBet(intent) => vec![
                Scalar::Field(intent.market_id.element().clone()),
                Scalar::U8(intent.outcome.as_u8()),
                Scalar::U64(intent.amount.get()),
            ],
            TransitionIntent::CreateMarket(intent) => vec![
                Scalar::Field(intent.market_id.element().clone()),
                Scalar::U32(intent.resolution_height),
            ],
            TransitionIntent::ResolveMarket(intent) => vec![
                Scalar::Field(intent.market_id.element().clone()),
                Scalar::U8(intent.winning_outcome.as_u8()),
            ],
        }
    }
}

/// Raw form input, as typed by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionInput {
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

impl TransitionInput {
    pub fn place_bet(
        market_id: impl Into<String>,
        outcome: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        TransitionInput::PlaceBet {
            market_id: market_id.into(),
            outcome: outcome.into(),
            amount: amount.into(),
        }
    }

    pub fn validate(&self) -> Result<TransitionIntent, ValidationError> {
        match self {
            TransitionInput::PlaceBet {
                market_id,
                outcome,
                amount,
            } => BetIntent::parse(market_id, outcome, amount)
                .map(TransitionIntent::PlaceBet),
            TransitionInput::CreateMarket {
                market_id,
                resolution_height,
            } => CreateMarketIntent::parse(market_id, resolution_height)
                .map(TransitionIntent::CreateMarket),
            TransitionInput::ResolveMarket {
                market_id,
                winning_outcome,
            } => ResolveMarketIntent::parse(market_id, winning_outcome)
                .map(TransitionIntent::ResolveMarket),
        }
    }
}

/// Arguments do not line up with the transition's declared parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{function} expects {expected:?}, built {actual:?}")]
pub struct BuildError {
    pub function: &'static str,
    pub expected: &'static [ScalarType],
    pub actual: Vec<ScalarType>,
}

/// Request handed to the wallet provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionCall {
    pub program: String,
    pub function_name: Transition,
    pub inputs: Vec<String>,
    pub fee: Microcredits,
    pub fee_private: bool,
}

pub fn place_bet_inputs(intent: &BetIntent) -> Vec<String> {
    render(&TransitionIntent::PlaceBet(intent.clone()).arguments())
}

pub fn create_market_inputs(intent: &CreateMarketIntent) -> Vec<String> {
    render(&TransitionIntent::CreateMarket(intent.clone()).arguments())
}

pub fn resolve_market_inputs(intent: &ResolveMarketIntent) -> Vec<String> {
    render(&TransitionIntent::ResolveMarket(intent.clone()).arguments())
}

fn render(arguments: &[Scalar]) -> Vec<String> {
    arguments.iter().map(ToString::to_string).collect()
}

pub struct TransactionBuilder<'a> {
    config: &'a ClientConfig,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(config: &'a ClientConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, intent: &TransitionIntent) -> Result<TransitionCall, BuildError> {
        let transition = intent.transition();
        let arguments = intent.arguments();
        let expected = transition.signature();
        let actual: Vec<ScalarType> = arguments.iter().map(Scalar::scalar_type).collect();
        if actual != expected {
            return Err(BuildError {
                function: transition.function_name(),
                expected,
                actual,
            });
        }
        Ok(TransitionCall {
            program: self.config.program_id.clone(),
            function_name: transition,
            inputs: render(&arguments),
            fee: self.fee_for(transition),
            fee_private: self.config.fee_private,
        })
    }

    fn fee_for(&self, transition: Transition) -> Microcredits {
        let fees = &self.config.fees;
        match transition {
            Transition::PlaceBet => fees.place_bet,
            Transition::CreateMarket => fees.create_market,
            Transition::ResolveMarket => fees.resolve_market,
        }
    }
}
