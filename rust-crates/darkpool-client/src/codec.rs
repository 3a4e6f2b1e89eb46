//! Plain-text struct notation used by program mappings.
//!
//! A mapping value is a single brace-delimited literal such as
//! `{total_yes:300000u64,total_no:700000u64,total_pool:1000000u64}`. Fields appear
//! in the order the program declares them and every integer carries its width
//! suffix. Each readable struct is described by a [`StructShape`]; decoding matches
//! the whole literal against the shape or fails, it never yields a partial record.

use crate::{
    error::DecodeError,
    types::{
        Address,
        FieldElement,
        MarketInfo,
        PoolState,
        Resolution,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    Address,
    Bool,
    U8,
    U32,
    U64,
    Field,
}

impl ScalarType {
    pub const fn suffix(self) -> &'static str {
        match self {
            ScalarType::U8 => "u8",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::Field => "field",
            ScalarType::Address | ScalarType::Bool => "",
        }
    }

    fn parse(self, raw: &str) -> Result<Scalar, String> {
        match self {
            ScalarType::Address => raw
                .parse::<Address>()
                .map(Scalar::Address)
                .map_err(|_| format!("`{raw}` is not an address")),
            ScalarType::Bool => match raw {
                "true" => Ok(Scalar::Bool(true)),
                "false" => Ok(Scalar::Bool(false)),
                other => Err(format!("`{other}` is not a boolean")),
            },
            ScalarType::U8 => self.integer(raw).map(Scalar::U8),
            ScalarType::U32 => self.integer(raw).map(Scalar::U32),
            ScalarType::U64 => self.integer(raw).map(Scalar::U64),
            ScalarType::Field => {
                let digits = self.digits(raw)?;
                FieldElement::from_canonical(digits)
                    .map(Scalar::Field)
                    .ok_or_else(|| format!("`{raw}` is not a canonical field element"))
            }
        }
    }

    fn digits(self, raw: &str) -> Result<&str, String> {
        let suffix = self.suffix();
        let digits = raw
            .strip_suffix(suffix)
            .ok_or_else(|| format!("`{raw}` lacks the `{suffix}` suffix"))?;
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits == "0" || !digits.starts_with('0'));
        if canonical {
            Ok(digits)
        } else {
            Err(format!("`{raw}` is not a canonical {suffix} literal"))
        }
    }

    // Parses straight into the declared width so an out-of-range value is rejected
    // rather than wrapped.
    fn integer<T: std::str::FromStr>(self, raw: &str) -> Result<T, String> {
        let digits = self.digits(raw)?;
        digits
            .parse::<T>()
            .map_err(|_| format!("`{raw}` does not fit in {}", self.suffix()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    Address(Address),
    Bool(bool),
    U8(u8),
    U32(u32),
    U64(u64),
    Field(FieldElement),
}

impl Scalar {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Address(_) => ScalarType::Address,
            Scalar::Bool(_) => ScalarType::Bool,
            Scalar::U8(_) => ScalarType::U8,
            Scalar::U32(_) => ScalarType::U32,
            Scalar::U64(_) => ScalarType::U64,
            Scalar::Field(_) => ScalarType::Field,
        }
    }
}

/// Renders the tagged literal, e.g. `42field`, `1u8`, `true`.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = self.scalar_type().suffix();
        match self {
            Scalar::Address(address) => write!(f, "{address}"),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::U8(value) => write!(f, "{value}{suffix}"),
            Scalar::U32(value) => write!(f, "{value}{suffix}"),
            Scalar::U64(value) => write!(f, "{value}{suffix}"),
            Scalar::Field(value) => write!(f, "{value}{suffix}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: ScalarType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructShape {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

pub const MARKET_INFO: StructShape = StructShape {
    name: "MarketInfo",
    fields: &[
        FieldSpec {
            name: "creator",
            ty: ScalarType::Address,
        },
        FieldSpec {
            name: "resolution_height",
            ty: ScalarType::U32,
        },
        FieldSpec {
            name: "resolved",
            ty: ScalarType::Bool,
        },
        FieldSpec {
            name: "winning_outcome",
            ty: ScalarType::U8,
        },
    ],
};

/// Earlier program revision that resolved markets by timestamp.
pub const MARKET_INFO_LEGACY: StructShape = StructShape {
    name: "MarketInfo",
    fields: &[
        FieldSpec {
            name: "creator",
            ty: ScalarType::Address,
        },
        FieldSpec {
            name: "resolution_time",
            ty: ScalarType::U64,
        },
        FieldSpec {
            name: "resolved",
            ty: ScalarType::Bool,
        },
        FieldSpec {
            name: "winning_outcome",
            ty: ScalarType::U8,
        },
    ],
};

pub const POOL_STATE: StructShape = StructShape {
    name: "PoolState",
    fields: &[
        FieldSpec {
            name: "total_yes",
            ty: ScalarType::U64,
        },
        FieldSpec {
            name: "total_no",
            ty: ScalarType::U64,
        },
        FieldSpec {
            name: "total_pool",
            ty: ScalarType::U64,
        },
    ],
};

/// Which `MarketInfo` layout the deployed program emits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSchema {
    #[default]
    ResolutionHeight,
    ResolutionTime,
}

impl MarketSchema {
    pub fn shape(self) -> &'static StructShape {
        match self {
            MarketSchema::ResolutionHeight => &MARKET_INFO,
            MarketSchema::ResolutionTime => &MARKET_INFO_LEGACY,
        }
    }
}

/// Fields of a decoded struct, in shape order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructValue {
    shape: &'static StructShape,
    values: Vec<Scalar>,
}

impl StructValue {
    pub fn new(
        shape: &'static StructShape,
        values: Vec<Scalar>,
    ) -> Result<Self, DecodeError> {
        if values.len() != shape.fields.len() {
            return Err(DecodeError::malformed(
                shape.name,
                format!("expected {} fields, got {}", shape.fields.len(), values.len()),
            ));
        }
        if let Some((spec, value)) = shape
            .fields
            .iter()
            .zip(&values)
            .find(|(spec, value)| spec.ty != value.scalar_type())
        {
            return Err(DecodeError::malformed(
                shape.name,
                format!("field `{}` cannot hold `{value}`", spec.name),
            ));
        }
        Ok(Self { shape, values })
    }

    pub fn shape(&self) -> &'static StructShape {
        self.shape
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.shape
            .fields
            .iter()
            .position(|spec| spec.name == name)
            .map(|index| &self.values[index])
    }

    fn require(&self, name: &str) -> Result<&Scalar, DecodeError> {
        self.get(name).ok_or_else(|| {
            DecodeError::malformed(self.shape.name, format!("missing field `{name}`"))
        })
    }

    fn mismatch(&self, name: &str) -> DecodeError {
        DecodeError::malformed(
            self.shape.name,
            format!("field `{name}` has the wrong type"),
        )
    }

    pub fn address(&self, name: &str) -> Result<&Address, DecodeError> {
        match self.require(name)? {
            Scalar::Address(value) => Ok(value),
            _ => Err(self.mismatch(name)),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, DecodeError> {
        match self.require(name)? {
            Scalar::Bool(value) => Ok(*value),
            _ => Err(self.mismatch(name)),
        }
    }

    pub fn u8(&self, name: &str) -> Result<u8, DecodeError> {
        match self.require(name)? {
            Scalar::U8(value) => Ok(*value),
            _ => Err(self.mismatch(name)),
        }
    }

    pub fn u32(&self, name: &str) -> Result<u32, DecodeError> {
        match self.require(name)? {
            Scalar::U32(value) => Ok(*value),
            _ => Err(self.mismatch(name)),
        }
    }

    pub fn u64(&self, name: &str) -> Result<u64, DecodeError> {
        match self.require(name)? {
            Scalar::U64(value) => Ok(*value),
            _ => Err(self.mismatch(name)),
        }
    }

    pub fn field(&self, name: &str) -> Result<&FieldElement, DecodeError> {
        match self.require(name)? {
            Scalar::Field(value) => Ok(value),
            _ => Err(self.mismatch(name)),
        }
    }
}

/// Renders the compact wire literal.
impl fmt::Display for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let fields = self.shape.fields.iter().zip(&self.values);
        for (index, (spec, value)) in fields.enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{value}", spec.name)?;
        }
        f.write_str("}")
    }
}

pub fn decode(
    raw: &str,
    shape: &'static StructShape,
) -> Result<StructValue, DecodeError> {
    let malformed = |reason: String| DecodeError::malformed(shape.name, reason);
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let body = compact
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| malformed("expected a brace-delimited literal".to_owned()))?;
    if body.contains(['{', '}']) {
        return Err(malformed("nested structs are not part of this shape".to_owned()));
    }
    let entries: Vec<&str> = if body.is_empty() {
        Vec::new()
    } else {
        body.split(',').collect()
    };
    if entries.len() != shape.fields.len() {
        return Err(malformed(format!(
            "expected {} fields, found {}",
            shape.fields.len(),
            entries.len()
        )));
    }

    let mut values = Vec::with_capacity(entries.len());
    for (entry, spec) in entries.into_iter().zip(shape.fields) {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| malformed(format!("entry `{entry}` is not `name:value`")))?;
        if name != spec.name {
            return Err(malformed(format!(
                "expected field `{}`, found `{name}`",
                spec.name
            )));
        }
        let scalar = spec
            .ty
            .parse(value)
            .map_err(|reason| malformed(format!("field `{name}`: {reason}")))?;
        values.push(scalar);
    }
    Ok(StructValue { shape, values })
}

impl MarketInfo {
    pub fn decode(raw: &str, schema: MarketSchema) -> Result<Self, DecodeError> {
        Self::from_struct(&decode(raw, schema.shape())?)
    }

    pub fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        let resolution = if value.get("resolution_height").is_some() {
            Resolution::Height(value.u32("resolution_height")?)
        } else {
            Resolution::Timestamp(value.u64("resolution_time")?)
        };
        Ok(MarketInfo {
            creator: value.address("creator")?.clone(),
            resolution,
            resolved: value.boolean("resolved")?,
            winning_outcome: value.u8("winning_outcome")?,
        })
    }

    pub fn to_struct(&self) -> StructValue {
        let (shape, resolution) = match self.resolution {
            Resolution::Height(height) => (&MARKET_INFO, Scalar::U32(height)),
            Resolution::Timestamp(time) => (&MARKET_INFO_LEGACY, Scalar::U64(time)),
        };
        StructValue {
            shape,
            values: vec![
                Scalar::Address(self.creator.clone()),
                resolution,
                Scalar::Bool(self.resolved),
                Scalar::U8(self.winning_outcome),
            ],
        }
    }
}

impl PoolState {
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        Self::from_struct(&decode(raw, &POOL_STATE)?)
    }

    pub fn from_struct(value: &StructValue) -> Result<Self, DecodeError> {
        Ok(PoolState {
            total_yes: value.u64("total_yes")?,
            total_no: value.u64("total_no")?,
            total_pool: value.u64("total_pool")?,
        })
    }

    pub fn to_struct(&self) -> StructValue {
        StructValue {
            shape: &POOL_STATE,
            values: vec![
                Scalar::U64(self.total_yes),
                Scalar::U64(self.total_no),
                Scalar::U64(self.total_pool),
            ],
        }
    }
}
