//! Math modifiers applied to plotted Y values.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownMathFunction;

/// A unary function applied to every sample of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MathFunction {
    Abs,
    Negative,
    Sqrt,
    Log,
    Log1p,
    Log2,
    Log10,
    Round,
    Ceil,
    Floor,
    Trunc,
    Sign,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Deg2Rad,
    Rad2Deg,
}

impl MathFunction {
    /// Every supported modifier.
    pub const ALL: [MathFunction; 20] = [
        Self::Abs,
        Self::Negative,
        Self::Sqrt,
        Self::Log,
        Self::Log1p,
        Self::Log2,
        Self::Log10,
        Self::Round,
        Self::Ceil,
        Self::Floor,
        Self::Trunc,
        Self::Sign,
        Self::Sin,
        Self::Cos,
        Self::Tan,
        Self::Asin,
        Self::Acos,
        Self::Atan,
        Self::Deg2Rad,
        Self::Rad2Deg,
    ];

    /// Name used in persisted settings.
    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Negative => "negative",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
            Self::Log1p => "log1p",
            Self::Log2 => "log2",
            Self::Log10 => "log10",
            Self::Round => "round",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Trunc => "trunc",
            Self::Sign => "sign",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Deg2Rad => "deg2rad",
            Self::Rad2Deg => "rad2deg",
        }
    }

    /// Apply the function.
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Abs => value.abs(),
            Self::Negative => -value,
            Self::Sqrt => value.sqrt(),
            Self::Log => value.ln(),
            Self::Log1p => value.ln_1p(),
            Self::Log2 => value.log2(),
            Self::Log10 => value.log10(),
            // half away from zero, which is what `f64::round` does
            Self::Round => value.round(),
            Self::Ceil => value.ceil(),
            Self::Floor => value.floor(),
            Self::Trunc => value.trunc(),
            Self::Sign => {
                if value == 0.0 || value.is_nan() {
                    value
                } else {
                    value.signum()
                }
            }
            Self::Sin => value.sin(),
            Self::Cos => value.cos(),
            Self::Tan => value.tan(),
            Self::Asin => value.asin(),
            Self::Acos => value.acos(),
            Self::Atan => value.atan(),
            Self::Deg2Rad => value.to_radians(),
            Self::Rad2Deg => value.to_degrees(),
        }
    }
}

impl FromStr for MathFunction {
    type Err = UnknownMathFunction;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|function| function.name() == name)
            .ok_or_else(|| UnknownMathFunction(name.to_string()))
    }
}

impl TryFrom<String> for MathFunction {
    type Error = UnknownMathFunction;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<MathFunction> for String {
    fn from(function: MathFunction) -> Self {
        function.name().to_string()
    }
}

impl std::fmt::Display for MathFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
