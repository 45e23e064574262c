// Elementwise transforms applied to the masked query before projection.
//
// NeuroQuery activation coordinates carry no sign, so by default the
// absolute value of the query map is compared to the literature.

use std::fmt;

use clap::ValueEnum;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// |x|
    #[default]
    #[value(name = "absolute_value")]
    AbsoluteValue,
    /// max(x, 0)
    #[value(name = "positive_part")]
    PositivePart,
    /// x, unchanged
    #[value(name = "identity")]
    Identity,
}

impl Transform {
    pub fn apply(&self, values: &Array1<f64>) -> Array1<f64> {
        match self {
            Transform::AbsoluteValue => values.mapv(f64::abs),
            Transform::PositivePart => values.mapv(|v| v.max(0.0)),
            Transform::Identity => values.clone(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::AbsoluteValue => "absolute_value",
            Transform::PositivePart => "positive_part",
            Transform::Identity => "identity",
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
