use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::FourTopError;

/// The six truth partons of a fully hadronic $`t\bar{t}`$ pair, in the order used for the
/// `jet_parton_match` output.
///
/// The first three descend from the top quark ($`t \to W^+ b`$, $`W^+ \to q_0 \bar{q}_1`$), the
/// last three from the antitop ($`\bar{t} \to W^- \bar{b}`$, $`W^- \to q_2 \bar{q}_3`$).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Parton {
    /// The bottom quark from the top decay.
    BMinus,
    /// The first light quark from the $`W^+`$ decay.
    Q0,
    /// The second light quark from the $`W^+`$ decay.
    Q1,
    /// The bottom antiquark from the antitop decay.
    BPlus,
    /// The first light quark from the $`W^-`$ decay.
    Q2,
    /// The second light quark from the $`W^-`$ decay.
    Q3,
}

/// The number of partons resolved per event.
pub const N_PARTONS: usize = 6;

impl Parton {
    /// All partons in output order.
    pub const ALL: [Parton; N_PARTONS] = [
        Parton::BMinus,
        Parton::Q0,
        Parton::Q1,
        Parton::BPlus,
        Parton::Q2,
        Parton::Q3,
    ];

    /// The position of this parton in the output order.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The parton at a given position in the output order.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether this parton is one of the two bottom quarks.
    pub fn is_bottom(&self) -> bool {
        matches!(self, Parton::BMinus | Parton::BPlus)
    }
}

impl Display for Parton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parton::BMinus => write!(f, "b-"),
            Parton::Q0 => write!(f, "q0"),
            Parton::Q1 => write!(f, "q1"),
            Parton::BPlus => write!(f, "b+"),
            Parton::Q2 => write!(f, "q2"),
            Parton::Q3 => write!(f, "q3"),
        }
    }
}

impl FromStr for Parton {
    type Err = FourTopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "b-" | "b_minus" | "bminus" | "b" => Ok(Self::BMinus),
            "q0" => Ok(Self::Q0),
            "q1" => Ok(Self::Q1),
            "b+" | "b_plus" | "bplus" | "bbar" => Ok(Self::BPlus),
            "q2" => Ok(Self::Q2),
            "q3" => Ok(Self::Q3),
            _ => Err(FourTopError::ParseError {
                name: s.to_string(),
                object: "Parton".to_string(),
            }),
        }
    }
}

/// What to do with an event whose decay chain does not have the expected topology.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyPolicy {
    /// Drop the event, log a warning and carry on with the rest.
    #[default]
    Skip,
    /// Stop processing and return the error.
    Abort,
}

impl Display for TopologyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyPolicy::Skip => write!(f, "skip"),
            TopologyPolicy::Abort => write!(f, "abort"),
        }
    }
}

impl FromStr for TopologyPolicy {
    type Err = FourTopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" | "drop" => Ok(Self::Skip),
            "abort" | "fail" => Ok(Self::Abort),
            _ => Err(FourTopError::ParseError {
                name: s.to_string(),
                object: "TopologyPolicy".to_string(),
            }),
        }
    }
}

/// Precision for writing floating-point columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FloatPrecision {
    /// 32-bit floats.
    F32,
    /// 64-bit floats.
    #[default]
    F64,
}

impl Display for FloatPrecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FloatPrecision::F32 => write!(f, "f32"),
            FloatPrecision::F64 => write!(f, "f64"),
        }
    }
}

impl FromStr for FloatPrecision {
    type Err = FourTopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "f32" | "float" | "float32" | "single" => Ok(Self::F32),
            "f64" | "double" | "float64" => Ok(Self::F64),
            _ => Err(FourTopError::ParseError {
                name: s.to_string(),
                object: "FloatPrecision".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_displays() {
        assert_eq!(format!("{}", Parton::BMinus), "b-");
        assert_eq!(format!("{}", Parton::Q3), "q3");
        assert_eq!(format!("{}", TopologyPolicy::Abort), "abort");
        assert_eq!(format!("{}", FloatPrecision::F32), "f32");
    }

    #[test]
    fn parton_order() {
        for (index, parton) in Parton::ALL.iter().enumerate() {
            assert_eq!(parton.index(), index);
            assert_eq!(Parton::from_index(index), Some(*parton));
        }
        assert_eq!(Parton::from_index(N_PARTONS), None);
        assert!(Parton::BPlus.is_bottom());
        assert!(!Parton::Q2.is_bottom());
    }

    #[test]
    fn enum_parsing() {
        assert_eq!("B+".parse::<Parton>().unwrap(), Parton::BPlus);
        assert_eq!("Abort".parse::<TopologyPolicy>().unwrap(), TopologyPolicy::Abort);
        assert_eq!("double".parse::<FloatPrecision>().unwrap(), FloatPrecision::F64);
        assert!(matches!(
            "gluon".parse::<Parton>(),
            Err(FourTopError::ParseError { .. })
        ));
    }
}
