//! Bar timeframes and the multi-timeframe analysis hierarchy.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::AmatraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
    W1,
}

/// Timeframes a session may step down through, fastest first.
const SESSION_LADDER: [Timeframe; 5] = [
    Timeframe::M1,
    Timeframe::M5,
    Timeframe::M15,
    Timeframe::H1,
    Timeframe::H4,
];

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
    ];

    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1_440,
            Timeframe::W1 => 10_080,
        }
    }

    /// One step faster on the session ladder, floored at M1.
    pub fn faster(self) -> Timeframe {
        match SESSION_LADDER.iter().position(|tf| *tf == self) {
            Some(0) => Timeframe::M1,
            Some(i) => SESSION_LADDER[i - 1],
            None => Timeframe::H4,
        }
    }

    /// Primary timeframe followed by the two higher confirmation timeframes.
    pub fn analysis_hierarchy(self) -> [Timeframe; 3] {
        match self {
            Timeframe::M1 => [Timeframe::M1, Timeframe::M5, Timeframe::M15],
            Timeframe::M5 => [Timeframe::M5, Timeframe::M15, Timeframe::H1],
            Timeframe::M15 => [Timeframe::M15, Timeframe::H1, Timeframe::H4],
            Timeframe::H1 => [Timeframe::H1, Timeframe::H4, Timeframe::D1],
            Timeframe::H4 | Timeframe::D1 | Timeframe::W1 => {
                [Timeframe::H4, Timeframe::D1, Timeframe::W1]
            }
        }
    }

    /// (timeframe, weight) pairs for weighted agreement; weights sum to 1.
    pub fn mtf_weights(self) -> [(Timeframe, f64); 3] {
        let [a, b, c] = self.analysis_hierarchy();
        [(a, 0.5), (b, 0.3), (c, 0.2)]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        };
        f.write_str(s)
    }
}

impl FromStr for Timeframe {
    type Err = AmatraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            "W1" => Ok(Timeframe::W1),
            other => Err(AmatraderError::Invalid {
                field: "timeframe".into(),
                reason: format!("unknown timeframe '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faster_steps_down_and_floors() {
        assert_eq!(Timeframe::M5.faster(), Timeframe::M1);
        assert_eq!(Timeframe::M1.faster(), Timeframe::M1);
        assert_eq!(Timeframe::H4.faster(), Timeframe::H1);
        assert_eq!(Timeframe::M15.faster(), Timeframe::M5);
    }

    #[test]
    fn hierarchy_and_weights() {
        assert_eq!(
            Timeframe::M15.analysis_hierarchy(),
            [Timeframe::M15, Timeframe::H1, Timeframe::H4]
        );
        let total: f64 = Timeframe::H1.mtf_weights().iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn parse_round_trip() {
        for tf in [Timeframe::M1, Timeframe::M15, Timeframe::W1] {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("M7".parse::<Timeframe>().is_err());
        assert_eq!(" h4 ".parse::<Timeframe>().unwrap(), Timeframe::H4);
    }
}
