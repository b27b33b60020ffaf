use core::{fmt, str::FromStr};
use primserve_core::{Error, protocol::Primary};

/// Upper bound on generator calls per event when a trigger rejects events.
pub const MAX_TRIALS: u32 = 100;

/// Event selection applied after generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    /// Every event is accepted.
    #[default]
    None,
    /// Events with at least one primary.
    NonEmpty,
    /// Events with at least this many primaries.
    MinPrimaries(usize),
}

impl Trigger {
    pub fn accepts(&self, primaries: &[Primary]) -> bool {
        match self {
            Self::None => true,
            Self::NonEmpty => !primaries.is_empty(),
            Self::MinPrimaries(min) => primaries.len() >= *min,
        }
    }
}

impl FromStr for Trigger {
    type Err = Error;

    /// Accepts `""` or `none`, `nonempty` and `minprimaries:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" | "none" => Ok(Self::None),
            "nonempty" => Ok(Self::NonEmpty),
            _ => s
                .strip_prefix("minprimaries:")
                .and_then(|n| n.trim().parse().ok())
                .map(Self::MinPrimaries)
                .ok_or_else(|| Error::InvalidConfig {
                    reason: format!("unknown trigger {s:?}"),
                }),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::NonEmpty => f.write_str("nonempty"),
            Self::MinPrimaries(n) => write!(f, "minprimaries:{n}"),
        }
    }
}
