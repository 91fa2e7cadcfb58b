//! CLI value enums and domain type conversions.

use clap::ValueEnum;

use crate::domain::LayoutDirection;

/// Layout direction for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionArg {
    /// Layers run left to right
    #[value(name = "lr", alias = "left-right")]
    Lr,
    /// Layers run top to bottom
    #[value(name = "tb", alias = "top-bottom")]
    Tb,
}

impl std::fmt::Display for DirectionArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lr => write!(f, "lr"),
            Self::Tb => write!(f, "tb"),
        }
    }
}

impl From<DirectionArg> for LayoutDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Lr => LayoutDirection::LeftRight,
            DirectionArg::Tb => LayoutDirection::TopBottom,
        }
    }
}
