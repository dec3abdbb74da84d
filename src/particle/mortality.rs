use std::fmt;

use serde::{Deserialize, Serialize};

/// Cause of death, written to output as an integer code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mortality {
    #[default]
    Alive,
    OutOfDomain,
    Old,
    Beached,
    DeadCold,
    DeadHot,
}

impl Mortality {
    pub const ALL: [Mortality; 6] = [
        Mortality::Alive,
        Mortality::OutOfDomain,
        Mortality::Old,
        Mortality::Beached,
        Mortality::DeadCold,
        Mortality::DeadHot,
    ];

    #[inline]
    pub fn code(self) -> i32 {
        match self {
            Mortality::Alive => 0,
            Mortality::OutOfDomain => 1,
            Mortality::Old => 2,
            Mortality::Beached => 3,
            Mortality::DeadCold => 4,
            Mortality::DeadHot => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mortality::Alive => "alive",
            Mortality::OutOfDomain => "out_of_domain",
            Mortality::Old => "old",
            Mortality::Beached => "beached",
            Mortality::DeadCold => "dead_cold",
            Mortality::DeadHot => "dead_hot",
        }
    }

    /// `"0 alive, 1 out_of_domain, ..."`, used as an output attribute.
    pub fn legend() -> String {
        Self::ALL
            .iter()
            .map(|m| format!("{} {}", m.code(), m.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Mortality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
