use std::fmt;

use serde::{Deserialize, Serialize};

/// A taxing level whose share of a price is estimated separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sphere {
    /// Federal taxes on domestically produced goods and services.
    NationalDomestic,
    /// Federal taxes on imported goods and services.
    NationalImported,
    State,
    Municipal,
}

impl Sphere {
    pub const ALL: [Sphere; 4] = [
        Sphere::NationalDomestic,
        Sphere::NationalImported,
        Sphere::State,
        Sphere::Municipal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::NationalDomestic => "National (domestic)",
            Self::NationalImported => "National (imported)",
            Self::State => "State",
            Self::Municipal => "Municipal",
        }
    }

    /// Whether the sphere belongs to the federal level.
    pub fn is_federal(&self) -> bool {
        matches!(self, Self::NationalDomestic | Self::NationalImported)
    }
}

impl fmt::Display for Sphere {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.pad(self.label())
    }
}
