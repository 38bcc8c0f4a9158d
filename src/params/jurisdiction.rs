//! Regional jurisdictions (provinces and territories)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TaxError;

/// A regional tax layer. The federal layer always applies on top of one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Jurisdiction {
    AB,
    BC,
    MB,
    NB,
    NL,
    NS,
    NT,
    NU,
    ON,
    PE,
    QC,
    SK,
    YT,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 13] = [
        Jurisdiction::AB,
        Jurisdiction::BC,
        Jurisdiction::MB,
        Jurisdiction::NB,
        Jurisdiction::NL,
        Jurisdiction::NS,
        Jurisdiction::NT,
        Jurisdiction::NU,
        Jurisdiction::ON,
        Jurisdiction::PE,
        Jurisdiction::QC,
        Jurisdiction::SK,
        Jurisdiction::YT,
    ];

    /// Two-letter code, also used as the parameter file stem
    pub fn code(&self) -> &'static str {
        match self {
            Jurisdiction::AB => "AB",
            Jurisdiction::BC => "BC",
            Jurisdiction::MB => "MB",
            Jurisdiction::NB => "NB",
            Jurisdiction::NL => "NL",
            Jurisdiction::NS => "NS",
            Jurisdiction::NT => "NT",
            Jurisdiction::NU => "NU",
            Jurisdiction::ON => "ON",
            Jurisdiction::PE => "PE",
            Jurisdiction::QC => "QC",
            Jurisdiction::SK => "SK",
            Jurisdiction::YT => "YT",
        }
    }

    /// Whether this jurisdiction runs its own pension and insurance plans,
    /// in which case the alternate contribution rate pair applies.
    pub fn uses_alternate_contributions(&self) -> bool {
        matches!(self, Jurisdiction::QC)
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Jurisdiction {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Jurisdiction::ALL
            .iter()
            .copied()
            .find(|j| j.code() == code)
            .ok_or_else(|| TaxError::UnknownJurisdiction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("on".parse::<Jurisdiction>().unwrap(), Jurisdiction::ON);
        assert_eq!(" Qc ".parse::<Jurisdiction>().unwrap(), Jurisdiction::QC);
        assert!(matches!(
            "Ontario".parse::<Jurisdiction>(),
            Err(TaxError::UnknownJurisdiction(_))
        ));
    }

    #[test]
    fn test_only_quebec_uses_alternate_contributions() {
        let alternates: Vec<_> = Jurisdiction::ALL
            .iter()
            .filter(|j| j.uses_alternate_contributions())
            .collect();
        assert_eq!(alternates, vec![&Jurisdiction::QC]);
    }
}
