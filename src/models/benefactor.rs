use std::fmt;

use serde::{Deserialize, Serialize};

use super::user::Gender;

/// Self-reported experience level, stored as 0, 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Experience {
    #[default]
    Beginner,
    Intermediate,
    Expert,
}

impl From<Experience> for i8 {
    fn from(experience: Experience) -> i8 {
        match experience {
            Experience::Beginner => 0,
            Experience::Intermediate => 1,
            Experience::Expert => 2,
        }
    }
}

impl TryFrom<i8> for Experience {
    type Error = InvalidExperience;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Experience::Beginner),
            1 => Ok(Experience::Intermediate),
            2 => Ok(Experience::Expert),
            other => Err(InvalidExperience(other.into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidExperience(pub i64);

impl fmt::Display for InvalidExperience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" is not a valid choice.", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Benefactor {
    pub benefactor_id: i32,
    pub user_id: i32,
    pub experience: Experience,
    pub free_time_per_week: u16,
}

#[derive(Debug, Clone)]
pub struct NewBenefactor {
    pub user_id: i32,
    pub experience: Experience,
    pub free_time_per_week: u16,
}

/// List filters of the benefactor admin screen.
#[derive(Debug, Clone, Default)]
pub struct BenefactorFilter {
    pub experience: Option<Experience>,
    pub gender: Option<Gender>,
}
