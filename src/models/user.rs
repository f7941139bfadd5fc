use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub const fn code(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }

    pub fn from_code(code: &str) -> Option<Gender> {
        match code {
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: i32,
    pub user_name: String,
    pub user_email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
    pub is_staff: bool,
}

/// A user account that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub user_email: String,
    pub password_hash: String,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
}
