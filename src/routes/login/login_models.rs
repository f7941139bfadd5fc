use serde::{Deserialize, Serialize};

use crate::errors::ValidationErrors;
use crate::models::user::Gender;

// Username check request and response
#[derive(Deserialize)]
pub struct CheckUsernameRequest {
    pub username: String,
}

#[derive(Serialize)]
pub struct CheckUsernameResponse {
    pub is_unique: bool,
}


// Email check request and response
#[derive(Deserialize)]
pub struct CheckEmailRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct CheckEmailResponse {
    pub is_unique: bool,
}


// Registration request and response
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub gender: Option<String>,
    pub age: Option<i64>,
}

/// Profile fields of a registration that passed validation.
pub struct RegisterProfile {
    pub gender: Option<Gender>,
    pub age: Option<u32>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<RegisterProfile, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", "This field may not be blank.");
        } else if username.chars().count() > 150 {
            errors.add("username", "Ensure this field has no more than 150 characters.");
        }
        if !self.email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        if self.password.is_empty() {
            errors.add("password", "This field may not be blank.");
        }

        let gender = match self.gender.as_deref().filter(|g| !g.is_empty()) {
            None => None,
            Some(code) => {
                let gender = Gender::from_code(code);
                if gender.is_none() {
                    errors.add("gender", format!("\"{}\" is not a valid choice.", code));
                }
                gender
            }
        };
        let age = match self.age {
            None => None,
            Some(age) => {
                let age = u32::try_from(age).ok();
                if age.is_none() {
                    errors.add("age", "Ensure this value is greater than or equal to 0.");
                }
                age
            }
        };

        errors.into_result(RegisterProfile { gender, age })
    }
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
}


// Login request and response
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
}


// Auto-login response
#[derive(Serialize)]
pub struct AutoLoginResponse {
    pub success: bool,
    pub message: String,
    pub username: String,
}


// Logout response
#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}
