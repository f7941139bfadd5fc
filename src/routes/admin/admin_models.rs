use std::collections::HashMap;

use serde::Serialize;

use crate::errors::ValidationErrors;
use crate::models::{
    benefactor::{BenefactorFilter, Experience},
    user::Gender,
};

#[derive(Serialize)]
pub struct AdminDefaultResponse {
    pub success: bool,
    pub message: String,
}

/// Reads the `experience` and `gender` list filters.
pub fn benefactor_filter(params: &HashMap<String, String>) -> Result<BenefactorFilter, ValidationErrors> {
    let mut filter = BenefactorFilter::default();
    let mut errors = ValidationErrors::default();

    if let Some(value) = params.get("experience").filter(|v| !v.is_empty()) {
        match value.parse::<i8>().ok().and_then(|v| Experience::try_from(v).ok()) {
            Some(experience) => filter.experience = Some(experience),
            None => errors.add("experience", format!("\"{}\" is not a valid choice.", value)),
        }
    }
    if let Some(value) = params.get("gender").filter(|v| !v.is_empty()) {
        match Gender::from_code(value) {
            Some(gender) => filter.gender = Some(gender),
            None => errors.add("gender", format!("\"{}\" is not a valid choice.", value)),
        }
    }

    errors.into_result(filter)
}
