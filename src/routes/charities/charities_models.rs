use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

use crate::errors::{ApiError, ValidationErrors};
use crate::models::{
    benefactor::{Experience, NewBenefactor},
    charity::NewCharity,
    task::NewTask,
    user::Gender,
};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_AN_INTEGER: &str = "A valid integer is required.";
const MAX_FREE_TIME: i64 = 32767;

/// Decodes a request body after the caller's role has been checked. An empty
/// body reads as `{}`; anything but a JSON object is a validation error.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("JSON parse error - {}", e)))?
    };

    if value.is_object() {
        return serde_json::from_value(value).map_err(|e| ApiError::BadRequest(e.to_string()));
    }
    let kind = match value {
        Value::Array(_) => "list",
        Value::String(_) => "str",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Object(_) | Value::Null => "null",
    };
    Err(ValidationErrors::single(
        "non_field_errors",
        format!("Invalid data. Expected a dictionary, but got {}.", kind),
    )
    .into())
}

// Benefactor registration request
#[derive(Deserialize)]
pub struct BenefactorRegistrationRequest {
    pub experience: Option<Value>,
    pub free_time_per_week: Option<Value>,
}

impl BenefactorRegistrationRequest {
    pub fn validate(&self, user_id: i32) -> Result<NewBenefactor, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let experience = match self.experience.as_ref().filter(|v| !v.is_null()) {
            None => Experience::default(),
            Some(value) => match as_integer(value)
                .and_then(|v| i8::try_from(v).ok())
                .and_then(|v| Experience::try_from(v).ok())
            {
                Some(experience) => experience,
                None => {
                    let shown = value.as_str().map_or_else(|| value.to_string(), str::to_string);
                    errors.add("experience", format!("\"{}\" is not a valid choice.", shown));
                    Experience::default()
                }
            },
        };

        let free_time_per_week = match integer(&mut errors, "free_time_per_week", self.free_time_per_week.as_ref()) {
            None => 0,
            Some(value) if value < 0 => {
                errors.add("free_time_per_week", "Ensure this value is greater than or equal to 0.");
                0
            }
            Some(value) if value > MAX_FREE_TIME => {
                errors.add(
                    "free_time_per_week",
                    format!("Ensure this value is less than or equal to {}.", MAX_FREE_TIME),
                );
                0
            }
            Some(value) => u16::try_from(value).unwrap_or_default(),
        };

        errors.into_result(NewBenefactor {
            user_id,
            experience,
            free_time_per_week,
        })
    }
}

// Charity registration request
#[derive(Deserialize)]
pub struct CharityRegistrationRequest {
    pub name: Option<Value>,
    pub reg_number: Option<Value>,
}

impl CharityRegistrationRequest {
    pub fn validate(&self, user_id: i32) -> Result<NewCharity, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = required_text(&mut errors, "name", self.name.as_ref(), 50);
        let reg_number = required_text(&mut errors, "reg_number", self.reg_number.as_ref(), 10);

        errors.into_result(NewCharity {
            user_id,
            name,
            reg_number,
        })
    }
}

// Task creation request. `charity_id`, `state` and `assigned_benefactor`
// are not fields here, so values sent for them are dropped.
#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub date: Option<Value>,
    pub age_limit_from: Option<Value>,
    pub age_limit_to: Option<Value>,
    pub gender_limit: Option<Value>,
}

impl CreateTaskRequest {
    pub fn validate(&self, charity_id: i32) -> Result<NewTask, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = required_text(&mut errors, "title", self.title.as_ref(), 60);
        let description = optional_text(&mut errors, "description", self.description.as_ref())
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let date = match optional_text(&mut errors, "date", self.date.as_ref()).filter(|d| !d.is_empty()) {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add(
                        "date",
                        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                    );
                    None
                }
            },
        };

        let age_limit_from = age_limit(&mut errors, "age_limit_from", self.age_limit_from.as_ref());
        let age_limit_to = age_limit(&mut errors, "age_limit_to", self.age_limit_to.as_ref());
        if let (Some(from), Some(to)) = (age_limit_from, age_limit_to) {
            if from > to {
                errors.add("age_limit_to", "Ensure this value is greater than or equal to age_limit_from.");
            }
        }

        let gender_limit = match optional_text(&mut errors, "gender_limit", self.gender_limit.as_ref())
            .filter(|g| !g.is_empty())
        {
            None => None,
            Some(code) => match Gender::from_code(&code) {
                Some(gender) => Some(gender),
                None => {
                    errors.add("gender_limit", format!("\"{}\" is not a valid choice.", code));
                    None
                }
            },
        };

        errors.into_result(NewTask {
            charity_id,
            title,
            description,
            date,
            age_limit_from,
            age_limit_to,
            gender_limit,
        })
    }
}

// Charity's answer to a benefactor's request
#[derive(Deserialize)]
pub struct TaskResponseRequest {
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDecision {
    Accepted,
    Rejected,
}

impl TaskResponseRequest {
    pub const INVALID_MESSAGE: &'static str = "Required field (\"A\" for accepted / \"R\" for rejected)";

    /// `None` unless `response` is exactly "A" or "R".
    pub fn decision(&self) -> Option<ResponseDecision> {
        match self.response.as_ref().and_then(|value| value.as_str()) {
            Some("A") => Some(ResponseDecision::Accepted),
            Some("R") => Some(ResponseDecision::Rejected),
            _ => None,
        }
    }
}

fn required_text(errors: &mut ValidationErrors, field: &str, value: Option<&Value>, max_chars: usize) -> String {
    if value.map_or(true, Value::is_null) {
        errors.add(field, REQUIRED);
        return String::new();
    }
    let Some(text) = optional_text(errors, field, value) else {
        return String::new();
    };

    let text = text.trim();
    if text.is_empty() {
        errors.add(field, BLANK);
    } else if text.chars().count() > max_chars {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max_chars),
        );
    }
    text.to_string()
}

/// Strings pass through and numbers are written out; other JSON types are
/// rejected.
fn optional_text(errors: &mut ValidationErrors, field: &str, value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => {
            errors.add(field, NOT_A_STRING);
            None
        }
    }
}

/// A JSON integer, or a string holding one.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn integer(errors: &mut ValidationErrors, field: &str, value: Option<&Value>) -> Option<i64> {
    let value = value.filter(|v| !v.is_null())?;
    let parsed = as_integer(value);
    if parsed.is_none() {
        errors.add(field, NOT_AN_INTEGER);
    }
    parsed
}

fn age_limit(errors: &mut ValidationErrors, field: &str, value: Option<&Value>) -> Option<u32> {
    let value = integer(errors, field, value)?;
    match u32::try_from(value) {
        Ok(age) => Some(age),
        Err(_) => {
            errors.add(field, "Ensure this value is greater than or equal to 0.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_request(body: serde_json::Value) -> CreateTaskRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn benefactor_defaults_to_beginner_without_free_time() {
        let request: BenefactorRegistrationRequest = serde_json::from_value(json!({})).unwrap();
        let benefactor = request.validate(3).unwrap();
        assert_eq!(benefactor.experience, Experience::Beginner);
        assert_eq!(benefactor.free_time_per_week, 0);
    }

    #[test]
    fn benefactor_ranges_are_checked() {
        let request: BenefactorRegistrationRequest =
            serde_json::from_value(json!({"experience": 3, "free_time_per_week": -1})).unwrap();
        let errors = request.validate(3).unwrap_err();
        assert!(errors.contains("experience"));
        assert!(errors.contains("free_time_per_week"));
    }

    #[test]
    fn charity_fields_are_required_and_bounded() {
        let request: CharityRegistrationRequest =
            serde_json::from_value(json!({"name": "  ", "reg_number": "12345678901"})).unwrap();
        let errors = request.validate(1).unwrap_err();
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "name": ["This field may not be blank."],
                "reg_number": ["Ensure this field has no more than 10 characters."],
            })
        );
    }

    #[test]
    fn task_request_ignores_charity_and_state_in_body() {
        let task = task_request(json!({
            "title": "Soup kitchen",
            "charity_id": 99,
            "state": "D",
            "date": "2024-05-01",
            "gender_limit": "M",
        }))
        .validate(4)
        .unwrap();
        assert_eq!(task.charity_id, 4);
        assert_eq!(task.date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(task.gender_limit, Some(Gender::Male));
    }

    #[test]
    fn task_request_rejects_inverted_age_limits_and_bad_dates() {
        let errors = task_request(json!({
            "title": "Tutoring",
            "date": "01/05/2024",
            "age_limit_from": 30,
            "age_limit_to": 20,
        }))
        .validate(4)
        .unwrap_err();
        assert!(errors.contains("date"));
        assert!(errors.contains("age_limit_to"));
        assert!(!errors.contains("title"));
    }

    #[test]
    fn task_response_accepts_only_a_or_r() {
        let decision = |body| serde_json::from_value::<TaskResponseRequest>(body).unwrap().decision();
        assert_eq!(decision(json!({"response": "A"})), Some(ResponseDecision::Accepted));
        assert_eq!(decision(json!({"response": "R"})), Some(ResponseDecision::Rejected));
        assert_eq!(decision(json!({"response": "X"})), None);
        assert_eq!(decision(json!({"response": 1})), None);
        assert_eq!(decision(json!({})), None);
    }

    #[test]
    fn wrong_json_types_are_reported_per_field() {
        let errors = task_request(json!({
            "title": ["not", "text"],
            "age_limit_from": "ten",
            "age_limit_to": "12",
        }))
        .validate(4)
        .unwrap_err();
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "title": ["Not a valid string."],
                "age_limit_from": ["A valid integer is required."],
            })
        );
    }

    #[test]
    fn free_time_is_bounded_by_a_small_integer() {
        let request: BenefactorRegistrationRequest =
            serde_json::from_value(json!({"experience": "2", "free_time_per_week": 32768})).unwrap();
        let errors = request.validate(3).unwrap_err();
        assert!(errors.contains("free_time_per_week"));
        assert!(!errors.contains("experience"));

        let request: BenefactorRegistrationRequest =
            serde_json::from_value(json!({"free_time_per_week": 32767})).unwrap();
        assert_eq!(request.validate(3).unwrap().free_time_per_week, 32767);
    }

    #[test]
    fn empty_body_reads_as_an_empty_object() {
        let request: TaskResponseRequest = parse_body(b"  ").unwrap();
        assert_eq!(request.decision(), None);
    }

    #[test]
    fn malformed_bodies_are_bad_requests() {
        let err = parse_body::<CreateTaskRequest>(b"{\"title\":").err().unwrap();
        assert!(matches!(err, ApiError::BadRequest(ref detail) if detail.starts_with("JSON parse error")));

        match parse_body::<CreateTaskRequest>(b"[1, 2]") {
            Err(ApiError::Validation(errors)) => assert!(errors.contains("non_field_errors")),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }
}
