use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::charity::Charity;
use super::task_state::{TaskState, Transition};
use super::user::Gender;
use crate::errors::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub task_id: i32,
    pub charity_id: i32,
    pub assigned_benefactor_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub state: TaskState,
    pub date: Option<NaiveDate>,
    pub age_limit_from: Option<u32>,
    pub age_limit_to: Option<u32>,
    pub gender_limit: Option<Gender>,
}

impl Task {
    pub fn from_new(task_id: i32, new_task: NewTask) -> Task {
        Task {
            task_id,
            charity_id: new_task.charity_id,
            assigned_benefactor_id: None,
            title: new_task.title,
            description: new_task.description,
            state: TaskState::Pending,
            date: new_task.date,
            age_limit_from: new_task.age_limit_from,
            age_limit_to: new_task.age_limit_to,
            gender_limit: new_task.gender_limit,
        }
    }

    /// Applies `transition` if the task is still in `transition.from`.
    /// Returns false, leaving the task untouched, otherwise.
    pub fn compare_and_apply(&mut self, transition: &Transition) -> bool {
        if self.state != transition.from {
            return false;
        }
        self.state = transition.to;
        self.assigned_benefactor_id = transition.assignment.resolve(self.assigned_benefactor_id);
        debug_assert!(self.assigned_benefactor_id.is_none() || self.state.allows_assignment());
        true
    }
}

/// A validated task waiting to be stored. New tasks always start PENDING
/// and unassigned.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub charity_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub age_limit_from: Option<u32>,
    pub age_limit_to: Option<u32>,
    pub gender_limit: Option<Gender>,
}

/// The tasks a user can see: every pending task, plus the tasks of their
/// charity and the tasks assigned to them as a benefactor.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelatedTo {
    pub charity_id: Option<i32>,
    pub benefactor_id: Option<i32>,
}

impl RelatedTo {
    pub fn includes(&self, task: &Task) -> bool {
        task.state == TaskState::Pending
            || self.charity_id == Some(task.charity_id)
            || (self.benefactor_id.is_some() && self.benefactor_id == task.assigned_benefactor_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskLookup {
    TitleContains(String),
    CharityNameContains(String),
    DescriptionContains(String),
    GenderLimit(Gender),
    State(TaskState),
    AgeLimitFromAbove(u32),
    AgeLimitToBelow(u32),
}

impl TaskLookup {
    /// Null columns never match, so excluding on them keeps the task.
    pub fn matches(&self, task: &Task, charity: &Charity) -> bool {
        match self {
            TaskLookup::TitleContains(needle) => contains_ignore_case(&task.title, needle),
            TaskLookup::CharityNameContains(needle) => contains_ignore_case(&charity.name, needle),
            TaskLookup::DescriptionContains(needle) => task
                .description
                .as_deref()
                .is_some_and(|description| contains_ignore_case(description, needle)),
            TaskLookup::GenderLimit(gender) => task.gender_limit == Some(*gender),
            TaskLookup::State(state) => task.state == *state,
            TaskLookup::AgeLimitFromAbove(age) => task.age_limit_from.is_some_and(|from| from > *age),
            TaskLookup::AgeLimitToBelow(age) => task.age_limit_to.is_some_and(|to| to < *age),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Filter and exclude lookups built from query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub filters: Vec<TaskLookup>,
    pub excludes: Vec<TaskLookup>,
}

impl TaskQuery {
    /// Query parameter names that narrow the listing.
    pub const FILTER_PARAMS: [&'static str; 5] = ["title", "charity", "description", "gender", "state"];
    /// Query parameter names that remove tasks from the listing.
    pub const EXCLUDE_PARAMS: [&'static str; 1] = ["age"];

    /// Builds a query from the allow-listed parameters. Unknown parameters
    /// and empty values are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Result<TaskQuery, ValidationErrors> {
        let mut query = TaskQuery::default();
        let mut errors = ValidationErrors::default();

        for name in Self::FILTER_PARAMS {
            let Some(value) = non_empty_param(params, name) else {
                continue;
            };
            let lookup = match name {
                "title" => Some(TaskLookup::TitleContains(value.to_string())),
                "charity" => Some(TaskLookup::CharityNameContains(value.to_string())),
                "description" => Some(TaskLookup::DescriptionContains(value.to_string())),
                "gender" => Gender::from_code(value).map(TaskLookup::GenderLimit),
                _ => TaskState::from_code(value).map(TaskLookup::State),
            };
            match lookup {
                Some(lookup) => query.filters.push(lookup),
                None => errors.add(name, format!("Select a valid choice. {} is not one of the available choices.", value)),
            }
        }

        for name in Self::EXCLUDE_PARAMS {
            let Some(value) = non_empty_param(params, name) else {
                continue;
            };
            match value.parse::<u32>() {
                Ok(age) => {
                    query.excludes.push(TaskLookup::AgeLimitFromAbove(age));
                    query.excludes.push(TaskLookup::AgeLimitToBelow(age));
                }
                Err(_) => errors.add(name, "Enter a whole number."),
            }
        }

        errors.into_result(query)
    }

    /// Same as [`TaskQuery::from_params`] for the admin list filters, which
    /// match `state` and `gender_limit` exactly.
    pub fn from_admin_params(params: &HashMap<String, String>) -> Result<TaskQuery, ValidationErrors> {
        let mut query = TaskQuery::default();
        let mut errors = ValidationErrors::default();

        if let Some(value) = non_empty_param(params, "state") {
            match TaskState::from_code(value) {
                Some(state) => query.filters.push(TaskLookup::State(state)),
                None => errors.add("state", format!("Select a valid choice. {} is not one of the available choices.", value)),
            }
        }
        if let Some(value) = non_empty_param(params, "gender_limit") {
            match Gender::from_code(value) {
                Some(gender) => query.filters.push(TaskLookup::GenderLimit(gender)),
                None => errors.add("gender_limit", format!("Select a valid choice. {} is not one of the available choices.", value)),
            }
        }

        errors.into_result(query)
    }

    pub fn admits(&self, task: &Task, charity: &Charity) -> bool {
        self.filters.iter().all(|lookup| lookup.matches(task, charity))
            && !self.excludes.iter().any(|lookup| lookup.matches(task, charity))
    }
}

fn non_empty_param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task_state::{Assignment, TaskEvent};

    fn charity() -> Charity {
        Charity {
            charity_id: 1,
            user_id: 10,
            name: "Green Hands".into(),
            reg_number: "GH-1".into(),
        }
    }

    fn task() -> Task {
        Task {
            task_id: 1,
            charity_id: 1,
            assigned_benefactor_id: None,
            title: "Park Cleanup".into(),
            description: Some("Collect litter along the river".into()),
            state: TaskState::Pending,
            date: None,
            age_limit_from: Some(18),
            age_limit_to: Some(40),
            gender_limit: Some(Gender::Female),
        }
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_and_unknown_params_are_ignored() {
        let query = TaskQuery::from_params(&params(&[("title", ""), ("charity_id", "3")])).unwrap();
        assert_eq!(query, TaskQuery::default());
    }

    #[test]
    fn filters_are_case_insensitive() {
        let query = TaskQuery::from_params(&params(&[("title", "park"), ("charity", "HANDS")])).unwrap();
        assert!(query.admits(&task(), &charity()));

        let query = TaskQuery::from_params(&params(&[("description", "forest")])).unwrap();
        assert!(!query.admits(&task(), &charity()));
    }

    #[test]
    fn age_excludes_tasks_outside_the_limits() {
        let too_young = TaskQuery::from_params(&params(&[("age", "16")])).unwrap();
        assert!(!too_young.admits(&task(), &charity()));

        let fits = TaskQuery::from_params(&params(&[("age", "25")])).unwrap();
        assert!(fits.admits(&task(), &charity()));

        let too_old = TaskQuery::from_params(&params(&[("age", "41")])).unwrap();
        assert!(!too_old.admits(&task(), &charity()));
    }

    #[test]
    fn age_exclusion_keeps_unbounded_tasks() {
        let mut open = task();
        open.age_limit_from = None;
        open.age_limit_to = None;
        let query = TaskQuery::from_params(&params(&[("age", "90")])).unwrap();
        assert!(query.admits(&open, &charity()));
    }

    #[test]
    fn malformed_values_are_reported_per_field() {
        let errors = TaskQuery::from_params(&params(&[("age", "old"), ("state", "Z")])).unwrap_err();
        assert!(errors.contains("age"));
        assert!(errors.contains("state"));
        assert!(!errors.contains("title"));
    }

    #[test]
    fn admin_filters_match_state_and_gender() {
        let query = TaskQuery::from_admin_params(&params(&[("state", "P"), ("gender_limit", "F")])).unwrap();
        assert!(query.admits(&task(), &charity()));

        let query = TaskQuery::from_admin_params(&params(&[("state", "D")])).unwrap();
        assert!(!query.admits(&task(), &charity()));
    }

    #[test]
    fn related_tasks_cover_pending_owned_and_assigned() {
        let mut waiting = task();
        waiting.state = TaskState::Waiting;
        waiting.assigned_benefactor_id = Some(5);

        assert!(RelatedTo::default().includes(&task()));
        assert!(!RelatedTo::default().includes(&waiting));
        assert!(RelatedTo { charity_id: Some(1), benefactor_id: None }.includes(&waiting));
        assert!(RelatedTo { charity_id: None, benefactor_id: Some(5) }.includes(&waiting));
        assert!(!RelatedTo { charity_id: Some(2), benefactor_id: Some(6) }.includes(&waiting));
    }

    #[test]
    fn compare_and_apply_refuses_stale_state() {
        let mut waiting = task();
        let request = TaskState::Pending
            .apply(TaskEvent::Request { benefactor_id: 5 })
            .unwrap();
        assert!(waiting.compare_and_apply(&request));
        assert_eq!(waiting.state, TaskState::Waiting);
        assert_eq!(waiting.assigned_benefactor_id, Some(5));

        let second = Transition {
            assignment: Assignment::Set(6),
            ..request
        };
        assert!(!waiting.compare_and_apply(&second));
        assert_eq!(waiting.assigned_benefactor_id, Some(5));
    }
}
