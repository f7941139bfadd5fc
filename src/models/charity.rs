use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Charity {
    pub charity_id: i32,
    pub user_id: i32,
    pub name: String,
    pub reg_number: String,
}

#[derive(Debug, Clone)]
pub struct NewCharity {
    pub user_id: i32,
    pub name: String,
    pub reg_number: String,
}
