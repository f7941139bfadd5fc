//! Persistence port. Handlers only talk to [`Repository`]; the MySQL pool
//! backs it in production and an in-memory map backs it in tests.

use async_trait::async_trait;

use crate::models::{
    benefactor::{Benefactor, BenefactorFilter, NewBenefactor},
    charity::{Charity, NewCharity},
    session::Session,
    task::{NewTask, RelatedTo, Task, TaskQuery},
    task_state::Transition,
    user::{NewUser, User},
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique column already holds the value.
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    /// A stored value could not be decoded into its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn username_exists(&self, user_name: &str) -> StoreResult<bool>;

    async fn email_exists(&self, user_email: &str) -> StoreResult<bool>;

    /// Fails with [`StoreError::Duplicate`] when the name or email is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user(&self, user_id: i32) -> StoreResult<Option<User>>;

    async fn find_user_by_name(&self, user_name: &str) -> StoreResult<Option<User>>;

    async fn find_session(&self, session_id: &str) -> StoreResult<Option<Session>>;

    /// Stores `session` as the only session of its user.
    async fn replace_session(&self, session: &Session) -> StoreResult<()>;

    /// Returns whether a session was removed.
    async fn delete_session(&self, session_id: &str) -> StoreResult<bool>;

    async fn delete_all_sessions(&self) -> StoreResult<u64>;

    /// Fails with [`StoreError::Duplicate`] when the user already is a benefactor.
    async fn create_benefactor(&self, benefactor: NewBenefactor) -> StoreResult<Benefactor>;

    async fn find_benefactor_by_user(&self, user_id: i32) -> StoreResult<Option<Benefactor>>;

    async fn list_benefactors(&self, filter: &BenefactorFilter) -> StoreResult<Vec<Benefactor>>;

    /// Fails with [`StoreError::Duplicate`] when the user already owns a charity.
    async fn create_charity(&self, charity: NewCharity) -> StoreResult<Charity>;

    async fn find_charity_by_user(&self, user_id: i32) -> StoreResult<Option<Charity>>;

    async fn list_charities(&self) -> StoreResult<Vec<Charity>>;

    async fn create_task(&self, task: NewTask) -> StoreResult<Task>;

    async fn find_task(&self, task_id: i32) -> StoreResult<Option<Task>>;

    /// Lists tasks ordered by id. `related: None` lists every task.
    async fn list_tasks(&self, related: Option<RelatedTo>, query: &TaskQuery) -> StoreResult<Vec<Task>>;

    /// Persists `transition` only if the task is still in `transition.from`.
    /// Returns false when another writer got there first.
    async fn apply_transition(&self, task_id: i32, transition: &Transition) -> StoreResult<bool>;
}
