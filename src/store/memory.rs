//! In-memory repository for handler tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Repository, StoreError, StoreResult};
use crate::models::{
    benefactor::{Benefactor, BenefactorFilter, NewBenefactor},
    charity::{Charity, NewCharity},
    session::Session,
    task::{NewTask, RelatedTo, Task, TaskQuery},
    task_state::Transition,
    user::{NewUser, User},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    sessions: Vec<Session>,
    benefactors: Vec<Benefactor>,
    charities: Vec<Charity>,
    tasks: Vec<Task>,
}

fn next_id(len: usize) -> i32 {
    i32::try_from(len + 1).unwrap_or(i32::MAX)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags an existing user as staff.
    pub async fn make_staff(&self, user_id: i32) {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.iter_mut().find(|user| user.user_id == user_id) {
            user.is_staff = true;
        }
    }

    /// Overwrites a stored task, bypassing the state machine.
    pub async fn put_task(&self, task: Task) {
        let mut state = self.state.write().await;
        if let Some(stored) = state.tasks.iter_mut().find(|t| t.task_id == task.task_id) {
            *stored = task;
        }
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn username_exists(&self, user_name: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.users.iter().any(|user| user.user_name == user_name))
    }

    async fn email_exists(&self, user_email: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.users.iter().any(|user| user.user_email == user_email))
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|u| u.user_name == user.user_name || u.user_email == user.user_email)
        {
            return Err(StoreError::Duplicate("user"));
        }
        let user = User {
            user_id: next_id(state.users.len()),
            user_name: user.user_name,
            user_email: user.user_email,
            password_hash: user.password_hash,
            gender: user.gender,
            age: user.age,
            is_staff: false,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: i32) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|user| user.user_id == user_id).cloned())
    }

    async fn find_user_by_name(&self, user_name: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|user| user.user_name == user_name).cloned())
    }

    async fn find_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .iter()
            .find(|session| session.session_id == session_id)
            .cloned())
    }

    async fn replace_session(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.sessions.retain(|s| s.user_id != session.user_id);
        state.sessions.push(session.clone());
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|s| s.session_id != session_id);
        Ok(state.sessions.len() < before)
    }

    async fn delete_all_sessions(&self) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let removed = state.sessions.len() as u64;
        state.sessions.clear();
        Ok(removed)
    }

    async fn create_benefactor(&self, benefactor: NewBenefactor) -> StoreResult<Benefactor> {
        let mut state = self.state.write().await;
        if state.benefactors.iter().any(|b| b.user_id == benefactor.user_id) {
            return Err(StoreError::Duplicate("benefactor"));
        }
        let benefactor = Benefactor {
            benefactor_id: next_id(state.benefactors.len()),
            user_id: benefactor.user_id,
            experience: benefactor.experience,
            free_time_per_week: benefactor.free_time_per_week,
        };
        state.benefactors.push(benefactor.clone());
        Ok(benefactor)
    }

    async fn find_benefactor_by_user(&self, user_id: i32) -> StoreResult<Option<Benefactor>> {
        let state = self.state.read().await;
        Ok(state.benefactors.iter().find(|b| b.user_id == user_id).cloned())
    }

    async fn list_benefactors(&self, filter: &BenefactorFilter) -> StoreResult<Vec<Benefactor>> {
        let state = self.state.read().await;
        Ok(state
            .benefactors
            .iter()
            .filter(|b| filter.experience.map_or(true, |experience| b.experience == experience))
            .filter(|b| {
                filter.gender.map_or(true, |gender| {
                    state
                        .users
                        .iter()
                        .any(|user| user.user_id == b.user_id && user.gender == Some(gender))
                })
            })
            .cloned()
            .collect())
    }

    async fn create_charity(&self, charity: NewCharity) -> StoreResult<Charity> {
        let mut state = self.state.write().await;
        if state.charities.iter().any(|c| c.user_id == charity.user_id) {
            return Err(StoreError::Duplicate("charity"));
        }
        let charity = Charity {
            charity_id: next_id(state.charities.len()),
            user_id: charity.user_id,
            name: charity.name,
            reg_number: charity.reg_number,
        };
        state.charities.push(charity.clone());
        Ok(charity)
    }

    async fn find_charity_by_user(&self, user_id: i32) -> StoreResult<Option<Charity>> {
        let state = self.state.read().await;
        Ok(state.charities.iter().find(|c| c.user_id == user_id).cloned())
    }

    async fn list_charities(&self) -> StoreResult<Vec<Charity>> {
        let state = self.state.read().await;
        Ok(state.charities.clone())
    }

    async fn create_task(&self, task: NewTask) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        let task = Task::from_new(next_id(state.tasks.len()), task);
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, task_id: i32) -> StoreResult<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.iter().find(|t| t.task_id == task_id).cloned())
    }

    async fn list_tasks(&self, related: Option<RelatedTo>, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        let mut tasks = Vec::new();
        for task in &state.tasks {
            if related.is_some_and(|related| !related.includes(task)) {
                continue;
            }
            let charity = state
                .charities
                .iter()
                .find(|c| c.charity_id == task.charity_id)
                .ok_or_else(|| StoreError::Corrupt(format!("task {} has no charity", task.task_id)))?;
            if query.admits(task, charity) {
                tasks.push(task.clone());
            }
        }
        Ok(tasks)
    }

    async fn apply_transition(&self, task_id: i32, transition: &Transition) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .is_some_and(|task| task.compare_and_apply(transition)))
    }
}
