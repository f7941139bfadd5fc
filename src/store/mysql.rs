use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{mysql::MySqlQueryResult, FromRow, MySql, MySqlPool, QueryBuilder};

use super::{Repository, StoreError, StoreResult};
use crate::models::{
    benefactor::{Benefactor, BenefactorFilter, Experience, NewBenefactor},
    charity::{Charity, NewCharity},
    session::Session,
    task::{NewTask, RelatedTo, Task, TaskLookup, TaskQuery},
    task_state::{Assignment, TaskState, Transition},
    user::{Gender, NewUser, User},
};

const USER_COLUMNS: &str = "user_id, user_name, user_email, password_hash, gender, age, is_staff";
const TASK_COLUMNS: &str = "t.task_id, t.charity_id, t.assigned_benefactor_id, t.title, t.description, \
     t.state, t.task_date, t.age_limit_from, t.age_limit_to, t.gender_limit";

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlStore { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    user_id: i32,
    user_name: String,
    user_email: String,
    password_hash: String,
    gender: Option<String>,
    age: Option<u32>,
    is_staff: bool,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            user_id: row.user_id,
            user_name: row.user_name,
            user_email: row.user_email,
            password_hash: row.password_hash,
            gender: decode_gender(row.gender.as_deref())?,
            age: row.age,
            is_staff: row.is_staff,
        })
    }
}

#[derive(FromRow)]
struct BenefactorRow {
    benefactor_id: i32,
    user_id: i32,
    experience: i8,
    free_time_per_week: u16,
}

impl TryFrom<BenefactorRow> for Benefactor {
    type Error = StoreError;

    fn try_from(row: BenefactorRow) -> Result<Self, Self::Error> {
        let experience = Experience::try_from(row.experience)
            .map_err(|e| StoreError::Corrupt(format!("benefactor {} experience: {}", row.benefactor_id, e)))?;
        Ok(Benefactor {
            benefactor_id: row.benefactor_id,
            user_id: row.user_id,
            experience,
            free_time_per_week: row.free_time_per_week,
        })
    }
}

#[derive(FromRow)]
struct TaskRow {
    task_id: i32,
    charity_id: i32,
    assigned_benefactor_id: Option<i32>,
    title: String,
    description: Option<String>,
    state: String,
    task_date: Option<NaiveDate>,
    age_limit_from: Option<u32>,
    age_limit_to: Option<u32>,
    gender_limit: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let state = TaskState::from_code(&row.state)
            .ok_or_else(|| StoreError::Corrupt(format!("task {} state {:?}", row.task_id, row.state)))?;
        Ok(Task {
            task_id: row.task_id,
            charity_id: row.charity_id,
            assigned_benefactor_id: row.assigned_benefactor_id,
            title: row.title,
            description: row.description,
            state,
            date: row.task_date,
            age_limit_from: row.age_limit_from,
            age_limit_to: row.age_limit_to,
            gender_limit: decode_gender(row.gender_limit.as_deref())?,
        })
    }
}

fn decode_gender(code: Option<&str>) -> StoreResult<Option<Gender>> {
    match code {
        None => Ok(None),
        Some(code) => Gender::from_code(code)
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("gender {:?}", code))),
    }
}

/// Maps a unique-key violation to [`StoreError::Duplicate`].
fn unique(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Duplicate(entity);
            }
        }
        StoreError::Database(err)
    }
}

fn inserted_id(result: &MySqlQueryResult) -> StoreResult<i32> {
    i32::try_from(result.last_insert_id())
        .map_err(|_| StoreError::Corrupt(format!("insert id {} out of range", result.last_insert_id())))
}

/// `%needle%` for a case-insensitive LIKE, with `!` escaping wildcards.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '!' | '%' | '_') {
            pattern.push('!');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Pushes `lookup` as a parenthesised predicate. Nullable columns are
/// guarded so that `NOT (...)` keeps rows holding NULL.
fn push_lookup(builder: &mut QueryBuilder<'_, MySql>, lookup: &TaskLookup) {
    match lookup {
        TaskLookup::TitleContains(needle) => {
            builder
                .push("(LOWER(t.title) LIKE ")
                .push_bind(like_pattern(needle))
                .push(" ESCAPE '!')");
        }
        TaskLookup::CharityNameContains(needle) => {
            builder
                .push("(LOWER(c.name) LIKE ")
                .push_bind(like_pattern(needle))
                .push(" ESCAPE '!')");
        }
        TaskLookup::DescriptionContains(needle) => {
            builder
                .push("(t.description IS NOT NULL AND LOWER(t.description) LIKE ")
                .push_bind(like_pattern(needle))
                .push(" ESCAPE '!')");
        }
        TaskLookup::GenderLimit(gender) => {
            builder
                .push("(t.gender_limit IS NOT NULL AND t.gender_limit = ")
                .push_bind(gender.code())
                .push(")");
        }
        TaskLookup::State(state) => {
            builder.push("(t.state = ").push_bind(state.code()).push(")");
        }
        TaskLookup::AgeLimitFromAbove(age) => {
            builder
                .push("(t.age_limit_from IS NOT NULL AND t.age_limit_from > ")
                .push_bind(*age)
                .push(")");
        }
        TaskLookup::AgeLimitToBelow(age) => {
            builder
                .push("(t.age_limit_to IS NOT NULL AND t.age_limit_to < ")
                .push_bind(*age)
                .push(")");
        }
    }
}

/// Tasks visible through `related` (every task when `None`), narrowed by
/// the query's filters and excludes.
fn task_list_query(related: Option<RelatedTo>, query: &TaskQuery) -> QueryBuilder<'static, MySql> {
    let mut builder = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM Tasks_ t JOIN Charities_ c ON t.charity_id = c.charity_id WHERE 1 = 1",
        TASK_COLUMNS
    ));

    if let Some(related) = related {
        builder
            .push(" AND (t.state = ")
            .push_bind(TaskState::Pending.code());
        if let Some(charity_id) = related.charity_id {
            builder.push(" OR t.charity_id = ").push_bind(charity_id);
        }
        if let Some(benefactor_id) = related.benefactor_id {
            builder.push(" OR t.assigned_benefactor_id = ").push_bind(benefactor_id);
        }
        builder.push(")");
    }
    for lookup in &query.filters {
        builder.push(" AND ");
        push_lookup(&mut builder, lookup);
    }
    for lookup in &query.excludes {
        builder.push(" AND NOT ");
        push_lookup(&mut builder, lookup);
    }
    builder.push(" ORDER BY t.task_id");
    builder
}

/// Compare-and-swap update: only matches while the task is still in
/// `transition.from`.
fn transition_query(task_id: i32, transition: &Transition) -> QueryBuilder<'static, MySql> {
    let mut builder = QueryBuilder::<MySql>::new("UPDATE Tasks_ SET state = ");
    builder.push_bind(transition.to.code());
    match transition.assignment {
        Assignment::Keep => {}
        Assignment::Set(benefactor_id) => {
            builder.push(", assigned_benefactor_id = ").push_bind(benefactor_id);
        }
        Assignment::Clear => {
            builder.push(", assigned_benefactor_id = NULL");
        }
    }
    builder
        .push(" WHERE task_id = ")
        .push_bind(task_id)
        .push(" AND state = ")
        .push_bind(transition.from.code());
    builder
}

#[async_trait]
impl Repository for MySqlStore {
    async fn username_exists(&self, user_name: &str) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Users_ WHERE user_name = ?")
            .bind(user_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn email_exists(&self, user_email: &str) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Users_ WHERE user_email = ?")
            .bind(user_email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let result = sqlx::query(
            "INSERT INTO Users_ (user_name, user_email, password_hash, gender, age) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.user_name)
        .bind(&user.user_email)
        .bind(&user.password_hash)
        .bind(user.gender.map(Gender::code))
        .bind(user.age)
        .execute(&self.pool)
        .await
        .map_err(unique("user"))?;

        Ok(User {
            user_id: inserted_id(&result)?,
            user_name: user.user_name,
            user_email: user.user_email,
            password_hash: user.password_hash,
            gender: user.gender,
            age: user.age,
            is_staff: false,
        })
    }

    async fn find_user(&self, user_id: i32) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM Users_ WHERE user_id = ?", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_name(&self, user_name: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM Users_ WHERE user_name = ?", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(user_name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT session_id, user_id, expires_at, is_persistent FROM Sessions_ WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn replace_session(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO Sessions_ (session_id, user_id, expires_at, is_persistent) VALUES (?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE session_id = VALUES(session_id), expires_at = VALUES(expires_at), \
             is_persistent = VALUES(is_persistent)",
        )
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.is_persistent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM Sessions_ WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_sessions(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM Sessions_").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn create_benefactor(&self, benefactor: NewBenefactor) -> StoreResult<Benefactor> {
        let result = sqlx::query(
            "INSERT INTO Benefactors_ (user_id, experience, free_time_per_week) VALUES (?, ?, ?)",
        )
        .bind(benefactor.user_id)
        .bind(i8::from(benefactor.experience))
        .bind(benefactor.free_time_per_week)
        .execute(&self.pool)
        .await
        .map_err(unique("benefactor"))?;

        Ok(Benefactor {
            benefactor_id: inserted_id(&result)?,
            user_id: benefactor.user_id,
            experience: benefactor.experience,
            free_time_per_week: benefactor.free_time_per_week,
        })
    }

    async fn find_benefactor_by_user(&self, user_id: i32) -> StoreResult<Option<Benefactor>> {
        let row: Option<BenefactorRow> = sqlx::query_as(
            "SELECT benefactor_id, user_id, experience, free_time_per_week FROM Benefactors_ WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Benefactor::try_from).transpose()
    }

    async fn list_benefactors(&self, filter: &BenefactorFilter) -> StoreResult<Vec<Benefactor>> {
        let mut builder = QueryBuilder::<MySql>::new(
            "SELECT b.benefactor_id, b.user_id, b.experience, b.free_time_per_week \
             FROM Benefactors_ b JOIN Users_ u ON b.user_id = u.user_id WHERE 1 = 1",
        );
        if let Some(experience) = filter.experience {
            builder.push(" AND b.experience = ").push_bind(i8::from(experience));
        }
        if let Some(gender) = filter.gender {
            builder.push(" AND u.gender = ").push_bind(gender.code());
        }
        builder.push(" ORDER BY b.benefactor_id");

        let rows: Vec<BenefactorRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Benefactor::try_from).collect()
    }

    async fn create_charity(&self, charity: NewCharity) -> StoreResult<Charity> {
        let result = sqlx::query("INSERT INTO Charities_ (user_id, name, reg_number) VALUES (?, ?, ?)")
            .bind(charity.user_id)
            .bind(&charity.name)
            .bind(&charity.reg_number)
            .execute(&self.pool)
            .await
            .map_err(unique("charity"))?;

        Ok(Charity {
            charity_id: inserted_id(&result)?,
            user_id: charity.user_id,
            name: charity.name,
            reg_number: charity.reg_number,
        })
    }

    async fn find_charity_by_user(&self, user_id: i32) -> StoreResult<Option<Charity>> {
        let charity = sqlx::query_as::<_, Charity>(
            "SELECT charity_id, user_id, name, reg_number FROM Charities_ WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(charity)
    }

    async fn list_charities(&self) -> StoreResult<Vec<Charity>> {
        let charities = sqlx::query_as::<_, Charity>(
            "SELECT charity_id, user_id, name, reg_number FROM Charities_ ORDER BY charity_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(charities)
    }

    async fn create_task(&self, task: NewTask) -> StoreResult<Task> {
        let result = sqlx::query(
            "INSERT INTO Tasks_ (charity_id, title, description, state, task_date, age_limit_from, age_limit_to, gender_limit) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.charity_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(TaskState::Pending.code())
        .bind(task.date)
        .bind(task.age_limit_from)
        .bind(task.age_limit_to)
        .bind(task.gender_limit.map(Gender::code))
        .execute(&self.pool)
        .await?;

        Ok(Task::from_new(inserted_id(&result)?, task))
    }

    async fn find_task(&self, task_id: i32) -> StoreResult<Option<Task>> {
        let sql = format!("SELECT {} FROM Tasks_ t WHERE t.task_id = ?", TASK_COLUMNS);
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn list_tasks(&self, related: Option<RelatedTo>, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let rows: Vec<TaskRow> = task_list_query(related, query)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    async fn apply_transition(&self, task_id: i32, transition: &Transition) -> StoreResult<bool> {
        let result = transition_query(task_id, transition)
            .build()
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task_state::TaskEvent;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Park"), "%park%");
        assert_eq!(like_pattern("50%_off!"), "%50!%!_off!!%");
    }

    #[test]
    fn task_rows_with_unknown_state_are_rejected() {
        let row = TaskRow {
            task_id: 3,
            charity_id: 1,
            assigned_benefactor_id: None,
            title: "Food drive".into(),
            description: None,
            state: "Q".into(),
            task_date: None,
            age_limit_from: None,
            age_limit_to: None,
            gender_limit: None,
        };
        assert!(matches!(Task::try_from(row), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn gender_codes_decode_or_fail_loudly() {
        assert_eq!(decode_gender(None).unwrap(), None);
        assert_eq!(decode_gender(Some("F")).unwrap(), Some(Gender::Female));
        assert!(matches!(decode_gender(Some("x")), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn transitions_only_update_tasks_still_in_the_source_state() {
        let request = TaskState::Pending
            .apply(TaskEvent::Request { benefactor_id: 5 })
            .unwrap();
        assert_eq!(
            transition_query(9, &request).sql(),
            "UPDATE Tasks_ SET state = ?, assigned_benefactor_id = ? WHERE task_id = ? AND state = ?"
        );

        let accept = TaskState::Waiting.apply(TaskEvent::Accept).unwrap();
        assert_eq!(
            transition_query(9, &accept).sql(),
            "UPDATE Tasks_ SET state = ? WHERE task_id = ? AND state = ?"
        );
    }

    #[test]
    fn rejection_clears_the_assigned_benefactor() {
        let reject = TaskState::Waiting.apply(TaskEvent::Reject).unwrap();
        assert_eq!(
            transition_query(9, &reject).sql(),
            "UPDATE Tasks_ SET state = ?, assigned_benefactor_id = NULL WHERE task_id = ? AND state = ?"
        );
    }

    #[test]
    fn task_listing_guards_nullable_columns_in_excludes() {
        let query = TaskQuery {
            filters: vec![TaskLookup::TitleContains("park".into())],
            excludes: vec![TaskLookup::AgeLimitFromAbove(16), TaskLookup::AgeLimitToBelow(16)],
        };
        let related = RelatedTo {
            charity_id: Some(1),
            benefactor_id: Some(2),
        };
        let sql = task_list_query(Some(related), &query).into_sql();

        assert!(sql.contains(" AND (t.state = ? OR t.charity_id = ? OR t.assigned_benefactor_id = ?)"));
        assert!(sql.contains(" AND (LOWER(t.title) LIKE ? ESCAPE '!')"));
        assert!(sql.contains(" AND NOT (t.age_limit_from IS NOT NULL AND t.age_limit_from > ?)"));
        assert!(sql.contains(" AND NOT (t.age_limit_to IS NOT NULL AND t.age_limit_to < ?)"));
        assert!(sql.ends_with(" ORDER BY t.task_id"));
    }

    #[test]
    fn admin_listing_skips_the_visibility_clause() {
        let sql = task_list_query(None, &TaskQuery::default()).into_sql();
        assert!(sql.ends_with("WHERE 1 = 1 ORDER BY t.task_id"));
    }
}
