use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use log::info;

use super::charities_models::{
    parse_body, BenefactorRegistrationRequest, CharityRegistrationRequest, CreateTaskRequest,
    ResponseDecision, TaskResponseRequest,
};
use crate::auth::Caller;
use crate::errors::{ApiError, DetailResponse, ValidationErrors};
use crate::models::{
    task::{Task, TaskQuery},
    task_state::TaskEvent,
};
use crate::store::{Repository, StoreError};

// Register the caller as a benefactor
pub async fn register_benefactor(
    store: web::Data<dyn Repository>,
    caller: Caller,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    info!("Received benefactor registration from user: {}", caller.user.user_name);
    if caller.benefactor.is_some() {
        return Err(already_registered("benefactor"));
    }

    let req: BenefactorRegistrationRequest = parse_body(&body)?;
    let new_benefactor = req.validate(caller.user.user_id)?;
    let benefactor = match store.create_benefactor(new_benefactor).await {
        Ok(benefactor) => benefactor,
        Err(StoreError::Duplicate(_)) => return Err(already_registered("benefactor")),
        Err(e) => return Err(e.into()),
    };

    info!("User {} registered as benefactor {}", caller.user.user_name, benefactor.benefactor_id);
    Ok(HttpResponse::Created().json(benefactor))
}

// Register the caller as a charity
pub async fn register_charity(
    store: web::Data<dyn Repository>,
    caller: Caller,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    info!("Received charity registration from user: {}", caller.user.user_name);
    if caller.charity.is_some() {
        return Err(already_registered("charity"));
    }

    let req: CharityRegistrationRequest = parse_body(&body)?;
    let new_charity = req.validate(caller.user.user_id)?;
    let charity = match store.create_charity(new_charity).await {
        Ok(charity) => charity,
        Err(StoreError::Duplicate(_)) => return Err(already_registered("charity")),
        Err(e) => return Err(e.into()),
    };

    info!("User {} registered charity {}", caller.user.user_name, charity.name);
    Ok(HttpResponse::Created().json(charity))
}

fn already_registered(role: &str) -> ApiError {
    ApiError::Validation(ValidationErrors::single(
        "user",
        format!("{} with this user already exists.", role),
    ))
}

// List every task related to the caller, narrowed by query parameters
pub async fn list_tasks(
    store: web::Data<dyn Repository>,
    caller: Caller,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError> {
    let query = TaskQuery::from_params(&params)?;
    let tasks = store.list_tasks(Some(caller.related_tasks()), &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

// Create a task owned by the caller's charity
pub async fn create_task(
    store: web::Data<dyn Repository>,
    caller: Caller,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let charity = caller.charity()?;
    let req: CreateTaskRequest = parse_body(&body)?;
    let new_task = req.validate(charity.charity_id)?;
    let task = store.create_task(new_task).await?;

    info!("Charity {} created task {}", charity.name, task.task_id);
    Ok(HttpResponse::Created().json(task))
}

// A benefactor asks to take a pending task
pub async fn request_task(
    store: web::Data<dyn Repository>,
    caller: Caller,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let benefactor = caller.benefactor()?;
    let task_id = path.into_inner();

    let task = find_task(store.get_ref(), task_id, None).await?;
    transition(
        store.get_ref(),
        &task,
        TaskEvent::Request {
            benefactor_id: benefactor.benefactor_id,
        },
    )
    .await?;

    info!("Benefactor {} requested task {}", benefactor.benefactor_id, task_id);
    Ok(HttpResponse::Ok().json(DetailResponse::new("Request sent.")))
}

// The owning charity accepts or rejects the pending request
pub async fn respond_task(
    store: web::Data<dyn Repository>,
    caller: Caller,
    path: web::Path<i32>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let charity = caller.charity()?;
    let task_id = path.into_inner();
    let req: TaskResponseRequest = parse_body(&body)?;

    let event = match req.decision() {
        Some(ResponseDecision::Accepted) => TaskEvent::Accept,
        Some(ResponseDecision::Rejected) => TaskEvent::Reject,
        None => {
            info!("Invalid response for task {}: {:?}", task_id, req.response);
            return Err(ApiError::BadRequest(TaskResponseRequest::INVALID_MESSAGE.to_string()));
        }
    };

    let task = find_task(store.get_ref(), task_id, Some(charity.charity_id)).await?;
    transition(store.get_ref(), &task, event).await?;

    info!("Charity {} answered {:?} on task {}", charity.name, event, task_id);
    Ok(HttpResponse::Ok().json(DetailResponse::new("Response sent.")))
}

// The owning charity closes an assigned task
pub async fn done_task(
    store: web::Data<dyn Repository>,
    caller: Caller,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let charity = caller.charity()?;
    let task_id = path.into_inner();

    let task = find_task(store.get_ref(), task_id, Some(charity.charity_id)).await?;
    transition(store.get_ref(), &task, TaskEvent::Complete).await?;

    info!("Charity {} completed task {}", charity.name, task_id);
    Ok(HttpResponse::Ok().json(DetailResponse::new("Task has been done successfully.")))
}

/// Loads a task, optionally restricted to one charity's tasks.
async fn find_task(store: &dyn Repository, task_id: i32, charity_id: Option<i32>) -> Result<Task, ApiError> {
    match store.find_task(task_id).await? {
        Some(task) if charity_id.map_or(true, |id| id == task.charity_id) => Ok(task),
        _ => {
            info!("Task not found: {}", task_id);
            Err(ApiError::NotFound("Not found.".to_string()))
        }
    }
}

/// Runs `event` through the state machine and persists the result. A wrong
/// state and a lost compare-and-swap both answer 404 with the same detail.
async fn transition(store: &dyn Repository, task: &Task, event: TaskEvent) -> Result<(), ApiError> {
    let transition = task.state.apply(event).map_err(|e| {
        info!("Task {} rejected {:?} in state {}", task.task_id, event, task.state);
        ApiError::NotFound(e.to_string())
    })?;

    if !store.apply_transition(task.task_id, &transition).await? {
        info!("Task {} changed state before {:?} was applied", task.task_id, event);
        return Err(ApiError::NotFound(event.precondition_message().to_string()));
    }
    Ok(())
}
