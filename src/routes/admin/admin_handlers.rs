use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use log::{error, info};

use super::admin_models::{benefactor_filter, AdminDefaultResponse};
use crate::auth::{Caller, Capability};
use crate::errors::ApiError;
use crate::models::task::TaskQuery;
use crate::store::Repository;

pub async fn list_benefactors(
    store: web::Data<dyn Repository>,
    caller: Caller,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError> {
    caller.authorize(Capability::Staff)?;
    let filter = benefactor_filter(&params)?;
    let benefactors = store.list_benefactors(&filter).await?;
    Ok(HttpResponse::Ok().json(benefactors))
}

pub async fn list_charities(
    store: web::Data<dyn Repository>,
    caller: Caller,
) -> Result<HttpResponse, ApiError> {
    caller.authorize(Capability::Staff)?;
    let charities = store.list_charities().await?;
    Ok(HttpResponse::Ok().json(charities))
}

pub async fn list_tasks(
    store: web::Data<dyn Repository>,
    caller: Caller,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError> {
    caller.authorize(Capability::Staff)?;
    let query = TaskQuery::from_admin_params(&params)?;
    let tasks = store.list_tasks(None, &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

pub async fn session_reset(
    store: web::Data<dyn Repository>,
    caller: Caller,
) -> Result<HttpResponse, ApiError> {
    caller.authorize(Capability::Staff)?;

    // Attempt to delete all sessions from the Sessions_ table
    match store.delete_all_sessions().await {
        Ok(removed) => {
            info!("Staff user {} reset {} sessions", caller.user.user_name, removed);
            Ok(HttpResponse::Ok().json(AdminDefaultResponse {
                success: true,
                message: "All sessions have been reset successfully".into(),
            }))
        }
        Err(e) => {
            error!("Failed to reset sessions: {}", e);
            Ok(HttpResponse::InternalServerError().json(AdminDefaultResponse {
                success: false,
                message: "Failed to reset sessions".into(),
            }))
        }
    }
}
