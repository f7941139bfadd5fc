//! Resolves the caller from their session and checks what they may do.

use std::future::Future;
use std::pin::Pin;

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use chrono::Utc;
use log::info;

use crate::errors::ApiError;
use crate::models::{
    benefactor::Benefactor,
    charity::Charity,
    task::RelatedTo,
    user::User,
};
use crate::store::Repository;

pub const SESSION_COOKIE: &str = "session_id";

/// Session id from the `session_id` cookie, or from an
/// `Authorization: Bearer <session id>` header.
pub fn session_id_from(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// What an endpoint requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Authenticated,
    CharityOwner,
    Benefactor,
    Staff,
}

impl Capability {
    pub fn is_satisfied_by(self, caller: &Caller) -> bool {
        match self {
            Capability::Authenticated => true,
            Capability::CharityOwner => caller.charity.is_some(),
            Capability::Benefactor => caller.benefactor.is_some(),
            Capability::Staff => caller.user.is_staff,
        }
    }
}

/// An authenticated user together with the roles they hold.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub benefactor: Option<Benefactor>,
    pub charity: Option<Charity>,
}

impl Caller {
    pub fn authorize(&self, capability: Capability) -> Result<(), ApiError> {
        if capability.is_satisfied_by(self) {
            Ok(())
        } else {
            info!("User {} lacks capability {:?}", self.user.user_name, capability);
            Err(ApiError::Forbidden)
        }
    }

    /// The caller's charity; forbidden unless they own one.
    pub fn charity(&self) -> Result<&Charity, ApiError> {
        self.authorize(Capability::CharityOwner)?;
        self.charity.as_ref().ok_or(ApiError::Forbidden)
    }

    /// The caller's benefactor profile; forbidden unless they have one.
    pub fn benefactor(&self) -> Result<&Benefactor, ApiError> {
        self.authorize(Capability::Benefactor)?;
        self.benefactor.as_ref().ok_or(ApiError::Forbidden)
    }

    pub fn related_tasks(&self) -> RelatedTo {
        RelatedTo {
            charity_id: self.charity.as_ref().map(|c| c.charity_id),
            benefactor_id: self.benefactor.as_ref().map(|b| b.benefactor_id),
        }
    }

    async fn load(store: &dyn Repository, session_id: String) -> Result<Caller, ApiError> {
        let Some(session) = store.find_session(&session_id).await? else {
            info!("Unknown session ID: {}", session_id);
            return Err(ApiError::Unauthorized);
        };
        if session.is_expired(Utc::now()) {
            info!("Session expired for session ID: {}", session_id);
            return Err(ApiError::Unauthorized);
        }
        let Some(user) = store.find_user(session.user_id).await? else {
            info!("Session {} points at a missing user", session_id);
            return Err(ApiError::Unauthorized);
        };

        let benefactor = store.find_benefactor_by_user(user.user_id).await?;
        let charity = store.find_charity_by_user(user.user_id).await?;

        Ok(Caller {
            user,
            benefactor,
            charity,
        })
    }
}

impl FromRequest for Caller {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let store = req.app_data::<web::Data<dyn Repository>>().cloned();
        let session_id = session_id_from(req);

        Box::pin(async move {
            let store = store.ok_or_else(|| ApiError::Internal("repository is not configured".into()))?;
            let session_id = session_id.ok_or(ApiError::Unauthorized)?;
            Caller::load(store.get_ref(), session_id).await
        })
    }
}
