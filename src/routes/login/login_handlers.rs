use actix_web::{cookie::Cookie, web, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify};
use chrono::Utc;
use log::{error, info};
use uuid::Uuid;

use super::login_models::{
    AutoLoginResponse, CheckEmailRequest, CheckEmailResponse, CheckUsernameRequest,
    CheckUsernameResponse, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest,
    RegisterResponse,
};
use crate::auth::{session_id_from, SESSION_COOKIE};
use crate::config::Config;
use crate::models::{session::Session, user::NewUser};
use crate::store::{Repository, StoreError};

pub async fn check_username(
    store: web::Data<dyn Repository>,
    req: web::Json<CheckUsernameRequest>,
) -> impl Responder {
    let username = &req.username;
    info!("Received request to check username: {}", username);

    match store.username_exists(username).await {
        Ok(exists) => {
            info!("Username {} is unique: {}", username, !exists);
            HttpResponse::Ok().json(CheckUsernameResponse { is_unique: !exists })
        }
        Err(e) => {
            error!("Failed to execute query: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

// Check if email is unique
pub async fn check_email(
    store: web::Data<dyn Repository>,
    req: web::Json<CheckEmailRequest>,
) -> impl Responder {
    let email = &req.email;
    info!("Received request to check email: {}", email);

    match store.email_exists(email).await {
        Ok(exists) => {
            info!("Email {} is unique: {}", email, !exists);
            HttpResponse::Ok().json(CheckEmailResponse { is_unique: !exists })
        }
        Err(e) => {
            error!("Failed to execute query: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

// register user to DB
pub async fn register(
    store: web::Data<dyn Repository>,
    config: web::Data<Config>,
    req: web::Json<RegisterRequest>,
) -> impl Responder {
    let username = req.username.trim();
    info!("Received request to register user: {}", username);

    let profile = match req.validate() {
        Ok(profile) => profile,
        Err(errors) => {
            info!("Rejected registration for {}: {}", username, errors);
            return HttpResponse::BadRequest().json(errors);
        }
    };

    let hashed_password = match hash(&req.password, config.bcrypt_cost) {
        Ok(hp) => hp,
        Err(e) => {
            error!("Failed to hash password: {}", e);
            return HttpResponse::InternalServerError().json(RegisterResponse {
                success: false,
                message: "Failed to hash password".into(),
            });
        }
    };

    let new_user = NewUser {
        user_name: username.to_string(),
        user_email: req.email.trim().to_string(),
        password_hash: hashed_password,
        gender: profile.gender,
        age: profile.age,
    };

    match store.create_user(new_user).await {
        Ok(user) => {
            info!("User {} registered successfully", user.user_name);
            HttpResponse::Created().json(RegisterResponse {
                success: true,
                message: "User registered successfully".into(),
            })
        }
        Err(StoreError::Duplicate(_)) => {
            info!("Username or email already taken for {}", username);
            HttpResponse::BadRequest().json(RegisterResponse {
                success: false,
                message: "Username or email already taken".into(),
            })
        }
        Err(e) => {
            error!("Failed to register user {}: {}", username, e);
            HttpResponse::InternalServerError().json(RegisterResponse {
                success: false,
                message: "Failed to register user".into(),
            })
        }
    }
}

// login logic
pub async fn login(
    store: web::Data<dyn Repository>,
    config: web::Data<Config>,
    req: web::Json<LoginRequest>,
) -> impl Responder {
    let username = &req.username;
    info!("Received login request for user: {}", username);

    let user = match store.find_user_by_name(username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("Invalid username: {}", username);
            return HttpResponse::Unauthorized().json(LoginResponse {
                success: false,
                message: "Invalid username".into(),
            });
        }
        Err(e) => {
            error!("Failed to look up user {}: {}", username, e);
            return HttpResponse::InternalServerError().json(LoginResponse {
                success: false,
                message: "Failed to look up user".into(),
            });
        }
    };

    let valid = match verify(&req.password, &user.password_hash) {
        Ok(valid) => valid,
        Err(_) => {
            error!("Error when checking password for user: {}", username);
            return HttpResponse::Unauthorized().json(LoginResponse {
                success: false,
                message: "Error when checking password".into(),
            });
        }
    };

    if !valid {
        info!("Invalid password for user: {}", username);
        return HttpResponse::Unauthorized().json(LoginResponse {
            success: false,
            message: "Invalid password".into(),
        });
    }

    // A new login replaces whatever session the user had
    let session = Session {
        session_id: Uuid::new_v4().to_string(),
        user_id: user.user_id,
        expires_at: Utc::now() + config.session_lifetime(req.remember_me),
        is_persistent: req.remember_me,
    };

    if let Err(e) = store.replace_session(&session).await {
        error!("Failed to store session for user {}: {}", username, e);
        return HttpResponse::InternalServerError().json(LoginResponse {
            success: false,
            message: "Failed to create session".into(),
        });
    }

    info!("User {} logged in successfully", username);
    HttpResponse::Ok()
        .cookie(
            Cookie::build(SESSION_COOKIE, session.session_id)
                .path("/")
                .http_only(true)
                .finish(),
        )
        .json(LoginResponse {
            success: true,
            message: "Login successful".into(),
        })
}

// auto_login logic
pub async fn auto_login(
    store: web::Data<dyn Repository>,
    req: HttpRequest,
) -> impl Responder {
    let Some(session_id) = session_id_from(&req) else {
        info!("Session ID not found in cookies for auto login");
        return HttpResponse::BadRequest().json(AutoLoginResponse {
            success: false,
            message: "Session ID not found in cookies".into(),
            username: "".into(),
        });
    };

    info!("Received auto login request with session ID: {}", session_id);

    let session = match store.find_session(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            info!("Invalid session ID: {}", session_id);
            return HttpResponse::BadRequest().json(AutoLoginResponse {
                success: false,
                message: "Invalid session ID".into(),
                username: "".into(),
            });
        }
        Err(e) => {
            error!("Failed to validate session ID {}: {}", session_id, e);
            return HttpResponse::InternalServerError().json(AutoLoginResponse {
                success: false,
                message: "Failed to validate session".into(),
                username: "".into(),
            });
        }
    };

    if session.is_expired(Utc::now()) {
        if let Err(e) = store.delete_session(&session_id).await {
            error!("Failed to delete expired session {}: {}", session_id, e);
        }
        info!("Session expired for session ID: {}", session_id);
        return HttpResponse::Unauthorized().json(AutoLoginResponse {
            success: false,
            message: "Login is needed, session expired".into(),
            username: "".into(),
        });
    }

    match store.find_user(session.user_id).await {
        Ok(Some(user)) => {
            info!("Auto login successful for user: {}", user.user_name);
            HttpResponse::Ok().json(AutoLoginResponse {
                success: true,
                message: format!("Welcome back, {}", user.user_name),
                username: user.user_name,
            })
        }
        Ok(None) => {
            info!("Session {} points at a missing user", session_id);
            HttpResponse::Unauthorized().json(AutoLoginResponse {
                success: false,
                message: "Login is needed".into(),
                username: "".into(),
            })
        }
        Err(e) => {
            error!("Failed to fetch user information for session ID {}: {}", session_id, e);
            HttpResponse::InternalServerError().json(AutoLoginResponse {
                success: false,
                message: "Failed to fetch user information".into(),
                username: "".into(),
            })
        }
    }
}

pub async fn logout(
    store: web::Data<dyn Repository>,
    req: HttpRequest,
) -> impl Responder {
    let Some(session_id) = session_id_from(&req) else {
        info!("Session ID does not exist in cookies for logout");
        return HttpResponse::BadRequest().json(LogoutResponse {
            success: false,
            message: "Session ID does not exist".into(),
        });
    };

    info!("Received logout request with session ID: {}", session_id);

    let session = match store.find_session(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            info!("Session not found for session ID: {}", session_id);
            return HttpResponse::BadRequest().json(LogoutResponse {
                success: false,
                message: "Session not found".into(),
            });
        }
        Err(e) => {
            error!("Failed to fetch session ID {}: {}", session_id, e);
            return HttpResponse::InternalServerError().json(LogoutResponse {
                success: false,
                message: "Failed to check session".into(),
            });
        }
    };

    if session.is_expired(Utc::now()) {
        info!("Session already expired for session ID: {}", session_id);
        return HttpResponse::BadRequest().json(LogoutResponse {
            success: false,
            message: "Already expired session".into(),
        });
    }

    match store.delete_session(&session_id).await {
        Ok(_) => {
            info!("Logout successful for session ID: {}", session_id);
            let mut removal = Cookie::new(SESSION_COOKIE, "");
            removal.set_path("/");
            removal.make_removal();
            HttpResponse::Ok().cookie(removal).json(LogoutResponse {
                success: true,
                message: "Logout successful".into(),
            })
        }
        Err(e) => {
            error!("Failed to delete session ID {}: {}", session_id, e);
            HttpResponse::InternalServerError().json(LogoutResponse {
                success: false,
                message: "Failed to logout".into(),
            })
        }
    }
}
