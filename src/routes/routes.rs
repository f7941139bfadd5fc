use actix_web::web;

use super::admin::admin_handlers;
use super::charities::charities_handlers;
use super::login::login_handlers;

pub fn admin_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/benefactors", web::get().to(admin_handlers::list_benefactors))
            .route("/charities", web::get().to(admin_handlers::list_charities))
            .route("/tasks", web::get().to(admin_handlers::list_tasks))
            .route("/sessions/reset", web::post().to(admin_handlers::session_reset))
    );
}

pub fn login_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-login")
            .route("/check-username", web::post().to(login_handlers::check_username))
            .route("/check-email", web::post().to(login_handlers::check_email))
            .route("/register", web::post().to(login_handlers::register))
            .route("/login", web::post().to(login_handlers::login))
            .route("/auto-login", web::post().to(login_handlers::auto_login))
            .route("/logout", web::post().to(login_handlers::logout))
    );
}

pub fn charities_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/benefactors", web::post().to(charities_handlers::register_benefactor))
        .route("/charities", web::post().to(charities_handlers::register_charity))
        .service(
            web::resource("/tasks")
                .route(web::get().to(charities_handlers::list_tasks))
                .route(web::post().to(charities_handlers::create_task)),
        )
        .route("/tasks/{task_id}/request", web::get().to(charities_handlers::request_task))
        .route("/tasks/{task_id}/response", web::post().to(charities_handlers::respond_task))
        .route("/tasks/{task_id}/done", web::post().to(charities_handlers::done_task));
}

/// Every route of the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    login_configure(cfg);
    charities_configure(cfg);
    admin_configure(cfg);
}
