pub mod routes;

pub mod login {
    pub mod login_handlers;
    pub mod login_models;
}

pub mod charities {
    pub mod charities_handlers;
    pub mod charities_models;
}

pub mod admin {
    pub mod admin_handlers;
    pub mod admin_models;
}
