// src/models/mod.rs

pub mod user;
pub mod session;
pub mod benefactor;
pub mod charity;
pub mod task;
pub mod task_state;
