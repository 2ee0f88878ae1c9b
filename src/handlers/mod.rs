// src/handlers/mod.rs

pub mod auth;
pub mod exams;
pub mod kiosk;
pub mod profile;
pub mod results;
