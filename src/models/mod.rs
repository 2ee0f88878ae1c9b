// src/models/mod.rs

pub mod exam;
pub mod profile;
pub mod question;
pub mod submission;
