// src/handlers/mod.rs

pub mod admin;
pub mod assessment;
pub mod auth;
pub mod materials;
pub mod profile;
