// src/models/mod.rs

pub mod assessment;
pub mod material;
pub mod question;
pub mod result;
pub mod upload;
pub mod user;
