//! Application services layer.

pub mod auth;
pub mod csrf;
pub mod error;
pub mod flash;
pub mod mail;
pub mod repos;
