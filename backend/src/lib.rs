//! Folio Backend Library
//!
//! Authentication core for the Folio personal-website API: password hashing,
//! login lockout, rotating JWT secrets and the HTTP surface over them.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod tasks;
