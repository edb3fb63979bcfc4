//! # Lingua API Server Library
//!
//! HTTP layer of the Lingua language-center backend. Domain logic lives in
//! `lingua-shared`; this crate maps it onto routes.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Json/Query/Path extractors that reject with `ApiError`
//! - `middleware`: security headers, sessions, route guard, rate limiting
//! - `routes`: API route handlers
//! - `services`: SMTP mail, form relay and OAuth clients

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod services;
