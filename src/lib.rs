// Library for tests to access modules

pub mod config;
pub mod engine;
pub mod host;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod source;
