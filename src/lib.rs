//! Media Generation Task Pipeline
//!
//! This library turns a client request for a generated image or video into a
//! tracked, multi-step asynchronous job: submit to an external generation
//! provider, poll until the provider finishes, materialize the result into
//! R2 object storage, and notify an external consumer of each state
//! transition. Poll state is carried entirely in re-enqueued queue messages,
//! never in a blocked worker.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
