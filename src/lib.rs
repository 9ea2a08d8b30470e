//! Periodic extraction of Asana users and projects into JSON snapshots.
pub mod api;
pub mod config;
pub mod extractor;
pub mod jobs;
pub mod model;
pub mod retry;
pub mod scheduler;
pub mod shutdown;
pub mod storage;
