//! envstore-lib: build execution core for conda environment stores
//!
//! This crate provides the pieces a build worker and an artifact API share:
//! - `action`: isolated action execution with captured output and scratch space
//! - `build`: builds, versioned build keys, and artifact keys
//! - `serve`: resolving artifact requests into redirects or inline payloads
//! - `store`: the metadata store interface and an in-memory implementation

pub mod action;
pub mod build;
pub mod conda;
pub mod config;
pub mod consts;
pub mod platform;
pub mod serve;
pub mod store;
pub mod util;
