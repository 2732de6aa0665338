// SPDX-License-Identifier: MIT

//! Visor: image catalog with canonical renaming
//!
//! Browse a directory of images, attach descriptive metadata, pull best-effort
//! suggestions from a reverse-image-search service, and rename files to the
//! canonical "Surname, Given - Title (Year)" form.

pub mod config;
pub mod db;
pub mod error;
pub mod gallery;
pub mod history;
pub mod naming;
pub mod search;
pub mod web;

pub use config::AppConfig;
pub use error::{Result, VisorError};
