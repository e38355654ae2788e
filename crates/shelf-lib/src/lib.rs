//! Publishing pipeline for a static book library whose content lives in a
//! GitHub repository.
//!
//! A publish uploads a book's cover, infographic, narration tracks and PDF,
//! then appends the book to the shared `manifest.json` that the browsing UI
//! reads. See [`commands::publish`] for the stage ordering and failure policy.

pub mod commands;
pub mod config;
pub mod domain;
pub mod encoding;
pub mod infrastructure;
