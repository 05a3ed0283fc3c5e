//! Sutu raster engine - stroke pipeline, procedural brushes and layered
//! compositing for a painting application.
//!
//! The [`canvas::Canvas`] owns every component and is driven from a single
//! drawing thread, either directly or through [`commands::Command`].

pub mod brush;
pub mod canvas;
pub mod commands;
pub mod compositor;
pub mod core;
pub mod file;
pub mod fill;
pub mod history;
pub mod input;
pub mod layer;
pub mod mixing;
pub mod pattern;
pub mod timelapse;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber. Safe to call more than once.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sutu_raster=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Sutu raster engine initializing...");
    }
}
