//! Ambient pieces shared by every component: errors, configuration and the
//! brush preset contract.
//!
//! Nothing in here touches pixels.

pub mod brush_model;
pub mod config;
pub mod errors;
