//! Plot-and-notify pipeline
//!
//! Two container-image compute units driven by a two-step workflow: the plot
//! function renders Anscombe's quartet and stores the PNG in the asset bucket,
//! then the notification function posts the CDN link of that image to Slack.
//! The workflow and the surrounding topology are modelled here so their
//! configuration can be validated and exercised locally.

pub mod assets;
pub mod dataset;
pub mod error;
pub mod handlers;
pub mod models;
pub mod plot;
pub mod secrets;
pub mod slack;
pub mod telemetry;
pub mod topology;
pub mod workflow;

pub use error::{Error, Result};
