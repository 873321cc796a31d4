//! Invocation logic of the two compute units, independent of the Lambda runtime.

pub mod notification;
pub mod plot;

pub use notification::{NotificationHandler, NotificationServices};
pub use plot::{PlotHandler, PlotServices};
