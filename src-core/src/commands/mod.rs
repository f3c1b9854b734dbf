//! Commands Layer
//!
//! Transport-neutral handlers for every external operation. Each returns the
//! response envelope; `invoke` routes by command name.

mod response;
mod group_cmd;
mod tag_cmd;
mod image_cmd;
mod service_cmd;
mod dispatch;

pub use response::{readable_message, Response};
pub use group_cmd::*;
pub use tag_cmd::*;
pub use image_cmd::*;
pub use service_cmd::*;
pub use dispatch::{invoke, COMMANDS};
