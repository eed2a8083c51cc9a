//! Core SMTP types.

mod address;
mod extension;
mod reply;

pub use address::classify;
pub use extension::{Extension, Extensions};
pub use reply::{Reply, ReplyCode};
