mod auth;
pub mod client;
mod meetings;
mod organizations;
pub mod types;
mod zoom;

pub use client::*;
pub use types::*;
pub use zoom::ZOOM_TOKEN_HEADER;
