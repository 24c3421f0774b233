//! The map client and its dispatch machinery

mod builder;
mod client;
pub mod incidents;
mod singleflight;

pub use builder::{Waypost, WaypostBuilder};
pub use client::{FallbackReason, GatewayStatus, MapClient, ProviderSet};
