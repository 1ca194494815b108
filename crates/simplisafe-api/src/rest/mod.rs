// REST resource client
//
// Typed operations over the vendor's REST surface. Transport mechanics live
// in `client.rs`; each resource family is a separate `impl SimpliSafeClient`
// block in its own file.

mod cameras;
mod client;
mod commands;
mod events;
pub mod models;
mod pins;
mod sensors;
mod subscriptions;

pub use client::{ClientConfig, SimpliSafeClient};
pub use pins::{MAX_USER_PINS, RESERVED_PIN_LABELS};
