//! The web module: HTTP surface for remote clients.
//! Surfaces live thermostat state and relays target/mode commands to the controller.

pub mod api;
pub mod models;
