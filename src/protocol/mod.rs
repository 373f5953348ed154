//! Wire types published by the weather collector
//!
//! Consumers parse the queue payload directly, so the layout defined here is
//! a stable contract: a flat JSON object with the keys `temperature`,
//! `windspeed`, `latitude`, `longitude` and `timestamp`.

pub mod reading;

pub use reading::*;
