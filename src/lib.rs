//! Single-diode photovoltaic module emulation service.

pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod repo;
pub mod sdm;
pub mod telemetry;
