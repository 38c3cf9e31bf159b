//! # Controller Module
//!
//! Virtual controller core.
//!
//! This module handles:
//! - Physical gamepad detection and sampling via evdev
//! - Element mappers and element maps turning a physical sample into a virtual state
//! - Deadzone, saturation and range transforms per virtual axis
//! - Negotiation of application data formats and packet writing
//! - Per-application virtual controllers with their own lock
//! - Buffered state change events

pub mod axis_transform;
pub mod data_format;
pub mod element_map;
pub mod element_mapper;
pub mod evdev_source;
pub mod event_buffer;
pub mod types;
pub mod virtual_controller;
