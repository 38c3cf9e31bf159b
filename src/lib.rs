//! # vpad-mapper Library
//!
//! Map a simple physical gamepad onto virtual controllers whose shape and
//! packet layout are chosen at runtime by the consuming application.
//!
//! This library provides:
//! - Element mappers and element maps that turn a physical sample into a
//!   virtual controller state
//! - The deadzone / saturation / range axis transform
//! - Negotiation of application data formats into an offset binding
//! - A registry of named mappers and a blueprint builder with template
//!   inheritance

pub mod config;
pub mod controller;
pub mod error;
pub mod mapper;
