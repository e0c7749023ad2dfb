//! Shared types for glimpse
//!
//! This crate provides the capability vocabulary used by every other glimpse
//! crate: single capabilities, ordered capability sets, and the registry
//! that catalogs them.

pub mod capability;

pub use capability::{Capabilities, Capability, CapabilityRegistry, RENDER_MARKDOWN, VERSION_1_0};
