//! Core use-case services.
//!
//! # Responsibility
//! - Broker project mutations through gateways into a cached collection.
//! - Keep view layers decoupled from gateway and storage details.

pub mod image_upload;
pub mod project_store;
pub mod subscription;
