//! Domain types - core business entities
//!
//! This module contains the canonical types shared by the fetchers, the
//! refresher and the snapshot store. They are independent of the HTTP
//! transport used to move them around.

pub mod config;
pub mod source;
