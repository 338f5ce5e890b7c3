//! Asset store for saasemu
//!
//! Imported cores, firmware images and games live in flat per-category
//! directories under the application data directory.

pub mod store;

pub use store::{AssetCategory, AssetStore};
