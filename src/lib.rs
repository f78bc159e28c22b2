//! Core of the SnapEase image organizer: an ordered list of images, each
//! with a non-destructive crop/rotate/grayscale edit, rendered through a
//! cached pipeline and persisted as a plain-text image list.

pub mod cache;
pub mod config;
pub mod decode;
pub mod export;
pub mod geometry;
pub mod loader;
pub mod metadata;
pub mod processing;
pub mod project;
pub mod record;
pub mod session;
pub mod state;
pub mod surface;
pub mod widget;
