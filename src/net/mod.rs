//! Resource loading for image-backed artworks.

pub mod image;
