pub mod artwork;
pub mod color;
pub mod config;
pub mod error;
pub mod focus;
pub mod gallery;
pub mod net;
pub mod panel;
pub mod render;
pub mod scene;
pub mod sketch;
pub mod texture;
