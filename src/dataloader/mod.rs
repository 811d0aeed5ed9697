pub mod batch;
pub mod combinators;
pub mod config;
pub mod dataset;
pub mod error;
pub mod image_data;
pub mod in_memory;
pub mod info;
pub mod loader;
pub mod manifest;
pub mod split;
