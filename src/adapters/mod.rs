// Adapters layer: concrete implementations of the domain ports and the HTTP surface.

pub mod embedding;
pub mod http;
pub mod memory;
pub mod postgres;
