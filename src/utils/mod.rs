pub mod error;
pub mod logger;
pub mod singleton;
pub mod validation;
