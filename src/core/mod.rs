pub mod refresh;
pub mod repo;
pub mod sources;
pub mod tariff;
pub mod vector_index;
pub mod wits;
pub mod wto;

pub use refresh::RefreshEngine;
pub use repo::{DataInput, VectorRepo};
pub use sources::{CodeSource, CountryCodeSource, HsCodeSource};
pub use tariff::TariffService;
pub use vector_index::VectorIndex;
