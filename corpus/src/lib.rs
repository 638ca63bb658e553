pub mod case;
pub mod loader;
pub mod serde_helpers;
pub mod types;
pub mod vector;

pub use case::{CorpusError, TestCase};
pub use loader::deliver_tests;
pub use types::Hash256;
pub use vector::{AccountState, BlockEntry, GenesisHeader, TestVector};
