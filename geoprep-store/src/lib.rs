pub mod error;
pub mod registry;
pub mod store;
pub mod stops;

pub use error::StoreError;
pub use store::Store;
