pub mod connection;
pub mod directory;
pub mod error;
pub mod groups;
pub mod hub;
pub mod router;

pub use error::ChatError;
pub use hub::Hub;
