pub mod common;
pub mod config;
pub mod recover;
pub mod status;
pub mod sync;

pub use config::Config;
pub use recover::Recover;
pub use status::Status;
pub use sync::Synchronize;
