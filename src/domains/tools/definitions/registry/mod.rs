pub mod status;
pub mod sync;

pub use status::RegistryStatusTool;
pub use sync::{RegistrySyncParams, RegistrySyncTool};
