pub mod arch;
pub mod data;
pub mod device;
pub mod error;
pub mod initialization;
pub mod optimization;
pub mod vocab;

pub use device::Device;
pub use error::{MlErr, Result};
