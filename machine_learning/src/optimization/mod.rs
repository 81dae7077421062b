mod adamw;
mod optimizer;
mod scheduler;

pub use adamw::AdamW;
pub use optimizer::Optimizer;
pub use scheduler::{LinearWarmup, Scheduler};
