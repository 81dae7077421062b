use std::time::Duration;

pub const DEFAULT_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 12355;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The meeting point of a process group, fixed for a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendezvous {
    pub addr: String,
    pub port: u16,
    pub world_size: usize,
    /// How long every worker has to join before the setup fails.
    pub timeout: Duration,
}

impl Rendezvous {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}
