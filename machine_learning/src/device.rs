use std::{fmt, str::FromStr};

use crate::MlErr;

/// The compute device a worker runs its model on.
///
/// Only the host CPU is backed by an implementation, asking for anything else is
/// reported as a startup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
}

impl FromStr for Device {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            other => Err(MlErr::DeviceUnavailable(other.to_string())),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_is_the_only_device() {
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert!(matches!(
            "cuda:0".parse::<Device>(),
            Err(MlErr::DeviceUnavailable(_))
        ));
    }
}
