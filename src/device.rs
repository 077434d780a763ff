//! Compute device selection
//!
//! The trainer device hosts network updates, the worker device runs policy
//! inference during exploration. Here these are plain configuration values
//! handed to the agent; placement itself is the agent's concern.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// A compute device for network updates or worker inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    /// CPU
    Cpu,
    /// CUDA GPU, optionally pinned to an ordinal (`cuda` vs `cuda:0`)
    Cuda(Option<u32>),
    /// Apple Metal Performance Shaders
    Mps,
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(None)),
            "mps" => Ok(Device::Mps),
            _ => {
                if let Some(ordinal) = s.strip_prefix("cuda:") {
                    let ordinal = ordinal
                        .parse::<u32>()
                        .map_err(|_| anyhow!("invalid cuda ordinal in device '{s}'"))?;
                    Ok(Device::Cuda(Some(ordinal)))
                } else {
                    Err(anyhow!("unknown device '{s}'"))
                }
            }
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(None) => write!(f, "cuda"),
            Device::Cuda(Some(ordinal)) => write!(f, "cuda:{ordinal}"),
            Device::Mps => write!(f, "mps"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(None));
        assert_eq!("cuda:0".parse::<Device>().unwrap(), Device::Cuda(Some(0)));
        assert_eq!("cuda:1".parse::<Device>().unwrap(), Device::Cuda(Some(1)));
        assert_eq!("mps".parse::<Device>().unwrap(), Device::Mps);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("gpu".parse::<Device>().is_err());
        assert!("cuda:x".parse::<Device>().is_err());
        assert!("".parse::<Device>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["cpu", "cuda", "cuda:1", "mps"] {
            let device = s.parse::<Device>().unwrap();
            assert_eq!(device.to_string(), s);
        }
    }
}
