//! Compute backends and device identifiers.
//!
//! # Supported Backends
//!
//! - `Wgpu`: native GPU compute (Vulkan, Metal, DX12) through `wgpu`.
//! - `Gl`: secondary GPU API (OpenGL/GLES) through `wgpu`.
//! - `Cpu`: multi-threaded host fallback using `rayon`; always present.
//!
//! Variants are declared in priority order: when the same hardware shows up
//! under several backends, the earlier backend wins. There is no global
//! "current backend": every [`Array`](crate::array::Array) carries the
//! [`DeviceId`] that produced it.

use crate::error::{BlockError, Result};
use core::fmt;
use core::str::FromStr;

/// Enumeration of supported computation backends, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Backend {
    /// Native GPU compute API.
    Wgpu = 0,
    /// OpenGL-class GPU API.
    Gl,
    /// Host CPU fallback.
    Cpu,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Wgpu, Backend::Gl, Backend::Cpu];

    pub fn name(self) -> &'static str {
        match self {
            Backend::Wgpu => "WGPU",
            Backend::Gl => "GL",
            Backend::Cpu => "CPU",
        }
    }
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Wgpu),
            1 => Ok(Self::Gl),
            2 => Ok(Self::Cpu),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        Backend::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BlockError::invalid(format!("unknown backend \"{s}\"")))
    }
}

/// A device under a specific backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    pub backend: Backend,
    pub index: usize,
}

impl DeviceId {
    /// The host CPU device.
    pub const CPU: DeviceId = DeviceId { backend: Backend::Cpu, index: 0 };

    pub const fn new(backend: Backend, index: usize) -> Self {
        Self { backend, index }
    }

    pub fn is_gpu(self) -> bool {
        self.backend != Backend::Cpu
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_codes_and_names() {
        for b in Backend::ALL {
            assert_eq!(Backend::try_from(b as u8), Ok(b));
            assert_eq!(b.name().parse::<Backend>().unwrap(), b);
        }
        assert!(Backend::try_from(9).is_err());
        assert_eq!("cpu".parse::<Backend>().unwrap(), Backend::Cpu);
    }

    #[test]
    fn priority_order() {
        assert!(Backend::Wgpu < Backend::Gl);
        assert!(Backend::Gl < Backend::Cpu);
        assert_eq!(DeviceId::CPU.to_string(), "CPU:0");
        assert!(!DeviceId::CPU.is_gpu());
    }
}
