//! Execution context: the single place where the device is decided.

use ndarray::Array2;

use crate::config::Device;
use crate::error::{Error, Result};

/// Device chosen once at generator construction; every history buffer of a
/// step-loop invocation is allocated through it and tagged with its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    device: Device,
}

impl ExecutionContext {
    /// Select the execution device
    ///
    /// The ndarray backend only addresses host memory.
    pub fn select(device: Device) -> Result<Self> {
        match device {
            Device::Cpu => Ok(Self { device }),
            Device::Cuda { .. } => Err(Error::DeviceUnavailable(device)),
        }
    }

    /// Host execution
    #[must_use]
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
        }
    }

    /// Selected device
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Fail unless `other` lives on this context's device
    pub fn ensure_same(&self, other: Device) -> Result<()> {
        if other != self.device {
            return Err(Error::DeviceMismatch {
                expected: self.device,
                actual: other,
            });
        }
        Ok(())
    }

    /// Zero-filled float buffer
    #[must_use]
    pub fn zeros(&self, rows: usize, cols: usize) -> Array2<f32> {
        Array2::zeros((rows, cols))
    }

    /// Token buffer filled with `fill`
    #[must_use]
    pub fn tokens(&self, rows: usize, cols: usize, fill: u32) -> Array2<u32> {
        Array2::from_elem((rows, cols), fill)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::cpu()
    }
}
