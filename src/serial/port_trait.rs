//! Trait abstraction for device port operations to enable testing

use async_trait::async_trait;
use std::io;

/// Byte-stream operations the acquisition loop needs from the device
#[async_trait]
pub trait DevicePortIO: Send {
    /// Run the device init sequence: boot settle, reset pulse, buffer
    /// clear, start byte
    async fn initialize(&mut self) -> io::Result<()>;

    /// Read whatever bytes are available, up to `buf.len()`; may return
    /// fewer than requested
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Assert then deassert the device reset line, with settle delays
    async fn reset_pulse(&mut self) -> io::Result<()>;
}

fn to_io(e: crate::error::DaqError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[async_trait]
impl DevicePortIO for super::DaqSerial {
    async fn initialize(&mut self) -> io::Result<()> {
        super::DaqSerial::initialize(self).await.map_err(to_io)
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use tokio::io::AsyncReadExt;
        self.port.read(buf).await
    }

    async fn reset_pulse(&mut self) -> io::Result<()> {
        self.pulse_reset().await.map_err(to_io)
    }
}
