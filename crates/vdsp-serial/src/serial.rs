//! Serial-port [`Transport`] implementation (§6 "Serial transport: 115200
//! baud, 8N1, no flow control").

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use vdsp_core::transport::Transport;

/// VelocityDRIVE-SP's fixed UART bit rate (§6).
pub const BAUD_RATE: u32 = 115_200;

/// Errors opening or driving a serial port.
#[derive(Error, Debug)]
pub enum SerialError {
    /// The underlying OS serial port failed to open or configure.
    #[error("serial port error: {0}")]
    Port(#[from] tokio_serial::Error),

    /// A read or write on an open port failed.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A duplex channel over a real serial port, 115200 8N1 with no flow
/// control (§6).
pub struct SerialTransport {
    port: SerialStream,
}

impl SerialTransport {
    /// Opens `path` at the fixed 115200 8N1 / no-flow-control profile the
    /// device requires.
    ///
    /// # Errors
    ///
    /// [`SerialError::Port`] if the OS cannot open or configure the port.
    pub fn open(path: &str) -> Result<Self, SerialError> {
        let port = tokio_serial::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()?;
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    type Error = SerialError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.port.read(buf).await?)
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.port.write_all(buf).await?;
        Ok(())
    }
}

/// One discoverable serial port (§6 `list-ports`).
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// OS device path, e.g. `/dev/ttyACM0` or `COM3`.
    pub name: String,
}

/// Enumerates serial ports the host currently sees (§6 CLI `list-ports`).
///
/// # Errors
///
/// [`SerialError::Port`] if the OS port enumeration call fails.
pub fn list_ports() -> Result<Vec<PortInfo>, SerialError> {
    Ok(tokio_serial::available_ports()?.into_iter().map(|p| PortInfo { name: p.port_name }).collect())
}
