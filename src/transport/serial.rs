use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use super::{Result, Transport, TransportError, LINE_TERMINATOR};

/// How long each `read` call on the port may block before the loop
/// re-checks the overall deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// RS232 transport for a direct STAR connection.
///
/// The device speaks 8 data bits, no parity, 1 stop bit at the configured
/// baud rate; one command and one response per line.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
    pending: Vec<u8>,
}

impl SerialTransport {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            port: None,
            pending: Vec::new(),
        }
    }

    /// Pull the first complete line out of the pending buffer, if any.
    fn take_line(&mut self) -> Option<String> {
        let terminator = LINE_TERMINATOR.as_bytes();
        let end = self
            .pending
            .windows(terminator.len())
            .position(|w| w == terminator)?;
        let line: Vec<u8> = self.pending.drain(..end + terminator.len()).collect();
        Some(String::from_utf8_lossy(&line[..end]).trim().to_string())
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(POLL_INTERVAL)
            .open()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("{}: {}", self.port_name, e))
            })?;

        log::info!("Connected to {} at {} baud", self.port_name, self.baud_rate);
        self.port = Some(port);
        self.pending.clear();
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;

        // Stale input would be mistaken for the reply to this command.
        port.clear(ClearBuffer::Input)?;
        self.pending.clear();

        port.write_all(line.as_bytes())?;
        port.write_all(LINE_TERMINATOR.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String> {
        if self.port.is_none() {
            return Err(TransportError::NotConnected);
        }

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }

            let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
            match port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            log::info!("Disconnected from {}", self.port_name);
        }
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_line_splits_on_terminator() {
        let mut transport = SerialTransport::new("/dev/null", 9600);
        transport.pending.extend_from_slice(b"T1LIid0001\r\nT1SI");

        assert_eq!(transport.take_line().as_deref(), Some("T1LIid0001"));
        assert_eq!(transport.pending, b"T1SI");
        assert!(transport.take_line().is_none());
    }

    #[test]
    fn io_without_open_port_fails() {
        let mut transport = SerialTransport::new("/dev/null", 9600);
        assert!(matches!(
            transport.write_line("T1LIid0001"),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.read_line(Duration::from_millis(1)),
            Err(TransportError::NotConnected)
        ));
        assert!(!transport.is_open());
    }
}
