use std::time::{Duration, Instant};

use rusb::{DeviceHandle, GlobalContext};

use super::{Result, Transport, TransportError, HHS_USB_PID, HHS_USB_VID, LINE_TERMINATOR};

/// Bulk endpoints of the heater shaker box.
const ENDPOINT_OUT: u8 = 0x02;
const ENDPOINT_IN: u8 = 0x81;

const WRITE_TIMEOUT: Duration = Duration::from_secs(2);
/// Upper bound for a single bulk-in transfer while assembling a line.
const READ_CHUNK_TIMEOUT: Duration = Duration::from_millis(100);

/// USB transport for the standalone heater shaker box.
///
/// Commands and responses travel as bulk transfers instead of a serial
/// stream, but the payloads are the same ASCII lines the serial transport
/// carries. When several boxes are attached, `box_position` selects one
/// by enumeration order.
pub struct UsbTransport {
    box_position: usize,
    handle: Option<DeviceHandle<GlobalContext>>,
    pending: Vec<u8>,
}

impl UsbTransport {
    pub fn new() -> Self {
        Self::at_position(0)
    }

    pub fn at_position(box_position: usize) -> Self {
        Self {
            box_position,
            handle: None,
            pending: Vec::new(),
        }
    }

    fn find_and_open(&self) -> Result<DeviceHandle<GlobalContext>> {
        let devices = rusb::devices()?;
        let mut matches = devices.iter().filter(|device| {
            device
                .device_descriptor()
                .map(|d| d.vendor_id() == HHS_USB_VID && d.product_id() == HHS_USB_PID)
                .unwrap_or(false)
        });

        let device = matches.nth(self.box_position).ok_or_else(|| {
            TransportError::DeviceNotFound(format!(
                "no heater shaker box {:04X}:{:04X} at position {}",
                HHS_USB_VID, HHS_USB_PID, self.box_position
            ))
        })?;

        let mut handle = device
            .open()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        // Linux parks vendor devices behind kernel drivers; harmless
        // elsewhere, where the call reports NotSupported.
        let _ = handle.set_auto_detach_kernel_driver(true);
        handle.claim_interface(0)?;
        Ok(handle)
    }

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

impl Default for UsbTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UsbTransport {
    fn open(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let handle = self.find_and_open()?;
        log::info!(
            "Connected to heater shaker box {:04X}:{:04X}",
            HHS_USB_VID,
            HHS_USB_PID
        );
        self.handle = Some(handle);
        self.pending.clear();
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(TransportError::NotConnected)?;
        self.pending.clear();

        let mut message = Vec::with_capacity(line.len() + LINE_TERMINATOR.len());
        message.extend_from_slice(line.as_bytes());
        message.extend_from_slice(LINE_TERMINATOR.as_bytes());

        let written = handle.write_bulk(ENDPOINT_OUT, &message, WRITE_TIMEOUT)?;
        if written != message.len() {
            return Err(TransportError::ConnectionFailed(format!(
                "short bulk write, {} of {} bytes",
                written,
                message.len()
            )));
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String> {
        if self.handle.is_none() {
            return Err(TransportError::NotConnected);
        }

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 64];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }

            let handle = self.handle.as_mut().ok_or(TransportError::NotConnected)?;
            match handle.read_bulk(ENDPOINT_IN, &mut buf, READ_CHUNK_TIMEOUT) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(rusb::Error::Timeout) => {}
                Err(e) => return Err(TransportError::Usb(e)),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.release_interface(0) {
                log::warn!("Failed to release USB interface: {}", e);
            }
            log::info!("Disconnected from heater shaker box");
        }
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}
