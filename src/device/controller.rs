use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::protocol::{command, limits, response, Command, ProtocolError};
use crate::transport::{
    ConnectionConfig, InterfaceKind, SerialTransport, Transport, TransportError, UsbTransport,
};

use super::models::{DeviceState, ShakeDirection, TemperatureReading};
use super::{HhsError, Result};

/// Default shaking acceleration in increments/second.
pub const DEFAULT_ACCELERATION: u16 = 1000;

/// Fixed delay between RD status queries in [`HeaterShaker::wait_for_stop`].
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Stabilization band used by [`HeaterShaker::heat_shake`]: the middle
/// sensor must read within this many degrees of the target.
pub const DEFAULT_TEMPERATURE_TOLERANCE_C: f64 = 1.0;

/// How long [`HeaterShaker::heat_shake`] waits for the plate to reach
/// the target temperature before shaking anyway.
pub const DEFAULT_TEMPERATURE_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Fixed delay between RT queries in [`HeaterShaker::wait_for_temperature`].
const TEMPERATURE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Synchronous controller for one Hamilton Heater Shaker.
///
/// Owns one transport and a device state snapshot; every method issues at
/// most one command (composites a small fixed number) and blocks for the
/// reply. No retries except the bounded polling in `wait_for_stop`;
/// retry policy belongs to the caller.
pub struct HeaterShaker {
    config: ConnectionConfig,
    transport: Box<dyn Transport>,
    state: DeviceState,
    command_id: u16,
}

impl std::fmt::Debug for HeaterShaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaterShaker")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("command_id", &self.command_id)
            .finish_non_exhaustive()
    }
}

impl HeaterShaker {
    /// Build a controller with the transport implied by the config.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let transport: Box<dyn Transport> = match config.interface {
            InterfaceKind::Serial => Box::new(SerialTransport::new(
                config.port_name.as_str(),
                config.baud_rate,
            )),
            InterfaceKind::Usb => Box::new(UsbTransport::at_position(config.usb_box_position)),
        };
        Self::with_transport(config, transport)
    }

    /// Build a controller over an explicit transport (tests use
    /// [`crate::transport::MockTransport`] here).
    pub fn with_transport(config: ConnectionConfig, transport: Box<dyn Transport>) -> Result<Self> {
        limits::check_device_index(config.device_index, config.interface.max_device_index())?;
        Ok(Self {
            config,
            transport,
            state: DeviceState::default(),
            command_id: 0,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Open the transport. Fails with a state error when already connected.
    pub fn connect(&mut self) -> Result<()> {
        if self.state.connected {
            return Err(HhsError::State("already connected".to_string()));
        }
        self.transport.open()?;
        self.state.connected = true;
        log::info!("Heater shaker '{}' connected", self.config.name);
        Ok(())
    }

    /// Initialize the lock system, then the shaker drive, then optionally
    /// set the target temperature. On any step failure the controller
    /// stays Connected and the failing step is named in the error.
    /// Re-initializing an initialized controller is rejected.
    pub fn initialize(&mut self, target_temperature: Option<f64>) -> Result<()> {
        self.require_connected()?;
        if self.state.initialized {
            return Err(HhsError::State(
                "already initialized, shut down first".to_string(),
            ));
        }
        if let Some(celsius) = target_temperature {
            limits::check_temperature(celsius)?;
        }

        let cmd = command::init_lock(self.config.device_index, self.next_id());
        self.exchange(cmd).map_err(|e| init_step("lock initialization", e))?;
        self.state.lock_initialized = true;

        let cmd = command::init_shaker(self.config.device_index, self.next_id());
        self.exchange(cmd)
            .map_err(|e| init_step("shaker initialization", e))?;
        self.state.shaker_initialized = true;

        if let Some(celsius) = target_temperature {
            self.send_set_temperature(celsius)
                .map_err(|e| init_step("initial temperature", e))?;
        }

        self.state.initialized = true;
        log::info!(
            "Heater shaker '{}' initialized{}",
            self.config.name,
            target_temperature
                .map(|t| format!(" at {t:.1} degC"))
                .unwrap_or_default()
        );
        Ok(())
    }

    /// Set the heater target temperature.
    pub fn set_temperature(&mut self, celsius: f64) -> Result<()> {
        self.require_initialized()?;
        self.send_set_temperature(celsius)
    }

    /// Query the current (middle, edge) plate temperatures.
    pub fn get_temperature(&mut self) -> Result<TemperatureReading> {
        self.require_initialized()?;
        let cmd = command::get_temperature(self.config.device_index, self.next_id());
        let raw = self.exchange(cmd)?;
        let (middle_c, edge_c) = response::parse_temperature(&raw)?;
        let reading = TemperatureReading {
            middle_c,
            edge_c,
            taken_at: Utc::now(),
        };
        self.state.record_reading(&reading);
        Ok(reading)
    }

    /// Turn the heater off.
    pub fn deactivate_heating(&mut self) -> Result<()> {
        self.require_initialized()?;
        let cmd = command::deactivate_heating(self.config.device_index, self.next_id());
        self.exchange(cmd)?;
        self.state.target_temperature = None;
        log::info!("Heating deactivated");
        Ok(())
    }

    /// Start shaking in the default direction with the default acceleration.
    pub fn start_shaking(&mut self, speed: u16) -> Result<()> {
        self.start_shaking_with_options(speed, ShakeDirection::default(), DEFAULT_ACCELERATION)
    }

    /// Start shaking. The plate is locked first; the firmware refuses to
    /// shake an unlocked plate. The status is queried after the start
    /// command, since the firmware acknowledges SB even when the drive
    /// never spins up.
    pub fn start_shaking_with_options(
        &mut self,
        speed: u16,
        direction: ShakeDirection,
        acceleration: u16,
    ) -> Result<()> {
        self.require_initialized()?;
        limits::check_speed(speed)?;
        limits::check_acceleration(acceleration)?;

        self.lock_plate()?;

        let cmd = command::start_shaking(
            self.config.device_index,
            self.next_id(),
            direction.digit(),
            speed,
            acceleration,
        );
        self.exchange(cmd)?;

        if !self.is_shaking()? {
            return Err(ProtocolError::Unconfirmed {
                op: "SB",
                reason: "device reports it is not shaking".to_string(),
            }
            .into());
        }
        self.state.shaking = true;
        log::info!("Shaking started at {} steps/sec", speed);
        Ok(())
    }

    /// Stop shaking: SC, then SW so the device completes the stop before
    /// the next command.
    pub fn stop_shaking(&mut self) -> Result<()> {
        self.require_initialized()?;
        let cmd = command::stop_shaking(self.config.device_index, self.next_id());
        self.exchange(cmd)?;
        let cmd = command::wait_for_stop(self.config.device_index, self.next_id());
        self.exchange(cmd)?;
        self.state.shaking = false;
        log::info!("Shaking stopped");
        Ok(())
    }

    /// Query the shaking status digit.
    pub fn is_shaking(&mut self) -> Result<bool> {
        self.require_initialized()?;
        let cmd = command::shaking_status(self.config.device_index, self.next_id());
        let raw = self.exchange(cmd)?;
        Ok(response::parse_shaking_status(&raw)?)
    }

    /// Poll the shaking status until the device reports stopped or the
    /// timeout elapses. A zero timeout checks exactly once. The caller's
    /// thread owns the wait; there is no background polling.
    pub fn wait_for_stop(&mut self, timeout: Duration) -> Result<()> {
        self.require_initialized()?;
        let start = Instant::now();
        loop {
            if !self.is_shaking()? {
                self.state.shaking = false;
                return Ok(());
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(TransportError::Timeout.into());
            }
            thread::sleep(STOP_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    /// Poll the plate temperature until the middle sensor reads within
    /// `tolerance_c` of `target_c` or the timeout elapses. A zero timeout
    /// checks exactly once. Every successful poll updates the state
    /// snapshot through [`HeaterShaker::get_temperature`].
    pub fn wait_for_temperature(
        &mut self,
        target_c: f64,
        tolerance_c: f64,
        timeout: Duration,
    ) -> Result<()> {
        self.require_initialized()?;
        let start = Instant::now();
        loop {
            let reading = self.get_temperature()?;
            if (reading.middle_c - target_c).abs() <= tolerance_c {
                log::info!("Temperature stabilized at {:.1} degC", reading.middle_c);
                return Ok(());
            }
            log::debug!(
                "Plate at {:.1} degC, waiting for {:.1} degC",
                reading.middle_c,
                target_c
            );
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(TransportError::Timeout.into());
            }
            thread::sleep(TEMPERATURE_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    /// Lock the plate. A no-op success when already locked.
    pub fn lock_plate(&mut self) -> Result<()> {
        self.require_initialized()?;
        if self.state.plate_locked {
            log::debug!("Plate already locked");
            return Ok(());
        }
        let cmd = command::lock_plate(self.config.device_index, self.next_id(), true);
        self.exchange(cmd)?;
        self.state.plate_locked = true;
        log::info!("Plate locked");
        Ok(())
    }

    /// Unlock the plate. A no-op success when already unlocked.
    pub fn unlock_plate(&mut self) -> Result<()> {
        self.require_initialized()?;
        if !self.state.plate_locked {
            log::debug!("Plate already unlocked");
            return Ok(());
        }
        let cmd = command::lock_plate(self.config.device_index, self.next_id(), false);
        self.exchange(cmd)?;
        self.state.plate_locked = false;
        log::info!("Plate unlocked");
        Ok(())
    }

    /// Heat and shake for `duration`, then stop shaking and turn the
    /// heater off. Waits for the plate to reach the target temperature
    /// before shaking starts.
    pub fn heat_shake(&mut self, duration: Duration, temperature: f64, speed: u16) -> Result<()> {
        self.heat_shake_with_options(
            duration,
            temperature,
            speed,
            ShakeDirection::default(),
            DEFAULT_ACCELERATION,
            true,
        )
    }

    /// Composite heat-shake protocol. With `wait_for_temperature` the
    /// plate must stabilize within [`DEFAULT_TEMPERATURE_TOLERANCE_C`]
    /// before shaking; if stabilization takes longer than
    /// [`DEFAULT_TEMPERATURE_WAIT_TIMEOUT`] the protocol logs a warning
    /// and shakes anyway. On a sub-step failure the device is brought to
    /// a safe state (stop shaking, heater off) on a best-effort basis and
    /// the original error is propagated.
    pub fn heat_shake_with_options(
        &mut self,
        duration: Duration,
        temperature: f64,
        speed: u16,
        direction: ShakeDirection,
        acceleration: u16,
        wait_for_temperature: bool,
    ) -> Result<()> {
        self.require_initialized()?;
        limits::check_temperature(temperature)?;
        limits::check_speed(speed)?;
        limits::check_acceleration(acceleration)?;

        log::info!(
            "Heat-shake: {:.1} degC, {} steps/sec for {:?}",
            temperature,
            speed,
            duration
        );
        if let Err(e) = self.run_heat_shake(
            duration,
            temperature,
            speed,
            direction,
            acceleration,
            wait_for_temperature,
        ) {
            log::error!("Heat-shake failed, bringing device to a safe state: {}", e);
            if let Err(stop_err) = self.stop_shaking() {
                log::warn!("Safety stop failed: {}", stop_err);
            }
            if let Err(heat_err) = self.deactivate_heating() {
                log::warn!("Heater deactivation failed: {}", heat_err);
            }
            return Err(e);
        }
        log::info!("Heat-shake completed");
        Ok(())
    }

    fn run_heat_shake(
        &mut self,
        duration: Duration,
        temperature: f64,
        speed: u16,
        direction: ShakeDirection,
        acceleration: u16,
        wait_for_temperature: bool,
    ) -> Result<()> {
        self.send_set_temperature(temperature)?;
        if wait_for_temperature {
            match self.wait_for_temperature(
                temperature,
                DEFAULT_TEMPERATURE_TOLERANCE_C,
                DEFAULT_TEMPERATURE_WAIT_TIMEOUT,
            ) {
                Ok(()) => {}
                Err(e) if e.is_timeout() => {
                    log::warn!("Temperature stabilization timed out, shaking anyway");
                }
                Err(e) => return Err(e),
            }
        }
        self.start_shaking_with_options(speed, direction, acceleration)?;
        thread::sleep(duration);
        self.stop_shaking()?;
        self.deactivate_heating()?;
        Ok(())
    }

    /// Best-effort orderly shutdown: stop shaking, heater off, unlock,
    /// close. Step failures are logged and aggregated, never allowed to
    /// keep the transport open. Idempotent once disconnected.
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.state.connected {
            return Ok(());
        }

        let mut failures = Vec::new();
        if self.state.initialized {
            if let Err(e) = self.stop_shaking() {
                log::warn!("Shutdown: stop shaking failed: {}", e);
                failures.push(format!("stop shaking: {e}"));
            }
            if let Err(e) = self.deactivate_heating() {
                log::warn!("Shutdown: heater deactivation failed: {}", e);
                failures.push(format!("deactivate heating: {e}"));
            }
            if let Err(e) = self.unlock_plate() {
                log::warn!("Shutdown: plate unlock failed: {}", e);
                failures.push(format!("unlock plate: {e}"));
            }
        }

        if let Err(e) = self.transport.close() {
            log::warn!("Shutdown: transport close failed: {}", e);
            failures.push(format!("close transport: {e}"));
        }
        self.state.reset();
        log::info!("Heater shaker '{}' shut down", self.config.name);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HhsError::Shutdown(failures))
        }
    }

    fn send_set_temperature(&mut self, celsius: f64) -> Result<()> {
        limits::check_temperature(celsius)?;
        let cmd = command::set_temperature(self.config.device_index, self.next_id(), celsius);
        self.exchange(cmd)?;
        self.state.target_temperature = Some(celsius);
        log::info!("Target temperature set to {:.1} degC", celsius);
        Ok(())
    }

    /// One command round trip: render, send, block for the reply, check
    /// the acknowledgement. The raw line is returned for operations that
    /// carry a payload.
    fn exchange(&mut self, cmd: Command) -> Result<String> {
        if !self.state.connected {
            return Err(HhsError::State("not connected".to_string()));
        }
        let line = cmd.render();
        log::debug!("Sent: {}", line);
        self.transport.write_line(&line)?;
        let raw = self.transport.read_line(self.config.read_timeout)?;
        log::debug!("Received: {}", raw);
        response::check_ack(cmd.code(), &raw)?;
        Ok(raw)
    }

    fn require_connected(&self) -> Result<()> {
        if self.state.connected {
            Ok(())
        } else {
            Err(HhsError::State(
                "not connected, call connect() first".to_string(),
            ))
        }
    }

    fn require_initialized(&self) -> Result<()> {
        self.require_connected()?;
        if self.state.initialized {
            Ok(())
        } else {
            Err(HhsError::State(
                "not initialized, call initialize() first".to_string(),
            ))
        }
    }

    /// Session ids are 1..=9999, wrapping; unique within a session, used
    /// for echo correlation only.
    fn next_id(&mut self) -> u16 {
        self.command_id = if self.command_id >= 9999 {
            1
        } else {
            self.command_id + 1
        };
        self.command_id
    }
}

fn init_step(step: &'static str, source: HhsError) -> HhsError {
    HhsError::InitializationStep {
        step,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn controller(mock: &MockTransport) -> HeaterShaker {
        HeaterShaker::with_transport(
            ConnectionConfig::serial("/dev/ttyUSB0", 1),
            Box::new(mock.clone()),
        )
        .unwrap()
    }

    #[test]
    fn command_ids_wrap_at_9999() {
        let mock = MockTransport::new();
        let mut hs = controller(&mock);
        hs.command_id = 9998;

        assert_eq!(hs.next_id(), 9999);
        assert_eq!(hs.next_id(), 1);
    }

    #[test]
    fn device_index_checked_against_interface() {
        // 3 is valid behind a box but not on a direct serial connection
        let config = ConnectionConfig::serial("/dev/ttyUSB0", 3);
        let err =
            HeaterShaker::with_transport(config, Box::new(MockTransport::new())).unwrap_err();
        assert!(matches!(err, HhsError::Validation(_)));

        let config = ConnectionConfig::usb(3);
        assert!(HeaterShaker::with_transport(config, Box::new(MockTransport::new())).is_ok());
    }

    #[test]
    fn connect_twice_is_a_state_error() {
        let mock = MockTransport::new();
        let mut hs = controller(&mock);

        hs.connect().unwrap();
        assert!(matches!(hs.connect(), Err(HhsError::State(_))));
        assert_eq!(mock.open_calls(), 1);
    }

    #[test]
    fn failed_open_leaves_controller_disconnected() {
        let mock = MockTransport::new();
        mock.fail_next_open();
        let mut hs = controller(&mock);

        let err = hs.connect().unwrap_err();
        assert!(matches!(
            err,
            HhsError::Transport(TransportError::ConnectionFailed(_))
        ));
        assert!(!hs.state().connected);
    }

    #[test]
    fn out_of_range_temperature_sends_nothing() {
        let mock = MockTransport::new();
        let mut hs = controller(&mock);
        hs.connect().unwrap();
        // bypass initialize to isolate the validation path
        hs.state.initialized = true;

        let err = hs.set_temperature(115.1).unwrap_err();
        assert!(matches!(err, HhsError::Validation(_)));
        assert!(mock.sent().is_empty());
    }
}
