//! Ties every component together into the ~10 Hz tick described in §4.6:
//! accept at most one client, read position, consume the calibration flag,
//! drive the FSM, respond with the post-transition state, feed the
//! watchdog, and update the display mirror on state change.

use std::io::{Read, Write};

use log::{info, warn};

use crate::auth::{AuthVerifier, PersistentNonceStore};
use crate::calibration_flag;
use crate::display::{DisplayMirror, DisplayPort};
use crate::error::Result;
use crate::fsm::FsmState;
use crate::motor_actuator::{MotorActuator, ServoDriver};
use crate::position_sensor::{AnalogInput, PositionSensor};
use crate::protocols::http::{self, Request};
use crate::watchdog::WatchdogPort;

/// Hardware seam for "accept at most one client per tick". The ESP-IDF
/// adapter (`drivers::tcp_listener`) wraps a non-blocking
/// `std::net::TcpListener`; tests use `test_support::QueuedConnections`.
pub trait ConnectionSource {
    type Conn: Read + Write;

    /// Returns `Some` if a client connection is ready to be served this
    /// tick, `None` otherwise. Must not block waiting for one — readiness
    /// is polled, the read of the request itself is what may block (up to
    /// the watchdog).
    fn try_accept(&mut self) -> Option<Self::Conn>;
}

pub struct ControlLoop<A: AnalogInput, D: ServoDriver, S: PersistentNonceStore, P: DisplayPort, W: WatchdogPort>
{
    fsm: FsmState,
    position: PositionSensor<A>,
    actuator: MotorActuator<D>,
    auth: AuthVerifier<S>,
    display: DisplayMirror<P>,
    watchdog: W,
    skip_auth: bool,
}

impl<A, D, S, P, W> ControlLoop<A, D, S, P, W>
where
    A: AnalogInput,
    D: ServoDriver,
    S: PersistentNonceStore,
    P: DisplayPort,
    W: WatchdogPort,
{
    pub fn new(
        position: PositionSensor<A>,
        actuator: MotorActuator<D>,
        auth: AuthVerifier<S>,
        display: DisplayMirror<P>,
        watchdog: W,
        skip_auth: bool,
    ) -> Self {
        Self {
            fsm: FsmState::new(),
            position,
            actuator,
            auth,
            display,
            watchdog,
            skip_auth,
        }
    }

    pub fn state(&self) -> crate::fsm::LockState {
        self.fsm.current_state
    }

    /// Run one tick. `now_ms` is a monotonic wall-clock reading supplied by
    /// the caller (real time on hardware, a scripted clock in tests).
    pub fn tick<C: ConnectionSource>(&mut self, conn_source: &mut C, now_ms: u64) -> Result<()> {
        let conn = conn_source.try_accept();

        let (request, mut conn) = match conn {
            Some(mut stream) => {
                let req = http::parse_request(&mut stream, &mut self.auth, self.skip_auth);
                (Some(req), Some(stream))
            }
            None => (None, None),
        };

        let cmd = request.map(Request::to_command).unwrap_or(crate::fsm::Command::None);

        let powered = self.actuator.is_attached();
        let deg = self.position.sample(powered);

        let calibrate_btn = calibration_flag::take();

        let prev_state = self.fsm.current_state;
        self.fsm
            .tick(deg, now_ms, calibrate_btn, cmd, &mut self.actuator);

        if prev_state != self.fsm.current_state {
            info!("FSM transition: {:?} -> {:?}", prev_state, self.fsm.current_state);
        }

        if let (Some(req), Some(stream)) = (request, conn.as_mut()) {
            if let Err(e) = http::write_response(stream, req, self.fsm.current_state) {
                warn!("failed to write HTTP response: {e}");
            }
        }

        self.watchdog.feed()?;
        self.display.update(self.fsm.current_state);

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::QueuedConnections;
    use super::*;
    use crate::auth::test_support::InMemoryNonceStore;
    use crate::auth::AuthVerifier;
    use crate::display::test_support::RecordingDisplay;
    use crate::display::DisplayMirror;
    use crate::fsm::LockState;
    use crate::motor_actuator::test_support::StubServo;
    use crate::motor_actuator::MotorActuator;
    use crate::position_sensor::{CalibrationAnchor, CalibrationTables, PositionSensor};
    use crate::watchdog::test_support::CountingWatchdog;

    struct FixedInput(u16);
    impl crate::position_sensor::AnalogInput for FixedInput {
        fn read_raw(&mut self) -> u16 {
            self.0
        }
    }

    fn tables_for(min_pos: i32, max_pos: i32) -> CalibrationTables {
        CalibrationTables {
            powered: CalibrationAnchor {
                min_raw: 0,
                max_raw: 4095,
            },
            unpowered: CalibrationAnchor {
                min_raw: 0,
                max_raw: 4095,
            },
            min_pos_deg: min_pos,
            max_pos_deg: max_pos,
        }
    }

    fn loop_with_fixed_reading(raw: u16) -> ControlLoop<
        FixedInput,
        StubServo,
        InMemoryNonceStore,
        RecordingDisplay,
        CountingWatchdog,
    > {
        let position = PositionSensor::new(FixedInput(raw), tables_for(50, 120));
        let actuator = MotorActuator::new(StubServo::default());
        let auth = AuthVerifier::new(InMemoryNonceStore::default(), "secret");
        let display = DisplayMirror::new(RecordingDisplay::default());
        let watchdog = CountingWatchdog::default();
        ControlLoop::new(position, actuator, auth, display, watchdog, true)
    }

    #[test]
    fn a_quiet_tick_with_no_client_still_feeds_the_watchdog() {
        let mut ctl = loop_with_fixed_reading(0);
        let mut conns = QueuedConnections::default();

        ctl.tick(&mut conns, 0).unwrap();

        assert_eq!(ctl.watchdog.feed_count, 1);
    }

    #[test]
    fn every_tick_updates_the_display_mirror_only_on_change() {
        let mut ctl = loop_with_fixed_reading(0);
        let mut conns = QueuedConnections::default();

        ctl.tick(&mut conns, 0).unwrap();
        ctl.tick(&mut conns, 100).unwrap();

        assert_eq!(ctl.display.port.shown, std::vec![LockState::CalibrateLock]);
    }

    #[test]
    fn accepted_request_classifies_and_responds() {
        let mut ctl = loop_with_fixed_reading(0);
        let mut conns = QueuedConnections::default();
        conns
            .queue
            .push_back(b"GET /status HTTP/1.1\r\n\r\n".to_vec());

        ctl.tick(&mut conns, 0).unwrap();

        // skip_auth=true, so the status request is classified and answered
        // even with no auth headers; the FSM hasn't moved off its boot
        // state in this single tick with no calibration button press.
        assert_eq!(ctl.state(), LockState::CalibrateLock);
    }
}
