//! The lock finite-state machine: the authoritative owner of lock intent.
//!
//! Fuses a commanded intent, a noisy analog position reading, a wall-clock
//! tick, and a manual-calibration signal into one of seven states. The FSM
//! is driven once per tick by [`FsmState::tick`]; everything else in this
//! crate exists to produce that tick's inputs or to act on its effects.

use core::fmt;

use crate::config::{ANGLE_EPSILON_DEG, MOVE_TIMEOUT_MS};
use crate::motor_actuator::{MotorActuator, ServoDriver};

/// One of the seven states the bolt can be in. `Bad` is terminal across a
/// single power-on; the only exit is a reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    CalibrateLock,
    CalibrateUnlock,
    Unlocked,
    Locked,
    BusyWait,
    BusyMove,
    Bad,
}

impl LockState {
    /// The exact textual representation used on the wire (§6) and on the
    /// display mirror. Every response body that isn't empty is one of these.
    pub const fn as_str(self) -> &'static str {
        match self {
            LockState::CalibrateLock => "CALIBRATE_LOCK",
            LockState::CalibrateUnlock => "CALIBRATE_UNLOCK",
            LockState::Unlocked => "UNLOCK",
            LockState::Locked => "LOCK",
            LockState::BusyWait => "BUSY_WAIT",
            LockState::BusyMove => "BUSY_MOVE",
            LockState::Bad => "BAD",
        }
    }

    /// Inverse of [`as_str`]. Used by tests to confirm the round trip; not
    /// needed on the wire, since the device never parses its own state back.
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "CALIBRATE_LOCK" => LockState::CalibrateLock,
            "CALIBRATE_UNLOCK" => LockState::CalibrateUnlock,
            "UNLOCK" => LockState::Unlocked,
            "LOCK" => LockState::Locked,
            "BUSY_WAIT" => LockState::BusyWait,
            "BUSY_MOVE" => LockState::BusyMove,
            "BAD" => LockState::Bad,
            _ => return None,
        })
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The command a tick's request (if any) resolves to. Closed sum type;
/// there is no "unknown command" variant — an unrecognized HTTP request
/// never reaches the FSM at all (see `protocols::http`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    None,
    Lock,
    Unlock,
}

/// Authoritative lock state, owned exclusively by the control loop and
/// advanced once per tick via [`tick`]. This is the single top-level
/// aggregate the design notes call for in place of ambient globals.
pub struct FsmState {
    pub current_state: LockState,
    pub lock_deg: i32,
    pub unlock_deg: i32,
    /// Wall-clock ms at which the current `BusyMove` began. Meaningless
    /// outside `BusyMove`.
    pub move_start_time: u64,
    pub current_command: Command,
}

impl Default for FsmState {
    fn default() -> Self {
        Self::new()
    }
}

impl FsmState {
    /// Boots in `CalibrateLock`, per §3 lifecycle. `lock_deg`/`unlock_deg`
    /// are latched during calibration and are meaningless before then.
    pub fn new() -> Self {
        Self {
            current_state: LockState::CalibrateLock,
            lock_deg: 0,
            unlock_deg: 0,
            move_start_time: 0,
            current_command: Command::None,
        }
    }

    fn at_unlock(&self, deg: i32) -> bool {
        deg <= self.unlock_deg + ANGLE_EPSILON_DEG
    }

    fn at_lock(&self, deg: i32) -> bool {
        deg >= self.lock_deg - ANGLE_EPSILON_DEG
    }

    /// Drive one transition. `deg` is this tick's denoised position
    /// reading, `now_ms` a monotonic wall-clock timestamp, `calibrate_btn`
    /// the edge-triggered calibration flag consumed for this tick, and
    /// `cmd` the command (if any) derived from this tick's HTTP request.
    ///
    /// Motor power assertion and release (invariant 4) happen as a direct
    /// consequence of the transitions taken here, via `actuator`.
    pub fn tick<D: ServoDriver>(
        &mut self,
        deg: i32,
        now_ms: u64,
        calibrate_btn: bool,
        cmd: Command,
        actuator: &mut MotorActuator<D>,
    ) {
        match self.current_state {
            LockState::CalibrateLock => {
                if calibrate_btn {
                    self.lock_deg = deg;
                    self.current_state = LockState::CalibrateUnlock;
                }
            }

            LockState::CalibrateUnlock => {
                if calibrate_btn {
                    self.unlock_deg = deg;
                    self.current_state = LockState::Unlocked;
                }
            }

            LockState::Unlocked => {
                if self.at_unlock(deg) && cmd == Command::Lock {
                    self.move_start_time = now_ms;
                    self.current_command = Command::Lock;
                    actuator.attach_and_write(self.lock_deg);
                    self.current_state = LockState::BusyMove;
                } else if self.at_lock(deg) {
                    self.current_state = LockState::Locked;
                } else if !self.at_lock(deg) && !self.at_unlock(deg) {
                    self.current_state = LockState::BusyWait;
                }
            }

            LockState::Locked => {
                if self.at_lock(deg) && cmd == Command::Unlock {
                    self.move_start_time = now_ms;
                    self.current_command = Command::Unlock;
                    actuator.attach_and_write(self.unlock_deg);
                    self.current_state = LockState::BusyMove;
                } else if self.at_unlock(deg) {
                    self.current_state = LockState::Unlocked;
                } else if !self.at_lock(deg) && !self.at_unlock(deg) {
                    self.current_state = LockState::BusyWait;
                }
            }

            LockState::BusyWait => {
                if self.at_unlock(deg) {
                    self.current_state = LockState::Unlocked;
                } else if self.at_lock(deg) {
                    self.current_state = LockState::Locked;
                }
            }

            LockState::BusyMove => {
                // Invariant 2: current_command is never None while here.
                debug_assert_ne!(self.current_command, Command::None);

                if now_ms.saturating_sub(self.move_start_time) > MOVE_TIMEOUT_MS as u64 {
                    actuator.detach();
                    self.current_state = LockState::Bad;
                } else if self.current_command == Command::Unlock && self.at_unlock(deg) {
                    actuator.detach();
                    self.current_command = Command::None;
                    self.current_state = LockState::Unlocked;
                } else if self.current_command == Command::Lock && self.at_lock(deg) {
                    actuator.detach();
                    self.current_command = Command::None;
                    self.current_state = LockState::Locked;
                }
            }

            LockState::Bad => {
                // Absorbing. `detach` is idempotent, so re-asserting it
                // every tick is cheap insurance if the actuator's internal
                // flag ever desyncs from reality.
                actuator.detach();
            }
        }
    }
}
