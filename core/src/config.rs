//! Tick/tolerance constants the FSM and auth layers are built around.
//! Board-specific constants (Wi-Fi credentials, watchdog timeout, tick
//! period) live in the firmware crate's own `config` module instead, since
//! they have no bearing on this crate's platform-agnostic logic.

/// Angle tolerance (ε): half-width of the "at endpoint" band, in degrees.
/// `lock_v1` carried a tighter gear mesh and could be held to a narrower
/// band; `lock_v2` (the default, and the only carrier shipped today) needs
/// the full 5° this crate's tests are written against.
#[cfg(feature = "lock_v1")]
pub const ANGLE_EPSILON_DEG: i32 = 4;
#[cfg(not(feature = "lock_v1"))]
pub const ANGLE_EPSILON_DEG: i32 = 5;

/// Move timeout (TOL): how long `BusyMove` may run before the FSM gives up
/// and transitions to `Bad`.
pub const MOVE_TIMEOUT_MS: u32 = 5_000;

/// Sliding floor below the last-accepted nonce within which requests are
/// still refused as replays.
pub const REPLAY_WINDOW: u32 = 5;

/// Raw ADC samples taken per `PositionSensor::sample` call.
pub const POSITION_SAMPLE_COUNT: usize = 5;
