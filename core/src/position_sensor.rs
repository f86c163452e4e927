//! Denoises the bolt's analog feedback reading and maps it to degrees.
//!
//! Two independent calibration anchor pairs are kept — one for the powered
//! state, one for the unpowered state — because the feedback potentiometer
//! drifts depending on whether the motor is actively driven. Mixing them up
//! introduces several degrees of systematic bias; see the design notes.

/// Hardware seam for the raw analog read. The ESP-IDF adapter
/// (`drivers::position_adc`) wraps an `AdcChannelDriver` in oneshot mode;
/// tests feed a scripted sequence of raw readings.
pub trait AnalogInput {
    /// One raw ADC sample. Implementations do their own unit conversion;
    /// callers only ever compare samples to each other and to calibration
    /// anchors taken with the same implementation.
    fn read_raw(&mut self) -> u16;
}

/// One endpoint's raw-feedback anchor, recorded once at bringup.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalibrationAnchor {
    pub min_raw: u16,
    pub max_raw: u16,
}

impl CalibrationAnchor {
    /// Linear map from a raw feedback value to the [0, 1] fraction between
    /// `min_raw` (→ 0) and `max_raw` (→ 1).
    fn fraction(&self, raw: u16) -> f32 {
        if self.max_raw == self.min_raw {
            return 0.0;
        }
        let span = self.max_raw as f32 - self.min_raw as f32;
        (raw as f32 - self.min_raw as f32) / span
    }
}

/// The two calibration tables a `PositionSensor` needs: one sampled while
/// the motor was powered, one sampled after release. Maintained separately
/// per the design notes — merging them causes endpoint-snap failures.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalibrationTables {
    pub powered: CalibrationAnchor,
    pub unpowered: CalibrationAnchor,
    pub min_pos_deg: i32,
    pub max_pos_deg: i32,
}

/// Hardware seam for the blocking settle delays the bringup calibration
/// routine needs between commanding the motor and sampling feedback. The
/// firmware binds this to `std::thread::sleep`; tests use a stand-in that
/// just records requested durations.
pub trait DelaySource {
    fn delay_ms(&mut self, ms: u32);
}

/// Bringup calibration procedure from §4.1: drive the motor to `min_pos_deg`,
/// settle, record the powered-feedback anchor; release power, settle, record
/// the unpowered-feedback anchor; repeat at `max_pos_deg`. Returns the
/// resulting [`CalibrationTables`], ready to hand to
/// [`PositionSensor::set_tables`]. Invoked once at board bringup, before the
/// tick loop starts.
pub fn calibrate<A: AnalogInput, D: crate::motor_actuator::ServoDriver, T: DelaySource>(
    input: &mut A,
    actuator: &mut crate::motor_actuator::MotorActuator<D>,
    delay: &mut T,
    min_pos_deg: i32,
    max_pos_deg: i32,
    settle_powered_ms: u32,
    settle_unpowered_ms: u32,
) -> CalibrationTables {
    let (min_powered, min_unpowered) = sample_endpoint(
        input,
        actuator,
        delay,
        min_pos_deg,
        settle_powered_ms,
        settle_unpowered_ms,
    );
    let (max_powered, max_unpowered) = sample_endpoint(
        input,
        actuator,
        delay,
        max_pos_deg,
        settle_powered_ms,
        settle_unpowered_ms,
    );

    CalibrationTables {
        powered: CalibrationAnchor {
            min_raw: min_powered,
            max_raw: max_powered,
        },
        unpowered: CalibrationAnchor {
            min_raw: min_unpowered,
            max_raw: max_unpowered,
        },
        min_pos_deg,
        max_pos_deg,
    }
}

fn sample_endpoint<A: AnalogInput, D: crate::motor_actuator::ServoDriver, T: DelaySource>(
    input: &mut A,
    actuator: &mut crate::motor_actuator::MotorActuator<D>,
    delay: &mut T,
    target_deg: i32,
    settle_powered_ms: u32,
    settle_unpowered_ms: u32,
) -> (u16, u16) {
    actuator.attach_and_write(target_deg);
    delay.delay_ms(settle_powered_ms);
    let powered_raw = input.read_raw();

    actuator.detach();
    delay.delay_ms(settle_unpowered_ms);
    let unpowered_raw = input.read_raw();

    (powered_raw, unpowered_raw)
}

/// Produces a denoised angle in degrees from repeated raw analog reads.
pub struct PositionSensor<A: AnalogInput> {
    input: A,
    tables: CalibrationTables,
}

impl<A: AnalogInput> PositionSensor<A> {
    pub fn new(input: A, tables: CalibrationTables) -> Self {
        Self { input, tables }
    }

    pub fn set_tables(&mut self, tables: CalibrationTables) {
        self.tables = tables;
    }

    /// Take `POSITION_SAMPLE_COUNT` raw samples, drop the highest and
    /// lowest, average the remaining middle samples, then map through
    /// whichever calibration anchor matches `powered`.
    pub fn sample(&mut self, powered: bool) -> i32 {
        use crate::config::POSITION_SAMPLE_COUNT;

        let mut raw: [u16; POSITION_SAMPLE_COUNT] = [0; POSITION_SAMPLE_COUNT];
        for slot in raw.iter_mut() {
            *slot = self.input.read_raw();
        }
        raw.sort_unstable();

        // Discard the highest and lowest sample, average the rest. With
        // POSITION_SAMPLE_COUNT = 5 that's the middle three.
        let trimmed = &raw[1..raw.len() - 1];
        let avg_raw = trimmed.iter().map(|&v| v as u32).sum::<u32>() / trimmed.len() as u32;

        let anchor = if powered {
            &self.tables.powered
        } else {
            &self.tables.unpowered
        };

        let fraction = anchor.fraction(avg_raw as u16);
        let span = (self.tables.max_pos_deg - self.tables.min_pos_deg) as f32;
        self.tables.min_pos_deg + (fraction * span).round() as i32
    }
}
