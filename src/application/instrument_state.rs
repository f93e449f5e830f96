// Instrument state - Pure transforms from samples to descriptors
//
// Nothing in here keeps state or touches I/O; identical input always gives
// identical output.
use crate::domain::connection::ConnectionState;
use crate::domain::instruments::{
    AttitudeDescriptor, BatteryDescriptor, FlightInstruments, GaugeDescriptor, PitchTick,
    ReadoutDescriptor, Rgb, ScanPoint, StatusDescriptor, StatusTone, Sweep, Tick,
    VerticalSpeedDescriptor,
};
use crate::domain::ranging::RangingScan;
use crate::domain::telemetry::TelemetrySample;

pub const AIRSPEED_DEG_PER_UNIT: f64 = 6.0;
pub const AIRSPEED_ARC_START_DEG: f64 = 270.0;
pub const AIRSPEED_RANGE_DEG: f64 = 240.0;
/// Value at which the airspeed color saturates to full red.
pub const AIRSPEED_COLOR_FULL_SCALE: f64 = 40.0;
const AIRSPEED_GREEN_AT_ZERO: f64 = 165.0;

pub const VERTICAL_SPEED_DEG_PER_UNIT: f64 = 3.0;
pub const ASCENDING_COLOR: Rgb = Rgb::new(25, 25, 255);
pub const DESCENDING_COLOR: Rgb = Rgb::new(255, 165, 0);

pub const HORIZON_UNITS_PER_DEG: f64 = 3.33;
const PITCH_LADDER_UNITS_PER_DEG: f64 = 3.5;
const PITCH_LADDER_STEP_DEG: i32 = 10;
const PITCH_LADDER_LIMIT_DEG: i32 = 30;
const MAJOR_PITCH_TICK: u32 = 60;
const MINOR_PITCH_TICK: u32 = 20;

pub fn airspeed_gauge(value: f64) -> GaugeDescriptor {
    let span = (value * AIRSPEED_DEG_PER_UNIT).clamp(0.0, AIRSPEED_RANGE_DEG);

    GaugeDescriptor {
        value,
        readout: value.abs().trunc() as i64,
        arc_start_deg: AIRSPEED_ARC_START_DEG,
        arc_span_deg: span,
        sweep: Sweep::Clockwise,
        color: airspeed_color(value),
        ticks: airspeed_ticks(),
    }
}

/// Linear ramp from (0,165,0) at rest to (255,0,0) at full scale, saturating
/// on both ends.
pub fn airspeed_color(value: f64) -> Rgb {
    let ratio = value / AIRSPEED_COLOR_FULL_SCALE;
    let red = (255.0 * ratio).trunc().clamp(0.0, 255.0);
    let green = (AIRSPEED_GREEN_AT_ZERO - (AIRSPEED_GREEN_AT_ZERO * ratio).trunc())
        .clamp(0.0, AIRSPEED_GREEN_AT_ZERO);
    Rgb::new(red as u8, green as u8, 0)
}

fn airspeed_ticks() -> Vec<Tick> {
    (0..=40)
        .map(|i: i32| {
            let major = i % 10 == 0;
            Tick {
                angle_deg: -90.0 - f64::from(i) * AIRSPEED_DEG_PER_UNIT,
                major,
                label: major.then(|| i.to_string()),
            }
        })
        .collect()
}

pub fn vertical_speed_gauge(value: f64) -> VerticalSpeedDescriptor {
    let descending = value < 0.0;
    let color = if descending {
        DESCENDING_COLOR
    } else {
        ASCENDING_COLOR
    };

    let gauge = GaugeDescriptor {
        value,
        readout: value.abs().trunc() as i64,
        arc_start_deg: 0.0,
        arc_span_deg: value * VERTICAL_SPEED_DEG_PER_UNIT,
        sweep: Sweep::CounterClockwise,
        color,
        ticks: vertical_speed_ticks(),
    };

    VerticalSpeedDescriptor { gauge, descending }
}

fn vertical_speed_ticks() -> Vec<Tick> {
    (-30..=30)
        .step_by(2)
        .map(|i: i32| {
            let major = i % 15 == 0;
            Tick {
                angle_deg: f64::from(i) * VERTICAL_SPEED_DEG_PER_UNIT,
                major,
                label: major.then(|| i.to_string()),
            }
        })
        .collect()
}

pub fn attitude_indicator(roll_deg: f64, pitch_deg: f64) -> AttitudeDescriptor {
    let ticks = (-PITCH_LADDER_LIMIT_DEG..=PITCH_LADDER_LIMIT_DEG)
        .step_by(PITCH_LADDER_STEP_DEG as usize)
        .enumerate()
        .map(|(i, tick)| PitchTick {
            pitch_deg: tick,
            offset: (f64::from(tick) - pitch_deg) * PITCH_LADDER_UNITS_PER_DEG,
            length: if i % 2 == 0 {
                MAJOR_PITCH_TICK
            } else {
                MINOR_PITCH_TICK
            },
            label: tick.to_string(),
        })
        .collect();

    AttitudeDescriptor {
        roll_deg,
        pitch_deg,
        rotation_deg: -roll_deg,
        horizon_offset: pitch_deg * HORIZON_UNITS_PER_DEG,
        ticks,
    }
}

pub fn battery_indicator(percent: u8) -> BatteryDescriptor {
    let (segments, color) = match percent {
        75.. => (4, Some(Rgb::new(0, 100, 0))),
        50.. => (3, Some(Rgb::new(100, 238, 100))),
        25.. => (2, Some(Rgb::new(255, 165, 0))),
        1.. => (1, Some(Rgb::new(255, 0, 0))),
        0 => (0, None),
    };

    BatteryDescriptor {
        percent,
        segments,
        color,
        label: format!("% {}", percent),
    }
}

pub fn scan_points(scan: &RangingScan) -> Vec<ScanPoint> {
    scan.distances()
        .iter()
        .enumerate()
        .map(|(i, &radius)| ScanPoint {
            angle_rad: scan.angle_at(i),
            radius,
        })
        .collect()
}

pub fn readouts(sample: &TelemetrySample) -> ReadoutDescriptor {
    let hours = sample
        .since_heartbeat
        .map(|elapsed| (elapsed.as_secs_f64() / 3600.0 * 100.0).round() / 100.0)
        .unwrap_or(0.0);

    ReadoutDescriptor {
        altitude: format!("{} m", sample.altitude),
        flight_time: format!("{} h", hours),
    }
}

pub fn flight_instruments(sample: &TelemetrySample) -> FlightInstruments {
    FlightInstruments {
        airspeed: airspeed_gauge(sample.airspeed),
        vertical_speed: vertical_speed_gauge(sample.vertical_speed),
        attitude: attitude_indicator(sample.roll_deg, sample.pitch_deg),
        battery: battery_indicator(sample.battery_percent),
        readouts: readouts(sample),
    }
}

pub fn connection_status(state: &ConnectionState) -> StatusDescriptor {
    match state {
        ConnectionState::Disconnected => StatusDescriptor {
            text: "DISCONNECTED".to_string(),
            tone: StatusTone::Idle,
        },
        ConnectionState::Connected(endpoint) => StatusDescriptor {
            text: format!("CONNECTED ({})", endpoint),
            tone: StatusTone::Ok,
        },
        ConnectionState::Error(message) => StatusDescriptor {
            text: format!("Error: {}", message),
            tone: StatusTone::Error,
        },
    }
}
