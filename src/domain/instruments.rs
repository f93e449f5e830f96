// Render-ready instrument descriptors
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sweep {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    /// Degrees, counter-clockwise from 3 o'clock.
    pub angle_deg: f64,
    pub major: bool,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeDescriptor {
    pub value: f64,
    /// Integer part of |value| for the numeric readout.
    pub readout: i64,
    pub arc_start_deg: f64,
    /// Signed for vertical speed, always non-negative for airspeed.
    pub arc_span_deg: f64,
    pub sweep: Sweep,
    pub color: Rgb,
    pub ticks: Vec<Tick>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerticalSpeedDescriptor {
    pub gauge: GaugeDescriptor,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitchTick {
    pub pitch_deg: i32,
    /// Display units from the indicator center, positive downwards.
    pub offset: f64,
    pub length: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttitudeDescriptor {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub rotation_deg: f64,
    pub horizon_offset: f64,
    pub ticks: Vec<PitchTick>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryDescriptor {
    pub percent: u8,
    pub segments: u8,
    pub color: Option<Rgb>,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanPoint {
    pub angle_rad: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadoutDescriptor {
    pub altitude: String,
    pub flight_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Idle,
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDescriptor {
    pub text: String,
    pub tone: StatusTone,
}

/// Everything derived from one telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightInstruments {
    pub airspeed: GaugeDescriptor,
    pub vertical_speed: VerticalSpeedDescriptor,
    pub attitude: AttitudeDescriptor,
    pub battery: BatteryDescriptor,
    pub readouts: ReadoutDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VideoStatus {
    pub sequence: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub frames_decoded: u64,
}
