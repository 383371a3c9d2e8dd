//! Data types for visibility computations.
//!
//! Identifier records, pair tags and the batch parameters derive
//! Serialize + Deserialize so they can round-trip through the JSON
//! interchange format.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interval::IntervalSet;

/// Equatorial Earth radius (km), used when no planet radius is given.
pub const EARTH_RADIUS_KM: f64 = 6378.137;

// -- Geometry ------------------------------------------------------

/// Inertial Cartesian position.
pub type Position = [f64; 3];

/// Position followed by velocity. Only the position part is read.
pub type StateVector = [f64; 6];

/// Position components of a state vector.
pub fn position(state: &StateVector) -> Position {
    [state[0], state[1], state[2]]
}

/// Result of one visibility function evaluation.
///
/// `vis = alpha1 + alpha2 - phi`. Positive means the segment between the
/// two points clears the obstructing sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilitySample {
    pub vis: f64,
    /// Angle between the two position vectors, in [0, pi].
    pub phi: f64,
    /// Half-angle of the tangent cone seen from point 1.
    pub alpha1: f64,
    /// Half-angle of the tangent cone seen from point 2.
    pub alpha2: f64,
}

/// Direction of a visibility sign change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiseSet {
    Rise = 1,
    Set = -1,
}

impl RiseSet {
    pub fn sign(self) -> i8 {
        self as i8
    }
}

/// How crossing times are located between two bracketing samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingFit {
    /// Straight line through the two bracketing samples.
    #[default]
    Linear,
    /// Cubic through the four samples around the bracket.
    Cubic,
}

// -- Identifiers ---------------------------------------------------

/// Object identifier value.
///
/// Numeric and textual ids are distinct kinds; ids of different kinds
/// have no natural order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Int(v) => write!(f, "{v}"),
            ObjectId::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for ObjectId {
    fn from(v: i64) -> Self {
        ObjectId::Int(v)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId::Text(s.to_owned())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        ObjectId::Text(s)
    }
}

/// A sensor or target record. Only `id` is read; any other fields are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ObjectRecord {
    pub fn new(id: impl Into<ObjectId>) -> Self {
        ObjectRecord {
            id: id.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_owned(), value);
        self
    }
}

/// Payload attached to every visibility window: which pair produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairTag {
    pub target_id: ObjectId,
    pub sensor_id: ObjectId,
}

/// Build the tag for a target/sensor pair.
pub fn pair_tag(target: &ObjectRecord, sensor: &ObjectRecord) -> PairTag {
    PairTag {
        target_id: target.id.clone(),
        sensor_id: sensor.id.clone(),
    }
}

// -- Batch I/O -----------------------------------------------------

fn default_planet_radius() -> f64 {
    EARTH_RADIUS_KM
}

/// Input for a visibility-history batch.
///
/// `x_targets[n][k]` is the state of target `n` at `time[k]`, likewise
/// for sensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisHistParams {
    pub targets: Vec<ObjectRecord>,
    pub sensors: Vec<ObjectRecord>,
    pub x_targets: Vec<Vec<StateVector>>,
    pub x_sensors: Vec<Vec<StateVector>>,
    pub time: Vec<f64>,
    #[serde(default = "default_planet_radius")]
    pub planet_radius: f64,
    #[serde(default)]
    pub extra_height: f64,
    #[serde(default)]
    pub crossing_fit: CrossingFit,
}

/// Output of a visibility-history batch.
///
/// `visibility[m][n][k]` is the visibility function of sensor `m` and
/// target `n` at `time[k]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisHistResult {
    pub intervals: IntervalSet<PairTag>,
    pub visibility: Vec<Vec<Vec<f64>>>,
}

// -- Tests ---------------------------------------------------------
