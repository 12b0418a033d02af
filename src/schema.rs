use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Group;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// The sentence layouts emitted by the different beacon firmwares
pub enum SchemaKind {
    /// Battery readout only
    Battery,
    /// Battery, environment and inertial readouts
    Environment,
    /// Environment schema plus onboard GPS and controller temperature
    Gps,
    /// Environment schema plus the solar rail voltages
    #[default]
    Rails,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Which of the two incompatible `MPU6050` readouts a beacon emits
pub enum InertialShape {
    /// Yaw, pitch and roll
    #[default]
    Angles,
    /// Raw accelerometer and gyroscope axes
    Axes,
}

impl InertialShape {
    fn group(self) -> Group {
        match self {
            InertialShape::Angles => Group::InertialAngles,
            InertialShape::Axes => Group::InertialAxes,
        }
    }
}

impl FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "battery" => Ok(SchemaKind::Battery),
            "environment" => Ok(SchemaKind::Environment),
            "gps" => Ok(SchemaKind::Gps),
            "rails" => Ok(SchemaKind::Rails),
            _ => Err(format!(
                "unknown schema {s:?}, expected one of battery, environment, gps, rails"
            )),
        }
    }
}

impl Display for SchemaKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SchemaKind::Battery => write!(f, "battery"),
            SchemaKind::Environment => write!(f, "environment"),
            SchemaKind::Gps => write!(f, "gps"),
            SchemaKind::Rails => write!(f, "rails"),
        }
    }
}

impl FromStr for InertialShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "angles" => Ok(InertialShape::Angles),
            "axes" => Ok(InertialShape::Axes),
            _ => Err(format!("unknown inertial shape {s:?}, expected angles or axes")),
        }
    }
}

impl Display for InertialShape {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            InertialShape::Angles => write!(f, "angles"),
            InertialShape::Axes => write!(f, "axes"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The set of groups a decoder looks for, selected once at startup
pub struct Schema {
    groups: Vec<Group>,
    timestamp: bool,
}

impl Schema {
    /// Build the preset for a beacon firmware
    pub fn new(kind: SchemaKind, inertial: InertialShape) -> Self {
        let mut groups = vec![Group::Power];
        if kind != SchemaKind::Battery {
            groups.extend([Group::Environment, inertial.group()]);
        }
        match kind {
            SchemaKind::Gps => groups.extend([Group::Gps, Group::McuTemperature]),
            SchemaKind::Rails => groups.push(Group::Rails),
            SchemaKind::Battery | SchemaKind::Environment => {}
        }
        Self {
            groups,
            timestamp: true,
        }
    }

    /// Enable or disable stamping records with the decode time
    pub fn with_timestamp(mut self, timestamp: bool) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Groups extracted from each sentence, in record order
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Whether records carry a capture timestamp
    pub fn timestamp(&self) -> bool {
        self.timestamp
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(SchemaKind::default(), InertialShape::default())
    }
}
