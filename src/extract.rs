use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
/// A group of sensor fields reported together under one tag in the sentence body
pub enum Group {
    /// `BAT <voltage> <current>`
    Power,
    /// `BME280 <temperature> <pressure> <altitude> <humidity>`
    Environment,
    /// `MPU6050 <yaw> <pitch> <roll>`
    InertialAngles,
    /// `MPU6050 <accel x> <accel y> <accel z> <gyro x> <gyro y> <gyro z>`
    InertialAxes,
    /// `GPS <latitude> <longitude> <altitude>`
    Gps,
    /// `TMP <temperature>`
    McuTemperature,
    /// `VOL` followed by the eight rail voltages
    Rails,
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Unsigned,
    Signed,
}

impl Number {
    fn pattern(self) -> &'static str {
        match self {
            Number::Unsigned => r"(\d+\.\d+)",
            Number::Signed => r"([+-]?\d+\.\d+)",
        }
    }
}

use Number::{Signed, Unsigned};

struct Grammar {
    tag: &'static str,
    fields: &'static [(&'static str, Number)],
    /// The power readout is always followed by a status word
    trailing_space: bool,
}

const POWER: Grammar = Grammar {
    tag: "BAT",
    fields: &[("battery_voltage", Unsigned), ("battery_current", Signed)],
    trailing_space: true,
};

const ENVIRONMENT: Grammar = Grammar {
    tag: "BME280",
    fields: &[
        ("bme_temperature", Unsigned),
        ("bme_pressure", Unsigned),
        ("bme_altitude", Unsigned),
        ("bme_humidity", Unsigned),
    ],
    trailing_space: false,
};

const INERTIAL_ANGLES: Grammar = Grammar {
    tag: "MPU6050",
    fields: &[("mpu_yaw", Signed), ("mpu_pitch", Signed), ("mpu_roll", Signed)],
    trailing_space: false,
};

const INERTIAL_AXES: Grammar = Grammar {
    tag: "MPU6050",
    fields: &[
        ("mpu_accel_x", Signed),
        ("mpu_accel_y", Signed),
        ("mpu_accel_z", Signed),
        ("mpu_gyro_x", Signed),
        ("mpu_gyro_y", Signed),
        ("mpu_gyro_z", Signed),
    ],
    trailing_space: false,
};

const GPS: Grammar = Grammar {
    tag: "GPS",
    fields: &[
        ("gps_latitude", Signed),
        ("gps_longitude", Signed),
        ("gps_altitude", Signed),
    ],
    trailing_space: false,
};

const MCU_TEMPERATURE: Grammar = Grammar {
    tag: "TMP",
    fields: &[("mcu_temperature", Unsigned)],
    trailing_space: false,
};

// +X, -X, +Y, -Y, +Z, -Z, battery, bus
const RAILS: Grammar = Grammar {
    tag: "VOL",
    fields: &[
        ("PLUS_X_voltage", Unsigned),
        ("MINUS_X_voltage", Unsigned),
        ("PLUS_Y_voltage", Unsigned),
        ("MINUS_Y_voltage", Unsigned),
        ("PLUS_Z_voltage", Unsigned),
        ("MINUS_Z_voltage", Unsigned),
        ("BAT_voltage", Unsigned),
        ("BUS_voltage", Unsigned),
    ],
    trailing_space: false,
};

impl Group {
    /// Every group, in the order they appear in the longest sentences
    pub const ALL: [Group; 7] = [
        Group::Power,
        Group::Environment,
        Group::InertialAngles,
        Group::InertialAxes,
        Group::Gps,
        Group::McuTemperature,
        Group::Rails,
    ];

    fn grammar(self) -> &'static Grammar {
        match self {
            Group::Power => &POWER,
            Group::Environment => &ENVIRONMENT,
            Group::InertialAngles => &INERTIAL_ANGLES,
            Group::InertialAxes => &INERTIAL_AXES,
            Group::Gps => &GPS,
            Group::McuTemperature => &MCU_TEMPERATURE,
            Group::Rails => &RAILS,
        }
    }

    /// The literal tag introducing this group in the sentence body
    pub fn tag(self) -> &'static str {
        self.grammar().tag
    }

    /// Names of the fields owned by this group, in sentence order
    pub fn fields(self) -> impl Iterator<Item = &'static str> {
        self.grammar().fields.iter().map(|(name, _)| *name)
    }

    fn compile(self) -> Regex {
        let grammar = self.grammar();
        let mut pattern = regex::escape(grammar.tag);
        for (_, number) in grammar.fields {
            pattern.push(' ');
            pattern.push_str(number.pattern());
        }
        if grammar.trailing_space {
            pattern.push(' ');
        }
        Regex::new(&pattern).expect("Failed to compile regex")
    }

    fn regex(self) -> &'static Regex {
        lazy_static! {
            static ref RE: HashMap<Group, Regex> =
                Group::ALL.iter().map(|g| (*g, g.compile())).collect();
        }
        &RE[&self]
    }

    /// Extract this group's readings from a sentence body.
    ///
    /// Every field of the group is returned. Either all carry a value, or,
    /// when the tag is missing or a number does not parse, none do.
    pub fn extract(self, body: &str) -> Vec<(&'static str, Option<f64>)> {
        let values = self.regex().captures(body).and_then(|caps| {
            caps.iter()
                .skip(1)
                .map(|m| m.and_then(|m| m.as_str().parse::<f64>().ok()))
                .collect::<Option<Vec<f64>>>()
        });
        match values {
            Some(values) => self.fields().zip(values.into_iter().map(Some)).collect(),
            None => self.fields().map(|name| (name, None)).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Group;

    const BODY: &str = "hi hi BAT 4.32 -514.7 OK BME280 27.55 998.38 124.55 27.48 MPU6050 -2.06 0.16 0.00";

    fn values(readings: Vec<(&'static str, Option<f64>)>) -> Vec<Option<f64>> {
        readings.into_iter().map(|(_, v)| v).collect()
    }

    #[test]
    fn power_keeps_sign_of_current() {
        let power = Group::Power.extract(BODY);
        assert_eq!(
            power,
            vec![
                ("battery_voltage", Some(4.32)),
                ("battery_current", Some(-514.7))
            ]
        );
    }

    #[test]
    fn power_requires_status_word() {
        assert_eq!(
            values(Group::Power.extract("BAT 4.32 -514.7")),
            vec![None, None]
        );
    }

    #[test]
    fn environment_group() {
        assert_eq!(
            Group::Environment.extract(BODY),
            vec![
                ("bme_temperature", Some(27.55)),
                ("bme_pressure", Some(998.38)),
                ("bme_altitude", Some(124.55)),
                ("bme_humidity", Some(27.48)),
            ]
        );
    }

    #[test]
    fn inertial_angles() {
        assert_eq!(
            values(Group::InertialAngles.extract(BODY)),
            vec![Some(-2.06), Some(0.16), Some(0.0)]
        );
    }

    #[test]
    fn inertial_axes_need_six_numbers() {
        assert_eq!(values(Group::InertialAxes.extract(BODY)), vec![None; 6]);
        let body = "MPU6050 0.01 -0.02 1.00 -1.50 2.25 0.00";
        assert_eq!(
            Group::InertialAxes.extract(body),
            vec![
                ("mpu_accel_x", Some(0.01)),
                ("mpu_accel_y", Some(-0.02)),
                ("mpu_accel_z", Some(1.0)),
                ("mpu_gyro_x", Some(-1.5)),
                ("mpu_gyro_y", Some(2.25)),
                ("mpu_gyro_z", Some(0.0)),
            ]
        );
    }

    #[test]
    fn gps_and_mcu_temperature() {
        let body = "BAT 4.1 12.0 OK GPS 53.4022 -1.5389 101.20 TMP 38.50";
        assert_eq!(
            values(Group::Gps.extract(body)),
            vec![Some(53.4022), Some(-1.5389), Some(101.2)]
        );
        assert_eq!(
            Group::McuTemperature.extract(body),
            vec![("mcu_temperature", Some(38.5))]
        );
    }

    #[test]
    fn rails_map_positionally() {
        let body = "VOL 4.25 1.71 3.33 1.49 2.64 0.86 4.49 0.00";
        assert_eq!(
            Group::Rails.extract(body),
            vec![
                ("PLUS_X_voltage", Some(4.25)),
                ("MINUS_X_voltage", Some(1.71)),
                ("PLUS_Y_voltage", Some(3.33)),
                ("MINUS_Y_voltage", Some(1.49)),
                ("PLUS_Z_voltage", Some(2.64)),
                ("MINUS_Z_voltage", Some(0.86)),
                ("BAT_voltage", Some(4.49)),
                ("BUS_voltage", Some(0.0)),
            ]
        );
    }

    #[test]
    fn missing_tag_leaves_whole_group_absent() {
        for group in Group::ALL {
            let readings = group.extract("nothing to see here");
            assert!(!readings.is_empty());
            assert!(readings.iter().all(|(_, v)| v.is_none()), "{group:?}");
        }
    }

    #[test]
    fn unsigned_groups_reject_negative_numbers() {
        assert_eq!(values(Group::McuTemperature.extract("TMP -3.00")), vec![None]);
    }

    #[test]
    fn field_names_are_unique_across_groups() {
        let mut names: Vec<&str> = Group::ALL.iter().flat_map(|g| g.fields()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
