//! Sensor reading source
//!
//! The controller only needs a value producer; where the values come from is
//! a deployment concern. The built-in implementation simulates an onboard
//! temperature/humidity sensor.

use crate::protocol::SensorSample;
use rand::Rng;

/// Produces one reading set per publish cycle
pub trait SensorSource: Send {
    fn sample(&mut self) -> SensorSample;
}

/// Simulated onboard sensor
///
/// Temperature is uniform in (16, 35) degrees Celsius, relative humidity
/// uniform in (56, 75) percent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSensors;

impl SensorSource for SimulatedSensors {
    fn sample(&mut self) -> SensorSample {
        let mut rng = rand::thread_rng();
        SensorSample {
            temperature_c: rng.gen_range(16.0..35.0),
            humidity: rng.gen_range(56.0..75.0),
        }
    }
}
