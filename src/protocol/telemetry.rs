//! Telemetry message encoder
//!
//! Renders one structured reading into a fixed buffer, appending field by
//! field and checking the remaining capacity at every step. A message that
//! would not fit is discarded whole; partial buffers are never published.
//!
//! The field names (`s_id`, `seq`, `temp_c`, `hum`, `Def Route`) are the wire
//! contract toward the broker and must not change.

use crate::protocol::Overflow;
use core::fmt::Write;
use std::net::IpAddr;

/// Capacity of the telemetry message buffer, in bytes
pub const TELEMETRY_CAPACITY: usize = 512;

/// Fixed-capacity telemetry message buffer
pub type TelemetryBuffer = heapless::String<TELEMETRY_CAPACITY>;

/// One sensor reading set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Temperature in degrees Celsius
    pub temperature_c: f32,
    /// Relative humidity in percent
    pub humidity: f32,
}

/// Encode one telemetry message into a buffer of the given capacity
///
/// The capacity is a parameter so tests can exercise the overflow path
/// without shrinking the production buffer.
pub fn encode_telemetry_into<const N: usize>(
    short_id: &str,
    sequence: u16,
    sample: &SensorSample,
    route: Option<IpAddr>,
) -> Result<heapless::String<N>, Overflow> {
    let overflow = |_: core::fmt::Error| Overflow { capacity: N };
    let mut buffer: heapless::String<N> = heapless::String::new();

    write!(
        buffer,
        "{{\"d\":{{\"s_id\":\"{short_id}\",\"seq\":{sequence},\"temp_c\":{:.2},\"hum\":{:.2}",
        sample.temperature_c, sample.humidity
    )
    .map_err(overflow)?;

    match route {
        Some(next_hop) => {
            write!(buffer, ",\"Def Route\":\"{next_hop}\"").map_err(overflow)?;
        }
        None => {
            write!(buffer, ",\"Def Route\":\"\"").map_err(overflow)?;
        }
    }

    write!(buffer, "}}}}").map_err(overflow)?;
    Ok(buffer)
}

/// Encode one telemetry message into the production-sized buffer
pub fn encode_telemetry(
    short_id: &str,
    sequence: u16,
    sample: &SensorSample,
    route: Option<IpAddr>,
) -> Result<TelemetryBuffer, Overflow> {
    encode_telemetry_into::<TELEMETRY_CAPACITY>(short_id, sequence, sample, route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn sample() -> SensorSample {
        SensorSample {
            temperature_c: 21.5,
            humidity: 61.25,
        }
    }

    #[test]
    fn test_encode_shape() {
        let message = encode_telemetry("mtdssens-2e61", 3, &sample(), None).unwrap();
        assert_eq!(
            message.as_str(),
            "{\"d\":{\"s_id\":\"mtdssens-2e61\",\"seq\":3,\"temp_c\":21.50,\"hum\":61.25,\"Def Route\":\"\"}}"
        );
    }

    #[test]
    fn test_encode_includes_route_hint() {
        let route: IpAddr = "fd00::1".parse().unwrap();
        let message = encode_telemetry("mtdssens-2e61", 1, &sample(), Some(route)).unwrap();
        assert!(message.as_str().contains("\"Def Route\":\"fd00::1\""));
    }

    #[test]
    fn test_encode_is_valid_json() {
        let route: IpAddr = "192.0.2.7".parse().unwrap();
        let message = encode_telemetry("mtdssens-2e61", 42, &sample(), Some(route)).unwrap();

        let parsed: Value = serde_json::from_str(message.as_str()).unwrap();
        assert_eq!(parsed["d"]["s_id"], "mtdssens-2e61");
        assert_eq!(parsed["d"]["seq"], 42);
        assert_eq!(parsed["d"]["Def Route"], "192.0.2.7");
    }

    #[test]
    fn test_encode_overflow_discards_message() {
        let result = encode_telemetry_into::<32>("mtdssens-2e61", 1, &sample(), None);
        assert_eq!(result, Err(Overflow { capacity: 32 }));
    }

    #[test]
    fn test_encode_at_sequence_wrap_boundary() {
        let message = encode_telemetry("mtdssens-2e61", u16::MAX, &sample(), None).unwrap();
        let parsed: Value = serde_json::from_str(message.as_str()).unwrap();
        assert_eq!(parsed["d"]["seq"], 65535);
    }

    proptest! {
        #[test]
        fn encoded_readings_round_trip_to_two_decimals(
            temperature in 16.0f32..35.0,
            humidity in 56.0f32..75.0,
            sequence in 0u16..=u16::MAX,
        ) {
            let sample = SensorSample { temperature_c: temperature, humidity };
            let message = encode_telemetry("mtdssens-2e61", sequence, &sample, None).unwrap();
            let parsed: Value = serde_json::from_str(message.as_str()).unwrap();

            prop_assert_eq!(parsed["d"]["seq"].as_u64(), Some(u64::from(sequence)));

            let temp = parsed["d"]["temp_c"].as_f64().unwrap();
            let hum = parsed["d"]["hum"].as_f64().unwrap();
            prop_assert!((temp - f64::from(temperature)).abs() < 0.006);
            prop_assert!((hum - f64::from(humidity)).abs() < 0.006);
        }
    }
}
