//! Lighthouse calibration payload carried in OOTX packets.
//!
//! Little-endian layout, half floats widened to `f32`:
//!
//! | offset | field              | type  |
//! |--------|--------------------|-------|
//! | 0x00   | firmware version   | u16   |
//! | 0x02   | serial             | u32   |
//! | 0x06   | phase [2]          | f16   |
//! | 0x0a   | tilt [2]           | f16   |
//! | 0x0e   | unlock count       | u8    |
//! | 0x0f   | hardware version   | u8    |
//! | 0x10   | curve [2]          | f16   |
//! | 0x14   | accel dir [3]      | i8    |
//! | 0x17   | gib phase [2]      | f16   |
//! | 0x1b   | gib magnitude [2]  | f16   |
//! | 0x1f   | mode current       | u8    |
//! | 0x20   | system faults      | u8    |

use half::f16;
use lh_core::{LighthouseCalibration, MotorCalibration};
use thiserror::Error;

/// Bytes needed to decode a calibration record.
pub const CALIBRATION_PAYLOAD_LEN: usize = 0x21;

const PHASE: usize = 0x06;
const TILT: usize = 0x0a;
const CURVE: usize = 0x10;
const ACCEL: usize = 0x14;
const GIB_PHASE: usize = 0x17;
const GIB_MAG: usize = 0x1b;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("OOTX payload too short: {len} bytes, need {CALIBRATION_PAYLOAD_LEN}")]
    TooShort { len: usize },
    #[error("lighthouse serial {0:?} is not an unsigned 32-bit number")]
    InvalidSerial(String),
}

fn read_f16(data: &[u8], offset: usize) -> f32 {
    f16::from_le_bytes([data[offset], data[offset + 1]]).to_f32()
}

fn write_f16(data: &mut [u8], offset: usize, value: f32) {
    data[offset..offset + 2].copy_from_slice(&f16::from_f32(value).to_le_bytes());
}

/// Decode a verified OOTX payload into a calibration record.
///
/// `timestamp` is the timecode of the bit that completed the packet. Bytes
/// past the documented layout are ignored.
pub fn decode_calibration(
    data: &[u8],
    timestamp: u32,
) -> Result<LighthouseCalibration, PayloadError> {
    if data.len() < CALIBRATION_PAYLOAD_LEN {
        return Err(PayloadError::TooShort { len: data.len() });
    }
    let serial = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
    let motor = |m: usize| MotorCalibration {
        phase: read_f16(data, PHASE + 2 * m),
        tilt: read_f16(data, TILT + 2 * m),
        curve: read_f16(data, CURVE + 2 * m),
        gib_phase: read_f16(data, GIB_PHASE + 2 * m),
        gib_mag: read_f16(data, GIB_MAG + 2 * m),
    };
    Ok(LighthouseCalibration {
        serial: serial.to_string(),
        fw_version: u16::from_le_bytes([data[0], data[1]]),
        hw_version: data[0x0f],
        motors: [motor(0), motor(1)],
        accel: [
            data[ACCEL] as i8,
            data[ACCEL + 1] as i8,
            data[ACCEL + 2] as i8,
        ],
        sys_unlock_count: data[0x0e],
        mode_current: data[0x1f],
        sys_faults: data[0x20],
        timestamp,
    })
}

/// Encode a calibration record into its payload bytes.
///
/// Floats are narrowed to half precision, so only values representable as
/// `f16` survive a decode unchanged. The timestamp is not transmitted.
pub fn encode_calibration(record: &LighthouseCalibration) -> Result<Vec<u8>, PayloadError> {
    let serial: u32 = record
        .serial
        .parse()
        .map_err(|_| PayloadError::InvalidSerial(record.serial.clone()))?;
    let mut data = vec![0u8; CALIBRATION_PAYLOAD_LEN];
    data[0..2].copy_from_slice(&record.fw_version.to_le_bytes());
    data[2..6].copy_from_slice(&serial.to_le_bytes());
    for (m, motor) in record.motors.iter().enumerate() {
        write_f16(&mut data, PHASE + 2 * m, motor.phase);
        write_f16(&mut data, TILT + 2 * m, motor.tilt);
        write_f16(&mut data, CURVE + 2 * m, motor.curve);
        write_f16(&mut data, GIB_PHASE + 2 * m, motor.gib_phase);
        write_f16(&mut data, GIB_MAG + 2 * m, motor.gib_mag);
    }
    data[0x0e] = record.sys_unlock_count;
    data[0x0f] = record.hw_version;
    for (i, a) in record.accel.iter().enumerate() {
        data[ACCEL + i] = *a as u8;
    }
    data[0x1f] = record.mode_current;
    data[0x20] = record.sys_faults;
    Ok(data)
}
