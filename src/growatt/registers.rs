use crate::prelude::*;

use chrono::{DateTime, Local};
use num_enum::TryFromPrimitive;
use serde::Serialize;

/// Number of 16-bit registers in one telemetry or identity block.
///
/// The first 45 input registers carry everything we report; the first 45
/// holding registers carry firmware/serial/model. Anything shorter is a
/// failed read.
pub const REGISTER_BLOCK_LEN: u16 = 45;

// Input register offsets (Growatt Modbus protocol)
const REG_STATUS: usize = 0;
const REG_PV_POWER: usize = 1;
const REG_PV1_VOLTS: usize = 3;
const REG_PV1_AMPS: usize = 4;
const REG_PV1_POWER: usize = 5;
const REG_PV2_VOLTS: usize = 7;
const REG_PV2_AMPS: usize = 8;
const REG_PV2_POWER: usize = 9;
const REG_AC_POWER: usize = 11;
const REG_AC_FREQUENCY: usize = 13;
const REG_AC_VOLTS: usize = 14;
const REG_AC_AMPS: usize = 15;
const REG_WH_TODAY: usize = 26;
const REG_WH_TOTAL: usize = 28;
const REG_OPERATION_HOURS: usize = 30;
const REG_TEMP: usize = 32;
const REG_IPM_TEMP: usize = 41;

// Holding register offsets
const REG_FIRMWARE: usize = 9;
const REG_CONTROL_FIRMWARE: usize = 12;
const REG_SERIAL_NO: usize = 23;
const REG_MODEL_NO: usize = 28;
const REG_DEVICE_TYPE_CODE: usize = 43;

/// Register block shorter than the 45-element contract.
///
/// The serial connection must be reset after this; a short block usually
/// means the RTU framing got out of step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRead {
    pub got: usize,
}

impl std::fmt::Display for ShortRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "short register read: got {} registers, expected {}",
            self.got, REGISTER_BLOCK_LEN
        )
    }
}

impl std::error::Error for ShortRead {}

/// Inverter run state, input register 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum Status {
    Waiting = 0,
    Normal = 1,
    Fault = 3,
}

pub fn status_string(status: u16) -> String {
    match Status::try_from(status) {
        Ok(Status::Waiting) => "Waiting".to_string(),
        Ok(Status::Normal) => "Normal".to_string(),
        Ok(Status::Fault) => "Fault".to_string(),
        Err(_) => format!("Unknown ({})", status),
    }
}

pub fn fault_string(code: u16) -> String {
    match code {
        0 => "None".to_string(),
        // 1..=23 map onto the 100-122 range of generic codes
        1..=23 => format!("Generic Error Code: {}", 99 + code),
        24 => "Auto Test Failed".to_string(),
        25 => "No AC Connection".to_string(),
        26 => "PV Isolation Low".to_string(),
        27 => "Residual I High".to_string(),
        28 => "Output High DCI".to_string(),
        29 => "PV Voltage High".to_string(),
        30 => "AC V Outrange".to_string(),
        31 => "AC F Outrange".to_string(),
        32 => "Module Hot".to_string(),
        _ => format!("Unknown ({})", code),
    }
}

/// Decode the warning bitfield into its set flags.
pub fn warning_strings(bits: u16) -> Vec<&'static str> {
    const WARNINGS: [(u16, &str); 10] = [
        (0x0001, "Fan warning"),
        (0x0002, "String communication abnormal"),
        (0x0004, "StrPID config Warning"),
        (0x0008, "Fail to read EEPROM"),
        (0x0010, "DSP and COM firmware unmatch"),
        (0x0020, "Fail to write EEPROM"),
        (0x0040, "SPD abnormal"),
        (0x0080, "GND and N connect abnormal"),
        (0x0100, "PV1 or PV2 circuit short"),
        (0x0200, "PV1 or PV2 boost driver broken"),
    ];

    WARNINGS
        .iter()
        .filter(|(mask, _)| bits & mask != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// One successful poll of the live telemetry block, timestamped at decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub date: DateTime<Local>,
    pub status: u16,
    pub pv_power: f64,
    pub pv1_volts: f64,
    pub pv1_amps: f64,
    pub pv1_power: f64,
    pub pv2_volts: f64,
    pub pv2_amps: f64,
    pub pv2_power: f64,
    pub ac_power: f64,
    pub ac_volts: f64,
    pub ac_amps: f64,
    pub ac_frequency: f64,
    pub wh_today: f64,
    pub wh_total: f64,
    pub operation_hours: f64,
    pub temp: f64,
    pub ipm_temp: f64,
}

impl Reading {
    pub fn status_string(&self) -> String {
        status_string(self.status)
    }
}

/// Identity block decoded from the holding registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub firmware: String,
    pub control_firmware: String,
    pub serial_no: String,
    pub model_no: String,
    pub device_type_code: u16,
}

/// `registers[index] / scale`. Most fields use scale 10.
pub fn single_scaled(registers: &[u16], index: usize, scale: f64) -> f64 {
    f64::from(registers[index]) / scale
}

/// Two consecutive registers combined into a 32-bit value, high word first,
/// then scaled.
pub fn double_scaled(registers: &[u16], index: usize, scale: f64) -> f64 {
    let raw = (u32::from(registers[index]) << 16) | u32::from(registers[index + 1]);
    f64::from(raw) / scale
}

/// Decode `count` registers starting at `start` into ASCII text, two
/// characters per register, high byte first.
pub fn decode_string(registers: &[u16], start: usize, count: usize) -> String {
    registers[start..start + count]
        .iter()
        .flat_map(|r| [char::from((r >> 8) as u8), char::from((r & 0xff) as u8)])
        .collect()
}

/// Render the model number from its raw 32-bit form: six 4-bit fields,
/// e.g. 0x123456 -> "T1 Q2 P3 U4 M5 S6".
pub fn decode_model(raw: u32) -> String {
    format!(
        "T{} Q{} P{} U{} M{} S{}",
        (raw & 0xf0_0000) >> 20,
        (raw & 0x0f_0000) >> 16,
        (raw & 0x00_f000) >> 12,
        (raw & 0x00_0f00) >> 8,
        (raw & 0x00_00f0) >> 4,
        raw & 0x00_000f,
    )
}

fn check_block(registers: &[u16]) -> Result<()> {
    if registers.len() < REGISTER_BLOCK_LEN as usize {
        return Err(ShortRead {
            got: registers.len(),
        }
        .into());
    }
    Ok(())
}

/// Decode one input register block into a Reading.
pub fn decode_reading(registers: &[u16], date: DateTime<Local>) -> Result<Reading> {
    check_block(registers)?;

    Ok(Reading {
        date,
        status: registers[REG_STATUS],
        pv_power: double_scaled(registers, REG_PV_POWER, 10.0),
        pv1_volts: single_scaled(registers, REG_PV1_VOLTS, 10.0),
        pv1_amps: single_scaled(registers, REG_PV1_AMPS, 10.0),
        pv1_power: double_scaled(registers, REG_PV1_POWER, 10.0),
        pv2_volts: single_scaled(registers, REG_PV2_VOLTS, 10.0),
        pv2_amps: single_scaled(registers, REG_PV2_AMPS, 10.0),
        pv2_power: double_scaled(registers, REG_PV2_POWER, 10.0),
        ac_power: double_scaled(registers, REG_AC_POWER, 10.0),
        ac_volts: single_scaled(registers, REG_AC_VOLTS, 10.0),
        ac_amps: single_scaled(registers, REG_AC_AMPS, 10.0),
        ac_frequency: single_scaled(registers, REG_AC_FREQUENCY, 100.0),
        wh_today: double_scaled(registers, REG_WH_TODAY, 0.01),
        wh_total: double_scaled(registers, REG_WH_TOTAL, 0.01),
        operation_hours: double_scaled(registers, REG_OPERATION_HOURS, 7200.0),
        temp: single_scaled(registers, REG_TEMP, 10.0),
        ipm_temp: single_scaled(registers, REG_IPM_TEMP, 10.0),
    })
}

/// Decode one holding register block into the device identity.
pub fn decode_identity(registers: &[u16]) -> Result<DeviceIdentity> {
    check_block(registers)?;

    let raw_model =
        (u32::from(registers[REG_MODEL_NO]) << 16) | u32::from(registers[REG_MODEL_NO + 1]);

    Ok(DeviceIdentity {
        firmware: decode_string(registers, REG_FIRMWARE, 3),
        control_firmware: decode_string(registers, REG_CONTROL_FIRMWARE, 3),
        serial_no: decode_string(registers, REG_SERIAL_NO, 5),
        model_no: decode_model(raw_model),
        device_type_code: registers[REG_DEVICE_TYPE_CODE],
    })
}
