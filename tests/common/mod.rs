#![allow(dead_code)]

use growatt_bridge::config::{self, Config, ConfigWrapper};
use growatt_bridge::growatt::registers::REGISTER_BLOCK_LEN;

pub struct Factory;

impl Factory {
    pub fn config() -> ConfigWrapper {
        Self::config_with_base_url("https://pvoutput.org/service/r2")
    }

    pub fn config_with_base_url(base_url: &str) -> ConfigWrapper {
        ConfigWrapper::from_config(Config {
            inverter: config::Inverter {
                port: "/dev/ttyUSB0".to_string(),
                unit_id: 1,
                baud_rate: 9600,
                poll_interval: 10,
            },
            shift: config::Shift { start: 5, stop: 21 },
            pvoutput: config::PvOutput {
                enabled: true,
                api_key: "test-api-key".to_string(),
                system_id: "12345".to_string(),
                base_url: base_url.to_string(),
            },
            mqtt: config::Mqtt {
                enabled: false,
                host: "localhost".to_string(),
                port: 1883,
                username: None,
                password: None,
                namespace: "growatt".to_string(),
                homeassistant: config::HomeAssistant {
                    enabled: true,
                    prefix: "homeassistant".to_string(),
                },
            },
            loglevel: "info".to_string(),
            test: false,
        })
    }

    pub fn test_mode_config(base_url: &str) -> ConfigWrapper {
        let config = Self::config_with_base_url(base_url);
        config.set_test_mode(true);
        config
    }

    /// A full 45-register input block with known values at every
    /// documented offset.
    pub fn input_block() -> Vec<u16> {
        let mut regs = vec![0u16; REGISTER_BLOCK_LEN as usize];
        regs[0] = 1; // status: Normal
        regs[1] = 0;
        regs[2] = 12345; // pv_power 1234.5
        regs[3] = 2405; // pv1_volts 240.5
        regs[4] = 52; // pv1_amps 5.2
        regs[5] = 0;
        regs[6] = 6240; // pv1_power 624.0
        regs[7] = 1890; // pv2_volts 189.0
        regs[8] = 33; // pv2_amps 3.3
        regs[9] = 0;
        regs[10] = 6105; // pv2_power 610.5
        regs[11] = 0;
        regs[12] = 12000; // ac_power 1200.0
        regs[13] = 4998; // ac_frequency 49.98
        regs[14] = 2310; // ac_volts 231.0
        regs[15] = 53; // ac_amps 5.3
        regs[26] = 0;
        regs[27] = 58; // wh_today 5800
        regs[28] = 1;
        regs[29] = 0; // wh_total 6553600
        regs[30] = 0;
        regs[31] = 14400; // operation_hours 2.0
        regs[32] = 453; // temp 45.3
        regs[41] = 512; // ipm_temp 51.2
        regs
    }

    /// A full 45-register holding block with a known identity.
    pub fn holding_block() -> Vec<u16> {
        let mut regs = vec![0u16; REGISTER_BLOCK_LEN as usize];
        // firmware "G.1.8 "
        regs[9] = 0x472e;
        regs[10] = 0x312e;
        regs[11] = 0x3820;
        // control firmware "ZAAA-0"
        regs[12] = 0x5a41;
        regs[13] = 0x4141;
        regs[14] = 0x2d30;
        // serial "AB12345678"
        regs[23] = 0x4142;
        regs[24] = 0x3132;
        regs[25] = 0x3334;
        regs[26] = 0x3536;
        regs[27] = 0x3738;
        // model raw 0x123456
        regs[28] = 0x0012;
        regs[29] = 0x3456;
        // device type code
        regs[43] = 134;
        regs
    }
}
