use growatt_bridge::config::Config;
use std::io::Write;
use tempfile::NamedTempFile;

fn load(yaml: &str) -> anyhow::Result<Config> {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    Config::new(file.path().to_str().unwrap().to_string())
}

const MINIMAL: &str = r#"
inverter:
  port: /dev/ttyUSB0
pvoutput:
  api_key: abc123
  system_id: "9876"
mqtt:
  host: broker.local
"#;

#[test]
fn minimal_config_fills_defaults() {
    let config = load(MINIMAL).unwrap();

    assert_eq!(config.inverter.port, "/dev/ttyUSB0");
    assert_eq!(config.inverter.unit_id, 1);
    assert_eq!(config.inverter.baud_rate, 9600);
    assert_eq!(config.inverter.poll_interval, 10);
    assert_eq!(config.shift.start, 5);
    assert_eq!(config.shift.stop, 21);
    assert!(config.pvoutput.enabled);
    assert_eq!(config.pvoutput.base_url, "https://pvoutput.org/service/r2");
    assert!(config.mqtt.enabled);
    assert_eq!(config.mqtt.port, 1883);
    assert_eq!(config.mqtt.namespace, "growatt");
    assert!(config.mqtt.homeassistant.enabled);
    assert_eq!(config.mqtt.homeassistant.prefix, "homeassistant");
    assert_eq!(config.loglevel, "info");
    assert!(!config.test);
}

#[test]
fn explicit_values_override_defaults() {
    let config = load(
        r#"
inverter:
  port: /dev/ttyAMA0
  unit_id: 3
  baud_rate: 19200
  poll_interval: 30
shift:
  start: 6
  stop: 20
pvoutput:
  enabled: false
  api_key: abc123
  system_id: "9876"
mqtt:
  enabled: false
  host: broker.local
  port: 8883
  namespace: solar
loglevel: warn
"#,
    )
    .unwrap();

    assert_eq!(config.inverter.unit_id, 3);
    assert_eq!(config.inverter.baud_rate, 19200);
    assert_eq!(config.shift.start, 6);
    assert_eq!(config.shift.stop, 20);
    assert!(!config.pvoutput.enabled);
    assert!(!config.mqtt.enabled);
    assert_eq!(config.mqtt.port, 8883);
    assert_eq!(config.mqtt.namespace, "solar");
    assert_eq!(config.loglevel, "warn");
}

#[test]
fn missing_file_is_an_error() {
    assert!(Config::new("/nonexistent/config.yaml".to_string()).is_err());
}

#[test]
fn empty_serial_port_is_rejected() {
    let yaml = MINIMAL.replace("port: /dev/ttyUSB0", "port: \"\"");
    assert!(load(&yaml).is_err());
}

#[test]
fn zero_unit_id_is_rejected() {
    let result = load(
        r#"
inverter:
  port: /dev/ttyUSB0
  unit_id: 0
pvoutput:
  api_key: abc123
  system_id: "9876"
mqtt:
  host: broker.local
"#,
    );
    assert!(result.is_err());
}

#[test]
fn inverted_shift_window_is_rejected() {
    let result = load(
        r#"
inverter:
  port: /dev/ttyUSB0
shift:
  start: 21
  stop: 5
pvoutput:
  api_key: abc123
  system_id: "9876"
mqtt:
  host: broker.local
"#,
    );
    assert!(result.is_err());
}

#[test]
fn enabled_pvoutput_requires_credentials() {
    let result = load(
        r#"
inverter:
  port: /dev/ttyUSB0
pvoutput:
  api_key: ""
  system_id: "9876"
mqtt:
  host: broker.local
"#,
    );
    assert!(result.is_err());
}

#[test]
fn invalid_base_url_is_rejected() {
    let result = load(
        r#"
inverter:
  port: /dev/ttyUSB0
pvoutput:
  api_key: abc123
  system_id: "9876"
  base_url: "not a url"
mqtt:
  host: broker.local
"#,
    );
    assert!(result.is_err());
}

#[test]
fn disabled_pvoutput_skips_credential_checks() {
    let result = load(
        r#"
inverter:
  port: /dev/ttyUSB0
pvoutput:
  enabled: false
  api_key: ""
  system_id: ""
mqtt:
  host: broker.local
"#,
    );
    assert!(result.is_ok());
}
