use crate::prelude::*;
use crate::growatt::registers::DeviceIdentity;

use serde::Serialize;

/// One discoverable sensor: state topic suffix, display name, unit, device
/// class, state class, icon, entity category.
struct Sensor {
    object_id: &'static str,
    name: &'static str,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    state_class: Option<&'static str>,
    icon: &'static str,
    entity_category: Option<&'static str>,
}

const SENSORS: [Sensor; 19] = [
    Sensor { object_id: "pv_power", name: "PV Power", unit: Some("W"), device_class: Some("power"), state_class: Some("measurement"), icon: "mdi:solar-power-variant", entity_category: None },
    Sensor { object_id: "pv_volts1", name: "PV1 Voltage", unit: Some("V"), device_class: Some("voltage"), state_class: Some("measurement"), icon: "mdi:solar-panel", entity_category: None },
    Sensor { object_id: "pv_amps1", name: "PV1 Current", unit: Some("A"), device_class: Some("current"), state_class: Some("measurement"), icon: "mdi:current-dc", entity_category: None },
    Sensor { object_id: "pv_power1", name: "PV1 Power", unit: Some("W"), device_class: Some("power"), state_class: Some("measurement"), icon: "mdi:solar-panel", entity_category: None },
    Sensor { object_id: "pv_volts2", name: "PV2 Voltage", unit: Some("V"), device_class: Some("voltage"), state_class: Some("measurement"), icon: "mdi:solar-panel", entity_category: None },
    Sensor { object_id: "pv_amps2", name: "PV2 Current", unit: Some("A"), device_class: Some("current"), state_class: Some("measurement"), icon: "mdi:current-dc", entity_category: None },
    Sensor { object_id: "pv_power2", name: "PV2 Power", unit: Some("W"), device_class: Some("power"), state_class: Some("measurement"), icon: "mdi:solar-panel", entity_category: None },
    Sensor { object_id: "ac_power", name: "AC Power", unit: Some("W"), device_class: Some("power"), state_class: Some("measurement"), icon: "mdi:home-lightning-bolt", entity_category: None },
    Sensor { object_id: "ac_volts", name: "AC Voltage", unit: Some("V"), device_class: Some("voltage"), state_class: Some("measurement"), icon: "mdi:transmission-tower", entity_category: None },
    Sensor { object_id: "ac_amps", name: "AC Current", unit: Some("A"), device_class: Some("current"), state_class: Some("measurement"), icon: "mdi:current-ac", entity_category: None },
    Sensor { object_id: "ac_frequency", name: "AC Frequency", unit: Some("Hz"), device_class: Some("frequency"), state_class: Some("measurement"), icon: "mdi:sine-wave", entity_category: None },
    Sensor { object_id: "wh_today", name: "Energy Today", unit: Some("Wh"), device_class: Some("energy"), state_class: Some("total_increasing"), icon: "mdi:white-balance-sunny", entity_category: None },
    Sensor { object_id: "wh_total", name: "Energy Total", unit: Some("Wh"), device_class: Some("energy"), state_class: Some("total_increasing"), icon: "mdi:lightning-bolt", entity_category: None },
    Sensor { object_id: "temp", name: "Temperature", unit: Some("°C"), device_class: Some("temperature"), state_class: Some("measurement"), icon: "mdi:thermometer", entity_category: None },
    Sensor { object_id: "ipm_temp", name: "IPM Temperature", unit: Some("°C"), device_class: Some("temperature"), state_class: Some("measurement"), icon: "mdi:thermometer-high", entity_category: None },
    Sensor { object_id: "operation_hours", name: "Operation Hours", unit: Some("h"), device_class: Some("duration"), state_class: Some("total_increasing"), icon: "mdi:clock-outline", entity_category: None },
    Sensor { object_id: "status", name: "Status", unit: None, device_class: None, state_class: None, icon: "mdi:solar-power", entity_category: Some("diagnostic") },
    Sensor { object_id: "serial_no", name: "Serial Number", unit: None, device_class: None, state_class: None, icon: "mdi:identifier", entity_category: Some("diagnostic") },
    Sensor { object_id: "model_no", name: "Model", unit: None, device_class: None, state_class: None, icon: "mdi:information-outline", entity_category: Some("diagnostic") },
];

#[derive(Serialize, Clone)]
struct Device {
    identifiers: Vec<String>,
    name: String,
    manufacturer: String,
    model: String,
    sw_version: String,
}

#[derive(Serialize)]
struct SensorConfig {
    name: String,
    state_topic: String,
    unique_id: String,
    availability_topic: String,
    icon: String,
    device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_category: Option<String>,
}

pub struct Discovery {
    identity: DeviceIdentity,
    namespace: String,
    prefix: String,
}

impl Discovery {
    pub fn new(identity: &DeviceIdentity, mqtt: &config::Mqtt) -> Self {
        Self {
            identity: identity.clone(),
            namespace: mqtt.namespace().to_string(),
            prefix: mqtt.homeassistant().prefix().to_string(),
        }
    }

    /// Retained config documents for every sensor. Topics are absolute
    /// (under the Home Assistant prefix), not namespace-relative.
    pub fn all(&self) -> Result<Vec<mqtt::Message>> {
        let device = Device {
            identifiers: vec![format!("growatt_{}", self.identity.serial_no)],
            name: "Growatt Solar Inverter".to_string(),
            manufacturer: "Growatt".to_string(),
            model: self.identity.model_no.clone(),
            sw_version: self.identity.firmware.clone(),
        };

        let mut r = Vec::with_capacity(SENSORS.len());

        for sensor in &SENSORS {
            let config = SensorConfig {
                name: sensor.name.to_string(),
                state_topic: format!("{}/{}", self.namespace, sensor.object_id),
                unique_id: format!("growatt_{}_{}", self.identity.serial_no, sensor.object_id),
                availability_topic: format!("{}/availability", self.namespace),
                icon: sensor.icon.to_string(),
                device: device.clone(),
                unit_of_measurement: sensor.unit.map(str::to_string),
                device_class: sensor.device_class.map(str::to_string),
                state_class: sensor.state_class.map(str::to_string),
                entity_category: sensor.entity_category.map(str::to_string),
            };

            r.push(mqtt::Message {
                topic: format!(
                    "{}/sensor/{}/{}/config",
                    self.prefix, self.identity.serial_no, sensor.object_id
                ),
                retain: true,
                payload: serde_json::to_string(&config)?,
            });
        }

        Ok(r)
    }
}
