use crate::prelude::*;
use crate::growatt::inverter::Inverter;
use crate::growatt::registers::{DeviceIdentity, Reading};
use crate::pvoutput::{PvOutput, StatusParams};
use crate::scheduler::{Shift, ShiftWindow};

use chrono::{Local, Timelike};
use std::sync::{Arc, Mutex};

/// Uploads happen on 5-minute clock boundaries.
const UPLOAD_SLOT_MINUTES: u32 = 5;

/// Counters summarized at shutdown.
#[derive(Default)]
pub struct Stats {
    pub readings_ok: u64,
    pub readings_failed: u64,
    pub uploads_ok: u64,
    pub uploads_failed: u64,
    pub mqtt_messages_sent: u64,
}

impl Stats {
    pub fn print_summary(&self) {
        info!("Poll statistics:");
        info!(
            "  Readings: {} ok, {} failed",
            self.readings_ok, self.readings_failed
        );
        info!(
            "  PVOutput uploads: {} ok, {} failed",
            self.uploads_ok, self.uploads_failed
        );
        info!("  MQTT messages sent: {}", self.mqtt_messages_sent);
    }
}

/// Drives the read -> upload -> publish cycle.
///
/// Two states: Active (inside the shift window, polling every
/// `poll_interval` seconds) and Inactive (sleeping out the duration the
/// scheduler computed). Transitions happen only by re-checking the window
/// after a sleep. Runs until the shutdown broadcast fires.
pub struct Coordinator {
    config: ConfigWrapper,
    channels: Channels,
    inverter: Inverter,
    pvoutput: PvOutput,
    shift: ShiftWindow,
    identity: Option<DeviceIdentity>,
    last_upload_minute: Option<u32>,
    pub stats: Arc<Mutex<Stats>>,
}

impl Coordinator {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Result<Self> {
        let shift = ShiftWindow::new(config.shift().start(), config.shift().stop())?;
        let pvoutput = PvOutput::new(config.clone())?;
        let inverter = Inverter::new(config.clone());

        Ok(Self {
            config,
            channels,
            inverter,
            pvoutput,
            shift,
            identity: None,
            last_upload_minute: None,
            stats: Arc::new(Mutex::new(Stats::default())),
        })
    }

    pub async fn start(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        // Identity first; polling still proceeds if the device won't answer yet.
        match self.inverter.read_identity().await {
            Ok(identity) => {
                info!(
                    "inverter firmware {}, control {}, serial {}, model {}, dtc {}",
                    identity.firmware,
                    identity.control_firmware,
                    identity.serial_no,
                    identity.model_no,
                    identity.device_type_code
                );
                self.announce(&identity);
                self.identity = Some(identity);
            }
            Err(e) => warn!("identity read failed, continuing without: {}", e),
        }

        loop {
            let now = Local::now();
            let pause = match self.shift.check(now.hour(), now.minute()) {
                Shift::Active => {
                    self.poll_cycle().await;
                    Duration::from_secs(self.config.inverter().poll_interval())
                }
                Shift::Sleep(duration) => {
                    info!(
                        "outside shift window, next shift starts in {} minutes",
                        duration.as_secs() / 60
                    );
                    duration
                }
            };

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("coordinator received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        Ok(())
    }

    /// One Active-state iteration: read, maybe upload, always publish.
    async fn poll_cycle(&mut self) {
        let reading = match self.inverter.read_inputs().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("no reading this cycle: {}", e);
                if let Ok(mut stats) = self.stats.lock() {
                    stats.readings_failed += 1;
                }
                return;
            }
        };

        if let Ok(mut stats) = self.stats.lock() {
            stats.readings_ok += 1;
        }

        // At most one upload per 5-minute clock boundary; the minute is
        // recorded even when the upload fails, so a failed slot waits for
        // the next boundary rather than hammering the API.
        let minute = Local::now().minute();
        if minute % UPLOAD_SLOT_MINUTES == 0 && self.last_upload_minute != Some(minute) {
            self.upload(&reading).await;
            self.last_upload_minute = Some(minute);
        }

        self.publish(&reading);
    }

    async fn upload(&mut self, reading: &Reading) {
        if !self.config.pvoutput().enabled() {
            return;
        }

        let params = StatusParams {
            energy_gen: Some(reading.wh_today.round() as u64),
            power_gen: Some(reading.ac_power),
            vdc: Some(reading.pv1_volts),
            vac: Some(reading.ac_volts),
            temp_inv: Some(reading.temp),
            energy_life: Some(reading.wh_total.round() as u64),
            power_vdc: Some(reading.pv_power),
            ..StatusParams::new(reading.date)
        };

        match self.pvoutput.send_status(&params).await {
            Ok(()) => {
                info!("pvoutput updated");
                if let Ok(mut stats) = self.stats.lock() {
                    stats.uploads_ok += 1;
                }
            }
            Err(e) => {
                // non-fatal: the next 5-minute slot is the next opportunity
                error!("pvoutput update failed: {}", e);
                if let Ok(mut stats) = self.stats.lock() {
                    stats.uploads_failed += 1;
                }
            }
        }
    }

    fn publish(&self, reading: &Reading) {
        if !self.config.mqtt().enabled() {
            return;
        }

        let messages = match mqtt::Message::for_reading(reading, self.identity.as_ref()) {
            Ok(messages) => messages,
            Err(e) => {
                error!("building mqtt messages failed: {}", e);
                return;
            }
        };

        if self.config.test_mode() {
            for m in &messages {
                debug!("mqtt (not sent): {} = {}", m.topic, m.payload);
            }
            return;
        }

        for message in messages {
            if self
                .channels
                .to_mqtt
                .send(mqtt::ChannelData::Message(message))
                .is_err()
            {
                warn!("send(to_mqtt) failed - channel closed?");
                return;
            }
            if let Ok(mut stats) = self.stats.lock() {
                stats.mqtt_messages_sent += 1;
            }
        }
    }

    fn announce(&self, identity: &DeviceIdentity) {
        if !self.config.mqtt().enabled() || !self.config.mqtt().homeassistant().enabled() {
            return;
        }

        if self.config.test_mode() {
            debug!("ha discovery (not sent) for serial {}", identity.serial_no);
            return;
        }

        let _ = self
            .channels
            .to_mqtt
            .send(mqtt::ChannelData::Discovery(identity.clone()));
    }
}
