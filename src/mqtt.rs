use crate::prelude::*;
use crate::growatt::registers::{DeviceIdentity, Reading};

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, QoS};

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

impl Message {
    /// State messages for one Reading, one per topic suffix, plus an `all`
    /// aggregate carrying the whole Reading as JSON.
    ///
    /// Topics are namespace-relative; the sender loop prefixes the
    /// configured namespace.
    pub fn for_reading(reading: &Reading, identity: Option<&DeviceIdentity>) -> Result<Vec<Message>> {
        let mut r = vec![
            Self::state("status", reading.status_string()),
            Self::state("pv_power", reading.pv_power.to_string()),
            Self::state("pv_volts1", reading.pv1_volts.to_string()),
            Self::state("pv_amps1", reading.pv1_amps.to_string()),
            Self::state("pv_power1", reading.pv1_power.to_string()),
            Self::state("pv_volts2", reading.pv2_volts.to_string()),
            Self::state("pv_amps2", reading.pv2_amps.to_string()),
            Self::state("pv_power2", reading.pv2_power.to_string()),
            Self::state("ac_power", reading.ac_power.to_string()),
            Self::state("ac_volts", reading.ac_volts.to_string()),
            Self::state("ac_amps", reading.ac_amps.to_string()),
            Self::state("ac_frequency", reading.ac_frequency.to_string()),
            Self::state("wh_today", reading.wh_today.to_string()),
            Self::state("wh_total", reading.wh_total.to_string()),
            Self::state("temp", reading.temp.to_string()),
            Self::state("ipm_temp", reading.ipm_temp.to_string()),
            Self::state("operation_hours", reading.operation_hours.to_string()),
        ];

        if let Some(identity) = identity {
            r.push(Self::state("serial_no", identity.serial_no.clone()));
            r.push(Self::state("model_no", identity.model_no.clone()));
        }

        r.push(mqtt::Message {
            topic: "all".to_string(),
            retain: false,
            payload: serde_json::to_string(reading)?,
        });

        Ok(r)
    }

    fn state(suffix: &str, payload: String) -> Message {
        Message {
            topic: suffix.to_string(),
            retain: false,
            payload,
        }
    }
} // }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Message(Message),
    /// Identity announcement; triggers retained Home Assistant discovery
    /// documents, published outside the state namespace.
    Discovery(DeviceIdentity),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

#[derive(Clone)]
pub struct Mqtt {
    config: ConfigWrapper,
    channels: Channels,
}

impl Mqtt {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let c = &self.config;

        if !c.mqtt().enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new("growatt-bridge", c.mqtt().host(), c.mqtt().port());

        let will = LastWill {
            topic: self.availability_topic(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.mqtt().username(), c.mqtt().password()) {
            options.set_credentials(u, p);
        }

        info!(
            "initializing mqtt at {}:{}",
            c.mqtt().host(),
            c.mqtt().port()
        );

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop),
            self.sender(client)
        )?;

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping MQTT client...");
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
        Ok(())
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        client
            .publish(self.availability_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        Ok(())
    }

    // no inbound subscriptions, but the event loop must be polled to keep
    // the connection alive
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            tokio::select! {
                message = receiver.recv() => {
                    if let Ok(ChannelData::Shutdown) = message {
                        info!("MQTT receiver shutting down");
                        break;
                    }
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                            info!("mqtt connected");
                        }
                        Ok(_) => {} // keepalives etc
                        Err(e) => {
                            error!("{}", e);
                            info!("reconnecting in 5s");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }

        info!("MQTT receiver loop exiting");
        Ok(())
    }

    // coordinator -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        use ChannelData::*;

        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            match receiver.recv().await? {
                Shutdown => {
                    info!("MQTT sender received shutdown signal");
                    let _ = client
                        .publish(self.availability_topic(), QoS::AtLeastOnce, true, "offline")
                        .await;
                    let _ = client.disconnect().await;
                    break;
                }
                Discovery(identity) => {
                    self.publish_discovery(&client, &identity).await;
                }
                Message(message) => {
                    let topic = format!("{}/{}", self.config.mqtt().namespace(), message.topic);
                    debug!("publishing: {} = {}", topic, message.payload);

                    let payload = message.payload.into_bytes();
                    let mut attempts = 0;
                    while attempts < 3 {
                        attempts += 1;
                        match client
                            .publish(&topic, QoS::AtLeastOnce, message.retain, payload.as_slice())
                            .await
                        {
                            Ok(_) => break,
                            Err(err) => {
                                error!(
                                    "mqtt publish failed: {:?} - retrying in 10s (attempt {}/3)",
                                    err, attempts
                                );
                                tokio::time::sleep(Duration::from_secs(10)).await;
                            }
                        }
                    }
                }
            }
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }

    /// Discovery documents live under the Home Assistant prefix, not our
    /// namespace, so they bypass the sender's topic prefixing.
    async fn publish_discovery(&self, client: &AsyncClient, identity: &DeviceIdentity) {
        let discovery = home_assistant::Discovery::new(identity, &self.config.mqtt());

        match discovery.all() {
            Ok(messages) => {
                let count = messages.len();
                for msg in messages {
                    if let Err(err) = client
                        .publish(&msg.topic, QoS::AtLeastOnce, msg.retain, msg.payload.into_bytes())
                        .await
                    {
                        error!("ha discovery publish failed: {:?}", err);
                        return;
                    }
                }
                info!("ha discovery configs published ({} sensors)", count);
            }
            Err(err) => error!("building ha discovery failed: {}", err),
        }
    }

    fn availability_topic(&self) -> String {
        format!("{}/availability", self.config.mqtt().namespace())
    }
}
