use crate::prelude::*;
use crate::growatt::registers::{self, DeviceIdentity, Reading, REGISTER_BLOCK_LEN};

use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};

const START_ADDRESS: u16 = 0;
const REQUEST_TIMEOUT_SECS: u64 = 1; // RTU response deadline per read

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegisterSpace {
    Input,
    Holding,
}

impl std::fmt::Display for RegisterSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterSpace::Input => write!(f, "input"),
            RegisterSpace::Holding => write!(f, "holding"),
        }
    }
}

/// Owns the Modbus RTU serial connection to the inverter.
///
/// `ctx` doubles as the connection state: `None` is Closed, `Some` is Open.
/// Every failed operation drops back to Closed so the next read starts from
/// a clean connect; a successful operation never touches the handle.
pub struct Inverter {
    config: ConfigWrapper,
    ctx: Option<Context>,
}

impl Inverter {
    pub fn new(config: ConfigWrapper) -> Self {
        Self { config, ctx: None }
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    /// Read the live telemetry block and decode it into a Reading.
    pub async fn read_inputs(&mut self) -> Result<Reading> {
        let registers = self.read_block(RegisterSpace::Input).await?;

        match registers::decode_reading(&registers, chrono::Local::now()) {
            Ok(reading) => Ok(reading),
            Err(err) => {
                self.disconnect();
                Err(err)
            }
        }
    }

    /// Read the holding block and decode firmware/serial/model identity.
    pub async fn read_identity(&mut self) -> Result<DeviceIdentity> {
        let registers = self.read_block(RegisterSpace::Holding).await?;

        match registers::decode_identity(&registers) {
            Ok(identity) => Ok(identity),
            Err(err) => {
                self.disconnect();
                Err(err)
            }
        }
    }

    async fn read_block(&mut self, space: RegisterSpace) -> Result<Vec<u16>> {
        let ctx = self.ensure_connected()?;

        let request = async {
            match space {
                RegisterSpace::Input => {
                    ctx.read_input_registers(START_ADDRESS, REGISTER_BLOCK_LEN).await
                }
                RegisterSpace::Holding => {
                    ctx.read_holding_registers(START_ADDRESS, REGISTER_BLOCK_LEN).await
                }
            }
        };

        let deadline = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        match tokio::time::timeout(deadline, request).await {
            Ok(Ok(Ok(registers))) => Ok(registers),
            Ok(Ok(Err(exception))) => {
                self.disconnect();
                bail!("modbus exception reading {} registers: {}", space, exception);
            }
            Ok(Err(err)) => {
                self.disconnect();
                bail!("modbus transport error reading {} registers: {}", space, err);
            }
            Err(_) => {
                self.disconnect();
                bail!(
                    "timed out reading {} registers after {}s",
                    space,
                    REQUEST_TIMEOUT_SECS
                );
            }
        }
    }

    /// Open the serial port if the handle is currently Closed.
    fn ensure_connected(&mut self) -> Result<&mut Context> {
        if self.ctx.is_none() {
            let inverter = self.config.inverter();
            info!(
                "opening serial port {} at {} baud, unit {}",
                inverter.port(),
                inverter.baud_rate(),
                inverter.unit_id()
            );

            let builder = tokio_serial::new(inverter.port(), inverter.baud_rate())
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));

            let stream = SerialStream::open(&builder)
                .map_err(|err| anyhow!("failed to open serial port {}: {}", inverter.port(), err))?;

            self.ctx = Some(rtu::attach_slave(stream, Slave(inverter.unit_id())));
        }

        self.ctx
            .as_mut()
            .ok_or_else(|| anyhow!("serial connection unavailable"))
    }

    /// Drop the serial handle; the next read reopens the port.
    fn disconnect(&mut self) {
        if self.ctx.take().is_some() {
            info!("serial connection closed, will reopen on next read");
        }
    }
}
