use crate::prelude::*;

use chrono::{DateTime, Local};
use std::time::{SystemTime, UNIX_EPOCH};

pub const STATUS_ENDPOINT: &str = "addstatus.jsp";
pub const OUTPUT_ENDPOINT: &str = "addoutput.jsp";

const MAX_ATTEMPTS: u32 = 3;
const LOW_QUOTA_THRESHOLD: u64 = 10;
const MAX_COMMENT_LEN: usize = 30;
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[cfg(not(feature = "mocks"))]
const RETRY_DELAY_SECS: u64 = 5;

#[cfg(feature = "mocks")]
const RETRY_DELAY_SECS: u64 = 0; // fail fast in tests

/// Quota state parsed from one response's rate-limit headers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateLimitSnapshot {
    pub remaining: Option<u64>,
    /// Epoch seconds at which the quota window resets.
    pub reset: Option<f64>,
}

impl RateLimitSnapshot {
    pub fn from_response(response: &reqwest::Response) -> Self {
        Self {
            remaining: header_value(response, "X-Rate-Limit-Remaining"),
            reset: header_value(response, "X-Rate-Limit-Reset"),
        }
    }

    pub fn warn_if_low(&self, now: f64) {
        if let Some(remaining) = self.remaining {
            if remaining < LOW_QUOTA_THRESHOLD {
                let until_reset = self
                    .reset
                    .map(|reset| (reset - now).round() as i64)
                    .unwrap_or(0);
                warn!(
                    "pvoutput: only {} requests left, reset after {}s",
                    remaining, until_reset
                );
            }
        }
    }

    /// 403 backoff: one second past the advertised reset instant.
    pub fn backoff_until_reset(&self, now: f64) -> Duration {
        let reset = self.reset.unwrap_or(now);
        let seconds = (reset - now).round().max(0.0) as u64 + 1;
        Duration::from_secs(seconds)
    }
}

fn header_value<T: FromStr>(response: &reqwest::Response, name: &str) -> Option<T> {
    response.headers().get(name)?.to_str().ok()?.trim().parse().ok()
}

fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

async fn pause(duration: Duration) {
    if cfg!(feature = "mocks") {
        return;
    }
    tokio::time::sleep(duration).await;
}

/// Inputs for one live-status upload. `None` fields are omitted from the
/// payload entirely, never encoded as zero.
#[derive(Debug, Clone)]
pub struct StatusParams {
    pub date: DateTime<Local>,
    pub energy_gen: Option<u64>,
    pub power_gen: Option<f64>,
    pub energy_imp: Option<u64>,
    pub power_imp: Option<f64>,
    pub temp: Option<f64>,
    pub vdc: Option<f64>,
    pub vac: Option<f64>,
    pub temp_inv: Option<f64>,
    pub energy_life: Option<u64>,
    pub comment: Option<String>,
    pub power_vdc: Option<f64>,
    pub cumulative: bool,
}

impl StatusParams {
    pub fn new(date: DateTime<Local>) -> Self {
        Self {
            date,
            energy_gen: None,
            power_gen: None,
            energy_imp: None,
            power_imp: None,
            temp: None,
            vdc: None,
            vac: None,
            temp_inv: None,
            energy_life: None,
            comment: None,
            power_vdc: None,
            cumulative: false,
        }
    }
}

/// Inputs for one end-of-day output upload.
#[derive(Debug, Clone)]
pub struct OutputParams {
    pub date: DateTime<Local>,
    pub generated: Option<u64>,
    pub exported: Option<u64>,
    pub comment: Option<String>,
}

/// PVOutput reporting client.
///
/// Holds the one piece of persistent upload state, the last energy-today
/// value actually sent, for the dedup rule in [`build_status_payload`].
///
/// [`build_status_payload`]: PvOutput::build_status_payload
pub struct PvOutput {
    config: ConfigWrapper,
    client: reqwest::Client,
    wh_today_last: u64,
}

impl PvOutput {
    pub fn new(config: ConfigWrapper) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            config,
            client,
            wh_today_last: 0,
        })
    }

    pub fn last_uploaded_energy(&self) -> u64 {
        self.wh_today_last
    }

    /// Upload live status data.
    pub async fn send_status(&mut self, params: &StatusParams) -> Result<()> {
        let payload = self.build_status_payload(params);
        self.call(STATUS_ENDPOINT, &payload).await
    }

    /// Upload end-of-day output data.
    pub async fn send_output(&mut self, params: &OutputParams) -> Result<()> {
        let payload = Self::build_output_payload(params);
        self.call(OUTPUT_ENDPOINT, &payload).await
    }

    /// Build the status form fields, applying the energy dedup rule.
    ///
    /// The inverter reports generation in coarse 100 Wh steps; re-sending an
    /// unchanged value would average the interval's power to zero on the
    /// receiving side, so a repeated energy value is simply left out.
    pub fn build_status_payload(&mut self, params: &StatusParams) -> Vec<(String, String)> {
        let mut payload = vec![
            ("d".to_string(), params.date.format("%Y%m%d").to_string()),
            ("t".to_string(), params.date.format("%H:%M").to_string()),
        ];

        if let Some(energy_gen) = params.energy_gen {
            if energy_gen != self.wh_today_last {
                self.wh_today_last = energy_gen;
                payload.push(("v1".to_string(), energy_gen.to_string()));
            }
        }

        if let Some(power_gen) = params.power_gen {
            payload.push(("v2".to_string(), power_gen.to_string()));
        }
        if let Some(energy_imp) = params.energy_imp {
            payload.push(("v3".to_string(), energy_imp.to_string()));
        }
        if let Some(power_imp) = params.power_imp {
            payload.push(("v4".to_string(), power_imp.to_string()));
        }
        if let Some(temp) = params.temp {
            payload.push(("v5".to_string(), temp.to_string()));
        }
        if let Some(vac) = params.vac {
            payload.push(("v6".to_string(), vac.to_string()));
        }
        if let Some(vdc) = params.vdc {
            payload.push(("v8".to_string(), vdc.to_string()));
        }
        if let Some(temp_inv) = params.temp_inv {
            payload.push(("v9".to_string(), temp_inv.to_string()));
        }
        if let Some(energy_life) = params.energy_life {
            payload.push(("v10".to_string(), energy_life.to_string()));
        }

        payload.push((
            "c1".to_string(),
            if params.cumulative { "1" } else { "0" }.to_string(),
        ));

        if let Some(comment) = &params.comment {
            let comment: String = comment.chars().take(MAX_COMMENT_LEN).collect();
            payload.push(("m1".to_string(), comment));
        }

        // efficiency as a percentage, only meaningful with PV power flowing
        if let (Some(power_gen), Some(power_vdc)) = (params.power_gen, params.power_vdc) {
            if power_vdc > 0.0 {
                payload.push((
                    "v12".to_string(),
                    (power_gen / power_vdc * 100.0).to_string(),
                ));
            }
        }

        payload
    }

    fn build_output_payload(params: &OutputParams) -> Vec<(String, String)> {
        let mut payload = vec![("d".to_string(), params.date.format("%Y%m%d").to_string())];

        if let Some(generated) = params.generated {
            payload.push(("g".to_string(), generated.to_string()));
        }
        if let Some(exported) = params.exported {
            payload.push(("e".to_string(), exported.to_string()));
        }
        if let Some(comment) = &params.comment {
            let comment: String = comment.chars().take(MAX_COMMENT_LEN).collect();
            payload.push(("cm".to_string(), comment));
        }

        payload
    }

    async fn call(&self, endpoint: &str, payload: &[(String, String)]) -> Result<()> {
        if self.config.test_mode() {
            debug!("pvoutput payload (not sent): {} {:?}", endpoint, payload);
            return Ok(());
        }

        let pv = self.config.pvoutput();
        let url = format!("{}/{}", pv.base_url().trim_end_matches('/'), endpoint);

        let mut attempts = 0;
        let mut succeeded = false;

        while attempts < MAX_ATTEMPTS && !succeeded {
            attempts += 1;

            match self
                .client
                .post(&url)
                .header("X-Pvoutput-Apikey", pv.api_key())
                .header("X-Pvoutput-SystemId", pv.system_id())
                .header("X-Rate-Limit", "1")
                .form(payload)
                .send()
                .await
            {
                Ok(response) => {
                    let limits = RateLimitSnapshot::from_response(&response);
                    limits.warn_if_low(epoch_now());

                    let status = response.status();
                    if status.is_success() {
                        succeeded = true;
                    } else if status == reqwest::StatusCode::FORBIDDEN {
                        let backoff = limits.backoff_until_reset(epoch_now());
                        warn!(
                            "pvoutput HTTP {}: rate limit exceeded, retrying in {}s",
                            status.as_u16(),
                            backoff.as_secs()
                        );
                        pause(backoff).await;
                    } else {
                        error!(
                            "pvoutput HTTP {} (attempt {}/{})",
                            status.as_u16(),
                            attempts,
                            MAX_ATTEMPTS
                        );
                        pause(Duration::from_secs(RETRY_DELAY_SECS)).await;
                    }
                }
                Err(err) => {
                    if err.is_timeout() {
                        error!(
                            "pvoutput timeout (attempt {}/{}): {}",
                            attempts, MAX_ATTEMPTS, err
                        );
                    } else {
                        error!(
                            "pvoutput request error (attempt {}/{}): {}",
                            attempts, MAX_ATTEMPTS, err
                        );
                    }
                    pause(Duration::from_secs(RETRY_DELAY_SECS)).await;
                }
            }
        }

        if !succeeded {
            bail!("pvoutput {} failed after {} attempts", endpoint, MAX_ATTEMPTS);
        }

        Ok(())
    }
}
