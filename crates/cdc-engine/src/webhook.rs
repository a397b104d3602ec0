use std::time::Duration;

use cdc_protocol::WebhookEnvelope;
use rand::Rng;

const MAX_ATTEMPTS: u32 = 3;
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);
const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);
const JITTER_MAX_MS: u64 = 250;

pub struct WebhookDispatcher {
    http: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// POSTs `envelope` to `url`, retrying up to 3 times total with
    /// exponentially backed-off, jittered delays between attempts. Returns
    /// the last observed HTTP status, or 0 if every attempt raised before
    /// getting a response. Any 2xx status is success.
    pub async fn post(&self, url: &str, envelope: &WebhookEnvelope) -> u16 {
        let mut delay = INITIAL_DELAY;
        let mut last_status: u16 = 0;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.http.post(url).timeout(ATTEMPT_TIMEOUT).json(envelope).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    last_status = status;
                    if (200..300).contains(&status) {
                        return status;
                    }
                }
                Err(err) => {
                    tracing::warn!(url, attempt, %err, "webhook attempt failed");
                }
            }

            if attempt < MAX_ATTEMPTS {
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=JITTER_MAX_MS));
                tokio::time::sleep(delay + jitter).await;
                delay = std::cmp::min(delay * 2, MAX_DELAY);
            }
        }

        last_status
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
