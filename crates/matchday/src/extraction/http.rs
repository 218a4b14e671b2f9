//! `MatchSource` over the public match-data HTTP API.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::index::MatchRecord;

use super::error::{FetchError, HttpErrorClass};
use super::source::{MatchSource, RawFile, RawMatch};

struct Endpoint {
    name: &'static str,
    file: &'static str,
    suffix: &'static str,
    required: bool,
}

const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        name: "event",
        file: "event.json",
        suffix: "",
        required: true,
    },
    Endpoint {
        name: "lineups",
        file: "lineups.json",
        suffix: "/lineups",
        required: true,
    },
    Endpoint {
        name: "statistics",
        file: "statistics.json",
        suffix: "/statistics",
        required: false,
    },
    Endpoint {
        name: "incidents",
        file: "incidents.json",
        suffix: "/incidents",
        required: false,
    },
];

pub struct HttpMatchSource {
    client: Client,
    api_base: String,
}

impl HttpMatchSource {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("matchday/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::new(HttpErrorClass::Network, "client", e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, match_id: u64, endpoint: &Endpoint) -> String {
        format!("{}/event/{}{}", self.api_base, match_id, endpoint.suffix)
    }

    fn get_json(&self, url: &str, endpoint: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().map_err(|e| {
            let class = if e.is_timeout() {
                HttpErrorClass::Timeout
            } else {
                HttpErrorClass::Network
            };
            FetchError::new(class, endpoint, e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .map_err(|e| FetchError::new(HttpErrorClass::Network, endpoint, e.to_string()))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(FetchError::new(
                HttpErrorClass::from_status(status.as_u16(), &text),
                endpoint,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        serde_json::from_slice::<serde_json::Value>(&body)
            .map_err(|e| FetchError::new(HttpErrorClass::Decode, endpoint, e.to_string()))?;
        Ok(body.to_vec())
    }
}

impl MatchSource for HttpMatchSource {
    fn fetch(&mut self, record: &MatchRecord) -> Result<RawMatch, FetchError> {
        let mut raw = RawMatch::default();
        for endpoint in ENDPOINTS {
            let url = self.url(record.match_id, endpoint);
            match self.get_json(&url, endpoint.name) {
                Ok(bytes) => raw.files.push(RawFile::new(endpoint.file, bytes)),
                Err(err) if endpoint.required => return Err(err),
                Err(err) => {
                    debug!(match_id = record.match_id, error = %err, "Optional endpoint unavailable");
                    raw.missing_optional.push(endpoint.name.to_string());
                }
            }
        }
        Ok(raw)
    }
}
