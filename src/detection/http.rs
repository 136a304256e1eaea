use super::{Predictor, types::*};
use crate::{config::Config, intake::SelectedImage};
use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::{Client, Response, multipart};
use std::time::Duration;
use tracing::debug;

/// Talks to the prediction service over HTTP: one multipart upload per
/// `predict`, no retries.
pub struct HttpPredictor {
    client: Client,
    predict_url: String,
    health_url: String,
    field_name: String,
}

impl HttpPredictor {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if cfg.service.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(cfg.service.timeout_seconds));
        }
        if is_loopback(&cfg.service.base_url) {
            builder = builder.no_proxy();
        }
        let client = builder.build().with_context(|| "building HTTP client")?;
        Ok(Self {
            client,
            predict_url: cfg.service.predict_url(),
            health_url: cfg.service.health_url(),
            field_name: cfg.service.field_name.clone(),
        })
    }
}

fn is_loopback(base_url: &str) -> bool {
    let Ok(url) = Url::parse(base_url) else {
        return false;
    };
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}

fn check_status(resp: Response, url: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let body = body.trim();
    Err(anyhow!(
        "{url} returned {status}: {}",
        if body.is_empty() { "server error" } else { body }
    ))
}

impl Predictor for HttpPredictor {
    fn endpoint(&self) -> String {
        self.predict_url.clone()
    }

    fn health(&self) -> Result<ServiceHealth> {
        debug!("GET {}", self.health_url);
        let resp = self
            .client
            .get(&self.health_url)
            .send()
            .with_context(|| format!("requesting {}", self.health_url))?;
        let resp = check_status(resp, &self.health_url)?;
        resp.json::<ServiceHealth>()
            .with_context(|| format!("parsing health JSON from {}", self.health_url))
    }

    fn predict(&self, image: &SelectedImage) -> Result<PredictResponse> {
        debug!(
            "POST {} field={} file={} bytes={}",
            self.predict_url,
            self.field_name,
            image.file_name,
            image.bytes.len()
        );
        let part = multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)
            .with_context(|| format!("invalid mime type: {}", image.mime))?;
        let form = multipart::Form::new().part(self.field_name.clone(), part);

        let resp = self
            .client
            .post(&self.predict_url)
            .multipart(form)
            .send()
            .with_context(|| format!("requesting {}", self.predict_url))?;
        let resp = check_status(resp, &self.predict_url)?;
        resp.json::<PredictResponse>()
            .with_context(|| format!("parsing prediction JSON from {}", self.predict_url))
    }
}
