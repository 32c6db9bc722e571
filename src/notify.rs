use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::util::mask_secret;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, Default)]
pub struct NotifyOptions {
    /// Log the message instead of performing the network call.
    pub dry_run: bool,
    /// Enable Markdown rendering on the receiving side.
    pub markdown: bool,
    /// URL opened when the notification is tapped.
    pub click_url: Option<String>,
}

/// Push delivery of one formatted message.
///
/// A single attempt, no retry: delivery is best-effort and the caller
/// decides whether a failure drops the alert or re-arms it.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(
        &self,
        title: &str,
        message: &str,
        opts: &NotifyOptions,
    ) -> Result<(), DeliveryError>;
}

/// ntfy.sh-compatible notifier: POST `{server}/{topic}` with the message
/// body as raw UTF-8 text and metadata in headers.
pub struct NtfyNotifier {
    http: Client,
    server: String,
    topic: String,
}

impl NtfyNotifier {
    pub fn new(server: impl Into<String>, topic: impl Into<String>) -> Result<Self, DeliveryError> {
        let http = Client::builder().timeout(Duration::from_secs(20)).build()?;

        let server: String = server.into();
        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_string(),
            topic: topic.into(),
        })
    }
}

#[async_trait]
impl PushNotifier for NtfyNotifier {
    #[instrument(
        skip(self, message, opts),
        fields(server = %self.server, topic = %mask_secret(&self.topic, 2))
    )]
    async fn notify(
        &self,
        title: &str,
        message: &str,
        opts: &NotifyOptions,
    ) -> Result<(), DeliveryError> {
        if opts.dry_run {
            info!(title, message, "dry run; notification not sent");
            return Ok(());
        }

        let url = format!("{}/{}", self.server, self.topic);

        let mut req = self
            .http
            .post(&url)
            .header("Title", title)
            .header("Priority", "high")
            .body(message.to_string());

        if opts.markdown {
            req = req.header("Markdown", "yes");
        }
        if let Some(click) = &opts.click_url {
            req = req.header("Click", click.as_str());
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(DeliveryError::Rejected(format!(
                "status {}",
                resp.status()
            )));
        }

        debug!(title, "notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_never_touches_the_network() {
        // Port 9 (discard) with a dry run: any attempted connect would fail
        // the test by returning an error.
        let notifier = NtfyNotifier::new("http://127.0.0.1:9", "secret-topic").unwrap();
        let opts = NotifyOptions {
            dry_run: true,
            ..NotifyOptions::default()
        };
        notifier
            .notify("Stock Alert: AAPL", "AAPL +5.0%", &opts)
            .await
            .unwrap();
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let notifier = NtfyNotifier::new("https://ntfy.sh/", "t").unwrap();
        assert_eq!(notifier.server, "https://ntfy.sh");
    }
}
