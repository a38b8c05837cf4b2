use crate::settings::Mail;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    text_content: String,
}

/// Delivers one-time codes through a JSON mail API. With no endpoint
/// configured, messages are logged instead of sent, which is the
/// development default.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    cfg: Mail,
}

impl Mailer {
    pub fn new(cfg: Mail) -> Self {
        Self {
            http: reqwest::Client::new(),
            cfg,
        }
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), MailError> {
        let Some(api_url) = &self.cfg.api_url else {
            tracing::info!(%to, %subject, %text, "mail.api_url not set, logging message instead of sending");
            return Ok(());
        };

        let body = SendEmailBody {
            sender: EmailAddress {
                email: self.cfg.sender.clone(),
            },
            to: vec![EmailAddress {
                email: to.to_string(),
            }],
            subject: subject.to_string(),
            text_content: text.to_string(),
        };

        let mut request = self.http.post(api_url).json(&body);
        if let Some(api_key) = &self.cfg.api_key {
            request = request.header("api-key", api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Api { status, body });
        }

        tracing::debug!(%to, "mail accepted by API");
        Ok(())
    }
}
