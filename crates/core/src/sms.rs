//! OTP delivery over WhatsApp through the Twilio Messages API.

use crate::registration::{OtpSender, mask_phone};
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
/// Approved WhatsApp template whose single variable is the OTP.
pub const DEFAULT_OTP_CONTENT_SID: &str = "HX229f5a04fd0510ce1b071852155d3e75";

pub struct TwilioWhatsApp {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: SecretString,
    from: String,
    content_sid: String,
    country_code: String,
}

impl TwilioWhatsApp {
    /// # Arguments
    ///
    /// * `from` - The sender, as configured in Twilio (e.g. `whatsapp:+14155238886`).
    pub fn new(account_sid: String, auth_token: SecretString, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_TWILIO_API_BASE.to_string(),
            account_sid,
            auth_token,
            from,
            content_sid: DEFAULT_OTP_CONTENT_SID.to_string(),
            country_code: "+91".to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_content_sid(mut self, content_sid: impl Into<String>) -> Self {
        self.content_sid = content_sid.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[async_trait]
impl OtpSender for TwilioWhatsApp {
    async fn send_otp(&self, phone: &str, otp: u32) -> Result<()> {
        let to = format!("whatsapp:{}{}", self.country_code, phone);
        let variables = serde_json::json!({ "1": otp.to_string() }).to_string();
        let form = [
            ("To", to.as_str()),
            ("From", self.from.as_str()),
            ("ContentSid", self.content_sid.as_str()),
            ("ContentVariables", variables.as_str()),
        ];

        self.client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await
            .context("Twilio request failed")?
            .error_for_status()
            .context("Twilio rejected the message")?;

        debug!(phone = %mask_phone(phone), "Twilio accepted OTP message.");
        Ok(())
    }
}
