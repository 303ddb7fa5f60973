use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub gemini_api_key: SecretString,
    pub gemini_endpoint: String,
    pub gemini_model: String,
    pub handshake_timeout: Duration,
    /// `None` disables the idle timeout.
    pub idle_timeout: Option<Duration>,
    pub prompts_path: PathBuf,
    pub twilio_account_sid: String,
    pub twilio_auth_token: SecretString,
    pub twilio_from: String,
    pub twilio_content_sid: String,
    pub azure_speech_key: SecretString,
    pub azure_speech_region: String,
    pub tts_output_dir: PathBuf,
    pub log_level: Level,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn seconds(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a whole number of seconds", raw),
            )
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:8000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = required("DATABASE_URL")?;
        let gemini_api_key = SecretString::from(required("GEMINI_API_KEY")?);
        let gemini_endpoint = or_default("GEMINI_ENDPOINT", gemini_live::DEFAULT_ENDPOINT);
        let gemini_model = or_default("GEMINI_MODEL", gemini_live::DEFAULT_MODEL);

        let handshake_secs = seconds(
            "GEMINI_HANDSHAKE_TIMEOUT_SECS",
            gemini_live::DEFAULT_HANDSHAKE_TIMEOUT.as_secs(),
        )?;
        if handshake_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "GEMINI_HANDSHAKE_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let idle_secs = seconds("SESSION_IDLE_TIMEOUT_SECS", 300)?;
        let idle_timeout = (idle_secs > 0).then(|| Duration::from_secs(idle_secs));

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let twilio_account_sid = required("TWILIO_ACCOUNT_SID")?;
        let twilio_auth_token = SecretString::from(required("TWILIO_AUTH_TOKEN")?);
        let twilio_from = required("TWILIO_PHONE_NUMBER")?;
        let twilio_content_sid =
            or_default("TWILIO_CONTENT_SID", vaani_core::sms::DEFAULT_OTP_CONTENT_SID);

        let azure_speech_key = SecretString::from(required("AZURE_SPEECH_KEY")?);
        let azure_speech_region = required("AZURE_SERVICE_REGION")?;
        let tts_output_dir = std::env::var("TTS_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("vaani-tts"));

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            database_url,
            gemini_api_key,
            gemini_endpoint,
            gemini_model,
            handshake_timeout: Duration::from_secs(handshake_secs),
            idle_timeout,
            prompts_path,
            twilio_account_sid,
            twilio_auth_token,
            twilio_from,
            twilio_content_sid,
            azure_speech_key,
            azure_speech_region,
            tts_output_dir,
            log_level,
        })
    }
}
