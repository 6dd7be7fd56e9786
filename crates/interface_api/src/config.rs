//! API configuration

use serde::{Deserialize, Serialize};

use infra_db::DatabaseConfig;
use infra_gateways::{GatewayError, MpesaConfig, MpesaEnvironment, PaystackConfig};

/// API configuration
///
/// Every key can be set through an `API_`-prefixed environment variable
/// (`API_PORT`, `API_MPESA_SHORTCODE`, ...). Missing keys keep their default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub jwt_expiration_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_expiration_secs: u64,
    /// Log level
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
    pub mpesa_environment: String,
    pub mpesa_consumer_key: String,
    pub mpesa_consumer_secret: String,
    pub mpesa_shortcode: String,
    pub mpesa_passkey: String,
    pub mpesa_callback_url: String,
    pub mpesa_callback_secret: Option<String>,
    pub mpesa_api_url: Option<String>,
    pub paystack_secret_key: String,
    pub paystack_api_url: Option<String>,
    /// Where Paystack sends the customer after checkout
    pub paystack_callback_url: Option<String>,
    /// Prefix joined with a document's storage key to form its download URL
    pub media_url_prefix: String,
    pub password_reset_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/insurance".to_string(),
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            refresh_expiration_secs: 7 * 24 * 3600,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            mpesa_environment: "sandbox".to_string(),
            mpesa_consumer_key: String::new(),
            mpesa_consumer_secret: String::new(),
            mpesa_shortcode: String::new(),
            mpesa_passkey: String::new(),
            mpesa_callback_url: String::new(),
            mpesa_callback_secret: None,
            mpesa_api_url: None,
            paystack_secret_key: String::new(),
            paystack_api_url: None,
            paystack_callback_url: None,
            media_url_prefix: "/media/".to_string(),
            password_reset_ttl_secs: 3600,
        }
    }
}

/// Effective configuration with every secret left out
#[derive(Debug, Clone, Serialize)]
pub struct PublicSettings {
    pub host: String,
    pub port: u16,
    pub jwt_expiration_secs: u64,
    pub refresh_expiration_secs: u64,
    pub log_level: String,
    pub log_format: String,
    pub mpesa_environment: String,
    pub mpesa_shortcode: String,
    pub mpesa_callback_url: String,
    pub mpesa_configured: bool,
    pub paystack_configured: bool,
    pub media_url_prefix: String,
    pub password_reset_ttl_secs: u64,
    pub currency: &'static str,
    pub timezone: &'static str,
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database_url)
    }

    pub fn mpesa(&self) -> Result<MpesaConfig, GatewayError> {
        Ok(MpesaConfig {
            environment: self.mpesa_environment.parse::<MpesaEnvironment>()?,
            consumer_key: self.mpesa_consumer_key.clone(),
            consumer_secret: self.mpesa_consumer_secret.clone(),
            shortcode: self.mpesa_shortcode.clone(),
            passkey: self.mpesa_passkey.clone(),
            callback_url: self.mpesa_callback_url.clone(),
            callback_secret: self.mpesa_callback_secret.clone().filter(|s| !s.is_empty()),
            api_url: self.mpesa_api_url.clone(),
        })
    }

    pub fn paystack(&self) -> PaystackConfig {
        PaystackConfig {
            secret_key: self.paystack_secret_key.clone(),
            api_url: self.paystack_api_url.clone(),
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    pub fn public_settings(&self) -> PublicSettings {
        PublicSettings {
            host: self.host.clone(),
            port: self.port,
            jwt_expiration_secs: self.jwt_expiration_secs,
            refresh_expiration_secs: self.refresh_expiration_secs,
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            mpesa_environment: self.mpesa_environment.clone(),
            mpesa_shortcode: self.mpesa_shortcode.clone(),
            mpesa_callback_url: self.mpesa_callback_url.clone(),
            mpesa_configured: !self.mpesa_consumer_key.is_empty() && !self.mpesa_shortcode.is_empty(),
            paystack_configured: !self.paystack_secret_key.is_empty(),
            media_url_prefix: self.media_url_prefix.clone(),
            password_reset_ttl_secs: self.password_reset_ttl_secs,
            currency: "KES",
            timezone: "Africa/Nairobi",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.refresh_expiration_secs, 604_800);
        assert_eq!(config.media_url_prefix, "/media/");
        assert!(!config.json_logs());
    }

    #[test]
    fn test_mpesa_environment_is_parsed() {
        let config = ApiConfig {
            mpesa_environment: "Production".into(),
            mpesa_callback_secret: Some(String::new()),
            ..Default::default()
        };
        let mpesa = config.mpesa().unwrap();
        assert_eq!(mpesa.environment, MpesaEnvironment::Production);
        assert!(mpesa.callback_secret.is_none());

        let bad = ApiConfig { mpesa_environment: "staging".into(), ..Default::default() };
        assert!(bad.mpesa().is_err());
    }

    #[test]
    fn test_public_settings_hide_secrets() {
        let config = ApiConfig {
            jwt_secret: "super-secret".into(),
            paystack_secret_key: "sk_test_abc".into(),
            mpesa_passkey: "passkey".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&config.public_settings()).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(!json.contains("sk_test_abc"));
        assert!(!json.contains("passkey\""));
        assert!(json.contains("\"paystack_configured\":true"));
    }
}
