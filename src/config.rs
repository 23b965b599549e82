use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
}

/// JWT signing material and token lifetime.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

/// Payment gateway selection. `Sandbox` keeps everything in-process and is
/// what local development and the integration tests run against.
#[derive(Debug, Clone)]
pub enum GatewayConfig {
    Braintree {
        base_url: String,
        public_key: String,
        private_key: String,
    },
    Sandbox,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let jwt_secret = env::var("JWT_SECRET")?;
        let token_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(24);

        let gateway = match env::var("PAYMENT_GATEWAY").as_deref() {
            Ok("braintree") => GatewayConfig::Braintree {
                base_url: env::var("BRAINTREE_BASE_URL")?,
                public_key: env::var("BRAINTREE_PUBLIC_KEY")?,
                private_key: env::var("BRAINTREE_PRIVATE_KEY")?,
            },
            _ => GatewayConfig::Sandbox,
        };

        Ok(Self {
            port,
            database_url,
            host,
            auth: AuthConfig {
                jwt_secret,
                token_ttl_hours,
            },
            gateway,
        })
    }
}
