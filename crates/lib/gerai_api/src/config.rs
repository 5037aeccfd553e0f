//! API server configuration.

use gerai_core::auth::AuthError;
use gerai_core::auth::keys::{Environment, TokenKeys};

/// Bootstrap (one-time admin setup) secrets.
///
/// All optional: requests against the setup route fail with a 500 until
/// they are configured, and the rest of the API is unaffected.
#[derive(Clone, Debug)]
pub struct SetupConfig {
    /// Shared secret expected in the `x-setup-key` header.
    pub setup_key: Option<String>,
    /// HS256 secret the `x-setup-jws` token is verified against.
    pub setup_jwt_secret: Option<String>,
    /// The only email allowed to become the admin.
    pub admin_email: Option<String>,
}

impl SetupConfig {
    fn from_env() -> Self {
        Self {
            setup_key: non_empty_var("ADMIN_SETUP_KEY"),
            setup_jwt_secret: non_empty_var("SETUP_JWT_SECRET"),
            admin_email: non_empty_var("ADMIN_EMAIL"),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3400").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Deployment environment; controls cookie `Secure` flags and
    /// whether missing secrets are fatal.
    pub environment: Environment,
    /// Key material for the token codec and the access-grant cookie.
    pub keys: TokenKeys,
    /// Bootstrap secrets.
    pub setup: SetupConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable             | Default                                  |
    /// |----------------------|------------------------------------------|
    /// | `BIND_ADDR`          | `127.0.0.1:3400`                         |
    /// | `DATABASE_URL`       | `postgres://localhost:5432/gerai`        |
    /// | `APP_ENV`            | development                              |
    /// | `JWT_SIGN_SECRET`    | dev fallback (required in production)    |
    /// | `JWT_ENC_KEY_B64`    | dev fallback (required in production)    |
    /// | `ACCESS_SIGN_SECRET` | `JWT_SIGN_SECRET`                        |
    /// | `ADMIN_SETUP_KEY`    | unset — setup route answers 500          |
    /// | `SETUP_JWT_SECRET`   | unset — setup route answers 500          |
    /// | `ADMIN_EMAIL`        | unset — setup route answers 500          |
    ///
    /// Fails when production key requirements are not met.
    pub fn from_env() -> Result<Self, AuthError> {
        let environment = Environment::from_env();
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3400".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/gerai".into()),
            environment,
            keys: TokenKeys::from_env(environment)?,
            setup: SetupConfig::from_env(),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
