use std::{fmt, str::FromStr};

use serde::Deserialize;

/// Hosting environment of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behavioural switches of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaOptions {
    pub environment: Environment,
    /// Send 404/301/307 outcomes as 200 and leave the real code in the body.
    pub overwrite_status_codes: bool,
}

impl Default for SpaOptions {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            overwrite_status_codes: true,
        }
    }
}

impl From<&crate::config::SpaSettings> for SpaOptions {
    fn from(settings: &crate::config::SpaSettings) -> Self {
        Self {
            environment: settings.environment,
            overwrite_status_codes: settings.overwrite_status_codes,
        }
    }
}
