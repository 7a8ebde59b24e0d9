use core_config::{AppInfo, FromEnv, app_info, server::ServerConfig};
use database::mongodb::MongoConfig;

pub use core_config::Environment;

/// Application configuration composed from the shared config components
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub mongodb: MongoConfig,
    pub server: ServerConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let app = app_info!();
        let mongodb = MongoConfig::from_env()?.with_app_name(app.name);
        let server = ServerConfig::from_env()?;

        Ok(Self {
            app,
            mongodb,
            server,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("APP_ENV", Some("production")),
                ("MONGODB_URL", Some("mongodb://db:27017")),
                ("MONGODB_DATABASE", Some("users")),
                ("PORT", Some("9090")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.environment.is_production());
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.mongodb.database(), "users");
                assert_eq!(config.mongodb.app_name.as_deref(), Some("users_api"));
                assert_eq!(config.app.name, "users_api");
            },
        );
    }

    #[test]
    fn test_from_env_requires_mongodb_url() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", None::<&str>),
                ("MONGO_URL", None::<&str>),
                ("MONGODB_DATABASE", Some("users")),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }
}
