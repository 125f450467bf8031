use clap::Parser;
use serde::Deserialize;
use std::env;

use handle_errors::Error;

/// 명령줄 인자. 주어진 값은 설정 파일과 환경 변수보다 우선한다.
#[derive(Parser, Debug, Default, Clone, PartialEq)]
#[clap(author, version, about)]
pub struct Args {
    /// 설정 파일 경로
    #[clap(short, long, default_value = "setup.toml")]
    pub config: String,
    /// 로그 수준 (error, warn, info, debug, trace)
    #[clap(short, long)]
    pub log_level: Option<String>,
    /// 웹 서버 포트
    #[clap(short, long)]
    pub port: Option<u16>,
    #[clap(long)]
    pub database_user: Option<String>,
    #[clap(long)]
    pub database_password: Option<String>,
    #[clap(long)]
    pub database_host: Option<String>,
    #[clap(long)]
    pub database_port: Option<u16>,
    #[clap(long)]
    pub database_name: Option<String>,
    #[clap(long)]
    pub max_connections: Option<u32>,
    #[clap(long)]
    pub page_size: Option<u32>,
    /// 읽은 알림을 보관하는 일 수. 0이면 지우지 않는다.
    #[clap(long)]
    pub notification_retention_days: Option<u32>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: String,
    pub port: u16,
    pub database_user: String,
    pub database_password: String,
    pub database_host: String,
    pub database_port: u16,
    pub database_name: String,
    pub max_connections: u32,
    pub page_size: u32,
    pub notification_retention_days: u32,
    #[serde(default)]
    pub paseto_key: String,
}

fn config_error(error: config::ConfigError) -> Error {
    Error::Configuration(error.to_string())
}

fn parse_port(value: &str) -> Result<i64, Error> {
    value
        .trim()
        .parse::<u16>()
        .map(i64::from)
        .map_err(Error::ParseError)
}

impl Config {
    /// .env, 설정 파일, 환경 변수, 명령줄 인자 순서로 읽는다.
    pub fn new() -> Result<Config, Error> {
        dotenv::dotenv().ok();
        let args = Args::parse();
        let file = config::File::with_name(&args.config).required(false);
        Config::load(file, &args, |key| env::var(key).ok())
    }

    fn load<S>(file: S, args: &Args, env: impl Fn(&str) -> Option<String>) -> Result<Config, Error>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let mut builder = config::Config::builder()
            .set_default("log_level", "info")
            .and_then(|b| b.set_default("port", 8080))
            .and_then(|b| b.set_default("database_user", "postgres"))
            .and_then(|b| b.set_default("database_password", ""))
            .and_then(|b| b.set_default("database_host", "localhost"))
            .and_then(|b| b.set_default("database_port", 5432))
            .and_then(|b| b.set_default("database_name", "stackit"))
            .and_then(|b| b.set_default("max_connections", 5))
            .and_then(|b| b.set_default("page_size", 10))
            .and_then(|b| b.set_default("notification_retention_days", 30))
            .map_err(config_error)?
            .add_source(file);

        // 환경 변수
        let string_overrides = [
            ("database_user", "POSTGRES_USER"),
            ("database_password", "POSTGRES_PASSWORD"),
            ("database_host", "POSTGRES_HOST"),
            ("database_name", "POSTGRES_DB"),
            ("paseto_key", "PASETO_KEY"),
        ];
        for (key, var) in string_overrides {
            if let Some(value) = env(var) {
                builder = builder.set_override(key, value).map_err(config_error)?;
            }
        }
        for (key, var) in [("port", "PORT"), ("database_port", "POSTGRES_PORT")] {
            if let Some(value) = env(var) {
                builder = builder
                    .set_override(key, parse_port(&value)?)
                    .map_err(config_error)?;
            }
        }

        // 명령줄 인자
        let cli: [(&str, Option<config::Value>); 10] = [
            ("log_level", args.log_level.clone().map(Into::into)),
            ("port", args.port.map(|v| i64::from(v).into())),
            ("database_user", args.database_user.clone().map(Into::into)),
            ("database_password", args.database_password.clone().map(Into::into)),
            ("database_host", args.database_host.clone().map(Into::into)),
            ("database_port", args.database_port.map(|v| i64::from(v).into())),
            ("database_name", args.database_name.clone().map(Into::into)),
            ("max_connections", args.max_connections.map(|v| i64::from(v).into())),
            ("page_size", args.page_size.map(|v| i64::from(v).into())),
            (
                "notification_retention_days",
                args.notification_retention_days.map(|v| i64::from(v).into()),
            ),
        ];
        for (key, value) in cli {
            if let Some(value) = value {
                builder = builder.set_override(key, value).map_err(config_error)?;
            }
        }

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        config.validate()
    }

    fn validate(self) -> Result<Config, Error> {
        if self.paseto_key.len() != 32 {
            return Err(Error::Configuration(
                "PASETO_KEY must be set to exactly 32 bytes".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(Error::Configuration(
                "page_size must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database_user,
            self.database_password,
            self.database_host,
            self.database_port,
            self.database_name
        )
    }

    /// RUST_LOG가 없을 때 쓰는 로그 필터
    pub fn log_filter(&self) -> String {
        format!(
            "handle_errors={},stackit={},warp={}",
            self.log_level, self.log_level, self.log_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "RANDOM WORDS WINTER MACINTOSH PC";

    fn toml(source: &str) -> config::File<config::FileSourceString, config::FileFormat> {
        config::File::from_str(source, config::FileFormat::Toml)
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_file_is_empty() {
        let config = Config::load(toml(""), &Args::default(), env_of(&[("PASETO_KEY", KEY)])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.notification_retention_days, 30);
        assert_eq!(
            config.database_url(),
            "postgres://postgres:@localhost:5432/stackit"
        );
    }

    #[test]
    fn env_overrides_file_and_args_override_env() {
        let file = toml(
            r#"
            log_level = "warn"
            port = 3030
            database_host = "db"
            page_size = 20
            "#,
        );
        let env = env_of(&[("PASETO_KEY", KEY), ("PORT", "4000"), ("POSTGRES_HOST", "pg")]);
        let args = Args {
            page_size: Some(5),
            ..Args::default()
        };

        let config = Config::load(file, &args, env).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.port, 4000);
        assert_eq!(config.database_host, "pg");
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn bad_port_is_a_parse_error() {
        let env = env_of(&[("PASETO_KEY", KEY), ("PORT", "eighty")]);
        assert!(matches!(
            Config::load(toml(""), &Args::default(), env),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn paseto_key_is_mandatory() {
        assert!(matches!(
            Config::load(toml(""), &Args::default(), env_of(&[])),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Config::load(toml(""), &Args::default(), env_of(&[("PASETO_KEY", "short")])),
            Err(Error::Configuration(_))
        ));
    }
}
