use crate::auth::Role;
use crate::error::{Error, Result};
use crate::i18n::Language;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Api {
        base_url: String,
        token: Option<String>,
    },
    Postgres {
        database_url: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: DataSource,
    pub role: Role,
    pub language: Language,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let source = match non_empty("DATA_SOURCE").as_deref().unwrap_or("postgres") {
            "api" => DataSource::Api {
                base_url: non_empty("API_BASE_URL")
                    .ok_or_else(|| Error::config("API_BASE_URL must be set when DATA_SOURCE=api"))?,
                token: non_empty("API_TOKEN"),
            },
            "postgres" | "db" => DataSource::Postgres {
                database_url: non_empty("DATABASE_URL").ok_or_else(|| {
                    Error::config("DATABASE_URL must be set to a production Postgres instance")
                })?,
            },
            other => return Err(Error::config(format!("unknown DATA_SOURCE {other}"))),
        };

        let role = match non_empty("ADMIN_ROLE") {
            Some(value) => Role::parse(&value)
                .ok_or_else(|| Error::config(format!("unknown ADMIN_ROLE {value}")))?,
            None => Role::UniversityAdmin,
        };

        let language = match non_empty("LANGUAGE") {
            Some(value) => Language::parse(&value)
                .ok_or_else(|| Error::config(format!("unsupported LANGUAGE {value}")))?,
            None => Language::English,
        };

        let log_json = non_empty("LOG_FORMAT")
            .map(|value| value.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            source,
            role,
            language,
            log_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_to_postgres() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/program")])).unwrap();
        assert_eq!(
            config.source,
            DataSource::Postgres {
                database_url: "postgres://localhost/program".to_string()
            }
        );
        assert_eq!(config.role, Role::UniversityAdmin);
        assert_eq!(config.language, Language::English);
        assert!(!config.log_json);
    }

    #[test]
    fn api_source_needs_base_url() {
        let err = Config::from_lookup(lookup(&[("DATA_SOURCE", "api")])).unwrap_err();
        assert!(err.to_string().contains("API_BASE_URL"));

        let config = Config::from_lookup(lookup(&[
            ("DATA_SOURCE", "api"),
            ("API_BASE_URL", "https://api.example.org"),
            ("API_TOKEN", "abc"),
            ("ADMIN_ROLE", "lab"),
            ("LANGUAGE", "de"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(
            config.source,
            DataSource::Api {
                base_url: "https://api.example.org".to_string(),
                token: Some("abc".to_string()),
            }
        );
        assert_eq!(config.role, Role::LaboratoryAdmin);
        assert_eq!(config.language, Language::German);
        assert!(config.log_json);
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(Config::from_lookup(lookup(&[("DATA_SOURCE", "sqlite")])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/program"),
            ("ADMIN_ROLE", "root"),
        ]))
        .is_err());
    }
}
