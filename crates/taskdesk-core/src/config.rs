//! Config - TOML 設定
//!
//! すべての項目に serde の既定値があるので、空ファイルでも動く。
//! 読み込み後に環境変数 `BATCH_SIZE` で `reminder.batch_size` を上書きできる。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::{
    ASSIGNMENT_SUBJECT, DEFAULT_MAX_ATTEMPTS, REMINDER_SUBJECT, ReminderTemplate, Schedule,
};

pub const BATCH_SIZE_ENV: &str = "BATCH_SIZE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminder: ReminderConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Reminder records per published message.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default)]
    pub schedule: Schedule,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            topic: default_topic(),
            schedule: Schedule::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_assignment_subject")]
    pub assignment_subject: String,

    #[serde(default = "default_reminder_subject")]
    pub reminder_subject: String,

    /// HTML body with `{taskName}` / `{dueDate}` placeholders.
    #[serde(default)]
    pub reminder_template_path: Option<PathBuf>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            assignment_subject: default_assignment_subject(),
            reminder_subject: default_reminder_subject(),
            reminder_template_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Deliveries of an unreadable payload before it is discarded.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_topic() -> String {
    "task-reminders".to_string()
}

fn default_assignment_subject() -> String {
    ASSIGNMENT_SUBJECT.to_string()
}

fn default_reminder_subject() -> String {
    REMINDER_SUBJECT.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Parse and validate, without environment overrides.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` (defaults when it does not exist), then apply the
    /// environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content)?
        } else {
            tracing::debug!(path = %path.display(), "config file not found; using defaults");
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment, for runs without a config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(BATCH_SIZE_ENV) {
            self.reminder.batch_size = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{BATCH_SIZE_ENV} must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reminder.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "reminder.batch_size must be at least 1".to_string(),
            ));
        }
        if let Schedule::Every(interval) = self.reminder.schedule
            && interval.is_zero()
        {
            return Err(ConfigError::Invalid(
                "reminder.schedule interval must be at least 1 second".to_string(),
            ));
        }
        if self.reminder.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("reminder.topic cannot be empty".to_string()));
        }
        if self.dispatcher.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reminder_template(&self) -> Result<ReminderTemplate, ConfigError> {
        match &self.mail.reminder_template_path {
            Some(path) => ReminderTemplate::load(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            }),
            None => Ok(ReminderTemplate::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reminder.batch_size, 100);
        assert_eq!(
            config.reminder.schedule,
            Schedule::DailyAt(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
        );
        assert_eq!(config.mail.reminder_subject, "Task Due Tomorrow");
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml(
            r#"
            [reminder]
            batch_size = 25
            topic = "due-soon"
            schedule = { every = 300 }

            [mail]
            assignment_subject = "New task"
            "#,
        )
        .unwrap();
        assert_eq!(config.reminder.batch_size, 25);
        assert_eq!(config.reminder.topic, "due-soon");
        assert_eq!(config.reminder.schedule, Schedule::Every(Duration::from_secs(300)));
        assert_eq!(config.mail.assignment_subject, "New task");
        assert_eq!(config.mail.reminder_subject, "Task Due Tomorrow");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_toml("[reminder]\nbatch_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[reminder]\ntopic = \"  \""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[reminder]\nschedule = { every = 0 }"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[dispatcher]\nmax_attempts = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[reminder\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn batch_size_env_overrides_file() {
        let mut config = Config::from_toml("[reminder]\nbatch_size = 10").unwrap();
        config
            .apply_env(|key| (key == BATCH_SIZE_ENV).then(|| "42".to_string()))
            .unwrap();
        assert_eq!(config.reminder.batch_size, 42);

        let err = config
            .apply_env(|_| Some("lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("BATCH_SIZE"));
    }

    #[test]
    fn load_reads_file_and_template() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("reminder.html");
        std::fs::write(&template_path, "<p>{taskName}</p>").unwrap();

        let config_path = dir.path().join("taskdesk.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "[mail]").unwrap();
        let template_path = template_path.display().to_string();
        writeln!(file, "reminder_template_path = {template_path:?}").unwrap();
        drop(file);

        let config = Config::load(&config_path).unwrap();
        let template = config.reminder_template().unwrap();
        assert_eq!(template, ReminderTemplate::new("<p>{taskName}</p>"));
    }

    #[test]
    fn missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.reminder.topic, "task-reminders");
    }

    #[test]
    fn missing_template_file_is_an_error() {
        let mut config = Config::default();
        config.mail.reminder_template_path = Some(PathBuf::from("/definitely/not/here.html"));
        assert!(matches!(config.reminder_template(), Err(ConfigError::Io { .. })));
    }
}
