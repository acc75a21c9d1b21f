use std::time::Duration;

use reqwest::Url;

use nlsub_client_core::settings::{ClientSettings, Speed};
use nlsub_client_engine::ControllerConfig;

use crate::cli::{Cli, DEFAULT_BACKEND_URL};

/// Effective client options after merging flags/env over the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub backend_url: Url,
    pub poll_interval: Duration,
    pub default_speed: Option<Speed>,
}

impl Options {
    pub fn resolve(cli: &Cli, settings: &ClientSettings) -> anyhow::Result<Self> {
        let backend_url = match (&cli.backend_url, settings.backend_url.as_deref()) {
            (Some(url), _) => url.clone(),
            (None, Some(raw)) => Url::parse(raw)
                .map_err(|err| anyhow::anyhow!("invalid backend_url in settings ({raw:?}): {err}"))?,
            (None, None) => Url::parse(DEFAULT_BACKEND_URL)?,
        };
        let poll_interval = cli
            .poll_interval_ms
            .or(settings.poll_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(ControllerConfig::DEFAULT_POLL_INTERVAL);
        Ok(Self {
            backend_url,
            poll_interval,
            default_speed: settings.speed,
        })
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let mut cfg = ControllerConfig::new(self.backend_url.clone());
        cfg.poll_interval = self.poll_interval;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["nlsub"];
        argv.extend_from_slice(args);
        argv.push("status");
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_win_over_settings() {
        let settings = ClientSettings {
            backend_url: Some("http://10.0.0.5:8000".to_string()),
            speed: Some(Speed::Slow),
            poll_interval_ms: Some(2_000),
        };
        let opts = Options::resolve(
            &cli(&["--backend-url", "http://localhost:9000", "--poll-interval-ms", "250"]),
            &settings,
        )
        .unwrap();
        assert_eq!(opts.backend_url.as_str(), "http://localhost:9000/");
        assert_eq!(opts.poll_interval, Duration::from_millis(250));
        assert_eq!(opts.default_speed, Some(Speed::Slow));
    }

    #[test]
    fn settings_fill_in_missing_flags() {
        let settings = ClientSettings {
            backend_url: Some("http://10.0.0.5:8000".to_string()),
            speed: None,
            poll_interval_ms: Some(2_000),
        };
        let opts = Options::resolve(&cli(&[]), &settings).unwrap();
        assert_eq!(opts.backend_url.as_str(), "http://10.0.0.5:8000/");
        assert_eq!(opts.controller_config().poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn defaults_apply_without_settings() {
        let opts = Options::resolve(&cli(&[]), &ClientSettings::default()).unwrap();
        assert_eq!(opts.backend_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(opts.poll_interval, ControllerConfig::DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn bad_settings_url_is_reported() {
        let settings = ClientSettings {
            backend_url: Some("not a url".to_string()),
            ..ClientSettings::default()
        };
        assert!(Options::resolve(&cli(&[]), &settings).is_err());
    }
}
