//! Optional config file loading. Search order: ./bookworm.toml, then
//! $XDG_CONFIG_HOME/bookworm/config.toml (or ~/.config/bookworm/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// HTTP User-Agent header for the cheap fetcher.
    pub user_agent: Option<String>,
    /// Delay in seconds before each page fetch.
    pub request_delay_secs: Option<u64>,
    /// HTTP request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Headless browser navigation timeout in seconds.
    pub render_timeout_secs: Option<u64>,
    /// Milliseconds to wait after navigation before capturing the page.
    pub render_settle_ms: Option<u64>,
    /// Checkpoint file. Relative paths are resolved against the working directory.
    pub checkpoint_path: Option<PathBuf>,
    /// Chrome or Chromium binary. Auto-detected when unset.
    pub browser_path: Option<PathBuf>,
}

fn parse_config(s: &str, path: &std::path::Path) -> Result<Config, String> {
    toml::from_str(s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}

/// Search order: (1) ./bookworm.toml, (2) $XDG_CONFIG_HOME/bookworm/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("bookworm.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("bookworm").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config = parse_config(&s, path)?;
            tracing::debug!(path = %path.display(), "Loaded config");
            return Ok(Some(config));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parse_empty_config() {
        let c: Config = toml::from_str("").unwrap();
        assert!(c.user_agent.is_none());
        assert!(c.request_delay_secs.is_none());
        assert!(c.timeout_secs.is_none());
        assert!(c.render_timeout_secs.is_none());
        assert!(c.render_settle_ms.is_none());
        assert!(c.checkpoint_path.is_none());
        assert!(c.browser_path.is_none());
    }

    #[test]
    fn parse_full_config() {
        let s = r#"
            user_agent = "Custom/1.0"
            request_delay_secs = 5
            timeout_secs = 60
            render_timeout_secs = 90
            render_settle_ms = 2500
            checkpoint_path = "state/cp.txt"
            browser_path = "/usr/bin/chromium"
        "#;
        let c: Config = toml::from_str(s).unwrap();
        assert_eq!(c.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(c.request_delay_secs, Some(5));
        assert_eq!(c.timeout_secs, Some(60));
        assert_eq!(c.render_timeout_secs, Some(90));
        assert_eq!(c.render_settle_ms, Some(2500));
        assert_eq!(c.checkpoint_path.as_deref(), Some(Path::new("state/cp.txt")));
        assert_eq!(c.browser_path.as_deref(), Some(Path::new("/usr/bin/chromium")));
    }

    #[test]
    fn parse_partial_config() {
        let c: Config = toml::from_str("request_delay_secs = 0").unwrap();
        assert_eq!(c.request_delay_secs, Some(0));
        assert!(c.user_agent.is_none());
        assert!(c.checkpoint_path.is_none());
    }

    #[test]
    fn invalid_toml_reports_path() {
        let err = parse_config("timeout_secs = [", Path::new("bookworm.toml")).unwrap_err();
        assert!(err.starts_with("Invalid config bookworm.toml"));
    }

    #[test]
    fn wrong_value_type_errors() {
        assert!(toml::from_str::<Config>("timeout_secs = \"soon\"").is_err());
    }
}
