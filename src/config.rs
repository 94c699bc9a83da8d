//! Widget configuration.
//!
//! Resolution order: compiled defaults → `widget.toml` → command-line
//! overrides. Both file and CLI layers are expressed as a [`RawConfig`] whose
//! fields are all optional; [`RawConfig::resolve`] validates the merged result
//! into the immutable [`WidgetConfig`] handed to the controller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::escape::escape_markup;

pub const DEFAULT_TITLE: &str = "مُخَطّط";
pub const DEFAULT_ACCENT_COLOR: &str = "#0f5b3e";
pub const HEADER_SUBTITLE: &str = "المساعد الرقمي الذكي";
pub const DEFAULT_LAUNCHER_ALT: &str = "فتح الدردشة";
pub const DEFAULT_PAGE_URL: &str = "app://mokhatt-widget";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`endpoint` is required")]
    MissingEndpoint,
    #[error("invalid endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ---------------------------------------------------------------------------
// Raw (unvalidated) layer
// ---------------------------------------------------------------------------

/// One configuration layer as written in `widget.toml` or given on the CLI.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawConfig {
    pub endpoint: Option<String>,
    pub title: Option<String>,
    pub primary_color: Option<String>,
    pub position: Option<String>,
    pub welcome_message: Option<String>,
    pub assistant_logo: Option<String>,
    pub page_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub launcher: Option<RawLauncher>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawLauncher {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub src: Option<String>,
    pub alt: Option<String>,
}

impl RawConfig {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: RawConfig) -> RawConfig {
        RawConfig {
            endpoint: other.endpoint.or(self.endpoint),
            title: other.title.or(self.title),
            primary_color: other.primary_color.or(self.primary_color),
            position: other.position.or(self.position),
            welcome_message: other.welcome_message.or(self.welcome_message),
            assistant_logo: other.assistant_logo.or(self.assistant_logo),
            page_url: other.page_url.or(self.page_url),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            launcher: other.launcher.or(self.launcher),
        }
    }

    /// Validate into a [`WidgetConfig`]. Empty strings count as unset.
    pub fn resolve(self) -> Result<WidgetConfig, ConfigError> {
        let endpoint = non_empty(self.endpoint).ok_or(ConfigError::MissingEndpoint)?;
        let endpoint = parse_endpoint(&endpoint)?;

        let position = match self.position.as_deref() {
            Some(p) if p.eq_ignore_ascii_case("left") => Position::Left,
            _ => Position::Right,
        };

        let launcher = match self.launcher {
            Some(RawLauncher {
                kind: Some(kind),
                src: Some(src),
                alt,
            }) if kind == "image" && !src.is_empty() => Launcher::Image {
                src,
                alt: non_empty(alt).unwrap_or_else(|| DEFAULT_LAUNCHER_ALT.to_string()),
            },
            _ => Launcher::Default,
        };

        Ok(WidgetConfig {
            endpoint,
            title: non_empty(self.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            accent_color: non_empty(self.primary_color)
                .unwrap_or_else(|| DEFAULT_ACCENT_COLOR.to_string()),
            position,
            welcome_message: self
                .welcome_message
                .map(|w| w.trim().to_string())
                .unwrap_or_default(),
            launcher,
            assistant_logo: non_empty(self.assistant_logo),
            page_url: non_empty(self.page_url).unwrap_or_else(|| DEFAULT_PAGE_URL.to_string()),
            request_timeout: self
                .request_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Which bottom corner the launcher and panel are anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// Chat-bubble glyph on the accent color.
    Default,
    Image { src: String, alt: String },
}

/// Immutable configuration passed into the controller at construction.
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub endpoint: Url,
    pub title: String,
    pub accent_color: String,
    pub position: Position,
    /// Trimmed; empty means no welcome message.
    pub welcome_message: String,
    pub launcher: Launcher,
    pub assistant_logo: Option<String>,
    /// Reported as `meta.page` in every payload.
    pub page_url: String,
    pub request_timeout: Option<Duration>,
}

impl WidgetConfig {
    /// Minimal configuration for a given endpoint, everything else defaulted.
    pub fn for_endpoint(endpoint: &str) -> Result<Self, ConfigError> {
        RawConfig {
            endpoint: Some(endpoint.to_string()),
            ..RawConfig::default()
        }
        .resolve()
    }

    pub fn welcome(&self) -> Option<&str> {
        (!self.welcome_message.is_empty()).then_some(self.welcome_message.as_str())
    }

    /// Header title fragment for hosts that render markup.
    pub fn header_markup(&self) -> String {
        format!(
            "<b>{}</b><span>{}</span>",
            escape_markup(&self.title),
            HEADER_SUBTITLE
        )
    }
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Read one configuration layer from `path`.
pub fn load_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    RawConfig::from_toml(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve defaults, then `path` if it exists, then `overrides`.
pub fn load_layered(path: &Path, overrides: RawConfig) -> Result<WidgetConfig, ConfigError> {
    let file = if path.exists() {
        load_file(path)?
    } else {
        debug!(target: "config", "no config file at {}, using defaults", path.display());
        RawConfig::default()
    };
    file.merge(overrides).resolve()
}

/// Write the commented template to `path` if the file does not already exist.
pub fn ensure_default_file(path: &Path) {
    if path.exists() {
        return;
    }
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(target: "config", "failed to create config dir {}: {e}", parent.display());
            return;
        }
    }
    if let Err(e) = std::fs::write(path, default_toml_content()) {
        warn!(target: "config", "failed to write default widget.toml at {}: {e}", path.display());
    }
}

/// Commented template. Leaves `endpoint` unset so a fresh install refuses to
/// start until it is filled in.
pub fn default_toml_content() -> &'static str {
    r##"# mokhatt widget configuration
# Any missing value uses the compiled default.

# Webhook that receives {"text", "visitor_id", "meta"} as JSON (required).
# endpoint = "https://example.com/webhook"

title = "مُخَطّط"              # Header title
primary_color = "#0f5b3e"     # Accent color (hex)
position = "right"            # "left" or "right"
welcome_message = ""          # Revealed once, the first time the panel opens
# assistant_logo = "/path/to/logo.png"
# page_url = "app://mokhatt-widget"   # Reported as meta.page
# request_timeout_secs = 30          # Unset means no timeout

# [launcher]
# type = "image"
# src = "/path/to/launcher.png"
# alt = "فتح الدردشة"
"##
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_endpoint_is_fatal() {
        let err = RawConfig::default().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEndpoint));

        let empty = RawConfig {
            endpoint: Some(String::new()),
            ..RawConfig::default()
        };
        assert!(matches!(empty.resolve(), Err(ConfigError::MissingEndpoint)));
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let err = WidgetConfig::for_endpoint("ftp://x/hook").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
        assert!(WidgetConfig::for_endpoint("not a url").is_err());
    }

    #[test]
    fn defaults_fill_unset_fields() {
        let cfg = WidgetConfig::for_endpoint("https://x/webhook").unwrap();
        assert_eq!(cfg.endpoint.as_str(), "https://x/webhook");
        assert_eq!(cfg.title, DEFAULT_TITLE);
        assert_eq!(cfg.accent_color, DEFAULT_ACCENT_COLOR);
        assert_eq!(cfg.position, Position::Right);
        assert_eq!(cfg.welcome(), None);
        assert_eq!(cfg.launcher, Launcher::Default);
        assert_eq!(cfg.page_url, DEFAULT_PAGE_URL);
        assert!(cfg.request_timeout.is_none());
    }

    #[test]
    fn position_left_is_case_insensitive_and_anything_else_is_right() {
        let mk = |p: &str| {
            RawConfig {
                endpoint: Some("https://x/webhook".into()),
                position: Some(p.into()),
                ..RawConfig::default()
            }
            .resolve()
            .unwrap()
            .position
        };
        assert_eq!(mk("LEFT"), Position::Left);
        assert_eq!(mk("left"), Position::Left);
        assert_eq!(mk("center"), Position::Right);
        // Compared as given, without trimming.
        assert_eq!(mk(" left"), Position::Right);
    }

    #[test]
    fn welcome_is_trimmed_and_blank_means_none() {
        let raw = RawConfig {
            endpoint: Some("https://x/webhook".into()),
            welcome_message: Some("   ".into()),
            ..RawConfig::default()
        };
        assert_eq!(raw.resolve().unwrap().welcome(), None);

        let raw = RawConfig {
            endpoint: Some("https://x/webhook".into()),
            welcome_message: Some("  أهلاً  ".into()),
            ..RawConfig::default()
        };
        assert_eq!(raw.resolve().unwrap().welcome(), Some("أهلاً"));
    }

    #[test]
    fn image_launcher_requires_type_and_src() {
        let toml_str = r#"
endpoint = "https://x/webhook"
[launcher]
type = "image"
src = "/tmp/l.png"
"#;
        let cfg = RawConfig::from_toml(toml_str).unwrap().resolve().unwrap();
        assert_eq!(
            cfg.launcher,
            Launcher::Image {
                src: "/tmp/l.png".into(),
                alt: DEFAULT_LAUNCHER_ALT.into()
            }
        );

        let toml_str = r#"
endpoint = "https://x/webhook"
[launcher]
type = "image"
src = ""
"#;
        let cfg = RawConfig::from_toml(toml_str).unwrap().resolve().unwrap();
        assert_eq!(cfg.launcher, Launcher::Default);
    }

    #[test]
    fn cli_layer_overrides_file_layer() {
        let file = RawConfig::from_toml(
            "endpoint = \"https://file/hook\"\ntitle = \"File\"\nposition = \"left\"\n",
        )
        .unwrap();
        let cli = RawConfig {
            endpoint: Some("https://cli/hook".into()),
            ..RawConfig::default()
        };
        let cfg = file.merge(cli).resolve().unwrap();
        assert_eq!(cfg.endpoint.as_str(), "https://cli/hook");
        assert_eq!(cfg.title, "File");
        assert_eq!(cfg.position, Position::Left);
    }

    #[test]
    fn header_markup_escapes_title() {
        let raw = RawConfig {
            endpoint: Some("https://x/webhook".into()),
            title: Some("<Shop & Co>".into()),
            ..RawConfig::default()
        };
        let cfg = raw.resolve().unwrap();
        assert_eq!(
            cfg.header_markup(),
            format!("<b>&lt;Shop &amp; Co&gt;</b><span>{HEADER_SUBTITLE}</span>")
        );
    }

    #[test]
    fn default_template_parses_but_has_no_endpoint() {
        let raw = RawConfig::from_toml(default_toml_content()).expect("template must parse");
        assert!(raw.endpoint.is_none());
        assert!(matches!(raw.resolve(), Err(ConfigError::MissingEndpoint)));
    }

    #[test]
    fn ensure_default_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.toml");
        std::fs::write(&path, "endpoint = \"https://mine/hook\"\n").unwrap();

        ensure_default_file(&path);

        let raw = load_file(&path).unwrap();
        assert_eq!(raw.endpoint.as_deref(), Some("https://mine/hook"));
    }

    #[test]
    fn ensure_default_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/widget.toml");

        ensure_default_file(&path);

        assert!(path.exists());
        assert!(load_file(&path).is_ok());
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.toml");
        std::fs::write(&path, "this is not [[ valid toml").unwrap();
        assert!(matches!(load_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn command_line_overrides_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.toml");
        std::fs::write(
            &path,
            "endpoint = \"https://file/hook\"\ntitle = \"From file\"\n",
        )
        .unwrap();

        let overrides = RawConfig {
            title: Some("From CLI".into()),
            ..RawConfig::default()
        };
        let cfg = load_layered(&path, overrides).unwrap();
        assert_eq!(cfg.endpoint.as_str(), "https://file/hook");
        assert_eq!(cfg.title, "From CLI");
    }

    #[test]
    fn missing_file_falls_back_to_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = RawConfig {
            endpoint: Some("http://localhost:5678/webhook".into()),
            ..RawConfig::default()
        };
        let cfg = load_layered(&dir.path().join("absent.toml"), overrides).unwrap();
        assert_eq!(cfg.endpoint.port(), Some(5678));
    }

    #[test]
    fn fresh_template_refuses_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mokhatt/widget.toml");
        ensure_default_file(&path);
        assert!(path.exists());
        assert!(matches!(
            load_layered(&path, RawConfig::default()),
            Err(ConfigError::MissingEndpoint)
        ));
    }
}
