//! Per-path configuration
//!
//! A `PathConf` describes where the media of a path comes from (a static
//! source URL, a publishing client or a redirect) and the knobs that go with
//! it. Entries are validated once when the configuration is loaded and are
//! shared behind `Arc` afterwards.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::duration::StringDuration;
use super::error::ConfError;
use super::name::{is_reserved, validate_path_name};
use crate::source::SourceKind;

/// Source value for paths fed by a publishing client
pub const SOURCE_PUBLISHER: &str = "publisher";

/// Source value for paths that redirect readers elsewhere
pub const SOURCE_REDIRECT: &str = "redirect";

/// Compiled pattern of a regex (or catch-all) path
#[derive(Debug, Clone)]
pub struct PathPattern(Regex);

impl PathPattern {
    fn compile(pattern: &str) -> Result<Self, ConfError> {
        Regex::new(pattern)
            .map(PathPattern)
            .map_err(|_| ConfError::InvalidRegex {
                pattern: pattern.to_string(),
            })
    }

    /// Match a requested name, returning the full submatch list
    ///
    /// Group 0 is the whole match; groups that did not participate are
    /// returned as empty strings.
    pub fn captures(&self, name: &str) -> Option<Vec<String>> {
        self.0.captures(name).map(|caps| {
            caps.iter()
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect()
        })
    }

    /// Pattern source text
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// RTSP transport protocol used when pulling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtspTransport {
    /// Try UDP, fall back to TCP
    #[default]
    Automatic,
    /// UDP unicast
    Udp,
    /// UDP multicast
    Multicast,
    /// Interleaved TCP
    Tcp,
}

/// Type of the RTSP `Range` header sent when pulling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtspRangeType {
    /// No `Range` header
    #[default]
    #[serde(rename = "")]
    Undefined,
    /// Absolute time
    Clock,
    /// Normal play time
    Npt,
    /// SMPTE timecode
    Smpte,
}

/// Configuration of a single path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathConf {
    /// Name the entry was declared with (filled by `validate`)
    #[serde(skip)]
    pub name: String,

    /// Compiled pattern for `~` and catch-all entries (filled by `validate`)
    #[serde(skip)]
    pub regexp: Option<PathPattern>,

    // General
    pub source: String,
    pub source_fingerprint: String,
    pub source_on_demand: bool,
    pub source_on_demand_start_timeout: StringDuration,
    pub source_on_demand_close_after: StringDuration,
    pub max_readers: usize,
    pub srt_read_passphrase: String,
    pub fallback: String,
    pub username: String,
    pub password: String,

    // Publisher source
    pub override_publisher: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_publisher_override: Option<bool>,
    pub srt_publish_passphrase: String,

    // RTSP source
    pub rtsp_transport: RtspTransport,
    pub rtsp_any_port: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_protocol: Option<RtspTransport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_any_port_enable: Option<bool>,
    pub rtsp_range_type: RtspRangeType,
    pub rtsp_range_start: String,

    // Redirect source
    pub source_redirect: String,

    // Hooks
    pub run_on_init: String,
    pub run_on_init_restart: bool,
    pub run_on_demand: String,
    pub run_on_demand_restart: bool,
    pub run_on_demand_start_timeout: StringDuration,
    pub run_on_demand_close_after: StringDuration,
    pub run_on_un_demand: String,
    pub run_on_ready: String,
    pub run_on_ready_restart: bool,
    pub run_on_not_ready: String,
    pub run_on_read: String,
    pub run_on_read_restart: bool,
    pub run_on_unread: String,
}

impl Default for PathConf {
    fn default() -> Self {
        Self {
            name: String::new(),
            regexp: None,
            source: SOURCE_PUBLISHER.to_string(),
            source_fingerprint: String::new(),
            source_on_demand: false,
            source_on_demand_start_timeout: StringDuration::from_secs(10),
            source_on_demand_close_after: StringDuration::from_secs(10),
            max_readers: 0,
            srt_read_passphrase: String::new(),
            fallback: String::new(),
            username: String::new(),
            password: String::new(),
            override_publisher: true,
            disable_publisher_override: None,
            srt_publish_passphrase: String::new(),
            rtsp_transport: RtspTransport::Automatic,
            rtsp_any_port: false,
            source_protocol: None,
            source_any_port_enable: None,
            rtsp_range_type: RtspRangeType::Undefined,
            rtsp_range_start: String::new(),
            source_redirect: String::new(),
            run_on_init: String::new(),
            run_on_init_restart: false,
            run_on_demand: String::new(),
            run_on_demand_restart: false,
            run_on_demand_start_timeout: StringDuration::from_secs(10),
            run_on_demand_close_after: StringDuration::from_secs(10),
            run_on_un_demand: String::new(),
            run_on_ready: String::new(),
            run_on_ready_restart: false,
            run_on_not_ready: String::new(),
            run_on_read: String::new(),
            run_on_read_restart: false,
            run_on_unread: String::new(),
        }
    }
}

impl PathConf {
    /// Set the source
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Start the source only when a reader asks for the path
    pub fn source_on_demand(mut self, on_demand: bool) -> Self {
        self.source_on_demand = on_demand;
        self
    }

    /// Credentials injected into the resolved source URL
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the maximum number of readers (0 = unlimited)
    pub fn max_readers(mut self, max: usize) -> Self {
        self.max_readers = max;
        self
    }

    /// Set the RTSP transport
    pub fn rtsp_transport(mut self, transport: RtspTransport) -> Self {
        self.rtsp_transport = transport;
        self
    }

    /// Set the redirect target (used with `source = "redirect"`)
    pub fn source_redirect(mut self, target: impl Into<String>) -> Self {
        self.source_redirect = target.into();
        self
    }

    /// Set the fallback path or URL
    pub fn fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Whether this entry is matched by pattern rather than literally
    pub fn is_pattern(&self) -> bool {
        self.regexp.is_some()
    }

    /// Protocol of the static source, if any
    pub fn source_kind(&self) -> Option<SourceKind> {
        SourceKind::from_source(&self.source)
    }

    /// Whether media is pulled from an external address
    pub fn has_static_source(&self) -> bool {
        self.source_kind().is_some()
    }

    /// Whether the static source starts only on demand
    pub fn has_on_demand_static_source(&self) -> bool {
        self.has_static_source() && self.source_on_demand
    }

    /// Whether a command launches a publisher on demand
    pub fn has_on_demand_publisher(&self) -> bool {
        !self.run_on_demand.is_empty()
    }

    /// Timeout for an on-demand source to become ready
    pub fn on_demand_start_timeout(&self) -> Duration {
        self.source_on_demand_start_timeout.get()
    }

    /// Whether switching from `self` to `other` needs a fresh source
    ///
    /// Anything that changes how the source is reached or negotiated forces a
    /// restart; other fields are hot-reloaded into the running source.
    pub fn requires_source_restart(&self, other: &PathConf) -> bool {
        self.source != other.source
            || self.source_fingerprint != other.source_fingerprint
            || self.source_on_demand != other.source_on_demand
            || self.username != other.username
            || self.password != other.password
            || self.rtsp_transport != other.rtsp_transport
            || self.rtsp_any_port != other.rtsp_any_port
            || self.rtsp_range_type != other.rtsp_range_type
            || self.rtsp_range_start != other.rtsp_range_start
            || self.source_redirect != other.source_redirect
    }

    /// Validate the entry and fill in name-derived fields
    pub fn validate(&mut self, name: &str) -> Result<(), ConfError> {
        self.name = name.to_string();

        if is_reserved(name) {
            self.regexp = Some(PathPattern::compile("^.*$")?);
        } else if let Some(pattern) = name.strip_prefix('~') {
            self.regexp = Some(PathPattern::compile(pattern)?);
        } else {
            validate_path_name(name).map_err(|reason| ConfError::InvalidName {
                name: name.to_string(),
                reason,
            })?;
            self.regexp = None;
        }

        // General

        if self.source != SOURCE_PUBLISHER
            && self.source != SOURCE_REDIRECT
            && self.regexp.is_some()
            && !self.source_on_demand
        {
            return Err(ConfError::path(
                name,
                "a path with a regular expression (or path 'all') and a static source \
                 must have 'sourceOnDemand' set to true",
            ));
        }

        self.validate_source(name)?;

        if self.source_on_demand && self.source == SOURCE_PUBLISHER {
            return Err(ConfError::path(
                name,
                "'sourceOnDemand' is useless when source is 'publisher'",
            ));
        }

        if !self.srt_read_passphrase.is_empty() {
            check_srt_passphrase(&self.srt_read_passphrase).map_err(|reason| {
                ConfError::path(name, format!("invalid 'srtReadPassphrase': {}", reason))
            })?;
        }

        if !self.fallback.is_empty() {
            if let Some(target) = self.fallback.strip_prefix('/') {
                validate_path_name(target).map_err(|reason| {
                    ConfError::path(name, format!("'{}': {}", self.fallback, reason))
                })?;
            } else if parse_rtsp_url(&self.fallback).is_none() {
                return Err(ConfError::path(
                    name,
                    format!("'{}' is not a valid RTSP URL", self.fallback),
                ));
            }
        }

        // Publisher source

        if let Some(disable) = self.disable_publisher_override {
            self.override_publisher = !disable;
        }

        if !self.srt_publish_passphrase.is_empty() {
            if self.source != SOURCE_PUBLISHER {
                return Err(ConfError::path(
                    name,
                    "'srtPublishPassphrase' can only be used when source is 'publisher'",
                ));
            }
            check_srt_passphrase(&self.srt_publish_passphrase).map_err(|reason| {
                ConfError::path(name, format!("invalid 'srtPublishPassphrase': {}", reason))
            })?;
        }

        // RTSP source

        if let Some(transport) = self.source_protocol {
            self.rtsp_transport = transport;
        }
        if let Some(any_port) = self.source_any_port_enable {
            self.rtsp_any_port = any_port;
        }

        // Redirect source

        if self.source == SOURCE_REDIRECT {
            if self.source_redirect.is_empty() {
                return Err(ConfError::path(name, "source redirect must be filled"));
            }
            if parse_rtsp_url(&self.source_redirect).is_none() {
                return Err(ConfError::path(
                    name,
                    format!("'{}' is not a valid RTSP URL", self.source_redirect),
                ));
            }
        }

        // Hooks

        if !self.run_on_init.is_empty() && self.regexp.is_some() {
            return Err(ConfError::path(
                name,
                "a path with a regular expression (or path 'all') does not support option \
                 'runOnInit'; use another path",
            ));
        }

        if (!self.run_on_demand.is_empty() || !self.run_on_un_demand.is_empty())
            && self.source != SOURCE_PUBLISHER
        {
            return Err(ConfError::path(
                name,
                "'runOnDemand' and 'runOnUnDemand' can be used only when source is 'publisher'",
            ));
        }

        Ok(())
    }

    fn validate_source(&self, name: &str) -> Result<(), ConfError> {
        let source = self.source.as_str();
        if source == SOURCE_PUBLISHER || source == SOURCE_REDIRECT {
            return Ok(());
        }

        let invalid_url = || ConfError::path(name, format!("'{}' is not a valid URL", source));

        match SourceKind::from_source(source) {
            None => Err(ConfError::path(name, format!("invalid source: '{}'", source))),

            Some(SourceKind::Rtsp) => parse_rtsp_url(source).map(|_| ()).ok_or_else(invalid_url),

            Some(SourceKind::Rtmp) | Some(SourceKind::Hls) => {
                let url = Url::parse(source).map_err(|_| invalid_url())?;
                let has_user = !url.username().is_empty();
                let has_pass = url.password().is_some_and(|p| !p.is_empty());
                if has_user != has_pass {
                    return Err(ConfError::path(
                        name,
                        "username and password must be both provided",
                    ));
                }
                Ok(())
            }

            Some(SourceKind::Udp) => {
                let addr = &source["udp://".len()..];
                match addr.rsplit_once(':') {
                    Some((host, port)) if !host.is_empty() && !port.is_empty() => Ok(()),
                    _ => Err(ConfError::path(
                        name,
                        format!("'{}' is not a valid UDP URL", source),
                    )),
                }
            }

            Some(SourceKind::Srt) | Some(SourceKind::WebRtc) => {
                Url::parse(source).map(|_| ()).map_err(|_| invalid_url())
            }
        }
    }
}

fn parse_rtsp_url(s: &str) -> Option<Url> {
    let url = Url::parse(s).ok()?;
    match url.scheme() {
        "rtsp" | "rtsps" if url.host_str().is_some_and(|h| !h.is_empty()) => Some(url),
        _ => None,
    }
}

fn check_srt_passphrase(passphrase: &str) -> Result<(), &'static str> {
    if (10..=79).contains(&passphrase.len()) {
        Ok(())
    } else {
        Err("must be between 10 and 79 characters")
    }
}
