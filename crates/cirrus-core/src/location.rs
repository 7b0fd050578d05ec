//! Primary/secondary endpoint selection.
//!
//! Accounts may be geo-replicated: writes always go to the primary, reads may
//! be served by a read-only secondary. The selector is pure configuration;
//! per-call state (which location is pinned, whether the secondary was ruled
//! out) lives in the engine's attempt record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Which replica of the account an attempt targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    Primary,
    Secondary,
}

impl StorageLocation {
    pub fn other(self) -> Self {
        match self {
            StorageLocation::Primary => StorageLocation::Secondary,
            StorageLocation::Secondary => StorageLocation::Primary,
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Primary => write!(f, "primary"),
            StorageLocation::Secondary => write!(f, "secondary"),
        }
    }
}

impl FromStr for StorageLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(StorageLocation::Primary),
            "secondary" => Ok(StorageLocation::Secondary),
            other => Err(Error::Config(format!("unknown storage location: {:?}", other))),
        }
    }
}

/// Location mode: which endpoints reads may use, and in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationMode {
    #[default]
    PrimaryOnly,
    PrimaryThenSecondary,
    SecondaryThenPrimary,
    SecondaryOnly,
}

impl LocationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationMode::PrimaryOnly => "primary-only",
            LocationMode::PrimaryThenSecondary => "primary-then-secondary",
            LocationMode::SecondaryThenPrimary => "secondary-then-primary",
            LocationMode::SecondaryOnly => "secondary-only",
        }
    }

    /// True if reads may be sent to the secondary under this mode.
    pub fn uses_secondary(self) -> bool {
        !matches!(self, LocationMode::PrimaryOnly)
    }
}

impl fmt::Display for LocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "primary-only" | "primary" => Ok(LocationMode::PrimaryOnly),
            "primary-then-secondary" => Ok(LocationMode::PrimaryThenSecondary),
            "secondary-then-primary" => Ok(LocationMode::SecondaryThenPrimary),
            "secondary-only" | "secondary" => Ok(LocationMode::SecondaryOnly),
            other => Err(Error::Config(format!("unknown location mode: {:?}", other))),
        }
    }
}

/// Whether an operation only reads or may change server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Base URIs for the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    primary: Url,
    secondary: Option<Url>,
}

impl Endpoints {
    pub fn new(primary: Url) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Url) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Parse base URIs from strings.
    pub fn parse(primary: &str, secondary: Option<&str>) -> Result<Self> {
        let parse = |s: &str| {
            Url::parse(s).map_err(|e| Error::Config(format!("invalid endpoint {:?}: {}", s, e)))
        };
        let mut endpoints = Self::new(parse(primary)?);
        if let Some(s) = secondary {
            endpoints.secondary = Some(parse(s)?);
        }
        Ok(endpoints)
    }

    pub fn primary(&self) -> &Url {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Url> {
        self.secondary.as_ref()
    }

    pub fn get(&self, location: StorageLocation) -> Option<&Url> {
        match location {
            StorageLocation::Primary => Some(&self.primary),
            StorageLocation::Secondary => self.secondary.as_ref(),
        }
    }
}

/// Chooses the location of each attempt for one effective mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSelector {
    mode: LocationMode,
}

impl LocationSelector {
    /// Resolve the effective mode against the configured endpoints: without a
    /// secondary every mode degrades to `PrimaryOnly`, except `SecondaryOnly`,
    /// which cannot be satisfied at all.
    pub fn new(mode: LocationMode, endpoints: &Endpoints) -> Result<Self> {
        if endpoints.secondary().is_some() {
            return Ok(Self { mode });
        }
        match mode {
            LocationMode::SecondaryOnly => Err(Error::Config(
                "location mode secondary-only requires a secondary endpoint".into(),
            )),
            _ => Ok(Self {
                mode: LocationMode::PrimaryOnly,
            }),
        }
    }

    /// Effective mode after resolution.
    pub fn mode(&self) -> LocationMode {
        self.mode
    }

    /// True if `access` may ever be served by the secondary.
    pub fn allows_secondary(&self, access: AccessKind) -> bool {
        access == AccessKind::Read && self.mode.uses_secondary()
    }

    /// Location of the first attempt.
    /// Writes always go to primary, even when pinned elsewhere.
    pub fn initial(&self, access: AccessKind, pinned: Option<StorageLocation>) -> StorageLocation {
        if access == AccessKind::Write {
            return StorageLocation::Primary;
        }
        if let Some(location) = pinned {
            return location;
        }
        match self.mode {
            LocationMode::PrimaryOnly | LocationMode::PrimaryThenSecondary => {
                StorageLocation::Primary
            }
            LocationMode::SecondaryThenPrimary | LocationMode::SecondaryOnly => {
                StorageLocation::Secondary
            }
        }
    }

    /// Location of the attempt after one that targeted `previous`.
    pub fn next(
        &self,
        access: AccessKind,
        previous: StorageLocation,
        pinned: Option<StorageLocation>,
    ) -> StorageLocation {
        if access == AccessKind::Write {
            return StorageLocation::Primary;
        }
        if let Some(location) = pinned {
            return location;
        }
        match self.mode {
            LocationMode::PrimaryOnly => StorageLocation::Primary,
            LocationMode::SecondaryOnly => StorageLocation::Secondary,
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary => {
                previous.other()
            }
        }
    }
}
