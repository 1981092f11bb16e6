//! Site filtering - where resistance applies
//!
//! Two inverse policies:
//! - Whitelist mode: resistance everywhere except listed hosts
//! - Blacklist mode: resistance only on listed hosts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Site matching policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Listed hosts are exempt
    #[default]
    Whitelist,
    /// Only listed hosts are affected
    Blacklist,
}

impl Mode {
    /// Lenient conversion used for stored values: anything other than
    /// `"blacklist"` is treated as whitelist.
    pub fn coerce(raw: Option<&str>) -> Self {
        match raw {
            Some("blacklist") => Mode::Blacklist,
            _ => Mode::Whitelist,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Whitelist => "whitelist",
            Mode::Blacklist => "blacklist",
        }
    }

    /// The list this mode consults
    pub fn list_kind(&self) -> ListKind {
        match self {
            Mode::Whitelist => ListKind::Whitelist,
            Mode::Blacklist => ListKind::Blacklist,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict conversion used at input boundaries
impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whitelist" => Ok(Mode::Whitelist),
            "blacklist" => Ok(Mode::Blacklist),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Which host list an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

impl ListKind {
    /// Store key holding this list
    pub fn key(&self) -> &'static str {
        match self {
            ListKind::Whitelist => crate::KEY_WHITELIST,
            ListKind::Blacklist => crate::KEY_BLACKLIST,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ListKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whitelist" => Ok(ListKind::Whitelist),
            "blacklist" => Ok(ListKind::Blacklist),
            other => Err(format!("unknown list: {other}")),
        }
    }
}

/// Pure site predicate
pub struct SiteFilter;

impl SiteFilter {
    /// Whether resistance is active for `hostname`.
    ///
    /// Comparison is exact after lowercasing; there is no subdomain or
    /// wildcard matching.
    pub fn is_active<S: AsRef<str>>(
        mode: Mode,
        whitelist: &[S],
        blacklist: &[S],
        hostname: &str,
    ) -> bool {
        let host = hostname.to_lowercase();
        match mode {
            Mode::Whitelist => !contains_host(whitelist, &host),
            Mode::Blacklist => contains_host(blacklist, &host),
        }
    }
}

/// Membership test against a host list
pub fn contains_host<S: AsRef<str>>(list: &[S], host: &str) -> bool {
    list.iter().any(|entry| entry.as_ref().to_lowercase() == host)
}
