use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X,
    Instagram,
    Facebook,
    Line,
    Discord,
    Blog,
}

/// Static configuration of a platform.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PlatformSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub max_length: usize,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown platform identifier: {0}")]
pub struct UnknownPlatformError(pub String);

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::X,
        Platform::Instagram,
        Platform::Facebook,
        Platform::Line,
        Platform::Discord,
        Platform::Blog,
    ];

    #[must_use]
    pub const fn spec(self) -> PlatformSpec {
        match self {
            Platform::X => PlatformSpec {
                id: "x",
                display_name: "X (Twitter)",
                max_length: 280,
            },
            Platform::Instagram => PlatformSpec {
                id: "instagram",
                display_name: "Instagram",
                max_length: 2200,
            },
            Platform::Facebook => PlatformSpec {
                id: "facebook",
                display_name: "Facebook",
                max_length: 63206,
            },
            Platform::Line => PlatformSpec {
                id: "line",
                display_name: "LINE",
                max_length: 1000,
            },
            Platform::Discord => PlatformSpec {
                id: "discord",
                display_name: "Discord",
                max_length: 2000,
            },
            Platform::Blog => PlatformSpec {
                id: "blog",
                display_name: "Blog",
                max_length: 100_000,
            },
        }
    }

    #[must_use]
    pub const fn id(self) -> &'static str {
        self.spec().id
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        self.spec().display_name
    }

    #[must_use]
    pub const fn max_length(self) -> usize {
        self.spec().max_length
    }
}

/// Looks up the configuration for a raw identifier.
///
/// `None` means the identifier is not a known platform: it has no display
/// name and no length limit.
#[must_use]
pub fn lookup(id: &str) -> Option<PlatformSpec> {
    id.parse::<Platform>().ok().map(Platform::spec)
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|platform| platform.id() == s)
            .ok_or_else(|| UnknownPlatformError(s.to_owned()))
    }
}
