//! Shared value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permissions granted alongside shared libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingSettings {
    pub allow_sync: bool,
    pub allow_camera_upload: bool,
    pub allow_channels: bool,
}

impl Default for SharingSettings {
    fn default() -> Self {
        Self {
            allow_sync: true,
            allow_camera_upload: false,
            allow_channels: false,
        }
    }
}

impl SharingSettings {
    /// Body fragment used by shared-server creation.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "allowSync": flag(self.allow_sync),
            "allowCameraUpload": flag(self.allow_camera_upload),
            "allowChannels": flag(self.allow_channels),
            "filterMovies": "",
            "filterTelevision": "",
            "filterMusic": "",
        })
    }

    /// Query parameters used by friend settings updates.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("allowSync", flag(self.allow_sync).to_string()),
            ("allowCameraUpload", flag(self.allow_camera_upload).to_string()),
            ("allowChannels", flag(self.allow_channels).to_string()),
        ]
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Metadata type codes understood by `/library/sections/{key}/all?type=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryType {
    Movie,
    Show,
    Season,
    Episode,
    Artist,
    Album,
    Track,
}

impl LibraryType {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Movie => 1,
            Self::Show => 2,
            Self::Season => 3,
            Self::Episode => 4,
            Self::Artist => 8,
            Self::Album => 9,
            Self::Track => 10,
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Movie => "movie",
            Self::Show => "show",
            Self::Season => "season",
            Self::Episode => "episode",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Track => "track",
        };
        f.write_str(name)
    }
}
