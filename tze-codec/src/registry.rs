//! Extension and mode names.
//!
//! Lookups are total: identifiers this crate does not recognise get a
//! synthesized label so newer on-chain extensions still render.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Extension id of the demo extension.
pub const EXTENSION_DEMO: u32 = 0;
/// Extension id of the stark_verify extension.
pub const EXTENSION_STARK_VERIFY: u32 = 1;

/// stark_verify mode that opens a channel.
pub const MODE_INITIALIZE: u64 = 0;
/// stark_verify mode that advances a channel.
pub const MODE_VERIFY: u64 = 1;

/// A TZE extension, keyed by its 4-byte identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum Extension {
    Demo,
    StarkVerify,
    Unknown(u32),
}

impl Extension {
    pub const fn from_id(id: u32) -> Self {
        match id {
            EXTENSION_DEMO => Self::Demo,
            EXTENSION_STARK_VERIFY => Self::StarkVerify,
            other => Self::Unknown(other),
        }
    }

    pub const fn id(self) -> u32 {
        match self {
            Self::Demo => EXTENSION_DEMO,
            Self::StarkVerify => EXTENSION_STARK_VERIFY,
            Self::Unknown(id) => id,
        }
    }

    /// Human-readable name, `unknown_<id>` for unrecognised extensions.
    pub fn name(self) -> Cow<'static, str> {
        match self {
            Self::Demo => Cow::Borrowed("demo"),
            Self::StarkVerify => Cow::Borrowed("stark_verify"),
            Self::Unknown(id) => Cow::Owned(format!("unknown_{id}")),
        }
    }

    /// Human-readable mode name, `Mode <n>` where no name is defined.
    pub fn mode_name(self, mode: u64) -> Cow<'static, str> {
        match (self, mode) {
            (Self::StarkVerify, MODE_INITIALIZE) => Cow::Borrowed("Initialize"),
            (Self::StarkVerify, MODE_VERIFY) => Cow::Borrowed("Verify"),
            (_, n) => Cow::Owned(format!("Mode {n}")),
        }
    }
}

impl From<u32> for Extension {
    fn from(id: u32) -> Self {
        Self::from_id(id)
    }
}

impl From<Extension> for u32 {
    fn from(extension: Extension) -> Self {
        extension.id()
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Name of the extension with the given id.
pub fn extension_name(id: u32) -> Cow<'static, str> {
    Extension::from_id(id).name()
}

/// Name of `mode` within the extension with the given id.
pub fn mode_name(extension_id: u32, mode: u64) -> Cow<'static, str> {
    Extension::from_id(extension_id).mode_name(mode)
}
