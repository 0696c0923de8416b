//! Load options of the memdisk image.
//!
//! The firmware hands the image a single UCS-2 command line: the image's own name,
//! the locator of the disk image to download, then flags.
//!
//! ```text
//! memdisk.efi http://10.0.0.1/boot.iso cd pause timeout=120
//! ```

use crate::{download::MemoryClass, guid::DiskKind};
use core::ffi::CStr;
use thiserror::Error;
use uefi_raw::Status;

/// Size of the buffer holding the NUL-terminated locator.
pub const LOCATOR_CAPACITY: usize = 256;
/// Maximum length of a locator, terminator excluded.
pub const MAX_LOCATOR_LEN: usize = LOCATOR_CAPACITY - 1;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum OptionsError {
    #[error("Did not find a download locator in the load options")]
    MissingLocator,
    #[error("Download locator is {0} bytes long, the maximum is {MAX_LOCATOR_LEN}")]
    LocatorTooLong(usize),
    #[error("Invalid character {value:?} at position {position} of the download locator")]
    InvalidCharacter { position: usize, value: char },
    #[error("Options `{0}` and `{1}` cannot be used together")]
    Conflict(&'static str, &'static str),
    #[error("Load options do not fit in {0} bytes")]
    TooLong(usize),
}

impl OptionsError {
    #[must_use]
    #[inline]
    pub const fn status(self) -> Status {
        Status::INVALID_PARAMETER
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Whether the region is advertised to the operating system through ACPI.
pub enum Advertise {
    /// Only when the firmware cannot do it itself.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Clone, Copy, PartialEq, Eq)]
/// Locator of the image to download, as handed to the transport.
///
/// Only printable ASCII is accepted, so the locator is both a valid `str` and a valid
/// C string.
pub struct Locator {
    bytes: [u8; LOCATOR_CAPACITY],
    len: usize,
}

impl Locator {
    pub fn new(locator: &str) -> Result<Self, OptionsError> {
        if let Some((position, value)) = locator.char_indices().find(|(_, c)| !is_locator_char(*c))
        {
            return Err(OptionsError::InvalidCharacter { position, value });
        }
        if locator.is_empty() {
            return Err(OptionsError::MissingLocator);
        }
        if locator.len() > MAX_LOCATOR_LEN {
            return Err(OptionsError::LocatorTooLong(locator.len()));
        }

        let mut bytes = [0; LOCATOR_CAPACITY];
        bytes[..locator.len()].copy_from_slice(locator.as_bytes());

        Ok(Self {
            bytes,
            len: locator.len(),
        })
    }

    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    #[must_use]
    #[inline]
    pub fn as_c_str(&self) -> &CStr {
        CStr::from_bytes_until_nul(&self.bytes).unwrap_or_default()
    }

    #[must_use]
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::fmt::Debug for Locator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Locator").field(&self.as_str()).finish()
    }
}

impl core::fmt::Display for Locator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[inline]
const fn is_locator_char(c: char) -> bool {
    matches!(c, '!'..='~')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Flag {
    Disk = 1 << 0,
    Cd = 1 << 1,
    Pause = 1 << 2,
    Nfit = 1 << 3,
    NoNfit = 1 << 4,
    Reclaim = 1 << 5,
}

impl Flag {
    const ALL: [Self; 6] = [
        Self::Disk,
        Self::Cd,
        Self::Pause,
        Self::Nfit,
        Self::NoNfit,
        Self::Reclaim,
    ];

    /// Pairs of flags that contradict each other.
    const CONFLICTS: [(Self, Self); 3] = [
        (Self::Disk, Self::Cd),
        (Self::Nfit, Self::NoNfit),
        (Self::Nfit, Self::Reclaim),
    ];

    const fn name(self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Cd => "cd",
            Self::Pause => "pause",
            Self::Nfit => "nfit",
            Self::NoNfit => "nonfit",
            Self::Reclaim => "reclaim",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.name() == token)
    }

    #[inline]
    const fn is_in(self, set: u8) -> bool {
        set & self as u8 != 0
    }
}

const TIMEOUT_PREFIX: &str = "timeout=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootOptions {
    locator: Locator,
    disk_kind: DiskKind,
    pause: bool,
    advertise: Advertise,
    memory_class: MemoryClass,
    timeout_secs: Option<u32>,
}

impl BootOptions {
    /// Parses the load options as handed over by the firmware.
    ///
    /// The first token is the name of the image itself and is skipped.
    pub fn from_load_options(options: &str) -> Result<Self, OptionsError> {
        let rest = options
            .trim_start()
            .split_once(|c: char| c.is_ascii_whitespace())
            .map_or("", |(_, rest)| rest);
        Self::parse(rest)
    }

    /// Parses a locator followed by flags.
    ///
    /// Unknown flags are ignored with a warning.
    pub fn parse(options: &str) -> Result<Self, OptionsError> {
        let mut tokens = options.split_ascii_whitespace();
        let locator = Locator::new(tokens.next().ok_or(OptionsError::MissingLocator)?)?;

        let mut flags = 0_u8;
        let mut timeout_secs = None;

        for token in tokens {
            if let Some(flag) = Flag::from_token(token) {
                flags |= flag as u8;
            } else if let Some(value) = token.strip_prefix(TIMEOUT_PREFIX) {
                match value.parse::<u32>() {
                    Ok(secs) if secs != 0 => timeout_secs = Some(secs),
                    _ => log::warn!("Ignoring invalid download timeout `{}`", value),
                }
            } else {
                log::warn!("Ignoring unknown option `{}`", token);
            }
        }

        if let Some((a, b)) = Flag::CONFLICTS
            .into_iter()
            .find(|(a, b)| a.is_in(flags) && b.is_in(flags))
        {
            return Err(OptionsError::Conflict(a.name(), b.name()));
        }

        let disk_kind = if Flag::Cd.is_in(flags) {
            DiskKind::Cd
        } else {
            DiskKind::Disk
        };

        let memory_class = if Flag::Reclaim.is_in(flags) {
            MemoryClass::BootServicesData
        } else {
            MemoryClass::Reserved
        };

        let advertise = if Flag::Nfit.is_in(flags) {
            Advertise::Always
        } else if Flag::NoNfit.is_in(flags) || !memory_class.survives_handoff() {
            Advertise::Never
        } else {
            Advertise::Auto
        };

        Ok(Self {
            locator,
            disk_kind,
            pause: Flag::Pause.is_in(flags),
            advertise,
            memory_class,
            timeout_secs,
        })
    }

    #[must_use]
    #[inline]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    #[must_use]
    #[inline]
    pub const fn disk_kind(&self) -> DiskKind {
        self.disk_kind
    }

    #[must_use]
    #[inline]
    /// Whether to wait for a keypress before starting a loader.
    pub const fn pause(&self) -> bool {
        self.pause
    }

    #[must_use]
    #[inline]
    pub const fn advertise(&self) -> Advertise {
        self.advertise
    }

    #[must_use]
    #[inline]
    pub const fn memory_class(&self) -> MemoryClass {
        self.memory_class
    }

    #[must_use]
    #[inline]
    /// Time allowed for the whole download, if limited.
    pub const fn timeout_secs(&self) -> Option<u32> {
        self.timeout_secs
    }
}

/// Converts a UCS-2 string to UTF-8 into `buffer`.
///
/// Conversion stops at the first NUL character. Unpaired surrogates are replaced with
/// `U+FFFD`, which the locator validation then rejects.
pub fn transcode_ucs2(
    ucs2: impl IntoIterator<Item = u16>,
    buffer: &mut [u8],
) -> Result<&str, OptionsError> {
    let units = ucs2.into_iter().take_while(|&unit| unit != 0);

    let mut len = 0;
    for c in char::decode_utf16(units) {
        let c = c.unwrap_or(char::REPLACEMENT_CHARACTER);
        let end = len + c.len_utf8();
        let Some(slot) = buffer.get_mut(len..end) else {
            return Err(OptionsError::TooLong(buffer.len()));
        };
        c.encode_utf8(slot);
        len = end;
    }

    Ok(core::str::from_utf8(&buffer[..len]).unwrap_or_default())
}
