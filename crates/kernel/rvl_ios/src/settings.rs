//! Console settings files kept by Starlet.
//!
//! `setting.txt` holds region and model strings as `KEY=value` lines,
//! scrambled with a rotating XOR key. `SYSCONF` is a table of typed,
//! named entries describing user preferences such as the video mode.

use alloc::boxed::Box;

use log::{error, info, warn};
use rvl_hal::IpcHardware;
use rvl_rtos::Port;

use crate::{
    error::IosError,
    ios::{Ios, OpenMode},
};

pub const SETTINGS_PATH: &str = "/title/00000001/00000002/data/setting.txt";
pub const SYSCONF_PATH: &str = "/shared2/sys/SYSCONF";

pub const SETTINGS_LEN: usize = 256;
pub const SYSCONF_LEN: usize = 0x4000;

const SETTINGS_KEY: u32 = 0x73b5_dbfa;

fn read_file<P: Port, H: IpcHardware>(
    ios: &Ios<'_, P, H>,
    path: &str,
    buf: &mut [u8],
) -> Result<usize, IosError> {
    let fd = ios.open(path, OpenMode::READ)?;
    let read = ios.read(fd, buf);
    let closed = ios.close(fd);
    let len = read?;
    closed?;
    Ok(len)
}

/// Applies the `setting.txt` key stream. Its own inverse.
pub fn scramble(data: &mut [u8]) {
    let mut key = SETTINGS_KEY;
    for byte in data {
        *byte ^= key.to_be_bytes()[3];
        key = key.rotate_left(1);
    }
}

#[repr(C, align(32))]
struct SettingsData([u8; SETTINGS_LEN]);

/// Decrypted contents of `setting.txt`.
pub struct SettingsText {
    data: SettingsData,
}

impl SettingsText {
    pub fn load<P: Port, H: IpcHardware>(ios: &Ios<'_, P, H>) -> Result<Self, IosError> {
        let mut data = SettingsData([0; SETTINGS_LEN]);
        read_file(ios, SETTINGS_PATH, &mut data.0)?;
        Ok(Self::decrypt(data.0))
    }

    #[must_use]
    pub fn decrypt(mut data: [u8; SETTINGS_LEN]) -> Self {
        scramble(&mut data);
        Self {
            data: SettingsData(data),
        }
    }

    /// `KEY=value` pairs in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        let text = self.data.0.split(|&b| b == 0).next().unwrap_or_default();
        text.split(|&b| b == b'\n' || b == b'\r')
            .filter_map(|line| {
                let eq = line.iter().position(|&b| b == b'=')?;
                let key = core::str::from_utf8(&line[..eq]).ok()?;
                let value = core::str::from_utf8(&line[eq + 1..]).ok()?;
                Some((key, value))
            })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Value encoding of a `SYSCONF` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr)]
#[repr(u8)]
pub enum EntryType {
    /// Big-endian `u16` length minus one, then the bytes.
    BigArray = 1,
    /// `u8` length minus one, then the bytes.
    SmallArray = 2,
    Byte = 3,
    Short = 4,
    Long = 5,
    LongLong = 6,
    Bool = 7,
}

#[repr(C, align(32))]
struct SysConfData([u8; SYSCONF_LEN]);

/// The `SYSCONF` entry table.
///
/// Layout: magic, big-endian `u16` entry count at offset 4, then one
/// big-endian `u16` offset per entry. Each entry starts with a header byte
/// holding its type in the top three bits and its name length minus one
/// in the low five, followed by the name and the value.
pub struct SysConf {
    data: Box<SysConfData>,
}

impl SysConf {
    fn zeroed() -> Box<SysConfData> {
        // all-zero bytes are a valid `SysConfData`
        unsafe { Box::<SysConfData>::new_zeroed().assume_init() }
    }

    pub fn load<P: Port, H: IpcHardware>(ios: &Ios<'_, P, H>) -> Result<Self, IosError> {
        let mut data = Self::zeroed();
        read_file(ios, SYSCONF_PATH, &mut data.0)?;
        Ok(Self { data })
    }

    /// Parses a copy of `bytes`, truncated or zero-padded to
    /// [`SYSCONF_LEN`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = Self::zeroed();
        let len = bytes.len().min(SYSCONF_LEN);
        data.0[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    fn u16_at(&self, offset: usize) -> Option<usize> {
        let bytes = self.data.0.get(offset..offset + 2)?;
        Some(usize::from(u16::from_be_bytes([bytes[0], bytes[1]])))
    }

    /// Header byte and value bytes (up to the end of the file) of `key`.
    fn find(&self, key: &str) -> Option<(u8, &[u8])> {
        let count = self.u16_at(4)?;
        (0..count).find_map(|i| {
            let offset = self.u16_at(6 + i * 2)?;
            let header = *self.data.0.get(offset)?;
            let name_len = usize::from(header & 0x1f) + 1;
            let name = self.data.0.get(offset + 1..offset + 1 + name_len)?;
            (name == key.as_bytes()).then(|| (header >> 5, &self.data.0[offset + 1 + name_len..]))
        })
    }

    /// Copies the value of `key` into `buf`, truncated to fit.
    ///
    /// Returns the full length of the value, or 0 if the key is missing.
    pub fn get(&self, key: &str, buf: &mut [u8]) -> usize {
        let Some((ty, rest)) = self.find(key) else {
            return 0;
        };
        let Some(ty) = EntryType::from_repr(ty) else {
            error!("SYSCONF key {key} has unknown type {ty}");
            return 0;
        };
        let (len, value) = match (ty, rest) {
            (EntryType::BigArray, [hi, lo, value @ ..]) => {
                (usize::from(u16::from_be_bytes([*hi, *lo])) + 1, value)
            }
            (EntryType::SmallArray, [len, value @ ..]) => (usize::from(*len) + 1, value),
            (EntryType::Byte | EntryType::Bool, value) => (1, value),
            (EntryType::Short, value) => (2, value),
            (EntryType::Long, value) => (4, value),
            (EntryType::LongLong, value) => (8, value),
            (EntryType::BigArray | EntryType::SmallArray, _) => return 0,
        };
        let Some(value) = value.get(..len) else {
            return 0;
        };
        let copy = len.min(buf.len());
        buf[..copy].copy_from_slice(&value[..copy]);
        len
    }

    fn flag(&self, key: &str) -> bool {
        let mut value = [0];
        match self.get(key, &mut value) {
            1 => value[0] != 0,
            0 => {
                warn!("SYSCONF key {key} not found");
                false
            }
            len => {
                warn!("SYSCONF key {key} is {len} bytes, expected 1");
                false
            }
        }
    }

    /// `IPL.PGS`: the user enabled 480p.
    #[must_use]
    pub fn progressive_scan(&self) -> bool {
        self.flag("IPL.PGS")
    }

    /// `IPL.E60`: PAL consoles may use 60 Hz.
    #[must_use]
    pub fn eurgb60(&self) -> bool {
        self.flag("IPL.E60")
    }
}

/// Both settings files.
pub struct Settings {
    pub text: SettingsText,
    pub sysconf: SysConf,
}

impl<P: Port, H: IpcHardware> Ios<'_, P, H> {
    /// [`Ios::initialize`], then reads both settings files.
    pub fn initialize_with_settings(&self) -> Result<Settings, IosError> {
        self.initialize()?;
        let text = SettingsText::load(self)?;
        let sysconf = SysConf::load(self)?;
        info!("IOS settings loaded");
        Ok(Settings { text, sysconf })
    }
}
