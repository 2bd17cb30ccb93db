//! Configuration the historical implementation hard-coded inline: this peripheral's own
//! identity strings and reader-config-data bytes. Lifting them here means pairing with a new
//! VMC never requires touching protocol logic, only these defaults.

use fixedstr::{str16, str4};

/// This peripheral's identity, reported in reply to EXPANSION_REQUEST_ID.
#[derive(Debug, Clone)]
pub struct Identity {
    pub manufacturer_code: str4,
    pub serial_number: str16,
    pub model: str16,
    pub software_version: [u8; 2],
}

impl Identity {
    pub fn new(manufacturer_code: &str, serial_number: &str, model: &str, software_version: [u8; 2]) -> Self {
        Self {
            manufacturer_code: str4::from(manufacturer_code),
            serial_number: str16::from(serial_number),
            model: str16::from(model),
            software_version,
        }
    }

    /// Manufacturer code, right-space-padded/truncated to the 3 bytes MDB puts on the wire.
    pub fn manufacturer_wire(&self) -> [u8; 3] {
        pad_ascii(self.manufacturer_code.as_str())
    }

    /// Serial number, right-space-padded/truncated to the 12 bytes MDB puts on the wire.
    pub fn serial_wire(&self) -> [u8; 12] {
        pad_ascii(self.serial_number.as_str())
    }

    /// Model number, right-space-padded/truncated to the 12 bytes MDB puts on the wire.
    pub fn model_wire(&self) -> [u8; 12] {
        pad_ascii(self.model.as_str())
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new("GEN", "000000000001", "MDB-CASHLESS", [0x01, 0x00])
    }
}

fn pad_ascii<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [b' '; N];
    let bytes = s.as_bytes();
    let n = bytes.len().min(N);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Fields reported in READER_CONFIG_DATA. Defaults match the configured-identity defaults
/// (feature level 1, country USA, scale 1, decimal places 2, 10s max response time, no misc
/// options); the leading opcode byte itself belongs to [`crate::response::reader_config_data`].
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    pub feature_level: u8,
    /// BCD country code, USA = 0x0001.
    pub country_code: u16,
    pub scale_factor: u8,
    pub decimal_places: u8,
    pub max_response_time_secs: u8,
    pub misc_options: u8,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            feature_level: 1,
            country_code: 0x0001,
            scale_factor: 1,
            decimal_places: 2,
            max_response_time_secs: 10,
            misc_options: 0,
        }
    }
}
