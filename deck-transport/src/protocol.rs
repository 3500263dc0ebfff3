//! Protocol constants and report builders for Stream Deck style devices
//!
//! Two report families exist. Generation 1 (Mini) uses 17-byte feature
//! reports and a 16-byte image header; generation 2 (V2, MK.2, XL, Plus)
//! uses 32-byte feature reports and an 8-byte image header. Both split key
//! images into 1024-byte output reports.

use crate::device_registry::Generation;

/// Output report length for key image pages (both generations)
pub const IMAGE_REPORT_LEN: usize = 1024;

/// Maximum brightness percentage
pub const MAX_BRIGHTNESS: u8 = 100;

/// Generation 1 (Mini family) constants
pub mod gen1 {
    pub const FEATURE_REPORT_LEN: usize = 17;
    pub const IMAGE_HEADER_LEN: usize = 16;
    pub const RESET: [u8; 2] = [0x0B, 0x63];
    pub const BRIGHTNESS_PREFIX: [u8; 5] = [0x05, 0x55, 0xAA, 0xD1, 0x01];
    pub const IMAGE_REPORT_ID: u8 = 0x02;
    pub const IMAGE_COMMAND: u8 = 0x01;
    pub const SERIAL_REPORT_ID: u8 = 0x03;
    pub const FIRMWARE_REPORT_ID: u8 = 0x04;
    pub const SERIAL_OFFSET: usize = 5;
    pub const FIRMWARE_OFFSET: usize = 5;
    /// Key states start after the report ID
    pub const KEY_STATE_OFFSET: usize = 1;
}

/// Generation 2 (V2/MK.2/XL/Plus) constants
pub mod gen2 {
    pub const FEATURE_REPORT_LEN: usize = 32;
    pub const IMAGE_HEADER_LEN: usize = 8;
    pub const RESET: [u8; 2] = [0x03, 0x02];
    pub const BRIGHTNESS_PREFIX: [u8; 2] = [0x03, 0x08];
    pub const IMAGE_REPORT_ID: u8 = 0x02;
    pub const IMAGE_COMMAND: u8 = 0x07;
    pub const SERIAL_REPORT_ID: u8 = 0x06;
    pub const FIRMWARE_REPORT_ID: u8 = 0x05;
    pub const SERIAL_OFFSET: usize = 2;
    pub const FIRMWARE_OFFSET: usize = 6;
    /// Key states start after [report id, input type, len_lo, len_hi]
    pub const KEY_STATE_OFFSET: usize = 4;
    /// Input type byte (index 1) for key state reports; Plus also sends
    /// dial (0x03) and touchscreen (0x02) reports.
    pub const INPUT_TYPE_KEYS: u8 = 0x00;
}

/// Feature report length for a generation
pub fn feature_report_len(generation: Generation) -> usize {
    match generation {
        Generation::Gen1 => gen1::FEATURE_REPORT_LEN,
        Generation::Gen2 => gen2::FEATURE_REPORT_LEN,
    }
}

/// Image payload bytes carried by one output report
pub fn image_payload_len(generation: Generation) -> usize {
    match generation {
        Generation::Gen1 => IMAGE_REPORT_LEN - gen1::IMAGE_HEADER_LEN,
        Generation::Gen2 => IMAGE_REPORT_LEN - gen2::IMAGE_HEADER_LEN,
    }
}

/// Offset of the first key state byte in an input report
pub fn key_state_offset(generation: Generation) -> usize {
    match generation {
        Generation::Gen1 => gen1::KEY_STATE_OFFSET,
        Generation::Gen2 => gen2::KEY_STATE_OFFSET,
    }
}

/// Input report length needed to carry `key_count` key states
pub fn input_report_len(generation: Generation, key_count: u8) -> usize {
    key_state_offset(generation) + key_count as usize
}

/// Report ID and payload offset of the serial number feature report
pub fn serial_report(generation: Generation) -> (u8, usize) {
    match generation {
        Generation::Gen1 => (gen1::SERIAL_REPORT_ID, gen1::SERIAL_OFFSET),
        Generation::Gen2 => (gen2::SERIAL_REPORT_ID, gen2::SERIAL_OFFSET),
    }
}

/// Report ID and payload offset of the firmware version feature report
pub fn firmware_report(generation: Generation) -> (u8, usize) {
    match generation {
        Generation::Gen1 => (gen1::FIRMWARE_REPORT_ID, gen1::FIRMWARE_OFFSET),
        Generation::Gen2 => (gen2::FIRMWARE_REPORT_ID, gen2::FIRMWARE_OFFSET),
    }
}

fn padded(prefix: &[u8], len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    buf[..prefix.len()].copy_from_slice(prefix);
    buf
}

/// Feature report that blanks every key and shows the vendor logo
pub fn reset_report(generation: Generation) -> Vec<u8> {
    match generation {
        Generation::Gen1 => padded(&gen1::RESET, gen1::FEATURE_REPORT_LEN),
        Generation::Gen2 => padded(&gen2::RESET, gen2::FEATURE_REPORT_LEN),
    }
}

/// Feature report that sets the backlight (clamped to 0-100%)
pub fn brightness_report(generation: Generation, percent: u8) -> Vec<u8> {
    let percent = percent.min(MAX_BRIGHTNESS);
    match generation {
        Generation::Gen1 => {
            let mut buf = padded(&gen1::BRIGHTNESS_PREFIX, gen1::FEATURE_REPORT_LEN);
            buf[gen1::BRIGHTNESS_PREFIX.len()] = percent;
            buf
        }
        Generation::Gen2 => {
            let mut buf = padded(&gen2::BRIGHTNESS_PREFIX, gen2::FEATURE_REPORT_LEN);
            buf[gen2::BRIGHTNESS_PREFIX.len()] = percent;
            buf
        }
    }
}

/// Split an encoded key image into output reports
///
/// Each report is exactly [`IMAGE_REPORT_LEN`] bytes, zero padded. The last
/// page carries the "final" flag. An empty image produces no reports.
pub fn image_reports(generation: Generation, key: u8, image: &[u8]) -> Vec<Vec<u8>> {
    let payload_len = image_payload_len(generation);
    image
        .chunks(payload_len)
        .enumerate()
        .map(|(page, chunk)| {
            let is_last = (page + 1) * payload_len >= image.len();
            let header = image_header(generation, key, page as u16, chunk.len() as u16, is_last);
            let mut report = vec![0u8; IMAGE_REPORT_LEN];
            report[..header.len()].copy_from_slice(&header);
            report[header.len()..header.len() + chunk.len()].copy_from_slice(chunk);
            report
        })
        .collect()
}

fn image_header(generation: Generation, key: u8, page: u16, len: u16, is_last: bool) -> Vec<u8> {
    match generation {
        Generation::Gen1 => {
            let mut header = vec![0u8; gen1::IMAGE_HEADER_LEN];
            header[0] = gen1::IMAGE_REPORT_ID;
            header[1] = gen1::IMAGE_COMMAND;
            header[2] = page as u8;
            header[4] = is_last as u8;
            // Generation 1 numbers keys from 1
            header[5] = key + 1;
            header
        }
        Generation::Gen2 => {
            let [len_lo, len_hi] = len.to_le_bytes();
            let [page_lo, page_hi] = page.to_le_bytes();
            vec![
                gen2::IMAGE_REPORT_ID,
                gen2::IMAGE_COMMAND,
                key,
                is_last as u8,
                len_lo,
                len_hi,
                page_lo,
                page_hi,
            ]
        }
    }
}

/// Decode a NUL-terminated ASCII string from a feature report payload
pub fn decode_report_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}
