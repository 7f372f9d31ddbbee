//! Octal and string field codecs for the 512-byte header.
//!
//! Three octal layouts are in use:
//!
//! - short fields (`mode`, `uid`, `gid`, `devmajor`, `devminor`): digits in
//!   `[0, N-2)` left-padded with spaces, then a space, then a NUL
//! - long fields (`size`, `mtime`): digits in `[0, N-1)` left-padded with
//!   spaces, then a space
//! - the checksum: digits in `[0, N-2)` left-padded with spaces, then a NUL,
//!   then a space

use crate::error::HeaderError;

/// Writes `value` right-aligned into `digits`, left-padding with spaces.
fn put_digits(
    field: &'static str,
    value: u64,
    digits: &mut [u8],
) -> Result<(), HeaderError> {
    let octal = format!("{:o}", value);
    if octal.len() > digits.len() {
        return Err(HeaderError::ValueTooLarge { field, value });
    }

    let pad = digits.len() - octal.len();
    digits[..pad].fill(b' ');
    digits[pad..].copy_from_slice(octal.as_bytes());
    Ok(())
}

/// Short octal field: `<spaces><digits> \0`.
pub(crate) fn write_octal(
    field: &'static str,
    value: u64,
    buf: &mut [u8],
) -> Result<(), HeaderError> {
    let n = buf.len();
    put_digits(field, value, &mut buf[..n - 2])?;
    buf[n - 2] = b' ';
    buf[n - 1] = 0;
    Ok(())
}

/// Long octal field: `<spaces><digits> `, one more digit than a short field.
pub(crate) fn write_long_octal(
    field: &'static str,
    value: u64,
    buf: &mut [u8],
) -> Result<(), HeaderError> {
    let n = buf.len();
    put_digits(field, value, &mut buf[..n - 1])?;
    buf[n - 1] = b' ';
    Ok(())
}

/// Checksum field: `<spaces><digits>\0 `.
pub(crate) fn write_checksum(value: u64, buf: &mut [u8]) -> Result<(), HeaderError> {
    let n = buf.len();
    put_digits("checksum", value, &mut buf[..n - 2])?;
    buf[n - 2] = 0;
    buf[n - 1] = b' ';
    Ok(())
}

/// Parses any of the octal layouts.
///
/// Leading spaces and zeros are padding. Parsing stops at the first NUL, at a
/// space once a significant digit has been seen, or at any non-octal byte.
pub(crate) fn parse_octal(buf: &[u8]) -> u64 {
    let mut result = 0u64;
    let mut padding = true;

    for &byte in buf {
        match byte {
            0 => break,
            b' ' | b'0' if padding => continue,
            b' ' => break,
            b'0'..=b'7' => {
                padding = false;
                result = (result << 3) | u64::from(byte - b'0');
            }
            _ => break,
        }
    }

    result
}

/// Copies `value` into `buf` and NUL-pads the rest. `value` must fit.
pub(crate) fn write_str(value: &str, buf: &mut [u8]) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(buf.len());
    buf[..len].copy_from_slice(&bytes[..len]);
    buf[len..].fill(0);
}

/// Reads a NUL-terminated (or field-length) string.
pub(crate) fn parse_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
