//!
//! Contains the vint codec and the value readers used when working with EBML encoded streams.
//!
//! Tag ids and element sizes are both encoded as vints, but they are decoded differently: a tag id keeps its marker bit (the id `0x1A45DFA3` is written as exactly those bytes), while a size has the marker stripped before the remaining bits are reassembled.
//!

use std::convert::TryInto;

use super::element::EbmlSize;
use super::errors::tool::ToolError;

///
/// Trait to enable easy serialization to a vint.
///
/// This is only available for types that can be cast as `u64`.  The all-ones pattern of each width is reserved for "unknown size" and is never produced.
///
pub trait Vint: Into<u64> + Copy {
    ///
    /// Returns a representation of the current value as a vint array.
    ///
    /// # Errors
    ///
    /// This can return an error if the value is too large to be representable as a vint.
    ///
    fn as_vint(&self) -> Result<Vec<u8>, ToolError> {
        let val: u64 = (*self).into();
        check_size_u64(val, 8)?;
        let mut length = 1;
        while length <= 8 {
            if val < (1 << (7 * length)) - 1 {
                break;
            }
            length += 1;
        }

        Ok(as_vint_no_check_u64(val, length))
    }

    ///
    /// Returns a representation of the current value as a vint array with a specified length.
    ///
    /// # Errors
    ///
    /// This can return an error if the value is too large to be representable as a vint.
    ///
    fn as_vint_with_length(&self, length: usize) -> Result<Vec<u8>, ToolError> {
        let val: u64 = (*self).into();
        if length == 0 || length > 8 {
            return Err(ToolError::WriteVintOverflow(val));
        }
        check_size_u64(val, length)?;
        Ok(as_vint_no_check_u64(val, length))
    }
}

impl Vint for u64 { }
impl Vint for u32 { }
impl Vint for u16 { }
impl Vint for u8 { }

#[inline]
fn check_size_u64(val: u64, max_length: usize) -> Result<(), ToolError> {
    if val >= (1 << (max_length * 7)) - 1 {
        Err(ToolError::WriteVintOverflow(val))
    } else {
        Ok(())
    }
}

#[inline]
fn as_vint_no_check_u64(val: u64, length: usize) -> Vec<u8> {
    let bytes: [u8; 8] = val.to_be_bytes();
    let mut result: Vec<u8> = Vec::from(&bytes[(8-length)..]);
    result[0] |= 1 << (8 - length);
    result
}

///
/// The 8 byte "unknown size" marker, used for live streams where a master element's length isn't known when it is written.
///
pub const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

///
/// Reads a vint from the beginning of the input array slice.
///
/// This method returns an option with the `None` variant used to indicate there was not enough data in the buffer to completely read a vint.  Callers should retry from the same position once more data is available.
///
/// The returned tuple contains the value of the vint (`u64`) and the length of the vint (`usize`).  When `strip_marker` is false, the marker bit is kept as part of the value - this is how tag ids are read.
///
/// # Errors
///
/// This method can return a `ToolError` if the input array cannot be read as a vint (a leading `0x00` byte would need more than 8 bytes).
///
pub fn read_vint(buffer: &[u8], strip_marker: bool) -> Result<Option<(u64, usize)>, ToolError> {
    if buffer.is_empty() {
        return Ok(None);
    }

    if buffer[0] == 0 {
        return Err(ToolError::ReadVintOverflow)
    }

    let length = 8 - buffer[0].ilog2() as usize;

    if length > buffer.len() {
        // Not enough data in the buffer to read out the vint value
        return Ok(None);
    }

    let mut value = buffer[0] as u64;
    if strip_marker {
        value -= 1 << (8 - length);
    }

    for item in buffer.iter().take(length).skip(1) {
        value <<= 8;
        value += *item as u64;
    }

    Ok(Some((value, length)))
}

///
/// Reads a tag id (marker bit retained) from the beginning of the input array slice.
///
pub fn read_tag_id(buffer: &[u8]) -> Result<Option<(u64, usize)>, ToolError> {
    read_vint(buffer, false)
}

///
/// Reads an element size from the beginning of the input array slice.
///
/// A size whose data bits are all ones is the reserved "unknown size" value and is returned as [`EbmlSize::Unknown`].
///
pub fn read_size(buffer: &[u8]) -> Result<Option<(EbmlSize, usize)>, ToolError> {
    Ok(read_vint(buffer, true)?.map(|(value, length)| (EbmlSize::new(value, length), length)))
}

///
/// Returns the bytes of a tag id as they appear in a stream.
///
/// Tag ids keep their marker, so this is simply the big endian representation without leading zero bytes.
///
pub fn tag_id_bytes(tag: u64) -> Vec<u8> {
    let bytes = tag.to_be_bytes();
    let skip = bytes.iter().take(7).take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

///
/// Trait to enable easy serialization to a signed vint.
///
/// This is only available for types that can be cast as `i64`.  A signed vint can be written as a variable number of bytes just like a regular vint, but the value portion of the vint is expressed in two's complement notation.
///
/// For example, the decimal number "-33" would be written as [0xDF = 1101 1111].  This value is determined by first taking the two's complement of 33 [0x21 = 0010 0001] **but only using the bits available for the vint value**.  In this case, that is 7 bits (because the vint marker takes up the 8th bit).  The two's complement is [101 1111]. Once the two's complement has been found, simply prepend the vint marker as usual to get [1101 1111 = 0xDF].
///
/// Some more examples:
/// ```
/// use ebml_streaming::tools::SignedVint;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// assert_eq!(vec![0xDF], (-33i64).as_signed_vint()?);
/// assert_eq!(vec![0x40, 0xC8], (200i64).as_signed_vint()?);
/// assert_eq!(vec![0x7F, 0x38], (-200i64).as_signed_vint()?);
/// # Ok(())
/// # }
/// ```
pub trait SignedVint: Into<i64> + Copy {
    ///
    /// Returns a representation of the current value as a vint array.
    ///
    /// # Errors
    ///
    /// This can return an error if the value is outside of the range that can be represented as a vint.
    ///
    fn as_signed_vint(&self) -> Result<Vec<u8>, ToolError> {
        let val: i64 = (*self).into();
        check_size_i64(val, 8)?;
        let mut length = 1;
        while length <= 8 {
            if val >= -(1 << (7 * length - 1)) && val < (1 << (7 * length - 1)) {
                break;
            }
            length += 1;
        }

        Ok(as_vint_no_check_i64(val, length))
    }
}

impl SignedVint for i64 { }
impl SignedVint for i32 { }
impl SignedVint for i16 { }
impl SignedVint for i8 { }

#[inline]
fn check_size_i64(val: i64, max_length: usize) -> Result<(), ToolError> {
    if val <= -(1 << (max_length * 7 - 1)) || val >= (1 << (max_length * 7 - 1)) {
        Err(ToolError::WriteSignedVintOverflow(val))
    } else {
        Ok(())
    }
}

#[inline]
fn as_vint_no_check_i64(val: i64, length: usize) -> Vec<u8> {
    let bytes: [u8; 8] = val.to_be_bytes();
    let mut result: Vec<u8> = Vec::from(&bytes[(8-length)..]);
    if val < 0 {
        result[0] &= 0xFF >> (length-1);
    } else {
        result[0] |= 1 << (8 - length);
    }
    result
}

///
/// Reads a signed vint from the beginning of the input array slice.
///
/// This method returns an option with the `None` variant used to indicate there was not enough data in the buffer to completely read a vint.
///
/// # Errors
///
/// This method can return a `ToolError` if the input array cannot be read as a vint.
///
pub fn read_signed_vint(buffer: &[u8]) -> Result<Option<(i64, usize)>, ToolError> {
    if buffer.is_empty() {
        return Ok(None);
    }

    if buffer[0] == 0 {
        return Err(ToolError::ReadVintOverflow)
    }

    let length = 8 - buffer[0].ilog2() as usize;

    if length > buffer.len() {
        return Ok(None);
    }

    let is_negative = if length == 8 {
        buffer[1] & 0x80
    } else {
        buffer[0] & (0x80 >> length)
    } > 0;

    let mut value = if is_negative {
        (buffer[0] as i64) | (!0i64 << (8 - length))
    } else {
        (buffer[0] & (0xFF >> length)) as i64
    };

    for item in buffer.iter().take(length).skip(1) {
        value <<= 8;
        value += *item as i64;
    }

    Ok(Some((value, length)))
}

///
/// Reads a `u64` value from any length array slice.
///
/// Rather than forcing the input to be a `[u8; 8]` like standard library methods, this can interpret a `u64` from a slice of any length <= 8.  An empty slice reads as zero.
///
/// # Errors
///
/// This method will return an error if the input slice has a length > 8.
///
/// ## Example
///
/// ```
/// # use ebml_streaming::tools::arr_to_u64;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let result = arr_to_u64(&[16,0])?;
/// assert_eq!(result, 4096);
/// # Ok(())
/// # }
/// ```
///
pub fn arr_to_u64(arr: &[u8]) -> Result<u64, ToolError> {
    if arr.len() > 8 {
        return Err(ToolError::ReadU64Overflow(Vec::from(arr)));
    }

    let mut val = 0u64;
    for byte in arr {
        val = (val << 8) | *byte as u64;
    }
    Ok(val)
}

///
/// Reads an `i64` value from any length array slice.
///
/// The value is sign extended from the width of the slice, so `[0xFF]` reads as `-1`.  An empty slice reads as zero.
///
/// # Errors
///
/// This method will return an error if the input slice has a length > 8.
///
/// ## Example
///
/// ```
/// # use ebml_streaming::tools::arr_to_i64;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// assert_eq!(arr_to_i64(&[4,0])?, 1024);
/// assert_eq!(arr_to_i64(&[0xFF, 0xFE])?, -2);
/// # Ok(())
/// # }
/// ```
///
pub fn arr_to_i64(arr: &[u8]) -> Result<i64, ToolError> {
    if arr.len() > 8 {
        return Err(ToolError::ReadI64Overflow(Vec::from(arr)));
    }

    if arr.is_empty() {
        return Ok(0);
    }

    let unsigned = arr_to_u64(arr)?;
    if arr.len() == 8 || arr[0] < 0x80 {
        Ok(unsigned as i64)
    } else {
        let shift = 64 - arr.len() * 8;
        Ok(((unsigned << shift) as i64) >> shift)
    }
}

///
/// Reads an `f64` value from an array slice of length 0, 4 or 8.
///
/// This method wraps `f32` and `f64` conversions from big endian byte arrays and casts the result as an `f64`.  An empty slice reads as zero.
///
/// # Errors
///
/// This method will return an error if the input slice length is not 0, 4 or 8.
///
pub fn arr_to_f64(arr: &[u8]) -> Result<f64, ToolError> {
    match arr.len() {
        0 => Ok(0.0),
        4 => Ok(f32::from_be_bytes(arr.try_into().map_err(|_| ToolError::ReadF64Mismatch(Vec::from(arr)))?) as f64),
        8 => Ok(f64::from_be_bytes(arr.try_into().map_err(|_| ToolError::ReadF64Mismatch(Vec::from(arr)))?)),
        _ => Err(ToolError::ReadF64Mismatch(Vec::from(arr))),
    }
}

fn trim_padding(arr: &[u8]) -> &[u8] {
    let end = arr.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);
    &arr[..end]
}

///
/// Reads an EBML `string` element (printable ASCII).
///
/// Trailing NUL padding is dropped.  Bytes outside of the ASCII range are replaced with U+FFFD rather than failing the element.
///
pub fn arr_to_ascii(arr: &[u8]) -> String {
    trim_padding(arr)
        .iter()
        .map(|b| if b.is_ascii() { *b as char } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

///
/// Reads an EBML `utf-8` element.
///
/// # Errors
///
/// This method will return an error if the data (minus any trailing NUL padding) is not valid UTF-8.
///
pub fn arr_to_utf8(arr: &[u8]) -> Result<String, ToolError> {
    String::from_utf8(trim_padding(arr).to_vec()).map_err(ToolError::FromUtf8Error)
}

///
/// Reads an EBML `date` element: signed nanoseconds relative to 2001-01-01T00:00:00 UTC.
///
/// # Errors
///
/// Dates are either empty (meaning the epoch itself) or exactly 8 bytes long; any other length returns an error.
///
pub fn arr_to_date(arr: &[u8]) -> Result<i64, ToolError> {
    match arr.len() {
        0 => Ok(0),
        8 => arr_to_i64(arr),
        _ => Err(ToolError::ReadDateMismatch(Vec::from(arr))),
    }
}

///
/// Converts an EBML date value into a `chrono` timestamp.
///
/// Returns `None` if the result falls outside of the range `chrono` can represent.
///
#[cfg(feature = "chrono")]
pub fn date_to_chrono(nanos: i64) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::TimeZone;

    let epoch = chrono::NaiveDate::from_ymd_opt(2001, 1, 1)?.and_hms_opt(0, 0, 0)?;
    chrono::Utc.from_utc_datetime(&epoch).checked_add_signed(chrono::Duration::nanoseconds(nanos))
}

///
/// Returns the shortest big endian representation of `val`.  Zero is written as an empty array.
///
pub fn u64_to_arr(val: u64) -> Vec<u8> {
    let bytes = val.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

///
/// Returns the shortest two's complement big endian representation of `val`.  Zero is written as an empty array.
///
pub fn i64_to_arr(val: i64) -> Vec<u8> {
    if val == 0 {
        return Vec::new();
    }

    let bytes = val.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] < 0x80) || (bytes[start] == 0xFF && bytes[start + 1] >= 0x80);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_vint_sixteen() {
        let buffer = [144];
        let result = read_vint(&buffer, true).unwrap().expect("Reading vint failed");

        assert_eq!(16, result.0);
        assert_eq!(1, result.1);
    }

    #[test]
    fn write_vint_sixteen() {
        let result = 16u64.as_vint().expect("Writing vint failed");
        assert_eq!(vec![144u8], result);
    }

    #[test]
    fn read_size_one_twenty_seven_is_unknown() {
        let buffer = [255u8];
        let result = read_size(&buffer).unwrap().expect("Reading size failed");

        assert_eq!(EbmlSize::Unknown, result.0);
        assert_eq!(1, result.1);
    }

    #[test]
    fn write_vint_one_twenty_seven() {
        // 0xFF is reserved for unknown sizes, so 127 needs two bytes
        let result = 127u64.as_vint().expect("Writing vint failed");
        assert_eq!(vec![0x40u8, 0x7F], result);
    }

    #[test]
    fn read_vint_two_hundred() {
        let buffer = [64, 200];
        let result = read_vint(&buffer, true).unwrap().expect("Reading vint failed");

        assert_eq!(200, result.0);
        assert_eq!(2, result.1);
    }

    #[test]
    fn write_vint_two_hundred() {
        let result = 200u64.as_vint().expect("Writing vint failed");
        assert_eq!(vec![64u8, 200u8], result);
    }

    #[test]
    fn read_tag_keeps_marker() {
        let buffer = [0x1a, 0x45, 0xdf, 0xa3, 0x84];
        let result = read_tag_id(&buffer).unwrap().expect("Reading tag failed");

        assert_eq!(0x1a45dfa3, result.0);
        assert_eq!(4, result.1);
    }

    #[test]
    fn read_length_strips_marker() {
        let buffer = [0x1a, 0x45, 0xdf, 0xa3];
        let result = read_vint(&buffer, true).unwrap().expect("Reading vint failed");

        assert_eq!(0x0a45dfa3, result.0);
        assert_eq!(4, result.1);
    }

    #[test]
    fn read_vint_very_long() {
        let buffer = [1, 0, 0, 0, 0, 0, 0, 1];
        let result = read_vint(&buffer, true).unwrap().expect("Reading vint failed");

        assert_eq!(1, result.0);
        assert_eq!(8, result.1);
    }

    #[test]
    fn write_vint_very_long() {
        let result = 1u64.as_vint_with_length(8).expect("Writing vint failed");
        assert_eq!(vec![1, 0, 0, 0, 0, 0, 0, 1], result);
    }

    #[test]
    fn read_vint_incomplete() {
        let buffer = [1, 0, 0, 0];
        let result = read_vint(&buffer, true).expect("Reading vint failed");

        assert!(result.is_none());
    }

    #[test]
    fn read_vint_zero_lead() {
        assert!(matches!(read_vint(&[0, 0x81], false), Err(ToolError::ReadVintOverflow)));
    }

    #[test]
    fn unknown_size_every_width() {
        for width in 1..=8usize {
            let mut buffer = vec![0xFFu8; width];
            buffer[0] = 0xFF >> (width - 1);
            let (size, length) = read_size(&buffer).unwrap().unwrap();
            assert_eq!(EbmlSize::Unknown, size, "width {}", width);
            assert_eq!(width, length);
        }
        assert_eq!(Some((EbmlSize::Unknown, 8)), read_size(&UNKNOWN_SIZE).unwrap());
    }

    #[test]
    #[should_panic]
    fn too_big_for_vint() {
        (1u64 << 56).as_vint().expect("Writing vint failed");
    }

    #[test]
    fn vint_encode_decode_range() {
        for val in 0..500_000u64 {
            let bytes = val.as_vint().unwrap();
            let result = read_vint(bytes.as_slice(), true).unwrap().unwrap().0;
            assert_eq!(val, result);
        }
    }

    #[test]
    fn signed_vint_encode_decode_range() {
        for val in -500_000..500_000i64 {
            let bytes = val.as_signed_vint().unwrap();
            let result = read_signed_vint(bytes.as_slice()).unwrap().unwrap().0;
            assert_eq!(val, result);
        }
    }

    #[test]
    fn tag_bytes() {
        assert_eq!(vec![0x1a, 0x45, 0xdf, 0xa3], tag_id_bytes(0x1a45dfa3));
        assert_eq!(vec![0xa3], tag_id_bytes(0xa3));
        assert_eq!(vec![0x42, 0x86], tag_id_bytes(0x4286));
    }

    #[test]
    fn read_u64_values() {
        let mut buffer = vec![];
        let mut expected = 0;
        for _ in 0..8 {
            buffer.push(0x25);
            expected = (expected << 8) + 0x25;

            let result = arr_to_u64(&buffer).unwrap();
            assert_eq!(expected, result);
        }
        assert!(arr_to_u64(&[1; 9]).is_err());
    }

    #[test]
    fn read_i64_values() {
        let mut buffer = vec![];
        let mut expected = 0;
        for _ in 0..8 {
            buffer.push(0x0a);
            expected = (expected << 8) + 0x0a;

            let result = arr_to_i64(&buffer).unwrap();
            assert_eq!(expected, result);

            let neg_result = arr_to_i64(&(buffer.iter().map(|b| !b).collect::<Vec<u8>>())).unwrap() + 1;
            assert_eq!(-expected, neg_result);
        }
        assert_eq!(0, arr_to_i64(&[]).unwrap());
    }

    #[test]
    fn minimal_integer_arrays() {
        for val in [0i64, 1, -1, 127, 128, -128, -129, 40_000, -40_000, i64::MAX, i64::MIN] {
            assert_eq!(val, arr_to_i64(&i64_to_arr(val)).unwrap(), "value {}", val);
        }
        assert_eq!(vec![0x00, 0x80], i64_to_arr(128));
        assert_eq!(vec![0xFF], i64_to_arr(-1));
        assert!(u64_to_arr(0).is_empty());
        assert_eq!(vec![0x01, 0x00], u64_to_arr(256));
    }

    #[test]
    fn read_floats() {
        assert_eq!(0.0, arr_to_f64(&[]).unwrap());
        assert_eq!(1.5, arr_to_f64(&1.5f32.to_be_bytes()).unwrap());
        assert_eq!(-2.25, arr_to_f64(&(-2.25f64).to_be_bytes()).unwrap());
        assert!(arr_to_f64(&[0, 0, 0]).is_err());
    }

    #[test]
    fn read_strings() {
        assert_eq!("webm", arr_to_ascii(b"webm\0\0"));
        assert_eq!("a\u{FFFD}", arr_to_ascii(&[b'a', 0xC3]));
        assert_eq!("h\u{e9}llo", arr_to_utf8("h\u{e9}llo\0".as_bytes()).unwrap());
        assert!(matches!(arr_to_utf8(&[0xC3, 0x28]), Err(ToolError::FromUtf8Error(_))));
    }

    #[test]
    fn read_dates() {
        assert_eq!(0, arr_to_date(&[]).unwrap());
        assert_eq!(-5, arr_to_date(&(-5i64).to_be_bytes()).unwrap());
        assert!(arr_to_date(&[1, 2, 3]).is_err());
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn chrono_dates() {
        let date = date_to_chrono(1_000_000_000).unwrap();
        assert_eq!("2001-01-01T00:00:01+00:00", date.to_rfc3339());
    }
}
