use nom::{
    multi::length_data,
    number::complete::{le_u32, le_u8},
    IResult,
};

/// Byte string prefixed by a 4-byte little-endian length.
pub fn long_string(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(le_u32)(input)
}

/// Byte string prefixed by a single length byte.
pub fn short_string(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(le_u8)(input)
}

/// Reinterprets raw protocol text as-is.
pub fn lossy(v: &[u8]) -> String {
    String::from_utf8_lossy(v).into_owned()
}
