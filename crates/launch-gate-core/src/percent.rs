//! Fail-closed percent decoding for obfuscated configuration constants.

/// Decodes `%XX` escapes into the characters with those code points.
///
/// Every other character is copied verbatim. A `%` that is not followed by
/// two hexadecimal digits makes the whole decode fail, in which case the
/// empty string is returned.
///
/// # Example
/// ```rust
/// use launch_gate_core::decode_percent_ascii;
///
/// assert_eq!(decode_percent_ascii("%32%30%32%35-01"), "2025-01");
/// assert_eq!(decode_percent_ascii("bad%4"), "");
/// ```
pub fn decode_percent_ascii(raw: &str) -> String {
    let mut decoded = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            decoded.push(ch);
            continue;
        }

        let high = chars.next().and_then(|digit| digit.to_digit(16));
        let low = chars.next().and_then(|digit| digit.to_digit(16));
        let (Some(high), Some(low)) = (high, low) else {
            return String::new();
        };

        // Two hex digits never exceed 0xFF.
        decoded.push(char::from((high * 16 + low) as u8));
    }

    decoded
}
