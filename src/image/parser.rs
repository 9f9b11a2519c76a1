//! TI-TXT tokenizer and state machine.

use crate::error::{Result, TagError};
use crate::image::{FirmwareImage, ImageSection};
use crate::protocol::constants::SECTION_CAPACITY;

/// Parser states.
///
/// ```text
///            @addr                q
/// Initial ----------> Section --------> Done
///                     |  ^  |
///                     |  |  | @addr (commit, open next)
///                     |  +--+
///                     | byte
///                     +----->
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing seen yet; only a section marker may open the image
    Initial,
    /// Inside a section; bytes, a new marker, or the terminator follow
    Section,
    /// Terminator seen; any further token is an error
    Done,
}

/// An open, not yet committed section.
struct OpenSection {
    address: u32,
    data: heapless::Vec<u8, SECTION_CAPACITY>,
}

pub(super) fn parse(text: &str) -> Result<FirmwareImage> {
    let mut image = FirmwareImage::default();
    let mut state = State::Initial;
    let mut open: Option<OpenSection> = None;

    for token in text.split_whitespace() {
        state = match state {
            State::Initial | State::Section => step(&mut image, &mut open, state, token)?,
            State::Done => return Err(TagError::trailing_token(token)),
        };
    }

    if state != State::Done {
        return Err(TagError::unterminated_image());
    }
    Ok(image)
}

fn step(
    image: &mut FirmwareImage,
    open: &mut Option<OpenSection>,
    state: State,
    token: &str,
) -> Result<State> {
    if let Some(hex) = token.strip_prefix('@') {
        let address = parse_address(hex)?;
        commit(image, open.take())?;
        *open = Some(OpenSection {
            address,
            data: heapless::Vec::new(),
        });
        return Ok(State::Section);
    }

    if token == "q" {
        if state != State::Section {
            return Err(TagError::unexpected_token(token));
        }
        commit(image, open.take())?;
        return Ok(State::Done);
    }

    if state == State::Section && is_data_byte(token) {
        let byte = u8::from_str_radix(token, 16).map_err(|_| TagError::unexpected_token(token))?;
        let section = open.as_mut().ok_or_else(TagError::unterminated_image)?;
        section
            .data
            .push(byte)
            .map_err(|_| TagError::section_too_large())?;
        return Ok(State::Section);
    }

    Err(TagError::unexpected_token(token))
}

/// Data bytes are exactly two hex digits; longer runs are rejected so
/// that a missing separator does not silently merge bytes.
fn is_data_byte(token: &str) -> bool {
    token.len() == 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_address(hex: &str) -> Result<u32> {
    if hex.is_empty() || hex.len() > 8 {
        return Err(TagError::bad_address());
    }
    u32::from_str_radix(hex, 16).map_err(|_| TagError::bad_address())
}

fn commit(image: &mut FirmwareImage, open: Option<OpenSection>) -> Result<()> {
    if let Some(section) = open {
        image.commit(ImageSection::new(section.address, section.data))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TagError;

    #[test]
    fn test_single_section() {
        let image = parse("@F860\nAA BB CC\nq\n").unwrap();
        assert_eq!(image.sections().len(), 1);
        assert_eq!(image.sections()[0].address(), 0xF860);
        assert_eq!(image.sections()[0].data(), &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_multiple_sections_keep_order() {
        let image = parse("@F998 01 80 @F860 AA q").unwrap();
        assert_eq!(image.sections().len(), 2);
        assert_eq!(image.sections()[0].address(), 0xF998);
        assert_eq!(image.sections()[1].address(), 0xF860);
    }

    #[test]
    fn test_mixed_case_hex() {
        let image = parse("@f860 aA Bb q").unwrap();
        assert_eq!(image.sections()[0].data(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_empty_section_is_legal() {
        let image = parse("@F860 q").unwrap();
        assert_eq!(image.sections().len(), 1);
        assert!(image.sections()[0].is_empty());
    }

    #[test]
    fn test_crlf_and_tabs() {
        let image = parse("@F860\r\n\tAA\t BB\r\nq").unwrap();
        assert_eq!(image.sections()[0].data(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_byte_before_section_is_rejected() {
        let err = parse("AA @F860 q").unwrap_err();
        match err {
            TagError::Parse(e) => assert_eq!(e.token(), Some("AA")),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_terminator_before_section_is_rejected() {
        assert!(parse("q").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_token_after_terminator_is_rejected() {
        let err = parse("@F860 AA q BB").unwrap_err();
        match err {
            TagError::Parse(e) => assert_eq!(e.token(), Some("BB")),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_missing_terminator_is_rejected() {
        let err = parse("@F860 AA BB").unwrap_err();
        match err {
            TagError::Parse(e) => assert!(e.is_unterminated()),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_three_digit_token_is_rejected() {
        assert!(parse("@F860 ABC q").is_err());
        assert!(parse("@F860 A q").is_err());
    }

    #[test]
    fn test_bad_address_is_rejected() {
        assert!(parse("@ q").is_err());
        assert!(parse("@XYZ q").is_err());
        assert!(parse("@123456789 AA q").is_err());
    }

    #[test]
    fn test_duplicate_address_replaces() {
        let image = parse("@F860 AA @F870 BB @F860 CC DD q").unwrap();
        assert_eq!(image.sections().len(), 2);
        assert_eq!(image.sections()[0].data(), &[0xCC, 0xDD]);
    }
}
