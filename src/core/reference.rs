//! Parsing of human-facing post URLs.
//!
//! A post page looks like `https://nozomi.la/post/26905532.html#tag`. The
//! identifier is the digit run right after `post/`.

use super::error::NozomiError;

const POST_SEGMENT: &str = "post/";

/// Characters that may end the identifier run (besides end of input)
const RUN_TERMINATORS: [char; 3] = ['.', '#', '?'];

/// Extract the post identifier from a post page URL.
///
/// The first `post/` followed by at least one digit, ending at `.`, `#`,
/// `?` or end of input, wins. Sharded record paths (`post/9/26/4269.json`),
/// media asset URLs and anything else without such a run fail with
/// [`NozomiError::InvalidUrlFormat`].
pub fn parse_reference(reference: &str) -> Result<u32, NozomiError> {
    for (start, _) in reference.match_indices(POST_SEGMENT) {
        let rest = &reference[start + POST_SEGMENT.len()..];
        let digits_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());

        let terminated = rest[digits_len..]
            .chars()
            .next()
            .map_or(true, |c| RUN_TERMINATORS.contains(&c));
        if digits_len == 0 || !terminated {
            continue;
        }

        return rest[..digits_len].parse::<u32>().map_err(|_| {
            NozomiError::InvalidUrlFormat(format!(
                "post identifier out of range in '{}'",
                reference
            ))
        });
    }

    Err(NozomiError::InvalidUrlFormat(format!(
        "no post identifier found in '{}'",
        reference
    )))
}
