//! Decoded route-announcement records
//!
//! The ingestion pipeline consumes `Announcement` values produced by an
//! external route-dump decoder. AS-path tokens arrive as text: usually plain
//! ASNs, occasionally an AS-SET aggregation like `{64512,64513}`. AS-SETs
//! carry no ordering, so the parser falls back to the first embedded member
//! and logs the guess; a token with no extractable ASN fails the whole
//! record, which the caller skips with a warning.

use ipnet::IpNet;
use thiserror::Error;
use tracing::debug;

/// One decoded route announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// The collector peer this announcement was learned from
    pub feed_asn: u32,
    /// The announced prefix
    pub prefix: IpNet,
    /// Ordered AS-path hops, collector side first, origin last
    pub hops: Vec<u32>,
}

/// Failure to interpret an AS-path token sequence
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathTokenError {
    #[error("empty AS path")]
    Empty,

    #[error("unparseable AS-path token '{0}'")]
    Unparseable(String),
}

/// Parse textual AS-path tokens into an ordered hop sequence
///
/// A token of the form `{N,...}` resolves to its first embedded numeric AS.
pub fn parse_path_tokens<'a, I>(tokens: I) -> Result<Vec<u32>, PathTokenError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hops = Vec::new();
    for token in tokens {
        if let Ok(asn) = token.parse::<u32>() {
            hops.push(asn);
            continue;
        }

        let inner = token.trim_start_matches('{').trim_end_matches('}');
        let first = inner
            .split(',')
            .map(str::trim)
            .find_map(|member| member.parse::<u32>().ok());
        match first {
            Some(asn) => {
                debug!("AS-SET token '{}': guessing first member AS{}", token, asn);
                hops.push(asn);
            }
            None => return Err(PathTokenError::Unparseable(token.to_string())),
        }
    }

    if hops.is_empty() {
        return Err(PathTokenError::Empty);
    }
    Ok(hops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_tokens() {
        let hops = parse_path_tokens(["100", "200", "300"]).unwrap();
        assert_eq!(hops, vec![100, 200, 300]);
    }

    #[test]
    fn test_as_set_takes_first_member() {
        let hops = parse_path_tokens(["100", "{64512,64513}", "300"]).unwrap();
        assert_eq!(hops, vec![100, 64512, 300]);

        // spaces inside the set are tolerated
        let hops = parse_path_tokens(["{ 64512, 64513 }"]).unwrap();
        assert_eq!(hops, vec![64512]);
    }

    #[test]
    fn test_unparseable_token_fails_record() {
        let err = parse_path_tokens(["100", "{}", "300"]).unwrap_err();
        assert_eq!(err, PathTokenError::Unparseable("{}".to_string()));

        let err = parse_path_tokens(["abc"]).unwrap_err();
        assert!(matches!(err, PathTokenError::Unparseable(_)));
    }

    #[test]
    fn test_empty_path() {
        let err = parse_path_tokens([]).unwrap_err();
        assert_eq!(err, PathTokenError::Empty);
    }
}
