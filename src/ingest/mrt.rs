//! MRT route-dump adapter
//!
//! Thin boundary over the external MRT decoder: opens a dump file (or URL),
//! keeps announcement elements, and normalizes them into `Announcement`
//! records for the ingestion pipeline. Elements without a usable AS path are
//! skipped with a warning; a dump that cannot be opened at all is a fatal
//! error for the whole run.

use anyhow::{anyhow, Result};
use bgpkit_parser::models::ElemType;
use bgpkit_parser::{BgpElem, BgpkitParser};
use tracing::warn;

use super::announcement::{parse_path_tokens, Announcement};

/// An opened MRT dump yielding normalized announcements
pub struct MrtSource {
    parser: BgpkitParser<Box<dyn std::io::Read + Send>>,
}

impl MrtSource {
    /// Open an MRT dump by path or URL
    pub fn open(path: &str) -> Result<Self> {
        let parser = BgpkitParser::new(path)
            .map_err(|e| anyhow!("Failed to open MRT dump '{}': {}", path, e))?;
        Ok(Self { parser })
    }

    /// Iterate the dump's announcement elements as normalized records
    pub fn announcements(self) -> impl Iterator<Item = Announcement> {
        self.parser
            .into_elem_iter()
            .filter_map(|elem| elem_to_announcement(&elem))
    }
}

/// Convert one decoded element into an announcement record
///
/// Withdrawals and other element types yield `None`; so do announcements
/// whose AS path is absent or unparseable (logged as skips).
pub(crate) fn elem_to_announcement(elem: &BgpElem) -> Option<Announcement> {
    match elem.elem_type {
        ElemType::ANNOUNCE => {}
        ElemType::WITHDRAW => return None,
    }

    let as_path = match &elem.as_path {
        Some(path) => path.to_string(),
        None => {
            warn!("skipping announcement for {}: no AS path", elem.prefix);
            return None;
        }
    };

    match parse_path_tokens(as_path.split_whitespace()) {
        Ok(hops) => Some(Announcement {
            feed_asn: elem.peer_asn.to_u32(),
            prefix: elem.prefix.prefix,
            hops,
        }),
        Err(e) => {
            warn!("skipping announcement for {}: {}", elem.prefix, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgpkit_parser::models::{AsPath, AsPathSegment, NetworkPrefix, Origin};
    use std::net::{IpAddr, Ipv4Addr};
    use std::str::FromStr;

    fn test_elem(elem_type: ElemType, as_path: Option<AsPath>) -> BgpElem {
        BgpElem {
            timestamp: 1234567890.0,
            elem_type,
            peer_ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
            peer_asn: 65000.into(),
            prefix: NetworkPrefix::from_str("10.0.0.0/24").unwrap(),
            next_hop: Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
            as_path,
            origin_asns: Some(vec![65001.into()]),
            origin: Some(Origin::IGP),
            local_pref: Some(100),
            med: Some(0),
            communities: None,
            atomic: false,
            aggr_asn: None,
            aggr_ip: None,
            only_to_customer: None,
            unknown: None,
            deprecated: None,
        }
    }

    fn sequence_path(asns: &[u32]) -> AsPath {
        AsPath {
            segments: vec![AsPathSegment::AsSequence(
                asns.iter().map(|&a| a.into()).collect(),
            )],
        }
    }

    #[test]
    fn test_announce_converted() {
        let elem = test_elem(ElemType::ANNOUNCE, Some(sequence_path(&[65000, 65001])));
        let ann = elem_to_announcement(&elem).unwrap();

        assert_eq!(ann.feed_asn, 65000);
        assert_eq!(ann.prefix, "10.0.0.0/24".parse::<ipnet::IpNet>().unwrap());
        assert_eq!(ann.hops, vec![65000, 65001]);
    }

    #[test]
    fn test_withdraw_ignored() {
        let elem = test_elem(ElemType::WITHDRAW, Some(sequence_path(&[65000, 65001])));
        assert!(elem_to_announcement(&elem).is_none());
    }

    #[test]
    fn test_missing_as_path_skipped() {
        let elem = test_elem(ElemType::ANNOUNCE, None);
        assert!(elem_to_announcement(&elem).is_none());
    }

    #[test]
    fn test_open_missing_file_is_fatal() {
        assert!(MrtSource::open("/nonexistent/dump.mrt").is_err());
    }
}
