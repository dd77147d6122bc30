//! Identifier shapes understood by the registry.

pub const CLUSTER_ID_LEN: usize = 5;
pub const PREFIX_LEN: usize = 5;
pub const SUFFIX_LEN: usize = 15;

/// A parsed `ccccc-ttttt-xxxxxxxxxxxxxxx` identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityUuid<'a> {
    cluster_id: &'a str,
    type_prefix: &'a str,
    suffix: &'a str,
}

impl<'a> EntityUuid<'a> {
    pub fn parse(raw: &'a str) -> Option<Self> {
        let mut parts = raw.split('-');
        let cluster_id = parts.next()?;
        let type_prefix = parts.next()?;
        let suffix = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if !is_valid_token(cluster_id, CLUSTER_ID_LEN)
            || !is_valid_token(type_prefix, PREFIX_LEN)
            || !is_valid_token(suffix, SUFFIX_LEN)
        {
            return None;
        }
        Some(Self {
            cluster_id,
            type_prefix,
            suffix,
        })
    }

    pub fn cluster_id(&self) -> &'a str {
        self.cluster_id
    }

    pub fn type_prefix(&self) -> &'a str {
        self.type_prefix
    }

    pub fn suffix(&self) -> &'a str {
        self.suffix
    }
}

/// `len` characters drawn from `[0-9a-z]`.
pub fn is_valid_token(raw: &str, len: usize) -> bool {
    raw.len() == len
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// `<32 hex md5>+<size>` optionally followed by `+hint` segments.
pub fn is_portable_data_hash(raw: &str) -> bool {
    let mut parts = raw.split('+');
    let Some(hash) = parts.next() else {
        return false;
    };
    let Some(size) = parts.next() else {
        return false;
    };
    hash.len() == 32
        && hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        && !size.is_empty()
        && size.bytes().all(|b| b.is_ascii_digit())
        && parts.all(|hint| !hint.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_uuid() {
        let parsed = EntityUuid::parse("zzzzz-4zz18-0123456789abcde").expect("uuid");
        assert_eq!(parsed.cluster_id(), "zzzzz");
        assert_eq!(parsed.type_prefix(), "4zz18");
        assert_eq!(parsed.suffix(), "0123456789abcde");
    }

    #[test]
    fn rejects_malformed_uuids() {
        for raw in [
            "zzzzz-4zz18",
            "zzzzz-4zz18-0123456789abcd",
            "zzzzz-4zz18-0123456789abcde-x",
            "ZZZZZ-4zz18-0123456789abcde",
            "zzzzz_4zz18_0123456789abcde",
        ] {
            assert!(EntityUuid::parse(raw).is_none(), "{raw}");
        }
    }

    #[test]
    fn recognizes_content_hashes() {
        assert!(is_portable_data_hash("d41d8cd98f00b204e9800998ecf8427e+0"));
        assert!(is_portable_data_hash(
            "d41d8cd98f00b204e9800998ecf8427e+1024+Kzzzzz"
        ));
        assert!(!is_portable_data_hash("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(!is_portable_data_hash("d41d8cd98f00b204e9800998ecf8427e+"));
        assert!(!is_portable_data_hash("D41D8CD98F00B204E9800998ECF8427E+0"));
        assert!(!is_portable_data_hash("d41d8cd98f00b204e9800998ecf8427e+0+"));
    }
}
