//! Feed address resolution.
//!
//! Turns the raw URL field of a view into the list of status feeds to poll.
//! The field may hold several whitespace-separated addresses, or the literal
//! `debug` to request synthetic data instead of a network fetch.
//!
//! # Examples
//!
//! ```
//! use cradiator::services::resolve;
//!
//! let address = resolve("http://buildserver/ccnet http://other/cruise/xml");
//! assert!(address.is_valid());
//!
//! let uris: Vec<&str> = address.uris().map(|u| u.as_str()).collect();
//! assert_eq!(
//!     uris,
//!     ["http://buildserver/ccnet/XmlStatusReport.aspx", "http://other/cruise/xml"]
//! );
//! ```

use url::Url;

/// File name of the CruiseControl.NET status document.
pub const STATUS_REPORT_FILE: &str = "XmlStatusReport.aspx";

/// Sentinel that switches a view to synthetic data.
pub const DEBUG_SENTINEL: &str = "debug";

/// One resolved status feed endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedAddress {
    uri: Url,
}

impl FeedAddress {
    pub fn uri(&self) -> &Url {
        &self.uri
    }
}

/// Parsed form of a raw address string
///
/// Built once per raw string and never mutated; editing the URL of a view
/// produces a new `CradiatorAddress`. Callers must check [`is_valid`](Self::is_valid)
/// before using [`addresses`](Self::addresses): an invalid result carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CradiatorAddress {
    raw_input: String,
    addresses: Vec<FeedAddress>,
    is_valid: bool,
    is_debug: bool,
}

impl CradiatorAddress {
    /// Resolve a raw address string.
    ///
    /// The debug sentinel short-circuits tokenization. Otherwise every
    /// whitespace-separated token must parse as an absolute URI with a host,
    /// or the whole result is invalid.
    pub fn parse(raw_input: &str) -> Self {
        let trimmed = raw_input.trim();

        if trimmed.eq_ignore_ascii_case(DEBUG_SENTINEL) {
            return Self {
                raw_input: raw_input.to_string(),
                addresses: Vec::new(),
                is_valid: true,
                is_debug: true,
            };
        }

        if trimmed.is_empty() {
            return Self::invalid(raw_input);
        }

        let mut addresses = Vec::new();
        for token in trimmed.split_whitespace() {
            match parse_token(token) {
                Some(uri) => addresses.push(FeedAddress { uri }),
                None => {
                    tracing::debug!("Rejecting feed address {:?}: bad token {:?}", raw_input, token);
                    return Self::invalid(raw_input);
                }
            }
        }

        Self {
            raw_input: raw_input.to_string(),
            addresses,
            is_valid: true,
            is_debug: false,
        }
    }

    fn invalid(raw_input: &str) -> Self {
        Self {
            raw_input: raw_input.to_string(),
            addresses: Vec::new(),
            is_valid: false,
            is_debug: false,
        }
    }

    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    /// Resolved feeds in input order (duplicates kept)
    pub fn addresses(&self) -> &[FeedAddress] {
        &self.addresses
    }

    pub fn uris(&self) -> impl Iterator<Item = &Url> {
        self.addresses.iter().map(FeedAddress::uri)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// True when the debug sentinel was used; no network fetch should happen.
    pub fn is_debug(&self) -> bool {
        self.is_debug
    }
}

/// Resolve a raw address string. Shorthand for [`CradiatorAddress::parse`].
pub fn resolve(raw_input: &str) -> CradiatorAddress {
    CradiatorAddress::parse(raw_input)
}

fn parse_token(token: &str) -> Option<Url> {
    let mut uri = Url::parse(token).ok()?;

    // Scheme-only forms like "buildserver:8080" parse as opaque URIs
    if !uri.has_host() || uri.cannot_be_a_base() {
        return None;
    }

    complete_feed_path(&mut uri);
    Some(uri)
}

/// Append the status report file unless the path already names a document.
fn complete_feed_path(uri: &mut Url) {
    let base = uri.path().trim_end_matches('/');
    let last_segment = base.rsplit('/').next().unwrap_or_default();

    if names_status_document(last_segment) {
        return;
    }

    let completed = format!("{}/{}", base, STATUS_REPORT_FILE);
    uri.set_path(&completed);
}

fn names_status_document(segment: &str) -> bool {
    let segment = segment.to_ascii_lowercase();
    segment.contains('.') || segment.ends_with("xml")
}
