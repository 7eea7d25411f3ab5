//! Record key derivation, scheme version 1.
//!
//! A record key is chosen, in order, from an explicit `job_key`, the `job_id`,
//! or the canonical form of `job_url`. Canonicalization v1 trims the url,
//! lowercases scheme and host, drops query string and fragment, and strips a
//! trailing `/` from the path. Changing any of these rules orphans rows keyed
//! under the old rule, so a change must bump [`KEY_SCHEME_VERSION`].
//!
//! Lookups also fall back to the canonical url: a key that misses is retried
//! in canonical form and then against each row's canonical `job_url`, so a row
//! tracked by id is still found, and updated, from its url alone.

pub const KEY_SCHEME_VERSION: u32 = 1;

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn derive_key(
    job_key: Option<&str>,
    job_id: Option<&str>,
    job_url: Option<&str>,
) -> Option<String> {
    if let Some(key) = non_empty(job_key) {
        return Some(key.to_string());
    }
    if let Some(id) = non_empty(job_id) {
        return Some(id.to_string());
    }
    non_empty(job_url).map(canonical_url).filter(|url| !url.is_empty())
}

pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();

    let (scheme, rest) = match without_query.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, without_query),
    };
    let (host, path) = match rest.find('/') {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };
    let path = path.trim_end_matches('/');

    let mut canonical = String::with_capacity(without_query.len());
    if let Some(scheme) = scheme {
        canonical.push_str(&scheme);
        canonical.push_str("://");
    }
    canonical.push_str(&host.to_ascii_lowercase());
    canonical.push_str(path);
    canonical
}
