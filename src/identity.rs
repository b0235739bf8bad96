//! # Canonical Identity Module
//!
//! Pure derivation of the dedup key for a resource descriptor.
//!
//! ## Overview
//!
//! Two descriptors with the same canonical identity are the same crawl unit;
//! only the first submission proceeds. The identity concatenates the HTTP
//! method, a normalized form of the URI, a canonical rendering of the header
//! list, and the request body byte-exact. Each component is length-prefixed,
//! so a separator occurring inside one field can never forge a boundary.
//!
//! URI normalization is driven by [`ParamPolicy`]: query parameters, and
//! OData-style argument lists embedded in path segments such as
//! `Entity(id=5)`, are dropped entirely, reduced to their names, or kept
//! verbatim. Parameter names in the configured irrelevant set never
//! contribute to the identity. Header pairs are trimmed, lowercased, sorted,
//! and de-duplicated so that ordering and casing cannot split one logical
//! resource into two.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

use crate::config::ParamPolicy;
use crate::resource::ResourceDescriptor;

/// Derives the canonical identity of a resource descriptor.
pub fn canonical_identity(
    resource: &ResourceDescriptor,
    policy: ParamPolicy,
    irrelevant: &HashSet<String>,
) -> String {
    let mut identity = String::with_capacity(128);
    push_component(&mut identity, &resource.method.to_ascii_uppercase());
    push_component(&mut identity, &canonical_uri(&resource.uri, policy, irrelevant));
    push_component(&mut identity, &canonical_headers(&resource.headers));
    push_component(&mut identity, &hex_body(&resource.body));
    identity
}

fn push_component(out: &mut String, part: &str) {
    out.push_str(&part.len().to_string());
    out.push(':');
    out.push_str(part);
    out.push('|');
}

// The body is carried byte-exact; a lossy UTF-8 rendering would collapse
// distinct binary bodies onto the replacement character.
fn hex_body(body: &[u8]) -> String {
    let mut out = String::with_capacity(body.len() * 2);
    for byte in body {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Normalizes a URI under the given parameter policy.
pub fn canonical_uri(uri: &Url, policy: ParamPolicy, irrelevant: &HashSet<String>) -> String {
    let mut out = String::with_capacity(64);
    out.push_str(uri.scheme());
    out.push_str("://");
    if let Some(host) = uri.host_str() {
        out.push_str(&host.to_ascii_lowercase());
    }
    if let Some(port) = uri.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }

    for segment in uri.path().split('/').skip(1) {
        out.push('/');
        out.push_str(&canonical_segment(segment, policy, irrelevant));
    }

    let query = canonical_query(uri, policy, irrelevant);
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }
    out
}

/// Path segments carrying an OData argument list (`Name(a=1,b=2)` or
/// `Name(7)`) get their arguments processed under the same policy as the
/// query string.
fn canonical_segment(segment: &str, policy: ParamPolicy, irrelevant: &HashSet<String>) -> String {
    let (name, args) = match segment.find('(') {
        Some(open) if segment.ends_with(')') && open > 0 => {
            (&segment[..open], &segment[open + 1..segment.len() - 1])
        }
        _ => return segment.to_string(),
    };

    let mut kept: Vec<String> = Vec::new();
    for arg in args.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        match arg.split_once('=') {
            Some((key, value)) => {
                let key = key.trim().to_ascii_lowercase();
                if is_irrelevant(&key, irrelevant) {
                    continue;
                }
                match policy {
                    ParamPolicy::IgnoreAll => {}
                    ParamPolicy::IgnoreValue => kept.push(key),
                    ParamPolicy::UseAll => kept.push(format!("{key}={}", value.trim())),
                }
            }
            // Positional argument: a bare value.
            None => {
                if policy == ParamPolicy::UseAll {
                    kept.push(arg.to_string());
                }
            }
        }
    }
    kept.sort();
    format!("{name}({})", kept.join(","))
}

fn canonical_query(uri: &Url, policy: ParamPolicy, irrelevant: &HashSet<String>) -> String {
    if policy == ParamPolicy::IgnoreAll {
        return String::new();
    }
    let mut kept: Vec<String> = Vec::new();
    for (name, value) in uri.query_pairs() {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() || is_irrelevant(&name, irrelevant) {
            continue;
        }
        match policy {
            ParamPolicy::IgnoreAll => unreachable!(),
            ParamPolicy::IgnoreValue => kept.push(name),
            ParamPolicy::UseAll => {
                let encoded = utf8_percent_encode(value.trim(), NON_ALPHANUMERIC).to_string();
                kept.push(format!("{name}={encoded}"));
            }
        }
    }
    kept.sort();
    kept.dedup();
    kept.join("&")
}

/// Trim, lowercase, sort, and de-duplicate the header list.
fn canonical_headers(headers: &[(String, String)]) -> String {
    let set: BTreeSet<String> = headers
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                name.trim().to_ascii_lowercase(),
                value.trim().to_ascii_lowercase()
            )
        })
        .collect();
    set.into_iter().collect::<Vec<_>>().join(";")
}

fn is_irrelevant(name: &str, irrelevant: &HashSet<String>) -> bool {
    irrelevant.iter().any(|p| p.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use url::Url;

    fn descriptor(uri: &str, headers: Vec<(&str, &str)>) -> ResourceDescriptor {
        ResourceDescriptor::seed(Url::parse(uri).unwrap()).with_headers(
            headers
                .into_iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn identity(res: &ResourceDescriptor, policy: ParamPolicy) -> String {
        canonical_identity(res, policy, &HashSet::new())
    }

    #[test]
    fn idempotent_under_header_permutation_and_casing() {
        let a = descriptor(
            "http://example.com/a",
            vec![("Accept", "text/html"), ("X-Token", "ABC")],
        );
        let b = descriptor(
            "http://EXAMPLE.com/a",
            vec![("x-token", " abc "), ("accept", "TEXT/HTML")],
        );
        assert_eq!(identity(&a, ParamPolicy::UseAll), identity(&a, ParamPolicy::UseAll));
        assert_eq!(identity(&a, ParamPolicy::UseAll), identity(&b, ParamPolicy::UseAll));
    }

    #[test]
    fn duplicate_headers_collapse() {
        let a = descriptor("http://example.com/", vec![("Accept", "text/html")]);
        let b = descriptor(
            "http://example.com/",
            vec![("Accept", "text/html"), ("accept", "text/html ")],
        );
        assert_eq!(identity(&a, ParamPolicy::UseAll), identity(&b, ParamPolicy::UseAll));
    }

    #[test]
    fn ignore_value_merges_varying_values() {
        let a = descriptor("http://example.com/p?session=1&q=rust", vec![]);
        let b = descriptor("http://example.com/p?q=rust&session=2", vec![]);
        assert_eq!(
            identity(&a, ParamPolicy::IgnoreValue),
            identity(&b, ParamPolicy::IgnoreValue)
        );
        assert_ne!(identity(&a, ParamPolicy::UseAll), identity(&b, ParamPolicy::UseAll));
    }

    #[test]
    fn ignore_all_drops_query_entirely() {
        let a = descriptor("http://example.com/p?a=1", vec![]);
        let b = descriptor("http://example.com/p?completely=different", vec![]);
        assert_eq!(identity(&a, ParamPolicy::IgnoreAll), identity(&b, ParamPolicy::IgnoreAll));
    }

    #[test]
    fn irrelevant_parameter_excluded_under_every_policy() {
        let irrelevant: HashSet<String> = ["JSESSIONID".to_string()].into();
        let a = descriptor("http://example.com/p?jsessionid=aaa&q=1", vec![]);
        let b = descriptor("http://example.com/p?jsessionid=bbb&q=1", vec![]);
        assert_eq!(
            canonical_identity(&a, ParamPolicy::UseAll, &irrelevant),
            canonical_identity(&b, ParamPolicy::UseAll, &irrelevant)
        );
    }

    #[test]
    fn odata_segment_arguments_follow_the_policy() {
        let a = descriptor("http://example.com/svc/Orders(7)/items", vec![]);
        let b = descriptor("http://example.com/svc/Orders(8)/items", vec![]);
        assert_eq!(identity(&a, ParamPolicy::IgnoreAll), identity(&b, ParamPolicy::IgnoreAll));
        assert_ne!(identity(&a, ParamPolicy::UseAll), identity(&b, ParamPolicy::UseAll));

        let named_a = descriptor("http://example.com/svc/Orders(Id=7,Lang='en')", vec![]);
        let named_b = descriptor("http://example.com/svc/Orders(lang='fr',id=9)", vec![]);
        assert_eq!(
            identity(&named_a, ParamPolicy::IgnoreValue),
            identity(&named_b, ParamPolicy::IgnoreValue)
        );
    }

    #[test]
    fn binary_bodies_distinguish_resources() {
        let uri = Url::parse("http://example.com/upload").unwrap();
        let a = ResourceDescriptor::seed_with_method(uri.clone(), "POST")
            .with_body(bytes::Bytes::from_static(b"\xFF"));
        let b = ResourceDescriptor::seed_with_method(uri, "POST")
            .with_body(bytes::Bytes::from_static(b"\xFE"));
        assert_ne!(identity(&a, ParamPolicy::UseAll), identity(&b, ParamPolicy::UseAll));
    }

    #[test]
    fn field_separators_inside_values_cannot_collide() {
        let a = descriptor("http://example.com/a", vec![("X-Note", "1|2")]);
        let b = descriptor("http://example.com/a", vec![("X-Note", "1")])
            .with_body(bytes::Bytes::from_static(b"2"));
        assert_ne!(identity(&a, ParamPolicy::UseAll), identity(&b, ParamPolicy::UseAll));
    }

    #[test]
    fn method_and_body_distinguish_resources() {
        let get = descriptor("http://example.com/form", vec![]);
        let post = ResourceDescriptor::seed_with_method(
            Url::parse("http://example.com/form").unwrap(),
            "POST",
        )
        .with_body(bytes::Bytes::from_static(b"a=1"));
        assert_ne!(identity(&get, ParamPolicy::UseAll), identity(&post, ParamPolicy::UseAll));
    }
}
