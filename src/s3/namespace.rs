//! Namespace strategies
//!
//! A [`Namespace`] maps the logical `(scope, key)` pair a caller passes to
//! the client onto the bucket and key the backend actually sees. It is a
//! pure function of its inputs and never touches the network.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Backend address of an object, or of a listing prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub bucket: String,
    pub key: String,
}

impl Location {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Mapping from logical addressing to backend bucket and key
pub trait Namespace: Send + Sync + Debug {
    /// Backend location of `key` within `scope`
    fn resolve(&self, scope: &str, key: &str) -> Location;

    /// Backend bucket and listing prefix for `filter` within `scope`
    fn list_prefix(&self, scope: &str, filter: &str) -> Location;

    /// Backend name of a bucket created or removed through the client
    fn bucket_name(&self, name: &str) -> String;
}

/// Which [`Namespace`] a configuration selects
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// One fixed bucket; the scope is a `/`-joined key prefix ([`BucketPath`])
    #[default]
    Bucket,
    /// The configured value prefixes bucket names ([`PrefixedBucket`])
    Prefix,
}

/// Bucket-fixed strategy
///
/// Every object lives in one bucket under `scope/key`. Listings derive their
/// prefix from the scope path, with `filter` narrowing below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPath {
    bucket: String,
}

impl BucketPath {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl Namespace for BucketPath {
    fn resolve(&self, scope: &str, key: &str) -> Location {
        Location::new(&self.bucket, format!("{}/{}", scope, key))
    }

    fn list_prefix(&self, scope: &str, filter: &str) -> Location {
        self.resolve(scope, filter)
    }

    fn bucket_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Prefix-concatenation strategy
///
/// The scope names a bucket, which gets the configured prefix prepended with
/// no separator. Keys and listing filters pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixedBucket {
    prefix: String,
}

impl PrefixedBucket {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Namespace for PrefixedBucket {
    fn resolve(&self, scope: &str, key: &str) -> Location {
        Location::new(self.bucket_name(scope), key)
    }

    fn list_prefix(&self, scope: &str, filter: &str) -> Location {
        self.resolve(scope, filter)
    }

    fn bucket_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_path_resolve() {
        let ns = BucketPath::new("archive");
        let loc = ns.resolve("logs", "2024/01/a.txt");
        assert_eq!(loc, Location::new("archive", "logs/2024/01/a.txt"));
    }

    #[test]
    fn test_bucket_path_list_prefix_is_derived_from_scope() {
        let ns = BucketPath::new("archive");
        assert_eq!(ns.list_prefix("logs", ""), Location::new("archive", "logs/"));
        assert_eq!(
            ns.list_prefix("logs", "2024/"),
            Location::new("archive", "logs/2024/")
        );
    }

    #[test]
    fn test_bucket_path_bucket_name_is_verbatim() {
        assert_eq!(BucketPath::new("archive").bucket_name("other"), "other");
    }

    #[test]
    fn test_prefixed_bucket_resolve() {
        let ns = PrefixedBucket::new("tenant-");
        let loc = ns.resolve("alpha", "2024/01/a.txt");
        assert_eq!(loc, Location::new("tenant-alpha", "2024/01/a.txt"));
    }

    #[test]
    fn test_prefixed_bucket_list_prefix_is_caller_supplied() {
        let ns = PrefixedBucket::new("tenant-");
        assert_eq!(ns.list_prefix("alpha", ""), Location::new("tenant-alpha", ""));
        assert_eq!(
            ns.list_prefix("alpha", "img/"),
            Location::new("tenant-alpha", "img/")
        );
        assert_eq!(ns.bucket_name("alpha"), "tenant-alpha");
    }

    #[test]
    fn test_namespace_kind_serde() {
        let kind: NamespaceKind = serde_yaml::from_str("prefix").unwrap();
        assert_eq!(kind, NamespaceKind::Prefix);
        assert_eq!(NamespaceKind::default(), NamespaceKind::Bucket);
    }
}
