//! DNS records bound to the gateway's generated sub-domain.
//!
//! Record values are only known after the gateway of their region has been
//! deployed, so normalization emits [`RecordValue::Placeholder`] values which
//! the coordinator resolves later.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod diff;
pub mod domain;

pub use diff::records_to_delete;
pub use domain::SplitDomainValidator;

pub const DEFAULT_RECORD_TYPE: &str = "CNAME";
pub const DEFAULT_RECORD_STATUS: &str = "enable";
pub const DEFAULT_SUB_DOMAIN: &str = "@";

const PLACEHOLDER_PREFIX: &str = "temp_value_about_";

/// The value of a DNS record.
///
/// On the wire (and in persisted state) both variants are plain strings; a
/// placeholder is encoded as `temp_value_about_<region>`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum RecordValue {
    /// Resolve to the gateway sub-domain of `region` once it is known.
    Placeholder { region: String },
    Resolved(String),
}

impl RecordValue {
    pub fn placeholder(region: impl Into<String>) -> Self {
        Self::Placeholder {
            region: region.into(),
        }
    }

    /// The region this value waits for, if it is still unresolved.
    pub fn pending_region(&self) -> Option<&str> {
        match self {
            Self::Placeholder { region } => Some(region),
            Self::Resolved(_) => None,
        }
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        match value.strip_prefix(PLACEHOLDER_PREFIX) {
            Some(region) => Self::placeholder(region),
            None => Self::Resolved(value),
        }
    }
}

impl From<RecordValue> for String {
    fn from(value: RecordValue) -> Self {
        value.to_string()
    }
}

impl Display for RecordValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordValue::Placeholder { region } => write!(f, "{PLACEHOLDER_PREFIX}{region}"),
            RecordValue::Resolved(value) => f.write_str(value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    pub domain: String,
    pub sub_domain: String,
    pub record_type: String,
    pub record_line: String,
    pub value: RecordValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mx: Option<u32>,

    pub status: String,

    /// Assigned by the DNS provider once the record exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl DnsRecord {
    /// Whether both records point the same name at the same target, ignoring
    /// ttl, mx, status and provider ids.
    pub fn same_target(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.sub_domain == other.sub_domain
            && self.record_type == other.record_type
            && self.value == other.value
            && self.record_line == other.record_line
    }
}

/// All records of one custom domain. Also the shape of the DNS history kept in
/// the instance state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecordSet {
    pub domain: String,
    #[serde(default)]
    pub records: Vec<DnsRecord>,
}

/// The resolved DNS policy of one region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsPolicy {
    pub record_type: String,

    /// Regions without a record line get no record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_line: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mx: Option<u32>,

    pub status: String,
}

impl DnsPolicy {
    /// The record this policy produces for `region` below `domain`, or [`None`]
    /// when the region has no record line.
    pub fn record_for(&self, region: &str, domain: &str, sub_domain: &str) -> Option<DnsRecord> {
        let record_line = self.record_line.clone()?;

        Some(DnsRecord {
            domain: domain.to_owned(),
            sub_domain: sub_domain.to_owned(),
            record_type: self.record_type.clone(),
            record_line,
            value: RecordValue::placeholder(region),
            ttl: self.ttl,
            mx: self.mx,
            status: self.status.clone(),
            record_id: None,
        })
    }
}

/// Result of splitting a host name into the registrable domain and the
/// sub-domain below it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainCheck {
    pub domain: String,
    pub sub_domain: Option<String>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    pub(crate) fn record(
        domain: &str,
        sub_domain: &str,
        value: &str,
        record_line: &str,
    ) -> DnsRecord {
        DnsRecord {
            domain: domain.to_owned(),
            sub_domain: sub_domain.to_owned(),
            record_type: DEFAULT_RECORD_TYPE.to_owned(),
            record_line: record_line.to_owned(),
            value: value.to_owned().into(),
            ttl: Some(600),
            mx: None,
            status: DEFAULT_RECORD_STATUS.to_owned(),
            record_id: None,
        }
    }

    #[rstest]
    #[case("temp_value_about_ap-guangzhou", RecordValue::placeholder("ap-guangzhou"))]
    #[case(
        "service-abc.gz.apigw.tencentcs.com",
        RecordValue::Resolved("service-abc.gz.apigw.tencentcs.com".to_owned())
    )]
    fn parses_record_values(#[case] input: &str, #[case] expected: RecordValue) {
        let value = RecordValue::from(input.to_owned());

        assert_eq!(value, expected);
        assert_eq!(value.to_string(), input);
    }

    #[test]
    fn placeholder_serializes_as_plain_string() {
        let record = record("example.com", "www", "temp_value_about_ap-beijing", "默认");

        let json = serde_json::to_value(&record).expect("record serializes");

        assert_eq!(json["value"], "temp_value_about_ap-beijing");
        assert_eq!(record.value.pending_region(), Some("ap-beijing"));
    }

    #[test]
    fn same_target_ignores_ttl_and_ids() {
        let a = record("example.com", "www", "a.apigw.com", "默认");
        let b = DnsRecord {
            ttl: Some(60),
            record_id: Some("1234".to_owned()),
            status: "disable".to_owned(),
            ..a.clone()
        };

        assert!(a.same_target(&b));
        assert!(!a.same_target(&DnsRecord {
            record_line: "电信".to_owned(),
            ..a.clone()
        }));
    }

    #[test]
    fn policy_without_record_line_yields_no_record() {
        let policy = DnsPolicy {
            record_type: DEFAULT_RECORD_TYPE.to_owned(),
            record_line: None,
            ttl: None,
            mx: None,
            status: DEFAULT_RECORD_STATUS.to_owned(),
        };

        assert_eq!(policy.record_for("ap-guangzhou", "example.com", "www"), None);
    }
}
