use std::sync::LazyLock;

use async_trait::async_trait;
use const_format::concatcp;
use regex::Regex;
use snafu::{Snafu, ensure};

use crate::{
    dns::DomainCheck,
    provider::{BoxError, DomainValidator},
};

const RFC_1123_LABEL_FMT: &str = "[a-zA-Z0-9]([-a-zA-Z0-9]*[a-zA-Z0-9])?";
const DOMAIN_MAX_LENGTH: usize = 253;
/// One or more RFC 1123 labels, optionally followed by a trailing dot.
const DOMAIN_FMT: &str = concatcp!(
    RFC_1123_LABEL_FMT,
    "(\\.",
    RFC_1123_LABEL_FMT,
    ")*\\.?"
);

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DOMAIN_FMT}$")).expect("failed to compile domain regex")
});

#[derive(Debug, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display(
        "domain {domain:?} is {length} bytes long but must be no more than {max_length}"
    ))]
    TooLong {
        domain: String,
        length: usize,
        max_length: usize,
    },

    #[snafu(display(
        "domain {domain:?} must consist of alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character"
    ))]
    InvalidDomain { domain: String },

    #[snafu(display("domain {domain:?} needs at least a name and a top level domain"))]
    NotRegistrable { domain: String },
}

/// Checks custom domains offline and splits them after the registrable part.
///
/// The last two labels are treated as the domain registered with the DNS
/// provider, everything in front of them as the sub-domain. Public suffixes
/// spanning more than one label (like `co.uk`) are not recognized.
#[derive(Clone, Copy, Debug, Default)]
pub struct SplitDomainValidator;

impl SplitDomainValidator {
    pub fn split(&self, host: &str) -> Result<DomainCheck, Error> {
        ensure!(
            host.len() <= DOMAIN_MAX_LENGTH,
            TooLongSnafu {
                domain: host,
                length: host.len(),
                max_length: DOMAIN_MAX_LENGTH,
            }
        );
        ensure!(DOMAIN_REGEX.is_match(host), InvalidDomainSnafu { domain: host });

        let labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
        ensure!(labels.len() >= 2, NotRegistrableSnafu { domain: host });

        let (sub_domain, domain) = labels.split_at(labels.len() - 2);

        Ok(DomainCheck {
            domain: domain.join("."),
            sub_domain: (!sub_domain.is_empty()).then(|| sub_domain.join(".")),
        })
    }
}

#[async_trait]
impl DomainValidator for SplitDomainValidator {
    async fn check(&self, domain: &str) -> Result<DomainCheck, BoxError> {
        Ok(self.split(domain)?)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("example.com", "example.com", None)]
    #[case("www.example.com", "example.com", Some("www"))]
    #[case("api.eu.example.com.", "example.com", Some("api.eu"))]
    fn splits_registrable_domain(
        #[case] host: &str,
        #[case] domain: &str,
        #[case] sub_domain: Option<&str>,
    ) {
        let check = SplitDomainValidator.split(host).expect("host is valid");

        assert_eq!(check.domain, domain);
        assert_eq!(check.sub_domain.as_deref(), sub_domain);
    }

    #[rstest]
    #[case("-example.com")]
    #[case("exa_mple.com")]
    #[case("example..com")]
    #[case("")]
    fn rejects_invalid_domains(#[case] host: &str) {
        assert_eq!(
            SplitDomainValidator.split(host),
            Err(Error::InvalidDomain {
                domain: host.to_owned()
            })
        );
    }

    #[test]
    fn rejects_single_label() {
        assert!(matches!(
            SplitDomainValidator.split("localhost"),
            Err(Error::NotRegistrable { .. })
        ));
    }

    #[test]
    fn rejects_overlong_domains() {
        let host = format!("{}.com", "a.".repeat(130));

        assert!(matches!(
            SplitDomainValidator.split(&host),
            Err(Error::TooLong { .. })
        ));
    }

    #[tokio::test]
    async fn implements_domain_validator() {
        let validator: &dyn DomainValidator = &SplitDomainValidator;

        let check = validator.check("www.example.com").await.expect("host is valid");

        assert_eq!(check.sub_domain.as_deref(), Some("www"));
    }
}
