use std::collections::BTreeMap;

use snafu::{IntoError, ResultExt};
use tracing::instrument;

use crate::{
    coordinator::{
        DOMAIN_ALREADY_ADDED, Deployer, DomainFailures, DomainSnafu, Error, Result,
        WriteDnsStateSnafu,
    },
    dns::{DnsRecord, DnsRecordSet, RecordValue, records_to_delete},
    state::StatePatch,
};

/// Replaces placeholder values by the gateway sub-domain of their region.
/// Records of regions without a gateway are dropped.
fn resolve_placeholders(
    record_set: &DnsRecordSet,
    sub_domains: &BTreeMap<String, String>,
) -> DnsRecordSet {
    let records = record_set
        .records
        .iter()
        .filter_map(|record| {
            let Some(region) = record.value.pending_region() else {
                return Some(record.clone());
            };
            match sub_domains.get(region) {
                Some(sub_domain) => Some(DnsRecord {
                    value: RecordValue::Resolved(sub_domain.clone()),
                    ..record.clone()
                }),
                None => {
                    tracing::warn!(
                        region,
                        domain = %record.domain,
                        "no gateway sub-domain to point the record at, skipping"
                    );
                    None
                }
            }
        })
        .collect();

    DnsRecordSet {
        domain: record_set.domain.clone(),
        records,
    }
}

/// Adds `records` to the history entry of `domain`, creating it if needed.
fn keep_in_history(history: &mut Vec<DnsRecordSet>, domain: &str, records: Vec<DnsRecord>) {
    match history
        .iter_mut()
        .find(|record_set| record_set.domain == domain)
    {
        Some(record_set) => record_set.records.extend(records),
        None => history.push(DnsRecordSet {
            domain: domain.to_owned(),
            records,
        }),
    }
}

impl Deployer {
    /// Deploys the `desired` records, then deletes whatever `history` holds
    /// that is no longer desired, and records the result as the new history.
    ///
    /// A domain whose record set fails to deploy keeps its previous history
    /// and none of its records are deleted. The new history is written before
    /// the failed domains are reported.
    ///
    /// Returns the DNS target per domain.
    #[instrument(skip_all, fields(domains = desired.len()))]
    pub(super) async fn reconcile_dns(
        &self,
        desired: &[DnsRecordSet],
        sub_domains: &BTreeMap<String, String>,
        history: &[DnsRecordSet],
    ) -> Result<BTreeMap<String, String>> {
        let mut cns = BTreeMap::new();
        let mut deployed: Vec<DnsRecordSet> = Vec::with_capacity(desired.len());
        let mut failures = Vec::new();

        for record_set in desired {
            let record_set = resolve_placeholders(record_set, sub_domains);
            let deployment = match self.providers.dns.deploy(&record_set).await {
                Ok(deployment) => deployment,
                Err(error) => {
                    tracing::warn!(
                        %error,
                        domain = %record_set.domain,
                        "failed to deploy DNS records"
                    );
                    failures.push(
                        DomainSnafu {
                            domain: record_set.domain,
                        }
                        .into_error(error),
                    );
                    continue;
                }
            };
            tracing::info!(
                domain = %record_set.domain,
                records = deployment.records.len(),
                "deployed DNS records"
            );

            cns.insert(
                record_set.domain.clone(),
                deployment
                    .dns
                    .unwrap_or_else(|| DOMAIN_ALREADY_ADDED.to_owned()),
            );
            deployed.push(DnsRecordSet {
                domain: record_set.domain,
                records: deployment.records,
            });
        }

        let mut new_history = deployed.clone();
        for old in history {
            if failures.iter().any(|failure| failure.domain() == old.domain) {
                keep_in_history(&mut new_history, &old.domain, old.records.clone());
                continue;
            }

            let current = deployed
                .iter()
                .find(|record_set| record_set.domain == old.domain)
                .map_or(&[][..], |record_set| record_set.records.as_slice());
            let stale = records_to_delete(current, &old.records);
            if stale.is_empty() {
                continue;
            }

            match self.providers.dns.remove(&stale).await {
                Ok(()) => tracing::info!(
                    domain = %old.domain,
                    records = stale.len(),
                    "deleted stale DNS records"
                ),
                Err(error) => {
                    tracing::warn!(
                        %error,
                        domain = %old.domain,
                        records = stale.len(),
                        "failed to delete stale DNS records, keeping them in the history"
                    );
                    keep_in_history(&mut new_history, &old.domain, stale);
                }
            }
        }

        self.state_store
            .write(StatePatch::Dns(new_history))
            .await
            .context(WriteDnsStateSnafu)?;

        if !failures.is_empty() {
            return Err(Error::DeployDnsRecords {
                source: DomainFailures(failures),
            });
        }
        Ok(cns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DEFAULT_RECORD_STATUS, DEFAULT_RECORD_TYPE};

    fn placeholder_record(region: &str) -> DnsRecord {
        DnsRecord {
            domain: "example.com".to_owned(),
            sub_domain: "www".to_owned(),
            record_type: DEFAULT_RECORD_TYPE.to_owned(),
            record_line: "默认".to_owned(),
            value: RecordValue::placeholder(region),
            ttl: None,
            mx: None,
            status: DEFAULT_RECORD_STATUS.to_owned(),
            record_id: None,
        }
    }

    #[test]
    fn resolves_known_regions_and_drops_others() {
        let record_set = DnsRecordSet {
            domain: "example.com".to_owned(),
            records: vec![
                placeholder_record("ap-guangzhou"),
                placeholder_record("ap-shanghai"),
            ],
        };
        let sub_domains = BTreeMap::from([(
            "ap-guangzhou".to_owned(),
            "service-1.gz.apigw.tencentcs.com".to_owned(),
        )]);

        let resolved = resolve_placeholders(&record_set, &sub_domains);

        assert_eq!(resolved.records.len(), 1);
        assert_eq!(
            resolved.records[0].value,
            RecordValue::Resolved("service-1.gz.apigw.tencentcs.com".to_owned())
        );
    }
}
