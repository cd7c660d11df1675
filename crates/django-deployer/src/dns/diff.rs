use crate::dns::DnsRecord;

/// Returns every `historical` record that has no counterpart in `desired`.
///
/// Two records correspond when [`DnsRecord::same_target`] holds. The result
/// keeps the order of `historical`; the order of `desired` does not matter.
/// Deleting the returned records converges the provider to `desired` without
/// touching records that are still wanted, so an unchanged configuration
/// deletes nothing.
pub fn records_to_delete(desired: &[DnsRecord], historical: &[DnsRecord]) -> Vec<DnsRecord> {
    historical
        .iter()
        .filter(|old| !desired.iter().any(|new| new.same_target(old)))
        .cloned()
        .collect()
}
