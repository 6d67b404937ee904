//! Published version reconciliation

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::conan::ConanApi;
use crate::Result;

/// Counters of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub appended: usize,
    /// References whose package has no record
    pub unknown: usize,
    pub malformed: usize,
}

/// Split a `name/version` reference, dropping any `#revision` or
/// `@user/channel` suffix.
pub fn parse_reference(reference: &str) -> Option<(&str, &str)> {
    let reference = reference.split('#').next().unwrap_or(reference);
    let reference = reference.split('@').next().unwrap_or(reference);
    let (name, version) = reference.split_once('/')?;
    if name.is_empty() || version.is_empty() || version.contains('/') {
        return None;
    }
    Some((name, version))
}

/// Append every listed version to its package record, in listing order.
pub fn reconcile<I, S>(catalog: &mut Catalog, references: I) -> ReconcileStats
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut stats = ReconcileStats::default();
    for reference in references {
        let reference = reference.as_ref();
        let Some((name, version)) = parse_reference(reference) else {
            warn!("Skipping malformed reference: {}", reference);
            stats.malformed += 1;
            continue;
        };
        if catalog.append_version(name, version) {
            stats.appended += 1;
        } else {
            debug!("No recipe for listed reference {}", reference);
            stats.unknown += 1;
        }
    }
    stats
}

/// List the remote and reconcile its references into the catalog.
pub async fn reconcile_from<C: ConanApi>(
    conan: &C,
    catalog: &mut Catalog,
    pattern: &str,
    remote: &str,
) -> Result<ReconcileStats> {
    info!("Listing {} on {}", pattern, remote);
    let references = conan.list_references(pattern, remote).await?;
    let stats = reconcile(catalog, &references);
    info!(
        "Reconciled {} references: {} versions appended, {} unknown, {} malformed",
        references.len(),
        stats.appended,
        stats.unknown,
        stats.malformed
    );
    Ok(stats)
}
