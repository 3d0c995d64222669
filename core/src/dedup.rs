use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::finding::Finding;

/// Collapse duplicate findings and rank the survivors.
///
/// One pass builds a map keyed by (id, package); an incoming finding replaces
/// the stored one only when its severity rank is strictly higher, so the
/// first-seen finding wins on equal rank. The survivors are sorted descending
/// by (severity rank, id), with package as a final tiebreak so the output is
/// deterministic when distinct packages share an id and rank.
pub fn dedupe_and_rank(findings: Vec<Finding>) -> Vec<Finding> {
    let mut best: HashMap<(String, String), Finding> = HashMap::new();
    for finding in findings {
        match best.entry((finding.id.clone(), finding.package.clone())) {
            Entry::Vacant(slot) => {
                slot.insert(finding);
            }
            Entry::Occupied(mut slot) => {
                if finding.severity.rank() > slot.get().severity.rank() {
                    slot.insert(finding);
                }
            }
        }
    }

    let mut retained: Vec<Finding> = best.into_values().collect();
    retained.sort_by(|a, b| {
        (b.severity.rank(), &b.id, &b.package).cmp(&(a.severity.rank(), &a.id, &a.package))
    });
    retained
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::finding::Severity;

    fn finding(id: &str, package: &str, severity: Severity, title: &str) -> Finding {
        Finding {
            id: id.to_string(),
            package: package.to_string(),
            severity,
            title: title.to_string(),
        }
    }

    #[test]
    fn keeps_the_strongest_severity_per_key() {
        let ranked = dedupe_and_rank(vec![
            finding("CVE-1", "pkgA", Severity::High, "first"),
            finding("CVE-1", "pkgA", Severity::Critical, "second"),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].severity, Severity::Critical);
        assert_eq!(ranked[0].title, "second");
    }

    #[test]
    fn keeps_the_maximum_over_many_duplicates() {
        let ranked = dedupe_and_rank(vec![
            finding("CVE-1", "pkgA", Severity::Low, "a"),
            finding("CVE-1", "pkgA", Severity::Critical, "b"),
            finding("CVE-1", "pkgA", Severity::Medium, "c"),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].severity, Severity::Critical);
    }

    #[test]
    fn first_seen_wins_on_equal_rank() {
        let ranked = dedupe_and_rank(vec![
            finding("CVE-1", "pkgA", Severity::High, "first"),
            finding("CVE-1", "pkgA", Severity::High, "second"),
        ]);
        assert_eq!(ranked[0].title, "first");
    }

    #[test]
    fn distinct_packages_are_not_collapsed() {
        let ranked = dedupe_and_rank(vec![
            finding("CVE-1", "pkgA", Severity::High, ""),
            finding("CVE-1", "pkgB", Severity::High, ""),
        ]);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn sorts_by_severity_then_id_descending() {
        let ranked = dedupe_and_rank(vec![
            finding("CVE-2020-1000", "a", Severity::Low, ""),
            finding("CVE-2024-0002", "b", Severity::Critical, ""),
            finding("CVE-2024-0009", "c", Severity::Critical, ""),
            finding("CVE-2023-5555", "d", Severity::High, ""),
        ]);
        let ids: Vec<&str> = ranked.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "CVE-2024-0009",
                "CVE-2024-0002",
                "CVE-2023-5555",
                "CVE-2020-1000",
            ]
        );
    }

    #[test]
    fn output_is_non_increasing_in_rank_and_id() {
        let ranked = dedupe_and_rank(vec![
            finding("CVE-3", "x", Severity::Medium, ""),
            finding("CVE-1", "x", Severity::Medium, ""),
            finding("CVE-2", "x", Severity::Critical, ""),
            finding("CVE-9", "x", Severity::Unknown, ""),
        ]);
        for pair in ranked.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                (a.severity.rank(), &a.id) >= (b.severity.rank(), &b.id),
                "ordering violated between {} and {}",
                a.id,
                b.id
            );
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(dedupe_and_rank(vec![]), vec![]);
    }
}
