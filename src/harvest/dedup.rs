use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::listing::Listing;

/// Collapse listings sharing a dedup key.
///
/// The survivor sits at the position where its key first appeared. Among
/// duplicates the more complete listing wins, then the higher-priority
/// source, then the earlier one. Returns the survivors and how many
/// listings were removed.
pub fn dedup(listings: Vec<Listing>) -> (Vec<Listing>, usize) {
    let total = listings.len();
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut survivors: Vec<Listing> = Vec::with_capacity(total);

    for listing in listings {
        let key = listing.dedup_key();
        match slots.get(&key) {
            Some(&slot) => {
                if prefer(&listing, &survivors[slot]) == Ordering::Greater {
                    survivors[slot] = listing;
                }
            }
            None => {
                slots.insert(key, survivors.len());
                survivors.push(listing);
            }
        }
    }

    let removed = total - survivors.len();
    (survivors, removed)
}

/// `Greater` when `challenger` should replace `incumbent`.
fn prefer(challenger: &Listing, incumbent: &Listing) -> Ordering {
    challenger
        .completeness()
        .cmp(&incumbent.completeness())
        .then_with(|| incumbent.source_id.priority().cmp(&challenger.source_id.priority()))
}

/// Most recent first. Stable, so equal dates keep their input order.
pub fn sort_by_recency(listings: &mut [Listing]) {
    listings.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    use crate::models::listing::{SourceId, sample};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn mixed() -> Vec<Listing> {
        let mut with_salary = sample("electrician", "volt co", SourceId::Indeed, day(3));
        with_salary.salary_text = "£30,000".to_string();
        vec![
            sample("Electrician", "Volt Co", SourceId::Reed, day(2)),
            sample("Electrical Engineer", "Gridline", SourceId::Adzuna, day(5)),
            with_salary,
            sample(" ELECTRICIAN ", "VOLT CO", SourceId::Adzuna, day(1)),
            sample("Electrical Engineer", "Gridline", SourceId::Reed, day(4)),
        ]
    }

    #[test]
    fn at_most_one_per_key() {
        let (kept, removed) = dedup(mixed());
        assert_eq!(kept.len(), 2);
        assert_eq!(removed, 3);
        let keys: HashSet<String> = kept.iter().map(Listing::dedup_key).collect();
        assert_eq!(keys.len(), kept.len());
    }

    #[test]
    fn idempotent() {
        let (once, _) = dedup(mixed());
        let (twice, removed) = dedup(once.clone());
        assert_eq!(once, twice);
        assert_eq!(removed, 0);
    }

    #[test]
    fn more_complete_duplicate_wins_and_keeps_first_slot() {
        let (kept, _) = dedup(mixed());
        assert_eq!(kept[0].source_id, SourceId::Indeed);
        assert_eq!(kept[0].salary_text, "£30,000");
        assert_eq!(kept[1].title, "Electrical Engineer");
    }

    #[test]
    fn equal_completeness_falls_back_to_source_priority() {
        let (kept, _) = dedup(mixed());
        assert_eq!(kept[1].source_id, SourceId::Adzuna);

        let (kept, _) = dedup(vec![
            sample("Electrician", "Volt Co", SourceId::Reed, day(2)),
            sample("Electrician", "Volt Co", SourceId::Reed, day(9)),
        ]);
        assert_eq!(kept[0].posted_at, day(2));
    }

    #[test]
    fn recency_sort_is_stable() {
        let mut listings = vec![
            sample("A", "X", SourceId::Reed, day(1)),
            sample("B", "X", SourceId::Reed, day(3)),
            sample("C", "X", SourceId::Reed, day(3)),
            sample("D", "X", SourceId::Reed, day(2)),
        ];
        sort_by_recency(&mut listings);
        let titles: Vec<&str> = listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["B", "C", "D", "A"]);
    }
}
