use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMPLOYMENT_TYPE: &str = "Permanent";

/// Identifies the external provider a listing came from.
///
/// Declaration order doubles as source priority when two duplicates are
/// otherwise equally complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Adzuna,
    Reed,
    Indeed,
    Totaljobs,
    Cvlibrary,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Adzuna,
        SourceId::Reed,
        SourceId::Indeed,
        SourceId::Totaljobs,
        SourceId::Cvlibrary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Adzuna => "adzuna",
            SourceId::Reed => "reed",
            SourceId::Indeed => "indeed",
            SourceId::Totaljobs => "totaljobs",
            SourceId::Cvlibrary => "cvlibrary",
        }
    }

    pub fn priority(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(usize::MAX)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One posting as a collector produced it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary_text: Option<String>,
    pub employment_type: Option<String>,
    pub description_excerpt: String,
    pub posted_at: NaiveDate,
    pub apply_url: Option<String>,
    pub source_id: SourceId,
    pub expires_at: Option<NaiveDate>,
}

/// A validated listing as stored in the region cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary_text: String,
    pub employment_type: String,
    pub description_excerpt: String,
    pub posted_at: NaiveDate,
    pub apply_url: Option<String>,
    pub source_id: SourceId,
    pub expires_at: Option<NaiveDate>,
}

impl RawListing {
    /// Trim fields and apply defaults. Returns `None` when title or company
    /// is blank; callers count those as dropped.
    pub fn into_listing(self) -> Option<Listing> {
        let title = self.title.trim().to_string();
        let company = self.company.trim().to_string();
        if title.is_empty() || company.is_empty() {
            return None;
        }

        let salary_text = self
            .salary_text
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| crate::normalize::COMPETITIVE.to_string());

        let employment_type = self
            .employment_type
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_EMPLOYMENT_TYPE.to_string());

        Some(Listing {
            title,
            company,
            location: self.location.trim().to_string(),
            salary_text,
            employment_type,
            description_excerpt: self.description_excerpt,
            posted_at: self.posted_at,
            apply_url: self
                .apply_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            source_id: self.source_id,
            expires_at: self.expires_at,
        })
    }
}

/// Validate a collector's output, returning survivors and the drop count.
pub fn validate_all(raw: Vec<RawListing>) -> (Vec<Listing>, usize) {
    let total = raw.len();
    let listings: Vec<Listing> = raw.into_iter().filter_map(RawListing::into_listing).collect();
    let dropped = total - listings.len();
    (listings, dropped)
}

impl Listing {
    /// Lowercased, trimmed identity used to treat two listings as the same job.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}",
            self.title.trim().to_lowercase(),
            self.company.trim().to_lowercase()
        )
    }

    pub fn is_publishable(&self) -> bool {
        !self.title.trim().is_empty() && !self.company.trim().is_empty()
    }

    /// How much useful detail the listing carries; used to pick a survivor
    /// among duplicates.
    pub fn completeness(&self) -> u8 {
        let mut score = 0;
        if self.salary_text != crate::normalize::COMPETITIVE {
            score += 2;
        }
        if !self.description_excerpt.trim().is_empty() {
            score += 2;
        }
        if self.apply_url.is_some() {
            score += 1;
        }
        if self.expires_at.is_some() {
            score += 1;
        }
        score
    }
}

#[cfg(test)]
pub(crate) fn sample(title: &str, company: &str, source_id: SourceId, posted_at: NaiveDate) -> Listing {
    Listing {
        title: title.to_string(),
        company: company.to_string(),
        location: "London".to_string(),
        salary_text: crate::normalize::COMPETITIVE.to_string(),
        employment_type: DEFAULT_EMPLOYMENT_TYPE.to_string(),
        description_excerpt: String::new(),
        posted_at,
        apply_url: None,
        source_id,
        expires_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, company: &str) -> RawListing {
        RawListing {
            title: title.to_string(),
            company: company.to_string(),
            location: " Leeds ".to_string(),
            salary_text: None,
            employment_type: None,
            description_excerpt: String::new(),
            posted_at: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            apply_url: Some("  ".to_string()),
            source_id: SourceId::Reed,
            expires_at: None,
        }
    }

    #[test]
    fn blank_title_or_company_is_dropped_and_counted() {
        let (kept, dropped) = validate_all(vec![
            raw("Electrician", "Sparks Ltd"),
            raw("   ", "Sparks Ltd"),
            raw("Electrician", ""),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn defaults_are_applied() {
        let listing = raw("Electrician", "Sparks Ltd").into_listing().unwrap();
        assert_eq!(listing.employment_type, "Permanent");
        assert_eq!(listing.salary_text, "Competitive");
        assert_eq!(listing.location, "Leeds");
        assert_eq!(listing.apply_url, None);
    }

    #[test]
    fn dedup_key_ignores_case_and_padding() {
        let a = raw(" Approved Electrician", "SPARKS LTD ").into_listing().unwrap();
        let b = raw("approved electrician", "Sparks Ltd").into_listing().unwrap();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn source_priority_follows_declaration_order() {
        assert!(SourceId::Adzuna.priority() < SourceId::Reed.priority());
        assert!(SourceId::Reed.priority() < SourceId::Cvlibrary.priority());
    }
}
