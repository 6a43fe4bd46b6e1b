//! Static sharding of the search space into batches.
//!
//! One batch covers one cache region. Batch sizes are bounded so that the
//! slowest collector finishes within `BATCH_BUDGET` under the planning
//! latencies below; editing this table changes both coverage and timing.

use std::time::Duration;

use serde::Serialize;

use crate::collectors::extract::GROUP_SIZE;
use crate::collectors::{HarvestRequest, MAX_PAGES};

pub const BATCH_BUDGET: Duration = Duration::from_secs(150);

/// Worst-case latency assumed for one query API page, pacing included.
pub const API_CALL_WORST: Duration = Duration::from_millis(4_500);

/// Worst-case latency for one extraction group (the per-call timeout).
pub const EXTRACT_CALL_WORST: Duration = Duration::from_secs(30);

/// Pause between extraction groups.
pub const EXTRACT_GROUP_PAUSE: Duration = Duration::from_secs(2);

pub const DEFAULT_KEYWORDS: &[&str] = &["electrician", "electrical engineer", "electrical maintenance"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: u32,
    pub region: &'static str,
    pub locations: &'static [&'static str],
    /// Replaces `DEFAULT_KEYWORDS` for this batch when set.
    pub keywords: Option<&'static [&'static str]>,
}

pub const BATCHES: &[Batch] = &[
    Batch {
        id: 1,
        region: "london",
        locations: &["London", "Croydon", "Harrow"],
        keywords: None,
    },
    Batch {
        id: 2,
        region: "south-east",
        locations: &["Reading", "Brighton", "Maidstone"],
        keywords: None,
    },
    Batch {
        id: 3,
        region: "south-west",
        locations: &["Bristol", "Exeter", "Plymouth"],
        keywords: None,
    },
    Batch {
        id: 4,
        region: "east-of-england",
        locations: &["Cambridge", "Norwich", "Chelmsford"],
        keywords: None,
    },
    Batch {
        id: 5,
        region: "midlands",
        locations: &["Birmingham", "Nottingham", "Leicester"],
        keywords: None,
    },
    Batch {
        id: 6,
        region: "north-west",
        locations: &["Manchester", "Liverpool", "Preston"],
        keywords: None,
    },
    Batch {
        id: 7,
        region: "yorkshire-north-east",
        locations: &["Leeds", "Sheffield", "Newcastle upon Tyne"],
        keywords: None,
    },
    Batch {
        id: 8,
        region: "scotland",
        locations: &["Glasgow", "Edinburgh", "Aberdeen", "Dundee"],
        keywords: Some(&["electrician", "electrical engineer"]),
    },
    Batch {
        id: 9,
        region: "wales-northern-ireland",
        locations: &["Cardiff", "Swansea", "Belfast"],
        keywords: None,
    },
];

pub fn batch(id: u32) -> Option<&'static Batch> {
    BATCHES.iter().find(|b| b.id == id)
}

pub fn total_regions() -> usize {
    BATCHES.len()
}

pub fn regions() -> impl Iterator<Item = &'static str> {
    BATCHES.iter().map(|b| b.region)
}

impl Batch {
    pub fn keywords(&self) -> &'static [&'static str] {
        self.keywords.unwrap_or(DEFAULT_KEYWORDS)
    }

    pub fn request(&self) -> HarvestRequest {
        HarvestRequest {
            region: self.region.to_string(),
            locations: self.locations.iter().map(|s| s.to_string()).collect(),
            keywords: self.keywords().iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Calls one query API collector makes for this batch at most.
    pub fn api_calls(&self) -> u32 {
        (self.locations.len() * self.keywords().len()) as u32 * MAX_PAGES
    }

    /// Sequential extraction groups per board.
    pub fn extract_groups(&self) -> u32 {
        (self.locations.len().div_ceil(GROUP_SIZE) * self.keywords().len()) as u32
    }

    /// Wall-clock bound for the slowest collector. Collectors run
    /// concurrently, so the batch takes as long as the longest of them.
    pub fn estimated_worst_case(&self) -> Duration {
        let api = API_CALL_WORST * self.api_calls();
        let groups = self.extract_groups();
        let extract = EXTRACT_CALL_WORST * groups + EXTRACT_GROUP_PAUSE * groups.saturating_sub(1);
        api.max(extract)
    }
}
