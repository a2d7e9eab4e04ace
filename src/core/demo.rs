//! Offline stand-in for the CRM: a fixed pipeline with generated sample deals.
//! Lets the report format be checked without credentials.

use crate::core::{CrmSource, Deal, Page, PageRequest, Pipeline};
use crate::utils::error::{ReportError, Result};
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

pub const DEMO_PIPELINE_ID: &str = "demo";
pub const DEMO_PIPELINE_LABEL: &str = "Sales Pipeline Demo";
pub const DEMO_OUTPUT_DIR: &str = "demo_reports";
pub const DEMO_DEAL_COUNT: usize = 15;

const COMPANIES: [&str; 15] = [
    "Acme Corp",
    "TechStart Inc",
    "Global Solutions",
    "Innovation Labs",
    "Enterprise Co",
    "StartupXYZ",
    "Digital Ventures",
    "CloudTech",
    "DataSystems Ltd",
    "FutureTech",
    "SmartBiz",
    "NextGen Solutions",
    "Quantum Corp",
    "Velocity Inc",
    "Synergy Partners",
];

const STAGES: [&str; 6] = [
    "qualifiedtobuy",
    "appointmentscheduled",
    "presentationscheduled",
    "contractsent",
    "closedwon",
    "closedlost",
];

const QUARTERS: [&str; 4] = ["Q1", "Q2", "Q3", "Q4"];

/// Fixed so every demo run produces the same deals for a given day.
const SAMPLE_SEED: u64 = 0x5DEE_CE66_D1CE_4E5B;

fn pick(rng: &mut StdRng, items: &[&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}

/// `count` deals dated relative to `today`, all in the demo pipeline.
pub fn sample_deals(count: usize, today: NaiveDate) -> Vec<Deal> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);

    (0..count)
        .map(|i| {
            let created = today - Duration::days(rng.gen_range(10..=90));
            let close = today + Duration::days(rng.gen_range(-10..=60));
            let name = format!(
                "{} - {} Deal",
                pick(&mut rng, &COMPANIES),
                pick(&mut rng, &QUARTERS)
            );
            let amount = rng.gen_range(5_000..=150_000u32).to_string();
            let stage = pick(&mut rng, &STAGES);

            let properties: HashMap<String, Option<String>> = [
                ("dealname", name),
                ("amount", amount),
                ("dealstage", stage.to_string()),
                ("closedate", close.format("%Y-%m-%d").to_string()),
                ("createdate", created.format("%Y-%m-%d").to_string()),
                ("pipeline", DEMO_PIPELINE_ID.to_string()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Some(v)))
            .collect();

            Deal {
                id: format!("demo-{}", i + 1),
                properties,
            }
        })
        .collect()
}

/// Serves [`sample_deals`] through the same paginated interface as the real CRM.
pub struct DemoCrm {
    deals: Vec<Deal>,
}

impl Default for DemoCrm {
    fn default() -> Self {
        Self::new(sample_deals(DEMO_DEAL_COUNT, Local::now().date_naive()))
    }
}

impl DemoCrm {
    pub fn new(deals: Vec<Deal>) -> Self {
        Self { deals }
    }
}

#[async_trait]
impl CrmSource for DemoCrm {
    async fn pipelines(&self) -> Result<Vec<Pipeline>> {
        Ok(vec![Pipeline {
            id: DEMO_PIPELINE_ID.to_string(),
            label: DEMO_PIPELINE_LABEL.to_string(),
        }])
    }

    async fn deal_page(&self, request: &PageRequest) -> Result<Page<Deal>> {
        let start = match &request.after {
            None => 0,
            Some(cursor) => cursor.parse::<usize>().map_err(|_| ReportError::Request {
                status: Some(400),
                message: format!("invalid cursor '{}'", cursor),
            })?,
        };
        let end = start
            .saturating_add(request.limit.max(1) as usize)
            .min(self.deals.len());
        let results = self.deals.get(start..end).unwrap_or_default().to_vec();
        let next_cursor = (end < self.deals.len()).then(|| end.to_string());

        Ok(Page {
            results,
            next_cursor,
        })
    }
}
