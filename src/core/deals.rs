use crate::core::retry::RetryPolicy;
use crate::core::{CrmSource, Deal, DealRow, PageRequest};
use crate::utils::error::{ReportError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Largest `limit` the CRM list endpoints accept.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Properties requested for every deal. `pipeline` is only used for filtering.
pub const DEAL_PROPERTIES: [&str; 6] = [
    "dealname",
    "amount",
    "dealstage",
    "closedate",
    "createdate",
    "pipeline",
];

pub struct DealFetcher<'a, S: CrmSource> {
    source: &'a S,
    page_size: u32,
    retry: RetryPolicy,
}

impl<'a, S: CrmSource> DealFetcher<'a, S> {
    pub fn new(source: &'a S, page_size: u32, retry: RetryPolicy) -> Self {
        Self {
            source,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            retry,
        }
    }

    /// Every deal of `pipeline_id`, following cursors until the last page.
    /// Arrival order is preserved; nothing is deduplicated or sorted.
    ///
    /// The list endpoint has no pipeline filter, so this pages through every
    /// deal in the account and keeps those whose `pipeline` property matches.
    /// Request count grows with the account's total deals, not the pipeline's.
    pub async fn fetch_all(&self, pipeline_id: &str) -> Result<Vec<Deal>> {
        let properties: Vec<String> = DEAL_PROPERTIES.iter().map(|p| p.to_string()).collect();
        let mut deals = Vec::new();
        let mut after: Option<String> = None;
        let mut pages = 0usize;
        let mut skipped = 0usize;

        loop {
            let request = PageRequest {
                limit: self.page_size,
                after: after.clone(),
                properties: properties.clone(),
            };
            let page = self
                .retry
                .run("deal page fetch", || self.source.deal_page(&request))
                .await?;
            pages += 1;

            for deal in page.results {
                if deal.property("pipeline") == Some(pipeline_id) {
                    deals.push(deal);
                } else {
                    skipped += 1;
                }
            }
            tracing::debug!(
                "Page {}: {} matching deal(s) so far, next cursor {:?}",
                pages,
                deals.len(),
                page.next_cursor
            );

            match page.next_cursor {
                Some(next) if after.as_deref() == Some(next.as_str()) => {
                    return Err(ReportError::Request {
                        status: None,
                        message: format!("CRM returned the same pagination cursor '{}' twice", next),
                    });
                }
                Some(next) => after = Some(next),
                None => break,
            }
        }

        tracing::info!(
            "Fetched {} deal(s) for pipeline {} across {} page(s) ({} from other pipelines skipped)",
            deals.len(),
            pipeline_id,
            pages,
            skipped
        );
        Ok(deals)
    }

    pub async fn fetch_rows(&self, pipeline_id: &str) -> Result<Vec<DealRow>> {
        let deals = self.fetch_all(pipeline_id).await?;
        Ok(deals.iter().map(normalize).collect())
    }
}

/// Picks the five reported fields; anything absent or null becomes `""`.
/// The amount is copied verbatim so no precision is lost.
pub fn normalize(deal: &Deal) -> DealRow {
    let field = |name: &str| deal.property(name).unwrap_or_default().to_string();

    DealRow {
        name: field("dealname"),
        amount: field("amount"),
        stage: field("dealstage"),
        close_date: field("closedate"),
        created_date: field("createdate"),
    }
}
