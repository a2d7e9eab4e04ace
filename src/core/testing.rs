//! In-memory CRM used by unit tests.

use crate::core::{CrmSource, Deal, Page, PageRequest, Pipeline};
use crate::utils::error::{ReportError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) fn pipeline(id: &str, label: &str) -> Pipeline {
    Pipeline {
        id: id.to_string(),
        label: label.to_string(),
    }
}

pub(crate) fn deal(id: &str, properties: &[(&str, &str)]) -> Deal {
    Deal {
        id: id.to_string(),
        properties: properties
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect(),
    }
}

pub(crate) fn in_pipeline(id: &str, pipeline_id: &str, name: &str) -> Deal {
    deal(id, &[("dealname", name), ("pipeline", pipeline_id)])
}

/// Serves a fixed pipeline listing and a queue of scripted deal pages.
pub(crate) struct ScriptedCrm {
    pipelines: Vec<Pipeline>,
    pages: Mutex<VecDeque<Result<Page<Deal>>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedCrm {
    pub(crate) fn new(pipelines: Vec<Pipeline>) -> Self {
        Self {
            pipelines,
            pages: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Splits `deals` into pages of `page_size` linked by `cursor-N` tokens.
    pub(crate) fn paged(pipelines: Vec<Pipeline>, deals: Vec<Deal>, page_size: usize) -> Self {
        let crm = Self::new(pipelines);
        let chunks: Vec<Vec<Deal>> = if deals.is_empty() {
            vec![Vec::new()]
        } else {
            deals.chunks(page_size).map(|c| c.to_vec()).collect()
        };
        let last = chunks.len();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let cursor = (index + 1 < last).then(|| format!("cursor-{}", index + 1));
            crm.push_page(chunk, cursor.as_deref());
        }
        crm
    }

    pub(crate) fn push_page(&self, results: Vec<Deal>, next_cursor: Option<&str>) {
        self.pages.lock().unwrap().push_back(Ok(Page {
            results,
            next_cursor: next_cursor.map(str::to_string),
        }));
    }

    pub(crate) fn push_error(&self, error: ReportError) {
        self.pages.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CrmSource for ScriptedCrm {
    async fn pipelines(&self) -> Result<Vec<Pipeline>> {
        Ok(self.pipelines.clone())
    }

    async fn deal_page(&self, request: &PageRequest) -> Result<Page<Deal>> {
        self.requests.lock().unwrap().push(request.clone());
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ReportError::Request {
                    status: None,
                    message: "no scripted page left".to_string(),
                })
            })
    }
}
