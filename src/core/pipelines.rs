use crate::core::retry::RetryPolicy;
use crate::core::{CrmSource, Pipeline, PipelineSelector};
use crate::utils::error::{ReportError, Result};

pub struct PipelineFetcher<'a, S: CrmSource> {
    source: &'a S,
    retry: RetryPolicy,
}

impl<'a, S: CrmSource> PipelineFetcher<'a, S> {
    pub fn new(source: &'a S, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// All deal pipelines in API order. An empty listing is terminal.
    pub async fn fetch_all(&self) -> Result<Vec<Pipeline>> {
        let pipelines = self
            .retry
            .run("pipeline listing", || self.source.pipelines())
            .await?;

        if pipelines.is_empty() {
            return Err(ReportError::NoPipelines);
        }

        tracing::info!("Found {} pipeline(s)", pipelines.len());
        for pipeline in &pipelines {
            tracing::debug!("  pipeline {} ({})", pipeline.label, pipeline.id);
        }
        Ok(pipelines)
    }

    pub async fn fetch_selected(&self, selector: &PipelineSelector) -> Result<Pipeline> {
        let pipelines = self.fetch_all().await?;
        select(&pipelines, selector)
    }
}

pub fn select(pipelines: &[Pipeline], selector: &PipelineSelector) -> Result<Pipeline> {
    if pipelines.is_empty() {
        return Err(ReportError::NoPipelines);
    }

    let found = match selector {
        PipelineSelector::First => {
            if pipelines.len() > 1 {
                tracing::warn!(
                    "{} pipelines available, exporting the first one ('{}'); use --pipeline-id or --pipeline-label to choose",
                    pipelines.len(),
                    pipelines[0].label
                );
            }
            pipelines.first()
        }
        PipelineSelector::ById(id) => pipelines.iter().find(|p| &p.id == id),
        PipelineSelector::ByLabel(label) => pipelines
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(label.trim())),
    };

    match found {
        Some(pipeline) => Ok(pipeline.clone()),
        None => {
            let available: Vec<String> = pipelines
                .iter()
                .map(|p| format!("{} ({})", p.label, p.id))
                .collect();
            tracing::error!("Available pipelines: {}", available.join(", "));
            Err(ReportError::PipelineNotFound {
                selector: selector.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{pipeline, ScriptedCrm};

    fn listing() -> Vec<Pipeline> {
        vec![
            pipeline("default", "Sales Pipeline"),
            pipeline("7781", "Renewals"),
        ]
    }

    #[test]
    fn test_select_first_by_default() {
        let chosen = select(&listing(), &PipelineSelector::default()).unwrap();
        assert_eq!(chosen.id, "default");
    }

    #[test]
    fn test_select_by_id_and_label() {
        let by_id = select(&listing(), &PipelineSelector::ById("7781".to_string())).unwrap();
        assert_eq!(by_id.label, "Renewals");

        let by_label =
            select(&listing(), &PipelineSelector::ByLabel("renewals ".to_string())).unwrap();
        assert_eq!(by_label.id, "7781");
    }

    #[test]
    fn test_unknown_selector_is_an_error() {
        let err = select(&listing(), &PipelineSelector::ById("nope".to_string())).unwrap_err();
        assert!(matches!(err, ReportError::PipelineNotFound { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_select_from_empty_listing() {
        let err = select(&[], &PipelineSelector::First).unwrap_err();
        assert!(matches!(err, ReportError::NoPipelines));
    }

    #[tokio::test]
    async fn test_empty_listing_fails_with_no_pipelines() {
        let crm = ScriptedCrm::new(vec![]);
        let fetcher = PipelineFetcher::new(&crm, RetryPolicy::none());

        let err = fetcher.fetch_all().await.unwrap_err();
        assert!(matches!(err, ReportError::NoPipelines));
    }

    #[tokio::test]
    async fn test_fetch_selected() {
        let crm = ScriptedCrm::new(listing());
        let fetcher = PipelineFetcher::new(&crm, RetryPolicy::none());

        let chosen = fetcher
            .fetch_selected(&PipelineSelector::ByLabel("Sales Pipeline".to_string()))
            .await
            .unwrap();
        assert_eq!(chosen.id, "default");
    }
}
