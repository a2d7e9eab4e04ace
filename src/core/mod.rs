pub mod client;
pub mod deals;
pub mod demo;
pub mod engine;
pub mod job;
pub mod pipelines;
pub mod retry;
pub mod schedule;
pub mod xlsx;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::domain::model::{
    Deal, DealRow, Extracted, Page, PageRequest, Pipeline, PipelineSelector, Report,
};
pub use crate::domain::ports::{ConfigProvider, CrmSource, ExportJob, Storage};
pub use crate::utils::error::Result;
