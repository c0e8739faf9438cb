//! Orchestration layer for redmine-sweep
//!
//! Drives the list client page by page and feeds the results either to the
//! download path or to the batch deleter.

mod delete_service;
mod download_service;
mod pagination;

#[cfg(test)]
mod delete_tests;

pub use delete_service::BatchDeleteOrchestrator;
pub use download_service::{DownloadReport, DownloadService};
pub use pagination::{
    CollectedTickets, PaginationStep, Paginator, StopReason, collect_tickets_with_attachments,
    tickets_with_attachments,
};
