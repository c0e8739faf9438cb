use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{id, name}` reference used by the tracker for status, author, project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// A file attached to a ticket. Owned by its parent [`Ticket`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    /// Remote filename as sent by the server. Untrusted: may be
    /// percent-encoded and contain path separators.
    pub filename: String,
    pub content_url: String,
    #[serde(default)]
    pub filesize: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<NamedRef>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

/// A ticket decoded from one list-page entry.
///
/// The attachment collection is fixed at decode time; there is no way to
/// refresh or mutate it. Re-running an operation means fetching again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: u64,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    status: Option<NamedRef>,
    #[serde(default)]
    project: Option<NamedRef>,
    #[serde(default)]
    created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_on: Option<DateTime<Utc>>,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

impl Ticket {
    #[must_use]
    pub fn new(id: u64, subject: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id,
            subject: subject.into(),
            status: None,
            project: None,
            created_on: None,
            updated_on: None,
            attachments,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> TicketSummary {
        TicketSummary {
            id: self.id,
            subject: self.subject.clone(),
            status: self.status.as_ref().map(|s| s.name.clone()),
            project: self.project.as_ref().map(|p| p.name.clone()),
            created_on: self.created_on,
            updated_on: self.updated_on,
            attachment_count: self.attachments.len(),
        }
    }
}

/// Compact view used for the pre-delete listing and `list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: u64,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
    pub attachment_count: usize,
}

/// One batch of tickets returned by a single list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub tickets: Vec<Ticket>,
    pub offset: u32,
    pub limit: u32,
    pub total_count: Option<u32>,
}

impl Page {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// A page shorter than the requested limit is the last one.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.tickets.len() < self.limit as usize
    }
}

/// Offset/limit/sort state driving pagination. Offsets only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    offset: u32,
    limit: u32,
    sort: String,
    hard_end: Option<u32>,
}

impl PaginationCursor {
    /// `limit` is clamped to at least 1 so every advance makes progress.
    #[must_use]
    pub fn new(offset: u32, limit: u32, sort: impl Into<String>, hard_end: Option<u32>) -> Self {
        Self { offset, limit: limit.max(1), sort: sort.into(), hard_end }
    }

    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn sort(&self) -> &str {
        &self.sort
    }

    #[must_use]
    pub const fn hard_end(&self) -> Option<u32> {
        self.hard_end
    }

    /// Whether the configured end offset has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.hard_end.is_some_and(|end| self.offset >= end)
    }

    pub fn advance(&mut self) {
        self.offset = self.offset.saturating_add(self.limit);
    }
}
