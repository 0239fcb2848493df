//! Core data model.
//!
//! A work item is one unit of triage work: an incoming document that still
//! needs classifying, or a referral case. It has identity, clinical urgency,
//! an SLA window, a document-type weight and a lifecycle status. Everything
//! except the status is fixed at intake.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::sla::SlaWindow;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque, non-empty work item identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkItemId(String);

/// Locks are keyed by the id of the item under review.
pub type DocumentId = WorkItemId;

impl WorkItemId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::EmptyId("work item"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkItemId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<WorkItemId> for String {
    fn from(id: WorkItemId) -> Self {
        id.0
    }
}

impl std::fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an actor holding (or requesting) a review lock.
///
/// Usually session-scoped: one per open viewer, so two tabs belonging to the
/// same reviewer still exclude each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HolderId(String);

impl HolderId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::EmptyId("holder"));
        }
        Ok(Self(id))
    }

    /// Mint a fresh random holder id for a new viewing session.
    pub fn session() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for HolderId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<HolderId> for String {
    fn from(id: HolderId) -> Self {
        id.0
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    UnclassifiedDocument,
    Referral,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemKind::UnclassifiedDocument => "unclassified_document",
            ItemKind::Referral => "referral",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ItemKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unclassified_document" | "document" => Ok(ItemKind::UnclassifiedDocument),
            "referral" => Ok(ItemKind::Referral),
            other => Err(Error::Other(format!("unknown item kind: {other}"))),
        }
    }
}

/// Clinical severity assigned at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyClass {
    Stat,
    Urgent,
    Routine,
}

impl UrgencyClass {
    /// Sort rank; lower sorts first.
    pub fn rank(self) -> u8 {
        match self {
            UrgencyClass::Stat => 0,
            UrgencyClass::Urgent => 1,
            UrgencyClass::Routine => 2,
        }
    }
}

impl std::fmt::Display for UrgencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UrgencyClass::Stat => "stat",
            UrgencyClass::Urgent => "urgent",
            UrgencyClass::Routine => "routine",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for UrgencyClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stat" => Ok(UrgencyClass::Stat),
            "urgent" => Ok(UrgencyClass::Urgent),
            "routine" => Ok(UrgencyClass::Routine),
            other => Err(Error::Other(format!("unknown urgency class: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Review status, mutated by the reviewing actor outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    PendingReview,
    InProgress,
    Flagged,
    /// Filed without human review. Terminal.
    AutoFiled,
    /// Terminal.
    Completed,
}

impl LifecycleStatus {
    /// Terminal items leave active triage entirely.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleStatus::AutoFiled | LifecycleStatus::Completed)
    }

    /// Worklist precedence within an urgency class; lower sorts first.
    pub fn precedence(self) -> u8 {
        match self {
            LifecycleStatus::Flagged => 0,
            LifecycleStatus::PendingReview => 1,
            LifecycleStatus::InProgress => 2,
            LifecycleStatus::AutoFiled => 3,
            LifecycleStatus::Completed => 4,
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleStatus::PendingReview => "pending_review",
            LifecycleStatus::InProgress => "in_progress",
            LifecycleStatus::Flagged => "flagged",
            LifecycleStatus::AutoFiled => "auto_filed",
            LifecycleStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LifecycleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending_review" | "pending" => Ok(LifecycleStatus::PendingReview),
            "in_progress" => Ok(LifecycleStatus::InProgress),
            "flagged" => Ok(LifecycleStatus::Flagged),
            "auto_filed" => Ok(LifecycleStatus::AutoFiled),
            "completed" => Ok(LifecycleStatus::Completed),
            other => Err(Error::Other(format!("unknown lifecycle status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Document type weight
// ---------------------------------------------------------------------------

/// Importance of the detected or declared document type, 0..=10.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct DocumentTypeWeight(u8);

impl DocumentTypeWeight {
    pub const MAX: u8 = 10;

    pub fn new(weight: u8) -> Result<Self> {
        if weight > Self::MAX {
            return Err(Error::InvalidWeight(weight));
        }
        Ok(Self(weight))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DocumentTypeWeight {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DocumentTypeWeight> for u8 {
    fn from(weight: DocumentTypeWeight) -> Self {
        weight.0
    }
}

// ---------------------------------------------------------------------------
// Kind-specific details
// ---------------------------------------------------------------------------

/// The fields that differ between the two kinds of work. The variant decides
/// the item's [`ItemKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemDetails {
    UnclassifiedDocument {
        file_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Referral {
        patient_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        referring_provider: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl ItemDetails {
    pub fn document(file_name: impl Into<String>) -> Self {
        ItemDetails::UnclassifiedDocument {
            file_name: file_name.into(),
            sender: None,
            description: None,
        }
    }

    pub fn referral(patient_name: impl Into<String>) -> Self {
        ItemDetails::Referral {
            patient_name: patient_name.into(),
            referring_provider: None,
            reason: None,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            ItemDetails::UnclassifiedDocument { .. } => ItemKind::UnclassifiedDocument,
            ItemDetails::Referral { .. } => ItemKind::Referral,
        }
    }

    /// Name, sender and description fields, whichever are present.
    pub fn searchable_fields(&self) -> Vec<&str> {
        let (name, party, text) = match self {
            ItemDetails::UnclassifiedDocument {
                file_name,
                sender,
                description,
            } => (file_name, sender, description),
            ItemDetails::Referral {
                patient_name,
                referring_provider,
                reason,
            } => (patient_name, referring_provider, reason),
        };
        std::iter::once(name.as_str())
            .chain(party.as_deref())
            .chain(text.as_deref())
            .collect()
    }

    /// Display title: file name or patient name.
    pub fn title(&self) -> &str {
        match self {
            ItemDetails::UnclassifiedDocument { file_name, .. } => file_name,
            ItemDetails::Referral { patient_name, .. } => patient_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of triage work. Deserialization enforces the same invariants as
/// [`NewWorkItem::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,

    #[serde(flatten)]
    pub details: ItemDetails,

    pub urgency: UrgencyClass,

    /// Receipt time and SLA deadline.
    #[serde(flatten)]
    pub window: SlaWindow,

    /// Missing weights default to 0.
    #[serde(default)]
    pub document_type_weight: DocumentTypeWeight,

    pub status: LifecycleStatus,

    /// Clinician a referral has been routed to. Display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl WorkItem {
    pub fn kind(&self) -> ItemKind {
        self.details.kind()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.window.received_at()
    }

    pub fn sla_deadline(&self) -> DateTime<Utc> {
        self.window.deadline()
    }

    /// Still part of active triage?
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for work items. Validation happens in [`NewWorkItem::build`].
pub struct NewWorkItem {
    id: String,
    details: ItemDetails,
    urgency: UrgencyClass,
    received_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    document_type_weight: u8,
    status: LifecycleStatus,
    assigned_to: Option<String>,
}

impl NewWorkItem {
    pub fn new(
        id: impl Into<String>,
        details: ItemDetails,
        received_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            details,
            urgency: UrgencyClass::Routine,
            received_at,
            deadline,
            document_type_weight: 0,
            status: LifecycleStatus::PendingReview,
            assigned_to: None,
        }
    }

    pub fn urgency(mut self, urgency: UrgencyClass) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn document_type_weight(mut self, weight: u8) -> Self {
        self.document_type_weight = weight;
        self
    }

    pub fn status(mut self, status: LifecycleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn assigned_to(mut self, clinician: impl Into<String>) -> Self {
        self.assigned_to = Some(clinician.into());
        self
    }

    pub fn build(self) -> Result<WorkItem> {
        Ok(WorkItem {
            id: WorkItemId::new(self.id)?,
            details: self.details,
            urgency: self.urgency,
            window: SlaWindow::new(self.received_at, self.deadline)?,
            document_type_weight: DocumentTypeWeight::new(self.document_type_weight)?,
            status: self.status,
            assigned_to: self.assigned_to,
        })
    }
}
