//! Local bookkeeping of the documents the user scans.
//!
//! Only the selected document types are persisted. Server results are always
//! fetched again and fed into the process.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::VerifyKitError;

const CACHE_VERSION: &str = "V1";

/// Type of identity document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// National identity card.
    IdCard,
    /// Passport.
    Passport,
    /// Driver's license.
    DriversLicense,
}

impl DocumentType {
    /// Document type as named by the server.
    #[must_use]
    pub const fn api_type(&self) -> &'static str {
        match self {
            Self::IdCard => "ID_CARD",
            Self::Passport => "PASSPORT",
            Self::DriversLicense => "DRIVING_LICENSE",
        }
    }

    /// Sides the user has to scan.
    #[must_use]
    pub fn sides(&self) -> Vec<DocumentSide> {
        match self {
            Self::IdCard | Self::DriversLicense => vec![DocumentSide::Front, DocumentSide::Back],
            Self::Passport => vec![DocumentSide::Front],
        }
    }
}

/// Side of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentSide {
    /// Front side, with the photo.
    Front,
    /// Back side.
    Back,
}

/// Status of one uploaded document file on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// The document was accepted.
    Accepted,
    /// The upload is still being processed.
    UploadInProgress,
    /// The document is being processed.
    InProgress,
    /// The document waits for verification.
    VerificationPending,
    /// The document is being verified.
    VerificationInProgress,
    /// The document was rejected.
    Rejected,
    /// Processing of the document failed.
    Failed,
    /// A status this client does not know.
    #[serde(other)]
    Unknown,
}

/// What the client should do about a document, derived from its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentAction {
    /// The document is fine, move on.
    Proceed,
    /// The server is still working on it.
    Wait,
    /// The document must be scanned again.
    Error,
}

impl DocumentStatus {
    /// Action for this status, `None` for statuses this client does not know.
    #[must_use]
    pub const fn action(&self) -> Option<DocumentAction> {
        match self {
            Self::Accepted => Some(DocumentAction::Proceed),
            Self::UploadInProgress
            | Self::InProgress
            | Self::VerificationPending
            | Self::VerificationInProgress => Some(DocumentAction::Wait),
            Self::Rejected | Self::Failed => Some(DocumentAction::Error),
            Self::Unknown => None,
        }
    }
}

/// Server-side record of one uploaded document file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Server id of the document, used as `originalDocumentId` on resubmission.
    pub id: String,
    /// Document type as named by the server.
    #[serde(rename = "type")]
    pub api_type: String,
    /// Scanned side.
    #[serde(default)]
    pub side: Option<DocumentSide>,
    /// Processing status.
    pub status: DocumentStatus,
    /// Problems found with the document.
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

impl DocumentRecord {
    /// Whether the server reported at least one problem with this file.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

/// Upload state of a document, derived from its server records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadState {
    /// Nothing was uploaded yet.
    NotUploaded,
    /// At least one side was rejected.
    Rejected,
    /// Everything uploaded was accepted.
    Accepted,
}

/// A document the user selected to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDocument {
    /// Selected document type. Never changes.
    pub document_type: DocumentType,
    /// Latest server records of this document, `None` before the first upload.
    pub server_result: Option<Vec<DocumentRecord>>,
}

impl ScannedDocument {
    const fn new(document_type: DocumentType) -> Self {
        Self {
            document_type,
            server_result: None,
        }
    }

    /// Upload state derived from the server records.
    #[must_use]
    pub fn upload_state(&self) -> UploadState {
        match &self.server_result {
            None => UploadState::NotUploaded,
            Some(records) if records.iter().any(DocumentRecord::has_errors) => {
                UploadState::Rejected
            }
            Some(_) => UploadState::Accepted,
        }
    }

    /// All problems the server reported for this document.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.server_result
            .iter()
            .flatten()
            .filter_map(|record| record.errors.clone())
            .flatten()
            .collect()
    }

    /// Sides that have to be scanned for this document.
    #[must_use]
    pub fn sides(&self) -> Vec<DocumentSide> {
        self.document_type.sides()
    }

    /// Server id of the record for `side`, to reference on resubmission.
    #[must_use]
    pub fn original_document_id(&self, side: DocumentSide) -> Option<String> {
        self.server_result
            .iter()
            .flatten()
            .find(|record| record.side == Some(side))
            .map(|record| record.id.clone())
    }
}

/// The documents of one verification and what the server thinks of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProcess {
    /// Documents in the order the user selected them.
    pub documents: Vec<ScannedDocument>,
}

impl ScanProcess {
    /// Starts a fresh process for the selected document types.
    #[must_use]
    pub fn new(types: &[DocumentType]) -> Self {
        Self {
            documents: types.iter().copied().map(ScannedDocument::new).collect(),
        }
    }

    /// Restores a process from its persisted form `V1:<type>,<type>,...`.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::CacheFormat`] when the version is unknown, the field count
    /// is wrong or a document type cannot be parsed.
    pub fn restore(cache: &str) -> Result<Self, VerifyKitError> {
        let fields: Vec<&str> = cache.split(':').collect();
        let [version, types] = fields.as_slice() else {
            return Err(VerifyKitError::CacheFormat(format!(
                "expected 2 fields, found {}",
                fields.len()
            )));
        };
        if *version != CACHE_VERSION {
            return Err(VerifyKitError::CacheFormat(format!(
                "unknown version `{version}`"
            )));
        }
        let types = types
            .split(',')
            .map(|token| {
                DocumentType::from_str(token).map_err(|_| {
                    VerifyKitError::CacheFormat(format!("unknown document type `{token}`"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(&types))
    }

    /// Persisted form of the process. Server results are not included.
    #[must_use]
    pub fn serialize(&self) -> String {
        let types = self
            .documents
            .iter()
            .map(|document| document.document_type.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{CACHE_VERSION}:{types}")
    }

    /// Replaces the server results of every document with the records of its type.
    ///
    /// Documents without records in `records` keep their previous results.
    pub fn feed(&mut self, records: &[DocumentRecord]) {
        let mut groups: HashMap<&str, Vec<DocumentRecord>> = HashMap::new();
        for record in records {
            groups
                .entry(record.api_type.as_str())
                .or_default()
                .push(record.clone());
        }
        for document in &mut self.documents {
            if let Some(group) = groups.get(document.document_type.api_type()) {
                document.server_result = Some(group.clone());
            }
        }
    }

    /// First document, in selection order, that is not accepted yet.
    ///
    /// `None` means scanning is complete.
    #[must_use]
    pub fn next_document_to_scan(&self) -> Option<&ScannedDocument> {
        self.documents
            .iter()
            .find(|document| document.upload_state() != UploadState::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(api_type: &str, side: DocumentSide, status: DocumentStatus) -> DocumentRecord {
        DocumentRecord {
            id: format!("{api_type}-{side}"),
            api_type: api_type.to_string(),
            side: Some(side),
            status,
            errors: None,
        }
    }

    #[test]
    fn test_new_process_has_nothing_uploaded() {
        let process = ScanProcess::new(&[DocumentType::IdCard, DocumentType::Passport]);
        assert_eq!(process.documents.len(), 2);
        assert!(process
            .documents
            .iter()
            .all(|d| d.upload_state() == UploadState::NotUploaded));
        assert_eq!(
            process.next_document_to_scan().unwrap().document_type,
            DocumentType::IdCard
        );
    }

    #[test]
    fn test_serialize_restore() {
        for cache in [
            "V1:ID_CARD",
            "V1:PASSPORT,DRIVERS_LICENSE",
            "V1:ID_CARD,PASSPORT,DRIVERS_LICENSE",
        ] {
            assert_eq!(ScanProcess::restore(cache).unwrap().serialize(), cache);
        }
    }

    #[test]
    fn test_restore_rejects_malformed_cache() {
        for cache in ["V2:ID_CARD", "ID_CARD", "V1:ID_CARD:PASSPORT", "V1:", "V1:VISA", ""] {
            let err = ScanProcess::restore(cache).unwrap_err();
            assert!(
                matches!(err, VerifyKitError::CacheFormat(_)),
                "cache `{cache}` gave {err:?}"
            );
        }
    }

    #[test]
    fn test_feed_groups_by_api_type() {
        let mut process =
            ScanProcess::new(&[DocumentType::IdCard, DocumentType::DriversLicense]);
        process.feed(&[
            record("ID_CARD", DocumentSide::Front, DocumentStatus::Accepted),
            record("DRIVING_LICENSE", DocumentSide::Front, DocumentStatus::Accepted),
            record("ID_CARD", DocumentSide::Back, DocumentStatus::Accepted),
        ]);
        assert_eq!(process.documents[0].server_result.as_ref().unwrap().len(), 2);
        assert_eq!(process.documents[1].server_result.as_ref().unwrap().len(), 1);
        assert_eq!(
            process.documents[0].original_document_id(DocumentSide::Back),
            Some("ID_CARD-back".to_string())
        );
        assert!(process.next_document_to_scan().is_none());
    }

    #[test]
    fn test_feed_keeps_results_of_unmatched_documents() {
        let mut process = ScanProcess::new(&[DocumentType::IdCard, DocumentType::Passport]);
        process.feed(&[record("PASSPORT", DocumentSide::Front, DocumentStatus::Accepted)]);
        process.feed(&[record("ID_CARD", DocumentSide::Front, DocumentStatus::Accepted)]);
        assert!(process.documents[0].server_result.is_some());
        assert!(process.documents[1].server_result.is_some());
    }

    #[test]
    fn test_feed_is_idempotent() {
        let mut rejected = record("ID_CARD", DocumentSide::Front, DocumentStatus::Rejected);
        rejected.errors = Some(vec!["blurry".to_string()]);
        let records = vec![
            rejected,
            record("PASSPORT", DocumentSide::Front, DocumentStatus::Accepted),
        ];
        let mut process = ScanProcess::new(&[DocumentType::IdCard, DocumentType::Passport]);
        process.feed(&records);
        let first = process.clone();
        process.feed(&records);
        assert_eq!(process, first);
        assert_eq!(process.documents[0].upload_state(), UploadState::Rejected);
        assert_eq!(process.documents[1].upload_state(), UploadState::Accepted);
    }

    #[test]
    fn test_rejected_document_is_scanned_again() {
        let mut process = ScanProcess::new(&[DocumentType::Passport, DocumentType::IdCard]);
        let mut rejected = record("ID_CARD", DocumentSide::Back, DocumentStatus::Rejected);
        rejected.errors = Some(vec!["glare".to_string(), "cropped".to_string()]);
        process.feed(&[
            record("PASSPORT", DocumentSide::Front, DocumentStatus::Accepted),
            record("ID_CARD", DocumentSide::Front, DocumentStatus::Accepted),
            rejected,
        ]);
        let next = process.next_document_to_scan().unwrap();
        assert_eq!(next.document_type, DocumentType::IdCard);
        assert_eq!(next.errors(), vec!["glare", "cropped"]);
    }

    #[test]
    fn test_empty_error_list_is_not_a_rejection() {
        let mut accepted = record("PASSPORT", DocumentSide::Front, DocumentStatus::Accepted);
        accepted.errors = Some(vec![]);
        let mut process = ScanProcess::new(&[DocumentType::Passport]);
        process.feed(&[accepted]);
        assert_eq!(process.documents[0].upload_state(), UploadState::Accepted);
    }

    #[test]
    fn test_document_actions() {
        assert_eq!(DocumentStatus::Accepted.action(), Some(DocumentAction::Proceed));
        assert_eq!(
            DocumentStatus::UploadInProgress.action(),
            Some(DocumentAction::Wait)
        );
        assert_eq!(
            DocumentStatus::VerificationInProgress.action(),
            Some(DocumentAction::Wait)
        );
        assert_eq!(DocumentStatus::Failed.action(), Some(DocumentAction::Error));
        assert_eq!(DocumentStatus::Unknown.action(), None);
    }

    #[test]
    fn test_record_deserializes_unknown_status() {
        let parsed: DocumentRecord = serde_json::from_str(
            r#"{"id": "d1", "type": "ID_CARD", "side": "FRONT", "status": "ARCHIVED"}"#,
        )
        .unwrap();
        assert_eq!(parsed.status, DocumentStatus::Unknown);
        assert_eq!(parsed.side, Some(DocumentSide::Front));
        assert!(!parsed.has_errors());
    }
}
