//! Payload of the document upload: a zip archive of the scanned images plus
//! metadata describing every file.

use std::io::{Cursor, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::scan_process::{DocumentSide, DocumentType};
use crate::error::VerifyKitError;

/// One scanned image to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    /// Document the image belongs to.
    pub document_type: DocumentType,
    /// Scanned side.
    pub side: DocumentSide,
    /// JPEG bytes.
    pub data: Vec<u8>,
    /// Server id of the document this image replaces, when resubmitting.
    pub original_document_id: Option<String>,
}

impl DocumentFile {
    /// Name of the file inside the archive, e.g. `id_card_front.jpg`.
    #[must_use]
    pub fn filename(&self) -> String {
        format!(
            "{}_{}.jpg",
            self.document_type.api_type().to_lowercase(),
            self.side
        )
    }
}

/// Metadata of one file in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentMetadata {
    pub filename: String,
    #[serde(rename = "type")]
    pub api_type: &'static str,
    pub side: DocumentSide,
    pub original_document_id: Option<String>,
}

/// Request body of the document upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentSubmitRequest {
    pub process_id: String,
    pub resubmit: bool,
    /// Base64 of the zip archive.
    pub data: String,
    pub documents: Vec<DocumentMetadata>,
}

impl DocumentSubmitRequest {
    /// Packs `files` for upload within `process_id`.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::InvalidInput`] for an empty file list and
    /// [`VerifyKitError::SerializationError`] when the archive cannot be written.
    pub(crate) fn build(process_id: &str, files: &[DocumentFile]) -> Result<Self, VerifyKitError> {
        if files.is_empty() {
            return Err(VerifyKitError::InvalidInput {
                attribute: "files".to_string(),
                reason: "at least one file is required".to_string(),
            });
        }

        let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            let filename = file.filename();
            archive
                .start_file(filename.as_str(), options)
                .map_err(|e| VerifyKitError::SerializationError(e.to_string()))?;
            archive
                .write_all(&file.data)
                .map_err(|e| VerifyKitError::SerializationError(e.to_string()))?;
            documents.push(DocumentMetadata {
                filename,
                api_type: file.document_type.api_type(),
                side: file.side,
                original_document_id: file.original_document_id.clone(),
            });
        }
        let bytes = archive
            .finish()
            .map_err(|e| VerifyKitError::SerializationError(e.to_string()))?
            .into_inner();

        Ok(Self {
            process_id: process_id.to_string(),
            resubmit: files.iter().any(|f| f.original_document_id.is_some()),
            data: STANDARD.encode(bytes),
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn file(
        document_type: DocumentType,
        side: DocumentSide,
        original_document_id: Option<&str>,
    ) -> DocumentFile {
        DocumentFile {
            document_type,
            side,
            data: vec![0xFF, 0xD8, 0xFF, 0xE0, side as u8],
            original_document_id: original_document_id.map(ToString::to_string),
        }
    }

    #[test]
    fn test_first_submission() {
        let request = DocumentSubmitRequest::build(
            "p-1",
            &[
                file(DocumentType::IdCard, DocumentSide::Front, None),
                file(DocumentType::IdCard, DocumentSide::Back, None),
            ],
        )
        .unwrap();

        assert!(!request.resubmit);
        let names: Vec<_> = request.documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["id_card_front.jpg", "id_card_back.jpg"]);
        assert_eq!(request.documents[0].api_type, "ID_CARD");
    }

    #[test]
    fn test_resubmission_is_flagged() {
        let request = DocumentSubmitRequest::build(
            "p-1",
            &[
                file(DocumentType::Passport, DocumentSide::Front, Some("doc-7")),
                file(DocumentType::DriversLicense, DocumentSide::Front, None),
            ],
        )
        .unwrap();

        assert!(request.resubmit);
        assert_eq!(request.documents[1].filename, "driving_license_front.jpg");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["documents"][0]["originalDocumentId"], "doc-7");
        assert_eq!(json["documents"][0]["type"], "PASSPORT");
        assert_eq!(json["documents"][0]["side"], "FRONT");
        assert_eq!(json["processId"], "p-1");
    }

    #[test]
    fn test_archive_contains_every_file() {
        let files = [
            file(DocumentType::IdCard, DocumentSide::Front, None),
            file(DocumentType::IdCard, DocumentSide::Back, None),
        ];
        let request = DocumentSubmitRequest::build("p-1", &files).unwrap();
        let bytes = STANDARD.decode(&request.data).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = Vec::new();
        archive
            .by_name("id_card_back.jpg")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, files[1].data);
    }

    #[test]
    fn test_empty_submission_is_rejected() {
        let err = DocumentSubmitRequest::build("p-1", &[]).unwrap_err();
        assert!(matches!(err, VerifyKitError::InvalidInput { .. }));
    }
}
