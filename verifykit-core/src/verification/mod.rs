//! Identity verification flow: status translation, the local scan process and
//! the orchestrator driving the user through the verification screens.

mod documents;
mod listener;
mod scan_process;
mod service;
mod state;
mod status;

pub use documents::DocumentFile;
pub(crate) use documents::DocumentSubmitRequest;
pub use listener::{ListenerId, VerificationListener};
pub use scan_process::{
    DocumentAction, DocumentRecord, DocumentSide, DocumentStatus, DocumentType, ScanProcess,
    ScannedDocument, UploadState,
};
pub use service::VerificationService;
pub use state::{
    EndstateReason, ProcessingItem, VerificationError, VerificationResult, VerificationStateData,
};
pub use status::{
    translate, NextStep, ProcessConfig, RemotePhase, RemoteStatus, RemoteStatusKind,
    StatusCheckReason,
};
