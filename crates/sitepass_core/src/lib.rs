pub mod domain;
pub mod error;
pub mod machine;
pub mod orchestrator;
pub mod ports;
pub mod presenter;

pub use domain::{
    BooksSigned, CheckinResult, OcrFields, OshaCardType, PassportDraft, ProvisionedPassport,
    SiteInfo, ValidationError, WorkerPassport,
};
pub use error::CheckinError;
pub use machine::{transition, CheckinEvent, CheckinState, Effect, Transition};
pub use orchestrator::{CheckinOrchestrator, CheckinPorts, CheckinSession};
pub use ports::{
    CardRecognitionService, CheckinService, CredentialStore, PassportService, PortError,
    PortResult, SiteDirectory,
};
pub use presenter::{present, ResultView};
