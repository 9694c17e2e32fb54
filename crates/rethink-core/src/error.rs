use thiserror::Error;

/// Fatal errors that end a run without an outcome.
///
/// Only transport/provider failures on the generator path are fatal;
/// auditor-side failures degrade to notifications, and retry exhaustion is a
/// [`crate::RunOutcome`] variant.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Provider error: {0}")]
    Provider(#[from] rethink_provider::ProviderError),
}
