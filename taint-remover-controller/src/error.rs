use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("kube error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("failed to serialize node patch: {0}")]
    PatchSerialization(#[from] serde_json::Error),

    #[error("reconciliation canceled")]
    Canceled,
}

impl Error {
    /// Low-cardinality label for the failure counter.
    pub fn metric_label(&self) -> String {
        match self {
            Error::KubeError(_) => "kube".into(),
            Error::PatchSerialization(_) => "serialization".into(),
            Error::Canceled => "canceled".into(),
        }
    }
}
