use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("kube error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("controller error: {0}")]
    Controller(#[from] taint_remover_controller::Error),

    #[error("crd error: {0}")]
    Crds(#[from] taint_remover_crds::Error),
}
