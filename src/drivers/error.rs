use std::io;
use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open device link on {port}: {source}")]
    Connect {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("no open device link")]
    NotConnected,
    #[error("no gain selected")]
    NoGainSelected,
    #[error("unknown gain token {0:?}")]
    UnknownGain(String),
    #[error("failed to send {token:?} to device: {source}")]
    Send {
        token: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to export samples to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sample store is no longer running")]
    StoreClosed,
    #[error("failed to spawn {0} thread")]
    WorkerSpawn(&'static str, #[source] io::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for LinkError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        LinkError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for LinkError {
    fn from(value: image::ImageError) -> Self {
        LinkError::Plot(value.to_string())
    }
}
