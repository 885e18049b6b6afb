// One error type for the whole kiosk.
// Every variant states *where* things went wrong; the session turns the
// recoverable ones into short status text for the screen.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("window init error: {0}")]
    WindowInit(String), // Creating the window failed

    #[error("window update error: {0}")]
    WindowUpdate(String), // Updating the window buffer failed

    #[error("camera init error: {0}")]
    CameraInit(String), // Opening/starting the camera failed

    #[error("camera frame error: {0}")]
    CameraFrame(String), // Grabbing/decoding a frame failed

    #[error("asset error ({}): {reason}", .path.display())]
    Asset { path: PathBuf, reason: String },

    #[error("diploma template missing: {}", .0.display())]
    TemplateMissing(PathBuf),

    #[error("invalid diploma template: {0}")]
    InvalidTemplate(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("print error: {0}")]
    Print(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn asset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Asset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short text suitable for the kiosk screen.
    pub fn user_message(&self) -> String {
        match self {
            Error::TemplateMissing(_) => "Diploma template missing".to_string(),
            Error::InvalidTemplate(_) => "Diploma template is invalid".to_string(),
            Error::Encode(_) | Error::Storage(_) => "Could not save picture".to_string(),
            Error::Print(_) => "Print failed".to_string(),
            Error::Worker(_) => "Printing unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Encode(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failing_stage() {
        assert!(
            Error::CameraFrame("x".into())
                .to_string()
                .starts_with("camera frame error:")
        );
        assert!(
            Error::TemplateMissing(PathBuf::from("/tmp/diploma.png"))
                .to_string()
                .contains("/tmp/diploma.png")
        );
        assert!(
            Error::asset("/tmp/overlay.png", "not found")
                .to_string()
                .contains("not found")
        );
    }

    #[test]
    fn user_messages_stay_short() {
        let err = Error::TemplateMissing(PathBuf::from("/very/long/path/to/template.png"));
        assert_eq!(err.user_message(), "Diploma template missing");
        let err = Error::storage("disk full");
        assert_eq!(err.user_message(), "Could not save picture");
    }

    #[test]
    fn io_errors_become_storage_errors() {
        let err: Error = std::io::Error::other("boom").into();
        assert!(matches!(err, Error::Storage(ref s) if s.contains("boom")));
    }
}
