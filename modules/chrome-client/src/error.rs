use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChromeError>;

#[derive(Debug, Error)]
pub enum ChromeError {
    #[error("Chromium binary not found (set CHROME_BIN or install chromium)")]
    BinaryNotFound,

    #[error("Failed to launch Chromium: {0}")]
    Launch(String),

    #[error("Page error: {0}")]
    Page(String),
}

impl From<chromiumoxide::error::CdpError> for ChromeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ChromeError::Page(err.to_string())
    }
}
