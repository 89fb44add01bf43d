/// Calibration failures that need the user to act (re-mark corners, pick
/// another template).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("no acceptable alignment among {candidates} candidates")]
    ExhaustedSearch { candidates: usize },
    #[error("expected exactly 4 marked corners, got {got}")]
    InvalidPointCount { got: usize },
}
