pub mod capture;
pub mod quality;

pub use capture::{AudioCapture, CaptureFactory, CaptureSource, SyntheticCapture};
pub use quality::QualityProfile;
