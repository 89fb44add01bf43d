use pianotrack_core::Homography;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a frame produced no transform. None of these are fatal: the caller
/// skips the frame or falls back to an earlier estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// First frame of a stabilizer session; it only became the anchor.
    AnchorOnly,
    /// Fewer usable matches or points than a homography needs.
    InsufficientCorrespondences { found: usize, needed: usize },
    /// The corner search got more points than the four corners.
    UnexpectedPointCount { got: usize },
    /// Every candidate transform was singular or non-finite.
    DegenerateFit,
    /// The refiner was given no templates to fit against.
    NoTemplates,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnchorOnly => write!(f, "anchor frame recorded"),
            Self::InsufficientCorrespondences { found, needed } => {
                write!(f, "insufficient correspondences ({found} < {needed})")
            }
            Self::UnexpectedPointCount { got } => write!(f, "expected 4 points, got {got}"),
            Self::DegenerateFit => write!(f, "degenerate fit"),
            Self::NoTemplates => write!(f, "no templates"),
        }
    }
}

/// Outcome of one alignment attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Alignment<T = AlignedFit> {
    Aligned(T),
    Unavailable(UnavailableReason),
}

impl<T> Alignment<T> {
    pub fn is_aligned(&self) -> bool {
        matches!(self, Self::Aligned(_))
    }

    pub fn fit(&self) -> Option<&T> {
        match self {
            Self::Aligned(fit) => Some(fit),
            Self::Unavailable(_) => None,
        }
    }

    pub fn into_fit(self) -> Option<T> {
        match self {
            Self::Aligned(fit) => Some(fit),
            Self::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<UnavailableReason> {
        match self {
            Self::Aligned(_) => None,
            Self::Unavailable(r) => Some(*r),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Alignment<U> {
        match self {
            Self::Aligned(fit) => Alignment::Aligned(f(fit)),
            Self::Unavailable(r) => Alignment::Unavailable(r),
        }
    }
}

/// Anything that carries a fitted transform.
pub trait HasHomography {
    fn homography(&self) -> &Homography;
}

impl<T: HasHomography> Alignment<T> {
    pub fn homography(&self) -> Option<&Homography> {
        self.fit().map(HasHomography::homography)
    }
}

/// A robustly fitted transform from point correspondences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignedFit {
    pub homography: Homography,
    /// Correspondences handed to the robust fit.
    pub correspondences: usize,
    pub inliers: usize,
}

impl HasHomography for AlignedFit {
    fn homography(&self) -> &Homography {
        &self.homography
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_with_kind_tag() {
        let r = UnavailableReason::InsufficientCorrespondences { found: 2, needed: 4 };
        let json = serde_json::to_string(&r).expect("json");
        assert_eq!(json, r#"{"kind":"insufficient_correspondences","found":2,"needed":4}"#);
        assert_eq!(r.to_string(), "insufficient correspondences (2 < 4)");
    }

    #[test]
    fn accessors_follow_variant() {
        let ok: Alignment = Alignment::Aligned(AlignedFit {
            homography: Homography::identity(),
            correspondences: 10,
            inliers: 8,
        });
        assert!(ok.is_aligned());
        assert_eq!(ok.homography(), Some(&Homography::identity()));
        assert_eq!(ok.reason(), None);

        let no: Alignment = Alignment::Unavailable(UnavailableReason::AnchorOnly);
        assert!(no.homography().is_none());
        assert_eq!(no.reason(), Some(UnavailableReason::AnchorOnly));
        assert!(no.map(|f| f.inliers).fit().is_none());
    }
}
