//! Four-point correspondence collection for the legacy homography mode.

use serde::{Deserialize, Serialize};

use crate::types::{Point, RegistrationError};

/// Number of pairs that determine a homography exactly.
pub const REQUIRED_PAIRS: usize = 4;

/// One geographic point matched to the pixel the user clicked for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Collection step (`0..=3`) this pair was recorded at.
    pub step: usize,
    pub geographic: Point,
    pub pixel: Point,
}

/// Ordered set of up to four correspondences.
///
/// Once it holds four pairs it is frozen: further pushes fail until
/// [`undo`](Self::undo) removes the last pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCorrespondenceSet")]
pub struct CorrespondenceSet {
    pairs: Vec<Correspondence>,
}

#[derive(Deserialize)]
struct RawCorrespondenceSet {
    pairs: Vec<Correspondence>,
}

impl TryFrom<RawCorrespondenceSet> for CorrespondenceSet {
    type Error = RegistrationError;

    fn try_from(raw: RawCorrespondenceSet) -> Result<Self, Self::Error> {
        if raw.pairs.len() > REQUIRED_PAIRS {
            return Err(RegistrationError::CorrespondenceSetFull);
        }
        if let Some((position, c)) = raw.pairs.iter().enumerate().find(|(i, c)| c.step != *i) {
            return Err(RegistrationError::CorrespondenceOutOfOrder {
                position,
                step: c.step,
            });
        }
        Ok(Self { pairs: raw.pairs })
    }
}

impl CorrespondenceSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Build a frozen set from four `(geographic, pixel)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: [(Point, Point); REQUIRED_PAIRS]) -> Self {
        let pairs = pairs
            .iter()
            .enumerate()
            .map(|(step, &(geographic, pixel))| Correspondence {
                step,
                geographic,
                pixel,
            })
            .collect();
        Self { pairs }
    }

    /// Record the next pair and return the step index it was stored at.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::CorrespondenceSetFull`] if the set is
    /// already frozen.
    pub fn push(&mut self, geographic: Point, pixel: Point) -> Result<usize, RegistrationError> {
        if self.is_frozen() {
            return Err(RegistrationError::CorrespondenceSetFull);
        }
        let step = self.pairs.len();
        self.pairs.push(Correspondence {
            step,
            geographic,
            pixel,
        });
        Ok(step)
    }

    /// Remove and return the most recent pair, unfreezing the set.
    pub fn undo(&mut self) -> Option<Correspondence> {
        self.pairs.pop()
    }

    /// Remove every pair.
    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    /// `true` once all four pairs are present.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.pairs.len() >= REQUIRED_PAIRS
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Step index the next push will use, or `None` when frozen.
    #[must_use]
    pub const fn next_step(&self) -> Option<usize> {
        if self.is_frozen() {
            None
        } else {
            Some(self.pairs.len())
        }
    }

    #[must_use]
    pub fn pairs(&self) -> &[Correspondence] {
        &self.pairs
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn push_assigns_sequential_steps() {
        let mut set = CorrespondenceSet::new();
        assert_eq!(set.next_step(), Some(0));
        assert_eq!(set.push(p(0.0, 0.0), p(1.0, 1.0)).unwrap(), 0);
        assert_eq!(set.push(p(1.0, 0.0), p(2.0, 1.0)).unwrap(), 1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.pairs()[1].step, 1);
        assert!(!set.is_frozen());
    }

    #[test]
    fn fifth_push_is_rejected() {
        let mut set = CorrespondenceSet::new();
        for i in 0..4 {
            let v = f64::from(i);
            set.push(p(v, v * v), p(v, v)).unwrap();
        }
        assert!(set.is_frozen());
        assert_eq!(set.next_step(), None);
        let err = set.push(p(9.0, 9.0), p(9.0, 9.0)).unwrap_err();
        assert!(matches!(err, RegistrationError::CorrespondenceSetFull));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn undo_unfreezes_and_reuses_step() {
        let mut set = CorrespondenceSet::from_pairs([
            (p(0.0, 0.0), p(0.0, 0.0)),
            (p(1.0, 0.0), p(1.0, 0.0)),
            (p(1.0, 1.0), p(1.0, 1.0)),
            (p(0.0, 1.0), p(0.0, 1.0)),
        ]);
        assert!(set.is_frozen());
        let last = set.undo().unwrap();
        assert_eq!(last.step, 3);
        assert!(!set.is_frozen());
        assert_eq!(set.push(p(0.0, 2.0), p(0.0, 2.0)).unwrap(), 3);
    }

    #[test]
    fn undo_on_empty_is_none() {
        let mut set = CorrespondenceSet::new();
        assert!(set.undo().is_none());
        assert!(set.is_empty());
    }

    // --- serde ---

    #[test]
    fn stored_set_round_trips() {
        let mut set = CorrespondenceSet::new();
        set.push(p(0.0, 0.0), p(1.0, 1.0)).unwrap();
        set.push(p(5.0, 0.0), p(6.0, 1.0)).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: CorrespondenceSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn stored_set_with_five_pairs_is_rejected() {
        let pair = |i: usize| format!(r#"{{"step":{i},"geographic":{{"x":0,"y":0}},"pixel":{{"x":0,"y":0}}}}"#);
        let pairs: Vec<String> = (0..5).map(pair).collect();
        let json = format!(r#"{{"pairs":[{}]}}"#, pairs.join(","));
        let err = serde_json::from_str::<CorrespondenceSet>(&json).unwrap_err();
        assert!(err.to_string().contains("already holds 4 pairs"), "{err}");
    }

    #[test]
    fn stored_set_with_skipped_step_is_rejected() {
        let json = r#"{"pairs":[
            {"step":0,"geographic":{"x":0,"y":0},"pixel":{"x":0,"y":0}},
            {"step":2,"geographic":{"x":1,"y":0},"pixel":{"x":1,"y":0}}
        ]}"#;
        let err = serde_json::from_str::<CorrespondenceSet>(json).unwrap_err();
        assert!(err.to_string().contains("position 1 claims step 2"), "{err}");
    }
}
