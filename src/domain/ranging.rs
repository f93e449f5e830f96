// Ranging scan domain model
use crate::domain::errors::DecodeError;
use std::f64::consts::PI;

/// One full sweep of distance readings. Index i sits at a fixed angle in
/// [-π, π]; see `angle_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangingScan {
    distances: Vec<f64>,
}

impl RangingScan {
    pub fn new(distances: Vec<f64>) -> Result<Self, DecodeError> {
        if distances.is_empty() {
            return Err(DecodeError::EmptyScan);
        }
        Ok(Self { distances })
    }

    pub fn from_json(body: &[u8]) -> Result<Self, DecodeError> {
        let distances: Vec<f64> = serde_json::from_slice(body)?;
        Self::new(distances)
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    /// A single reading has no spread to distribute, so it points straight ahead.
    pub fn angle_at(&self, index: usize) -> f64 {
        let n = self.distances.len();
        if n == 1 {
            return 0.0;
        }
        if index == n - 1 {
            return PI;
        }
        -PI + index as f64 * (2.0 * PI / (n - 1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let scan = RangingScan::from_json(b"[1.5, 2, 3.25]").unwrap();
        assert_eq!(scan.distances(), &[1.5, 2.0, 3.25]);
        assert_eq!(scan.angle_at(0), -PI);
        assert_eq!(scan.angle_at(1), 0.0);
        assert_eq!(scan.angle_at(2), PI);
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(matches!(RangingScan::from_json(b"[]"), Err(DecodeError::EmptyScan)));
        assert!(matches!(RangingScan::from_json(b"{\"a\":1}"), Err(DecodeError::Json(_))));
        assert!(matches!(RangingScan::from_json(b"[1, \"x\"]"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_single_reading_points_ahead() {
        let scan = RangingScan::new(vec![4.0]).unwrap();
        assert_eq!(scan.angle_at(0), 0.0);
    }
}
