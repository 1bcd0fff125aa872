use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource quantities along the three capacity dimensions
///
/// Used both for a cluster's total/available capacity and for a
/// deployment's request. Quantities are unsigned, so a negative request
/// cannot be represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resources {
    /// Memory units
    pub memory: u64,
    /// Compute units
    pub cpu: u64,
    /// Accelerator units
    pub gpu: u64,
}

impl Resources {
    /// Create a new set of quantities
    pub const fn new(memory: u64, cpu: u64, gpu: u64) -> Self {
        Self { memory, cpu, gpu }
    }

    /// All dimensions zero
    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// True if every dimension of `self` is at most the matching dimension of `available`
    pub fn fits_within(&self, available: &Resources) -> bool {
        self.memory <= available.memory && self.cpu <= available.cpu && self.gpu <= available.gpu
    }

    /// Subtract `request` from every dimension, or `None` if any dimension would underflow
    pub fn checked_sub(&self, request: &Resources) -> Option<Resources> {
        Some(Resources {
            memory: self.memory.checked_sub(request.memory)?,
            cpu: self.cpu.checked_sub(request.cpu)?,
            gpu: self.gpu.checked_sub(request.gpu)?,
        })
    }

    /// Add `amount` to every dimension, clamping each one at `cap`
    pub fn saturating_add_capped(&self, amount: &Resources, cap: &Resources) -> Resources {
        Resources {
            memory: self.memory.saturating_add(amount.memory).min(cap.memory),
            cpu: self.cpu.saturating_add(amount.cpu).min(cap.cpu),
            gpu: self.gpu.saturating_add(amount.gpu).min(cap.gpu),
        }
    }

    /// Per-dimension amount by which `self` exceeds `available` (zero where it fits)
    pub fn shortfall(&self, available: &Resources) -> Resources {
        Resources {
            memory: self.memory.saturating_sub(available.memory),
            cpu: self.cpu.saturating_sub(available.cpu),
            gpu: self.gpu.saturating_sub(available.gpu),
        }
    }

    /// True if every dimension is zero
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem={} cpu={} gpu={}", self.memory, self.cpu, self.gpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_within_requires_every_dimension() {
        let available = Resources::new(10, 4, 2);

        assert!(Resources::new(2, 1, 0).fits_within(&available));
        assert!(Resources::new(10, 4, 2).fits_within(&available));
        assert!(!Resources::new(11, 1, 0).fits_within(&available));
        assert!(!Resources::new(1, 5, 0).fits_within(&available));
        assert!(!Resources::new(1, 1, 3).fits_within(&available));
    }

    #[test]
    fn test_checked_sub() {
        let available = Resources::new(10, 4, 2);

        assert_eq!(
            available.checked_sub(&Resources::new(2, 1, 0)),
            Some(Resources::new(8, 3, 2))
        );
        assert_eq!(available.checked_sub(&Resources::new(12, 6, 4)), None);
        // One short dimension is enough to refuse the whole subtraction
        assert_eq!(available.checked_sub(&Resources::new(0, 0, 3)), None);
    }

    #[test]
    fn test_saturating_add_capped() {
        let total = Resources::new(10, 4, 2);
        let available = Resources::new(8, 3, 2);

        assert_eq!(
            available.saturating_add_capped(&Resources::new(2, 1, 0), &total),
            total
        );
        assert_eq!(
            available.saturating_add_capped(&Resources::new(50, 50, 50), &total),
            total
        );
    }

    #[test]
    fn test_shortfall() {
        let available = Resources::new(10, 4, 2);
        assert_eq!(
            Resources::new(12, 6, 4).shortfall(&available),
            Resources::new(2, 2, 2)
        );
        assert!(Resources::new(1, 1, 1).shortfall(&available).is_zero());
    }

    #[test]
    fn test_display() {
        assert_eq!(Resources::new(8, 3, 2).to_string(), "mem=8 cpu=3 gpu=2");
    }
}
