//! Parameter-change memoization.

/// Last parameter vector an engine computed with.
///
/// Comparison is element-wise exact equality with no tolerance: any bit-level
/// change in any component forces a recomputation. A NaN component never
/// compares equal, so it always recomputes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterCache {
    previous: Option<Vec<f64>>,
}

impl ParameterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `params` differs from the stored vector, or nothing is stored.
    pub fn needs_update(&self, params: &[f64]) -> bool {
        match &self.previous {
            None => true,
            Some(prev) => prev.len() != params.len() || prev.iter().zip(params).any(|(a, b)| a != b),
        }
    }

    /// Remember `params` as the vector behind the current weights.
    pub fn store(&mut self, params: &[f64]) {
        match &mut self.previous {
            Some(prev) if prev.len() == params.len() => prev.copy_from_slice(params),
            _ => self.previous = Some(params.to_vec()),
        }
    }

    /// Forget the stored vector so the next call recomputes.
    pub fn invalidate(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&[f64]> {
        self.previous.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_needs_update() {
        let cache = ParameterCache::new();
        assert!(cache.needs_update(&[1.0, 2.0]));
        assert!(cache.previous().is_none());
    }

    #[test]
    fn test_exact_equality() {
        let mut cache = ParameterCache::new();
        cache.store(&[0.3, 2.5e-3]);
        assert!(!cache.needs_update(&[0.3, 2.5e-3]));
        let next_ulp = f64::from_bits(2.5e-3f64.to_bits() + 1);
        assert!(cache.needs_update(&[0.3, next_ulp]));
        assert!(cache.needs_update(&[0.30000000000000004, 2.5e-3]));
    }

    #[test]
    fn test_nan_always_updates() {
        let mut cache = ParameterCache::new();
        cache.store(&[f64::NAN]);
        assert!(cache.needs_update(&[f64::NAN]));
    }

    #[test]
    fn test_invalidate() {
        let mut cache = ParameterCache::new();
        cache.store(&[1.0]);
        cache.invalidate();
        assert!(cache.needs_update(&[1.0]));
    }
}
