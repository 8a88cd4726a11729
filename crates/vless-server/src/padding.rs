//! Response padding generator.
//!
//! Produces a run of `'0'` characters whose length is drawn from a
//! configured range, used as the `X-Padding` header on streamed responses.
//! The value only obscures response sizes; peers never parse it.

use rand::Rng;

/// Closed length range `[min, max]` with `min >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingSpec {
    min: usize,
    max: usize,
}

impl PaddingSpec {
    /// Parse `"min-max"` or a single number.
    ///
    /// Tokens are split on `-`; tokens without a leading number are skipped
    /// and only the first two numbers count. Returns `None` (padding
    /// disabled) when no number survives or a bound is below 1.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut bounds: Vec<usize> = spec.split('-').filter_map(leading_number).take(2).collect();
        bounds.sort_unstable();
        let min = *bounds.first()?;
        let max = *bounds.last()?;
        if min < 1 || max < 1 {
            return None;
        }
        Some(Self { min, max })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Draw a length uniformly from the range.
    pub fn sample_len(&self) -> usize {
        if self.min == self.max {
            self.min
        } else {
            rand::thread_rng().gen_range(self.min..=self.max)
        }
    }

    pub fn generate(&self) -> String {
        "0".repeat(self.sample_len())
    }
}

/// Padding for `spec`, or `None` when padding is disabled.
pub fn random_padding(spec: Option<&str>) -> Option<String> {
    PaddingSpec::parse(spec?).map(|p| p.generate())
}

/// Leading decimal integer of a token, ignoring surrounding junk.
///
/// `" 12px"` yields 12; `"px"` and `""` yield nothing.
fn leading_number(token: &str) -> Option<usize> {
    let t = token.trim_start();
    let t = t.strip_prefix('+').unwrap_or(t);
    let end = t.find(|c: char| !c.is_ascii_digit()).unwrap_or(t.len());
    t[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_inputs() {
        assert_eq!(random_padding(None), None);
        assert_eq!(random_padding(Some("")), None);
        assert_eq!(random_padding(Some("0")), None);
        assert_eq!(random_padding(Some("0-0")), None);
        assert_eq!(random_padding(Some("0-10")), None);
        assert_eq!(random_padding(Some("abc")), None);
    }

    #[test]
    fn single_number() {
        assert_eq!(random_padding(Some("-1")).as_deref(), Some("0"));
        assert_eq!(random_padding(Some("1")).as_deref(), Some("0"));
        assert_eq!(random_padding(Some("4")).as_deref(), Some("0000"));
    }

    #[test]
    fn range_stays_within_bounds() {
        for _ in 0..200 {
            let p = random_padding(Some("100-1000")).unwrap();
            assert!((100..=1000).contains(&p.len()));
            assert!(p.chars().all(|c| c == '0'));
        }
    }

    #[test]
    fn reversed_range_is_sorted() {
        let spec = PaddingSpec::parse("9-3").unwrap();
        assert_eq!((spec.min(), spec.max()), (3, 9));
    }

    #[test]
    fn junk_tokens_are_skipped() {
        // the first two numbers are 5 and 3; 1 is ignored
        let spec = PaddingSpec::parse("x-5-y-3-1").unwrap();
        assert_eq!((spec.min(), spec.max()), (3, 5));
        for _ in 0..100 {
            let len = random_padding(Some("junk-5--3-1")).unwrap().len();
            assert!((1..=5).contains(&len));
        }
    }

    #[test]
    fn leading_number_rules() {
        assert_eq!(leading_number(" 12px"), Some(12));
        assert_eq!(leading_number("+7"), Some(7));
        assert_eq!(leading_number("px12"), None);
        assert_eq!(leading_number(""), None);
    }
}
