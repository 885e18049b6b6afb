// Countdown digit pulse: grows to `max`, shrinks to `min`, repeat.
// Advanced once per loop tick instead of rescheduling itself.

#[derive(Debug, Clone, Copy)]
pub struct Pulse {
    size: u32,
    min: u32,
    max: u32,
    step: u32,
    growing: bool,
}

impl Pulse {
    pub fn new(min: u32, max: u32, step: u32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self { size: min, min, max, step: step.max(1), growing: true }
    }

    /// Restart from the small end (each new countdown digit).
    pub fn reset(&mut self) {
        self.size = self.min;
        self.growing = true;
    }

    pub fn advance(&mut self) {
        if self.growing {
            self.size = (self.size + self.step).min(self.max);
            if self.size == self.max {
                self.growing = false;
            }
        } else {
            self.size = self.size.saturating_sub(self.step).max(self.min);
            if self.size == self.min {
                self.growing = true;
            }
        }
    }

    /// Current size, always within `[min, max]`.
    pub fn size(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounces_between_bounds() {
        let mut p = Pulse::new(4, 10, 3);
        let sizes: Vec<u32> = (0..8)
            .map(|_| {
                p.advance();
                p.size()
            })
            .collect();
        assert_eq!(sizes, vec![7, 10, 7, 4, 7, 10, 7, 4]);
    }

    #[test]
    fn never_leaves_range() {
        let mut p = Pulse::new(12, 3, 5);
        for _ in 0..100 {
            p.advance();
            assert!((3..=12).contains(&p.size()));
        }
    }

    #[test]
    fn reset_starts_small_and_growing() {
        let mut p = Pulse::new(2, 6, 2);
        p.advance();
        p.advance();
        p.advance();
        p.reset();
        assert_eq!(p.size(), 2);
        p.advance();
        assert_eq!(p.size(), 4);
    }
}
