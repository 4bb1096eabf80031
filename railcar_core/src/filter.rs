//! Distance smoothing: optional median prefilter followed by optional EMA.

use std::collections::VecDeque;

/// Smoothing pipeline for raw distance samples (cm).
///
/// Stage 1: median over a sliding window (disabled at window 1).
/// Stage 2: EMA with factor alpha (disabled when `None`).
#[derive(Debug)]
pub struct DistanceFilter {
    median_window: usize,
    ema_alpha: Option<f32>,
    med_buf: VecDeque<f32>,
    tmp: Vec<f32>,
    ema_prev: Option<f32>,
    last: Option<f32>,
}

impl DistanceFilter {
    pub fn new(median_window: usize, ema_alpha: Option<f32>) -> Self {
        let w = median_window.max(1);
        Self {
            median_window: w,
            ema_alpha: ema_alpha.filter(|a| a.is_finite() && *a > 0.0),
            med_buf: VecDeque::with_capacity(w),
            tmp: Vec::with_capacity(w),
            ema_prev: None,
            last: None,
        }
    }

    /// Feed one raw sample, returning the filtered value.
    pub fn update(&mut self, raw_cm: f32) -> f32 {
        let after_median = if self.median_window > 1 {
            self.med_buf.push_back(raw_cm);
            if self.med_buf.len() > self.median_window {
                self.med_buf.pop_front();
            }
            self.tmp.clear();
            self.tmp.extend(self.med_buf.iter().copied());
            self.tmp.sort_by(f32::total_cmp);
            let n = self.tmp.len();
            let mid = n / 2;
            if n % 2 == 0 {
                (self.tmp[mid - 1] + self.tmp[mid]) / 2.0
            } else {
                self.tmp[mid]
            }
        } else {
            raw_cm
        };

        let out = match self.ema_alpha {
            Some(alpha) => {
                // First sample seeds the EMA to avoid startup bias.
                let y = match self.ema_prev {
                    None => after_median,
                    Some(prev) => alpha * after_median + (1.0 - alpha) * prev,
                };
                self.ema_prev = Some(y);
                y
            }
            None => after_median,
        };
        self.last = Some(out);
        out
    }

    /// Clear all filter state. Call on mode entry.
    pub fn reset(&mut self) {
        self.med_buf.clear();
        self.ema_prev = None;
        self.last = None;
    }

    /// Last filtered value, if any sample has been fed since the last reset.
    pub fn last(&self) -> Option<f32> {
        self.last
    }
}
