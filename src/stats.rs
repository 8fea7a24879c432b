//! Summary sleep statistics from a hypnogram.
use serde_json::{json, Map, Value};

/// Standard sleep-architecture summary.  Durations in minutes, shares in
/// percent, all rounded to two decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepStats {
    pub time_in_bed: f64,
    pub wake: f64,
    pub n1: f64,
    pub n2: f64,
    pub n3: f64,
    pub rem: f64,
    pub total_sleep_time: f64,
    /// TST as a share of time in bed.
    pub sleep_efficiency: f64,
    /// Time before the first non-wake epoch; 0 if sleep never starts.
    pub sleep_latency: f64,
    /// Wake time after sleep onset.
    pub waso: f64,
    pub n1_pct: f64,
    pub n2_pct: f64,
    pub n3_pct: f64,
    pub rem_pct: f64,
}

impl SleepStats {
    /// Compute statistics for `hypnogram` with epochs of `epoch_dur` seconds.
    /// An empty hypnogram has no statistics.
    pub fn compute(hypnogram: &[u8], epoch_dur: f32) -> Option<Self> {
        if hypnogram.is_empty() {
            return None;
        }
        let minutes = |n: usize| n as f64 * epoch_dur as f64 / 60.0;
        let count = |stage: u8| hypnogram.iter().filter(|&&s| s == stage).count();

        let time_in_bed = minutes(hypnogram.len());
        let (wake, n1, n2, n3, rem) = (
            minutes(count(0)),
            minutes(count(1)),
            minutes(count(2)),
            minutes(count(3)),
            minutes(count(5)),
        );
        let tst = n1 + n2 + n3 + rem;
        let sleep_efficiency = if time_in_bed > 0.0 { tst / time_in_bed * 100.0 } else { 0.0 };

        let onset = hypnogram.iter().position(|s| (1..=5).contains(s));
        let (sleep_latency, waso) = match onset {
            Some(i) => (
                minutes(i),
                minutes(hypnogram[i..].iter().filter(|&&s| s == 0).count()),
            ),
            None => (0.0, 0.0),
        };
        let pct = |v: f64| if tst > 0.0 { v / tst * 100.0 } else { 0.0 };

        Some(Self {
            time_in_bed: round2(time_in_bed),
            wake: round2(wake),
            n1: round2(n1),
            n2: round2(n2),
            n3: round2(n3),
            rem: round2(rem),
            total_sleep_time: round2(tst),
            sleep_efficiency: round2(sleep_efficiency),
            sleep_latency: round2(sleep_latency),
            waso: round2(waso),
            n1_pct: round2(pct(n1)),
            n2_pct: round2(pct(n2)),
            n3_pct: round2(pct(n3)),
            rem_pct: round2(pct(rem)),
        })
    }

    /// `(label, value)` pairs in report order.
    pub fn entries(&self) -> [(&'static str, f64); 14] {
        [
            ("Time in Bed (minutes)", self.time_in_bed),
            ("Time in Wake (minutes)", self.wake),
            ("Time in N1 (minutes)", self.n1),
            ("Time in N2 (minutes)", self.n2),
            ("Time in N3 (minutes)", self.n3),
            ("Time in REM (minutes)", self.rem),
            ("Total Sleep Time (minutes)", self.total_sleep_time),
            ("Sleep Efficiency (%)", self.sleep_efficiency),
            ("Sleep Latency (minutes)", self.sleep_latency),
            ("WASO (minutes)", self.waso),
            ("N1 Sleep (%)", self.n1_pct),
            ("N2 Sleep (%)", self.n2_pct),
            ("N3 Sleep (Deep Sleep) (%)", self.n3_pct),
            ("REM Sleep (%)", self.rem_pct),
        ]
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries()
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        Value::Object(map)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_has_no_stats() {
        assert_eq!(SleepStats::compute(&[], 30.0), None);
    }

    #[test]
    fn basic_night() {
        // W W N1 N2 N2 W N3 REM
        let stats = SleepStats::compute(&[0, 0, 1, 2, 2, 0, 3, 5], 30.0).unwrap();
        assert_abs_diff_eq!(stats.time_in_bed, 4.0);
        assert_abs_diff_eq!(stats.wake, 1.5);
        assert_abs_diff_eq!(stats.total_sleep_time, 2.5);
        assert_abs_diff_eq!(stats.sleep_efficiency, 62.5);
        assert_abs_diff_eq!(stats.sleep_latency, 1.0);
        assert_abs_diff_eq!(stats.waso, 0.5);
        assert_abs_diff_eq!(stats.n2_pct, 40.0);
        assert_abs_diff_eq!(stats.rem_pct, 20.0);
    }

    #[test]
    fn never_asleep() {
        let stats = SleepStats::compute(&[0, 0, 6], 30.0).unwrap();
        assert_eq!(stats.sleep_latency, 0.0);
        assert_eq!(stats.waso, 0.0);
        assert_eq!(stats.n1_pct, 0.0);
        assert_eq!(stats.sleep_efficiency, 0.0);
    }

    #[test]
    fn values_rounded() {
        let stats = SleepStats::compute(&[1, 2, 2], 30.0).unwrap();
        assert_abs_diff_eq!(stats.n1_pct, 33.33);
        assert_abs_diff_eq!(stats.n2_pct, 66.67);
        assert_eq!(stats.to_json()["N1 Sleep (%)"], json!(33.33));
    }
}
