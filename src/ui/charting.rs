use breathwork::RoundResult;

const BAR_STEP_SECS: u64 = 30;

/// `(label, hold seconds)` pairs for the hold-time bar chart
pub fn hold_bars(results: &[RoundResult]) -> Vec<(String, u64)> {
    results
        .iter()
        .map(|r| (format!("R{}", r.round_number), r.hold_seconds))
        .collect()
}

/// Top of the bar chart: the longest hold rounded up to the next half minute
pub fn bar_ceiling(results: &[RoundResult]) -> u64 {
    let longest = results.iter().map(|r| r.hold_seconds).max().unwrap_or(0);
    longest.div_ceil(BAR_STEP_SECS).max(1) * BAR_STEP_SECS
}

/// Widest bar that still fits `bars` bars (plus one-cell gaps) in `width`
pub fn bar_width(width: u16, bars: usize) -> u16 {
    if bars == 0 {
        return 1;
    }
    let per_bar = width / u16::try_from(bars).unwrap_or(u16::MAX);
    per_bar.saturating_sub(1).clamp(1, 9)
}
