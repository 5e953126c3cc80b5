pub struct ProgressStyle(indicatif::ProgressStyle);

impl Default for ProgressStyle {
    fn default() -> Self {
        let style = indicatif::ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap();
        let style = style.with_key(
            "eta",
            |state: &indicatif::ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
            },
        );
        let style = style.progress_chars("#-");
        Self(style)
    }
}

impl From<ProgressStyle> for indicatif::ProgressStyle {
    fn from(val: ProgressStyle) -> Self {
        val.0
    }
}

/// A progress bar for `len` steps, hidden if `enabled` is false.
pub fn bar(len: usize, enabled: bool) -> indicatif::ProgressBar {
    if !enabled {
        return indicatif::ProgressBar::hidden();
    }
    let bar = indicatif::ProgressBar::new(len as u64);
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar.set_style(ProgressStyle::default().into());
    bar
}
