use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar over the molecules of a batch. Safe to share across rayon workers.
#[derive(Clone)]
pub struct BatchProgress {
    pb: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: u64, quiet: bool) -> Self {
        let pb = ProgressBar::new(total).with_style(Self::bar_style());
        if quiet {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            pb.set_draw_target(ProgressDrawTarget::stderr());
        }
        pb.set_message("Preparing");
        Self { pb }
    }

    pub fn inc(&self) {
        self.pb.inc(1);
    }

    /// Prints a line above the bar without breaking it.
    pub fn println(&self, msg: impl AsRef<str>) {
        self.pb.println(format!("  {}", msg.as_ref()));
    }

    pub fn finish(&self, ok: usize, failed: usize) {
        self.pb
            .finish_with_message(format!("✓ {ok} prepared, {failed} failed"));
    }

    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn counts_increments_from_many_threads() {
        let progress = BatchProgress::new(100, true);
        (0..100).into_par_iter().for_each(|_| progress.inc());
        assert_eq!(progress.position(), 100);
        progress.finish(100, 0);
    }
}
