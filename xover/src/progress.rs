use crossover::{Progress, TileOutput};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Finished tiles and crossings found so far, on stderr.
pub struct TileProgress {
    pb: ProgressBar,

    /// Per tile crossings, before duplicates across tiles are removed.
    crossings: AtomicUsize,
}

impl TileProgress {
    pub fn new(header: &str) -> Self {
        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(4));
        pb.set_prefix(header.to_string());
        pb.set_style(
            ProgressStyle::with_template("{prefix}...\n[{wide_bar:.cyan/blue}] {pos}/{len} tiles, {msg}")
                .expect("incorrect progress bar format string")
                .progress_chars("#>-"),
        );
        Self {
            pb,
            crossings: AtomicUsize::new(0),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl Progress for TileProgress {
    fn start(&self, tiles: usize) {
        self.pb.set_length(tiles as u64);
        self.pb.set_message("0 crossings");
    }

    fn tile_done(&self, output: &TileOutput) {
        let found = output.crossovers.len();
        let total = self.crossings.fetch_add(found, Ordering::Relaxed) + found;
        self.pb.set_message(format!("{total} crossings"));
        self.pb.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::TileProgress;
    use crossover::{Crossover, Progress, Side, TileOutput};
    use geotile::{geo::Coord, Cell, TrackKey};

    #[test]
    fn test_counts_tiles_and_crossings() {
        let side = Side {
            key: TrackKey {
                mission_id: 0,
                track_id: 1,
            },
            value: 0.0,
            time: 0.0,
        };
        let output = |crossovers: usize| TileOutput {
            cell: Cell { row: 0, col: 0 },
            crossovers: vec![
                Crossover {
                    xy: Coord { x: 0.0, y: 0.0 },
                    ascending: side,
                    descending: side,
                };
                crossovers
            ],
            segments: 2,
            dropped_segments: 0,
            degenerate: 0,
            out_of_radius: 0,
            duplicates: 0,
        };

        let progress = TileProgress::new("Finding crossovers");
        progress.start(3);
        progress.tile_done(&output(2));
        progress.tile_done(&output(1));
        assert_eq!(progress.pb.length(), Some(3));
        assert_eq!(progress.pb.position(), 2);
        assert_eq!(progress.pb.message(), "3 crossings");
        progress.finish();
    }
}
