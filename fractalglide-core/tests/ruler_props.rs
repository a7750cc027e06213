//! Property tests for the ruler invariants.

use fractalglide_core::{Ruler, STALE};
use proptest::prelude::*;

fn exact_ruler(start: f64, end: f64, len: usize) -> Ruler {
    let mut ruler = Ruler::new(len);
    ruler.seed_linear(start, end);
    ruler
}

proptest! {
    /// Rebuilt coordinates are strictly monotonic and errors are
    /// non-negative, for any sane axis pair.
    #[test]
    fn rebuild_is_monotonic_with_nonnegative_errors(
        old_start in -10.0f64..10.0,
        old_span in 0.001f64..20.0,
        old_len in 2usize..200,
        new_start in -10.0f64..10.0,
        new_span in 0.001f64..20.0,
        new_len in 2usize..200,
    ) {
        let old = exact_ruler(old_start, old_start + old_span, old_len);
        let mut new = Ruler::new(new_len);
        new.rebuild(new_start, new_start + new_span, &old);

        for w in new.coord.windows(2) {
            prop_assert!(w[0] < w[1]);
        }
        for &e in &new.error {
            prop_assert!(e >= 0.0);
        }
        for &f in &new.from {
            prop_assert!(f >= 0 && (f as usize) < old_len);
        }
    }

    /// Rebuilding over the identical range reproduces every stop
    /// exactly and reports a full exact count.
    #[test]
    fn rebuild_identical_range_is_fully_exact(
        start in -10.0f64..10.0,
        span in 0.001f64..20.0,
        len in 2usize..300,
    ) {
        let old = exact_ruler(start, start + span, len);
        let mut new = Ruler::new(len);
        let exact = new.rebuild(start, start + span, &old);

        prop_assert_eq!(exact, len as u32);
        for &e in &new.error {
            prop_assert_eq!(e, 0.0);
        }
    }

    /// The chosen sample really is the nearest: no other old sample is
    /// strictly closer than the recorded error.
    #[test]
    fn rebuild_picks_a_nearest_sample(
        old_start in -5.0f64..5.0,
        old_span in 0.01f64..10.0,
        old_len in 2usize..64,
        new_start in -5.0f64..5.0,
        new_span in 0.01f64..10.0,
        new_len in 2usize..64,
    ) {
        let old = exact_ruler(old_start, old_start + old_span, old_len);
        let mut new = Ruler::new(new_len);
        new.rebuild(new_start, new_start + new_span, &old);

        for i in 0..new_len {
            let best = old
                .nearest
                .iter()
                .map(|&n| (new.coord[i] - n).abs())
                .fold(f64::INFINITY, f64::min);
            prop_assert_eq!(new.error[i], best);
        }
    }

    /// After duplicate marking, every run of stops sharing a source
    /// keeps exactly one survivor, and it carries the smallest error of
    /// the run.
    #[test]
    fn duplicate_marking_keeps_one_minimal_survivor(
        old_len in 2usize..32,
        new_len in 2usize..256,
        new_start in -3.0f64..3.0,
        new_span in 0.001f64..2.0,
    ) {
        let old = exact_ruler(-2.0, 2.0, old_len);
        let mut new = Ruler::new(new_len);
        new.rebuild(new_start, new_start + new_span, &old);

        let sources = new.from.clone();
        let errors = new.error.clone();
        new.mark_duplicates();

        let mut i = 0;
        while i < new_len {
            // maximal run of the pre-marking source value
            let mut j = i;
            while j < new_len && sources[j] == sources[i] {
                j += 1;
            }

            let survivors: Vec<usize> =
                (i..j).filter(|&k| new.from[k] != STALE).collect();
            prop_assert_eq!(survivors.len(), 1);

            let kept = survivors[0];
            prop_assert_eq!(new.from[kept], sources[kept]);
            let run_min = errors[i..j].iter().cloned().fold(f64::INFINITY, f64::min);
            prop_assert_eq!(errors[kept], run_min);

            i = j;
        }
    }
}
