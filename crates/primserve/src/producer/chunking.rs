//! Partitioning of an event's primaries into chunks.
//!
//! Parts are cut from the back of the event: part 1 holds the last
//! `granularity` primaries, part 2 the ones before them, and so on. Only the
//! final part may be shorter than `granularity`. With 1200 primaries and a
//! granularity of 500 the parts are `[700, 1200)`, `[200, 700)` and
//! `[0, 200)`.

use core::ops::Range;

/// Number of parts an event of `total` primaries is split into. Never zero:
/// an empty event is still delivered as one empty part.
pub fn num_parts(total: usize, granularity: usize) -> usize {
    total.div_ceil(granularity.max(1)).max(1)
}

/// Index range of the part following `served` already-served parts.
///
/// Ranges past the front of the event are empty.
pub fn part_range(total: usize, granularity: usize, served: usize) -> Range<usize> {
    let granularity = granularity.max(1);
    let end = total.saturating_sub(served.saturating_mul(granularity));
    let start = total.saturating_sub(served.saturating_add(1).saturating_mul(granularity));
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_from_the_tail() {
        assert_eq!(num_parts(1200, 500), 3);
        assert_eq!(part_range(1200, 500, 0), 700..1200);
        assert_eq!(part_range(1200, 500, 1), 200..700);
        assert_eq!(part_range(1200, 500, 2), 0..200);
    }

    #[test]
    fn small_and_empty_events_are_one_part() {
        assert_eq!(num_parts(0, 500), 1);
        assert_eq!(part_range(0, 500, 0), 0..0);
        assert_eq!(num_parts(30, 500), 1);
        assert_eq!(part_range(30, 500, 0), 0..30);
        assert_eq!(num_parts(500, 500), 1);
        assert_eq!(num_parts(501, 500), 2);
    }

    #[test]
    fn parts_cover_every_primary_exactly_once() {
        for granularity in 1..=17 {
            for total in 0..=120 {
                let parts = num_parts(total, granularity);
                assert_eq!(parts, total.div_ceil(granularity).max(1));

                let mut seen = vec![0_u8; total];
                for served in 0..parts {
                    let range = part_range(total, granularity, served);
                    assert!(range.len() <= granularity);
                    if total > 0 {
                        assert!(!range.is_empty(), "part {served} of {total}/{granularity}");
                    }
                    for i in range {
                        seen[i] += 1;
                    }
                }
                assert!(seen.iter().all(|&n| n == 1), "{total}/{granularity}");
                assert!(part_range(total, granularity, parts).is_empty());
            }
        }
    }

    #[test]
    fn zero_granularity_behaves_like_one() {
        assert_eq!(num_parts(3, 0), 3);
        assert_eq!(part_range(3, 0, 0), 2..3);
    }
}
