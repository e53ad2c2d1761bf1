//! Destination placement with the attendance split.
//!
//! Of `N` records, `floor(p · N)` are pinned to the fixed event location
//! and count as attending. The others are background trips whose
//! destination is sampled inside the destination area. The combined list
//! is shuffled so that row order says nothing about attendance.

use odsynth_boundary_models::AreaPolygon;
use odsynth_trip_models::GeoPoint;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::PlacementError;

/// A destination assigned to one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestinationPoint {
    pub point: GeoPoint,
    /// `true` if the point is the fixed event location.
    pub attends: bool,
}

/// Returns `(attending, background)` counts for `total` records.
///
/// # Errors
///
/// Returns [`PlacementError::InvalidProbability`] unless
/// `0 <= probability <= 1`.
pub fn split_counts(total: usize, probability: f64) -> Result<(usize, usize), PlacementError> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(PlacementError::InvalidProbability(probability));
    }
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let attending = ((total as f64) * probability).floor() as usize;
    let attending = attending.min(total);
    Ok((attending, total - attending))
}

/// Assigns `total` destination points.
///
/// `area` is only consulted when at least one background point is needed,
/// so callers may pass `None` when `probability == 1`.
///
/// # Errors
///
/// Returns [`PlacementError`] if the probability is invalid, the area is
/// missing but needed, or sampling fails.
pub fn assign_destinations<R: Rng + ?Sized>(
    total: usize,
    fixed: GeoPoint,
    area: Option<&AreaPolygon>,
    probability: f64,
    rng: &mut R,
) -> Result<Vec<DestinationPoint>, PlacementError> {
    let (attending, background) = split_counts(total, probability)?;

    let sampled = if background == 0 {
        Vec::new()
    } else {
        let area = area.ok_or(PlacementError::MissingArea { count: background })?;
        let grid = odsynth_sampling::sample(area, background, rng)?;
        odsynth_projection::to_geographic_batch(&grid)?
    };

    let mut points: Vec<DestinationPoint> = sampled
        .into_iter()
        .map(|point| DestinationPoint {
            point,
            attends: false,
        })
        .chain(std::iter::repeat_n(
            DestinationPoint {
                point: fixed,
                attends: true,
            },
            attending,
        ))
        .collect();
    points.shuffle(rng);

    log::info!(
        "Assigned {total} destinations: {attending} at the fixed point, {background} sampled (p = {probability})"
    );

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use odsynth_boundary_models::RawRings;
    use odsynth_sampling::seeded_rng;

    fn area() -> AreaPolygon {
        AreaPolygon::from_rings(RawRings::Ring(vec![
            [953_000.0, 1_951_000.0],
            [955_000.0, 1_951_000.0],
            [955_000.0, 1_953_000.0],
            [953_000.0, 1_953_000.0],
            [953_000.0, 1_951_000.0],
        ]))
        .unwrap()
    }

    const EVENT: GeoPoint = GeoPoint::new(127.0, 37.55);

    fn longest_run(flags: &[bool]) -> usize {
        let mut longest = 0;
        let mut run = 0;
        let mut previous = None;
        for &flag in flags {
            run = if previous == Some(flag) { run + 1 } else { 1 };
            previous = Some(flag);
            longest = longest.max(run);
        }
        longest
    }

    #[test]
    fn splits_exactly_by_floor() {
        assert_eq!(split_counts(100, 0.3).unwrap(), (30, 70));
        assert_eq!(split_counts(7, 0.5).unwrap(), (3, 4));
        assert_eq!(split_counts(0, 0.5).unwrap(), (0, 0));
        assert_eq!(split_counts(10, 1.0).unwrap(), (10, 0));
        assert!(split_counts(10, 1.5).is_err());
        assert!(split_counts(10, -0.1).is_err());
        assert!(split_counts(10, f64::NAN).is_err());
    }

    #[test]
    fn thirty_percent_of_one_hundred_attend() {
        let area = area();
        for seed in [1, 2, 3, 4, 5] {
            let (mut rng, _) = seeded_rng(Some(seed));
            let points = assign_destinations(100, EVENT, Some(&area), 0.3, &mut rng).unwrap();

            assert_eq!(points.len(), 100);
            let attends: Vec<bool> = points.iter().map(|d| d.attends).collect();
            assert_eq!(attends.iter().filter(|a| **a).count(), 30);
            assert!(
                points
                    .iter()
                    .all(|d| d.attends == (d.point == EVENT)),
                "attendance flag must match the fixed point"
            );

            // Unshuffled output would put every fixed point at 70..100.
            #[allow(clippy::cast_precision_loss)]
            let mean_index = attends
                .iter()
                .enumerate()
                .filter(|(_, a)| **a)
                .map(|(i, _)| i as f64)
                .sum::<f64>()
                / 30.0;
            assert!((25.0..=75.0).contains(&mean_index), "seed {seed}: mean {mean_index}");
            assert!(longest_run(&attends) <= 25, "seed {seed}: {attends:?}");
        }
    }

    #[test]
    fn full_attendance_needs_no_area() {
        let (mut rng, _) = seeded_rng(Some(1));
        let points = assign_destinations(12, EVENT, None, 1.0, &mut rng).unwrap();
        assert!(points.iter().all(|d| d.attends && d.point == EVENT));
    }

    #[test]
    fn zero_attendance_samples_everything() {
        let (mut rng, _) = seeded_rng(Some(1));
        let points = assign_destinations(40, EVENT, Some(&area()), 0.0, &mut rng).unwrap();
        assert!(points.iter().all(|d| !d.attends && d.point != EVENT));
    }

    #[test]
    fn background_without_area_is_an_error() {
        let (mut rng, _) = seeded_rng(Some(1));
        assert!(matches!(
            assign_destinations(10, EVENT, None, 0.5, &mut rng),
            Err(PlacementError::MissingArea { count: 5 })
        ));
    }
}
