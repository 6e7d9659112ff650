use super::*;
use proptest::prelude::*;

fn scan_with(mz: &[f32], intensity: &[f32]) -> Scan {
    Scan::new(1, 1.0, 0.0, Polarity::Positive).with_peaks(mz.to_vec(), intensity.to_vec())
}

#[test]
fn test_set_peaks_keeps_arrays_aligned_and_sorted() {
    let scan = scan_with(&[300.0, 100.0, 200.0, 400.0], &[3.0, 1.0, -2.0]);
    assert_eq!(scan.mz(), &[100.0, 200.0, 300.0]);
    assert_eq!(scan.intensity(), &[1.0, 0.0, 3.0]);
}

#[test]
fn test_new_clamps_ms_level() {
    assert_eq!(Scan::new(0, 0.0, 0.0, Polarity::Unknown).ms_level, 1);
    assert_eq!(Scan::new(-3, 0.0, 0.0, Polarity::Unknown).ms_level, 1);
    assert_eq!(Scan::new(3, 0.0, 0.0, Polarity::Unknown).ms_level, 3);
}

#[test]
fn test_polarity_tokens() {
    assert_eq!(Polarity::from_token("+"), Polarity::Positive);
    assert_eq!(Polarity::from_token(" -ESI"), Polarity::Negative);
    assert_eq!(Polarity::from_token(""), Polarity::Unknown);
    assert_eq!(Polarity::from_sign(-7), Polarity::Negative);
    assert_eq!(Polarity::Positive.as_sign(), 1);
}

#[test]
fn test_find_highest_intensity_in_window() {
    let scan = scan_with(&[100.0, 100.5, 101.0, 102.0], &[10.0, 40.0, 20.0, 90.0]);
    assert_eq!(scan.find_highest_intensity_in(100.0, 101.0), (100.5, 40.0));
    assert_eq!(scan.find_highest_intensity_in(101.5, 101.9), (0.0, 0.0));
    assert_eq!(scan.base_peak(), (102.0, 90.0));
    assert_eq!(scan.total_intensity(), 160.0);
}

#[test]
fn test_centroid_collapses_profile_peaks() {
    // Two humps separated by a valley at 100.3
    let mut scan = scan_with(
        &[100.0, 100.1, 100.2, 100.3, 100.4, 100.5, 100.6],
        &[10.0, 50.0, 10.0, 5.0, 20.0, 60.0, 20.0],
    );
    scan.centroid();

    assert!(scan.centroided);
    assert_eq!(scan.nobs(), 2);
    assert!((scan.total_intensity() - 175.0).abs() < 1e-3);
    assert!(scan.mz()[0] > 100.0 && scan.mz()[0] < 100.3);
    assert!(scan.mz()[1] > 100.3 && scan.mz()[1] < 100.6);
}

#[test]
fn test_centroid_splits_on_zero_intensity() {
    let mut scan = scan_with(&[100.0, 100.1, 100.2, 100.3, 100.4], &[5.0, 5.0, 0.0, 2.0, 2.0]);
    scan.centroid();
    assert_eq!(scan.nobs(), 2);
    assert!((scan.mz()[0] - 100.05).abs() < 1e-3);
    assert!((scan.mz()[1] - 100.35).abs() < 1e-3);
    assert_eq!(scan.intensity(), &[10.0, 4.0]);
}

#[test]
fn test_centroid_keeps_sparse_points_apart() {
    let mut scan = scan_with(&[100.0, 200.0, 300.0], &[50.0, 150.0, 200.0]);
    scan.centroid();
    assert_eq!(scan.mz(), &[100.0, 200.0, 300.0]);
    assert_eq!(scan.intensity(), &[50.0, 150.0, 200.0]);

    let mut pair = scan_with(&[100.0, 200.0], &[50.0, 80.0]);
    pair.centroid();
    assert_eq!(pair.mz(), &[100.0, 200.0]);
}

#[test]
fn test_centroid_splits_profile_peaks_at_mz_gaps() {
    // Zero points stripped from the profile leave a gap instead of a valley
    let mut scan = scan_with(
        &[100.00, 100.01, 100.02, 150.00, 150.01, 150.02],
        &[10.0, 40.0, 60.0, 70.0, 30.0, 10.0],
    );
    scan.centroid();
    assert_eq!(scan.nobs(), 2);
    assert!(scan.mz()[0] > 100.0 && scan.mz()[0] < 100.02);
    assert!(scan.mz()[1] > 150.0 && scan.mz()[1] < 150.02);
    assert_eq!(scan.intensity(), &[110.0, 110.0]);
}

#[test]
fn test_intensity_filter() {
    let mut scan = scan_with(&[100.0, 200.0, 300.0], &[50.0, 150.0, 200.0]);
    scan.intensity_filter(100.0);
    assert_eq!(scan.mz(), &[200.0, 300.0]);
    assert_eq!(scan.intensity(), &[150.0, 200.0]);
}

#[test]
fn test_quantile_filter_drops_lowest_fraction() {
    let mz: Vec<f32> = (0..10).map(|i| 100.0 + i as f32).collect();
    let intensity: Vec<f32> = (1..=10).map(|i| i as f32).collect();
    let mut scan = scan_with(&mz, &intensity);
    scan.quantile_filter(50);
    assert_eq!(scan.intensity(), &[7.0, 8.0, 9.0, 10.0]);
    assert_eq!(scan.mz().len(), scan.intensity().len());

    let mut untouched = scan_with(&mz, &intensity);
    untouched.quantile_filter(0);
    assert_eq!(untouched.nobs(), 10);
}

proptest! {
    #[test]
    fn centroid_never_grows_and_preserves_intensity(
        intensity in proptest::collection::vec(0.0f32..1.0e5, 0..200),
    ) {
        let mz: Vec<f32> = (0..intensity.len()).map(|i| 100.0 + i as f32 * 0.01).collect();
        let mut scan = scan_with(&mz, &intensity);
        let before_count = scan.nobs();
        let before_total = scan.total_intensity();

        scan.centroid();

        prop_assert!(scan.nobs() <= before_count);
        prop_assert_eq!(scan.mz().len(), scan.intensity().len());
        let tolerance = 1e-3 * before_total.max(1.0);
        prop_assert!((scan.total_intensity() - before_total).abs() <= tolerance);
        prop_assert!(scan.mz().windows(2).all(|w| w[0] <= w[1]));
    }
}
