use super::*;

fn ms1(rt: f32, mz: Vec<f32>, intensity: Vec<f32>) -> Scan {
    Scan::new(1, rt, 0.0, Polarity::Positive).with_peaks(mz, intensity)
}

fn srm(rt: f32, precursor: f32, product: f32, id: &str, intensity: f32) -> Scan {
    let mut scan = Scan::new(2, rt, precursor, Polarity::Positive)
        .with_peaks(vec![product - 0.2, product], vec![intensity / 10.0, intensity]);
    scan.product_mz = product;
    scan.collision_energy = 25.0;
    scan.filter_line = id.to_string();
    scan
}

fn ms1_sample() -> Sample {
    Sample::from_scans(
        "ms1.mzML",
        vec![
            ms1(1.0, vec![100.0, 100.002, 200.0], vec![10.0, 40.0, 5.0]),
            ms1(2.0, vec![99.999, 150.0, 200.0], vec![20.0, 7.0, 10.0]),
            ms1(3.0, vec![150.0, 200.0], vec![8.0, 15.0]),
            ms1(4.0, vec![100.001, 200.0], vec![30.0, 20.0]),
        ],
    )
}

fn srm_sample() -> Sample {
    Sample::from_scans(
        "srm.mzML",
        vec![
            srm(0.5, 300.0, 150.0, "SRM SIC 300,150", 100.0),
            srm(0.6, 320.0, 160.0, "SRM SIC 320,160", 10.0),
            ms1(0.7, vec![300.0], vec![1.0]),
            srm(0.8, 300.05, 150.3, "SRM SIC 300,150", 200.0),
            srm(0.9, 320.0, 160.0, "SRM SIC 320,160", 20.0),
            srm(1.1, 300.0, 150.0, "SRM SIC 300,150", 150.0),
        ],
    )
}

#[test]
fn test_range_eic() {
    let sample = ms1_sample();
    let eic = sample.eic(99.99, 100.01, 0.0, 10.0, 1);

    assert_eq!(eic.len(), 4);
    assert_eq!(eic.scan_indices(), &[0, 1, 2, 3]);
    assert_eq!(eic.rts(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(eic.mzs(), &[100.002, 99.999, 0.0, 100.001]);
    assert_eq!(eic.intensities(), &[40.0, 20.0, 0.0, 30.0]);
    assert_eq!(eic.total_intensity(), 90.0);
    assert_eq!(eic.max_intensity(), 40.0);
    assert_eq!(eic.rt_range(), (1.0, 4.0));
    assert_eq!(eic.mz_window(), (99.999, 100.01));
    assert!(std::ptr::eq(eic.sample(), &sample));
}

#[test]
fn test_range_eic_respects_rt_window_and_level() {
    let sample = ms1_sample();
    let eic = sample.eic(199.0, 201.0, 1.5, 3.5, 1);
    assert_eq!(eic.rts(), &[2.0, 3.0]);
    assert_eq!(eic.intensities(), &[10.0, 15.0]);

    assert!(sample.eic(199.0, 201.0, 0.0, 10.0, 2).is_empty());
}

#[test]
fn test_range_eic_is_idempotent() {
    let sample = ms1_sample();
    let a = sample.eic(99.0, 201.0, 0.0, 10.0, 1);
    let b = sample.eic(99.0, 201.0, 0.0, 10.0, 1);
    assert_eq!(a.points().collect::<Vec<_>>(), b.points().collect::<Vec<_>>());
    assert_eq!(a.total_intensity().to_bits(), b.total_intensity().to_bits());
}

#[test]
fn test_inverted_window_gives_empty_trace() {
    let sample = ms1_sample();
    let eic = sample.eic(300.0, 250.0, 0.0, 10.0, 1);
    assert!(eic.is_empty());
    assert!(eic.mzs().is_empty());
    assert!(eic.intensities().is_empty());
    assert_eq!(eic.total_intensity(), 0.0);

    // Above the sample's m/z range: clamping inverts the window
    let eic = sample.eic(500.0, 600.0, 0.0, 10.0, 1);
    assert!(eic.is_empty());
}

#[test]
fn test_empty_sample_gives_empty_trace() {
    let sample = Sample::from_scans("empty.mzML", Vec::new());
    let eic = sample.eic(100.0, 200.0, 0.0, 10.0, 1);
    assert!(eic.is_empty());
    assert_eq!(eic.total_intensity(), 0.0);
    assert_eq!(eic.rt_range(), (0.0, 0.0));
    assert!(sample.tic(0.0, 10.0, 1).is_empty());
    assert!(sample.srm_eic_by_id("x").is_empty());
}

#[test]
fn test_normalization_scales_trace() {
    let mut sample = ms1_sample();
    sample.normalization = 2.0;
    let eic = sample.eic(199.0, 201.0, 0.0, 10.0, 1);
    assert_eq!(eic.intensities(), &[10.0, 20.0, 30.0, 40.0]);
    assert_eq!(eic.total_intensity(), 100.0);
    assert_eq!(eic.max_intensity(), 40.0);
}

#[test]
fn test_srm_eic_by_id() {
    let sample = srm_sample();
    let eic = sample.srm_eic_by_id("SRM SIC 300,150");

    assert_eq!(eic.len(), 3);
    assert_eq!(eic.rts(), &[0.5, 0.8, 1.1]);
    assert_eq!(eic.intensities(), &[100.0, 200.0, 150.0]);
    assert_eq!(eic.mzs(), &[150.0, 150.3, 150.0]);
    assert_eq!(eic.mz_window(), (0.0, 0.0));
}

#[test]
fn test_srm_eic_by_transition() {
    let sample = srm_sample();

    let eic = sample.srm_eic(&SrmQuery::new(300.0, 99.0, 150.0));
    assert_eq!(eic.rts(), &[0.5, 0.8, 1.1]);

    let tight = sample.srm_eic(&SrmQuery::new(300.0, 0.0, 150.0).with_tolerances(0.01, 0.1));
    assert_eq!(tight.rts(), &[0.5, 1.1]);

    let any_product = sample.srm_eic(&SrmQuery::new(320.0, 0.0, 0.0));
    assert_eq!(any_product.rts(), &[0.6, 0.9]);
}

#[test]
fn test_tic() {
    let sample = ms1_sample();
    let tic = sample.tic(0.0, 10.0, 1);
    assert_eq!(tic.intensities(), &[55.0, 37.0, 23.0, 50.0]);
    assert!(tic.mzs().iter().all(|&mz| mz == 0.0));
    assert_eq!(tic.total_intensity(), 165.0);

    let window = sample.tic(1.5, 3.0, 1);
    assert_eq!(window.rts(), &[2.0, 3.0]);
}

#[test]
fn test_average_scan() {
    let sample = Sample::from_scans(
        "avg.mzML",
        vec![
            ms1(1.0, vec![100.0, 200.0], vec![10.0, 4.0]),
            ms1(2.0, vec![100.2, 200.0], vec![30.0, 6.0]),
            Scan::new(1, 2.5, 0.0, Polarity::Negative).with_peaks(vec![100.0], vec![1000.0]),
            ms1(5.0, vec![100.0], vec![1000.0]),
        ],
    );

    let avg = sample.average_scan(0.0, 3.0, 1, Polarity::Positive, 1.0);
    assert_eq!(avg.rt, 1.5);
    assert_eq!(avg.ms_level, 1);
    assert_eq!(avg.polarity, Polarity::Positive);
    assert_eq!(avg.nobs(), 2);
    assert!((avg.mz()[0] - 100.15).abs() < 1e-4);
    assert_eq!(avg.intensity(), &[20.0, 5.0]);
    assert_eq!(avg.mz()[1], 200.0);

    let fine = sample.average_scan(0.0, 3.0, 1, Polarity::Positive, 10.0);
    assert_eq!(fine.nobs(), 3);

    assert!(sample
        .average_scan(0.0, 3.0, 1, Polarity::Positive, 0.0)
        .is_empty());
}

#[test]
fn test_correlation() {
    let sample = Sample::from_scans(
        "corr.mzML",
        vec![
            ms1(1.0, vec![100.0, 200.0, 300.0], vec![1.0, 2.0, 9.0]),
            ms1(2.0, vec![100.0, 200.0, 300.0], vec![2.0, 4.0, 1.0]),
            ms1(3.0, vec![100.0, 200.0, 300.0], vec![3.0, 6.0, 5.0]),
        ],
    );
    assert!((sample.correlation(100.0, 200.0, 10.0, 0.0, 10.0) - 1.0).abs() < 1e-5);
    assert!(sample.correlation(100.0, 300.0, 10.0, 0.0, 10.0) < 0.5);
    assert_eq!(sample.correlation(100.0, 200.0, 10.0, 2.5, 10.0), 0.0);
}

#[test]
fn test_intensity_distribution() {
    let sample = srm_sample();
    let dist = sample.intensity_distribution(1);
    assert_eq!(dist.len(), 101);
    assert!(dist.iter().all(|&v| v == 1.0));

    let ms2 = sample.intensity_distribution(2);
    assert_eq!(ms2[0], 1.0);
    assert_eq!(ms2[100], 200.0);
}
