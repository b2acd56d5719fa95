#[allow(dead_code)]
mod common;

use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Duration;

use ndarray::Array2;
use tempfile::tempdir;

use lightcurve_core::pipeline::config::PipelineConfig;
use lightcurve_core::pipeline::{run_batches, NoOpReporter};

use common::SynthStar;

// Two-gain frames of 2 * 192 * 192 samples take the parallel unpack path.
const SIZE: (usize, usize) = (192, 192);

fn write_batch(dir: &Path, count: usize) {
    let low = Array2::<u16>::zeros(SIZE);
    let bias = Array2::from_elem(SIZE, 40u16);
    for i in 0..3 {
        let bytes = common::build_rcd(&low, &bias, &common::rcd_timestamp(i));
        common::write_file(&dir.join("Bias"), &format!("bias_{i:03}.rcd"), &bytes);
    }

    let stars = [
        SynthStar::new(60.4, 70.2, 30000.0),
        SynthStar::new(130.7, 121.1, 40000.0),
    ];
    for i in 0..count {
        let field = common::star_field(SIZE.0, SIZE.1, 100.0, 3.0, &stars, 900 + i as u64);
        let high = common::to_u12(&field.mapv(|v| v + 40.0));
        let bytes = common::build_rcd(&low, &high, &common::rcd_timestamp(i));
        common::write_file(dir, &format!("field1_{i:06}.rcd"), &bytes);
    }
}

// ---------------------------------------------------------------------------
// Single-worker global pool
// ---------------------------------------------------------------------------

#[test]
fn test_batches_finish_on_single_worker_pool() {
    rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build_global()
        .unwrap();

    let root = tempdir().unwrap();
    let batches = vec![
        root.path().join("20220618_12.34.56.789"),
        root.path().join("20220618_12.35.56.789"),
    ];
    for dir in &batches {
        write_batch(dir, 14);
    }

    let mut config = PipelineConfig::default();
    config.source.width = SIZE.1;
    config.source.height = SIZE.0;
    config.detection.min_stars = 2;
    let output = root.path().join("out");

    let (tx, rx) = channel();
    let worker = {
        let batches = batches.clone();
        std::thread::spawn(move || {
            let reports = run_batches(&batches, &config, &output, &NoOpReporter);
            let _ = tx.send(reports);
        })
    };

    let reports = rx
        .recv_timeout(Duration::from_secs(120))
        .expect("batches did not finish on a one-thread pool");
    worker.join().unwrap();

    assert_eq!(reports.len(), 2);
    for report in &reports {
        let result = report.outcome.as_ref().unwrap();
        assert_eq!(result.frame_count(), 14);
        assert_eq!(result.star_count(), 2);
    }
}
