use std::fs;
use std::path::Path;

use scanscope_acquire::sim::{FakeClock, SimulatedStage, SyntheticCamera};
use scanscope_acquire::{
    Camera, CameraError, Clock, HardwareControl, HardwareError, Resolution, ScanConfig, ScanError,
    ScanState, Scanner, SessionContext, TileConfiguration,
};
use scanscope_core::{Frame, Objective, Position, ScanRequest, WhiteBalance};
use tiff::decoder::Decoder;
use tiff::tags::Tag;

fn small_config(root: &Path) -> ScanConfig {
    ScanConfig {
        output_root: root.join("ScanOutputs"),
        scan_resolution: Resolution {
            width: 6,
            height: 4,
        },
        ..ScanConfig::default()
    }
}

/// Five positions in one row: x = 30000, 31800, ..., 37200.
fn five_tile_request() -> ScanRequest {
    ScanRequest {
        y_top: 370300,
        y_bottom: 370300,
        x_left: 30000,
        x_right: 37200,
        objective: Objective::X4,
    }
}

fn only_scan_folder(root: &Path) -> std::path::PathBuf {
    let mut dirs: Vec<_> = fs::read_dir(root.join("ScanOutputs"))
        .expect("outputs")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(dirs.len(), 1);
    dirs.remove(0)
}

#[test]
fn failed_capture_leaves_gap_in_manifest() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut stage = SimulatedStage::new(Some(2));
    let clock = FakeClock::new();
    let mut camera = SyntheticCamera::new().fail_reads([3]);

    let mut scanner = Scanner::new(&config, &ctx, &mut stage, &clock);
    let report = scanner
        .run(&five_tile_request(), &mut camera)
        .expect("scan");

    assert_eq!(
        scanner.trail(),
        [
            ScanState::Idle,
            ScanState::Validating,
            ScanState::AcquiringObjective,
            ScanState::Scanning,
            ScanState::Finalizing,
            ScanState::Done,
        ]
    );
    assert_eq!(report.planned, 5);
    assert_eq!(report.skipped, vec![3]);
    assert!(report.unsettled.is_empty());

    let names: Vec<&str> = report.tiles.iter().map(|t| t.filename.as_str()).collect();
    assert_eq!(
        names,
        ["tile_0001.tif", "tile_0002.tif", "tile_0004.tif", "tile_0005.tif"]
    );

    let manifest =
        TileConfiguration::parse(&fs::read_to_string(&report.manifest_path).expect("manifest"))
            .expect("parse");
    assert_eq!(manifest.entries, report.tiles);
    assert_eq!(manifest.entries[2].position, Position::new(35400, 370300));

    assert!(report.folder.join("tile_0004.tif").exists());
    assert!(!report.folder.join("tile_0003.tif").exists());
    assert!(!camera.is_open());
    assert_eq!(camera.times_opened(), 1);

    let log = fs::read_to_string(report.log_path.expect("log path")).expect("log");
    assert!(log.contains("failed to capture image at tile 3"), "{log}");
    assert!(log.contains("Scan complete: 4 of 5 tiles"), "{log}");
}

#[test]
fn hardware_is_configured_and_moves_follow_plan() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut stage = SimulatedStage::new(Some(1));
    let clock = FakeClock::new();
    let mut camera = SyntheticCamera::new();
    let request = ScanRequest {
        y_top: 370300,
        y_bottom: 369300,
        x_left: 30000,
        x_right: 31800,
        objective: Objective::X4,
    };

    Scanner::new(&config, &ctx, &mut stage, &clock)
        .run(&request, &mut camera)
        .expect("scan");

    assert_eq!(stage.property("OlympusHub", "Control"), Some("Manual + Computer"));
    assert_eq!(stage.property("Objective", "Label"), Some("Position-1"));
    assert_eq!(
        stage.moves(),
        &[
            (30000.0, 370300.0),
            (31800.0, 370300.0),
            (31800.0, 369300.0),
            (30000.0, 369300.0),
        ]
    );
    // 4 moves x 1 poll interval + the first-move grace period.
    assert_eq!(clock.now(), std::time::Duration::from_millis(2400));
}

#[test]
fn boundary_violation_creates_no_folder() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut stage = SimulatedStage::new(Some(0));
    let clock = FakeClock::new();
    let mut camera = SyntheticCamera::new();
    let request = ScanRequest {
        x_right: config.hard_boundary().x().max + 10,
        ..five_tile_request()
    };

    let mut scanner = Scanner::new(&config, &ctx, &mut stage, &clock);
    let err = scanner.run(&request, &mut camera).unwrap_err();
    assert!(matches!(err, ScanError::Boundary(_)));
    assert_eq!(
        scanner.trail(),
        [ScanState::Idle, ScanState::Validating, ScanState::Aborted]
    );
    assert!(!config.output_root.exists());
    assert!(stage.moves().is_empty());
    assert_eq!(camera.times_opened(), 0);
}

#[test]
fn objective_failure_aborts_before_motion() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut stage = SimulatedStage::new(Some(0)).reject_device("Objective");
    let clock = FakeClock::new();
    let mut camera = SyntheticCamera::new();

    let mut scanner = Scanner::new(&config, &ctx, &mut stage, &clock);
    let err = scanner.run(&five_tile_request(), &mut camera).unwrap_err();
    assert!(matches!(
        err,
        ScanError::ObjectiveSwitch {
            objective: Objective::X4,
            ..
        }
    ));
    assert!(err.is_setup());
    assert_eq!(scanner.state(), ScanState::Aborted);
    assert!(!config.output_root.exists());
    assert!(stage.moves().is_empty());
    assert_eq!(camera.times_opened(), 0);
}

#[test]
fn control_mode_failure_aborts_before_turret() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut stage = SimulatedStage::new(Some(0)).reject_device("OlympusHub");
    let clock = FakeClock::new();
    let mut camera = SyntheticCamera::new();

    let err = Scanner::new(&config, &ctx, &mut stage, &clock)
        .run(&five_tile_request(), &mut camera)
        .unwrap_err();
    assert!(matches!(err, ScanError::HardwareMode(_)));
    assert_eq!(stage.property("Objective", "Label"), None);
    assert!(!config.output_root.exists());
}

#[test]
fn stop_request_finalizes_partial_manifest() {
    struct StopAfter<'a> {
        inner: SyntheticCamera,
        ctx: &'a SessionContext,
        after: usize,
    }
    impl Camera for StopAfter<'_> {
        fn open(&mut self, resolution: Resolution) -> Result<(), CameraError> {
            self.inner.open(resolution)
        }
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            let frame = self.inner.read_frame();
            if self.inner.reads() == self.after {
                self.ctx.request_stop();
            }
            frame
        }
        fn release(&mut self) {
            self.inner.release();
        }
    }

    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut stage = SimulatedStage::new(Some(0));
    let clock = FakeClock::new();
    let mut camera = StopAfter {
        inner: SyntheticCamera::new(),
        ctx: &ctx,
        after: 2,
    };

    let mut scanner = Scanner::new(&config, &ctx, &mut stage, &clock);
    let err = scanner.run(&five_tile_request(), &mut camera).unwrap_err();
    assert!(matches!(
        err,
        ScanError::Cancelled {
            completed: 2,
            planned: 5
        }
    ));
    assert_eq!(scanner.state(), ScanState::Aborted);
    assert!(!camera.inner.is_open());

    let folder = only_scan_folder(root.path());
    let manifest_path = fs::read_dir(&folder)
        .expect("folder")
        .map(|e| e.expect("entry").path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("TileConfiguration_"))
        })
        .expect("manifest written");
    let manifest =
        TileConfiguration::parse(&fs::read_to_string(manifest_path).expect("read")).expect("parse");
    assert_eq!(manifest.entries.len(), 2);
}

#[test]
fn tiles_carry_metadata_and_white_balance() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut wb = WhiteBalance::default();
    wb.set_reference([1.0, 1.0, 1.0], 1.0);
    ctx.set_white_balance(wb);
    let mut stage = SimulatedStage::new(Some(0));
    let clock = FakeClock::new();
    let mut camera = SyntheticCamera::new();
    let request = ScanRequest {
        x_right: 30000,
        ..five_tile_request()
    };

    let report = Scanner::new(&config, &ctx, &mut stage, &clock)
        .run(&request, &mut camera)
        .expect("scan");
    assert_eq!(report.tiles.len(), 1);

    let path = report.folder.join("tile_0001.tif");
    let mut decoder = Decoder::new(fs::File::open(&path).expect("open")).expect("decoder");
    let description = decoder
        .get_tag_ascii_string(Tag::ImageDescription)
        .expect("description");
    assert!(description.contains("TileX=30000"), "{description}");
    assert!(description.contains("TileY=370300"), "{description}");
    assert!(description.contains("SizeX=6\nSizeY=4"), "{description}");
    assert!(description.contains("Objective=4x"), "{description}");
    assert!(description.contains("GainFactor=1"), "{description}");

    let img = image::open(&path).expect("decode tiff").to_rgb8();
    assert_eq!(img.dimensions(), (6, 4));
    assert!(img.as_raw().iter().all(|&v| v == 0 || v == 255));
}

#[test]
fn folder_name_includes_objective() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut stage = SimulatedStage::new(Some(0));
    let clock = FakeClock::new();
    let mut camera = SyntheticCamera::new();
    let request = ScanRequest {
        y_top: 370000,
        y_bottom: 370000,
        x_left: 40000,
        x_right: 40000,
        objective: Objective::X20,
    };

    Scanner::new(&config, &ctx, &mut stage, &clock)
        .run(&request, &mut camera)
        .expect("scan");
    let folder = only_scan_folder(root.path());
    let name = folder.file_name().and_then(|n| n.to_str()).expect("name");
    assert!(name.starts_with("Scan_") && name.ends_with("_20x"), "{name}");
    assert_eq!(stage.property("Objective", "Label"), Some("Position-2"));
}

/// Stage whose controller drops the connection on a given move.
struct DropsOnMove {
    inner: SimulatedStage,
    fail_on: usize,
    moves: usize,
}

impl HardwareControl for DropsOnMove {
    fn set_property(
        &mut self,
        device: &str,
        property: &str,
        value: &str,
    ) -> Result<(), HardwareError> {
        self.inner.set_property(device, property, value)
    }

    fn wait_for_device(&mut self, device: &str) -> Result<(), HardwareError> {
        self.inner.wait_for_device(device)
    }

    fn set_xy_position(&mut self, x: f64, y: f64) -> Result<(), HardwareError> {
        self.moves += 1;
        if self.moves == self.fail_on {
            return Err(HardwareError::Stage("controller connection lost".to_owned()));
        }
        self.inner.set_xy_position(x, y)
    }

    fn get_x_position(&mut self) -> Result<f64, HardwareError> {
        self.inner.get_x_position()
    }

    fn get_y_position(&mut self) -> Result<f64, HardwareError> {
        self.inner.get_y_position()
    }
}

#[test]
fn stage_failure_mid_scan_finalizes_session() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = small_config(root.path());
    let ctx = SessionContext::new();
    let mut stage = DropsOnMove {
        inner: SimulatedStage::new(Some(0)),
        fail_on: 3,
        moves: 0,
    };
    let clock = FakeClock::new();
    let mut camera = SyntheticCamera::new();

    let mut scanner = Scanner::new(&config, &ctx, &mut stage, &clock);
    let err = scanner.run(&five_tile_request(), &mut camera).unwrap_err();
    assert!(matches!(
        err,
        ScanError::Hardware {
            index: 3,
            position: Position { x: 33600, y: 370300 },
            source: HardwareError::Stage(_),
        }
    ));
    assert!(!err.is_setup());
    assert_eq!(
        scanner.trail(),
        [
            ScanState::Idle,
            ScanState::Validating,
            ScanState::AcquiringObjective,
            ScanState::Scanning,
            ScanState::Aborted,
        ]
    );
    assert!(!camera.is_open());

    let folder = only_scan_folder(root.path());
    let manifest_path = fs::read_dir(&folder)
        .expect("folder")
        .map(|e| e.expect("entry").path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("TileConfiguration_"))
        })
        .expect("manifest written");
    let manifest =
        TileConfiguration::parse(&fs::read_to_string(manifest_path).expect("read")).expect("parse");
    let entries: Vec<(&str, Position)> = manifest
        .entries
        .iter()
        .map(|e| (e.filename.as_str(), e.position))
        .collect();
    assert_eq!(
        entries,
        [
            ("tile_0001.tif", Position { x: 30000, y: 370300 }),
            ("tile_0002.tif", Position { x: 31800, y: 370300 }),
        ]
    );
    assert_eq!(stage.inner.moves().len(), 2);
    assert!(!folder.join("tile_0003.tif").exists());
}
