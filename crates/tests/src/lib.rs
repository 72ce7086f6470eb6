//! # Integration Tests
//!
//! Cross-crate flows over real files:
//! - profile -> streaming writer -> load -> read cache
//! - save / load round trips and the load guards
//! - merge and export

#[cfg(test)]
mod fixtures {
    use std::fs::File;
    use std::io::{self, Seek, SeekFrom, Write};
    use std::sync::mpsc;

    use cache::StreamTarget;
    use config_loader::{CaptureProfile, ConfigFormat, ConfigLoader};
    use contracts::{ColorBuffer, DepthBuffer, ImuFrame, Rgb8, Vec3d};
    use rand::Rng;

    /// File target that holds its first write until the gate sender fires
    pub struct GatedFile {
        file: File,
        gate: Option<mpsc::Receiver<()>>,
    }

    impl GatedFile {
        pub fn new(file: File) -> (Self, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            (
                Self {
                    file,
                    gate: Some(rx),
                },
                tx,
            )
        }
    }

    impl Write for GatedFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv();
            }
            self.file.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl Seek for GatedFile {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.file.seek(pos)
        }
    }

    impl StreamTarget for GatedFile {
        fn sync(&self) -> io::Result<()> {
            self.file.sync_all()
        }
    }

    pub const PROFILE: &str = r#"
sensor_name = "StructureSensor"
depth_shift = 1000.0

[color]
width = 16
height = 12
compression = "png"
intrinsics = { fx = 20.0, fy = 20.0, mx = 8.0, my = 6.0 }

[depth]
width = 8
height = 6
compression = "occi"

[cache]
read_capacity = 3
write_capacity = 2
"#;

    pub fn profile() -> CaptureProfile {
        ConfigLoader::load_from_str(PROFILE, ConfigFormat::Toml).unwrap()
    }

    pub fn random_color(rng: &mut impl Rng, pixels: usize) -> ColorBuffer {
        (0..pixels)
            .map(|_| Rgb8::new(rng.random(), rng.random(), rng.random()))
            .collect()
    }

    pub fn random_depth(rng: &mut impl Rng, pixels: usize) -> DepthBuffer {
        (0..pixels)
            .map(|i| {
                if i % 7 == 0 {
                    0
                } else {
                    rng.random_range(300..6000)
                }
            })
            .collect()
    }

    pub fn imu(timestamp: u64) -> ImuFrame {
        ImuFrame {
            acceleration: Vec3d::new(0.0, -9.81, 0.0),
            rotation_rate: Vec3d::new(0.01, 0.02, timestamp as f64 * 1e-6),
            ..ImuFrame::at(timestamp)
        }
    }
}

#[cfg(test)]
mod stream_tests {
    use std::fs::File;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use cache::{ReadCache, StreamingWriter};
    use container::SensorData;
    use contracts::Mat4;

    use crate::fixtures::*;

    /// Capture: profile -> StreamingWriter -> file -> load -> ReadCache
    #[test]
    fn test_capture_stream_and_playback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.sens");
        let profile = profile();
        let template = profile.to_sensor_data().unwrap();
        let format = *template.format().unwrap();

        let mut rng = rand::rng();
        let frames: Vec<_> = (0..12u64)
            .map(|i| {
                let mut pose = Mat4::identity();
                pose[(0, 3)] = i as f32 * 0.1;
                (
                    random_color(&mut rng, format.color_pixels()),
                    random_depth(&mut rng, format.depth_pixels()),
                    pose,
                    i * 33_333,
                    i * 33_333 + 5,
                )
            })
            .collect();

        let mut writer = StreamingWriter::create(
            &template,
            &path,
            profile.cache.write_capacity,
            false,
        )
        .unwrap();
        for (color, depth, pose, ts_c, ts_d) in frames.iter().cloned() {
            writer
                .write_next_and_free(color, depth, pose, ts_c, ts_d)
                .unwrap();
        }
        let summary = writer.close().unwrap();
        assert_eq!(summary.frames, 12);

        let loaded = SensorData::open(&path).unwrap();
        assert_eq!(loaded.header().unwrap(), template.header().unwrap());
        assert_eq!(loaded.num_frames(), 12);

        let mut cache = ReadCache::spawn(&loaded, profile.cache.read_capacity).unwrap();
        let mut seen = 0;
        while let Some(frame) = cache.get_next().unwrap() {
            let (color, depth, pose, ts_c, ts_d) = &frames[frame.index];
            assert_eq!(frame.index, seen);
            assert_eq!(&frame.color, color);
            assert_eq!(&frame.depth, depth);
            assert_eq!(&frame.camera_to_world, pose);
            assert_eq!(frame.timestamp_color, *ts_c);
            assert_eq!(frame.timestamp_depth, *ts_d);
            seen += 1;
        }
        assert_eq!(seen, 12);
    }

    /// Capacity 2 with a stalled worker: the producer parks on the fourth
    /// frame until the worker resumes
    #[test]
    fn test_write_cache_backpressure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bp.sens");
        let template = profile().to_sensor_data().unwrap();
        let format = *template.format().unwrap();
        let (target, resume) = GatedFile::new(File::create(&path).unwrap());
        let mut writer = StreamingWriter::with_target(&template, target, 2).unwrap();
        let returned = AtomicUsize::new(0);

        thread::scope(|s| {
            let producer = s.spawn(|| {
                let mut rng = rand::rng();
                for i in 0..5 {
                    writer
                        .write_next_and_free(
                            random_color(&mut rng, format.color_pixels()),
                            random_depth(&mut rng, format.depth_pixels()),
                            Mat4::identity(),
                            i,
                            i,
                        )
                        .unwrap();
                    returned.fetch_add(1, Ordering::SeqCst);
                }
            });

            let deadline = Instant::now() + Duration::from_secs(5);
            while returned.load(Ordering::SeqCst) < 3 {
                assert!(Instant::now() < deadline, "producer never filled the queue");
                thread::sleep(Duration::from_millis(1));
            }
            thread::sleep(Duration::from_millis(50));
            assert_eq!(returned.load(Ordering::SeqCst), 3);
            assert_eq!(writer.queue_len(), 2);

            resume.send(()).unwrap();
            producer.join().unwrap();
        });
        assert_eq!(returned.load(Ordering::SeqCst), 5);

        assert_eq!(writer.close().unwrap().frames, 5);
        assert_eq!(SensorData::open(&path).unwrap().num_frames(), 5);
    }

    /// Playback can stop early without draining the cache
    #[test]
    fn test_read_cache_early_close() {
        let mut data = profile().to_sensor_data().unwrap();
        let format = *data.format().unwrap();
        let mut rng = rand::rng();
        for _ in 0..30 {
            data.add_frame(
                &random_color(&mut rng, format.color_pixels()),
                &random_depth(&mut rng, format.depth_pixels()),
            )
            .unwrap();
        }

        let mut cache = ReadCache::spawn(&data, 2).unwrap();
        for i in 0..3 {
            assert_eq!(cache.get_next().unwrap().unwrap().index, i);
        }
        cache.close().unwrap();
        assert_eq!(data.num_frames(), 30);
    }
}

#[cfg(test)]
mod container_tests {
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};

    use container::export::{export_images, info_path, ExportOptions};
    use container::import::{import_images, ImportOptions};
    use container::point_cloud::{back_project, save_point_cloud};
    use container::{ContainerHeader, FrameFormat, ImuMerge, SensorData};
    use contracts::{
        unknown_pose, CalibrationData, ColorCompression, ContractError, DepthCompression, Mat4,
        Rgb8,
    };

    use crate::fixtures::*;

    fn populated(frames: usize, imu_start: u64) -> SensorData {
        let mut data = profile().to_sensor_data().unwrap();
        let format = *data.format().unwrap();
        let mut rng = rand::rng();
        for i in 0..frames {
            let pose = if i == 1 { unknown_pose() } else { Mat4::identity() };
            data.add_frame_with(
                &random_color(&mut rng, format.color_pixels()),
                &random_depth(&mut rng, format.depth_pixels()),
                pose,
                imu_start + i as u64 * 10,
                imu_start + i as u64 * 10,
            )
            .unwrap();
        }
        for i in 0..frames as u64 * 2 {
            data.add_imu_frame(imu(imu_start + i * 5)).unwrap();
        }
        data
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rt.sens");
        let data = populated(5, 100);
        data.save_to_file(&path).unwrap();

        let loaded = SensorData::open(&path).unwrap();
        assert_eq!(loaded, data);
        assert!(!loaded.frame(1).unwrap().has_pose());
        assert_eq!(loaded.find_closest_imu_frame(112).unwrap().timestamp, 110);
    }

    /// depth shift 1000, raw depth 1000 everywhere -> 1.0 m after a round trip
    #[test]
    fn test_depth_units() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.sens");
        let mut data = SensorData::new();
        data.init_default(ContainerHeader::new(
            "units",
            FrameFormat::new(ColorCompression::Raw, DepthCompression::Raw, (4, 4), (4, 4)),
            CalibrationData::identity(),
            CalibrationData::identity(),
            1000.0,
        ))
        .unwrap();
        data.add_frame(&[Rgb8::default(); 16], &[1000; 16]).unwrap();
        data.save_to_file(&path).unwrap();

        let loaded = SensorData::open(&path).unwrap();
        let meters = loaded.compute_depth_meters(0).unwrap();
        assert_eq!(meters.len(), 16);
        assert!(meters.iter().all(|&m| m == 1.0));
        for &raw in loaded.decompress_depth(0).unwrap().iter() {
            assert_eq!(loaded.depth_to_meters(raw).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_version_guard_leaves_target_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v3.sens");
        populated(2, 0).save_to_file(&path).unwrap();

        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.write_all(&3u32.to_le_bytes()).unwrap();
        drop(file);

        let mut target = SensorData::new();
        assert!(matches!(
            target.load_from_file(&path),
            Err(ContractError::VersionMismatch {
                found: 3,
                expected: 4
            })
        ));
        assert!(!target.is_configured());
        assert_eq!(target.num_frames(), 0);
    }

    #[test]
    fn test_truncated_file_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("full.sens");
        let data = populated(3, 0);
        data.save_to_file(&full).unwrap();

        let bytes = std::fs::read(&full).unwrap();
        let cut = dir.path().join("cut.sens");
        std::fs::write(&cut, &bytes[..bytes.len() - 200]).unwrap();

        let mut target = SensorData::open(&full).unwrap();
        assert!(matches!(
            target.load_from_file(&cut),
            Err(ContractError::CorruptStream { .. })
        ));
        assert_eq!(target, data);

        assert!(matches!(
            target.load_from_file(&dir.path().join("absent.sens")),
            Err(ContractError::FileNotFound { .. })
        ));
        assert_eq!(target, data);
    }

    #[test]
    fn test_merge_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = populated(3, 0);
        let b = populated(2, 1000);
        let (pa, pb, out) = (
            dir.path().join("a.sens"),
            dir.path().join("b.sens"),
            dir.path().join("ab.sens"),
        );
        a.save_to_file(&pa).unwrap();
        b.save_to_file(&pb).unwrap();

        let mut merged = SensorData::open(&pa).unwrap();
        merged
            .append(&SensorData::open(&pb).unwrap(), ImuMerge::Merge)
            .unwrap();
        merged.save_to_file(&out).unwrap();

        let reloaded = SensorData::open(&out).unwrap();
        assert_eq!(reloaded.num_frames(), 5);
        assert_eq!(&reloaded.frames()[..3], a.frames());
        assert_eq!(&reloaded.frames()[3..], b.frames());
        assert_eq!(reloaded.num_imu_frames(), a.num_imu_frames() + b.num_imu_frames());
        assert!(reloaded
            .imu_frames()
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));

        let mut skipped = SensorData::open(&pa).unwrap();
        skipped.append(&b, ImuMerge::Skip).unwrap();
        assert_eq!(skipped.num_imu_frames(), a.num_imu_frames());
    }

    #[test]
    fn test_merge_incompatible() {
        let mut a = populated(1, 0);
        let mut profile = profile();
        profile.depth.compression = DepthCompression::Zlib;
        let b = profile.to_sensor_data().unwrap();

        assert!(matches!(
            a.append(&b, ImuMerge::Skip),
            Err(ContractError::IncompatibleFormat { .. })
        ));
        assert_eq!(a.num_frames(), 1);
    }

    #[test]
    fn test_nearest_imu() {
        let mut data = profile().to_sensor_data().unwrap();
        for t in [10, 20, 30] {
            data.add_imu_frame(imu(t)).unwrap();
        }
        assert_eq!(data.find_closest_imu_frame(24).unwrap().timestamp, 20);
        assert_eq!(data.find_closest_imu_frame(5).unwrap().timestamp, 10);
        assert_eq!(data.find_closest_imu_frame(35).unwrap().timestamp, 30);
        assert!(matches!(
            data.add_imu_frame(imu(25)),
            Err(ContractError::ImuOutOfOrder { .. })
        ));
    }

    #[test]
    fn test_export_layout() {
        let dir = tempfile::tempdir().unwrap();
        let data = populated(2, 0);
        let summary = export_images(&data, dir.path(), &ExportOptions::default()).unwrap();
        assert!(summary.completed);
        assert_eq!(summary.frames_written, 2);

        assert!(info_path(dir.path()).exists());
        for i in 0..2 {
            assert!(dir.path().join(format!("frame-{i:06}.color.png")).exists());
            assert!(dir.path().join(format!("frame-{i:06}.pose.txt")).exists());
            let pgm = std::fs::read(dir.path().join(format!("frame-{i:06}.depth.pgm"))).unwrap();
            assert!(pgm.starts_with(b"P5\n"));
        }

        let pose = container::pose::load_pose_file(&dir.path().join("frame-000000.pose.txt"))
            .unwrap();
        assert_eq!(pose, Mat4::identity());
    }

    #[test]
    fn test_export_import_point_cloud() {
        let dir = tempfile::tempdir().unwrap();
        let data = populated(3, 0);
        export_images(&data, dir.path(), &ExportOptions::default()).unwrap();

        let options = ImportOptions {
            depth_compression: data.format().unwrap().depth_compression,
            ..ImportOptions::default()
        };
        let imported = import_images(dir.path(), &options).unwrap();
        assert_eq!(imported.num_frames(), 3);
        assert_eq!(imported.num_imu_frames(), 0);
        for i in 0..3 {
            assert_eq!(imported.decompress_color(i).unwrap(), data.decompress_color(i).unwrap());
            assert_eq!(imported.decompress_depth(i).unwrap(), data.decompress_depth(i).unwrap());
        }
        assert!(!imported.frame(1).unwrap().has_pose());

        let ply = dir.path().join("cloud.ply");
        let points = save_point_cloud(&imported, &ply, 0..3).unwrap();
        assert_eq!(points, back_project(&data, 0..3).unwrap().len());
        assert!(std::fs::read(&ply).unwrap().starts_with(b"ply\n"));
    }

    #[test]
    fn test_unconfigured_operations() {
        let mut data = SensorData::new();
        assert!(matches!(
            data.add_frame(&[], &[]),
            Err(ContractError::NotConfigured)
        ));
        assert!(matches!(
            data.add_imu_frame(imu(1)),
            Err(ContractError::NotConfigured)
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            data.save_to_file(&dir.path().join("x.sens")),
            Err(ContractError::NotConfigured)
        ));
    }
}

#[cfg(test)]
mod codec_tests {
    use codec::{occi, Codec};
    use contracts::{ColorCompression, DepthCompression, Rgb8};
    use rand::Rng;

    /// Lossless codecs reproduce arbitrary buffers of the configured size
    #[test]
    fn test_lossless_codecs() {
        let mut rng = rand::rng();
        let (w, h) = (13, 7);
        let color: Vec<Rgb8> = (0..w * h)
            .map(|_| Rgb8::new(rng.random(), rng.random(), rng.random()))
            .collect();
        let depth: Vec<u16> = (0..w * h).map(|_| rng.random()).collect();

        for codec in [ColorCompression::Raw, ColorCompression::Png] {
            let encoded = codec.compress(&color, w as u32, h as u32).unwrap();
            assert_eq!(&*codec.decompress(&encoded, w as u32, h as u32).unwrap(), &color[..]);
        }
        for codec in [DepthCompression::Raw, DepthCompression::Zlib, DepthCompression::Occi] {
            let encoded = codec.compress(&depth, w as u32, h as u32).unwrap();
            assert_eq!(&*codec.decompress(&encoded, w as u32, h as u32).unwrap(), &depth[..]);
        }
    }

    #[test]
    fn test_occi_smooth_depth_compresses() {
        let depth: Vec<u16> = (0..640u16).map(|i| 1000 + i / 8).collect();
        let encoded = occi::encode(&depth);
        assert!(encoded.len() < depth.len() * 2 / 4);
        assert_eq!(occi::decode(&encoded, depth.len()).unwrap(), depth);
    }
}
