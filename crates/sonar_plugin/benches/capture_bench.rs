//! Full capture benchmarks on an analytic scene: seafloor, a rock and a wall.
//!
//! Cells are loaded by a warm-up capture so the timings cover leaf
//! collection and image formation, not octree construction.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{DQuat, DVec3};
use sonar_plugin::{
  DAabb3, EnvironmentIndex, Geometry, IndexBuilder, MaterialTable, OctreeConfig, SceneOracle, SceneShape,
  SensorPose, Sonar, SonarKind,
};

fn scene() -> SceneOracle {
  SceneOracle::new()
    .with_shape(SceneShape::new(Geometry::floor(-2.03), "sand"))
    .with_shape(SceneShape::new(
      Geometry::Sphere {
        center: DVec3::new(5.0, 1.0, -1.5),
        radius: 1.2,
      },
      "rock",
    ))
    .with_shape(SceneShape::new(
      Geometry::Aabb {
        min: DVec3::new(8.02, -6.0, -2.5),
        max: DVec3::new(9.0, 6.0, 1.0),
      },
      "rock",
    ))
}

fn index() -> EnvironmentIndex {
  let config = OctreeConfig::new(
    0.1,
    1.6,
    DAabb3::from_center_half_extents(DVec3::new(4.8, 0.0, 0.0), DVec3::splat(6.4)),
  );
  let materials = MaterialTable::new()
    .with_material("rock", 2600.0, 4000.0)
    .with_material("sand", 1900.0, 1650.0);
  IndexBuilder::new(config, scene(), materials)
    .build()
    .expect("scene builds")
}

/// Looking forward and slightly down.
fn pose() -> SensorPose {
  SensorPose::new(DVec3::ZERO, DQuat::from_rotation_y(10f64.to_radians()))
}

fn bench_capture(c: &mut Criterion) {
  let mut group = c.benchmark_group("capture");
  group.sample_size(20);

  let cases = [
    (SonarKind::Imaging, r#"{"RangeMax": 10, "RangeBins": 256, "AzimuthBins": 256}"#),
    (
      SonarKind::Imaging,
      r#"{"RangeMax": 10, "RangeBins": 256, "AzimuthBins": 256, "MultiPath": true, "Seed": 1}"#,
    ),
    (SonarKind::Profiling, r#"{"RangeMax": 10}"#),
    (SonarKind::Sidescan, r#"{"RangeMax": 10}"#),
    (SonarKind::Singlebeam, r#"{"RangeMax": 10}"#),
  ];

  for (i, (kind, json)) in cases.into_iter().enumerate() {
    let mut index = index();
    let mut sonar = Sonar::new(kind, json, index.config()).expect("valid settings");
    let pose = pose();
    sonar.capture(&mut index, &pose);

    let label = if sonar.config().multipath.is_some() {
      format!("{kind:?}+multipath")
    } else {
      format!("{kind:?}")
    };
    group.bench_with_input(BenchmarkId::new(label, i), &pose, |b, pose| {
      b.iter(|| black_box(sonar.capture(&mut index, pose).len()))
    });
  }
  group.finish();
}

criterion_group!(benches, bench_capture);
criterion_main!(benches);
