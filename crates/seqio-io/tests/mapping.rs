//! Time resolution and channel mapping properties.

use seqio_core::{BitDepth, ImageSpec};
use seqio_io::channels::{build_menus, default_mapping, layer_mapping, ChannelSource};
use seqio_io::resolver::{map_time, FrameStatus};
use seqio_io::{BoundaryPolicy, FrameRange, TimeMapping, TimeMode};

#[test]
fn starting_time_hold_clamps_to_last() {
    let mapping = TimeMapping {
        mode: TimeMode::StartingTime,
        starting_time: 1,
        after: BoundaryPolicy::Hold,
        ..Default::default()
    };
    let (frame, status) = map_time(12.0, FrameRange::new(1, 10), &mapping);
    assert_eq!(frame, 10);
    assert_eq!(status, FrameStatus::AfterSequence);
}

#[test]
fn hold_returns_nearest_bound() {
    let mapping = TimeMapping {
        mode: TimeMode::Offset,
        offset: 3,
        ..Default::default()
    };
    let range = FrameRange::new(5, 9);
    for time in [-20.0, 0.0, 7.0] {
        assert_eq!(map_time(time, range, &mapping).0, 5);
    }
    for time in [13.0, 50.0] {
        assert_eq!(map_time(time, range, &mapping).0, 9);
    }
}

#[test]
fn loop_matches_modulo_formula() {
    let offset = 2;
    let mapping = TimeMapping {
        mode: TimeMode::Offset,
        offset,
        before: BoundaryPolicy::Loop,
        after: BoundaryPolicy::Loop,
        ..Default::default()
    };
    let (first, last) = (3, 7);
    let range = FrameRange::new(first, last);
    for time in -30..40 {
        let expected = first + (time - offset - first).rem_euclid(last - first + 1);
        assert_eq!(map_time(time as f64, range, &mapping).0, expected, "time {time}");
    }
}

fn spec(names: &[&str]) -> ImageSpec {
    ImageSpec::new(8, 8, names.iter().map(|s| s.to_string()).collect(), BitDepth::F16)
}

#[test]
fn diffuse_layer_is_not_merged_with_top_level_red() {
    let specs = [spec(&["R", "diffuse.R", "diffuse.G", "diffuse.B", "diffuse.A"])];

    let diffuse = layer_mapping(&specs, "diffuse").unwrap();
    let expected: Vec<ChannelSource> = (1..5)
        .map(|index| ChannelSource::Channel { sub_image: 0, index })
        .collect();
    assert_eq!(diffuse.sources.to_vec(), expected);

    let color = default_mapping(&specs);
    assert_eq!(color.sources[0], ChannelSource::Channel { sub_image: 0, index: 0 });
    for source in &color.sources[1..] {
        assert!(!expected.contains(source), "{source:?} taken from diffuse");
    }

    let menus = build_menus(&specs);
    assert_eq!(menus.custom_layers(), vec!["diffuse"]);
}

#[test]
fn build_menus_is_idempotent() {
    let mut second = spec(&["Z"]);
    second.set_attr(seqio_core::attr::SUBIMAGE_NAME, "depth");
    let specs = [spec(&["B", "G", "R", "A", "spec.R", "spec.G"]), second];

    let a = build_menus(&specs);
    let b = build_menus(&specs);
    assert_eq!(a, b);
    assert_eq!(a.options(), b.options());
    assert!(a.options().iter().any(|o| o == "depth.Z"));
}
