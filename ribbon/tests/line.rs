// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests of [`Line`] against the recording device.

use ribbon::glam::{Mat4, Vec3, Vec4};
use ribbon::peniko::Color;
use ribbon::recording::{Command, RecordedDraw};
use ribbon::ribbon_encoding::buffer::map_element;
use ribbon::ribbon_encoding::opaque;
use ribbon::shader::{VertexInput, vertex};
use ribbon::{
    BufferUsage, ElementType, Error, Line, LineConfig, PointOverrides, Points, Recording, Stream,
    Style, Transforms, VertexFormat, Viewport,
};

fn polyline(points: &[f32]) -> Points {
    Points::Polyline(points.to_vec())
}

fn line_with(config: LineConfig) -> Line<Recording> {
    Line::new(Recording::new(), config).unwrap()
}

fn line(points: &[f32]) -> Line<Recording> {
    line_with(LineConfig {
        points: polyline(points),
        ..Default::default()
    })
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes(b.try_into().unwrap()))
        .collect()
}

fn draws(line: &Line<Recording>) -> Vec<RecordedDraw> {
    line.device().draws().cloned().collect()
}

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-5,
        "expected {expected}, got {actual}"
    );
}

const THREE_POINTS: [f32; 9] = [0., 0., 0., 1., 0., 0., 2., 0., 0.];

#[test]
fn nothing_is_drawn_without_two_points() {
    let mut line = line_with(LineConfig::default());
    assert!(!line.draw(Transforms::default()).unwrap());

    line.set_points(polyline(&[1., 2., 3.]), PointOverrides::default())
        .unwrap();
    assert!(!line.draw(Transforms::default()).unwrap());
    assert_eq!(line.device().draws().count(), 0);
    assert_eq!(line.device().live_buffers(), 5);
}

#[test]
fn one_draw_call_with_offset_views() {
    let mut line = line(&THREE_POINTS);
    assert!(line.draw(Transforms::default()).unwrap());

    let draws = draws(&line);
    assert_eq!(draws.len(), 1);
    let draw = &draws[0];
    let points = line.buffers().points;
    assert_eq!(draw.positions.map(|v| (v.buffer, v.offset)), [
        (points, 0),
        (points, 24),
        (points, 48)
    ]);
    assert!(
        draw.positions
            .iter()
            .all(|v| v.format == VertexFormat::Float32x3)
    );
    for view in [draw.opacity, draw.offset_scale, draw.color_index] {
        assert_eq!(view.offset, 8);
        assert_eq!(view.format, VertexFormat::Float32);
    }
    assert_eq!(draw.opacity.buffer, line.buffers().opacities);
    assert_eq!(draw.offset_scale.buffer, line.buffers().widths);
    assert_eq!(draw.color_index.buffer, line.buffers().color_indices);
    assert_eq!(draw.indices, line.buffers().indices);
    assert_eq!(draw.index_count, 6 * (3 - 1));
    assert!(draw.state.depth_test);
}

#[test]
fn uploads_cover_the_padded_streams() {
    let line = line(&THREE_POINTS);
    let device = line.device();
    let buffers = line.buffers();
    // Three points and two sentinels, each twice.
    assert_eq!(device.buffer(buffers.points).unwrap().len(), 2 * 5 * 3 * 4);
    assert_eq!(device.buffer(buffers.color_indices).unwrap().len(), 2 * 5 * 4);
    assert_eq!(device.buffer(buffers.opacities).unwrap().len(), 2 * 5 * 4);
    assert_eq!(device.buffer(buffers.widths).unwrap().len(), 2 * 5 * 4);
    assert_eq!(device.buffer(buffers.indices).unwrap().len(), 6 * 2 * 2);
    assert_eq!(
        floats(device.buffer(buffers.points).unwrap()),
        line.data().points
    );
}

#[test]
fn batches_share_one_draw() {
    let mut line = line_with(LineConfig {
        points: Points::PolylineBatch(vec![THREE_POINTS.to_vec(), vec![0., 1., 0., 1., 1., 0.]]),
        ..Default::default()
    });
    line.draw(Transforms::default()).unwrap();

    assert_eq!(line.data().points.len(), 2 * 3 * (5 + 2 * 2));
    let draws = draws(&line);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].index_count, 6 * ((3 - 1) + (2 - 1)));
}

#[test]
fn every_drawn_vertex_reads_its_own_polyline() {
    let batch = vec![
        vec![0., 0., 0., 1., 0., 0.],
        vec![10., 10., 0., 11., 10., 0.],
        vec![],
        vec![7., 7., 7.],
        THREE_POINTS.to_vec(),
    ];
    let counts: Vec<u32> = batch.iter().map(|p| p.len() as u32 / 3).collect();
    let mut line = line_with(LineConfig {
        points: Points::PolylineBatch(batch),
        ..Default::default()
    });
    line.draw(Transforms::default()).unwrap();

    let mut ranges = Vec::new();
    let mut base = 0;
    for n in counts.into_iter().filter(|n| *n > 0) {
        ranges.push(base..base + 2 * (n + 2));
        base += 2 * (n + 2);
    }
    assert_eq!(base as usize, line.data().vertex_count());

    let draw = &draws(&line)[0];
    let bytes = line.device().buffer(draw.indices).unwrap();
    let indices: Vec<u32> = bytes
        .chunks_exact(2)
        .map(|b| u16::from_ne_bytes([b[0], b[1]]).into())
        .collect();
    assert_eq!(indices.len(), draw.index_count as usize);
    assert_eq!(indices.len(), 6 * (1 + 1 + 2));

    let uniforms = line.uniforms();
    for v in indices {
        let input = VertexInput::fetch(line.data(), v as usize)
            .unwrap_or_else(|| panic!("vertex {v} reads past the streams"));
        let range = ranges
            .iter()
            .find(|r| r.contains(&v))
            .unwrap_or_else(|| panic!("vertex {v} belongs to no polyline"));
        assert!(range.contains(&(v + 2)) && range.contains(&(v + 4)));
        assert!(vertex(&uniforms, line.color_table(), &input).position.is_finite());
    }
}

#[test]
fn large_batches_use_wide_indices() {
    let points: Vec<f32> = (0..32_769)
        .flat_map(|i| [i as f32, 0., 0.])
        .collect();
    let line = line(&points);
    let indices = line.buffers().indices;
    let element = line.device().commands.iter().rev().find_map(|c| match c {
        Command::Upload {
            buffer, element, ..
        } if *buffer == indices => Some(*element),
        _ => None,
    });
    assert_eq!(element, Some(ElementType::Uint32));
}

#[test]
fn indices_are_uploaded_as_static() {
    let mut line = line(&THREE_POINTS);
    line.set_points(polyline(&[0., 0., 0., 3., 3., 3.]), PointOverrides::default())
        .unwrap();
    let indices = line.buffers().indices;
    let uploads: Vec<_> = line
        .device()
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::Upload { buffer, usage, .. } => Some((*buffer == indices, *usage)),
            _ => None,
        })
        .collect();
    assert_eq!(uploads.len(), 2 * 5);
    for (is_index, usage) in uploads {
        let expected = if is_index {
            BufferUsage::Static
        } else {
            BufferUsage::Dynamic
        };
        assert_eq!(usage, expected);
    }
}

#[test]
fn planar_lines_skip_the_depth_test() {
    let mut line = line_with(LineConfig {
        points: polyline(&[0., 0., 1., 0., 1., 1.]),
        is_2d: true,
        z_2d: 0.5,
        ..Default::default()
    });
    line.draw(Transforms::default()).unwrap();
    assert!(!draws(&line)[0].state.depth_test);
    assert!(line.data().points.chunks_exact(3).all(|p| p[2] == 0.5));
}

#[test]
fn transforms_persist_between_draws() {
    let mut line = line(&THREE_POINTS);
    let projection = Mat4::from_scale(Vec3::splat(2.0));
    let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    line.draw(Transforms {
        projection: Some(projection),
        ..Default::default()
    })
    .unwrap();
    line.draw(Transforms {
        model: Some(model),
        ..Default::default()
    })
    .unwrap();

    let draws = draws(&line);
    assert_eq!(
        draws[0].uniforms.projection_view_model,
        projection.to_cols_array_2d()
    );
    assert_eq!(
        draws[1].uniforms.projection_view_model,
        (projection * model).to_cols_array_2d()
    );
}

#[test]
fn width_is_converted_to_device_units() {
    let mut line = line_with(LineConfig {
        points: polyline(&THREE_POINTS),
        width: 10.0,
        viewport: Viewport {
            width: 400.0,
            height: 200.0,
            pixel_ratio: 2.0,
        },
        ..Default::default()
    });
    let uniforms = line.uniforms();
    assert_close(uniforms.width, 0.1);
    assert_eq!(uniforms.aspect_ratio, 2.0);
    assert_eq!(uniforms.miter, 1);

    line.set_viewport(Viewport {
        width: 100.0,
        height: 100.0,
        pixel_ratio: 1.0,
    });
    assert_close(line.uniforms().width, 0.1);
    assert_eq!(line.uniforms().aspect_ratio, 1.0);
}

#[test]
fn style_changes() {
    let mut line = line(&THREE_POINTS);
    line.set_style(Style {
        miter: Some(false),
        width: Some(f32::NAN),
        ..Default::default()
    })
    .unwrap();
    let style = line.style();
    assert_eq!(style.miter, Some(false));
    assert_eq!(style.width, Some(1.0));
    assert_eq!(style.opacity, None);
    assert_eq!(line.uniforms().miter, 0);

    line.set_style(Style {
        width: Some(3.0),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(line.style().width, Some(3.0));
}

#[test]
fn global_opacity_replaces_palette_alpha() {
    let mut line = line(&THREE_POINTS);
    let uniforms = line.uniforms();
    assert_eq!((uniforms.use_opacity, uniforms.use_color_opacity), (0.0, 1.0));
    assert!(line.data().opacities.iter().all(|o| *o == 1.0));

    line.set_style(Style {
        opacity: Some(0.5),
        ..Default::default()
    })
    .unwrap();
    let uniforms = line.uniforms();
    assert_eq!((uniforms.use_opacity, uniforms.use_color_opacity), (1.0, 0.0));
    assert!(line.data().opacities.iter().all(|o| *o == 0.5));
    let uploaded = floats(line.device().buffer(line.buffers().opacities).unwrap());
    assert_eq!(uploaded, line.data().opacities);
}

#[test]
fn per_point_opacity_replaces_palette_alpha() {
    let line = line_with(LineConfig {
        points: polyline(&THREE_POINTS),
        opacities: vec![0.1, 0.2, 0.3],
        ..Default::default()
    });
    assert_eq!(line.uniforms().use_opacity, 1.0);
    assert_eq!(
        line.data().opacities,
        [0.1, 0.1, 0.1, 0.1, 0.2, 0.2, 0.3, 0.3, 0.3, 0.3]
    );
}

#[test]
fn palette_change_replaces_the_color_table() {
    let mut line = line_with(LineConfig {
        points: polyline(&THREE_POINTS),
        color: (0..5).map(|i| opaque([i as f32 / 4.0, 0.0, 0.0])).collect(),
        color_indices: vec![0., 4., 9.],
        ..Default::default()
    });
    assert_eq!(line.color_table().side(), 3);
    assert_eq!(
        line.data().color_indices,
        [0., 0., 0., 0., 4., 4., 4., 4., 4., 4.]
    );

    line.set_style(Style {
        color: Some(vec![Color::WHITE, Color::BLACK]),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(line.device().live_textures(), 1);
    assert_eq!(line.color_table().side(), 2);
    // Indices are clamped again against the smaller palette.
    assert_eq!(
        line.data().color_indices,
        [0., 0., 0., 0., 1., 1., 1., 1., 1., 1.]
    );

    line.draw(Transforms::default()).unwrap();
    let draw = &draws(&line)[0];
    assert_eq!(draw.uniforms.color_tex_res, 2);
    let (side, pixels) = line.device().texture(draw.color_table).unwrap();
    assert_eq!(side, 2);
    assert_eq!(&pixels[..8], &[255, 255, 255, 255, 0, 0, 0, 255]);
}

#[test]
fn flush_uploads_edited_streams() {
    let mut line = line(&THREE_POINTS);
    map_element(&mut line.data_mut().points, 1, 3, |y, _, _| y + 1.0);
    let points = line.buffers().points;
    assert_ne!(floats(line.device().buffer(points).unwrap()), line.data().points);

    line.flush(Stream::Points).unwrap();
    let uploaded = floats(line.device().buffer(points).unwrap());
    assert_eq!(uploaded, line.data().points);
    assert!(uploaded.chunks_exact(3).all(|p| p[1] == 1.0));
}

#[test]
fn clear_keeps_empty_buffers() {
    let mut line = line(&THREE_POINTS);
    let old = line.buffers().points;
    line.clear().unwrap();

    assert_ne!(line.buffers().points, old);
    assert!(line.device().buffer(old).is_none());
    assert_eq!(line.device().live_buffers(), 5);
    assert!(line.data().points.is_empty());
    assert!(!line.draw(Transforms::default()).unwrap());
}

#[test]
fn destroy_releases_everything() {
    let device = line(&THREE_POINTS).destroy();
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn upload_limits_are_reported() {
    let config = LineConfig {
        points: polyline(&THREE_POINTS),
        ..Default::default()
    };
    let Err(error) = Line::new(Recording::with_max_buffer_size(64), config) else {
        panic!("upload of 120 bytes should exceed the limit");
    };
    assert!(matches!(
        error,
        Error::BufferTooLarge { size: 120, max: 64 }
    ));
}

#[test]
fn identical_input_gives_identical_commands() {
    let config = LineConfig {
        points: Points::PolylineBatch(vec![THREE_POINTS.to_vec(), vec![5.; 12]]),
        widths: vec![1., 2.],
        ..Default::default()
    };
    let mut a = line_with(config.clone());
    let mut b = line_with(config);
    a.draw(Transforms::default()).unwrap();
    b.draw(Transforms::default()).unwrap();
    assert_eq!(a.data(), b.data());
    assert_eq!(a.device().commands, b.device().commands);
}

#[test]
fn vertex_stage_offsets_both_sides() {
    let line = line_with(LineConfig {
        points: polyline(&THREE_POINTS),
        width: 10.0,
        viewport: Viewport {
            width: 100.0,
            height: 100.0,
            pixel_ratio: 1.0,
        },
        ..Default::default()
    });
    let uniforms = line.uniforms();
    let out = |v| {
        let input = VertexInput::fetch(line.data(), v).unwrap();
        vertex(&uniforms, line.color_table(), &input)
    };

    let expected = [
        Vec4::new(0.0, 0.1, 0.0, 1.0),
        Vec4::new(0.0, -0.1, 0.0, 1.0),
        Vec4::new(1.0, 0.1, 0.0, 1.0),
        Vec4::new(1.0, -0.1, 0.0, 1.0),
    ];
    for (v, expected) in expected.into_iter().enumerate() {
        let position = out(v).position;
        assert!(
            (position - expected).length() < 1e-5,
            "vertex {v}: expected {expected}, got {position}"
        );
    }

    let color = out(0).color;
    assert_close(color.x, 204.0 / 255.0);
    assert_close(color.z, 0.0);
    assert_close(color.w, 1.0);
}
