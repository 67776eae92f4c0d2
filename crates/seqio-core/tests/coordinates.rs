//! Host (y-up) and file (top-down) addressing of the same pixels.

use seqio_core::transfer::{copy, scale};
use seqio_core::{PixelBuffer, Rect, RowOrder};

#[test]
fn file_rows_are_host_rows_flipped() {
    let host = Rect::from_size(3, 4);
    let file = host.flip_y(4);
    assert_eq!(file, host);

    let mut buf = PixelBuffer::new(host, 1, RowOrder::TopDown);
    {
        let mut rows = buf.memory_view_mut(file).unwrap();
        for y in 0..4 {
            for x in 0..3 {
                rows.set_sample(x, y, 0, (y * 10 + x) as f32);
            }
        }
    }
    // file row 0 is the top of the image
    let view = buf.view();
    assert_eq!(view.sample(0, 3, 0), 0.0);
    assert_eq!(view.sample(2, 0, 0), 32.0);
}

#[test]
fn data_window_flip_inside_display() {
    // rows 1..3 counted down in an 8-row frame sit at rows 5..7 counted up
    let file = Rect::new(2, 1, 6, 3);
    assert_eq!(file.flip_y(8), Rect::new(2, 5, 6, 7));
    assert_eq!(file.flip_y(8).flip_y(8), file);
}

#[test]
fn downscale_covers_source() {
    let r = Rect::new(-3, 1, 5, 7);
    let half = r.downscale(1);
    assert_eq!(half, Rect::new(-2, 0, 3, 4));
    assert!(half.upscale(1).contains_rect(&r));
}

#[test]
fn bottom_up_copy_then_half_scale() {
    let full = Rect::from_size(4, 2);
    let mut src = PixelBuffer::new(full, 1, RowOrder::TopDown);
    {
        let mut view = src.view_mut();
        for y in 0..2 {
            for x in 0..4 {
                view.set_sample(x, y, 0, x as f32);
            }
        }
    }
    let mut host = PixelBuffer::new(full, 1, RowOrder::BottomUp);
    copy(&src.view(), &mut host.view_mut(), full);

    let half = full.downscale(1);
    let mut out = PixelBuffer::new(half, 1, RowOrder::BottomUp);
    scale(&host.view(), full, &mut out.view_mut(), half, 1);
    assert_eq!(out.view().sample(0, 0, 0), 0.5);
    assert_eq!(out.view().sample(1, 0, 0), 2.5);
}
