// SPDX-License-Identifier: Apache-2.0

use proptest::prelude::*;
use viewfinder::{
    error::Error,
    image::{
        convert_to_hsl, decode_yuv420sp_to_rgb, rotate90, Frame, PixelFormat, SamplePoint,
    },
};

fn nv21_frame(width: u32, height: u32, luma: u8, u: u8, v: u8) -> Vec<u8> {
    let mut buf = vec![luma; (width * height) as usize];
    for _ in 0..(width * height / 4) {
        buf.push(v);
        buf.push(u);
    }
    buf
}

#[test]
fn test_reference_sample_point() {
    // smallest common preview size, uniform mid grey
    let frame = Frame::new(nv21_frame(176, 144, 128, 128, 128), 176, 144, PixelFormat::Nv21).unwrap();
    let acc = frame.sample(SamplePoint::default()).unwrap();
    assert_eq!(acc.count(), 1);
    assert_eq!(acc.sum(), [132, 132, 132]);
}

#[test]
fn test_empty_buffer_rejected() {
    let res = decode_yuv420sp_to_rgb(&[], 176, 144, PixelFormat::Nv21, &[(90, 90)]);
    assert!(matches!(res, Err(Error::InvalidArgument(_))));
    assert!(matches!(
        Frame::new(Vec::new(), 176, 144, PixelFormat::Nv21),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_rotate_identity_1x1() {
    let rotated = rotate90(&[42], 1, 1).unwrap();
    assert_eq!((rotated.width(), rotated.height()), (1, 1));
    assert_eq!(rotated.data(), &[42]);
}

#[test]
fn test_hsl_fixtures() {
    let hsl = convert_to_hsl(255, 0, 0);
    assert_eq!((hsl.hue, hsl.saturation, hsl.lightness), (0, 100, 50));
    let hsl = convert_to_hsl(0, 255, 0);
    assert_eq!((hsl.hue, hsl.saturation, hsl.lightness), (120, 100, 50));
    let hsl = convert_to_hsl(0, 0, 255);
    assert_eq!((hsl.hue, hsl.saturation, hsl.lightness), (240, 100, 50));
    let hsl = convert_to_hsl(128, 128, 128);
    assert_eq!((hsl.hue, hsl.saturation, hsl.lightness), (0, 0, 50));
}

proptest! {
    #[test]
    fn prop_sampled_channels_in_range(y in any::<u8>(), u in any::<u8>(), v in any::<u8>()) {
        let buf = nv21_frame(2, 2, y, u, v);
        for format in [PixelFormat::Nv21, PixelFormat::Nv12] {
            let acc = decode_yuv420sp_to_rgb(&buf, 2, 2, format, &[(1, 1)]).unwrap();
            for channel in acc.sum() {
                prop_assert!(channel <= 255);
            }
        }
    }

    #[test]
    fn prop_hsl_in_range(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let hsl = convert_to_hsl(r, g, b);
        prop_assert!(hsl.hue < 360);
        prop_assert!(hsl.saturation <= 100);
        prop_assert!(hsl.lightness <= 100);
    }

    #[test]
    fn prop_monochrome_unsaturated(c in any::<u8>()) {
        let hsl = convert_to_hsl(c, c, c);
        prop_assert_eq!(hsl.saturation, 0);
        prop_assert_eq!(hsl.hue, 0);
    }

    #[test]
    fn prop_rotate_four_times_is_identity(
        (width, height, data) in (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
            (Just(w), Just(h), proptest::collection::vec(any::<u8>(), (w * h) as usize))
        })
    ) {
        let once = rotate90(&data, width, height).unwrap();
        prop_assert_eq!((once.width(), once.height()), (height, width));

        let mut frame = once;
        for _ in 0..3 {
            frame = frame.rotate90().unwrap();
        }
        prop_assert_eq!((frame.width(), frame.height()), (width, height));
        prop_assert_eq!(frame.data(), &data[..]);
    }
}
