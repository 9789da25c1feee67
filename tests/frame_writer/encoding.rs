//! Tests for WINDOW_UPDATE frame encoding

use h2_flow_control::{encode_window_update, frame_type, parse_window_update, BufferedFrameWriter, WindowUpdateWriter};

#[test]
fn test_connection_level_window_update() {
    let frame = encode_window_update(0, 65_536);
    assert_eq!(frame, vec![0, 0, 4, frame_type::WINDOW_UPDATE, 0, 0, 0, 0, 0, 0, 1, 0, 0]);
}

#[test]
fn test_max_increment_round_trips() {
    let frame = encode_window_update(3, 0x7FFF_FFFF);
    assert_eq!(&frame[9..13], &[0x7F, 0xFF, 0xFF, 0xFF]);
    assert_eq!(parse_window_update(&frame), Some((3, 0x7FFF_FFFF)));
}

#[test]
fn test_parse_clears_reserved_bits() {
    let frame = [0, 0, 4, 8, 0, 0x80, 0, 0, 1, 0x80, 0, 0, 5];
    assert_eq!(parse_window_update(&frame), Some((1, 5)));
}

#[test]
fn test_parse_rejects_wrong_length_field() {
    let frame = [0, 0, 5, 8, 0, 0, 0, 0, 1, 0, 0, 0, 5];
    assert_eq!(parse_window_update(&frame), None);
}

#[test]
fn test_buffered_writer_output_is_wire_ready() {
    let writer = BufferedFrameWriter::new();
    writer.write_window_update(1, 1200).unwrap();
    writer.write_window_update(0, 3200).unwrap();

    let mut expected = encode_window_update(1, 1200);
    expected.extend(encode_window_update(0, 3200));
    assert_eq!(writer.take_pending(), expected);
}
