#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use ucpatch::validate;

// First two bytes pick the starting position and the probed offset; the
// rest is the image.
fuzz_target!(|data: &[u8]| {
    let [start, offset, image @ ..] = data else {
        return;
    };

    let mut stream = Cursor::new(image);
    stream.set_position(u64::from(*start));

    let found = validate(&mut stream, u64::from(*offset)).unwrap();
    assert_eq!(stream.position(), u64::from(*start));

    if let Some(record) = found {
        let at = *offset as usize;
        assert!(record.size > 0);
        assert_eq!(&image[at..at + 4], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&image[at + 0x14..at + 0x18], &[0x01, 0x00, 0x00, 0x00]);
    }
});
