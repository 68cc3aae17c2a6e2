#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use ucpatch::ScanEvent;

fuzz_target!(|data: &[u8]| {
    let mut stream = Cursor::new(data);
    let events = ucpatch::report(&mut stream, 0).expect("in-memory scan cannot fail");

    let mut covered = 0u64;
    for event in &events {
        match event {
            ScanEvent::Gap { start, end, length }
            | ScanEvent::TrailingGap { start, end, length } => {
                assert_eq!(*start, covered);
                assert_eq!(end - start + 1, *length);
                covered = end + 1;
            }
            ScanEvent::Record(r) => {
                assert_eq!(r.position, covered);
                covered = r.end();
            }
            ScanEvent::NoTrailingGap => {}
        }
    }
    assert!(matches!(
        events.last(),
        Some(ScanEvent::NoTrailingGap | ScanEvent::TrailingGap { .. })
    ));
});
