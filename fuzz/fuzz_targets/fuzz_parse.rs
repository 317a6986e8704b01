#![no_main]

use std::io::Cursor;

use formpart::Multipart;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must either parse or fail with a clean error, never
    // panic or loop.
    let parser = Multipart::with_boundary(Cursor::new(data.to_vec()), "X-BOUNDARY");
    let _ = parser.parse();
});
