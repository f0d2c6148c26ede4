#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = zenavif_io::inspect(data, 0, data.len());
    // Subranges must never read outside the caller's buffer
    if data.len() > 1 {
        let _ = zenavif_io::inspect(data, 1, data.len());
        let _ = zenavif_io::inspect(data, 1, data.len() - 1);
    }
});
