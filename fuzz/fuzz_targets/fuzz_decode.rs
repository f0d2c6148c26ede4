#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Keep frame walks of sequences bounded
    if data.len() > 256 * 1024 {
        return;
    }
    if let Ok(info) = zenavif_io::inspect(data, 0, data.len()) {
        if u64::from(info.width) * u64::from(info.height) > 4096 * 4096 {
            return;
        }
    }
    if let Ok(image) = zenavif_io::decode(None, data, 0, data.len()) {
        assert_eq!(
            image.pixels.len(),
            image.width as usize * image.height as usize
        );
    }
});
