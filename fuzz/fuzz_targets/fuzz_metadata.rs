#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let exif = zenavif_io::get_exif(data, 0, data.len());
    let icc = zenavif_io::get_icc_profile(data, 0, data.len());
    if let Ok(info) = zenavif_io::inspect(data, 0, data.len()) {
        assert_eq!(info.has_exif, matches!(exif, Ok(Some(_))));
        assert_eq!(info.has_icc_profile, matches!(icc, Ok(Some(_))));
    }
});
