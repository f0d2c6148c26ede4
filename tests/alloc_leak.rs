//! Every call releases what it allocated, on success and on failure

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicIsize, Ordering};

struct Counting;

static LIVE: AtomicIsize = AtomicIsize::new(0);

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        LIVE.fetch_add(layout.size() as isize, Ordering::SeqCst);
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        LIVE.fetch_sub(layout.size() as isize, Ordering::SeqCst);
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        LIVE.fetch_add(new_size as isize - layout.size() as isize, Ordering::SeqCst);
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

fn net_bytes(f: impl Fn()) -> isize {
    // First run pays for lazily initialized globals
    f();
    let before = LIVE.load(Ordering::SeqCst);
    f();
    LIVE.load(Ordering::SeqCst) - before
}

// One test per binary: the counter is process-wide
#[test]
fn calls_do_not_leak() {
    let config = zenavif_io::EncoderConfig::new()
        .with_speed(10)
        .expect("valid speed");
    let avif = zenavif_io::encode_rgb(Some(&config), &[77u8; 8 * 8 * 3], 8, 8, 24)
        .expect("encode should succeed");
    let garbage = vec![0x42u8; 512];
    let truncated = avif[..avif.len() / 2].to_vec();

    let cases: [(&str, Box<dyn Fn()>); 7] = [
        ("inspect", Box::new(|| drop(zenavif_io::inspect(&avif, 0, avif.len())))),
        ("decode", Box::new(|| drop(zenavif_io::decode(None, &avif, 0, avif.len())))),
        ("decode garbage", Box::new(|| drop(zenavif_io::decode(None, &garbage, 0, garbage.len())))),
        (
            "decode truncated",
            Box::new(|| drop(zenavif_io::decode(None, &truncated, 0, truncated.len()))),
        ),
        ("bad range", Box::new(|| drop(zenavif_io::decode(None, &avif, 3, avif.len())))),
        ("frame out of range", Box::new(|| drop(zenavif_io::decode_frame(None, &avif, 0, avif.len(), 4)))),
        ("metadata", Box::new(|| drop(zenavif_io::get_exif(&avif, 0, avif.len())))),
    ];
    for (name, case) in &cases {
        assert_eq!(net_bytes(case), 0, "{name} leaked");
    }
}
