use chunkalloc::{memalloc, memfree};

fn log_alloc(addr: *mut u8, size: usize) {
    println!("Requested {size} bytes of memory");
    println!("Received this address: {addr:?}");
}

fn main() {
    let a = memalloc(64);
    log_alloc(a, 64);

    let b = memalloc(64);
    log_alloc(b, 64);

    let c = memalloc(64);
    log_alloc(c, 64);

    let d = memalloc(16);
    log_alloc(d, 16);

    memfree(a);
    memfree(b);
    memfree(c);
    memfree(d);
}
