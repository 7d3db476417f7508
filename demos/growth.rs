//! Walks a small allocator through region growth and coalescing, printing
//! the free list after each step.

use chunkalloc::{Allocator, Config};

fn dump(label: &str, allocator: &Allocator) {
    println!("\n[{label}] regions = {}, in use = {}", allocator.regions(), allocator.used_len());
    for (addr, size) in allocator.free_chunks() {
        println!("    free chunk {addr:#x}: {size} bytes");
    }
}

fn main() {
    let config = Config::new().with_region_size(1024);
    let mut allocator = Allocator::with_config(config).unwrap();

    let mut blocks = Vec::new();
    for _ in 0..20 {
        blocks.push(allocator.allocate(100).unwrap());
    }
    dump("20 x 100 bytes", &allocator);

    // Every other block: nothing can merge yet.
    for ptr in blocks.iter().step_by(2) {
        allocator.release(ptr.as_ptr()).unwrap();
    }
    dump("released even blocks", &allocator);

    for ptr in blocks.iter().skip(1).step_by(2) {
        allocator.release(ptr.as_ptr()).unwrap();
    }
    dump("released odd blocks", &allocator);

    if let Err(err) = allocator.release(blocks[0].as_ptr()) {
        println!("\nreleasing twice: {err}");
    }
}
