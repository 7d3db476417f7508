use chunkalloc::{memalloc, memfree};

#[test]
fn reference_scenario() {
    let sizes = [64, 64, 64, 16];
    let ptrs: Vec<_> = sizes.iter().map(|&size| memalloc(size)).collect();

    for (&ptr, &size) in ptrs.iter().zip(&sizes) {
        assert!(!ptr.is_null());
        unsafe { ptr.write_bytes(size as u8, size) };
    }

    let mut ranges: Vec<_> = ptrs.iter().zip(&sizes).map(|(&p, &s)| (p.addr(), s)).collect();
    ranges.sort_unstable();
    assert!(ranges.windows(2).all(|w| w[0].0 + w[0].1 <= w[1].0));

    for (&ptr, &size) in ptrs.iter().zip(&sizes) {
        for i in 0..size {
            assert_eq!(unsafe { ptr.add(i).read() }, size as u8);
        }
        memfree(ptr);
    }
}

#[test]
fn large_and_zero_sized_requests() {
    let big = memalloc(1 << 20);
    let zero = memalloc(0);
    assert!(!big.is_null());
    assert!(!zero.is_null());

    unsafe {
        big.write_bytes(0x5A, 1 << 20);
        zero.write_bytes(0xA5, 4);
    }

    memfree(zero);
    memfree(big);
}

#[test]
fn invalid_frees_are_ignored() {
    let ptr = memalloc(32);
    memfree(std::ptr::null_mut());

    let mut local = 0u32;
    memfree((&raw mut local).cast());

    // An interior pointer is not an allocation either.
    memfree(unsafe { ptr.add(4) });

    unsafe { ptr.write_bytes(0x11, 32) };
    memfree(ptr);
}
