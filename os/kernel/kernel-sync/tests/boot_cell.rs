use kernel_sync::BootCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[test]
fn claim_once() {
    static CELL: BootCell<[u32; 4]> = BootCell::new([0; 4]);

    assert!(!CELL.is_claimed());
    let slot = CELL.claim().expect("first claim");
    slot[2] = 7;
    assert!(CELL.is_claimed());
    assert!(CELL.claim().is_none());
    assert_eq!(slot[2], 7);
}

#[test]
fn racing_claims_have_one_winner() {
    static CELL: BootCell<u64> = BootCell::new(0);
    static WINNERS: AtomicUsize = AtomicUsize::new(0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            thread::spawn(|| {
                if let Some(v) = CELL.claim() {
                    *v = 42;
                    WINNERS.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(WINNERS.load(Ordering::SeqCst), 1);
}
