mod common;

use common::MockModule;
use edgecam_bridge::{read_out, write_in, AllocatorProxy, ViewCache};
use proptest::prelude::*;

proptest! {
    #[test]
    fn write_in_read_out_round_trips(bytes in proptest::collection::vec(any::<u8>(), 1..4096)) {
        let mut module = MockModule::new();
        let mut views = ViewCache::new();
        let mut proxy = AllocatorProxy::new();

        let alloc = write_in(&mut module, &mut views, &mut proxy, &bytes).unwrap();
        let out = read_out(&mut module, &mut views, &mut proxy, alloc).unwrap();
        prop_assert_eq!(out, bytes);
        prop_assert_eq!(proxy.outstanding(), 0);
        prop_assert!(module.release_pairs_balanced());
    }

    #[test]
    fn round_trip_survives_interleaved_growth(bytes in proptest::collection::vec(any::<u8>(), 1..1024)) {
        let mut module = MockModule::new();
        let mut views = ViewCache::new();
        let mut proxy = AllocatorProxy::new();

        let alloc = write_in(&mut module, &mut views, &mut proxy, &bytes).unwrap();
        // Growth between write-in and read-out invalidates the cached views;
        // the read must still see the bytes through a recreated view.
        let big = proxy.allocate(&mut module, (common::PAGE * 4) as u32).unwrap();
        let out = read_out(&mut module, &mut views, &mut proxy, alloc).unwrap();
        prop_assert_eq!(&out, &bytes);
        proxy.release(&mut module, big).unwrap();
        prop_assert_eq!(proxy.outstanding(), 0);
    }
}
