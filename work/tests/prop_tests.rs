use proptest::prelude::*;

use lattice_types::HashOrAccount;
use lattice_work::{validate_work, work_value, WorkBlockKind, WorkGenerator, WorkThresholds};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Generated PoW always passes its own validation.
    #[test]
    fn generated_pow_always_valid(
        root in prop::array::uniform32(0u8..),
        threshold in 0u64..0xf000_0000_0000_0000,
    ) {
        let root = HashOrAccount::new(root);
        let nonce = WorkGenerator::new().generate(&root, threshold).unwrap();
        prop_assert!(validate_work(&root, nonce, threshold));
    }

    /// Zero threshold always passes regardless of nonce.
    #[test]
    fn zero_threshold_always_passes(
        root in prop::array::uniform32(0u8..),
        nonce in any::<u64>(),
    ) {
        prop_assert!(validate_work(&HashOrAccount::new(root), nonce, 0));
    }

    /// Lower thresholds are easier to meet.
    #[test]
    fn lower_threshold_is_easier(
        root in prop::array::uniform32(0u8..),
        nonce in any::<u64>(),
        threshold in 1u64..u64::MAX,
    ) {
        let root = HashOrAccount::new(root);
        if validate_work(&root, nonce, threshold) {
            prop_assert!(validate_work(&root, nonce, threshold - 1));
        }
        prop_assert_eq!(work_value(&root, nonce), work_value(&root, nonce));
    }

    /// Kind ordering holds for any non-zero base.
    #[test]
    fn kind_ordering_holds(base in 1u64..u64::MAX / 2) {
        let t = WorkThresholds::with_base(base);
        let b = t.threshold_for(WorkBlockKind::Base);
        let r = t.threshold_for(WorkBlockKind::ReceiveOrOpen);
        let e = t.threshold_for(WorkBlockKind::Epoch);
        prop_assert!(b <= r && r <= e);
    }
}
