use ckks_column_encrypt::SlotBatcher;
use proptest::prelude::*;

proptest! {
    #[test]
    fn batches_partition_the_column(
        values in prop::collection::vec(-1e6f64..1e6, 0..500),
        capacity in 1usize..64,
    ) {
        let batcher = SlotBatcher::new(capacity).unwrap();
        let batches: Vec<_> = batcher.batches(&values).collect();

        prop_assert_eq!(batches.len(), values.len().div_ceil(capacity));
        prop_assert_eq!(batches.len(), batcher.batch_count(values.len()));

        let joined: Vec<f64> = batches.iter().flat_map(|b| b.values.iter().copied()).collect();
        prop_assert_eq!(&joined, &values);

        for (i, batch) in batches.iter().enumerate() {
            prop_assert_eq!(batch.index, i);
            prop_assert!(!batch.values.is_empty());
            if i + 1 < batches.len() {
                prop_assert_eq!(batch.values.len(), capacity);
            } else {
                prop_assert!(batch.values.len() <= capacity);
            }
        }
    }
}
