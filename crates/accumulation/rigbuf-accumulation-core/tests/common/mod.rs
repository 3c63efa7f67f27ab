use rigbuf_accumulation_core::AccumulationTable;

/// Active entries form a prefix and every owner maps to its own position.
pub fn assert_partition(table: &AccumulationTable) {
    let active = table.active_len();
    assert!(active <= table.len());
    for (i, entry) in table.entries().iter().enumerate() {
        assert_eq!(entry.is_active(), i < active, "entry {i} partition");
        assert_eq!(table.index_of(entry.owner()), Some(i), "owner map for {i}");
    }
}
