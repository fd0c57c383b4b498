use aisle_common::ulid_id;

ulid_id! {
    /// Identifier for an outbox record.
    ///
    /// ULIDs sort lexicographically by creation time, so listing records in
    /// id order is listing them in creation order.
    OutboxRecordId
}
