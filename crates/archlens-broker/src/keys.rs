//! Broker key builders for the work queue.
//!
//! Every queue owns four keys: the ready list, the in-flight hash
//! (receipt -> payload), the lease sorted set (member = receipt, score =
//! lease deadline in ms) and the counter that mints receipts.

/// Key of the list holding jobs waiting to be popped.
pub fn queue(prefix: &str, name: &str) -> String {
    format!("{prefix}queue:{name}")
}

/// Key of the hash mapping each outstanding receipt to its payload.
pub fn in_flight(prefix: &str, name: &str) -> String {
    format!("{prefix}queue:{name}:inflight")
}

/// Key of the sorted set holding lease deadlines by receipt.
pub fn leases(prefix: &str, name: &str) -> String {
    format!("{prefix}queue:{name}:leases")
}

/// Key of the counter incremented once per pop.
pub fn receipt_seq(prefix: &str, name: &str) -> String {
    format!("{prefix}queue:{name}:seq")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_keys_share_namespace() {
        assert_eq!(queue("archlens:", "analysis"), "archlens:queue:analysis");
        assert_eq!(
            in_flight("archlens:", "analysis"),
            "archlens:queue:analysis:inflight"
        );
        assert_eq!(leases("archlens:", "analysis"), "archlens:queue:analysis:leases");
        assert_eq!(receipt_seq("archlens:", "analysis"), "archlens:queue:analysis:seq");
    }

    #[test]
    fn test_named_queues_do_not_collide() {
        assert_ne!(queue("archlens:", "analysis"), queue("archlens:", "reindex"));
        assert_ne!(
            receipt_seq("archlens:", "analysis"),
            receipt_seq("archlens:", "reindex")
        );
    }
}
