//! UUID generation helpers.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuids_are_unique() {
        let ids: HashSet<Uuid> = (0..100).map(|_| generate_uuid()).collect();
        assert_eq!(ids.len(), 100);
    }
}
