// Helper for generating UUIDv7 (timestamp-sortable UUIDs).
//
// Token records are append-only audit rows, so their primary keys are
// generated app-side as UUIDv7 to keep them ordered by issuance.
// Users keep PG's gen_random_uuid() (v4).

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Parse a user identifier, rejecting anything that is not a UUID.
pub fn parse_user_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn uuidv7_is_monotonic() {
        let a = uuidv7();
        let b = uuidv7();
        assert!(b >= a);
    }

    #[test]
    fn parse_user_id_rejects_garbage() {
        assert!(parse_user_id("not-a-uuid").is_none());
        assert!(parse_user_id("").is_none());
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()), Some(id));
    }
}
