// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Device, challenge and refresh token ids are generated app-side so rows sort
// by creation time. Users and employees keep PG's gen_random_uuid() (v4).

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
