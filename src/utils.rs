use bson::oid::ObjectId;

/// Parse a 24-character hex object id. Malformed input yields the all-zero id.
#[must_use]
pub fn object_id_from_hex(hex: &str) -> ObjectId {
    ObjectId::parse_str(hex).unwrap_or_else(|_| ObjectId::from_bytes([0; 12]))
}
