use pretty_assertions::assert_eq;
use strata_types::{EntityId, ObjectIdentity};

#[test]
fn identity_round_trips_through_display() {
    let id = EntityId::new();
    let identity = ObjectIdentity::new("person", id);

    let parsed: ObjectIdentity = identity.to_string().parse().unwrap();
    assert_eq!(parsed, identity);
    assert_eq!(parsed.entity_type(), "person");
    assert_eq!(parsed.id(), id);
}

#[test]
fn identity_preserves_slashes_in_type_boundary() {
    // rsplit means only the final segment is the id.
    let id = EntityId::new();
    let identity = ObjectIdentity::new("a/b", id);
    let parsed: ObjectIdentity = identity.to_string().parse().unwrap();
    assert_eq!(parsed.entity_type(), "a/b");
}

#[test]
fn malformed_identity_is_rejected() {
    assert!("no-separator".parse::<ObjectIdentity>().is_err());
    assert!("/missing-type".parse::<ObjectIdentity>().is_err());
    assert!("person/not-a-uuid".parse::<ObjectIdentity>().is_err());
}

#[test]
fn identity_serde_round_trip() {
    let identity = ObjectIdentity::new("note", EntityId::new());
    let json = serde_json::to_string(&identity).unwrap();
    let back: ObjectIdentity = serde_json::from_str(&json).unwrap();
    assert_eq!(back, identity);
}
