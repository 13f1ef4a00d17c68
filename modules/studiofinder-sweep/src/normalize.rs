//! Merges a search hit and its details into the persisted row shape.

use places_client::{fallback_map_url, AddressComponent, PlaceDetails, RawHit};
use studiofinder_common::{CanonicalRecord, SearchCenter};

/// City and postal code from address components, scanned in order.
/// `locality` wins; the county fills in only while no city is known.
pub fn city_and_postal(components: &[AddressComponent]) -> (String, String) {
    let mut city = String::new();
    let mut postal = String::new();
    for component in components {
        let has = |t: &str| component.types.iter().any(|ty| ty == t);
        if has("locality") {
            city = component.long_name.clone();
        } else if has("postal_code") {
            postal = component.long_name.clone();
        } else if city.is_empty() && has("administrative_area_level_2") {
            city = component.long_name.clone();
        }
    }
    (city, postal)
}

/// Build the canonical record. Details override hit fields where present;
/// `details` is `None` when the lookup came back empty or failed softly.
pub fn to_record(
    hit: &RawHit,
    external_id: &str,
    details: Option<&PlaceDetails>,
    emails: &[String],
    keyword: &str,
    center: SearchCenter,
) -> CanonicalRecord {
    let details = details.cloned().unwrap_or_default();
    let (city, postal_code) = city_and_postal(&details.address_components);
    let location = details.location.or(hit.location);

    CanonicalRecord {
        name: hit.name.clone(),
        address: details.address.unwrap_or_else(|| hit.vicinity.clone()),
        city,
        postal_code,
        website: details.website.unwrap_or_default(),
        phone: details.phone.unwrap_or_default(),
        email: emails.join(", "),
        map_url: details
            .canonical_url
            .unwrap_or_else(|| fallback_map_url(external_id)),
        lat: location.map(|l| l.lat),
        lng: location.map(|l| l.lng),
        external_id: external_id.to_string(),
        keyword: keyword.to_string(),
        center_lat: center.lat,
        center_lng: center.lng,
    }
}
