//! # Listing Record
//!
//! One classified-ad listing as pushed by the feed. Identity is the `id` key:
//! two listings with the same id are the same entity no matter how their other
//! attributes differ.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// # Listing
///
/// Every attribute except `id` is optional on the wire. Field names follow the
/// feed's camelCase convention (`priceEur`, `sellerType`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Unique key of the listing.
    pub id: String,
    /// Link to the listing page.
    #[serde(default)]
    pub url: Option<String>,
    /// Headline as shown by the source.
    #[serde(default)]
    pub title: Option<String>,
    /// Fuel type, free-form.
    #[serde(default)]
    pub fuel: Option<String>,
    /// Transmission, free-form.
    #[serde(default)]
    pub transmission: Option<String>,
    /// Name of the search profile that picked this listing up.
    #[serde(default)]
    pub picker: Option<String>,
    /// First registration year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Mileage in kilometres.
    #[serde(default)]
    pub km: Option<i32>,
    /// Engine power in horsepower.
    #[serde(default)]
    pub ps: Option<i32>,
    /// Engine power in kilowatts.
    #[serde(default)]
    pub kw: Option<i32>,
    /// Dealer or private seller.
    #[serde(default)]
    pub seller_type: Option<String>,
    /// Location of the offer.
    #[serde(default)]
    pub location: Option<String>,
    /// Asking price in whole euros.
    #[serde(default)]
    pub price_eur: Option<i32>,
    /// Thumbnail reference.
    #[serde(default)]
    pub image: Option<String>,
}

impl Listing {
    /// Creates a listing carrying only its identity.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Sets the title. Builder-style, for hosts and tests constructing records.
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the asking price in euros.
    pub fn priced(mut self, price_eur: i32) -> Self {
        self.price_eur = Some(price_eur);
        self
    }

    /// The identity key.
    pub fn key(&self) -> &str {
        &self.id
    }
}

impl PartialEq for Listing {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listing {}

impl Hash for Listing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_attributes() {
        let a = Listing::with_id("42").titled("Golf").priced(9_900);
        let b = Listing::with_id("42").titled("Golf Variant").priced(8_500);
        assert_eq!(a, b);

        let set: HashSet<Listing> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn serializes_camel_case() {
        let mut listing = Listing::with_id("7").priced(12_000);
        listing.seller_type = Some("dealer".into());

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["priceEur"], 12_000);
        assert_eq!(json["sellerType"], "dealer");
    }
}
