use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Structured street address. Stored and transmitted as one value; the
/// single-line form is only ever derived for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

impl Address {
    pub fn is_blank(&self) -> bool {
        self.street.trim().is_empty()
            && self.city.trim().is_empty()
            && self.postal_code.trim().is_empty()
    }

    pub fn formatted(&self) -> String {
        let locality = [self.postal_code.trim(), self.city.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        [self.street.trim(), locality.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::Address;

    #[test]
    fn formatted_joins_present_parts() {
        let address = Address {
            street: "12 Harbour Rd".to_string(),
            city: "Leith".to_string(),
            postal_code: "EH6 6LX".to_string(),
        };
        assert_eq!(address.formatted(), "12 Harbour Rd, EH6 6LX Leith");
    }

    #[test]
    fn formatted_skips_missing_parts() {
        let address = Address {
            street: String::new(),
            city: "Leith".to_string(),
            postal_code: " ".to_string(),
        };
        assert_eq!(address.formatted(), "Leith");
        assert!(!address.is_blank());
        assert!(Address::default().is_blank());
    }
}
