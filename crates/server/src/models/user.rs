//! User domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spareline_core::{Email, ProductId, UserId, UserRole};

/// Most entries a garage or address book may hold.
pub const MAX_PROFILE_ENTRIES: usize = 20;

/// A storefront or staff account.
///
/// The password hash and TOTP secret never leave the repository layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub two_factor_enabled: bool,
    pub garage: Vec<Vehicle>,
    pub addresses: Vec<Address>,
    pub favorites: Vec<ProductId>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "First Last", falling back to the email local part.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.local_part().to_owned()
        } else {
            name.to_owned()
        }
    }
}

/// A vehicle saved in the customer's garage, used to pre-fill RFQs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl Vehicle {
    /// Check required fields and plausible values.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.make.trim().is_empty() || self.model.trim().is_empty() {
            return Err("vehicle make and model are required".to_owned());
        }
        if let Some(year) = self.year
            && !(1900..=2100).contains(&year)
        {
            return Err(format!("vehicle year {year} is out of range"));
        }
        if let Some(vin) = &self.vin
            && (vin.len() != 17 || !vin.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err("VIN must be 17 letters or digits".to_owned());
        }
        Ok(())
    }

    /// One-line summary, e.g. "2014 Toyota Corolla 1.6".
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        if let Some(year) = self.year {
            parts.push(year.to_string());
        }
        parts.push(self.make.clone());
        parts.push(self.model.clone());
        if let Some(engine) = &self.engine {
            parts.push(engine.clone());
        }
        parts.join(" ")
    }
}

/// A postal address. Also used as the order shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub label: Option<String>,
    pub recipient: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// Check that the fields needed to ship a parcel are present.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("recipient", &self.recipient),
            ("line1", &self.line1),
            ("city", &self.city),
            ("country", &self.country),
        ] {
            if value.trim().is_empty() {
                return Err(format!("address {field} is required"));
            }
        }
        Ok(())
    }
}

/// Ensure at most one address is flagged default, keeping the first.
pub fn normalize_default_address(addresses: &mut [Address]) {
    let mut seen = false;
    for address in addresses.iter_mut() {
        if address.is_default {
            address.is_default = !seen;
            seen = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle() -> Vehicle {
        Vehicle {
            make: "Toyota".to_owned(),
            model: "Corolla".to_owned(),
            year: Some(2014),
            engine: Some("1.6".to_owned()),
            vin: None,
            nickname: None,
        }
    }

    fn address(default: bool) -> Address {
        Address {
            label: None,
            recipient: "Sam Driver".to_owned(),
            line1: "1 Garage Lane".to_owned(),
            line2: None,
            city: "Leeds".to_owned(),
            region: None,
            postal_code: Some("LS1 1AA".to_owned()),
            country: "GB".to_owned(),
            phone: None,
            is_default: default,
        }
    }

    #[test]
    fn test_vehicle_validation() {
        assert!(vehicle().validate().is_ok());

        let mut v = vehicle();
        v.year = Some(1800);
        assert!(v.validate().is_err());

        let mut v = vehicle();
        v.vin = Some("SHORT".to_owned());
        assert!(v.validate().is_err());

        let mut v = vehicle();
        v.make = " ".to_owned();
        assert!(v.validate().is_err());
    }

    #[test]
    fn test_vehicle_describe() {
        assert_eq!(vehicle().describe(), "2014 Toyota Corolla 1.6");
    }

    #[test]
    fn test_address_requires_shipping_fields() {
        assert!(address(false).validate().is_ok());
        let mut a = address(false);
        a.city = String::new();
        assert_eq!(a.validate().unwrap_err(), "address city is required");
    }

    #[test]
    fn test_single_default_address() {
        let mut list = vec![address(false), address(true), address(true)];
        normalize_default_address(&mut list);
        let defaults: Vec<bool> = list.iter().map(|a| a.is_default).collect();
        assert_eq!(defaults, vec![false, true, false]);
    }
}
