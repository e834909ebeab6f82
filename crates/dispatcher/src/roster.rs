use serde::{Deserialize, Serialize};

/// A driver that receives new-order broadcasts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverContact {
    pub phone: String,
    #[serde(default)]
    pub name: String,
}

impl DriverContact {
    pub fn new(phone: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            phone: phone.into().trim().to_string(),
            name: name.into().trim().to_string(),
        }
    }
}

/// Drivers eligible for broadcast, unique by phone, in configuration order
#[derive(Debug, Clone, Default)]
pub struct DriverRoster {
    drivers: Vec<DriverContact>,
}

impl DriverRoster {
    pub fn new(drivers: impl IntoIterator<Item = DriverContact>) -> Self {
        let mut roster = Self::default();
        for driver in drivers {
            roster.add(driver);
        }
        roster
    }

    /// Add a driver. Blank phones are ignored, a known phone keeps its first entry.
    pub fn add(&mut self, driver: DriverContact) {
        if driver.phone.is_empty() || self.contains(&driver.phone) {
            return;
        }
        self.drivers.push(driver);
    }

    pub fn contains(&self, phone: &str) -> bool {
        self.drivers.iter().any(|d| d.phone == phone.trim())
    }

    /// Display name for a phone; the phone itself when unknown or unnamed
    pub fn name_of(&self, phone: &str) -> String {
        self.drivers
            .iter()
            .find(|d| d.phone == phone.trim())
            .filter(|d| !d.name.is_empty())
            .map(|d| d.name.clone())
            .unwrap_or_else(|| phone.trim().to_string())
    }

    pub fn drivers(&self) -> &[DriverContact] {
        &self.drivers
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
