use super::CountryProvider;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    pub code: String,
    pub dial_code: String,
    pub flag: String,
}

const COUNTRIES: [(&str, &str, &str, &str); 15] = [
    ("United States", "US", "+1", "🇺🇸"),
    ("United Kingdom", "GB", "+44", "🇬🇧"),
    ("Canada", "CA", "+1", "🇨🇦"),
    ("Australia", "AU", "+61", "🇦🇺"),
    ("Germany", "DE", "+49", "🇩🇪"),
    ("France", "FR", "+33", "🇫🇷"),
    ("Japan", "JP", "+81", "🇯🇵"),
    ("South Korea", "KR", "+82", "🇰🇷"),
    ("India", "IN", "+91", "🇮🇳"),
    ("China", "CN", "+86", "🇨🇳"),
    ("Brazil", "BR", "+55", "🇧🇷"),
    ("Mexico", "MX", "+52", "🇲🇽"),
    ("Russia", "RU", "+7", "🇷🇺"),
    ("Italy", "IT", "+39", "🇮🇹"),
    ("Spain", "ES", "+34", "🇪🇸"),
];

/// Built-in country list, served after a simulated lookup delay.
pub struct StaticCountries {
    latency: Duration,
}

impl StaticCountries {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl CountryProvider for StaticCountries {
    async fn countries(&self) -> Result<Vec<Country>> {
        tokio::time::sleep(self.latency).await;

        let mut countries: Vec<Country> = COUNTRIES
            .iter()
            .map(|(name, code, dial_code, flag)| Country {
                name: name.to_string(),
                code: code.to_string(),
                dial_code: dial_code.to_string(),
                flag: flag.to_string(),
            })
            .collect();
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(countries)
    }
}
