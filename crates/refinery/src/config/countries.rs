//! Store code to country code lookup.

use std::collections::HashMap;

use indexmap::IndexMap;

use medallion_core::error::ConfigError;

const BUILTIN: &[(&str, &[&str])] = &[
    ("AUS", &["SYD01", "MEL01", "BNE02", "MEL02", "PER01", "CBR01"]),
    ("NZL", &["AKL01", "AKL02", "WLG01"]),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryMap {
    stores: HashMap<String, String>,
}

impl CountryMap {
    /// Australian and New Zealand stores of the sample retail chain.
    pub fn builtin() -> Self {
        let stores = BUILTIN
            .iter()
            .flat_map(|(country, stores)| {
                stores
                    .iter()
                    .map(move |store| (store.to_string(), country.to_string()))
            })
            .collect();
        Self { stores }
    }

    /// Invert a `country -> [store]` map. A store listed under two countries is an error.
    pub fn from_config(countries: &IndexMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut stores: HashMap<String, String> = HashMap::new();
        for (country, codes) in countries {
            for store in codes {
                match stores.get(store) {
                    Some(first) if first != country => {
                        return Err(ConfigError::AmbiguousStoreCountry {
                            store: store.clone(),
                            first: first.clone(),
                            second: country.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        stores.insert(store.clone(), country.clone());
                    }
                }
            }
        }
        Ok(Self { stores })
    }

    pub fn country_of(&self, store: &str) -> Option<&str> {
        self.stores.get(store).map(String::as_str)
    }
}
