//! Country directory, ordering, and the filter/pagination engine.

pub mod collation;
pub mod directory;
pub mod filter;
pub mod models;

pub use directory::{CountryDirectory, CountrySource};
pub use filter::{CountrySearch, FilterQuery};
pub use models::{Country, CountryDetail, CountryResponse};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::models::{Country, CountryName, Flags};

    pub fn country(code: &str, name: &str, region: &str, capitals: &[&str]) -> Country {
        Country {
            name: CountryName {
                common: name.to_string(),
                official: name.to_string(),
            },
            capital: if capitals.is_empty() {
                None
            } else {
                Some(capitals.iter().map(|c| c.to_string()).collect())
            },
            region: region.to_string(),
            flags: Flags {
                png: format!("https://flags.test/{code}.png"),
                svg: format!("https://flags.test/{code}.svg"),
                alt: None,
            },
            cca3: code.to_string(),
        }
    }
}
