use crate::config::SearchSettings;
use crate::RequestError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Youngest age the directory can be searched for
pub const MIN_AGE: u8 = 14;

/// Oldest age the directory can be searched for
pub const MAX_AGE: u8 = 80;

/// Immutable input of one crawl
///
/// Cities are trimmed and de-duplicated keeping first-occurrence order;
/// blank cities and keywords are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    cities: Vec<String>,
    keywords: Vec<String>,
    age_from: u8,
    age_to: u8,
    check_recent_activity: bool,
}

impl SearchRequest {
    pub fn new(
        cities: &[String],
        keywords: &[String],
        age_from: u8,
        age_to: u8,
        check_recent_activity: bool,
    ) -> Result<Self, RequestError> {
        let mut seen = HashSet::new();
        let cities: Vec<String> = cities
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .filter(|c| seen.insert(c.to_string()))
            .map(str::to_string)
            .collect();

        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        if cities.is_empty() {
            return Err(RequestError::NoCities);
        }
        if keywords.is_empty() {
            return Err(RequestError::NoKeywords);
        }
        if age_from < MIN_AGE {
            return Err(RequestError::AgeTooLow {
                min: MIN_AGE,
                got: age_from,
            });
        }
        if age_to > MAX_AGE {
            return Err(RequestError::AgeTooHigh {
                max: MAX_AGE,
                got: age_to,
            });
        }
        if age_from > age_to {
            return Err(RequestError::AgeRangeInverted {
                from: age_from,
                to: age_to,
            });
        }

        Ok(Self {
            cities,
            keywords,
            age_from,
            age_to,
            check_recent_activity,
        })
    }

    pub fn from_settings(settings: &SearchSettings) -> Result<Self, RequestError> {
        Self::new(
            &settings.cities,
            &settings.keywords,
            settings.age_from,
            settings.age_to,
            settings.check_recent_activity,
        )
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Keywords lowercased once for matching
    pub fn keywords_lowercased(&self) -> Vec<String> {
        self.keywords.iter().map(|k| k.to_lowercase()).collect()
    }

    pub fn age_from(&self) -> u8 {
        self.age_from
    }

    pub fn age_to(&self) -> u8 {
        self.age_to
    }

    pub fn ages(&self) -> impl Iterator<Item = u8> {
        self.age_from..=self.age_to
    }

    pub fn check_recent_activity(&self) -> bool {
        self.check_recent_activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cities_deduplicated_in_order() {
        let request = SearchRequest::new(
            &strings(&["Springfield", " Shelbyville ", "Springfield", "", "Ogdenville"]),
            &strings(&["chess"]),
            18,
            20,
            false,
        )
        .unwrap();

        assert_eq!(
            request.cities(),
            &strings(&["Springfield", "Shelbyville", "Ogdenville"])[..]
        );
    }

    #[test]
    fn test_age_bounds() {
        let cities = strings(&["Springfield"]);
        let keywords = strings(&["chess"]);

        assert!(SearchRequest::new(&cities, &keywords, 14, 80, false).is_ok());
        assert_eq!(
            SearchRequest::new(&cities, &keywords, 13, 20, false),
            Err(RequestError::AgeTooLow { min: 14, got: 13 })
        );
        assert_eq!(
            SearchRequest::new(&cities, &keywords, 20, 81, false),
            Err(RequestError::AgeTooHigh { max: 80, got: 81 })
        );
        assert_eq!(
            SearchRequest::new(&cities, &keywords, 30, 20, false),
            Err(RequestError::AgeRangeInverted { from: 30, to: 20 })
        );
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert_eq!(
            SearchRequest::new(&strings(&[" "]), &strings(&["chess"]), 18, 20, false),
            Err(RequestError::NoCities)
        );
        assert_eq!(
            SearchRequest::new(&strings(&["Springfield"]), &[], 18, 20, false),
            Err(RequestError::NoKeywords)
        );
    }

    #[test]
    fn test_keywords_lowercased() {
        let request =
            SearchRequest::new(&strings(&["Springfield"]), &strings(&["ChEss", "GO"]), 18, 18, true)
                .unwrap();
        assert_eq!(request.keywords_lowercased(), strings(&["chess", "go"]));
        assert_eq!(request.ages().collect::<Vec<_>>(), vec![18]);
    }
}
