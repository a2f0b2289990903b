use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use log::{info, warn};

use crate::loader::{AttributeValue, FeatureCollection};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum YearKey {
    Year(i64),
    /// year text that is not an integer, kept verbatim
    Label(String),
    /// consecutive years merged into one group, first and last year
    Period(Box<YearKey>, Box<YearKey>),
    AllYears,
}

impl YearKey {
    pub fn from_attribute(value: &AttributeValue) -> Option<YearKey> {
        match value {
            AttributeValue::Integer(i) => Some(YearKey::Year(*i)),
            AttributeValue::Real(r) if r.is_finite() && r.fract() == 0.0 => {
                Some(YearKey::Year(*r as i64))
            }
            AttributeValue::Real(r) if r.is_finite() => Some(YearKey::Label(r.to_string())),
            AttributeValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else if let Ok(year) = s.parse::<i64>() {
                    Some(YearKey::Year(year))
                } else {
                    Some(YearKey::Label(s.to_string()))
                }
            }
            _ => None,
        }
    }

    /// Sub directory the group's rasters go in, `None` writes into the output root
    pub fn dir_name(&self) -> Option<String> {
        match self {
            YearKey::AllYears => None,
            YearKey::Period(first, last) => Some(format!("Period_{}_{}", first, last)),
            key => Some(format!("Year_{}", key)),
        }
    }
}

impl fmt::Display for YearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearKey::Year(y) => write!(f, "{}", y),
            YearKey::Label(l) => write!(f, "{}", l),
            YearKey::Period(first, last) => write!(f, "{} - {}", first, last),
            YearKey::AllYears => write!(f, "all years"),
        }
    }
}

/// Features of one year, as indices into the collection in feature order
#[derive(Debug, Clone, PartialEq)]
pub struct YearGroup {
    pub key: YearKey,
    pub members: Vec<usize>,
}

pub fn partition_by_year(
    collection: &FeatureCollection,
    year_column: &str,
    split: bool,
) -> Vec<YearGroup> {
    if !split {
        return vec![YearGroup {
            key: YearKey::AllYears,
            members: (0..collection.features.len()).collect(),
        }];
    }

    let mut groups: BTreeMap<YearKey, Vec<usize>> = BTreeMap::new();
    for (idx, feature) in collection.features.iter().enumerate() {
        match YearKey::from_attribute(feature.attribute(year_column)) {
            Some(key) => groups.entry(key).or_default().push(idx),
            None => warn!("Feature {} has no {} value, dropping it", idx, year_column),
        }
    }

    if let (Some(first), Some(last)) = (groups.keys().next(), groups.keys().next_back()) {
        info!("Found {} unique years: {} - {}", groups.len(), first, last);
    }

    groups
        .into_iter()
        .map(|(key, members)| YearGroup { key, members })
        .collect()
}

/// Merges sorted year groups into `count` periods of consecutive years.
///
/// The first `len % count` periods get one year more than the others. Asking
/// for more periods than there are years gives one period per year.
pub fn group_years(groups: Vec<YearGroup>, count: usize) -> Vec<YearGroup> {
    let count = count.clamp(1, groups.len().max(1));
    let per_period = groups.len() / count;
    let remainder = groups.len() % count;

    let mut periods = Vec::with_capacity(count);
    let mut years = groups.into_iter();
    for i in 0..count {
        let size = per_period + usize::from(i < remainder);
        let chunk = years.by_ref().take(size).collect_vec();
        let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
            continue;
        };
        let key = YearKey::Period(Box::new(first.key.clone()), Box::new(last.key.clone()));

        // feature order decides which feature is burned last
        let mut members = chunk.iter().flat_map(|g| g.members.iter().copied()).collect_vec();
        members.sort_unstable();

        info!("{}: {} years, {} features", key, chunk.len(), members.len());
        periods.push(YearGroup { key, members });
    }
    periods
}
