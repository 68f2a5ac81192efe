use regex::Regex;
use std::cmp::Ordering;

use super::registry::SortOrder;
use crate::values::{RankType, SingleData};

/// Stable sort by rank. Series without scalar samples rank 0.
pub fn sort_by_rank(data: Vec<SingleData>, rank: RankType, order: SortOrder) -> Vec<SingleData> {
    let mut ranked: Vec<(f64, SingleData)> = data
        .into_iter()
        .map(|sd| (sd.values.rank(rank), sd))
        .collect();

    ranked.sort_by(|(a, _), (b, _)| {
        let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    ranked.into_iter().map(|(_, sd)| sd).collect()
}

pub fn top(data: Vec<SingleData>, number: usize, rank: RankType) -> Vec<SingleData> {
    let mut sorted = sort_by_rank(data, rank, SortOrder::Desc);
    sorted.truncate(number);
    sorted
}

pub fn bottom(data: Vec<SingleData>, number: usize, rank: RankType) -> Vec<SingleData> {
    let mut sorted = sort_by_rank(data, rank, SortOrder::Asc);
    sorted.truncate(number);
    sorted
}

/// Drops every series whose display name matches `pattern`.
pub fn exclude(mut data: Vec<SingleData>, pattern: &Regex) -> Vec<SingleData> {
    data.retain(|sd| !pattern.is_match(&sd.name));
    data
}
