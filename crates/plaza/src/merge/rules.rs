//! Per-field conflict resolution.

use crate::models::{RawArea, RawStore};

use super::Observation;

/// Keep the larger of two values. Values that are not equal to themselves
/// (NaN) never win.
pub(crate) fn take_max<T: PartialOrd + Copy>(current: &mut Option<T>, incoming: Option<T>) {
    let Some(value) = incoming else { return };
    if value.partial_cmp(&value).is_none() {
        return;
    }
    match current {
        Some(existing) if *existing >= value => {}
        _ => *current = Some(value),
    }
}

/// Keep the first non-null value.
pub(crate) fn first_present<T>(current: &mut Option<T>, incoming: Option<T>) {
    if current.is_none() {
        *current = incoming;
    }
}

/// Like [`first_present`], treating blank strings as absent.
pub(crate) fn first_text(current: &mut Option<String>, incoming: Option<String>) {
    if current.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        return;
    }
    if let Some(text) = incoming.filter(|s| !s.trim().is_empty()) {
        *current = Some(text);
    }
}

/// Keep the longest non-empty text; ties keep the existing value.
pub(crate) fn longest_text(current: &mut Option<String>, incoming: Option<String>) {
    let Some(text) = incoming.filter(|s| !s.trim().is_empty()) else {
        return;
    };
    let existing_len = current
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.chars().count())
        .unwrap_or(0);
    if text.chars().count() > existing_len {
        *current = Some(text);
    }
}

/// Order-preserving set union.
pub(crate) fn union_into(current: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !current.contains(&item) {
            current.push(item);
        }
    }
}

impl Observation for RawArea {
    fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn position(&self) -> Option<crate::models::Coordinates> {
        self.coordinates
    }

    fn absorb(&mut self, other: Self) {
        first_text(&mut self.name, other.name);
        first_present(&mut self.kind, other.kind);
        first_text(&mut self.tier, other.tier);
        first_present(&mut self.coordinates, other.coordinates);
        take_max(&mut self.hot_value, other.hot_value);
        first_present(&mut self.avg_consumption, other.avg_consumption);
        first_present(&mut self.customer_flow, other.customer_flow);
        first_present(&mut self.store_count, other.store_count);
        take_max(&mut self.rating, other.rating);
        first_text(&mut self.address, other.address);
        longest_text(&mut self.description, other.description);
        union_into(&mut self.facilities, other.facilities);
        union_into(&mut self.transportation, other.transportation);
        union_into(&mut self.tags, other.tags);
        union_into(&mut self.sources, other.sources);
    }

    fn attribute(&mut self, source: &str) {
        union_into(&mut self.sources, vec![source.to_string()]);
    }
}

impl Observation for RawStore {
    fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn position(&self) -> Option<crate::models::Coordinates> {
        self.coordinates
    }

    fn absorb(&mut self, other: Self) {
        first_text(&mut self.name, other.name);
        first_present(&mut self.category, other.category);
        first_text(&mut self.sub_category, other.sub_category);
        first_present(&mut self.coordinates, other.coordinates);
        take_max(&mut self.rating, other.rating);
        take_max(&mut self.review_count, other.review_count);
        first_present(&mut self.avg_price, other.avg_price);
        first_text(&mut self.phone, other.phone);
        first_text(&mut self.address, other.address);
        first_text(&mut self.opening_hours, other.opening_hours);
        longest_text(&mut self.description, other.description);
        union_into(&mut self.facilities, other.facilities);
        union_into(&mut self.tags, other.tags);
        first_present(&mut self.recommended, other.recommended);
        union_into(&mut self.sources, other.sources);
    }

    fn attribute(&mut self, source: &str) {
        union_into(&mut self.sources, vec![source.to_string()]);
    }
}
