//! Field-level merge of a validated draft into the tracker table.

use crate::{
    keys,
    models::{
        record::normalize_round_cell, JobStatus, RoundInput, TrackerRecord, ValidDraft, WriteMode,
    },
    utils::time::advance_past,
};

/// Index of the most recently appended row answering to `key`.
pub fn find_latest(records: &[TrackerRecord], key: &str) -> Option<usize> {
    records
        .iter()
        .rposition(|record| record.effective_key().as_deref() == Some(key))
}

/// Index of the most recently appended row whose `job_url` canonicalizes to
/// `canonical`.
fn find_latest_by_url(records: &[TrackerRecord], canonical: &str) -> Option<usize> {
    if canonical.is_empty() {
        return None;
    }
    records.iter().rposition(|record| {
        !record.job_url.trim().is_empty() && keys::canonical_url(&record.job_url) == canonical
    })
}

/// Row a caller-supplied lookup refers to: an exact key match, else the
/// canonical url form as a key, else a row carrying that url.
pub fn find_for_lookup(records: &[TrackerRecord], raw: &str) -> Option<usize> {
    let raw = raw.trim();
    find_latest(records, raw).or_else(|| {
        let canonical = keys::canonical_url(raw);
        find_latest(records, &canonical).or_else(|| find_latest_by_url(records, &canonical))
    })
}

/// Row a validated draft merges into: its key, else a row with the same
/// canonical url.
fn find_for_draft(records: &[TrackerRecord], valid: &ValidDraft) -> Option<usize> {
    find_latest(records, &valid.key).or_else(|| {
        let url = valid.draft.job_url.as_deref()?;
        find_latest_by_url(records, &keys::canonical_url(url))
    })
}

fn overlay(target: &mut String, incoming: Option<&String>) {
    if let Some(value) = incoming {
        if !value.trim().is_empty() {
            target.clone_from(value);
        }
    }
}

fn round_cell(target: &mut String, incoming: Option<&RoundInput>) {
    let canonical = match incoming {
        Some(input) => input.canonical(),
        None => normalize_round_cell(target),
    };
    *target = canonical.to_string();
}

/// Merge `valid` over `existing` (if any) at time `now`.
pub fn merge(existing: Option<&TrackerRecord>, valid: &ValidDraft, now: &str) -> TrackerRecord {
    let draft = &valid.draft;
    let mut record = existing.cloned().unwrap_or_default();

    // A row matched through its url keeps the key it was first tracked under.
    if record.job_key.trim().is_empty() {
        record.job_key.clone_from(&valid.key);
    }
    overlay(&mut record.job_id, draft.job_id.as_ref());
    overlay(&mut record.company, draft.company.as_ref());
    overlay(&mut record.position, draft.position.as_ref());
    overlay(&mut record.location, draft.location.as_ref());
    overlay(&mut record.job_url, draft.job_url.as_ref());
    overlay(&mut record.notes, draft.notes.as_ref());

    let status = match draft.status.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => JobStatus::normalize(raw),
        _ => JobStatus::normalize(&record.status),
    };
    record.status = status.as_str().to_string();

    round_cell(&mut record.round1_pass, draft.round1_pass.as_ref());
    round_cell(&mut record.round2_pass, draft.round2_pass.as_ref());
    round_cell(&mut record.round3_pass, draft.round3_pass.as_ref());

    if record.created_at.trim().is_empty() {
        record.created_at = now.to_string();
    }
    record.updated_at = advance_past(&record.updated_at, now);

    // First arrival in a status stamps it; later re-entries keep history.
    if record.status_timestamp(status).trim().is_empty() {
        *record.status_timestamp_mut(status) = now.to_string();
    }

    record
}

/// Apply `valid` to `records` in `mode` and return the written row.
pub fn apply(
    records: &mut Vec<TrackerRecord>,
    valid: &ValidDraft,
    mode: WriteMode,
    now: &str,
) -> TrackerRecord {
    let latest = find_for_draft(records, valid);
    let merged = merge(latest.map(|index| &records[index]), valid, now);

    match (mode, latest) {
        (WriteMode::Replace, Some(index)) => records[index] = merged.clone(),
        _ => records.push(merged.clone()),
    }
    merged
}
