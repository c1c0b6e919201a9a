use crate::profile::SelectedPersonalization;

use super::models::{
    Entry, EntryRef, ExperienceComponent, ExperienceEntry, PERSONALIZATION_META_FIELD,
};

/// Result of [`resolve`]: the entry to render and, when a selection applied, the selection that
/// produced it (also present when the selection assigned the baseline, so view tracking can
/// report `variantIndex` 0 against the right experience).
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub entry: Entry,
    pub personalization: Option<SelectedPersonalization>,
}

/// Why resolution fell back to the baseline. Everything except `Baseline` maps the input
/// through unchanged with no selection attached.
enum Fallback {
    NoSelections,
    NoExperiencesField,
    NoMatchingExperience,
    Baseline(SelectedPersonalization),
    NoValidReplacement,
}

/// Pick the content variant to render for `entry` given the visitor's server-computed selection
/// set.
///
/// Pure and deterministic: the same `(entry, selections)` pair always yields the same output,
/// and the only side effect is logging. Every fallback path returns the input entry unchanged;
/// resolution never fails.
///
/// Experience matching is first-match-wins over the entry's linked experiences. The selection
/// array is assumed to never contain two experiences simultaneously targeting the same baseline
/// entry (the server resolves such conflicts); this function does not defend against that case.
pub fn resolve(entry: Entry, selections: &[SelectedPersonalization]) -> Resolution {
    match try_resolve(&entry, selections) {
        Ok((resolved, selection)) => {
            log::debug!(target: "attune",
                        entry_id = entry.id,
                        resolved_id = resolved.id,
                        experience_id = selection.experience_id,
                        variant_index = selection.variant_index;
                        "resolved personalized variant");
            Resolution {
                entry: resolved,
                personalization: Some(selection),
            }
        }
        Err(Fallback::Baseline(selection)) => {
            // Logged distinctly from "no match": the visitor *is* in the experience, in the
            // control group.
            log::debug!(target: "attune",
                        entry_id = entry.id,
                        experience_id = selection.experience_id;
                        "selection assigns baseline variant");
            Resolution {
                entry,
                personalization: Some(selection),
            }
        }
        Err(fallback) => {
            match fallback {
                Fallback::NoSelections => {
                    log::trace!(target: "attune", entry_id = entry.id;
                                "no active personalizations for visitor");
                }
                Fallback::NoExperiencesField => {
                    log::trace!(target: "attune", entry_id = entry.id;
                                "entry carries no personalization experiences");
                }
                Fallback::NoMatchingExperience => {
                    log::debug!(target: "attune", entry_id = entry.id;
                                "no selection matches the entry's linked experiences");
                }
                Fallback::NoValidReplacement => {
                    log::debug!(target: "attune", entry_id = entry.id;
                                "no valid replacement variant");
                }
                Fallback::Baseline(_) => unreachable!("handled above"),
            }
            Resolution {
                entry,
                personalization: None,
            }
        }
    }
}

fn try_resolve(
    entry: &Entry,
    selections: &[SelectedPersonalization],
) -> Result<(Entry, SelectedPersonalization), Fallback> {
    if selections.is_empty() {
        return Err(Fallback::NoSelections);
    }

    let experiences = entry
        .experiences
        .as_ref()
        .ok_or(Fallback::NoExperiencesField)?;

    // First well-formed experience with a matching selection wins, in entry order.
    let (experience, selection) = experiences
        .iter()
        .filter_map(|e| e.as_parsed())
        .filter(|experience| {
            let well_formed = experience.is_well_formed();
            if !well_formed {
                log::debug!(target: "attune",
                            entry_id = entry.id,
                            experience_id = experience.id;
                            "variant count does not match distribution, skipping experience");
            }
            well_formed
        })
        .find_map(|experience| {
            selections
                .iter()
                .find(|s| s.experience_id == experience.id)
                .map(|s| (experience, s))
        })
        .ok_or(Fallback::NoMatchingExperience)?;

    if selection.is_baseline() {
        return Err(Fallback::Baseline(selection.clone()));
    }

    let variant_ref = replacement_variants(experience, &entry.id)
        .and_then(|variants| variants.get(selection.variant_index as usize - 1))
        .ok_or(Fallback::NoValidReplacement)?;

    let variant_entry = experience
        .variants
        .iter()
        .filter_map(|v| v.as_parsed())
        .find(|v| v.id == variant_ref.id)
        .cloned()
        .ok_or(Fallback::NoValidReplacement)?;

    Ok((decorate(variant_entry, selection), selection.clone()))
}

/// Variant refs of the replacement component whose non-hidden baseline is `entry_id`.
fn replacement_variants<'a>(
    experience: &'a ExperienceEntry,
    entry_id: &str,
) -> Option<&'a [EntryRef]> {
    experience
        .config
        .components
        .iter()
        .filter_map(|c| c.as_parsed())
        .find_map(|component| match component {
            ExperienceComponent::EntryReplacement { baseline, variants }
                if !baseline.hidden && baseline.id == entry_id =>
            {
                Some(variants.as_slice())
            }
            _ => None,
        })
}

/// Record the selection metadata on the resolved entry so renderers can read which
/// personalization and variant produced it.
fn decorate(mut entry: Entry, selection: &SelectedPersonalization) -> Entry {
    entry.fields.insert(
        PERSONALIZATION_META_FIELD.to_owned(),
        serde_json::json!({
            "experienceId": selection.experience_id,
            "variantIndex": selection.variant_index,
            "sticky": selection.sticky,
        }),
    );
    entry
}
