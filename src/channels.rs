//! Channel classification and ensemble grouping.
//!
//! Raw channel labels are classified by physiological role from their names
//! alone, de-duplicated by electrode base, split into EEG and EOG scoring
//! sets, and combined into channel groups.  One group is one ensemble member.
//!
//! ```text
//! ["C3-A2", "C4-A1", "EOG-L", "EOG-R", "EMG"]
//!   ├─ classify      C3-A2:EEG  C4-A1:EEG  EOG-L:EOG  EOG-R:EOG  EMG:OTHER
//!   ├─ select EOG    first of EOG / OC / E1 / E2 with any match → {EOG-L, EOG-R}
//!   └─ group [EEG, EOG]  → C3×L, C3×R, C4×L, C4×R
//! ```
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const MASTOIDS: [&str; 4] = ["A1", "A2", "M1", "M2"];
const EEG_BASES: [&str; 21] = [
    "FP1", "FP2", "F3", "F4", "C3", "C4", "P3", "P4", "O1", "O2", "F7", "F8", "T3", "T4", "T5",
    "T6", "FZ", "CZ", "PZ", "F1", "F2",
];
/// Extended 10-20 / 10-10 labels (mastoids included) used by the quality
/// ranking's name patterns.
pub const EEG_LABELS: &[&str] = &[
    "FP1", "FP2", "AF7", "AF3", "AF4", "AF8", "F7", "F5", "F3", "F1", "FZ", "F2", "F4", "F6", "F8",
    "FT7", "FC5", "FC3", "FC1", "FCZ", "FC2", "FC4", "FC6", "FT8", "T7", "C5", "C3", "C1", "CZ",
    "C2", "C4", "C6", "T8", "TP7", "CP5", "CP3", "CP1", "CPZ", "CP2", "CP4", "CP6", "TP8", "P7",
    "P5", "P3", "P1", "PZ", "P2", "P4", "P6", "P8", "PO7", "PO3", "POZ", "PO4", "PO8", "O1", "OZ",
    "O2", "FT9", "FT10", "TP9", "TP10", "AFZ", "FPZ", "A1", "A2", "M1", "M2",
];
const UNAMBIGUOUS_EOG: [&str; 5] = ["EOG", "LOC", "ROC", "E1", "E2"];
/// EOG selection preference, walked in order; the first hit wins.
const EOG_PREFERENCE: [&str; 4] = ["EOG", "OC", "E1", "E2"];
const NON_EEG: [&str; 3] = ["EMG", "ECG", "EKG"];
const ROLE_PREFIXES: [&str; 3] = ["EEG", "EOG", "EMG"];

/// Physiological role of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Eeg,
    Eog,
    Emg,
    Mastoid,
    Other,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Eeg => "EEG",
            Role::Eog => "EOG",
            Role::Emg => "EMG",
            Role::Mastoid => "MASTOID",
            Role::Other => "OTHER",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EEG" => Ok(Role::Eeg),
            "EOG" => Ok(Role::Eog),
            "EMG" => Ok(Role::Emg),
            "MASTOID" => Ok(Role::Mastoid),
            "OTHER" => Ok(Role::Other),
            other => Err(Error::Configuration(format!("unknown channel role '{other}'"))),
        }
    }
}

/// A channel label with the properties derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Label with surrounding whitespace removed.
    pub name: String,
    /// Upper-cased electrode label without role prefix or mastoid suffix.
    pub base: String,
    pub role: Role,
    /// The label carried an `A1|A2|M1|M2` reference suffix.
    pub has_mastoid_ref: bool,
}

/// One ensemble member: an ordered, duplicate-free set of channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelGroup {
    pub names: Vec<String>,
    /// Positions of `names` in [`ChannelPlan::load_list`].
    pub indices: Vec<usize>,
}

/// Result of channel planning for one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    /// Channels to load, de-duplicated.  Ordered as they are scored (every
    /// EEG channel, then the selected EOG channels), not by first appearance
    /// across groups.
    pub load_list: Vec<String>,
    pub groups: Vec<ChannelGroup>,
    pub has_eog: bool,
}

/// Classify a raw channel label.
///
/// ```
/// use hypnos::channels::{classify, Role};
///
/// let ch = classify("EEG C3-A2");
/// assert_eq!(ch.base, "C3");
/// assert_eq!(ch.role, Role::Eeg);
/// assert!(ch.has_mastoid_ref);
/// ```
pub fn classify(name: &str) -> Channel {
    let name = name.trim();
    let upper = name.to_ascii_uppercase();

    let unprefixed = strip_role_prefix(name);
    let (base, has_mastoid_ref) = strip_mastoid_suffix(unprefixed);
    let mut base = base.trim().to_ascii_uppercase();
    if MASTOIDS.contains(&upper.as_str()) {
        base = upper.clone();
    }

    let role = if UNAMBIGUOUS_EOG.iter().any(|p| upper.contains(p)) {
        Role::Eog
    } else if EEG_BASES.contains(&base.as_str())
        || (upper.contains("EEG") && !NON_EEG.iter().any(|o| upper.contains(o)))
    {
        Role::Eeg
    } else if MASTOIDS.contains(&base.as_str()) {
        Role::Mastoid
    } else {
        Role::Other
    };

    Channel { name: name.to_string(), base, role, has_mastoid_ref }
}

/// `EEG C3` → `C3`.  The prefix must be followed by whitespace.
fn strip_role_prefix(name: &str) -> &str {
    for prefix in ROLE_PREFIXES {
        let Some(head) = name.get(..prefix.len()) else { continue };
        if !head.eq_ignore_ascii_case(prefix) {
            continue;
        }
        let rest = &name[prefix.len()..];
        if let Some(ws) = rest.chars().next().filter(|c| c.is_whitespace()) {
            return &rest[ws.len_utf8()..];
        }
    }
    name
}

/// `C3-A2` → (`C3`, true).  Optional `:` or `-` separator, case-insensitive.
fn strip_mastoid_suffix(name: &str) -> (&str, bool) {
    let upper = name.to_ascii_uppercase();
    for m in MASTOIDS {
        if upper.ends_with(m) {
            let mut cut = name.len() - m.len();
            if name[..cut].ends_with([':', '-']) {
                cut -= 1;
            }
            return (&name[..cut], true);
        }
    }
    (name, false)
}

/// Keep one channel per electrode base.
///
/// EEG bases prefer the mastoid-referenced variant, EOG bases the
/// unreferenced one; the first variant wins when none matches.
fn dedup_by_base(channels: Vec<Channel>) -> Vec<Channel> {
    let mut by_base: Vec<(String, Vec<Channel>)> = Vec::new();
    for ch in channels {
        match by_base.iter_mut().find(|(b, _)| *b == ch.base) {
            Some((_, bucket)) => bucket.push(ch),
            None => by_base.push((ch.base.clone(), vec![ch])),
        }
    }

    by_base
        .into_iter()
        .map(|(_, mut candidates)| {
            if candidates.len() == 1 {
                return candidates.remove(0);
            }
            let want_ref = !candidates.iter().any(|c| c.role == Role::Eog);
            let pick = candidates
                .iter()
                .position(|c| c.has_mastoid_ref == want_ref)
                .unwrap_or(0);
            candidates.swap_remove(pick)
        })
        .collect()
}

/// Pick the EOG set: the first preference substring with any match selects
/// every matching candidate.  EEG channels serve as fallback candidates.
fn select_eog<'a>(eog: &[&'a Channel], eeg: &[&'a Channel]) -> Vec<&'a Channel> {
    let candidates: Vec<&Channel> = eog.iter().chain(eeg.iter()).copied().collect();
    for pref in EOG_PREFERENCE {
        let matches: Vec<&Channel> = candidates
            .iter()
            .copied()
            .filter(|c| c.name.to_ascii_uppercase().contains(pref))
            .collect();
        if !matches.is_empty() {
            return matches;
        }
    }
    Vec::new()
}

/// Classify `names`, choose scoring channels and build channel groups.
///
/// `grouping` is an ordered role spec such as `[EEG, EOG]`; each group takes
/// one channel per role (Cartesian product).  Roles with no available
/// channels are dropped.  `None` yields a single group holding every scoring
/// channel.
///
/// # Errors
///
/// [`Error::NoUsableChannels`] when no channel survives every fallback tier.
pub fn plan_channels(names: &[String], grouping: Option<&[Role]>) -> Result<ChannelPlan> {
    let unique = dedup_by_base(names.iter().map(|n| classify(n)).collect());

    let eeg: Vec<&Channel> = unique.iter().filter(|c| c.role == Role::Eeg).collect();
    let eog: Vec<&Channel> = unique.iter().filter(|c| c.role == Role::Eog).collect();
    let selected_eog = select_eog(&eog, &eeg);
    let eog_names: HashSet<&str> = selected_eog.iter().map(|c| c.name.as_str()).collect();
    let has_eog = !selected_eog.is_empty();

    let mut scoring: Vec<&Channel> = eeg
        .iter()
        .copied()
        .filter(|c| !eog_names.contains(c.name.as_str()))
        .chain(selected_eog.iter().copied())
        .collect();
    if scoring.is_empty() {
        debug!("no EEG/EOG channels, falling back to any recognised role");
        scoring = unique
            .iter()
            .filter(|c| !matches!(c.role, Role::Other | Role::Mastoid))
            .collect();
    }
    if scoring.is_empty() {
        debug!("no recognised roles, falling back to all channels");
        scoring = unique.iter().collect();
    }
    if scoring.is_empty() {
        return Err(Error::NoUsableChannels { channels: names.to_vec() });
    }

    let scoring_names: Vec<String> = scoring.iter().map(|c| c.name.clone()).collect();
    let member_lists: Vec<Vec<String>> = match grouping {
        Some(spec) => {
            let role_of = |name: &str| {
                if eog_names.contains(name) { Role::Eog } else { Role::Eeg }
            };
            let available = |role: Role| -> Vec<String> {
                scoring_names.iter().filter(|n| role_of(n.as_str()) == role).cloned().collect()
            };

            let spec: Vec<Role> = spec
                .iter()
                .copied()
                .filter(|r| *r != Role::Mastoid)
                .filter(|r| *r != Role::Eog || has_eog)
                .filter(|r| !available(*r).is_empty())
                .collect();

            if spec.is_empty() {
                Vec::new()
            } else {
                let per_role: Vec<Vec<String>> = spec.iter().map(|r| available(*r)).collect();
                let product = cartesian_product(&per_role);
                let repeated = spec.iter().collect::<HashSet<_>>().len() < spec.len();
                if repeated {
                    let unique_sets: BTreeSet<Vec<String>> = product
                        .into_iter()
                        .map(|mut g| {
                            g.sort();
                            g
                        })
                        .filter(|g| g.windows(2).all(|w| w[0] != w[1]))
                        .collect();
                    unique_sets.into_iter().collect()
                } else {
                    product
                }
            }
        }
        None => vec![scoring_names.clone()],
    };
    let member_lists = if member_lists.is_empty() {
        warn!("grouping spec yields no groups, scoring each channel on its own");
        scoring_names.iter().map(|n| vec![n.clone()]).collect()
    } else {
        member_lists
    };

    let used: HashSet<&str> = member_lists.iter().flatten().map(String::as_str).collect();
    let load_list: Vec<String> = scoring_names
        .iter()
        .filter(|n| used.contains(n.as_str()))
        .cloned()
        .collect();

    let groups: Vec<ChannelGroup> = member_lists
        .into_iter()
        .map(|names| {
            let indices = names
                .iter()
                .filter_map(|n| load_list.iter().position(|l| l == n))
                .collect();
            ChannelGroup { names, indices }
        })
        .collect();

    info!(
        "{} channel group(s) over {} channel(s), EOG {}",
        groups.len(),
        load_list.len(),
        if has_eog { "found" } else { "not found" }
    );
    Ok(ChannelPlan { load_list, groups, has_eog })
}

fn cartesian_product(lists: &[Vec<String>]) -> Vec<Vec<String>> {
    lists.iter().fold(vec![Vec::new()], |acc, list| {
        acc.into_iter()
            .flat_map(|prefix| {
                list.iter().map(move |item| {
                    let mut next = prefix.clone();
                    next.push(item.clone());
                    next
                })
            })
            .collect()
    })
}

/// Restrict `available` to the user's requested channel names.
///
/// Keeps recording order.  Requested names that are absent are logged and
/// ignored; if nothing matches, every available channel is returned.
pub fn select_requested(available: &[String], requested: Option<&[String]>) -> Vec<String> {
    let Some(requested) = requested else {
        return available.to_vec();
    };
    let wanted: Vec<&str> = requested.iter().map(|n| n.trim()).filter(|n| !n.is_empty()).collect();
    let wanted_set: HashSet<&str> = wanted.iter().copied().collect();

    let missing: Vec<&str> = wanted
        .iter()
        .copied()
        .filter(|w| !available.iter().any(|a| a == w))
        .collect();
    if !missing.is_empty() {
        warn!("requested channels not in recording, ignoring: {missing:?}");
    }

    let kept: Vec<String> = available
        .iter()
        .filter(|a| wanted_set.contains(a.as_str()))
        .cloned()
        .collect();
    if kept.is_empty() {
        warn!("none of the requested channels were found, using all channels");
        return available.to_vec();
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classify_strips_prefix_and_suffix() {
        let ch = classify("  EEG Fpz:M1 ");
        assert_eq!(ch.name, "EEG Fpz:M1");
        assert_eq!(ch.base, "FPZ");
        assert!(ch.has_mastoid_ref);
        // FPZ is not a listed base, but the label says EEG.
        assert_eq!(ch.role, Role::Eeg);
    }

    #[test]
    fn classify_prefix_needs_whitespace() {
        let ch = classify("EOG-L");
        assert_eq!(ch.base, "EOG-L");
        assert_eq!(ch.role, Role::Eog);
    }

    #[test]
    fn classify_roles() {
        assert_eq!(classify("C4").role, Role::Eeg);
        assert_eq!(classify("LOC").role, Role::Eog);
        assert_eq!(classify("E2-M1").role, Role::Eog);
        assert_eq!(classify("A1").role, Role::Mastoid);
        assert_eq!(classify("m2").base, "M2");
        assert_eq!(classify("EMG chin").role, Role::Other);
        assert_eq!(classify("EEG ECG").role, Role::Other);
        assert_eq!(classify("Resp").role, Role::Other);
    }

    #[test]
    fn dedup_prefers_referenced_eeg() {
        let plan = plan_channels(&names(&["C3", "C3-A2"]), None).unwrap();
        assert_eq!(plan.load_list, names(&["C3-A2"]));
    }

    #[test]
    fn dedup_prefers_unreferenced_eog() {
        let unique = dedup_by_base(vec![classify("EOG-A2"), classify("EOG")]);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].name, "EOG");
    }

    #[test]
    fn dedup_falls_back_to_first() {
        let unique = dedup_by_base(vec![classify("C3"), classify("EEG C3")]);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].name, "C3");
    }

    #[test]
    fn eeg_by_eog_product() {
        let plan = plan_channels(
            &names(&["C3-A2", "C4-A1", "EOG-L", "EOG-R", "EMG"]),
            Some([Role::Eeg, Role::Eog].as_slice()),
        )
        .unwrap();
        assert!(plan.has_eog);
        assert_eq!(plan.load_list, names(&["C3-A2", "C4-A1", "EOG-L", "EOG-R"]));
        let groups: Vec<Vec<String>> = plan.groups.iter().map(|g| g.names.clone()).collect();
        assert_eq!(
            groups,
            vec![
                names(&["C3-A2", "EOG-L"]),
                names(&["C3-A2", "EOG-R"]),
                names(&["C4-A1", "EOG-L"]),
                names(&["C4-A1", "EOG-R"]),
            ]
        );
        assert_eq!(plan.groups[1].indices, vec![0, 3]);
        assert_eq!(plan.groups[2].indices, vec![1, 2]);
    }

    #[test]
    fn eog_preference_order() {
        // No "EOG" substring: "OC" picks LOC and ROC, E1 is left as EOG-classified
        // but unselected and therefore not scored.
        let plan = plan_channels(
            &names(&["C4-M1", "LOC", "ROC", "E1"]),
            Some([Role::Eeg, Role::Eog].as_slice()),
        )
        .unwrap();
        assert_eq!(plan.load_list, names(&["C4-M1", "LOC", "ROC"]));
        assert_eq!(plan.groups.len(), 2);
    }

    #[test]
    fn missing_eog_collapses_to_eeg() {
        let plan =
            plan_channels(&names(&["C3-A2", "C4-A1", "A1"]), Some([Role::Eeg, Role::Eog].as_slice()))
                .unwrap();
        assert!(!plan.has_eog);
        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.groups[0].names, names(&["C3-A2"]));
        assert_eq!(plan.groups[1].names, names(&["C4-A1"]));
    }

    #[test]
    fn repeated_role_deduplicates_sets() {
        let plan =
            plan_channels(&names(&["C3", "C4", "O1"]), Some([Role::Eeg, Role::Eeg].as_slice())).unwrap();
        let groups: Vec<Vec<String>> = plan.groups.iter().map(|g| g.names.clone()).collect();
        assert_eq!(
            groups,
            vec![names(&["C3", "C4"]), names(&["C3", "O1"]), names(&["C4", "O1"])]
        );
    }

    #[test]
    fn repeated_role_single_channel_scores_alone() {
        let plan = plan_channels(&names(&["C3"]), Some([Role::Eeg, Role::Eeg].as_slice())).unwrap();
        assert_eq!(plan.load_list, names(&["C3"]));
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].names, names(&["C3"]));
        assert_eq!(plan.groups[0].indices, vec![0]);
    }

    #[test]
    fn no_spec_single_group() {
        let plan = plan_channels(&names(&["eegl", "eegr"]), None).unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].names, names(&["eegl", "eegr"]));
        assert_eq!(plan.groups[0].indices, vec![0, 1]);
    }

    #[test]
    fn fallback_to_all_channels() {
        let plan = plan_channels(&names(&["Resp", "Pleth"]), Some([Role::Eeg].as_slice())).unwrap();
        assert_eq!(plan.load_list, names(&["Resp", "Pleth"]));
        assert_eq!(plan.groups.len(), 2);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = plan_channels(&[], Some([Role::Eeg].as_slice())).unwrap_err();
        assert!(matches!(err, Error::NoUsableChannels { .. }));
    }

    #[test]
    fn requested_channels_filter() {
        let avail = names(&["C3", "C4", "EOG"]);
        let req = names(&["EOG", " C3 ", "X9"]);
        assert_eq!(select_requested(&avail, Some(req.as_slice())), names(&["C3", "EOG"]));
        assert_eq!(select_requested(&avail, Some(names(&["nope"]).as_slice())), avail);
        assert_eq!(select_requested(&avail, None), avail);
    }

    #[test]
    fn role_parse() {
        assert_eq!("eog".parse::<Role>().unwrap(), Role::Eog);
        assert!("ecg".parse::<Role>().is_err());
    }
}
