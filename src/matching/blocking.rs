// src/matching/blocking.rs

use log::info;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::NormalizedRecord;

/// Records sharing one blocking key. Only groups of two or more survive.
pub type Blocks<'a> = BTreeMap<String, Vec<&'a NormalizedRecord>>;

/// State placeholder so that stateless records can still block together.
const UNKNOWN_STATE: &str = "XX";

/// An unordered record pair, stored with the smaller `source_id` on the left.
#[derive(Debug, Clone, Copy)]
pub struct CandidatePair<'a> {
    pub left: &'a NormalizedRecord,
    pub right: &'a NormalizedRecord,
}

impl<'a> CandidatePair<'a> {
    /// Returns `None` for a record paired with itself.
    pub fn new(a: &'a NormalizedRecord, b: &'a NormalizedRecord) -> Option<Self> {
        match a.source_id.cmp(&b.source_id) {
            std::cmp::Ordering::Less => Some(Self { left: a, right: b }),
            std::cmp::Ordering::Greater => Some(Self { left: b, right: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn key(&self) -> (&'a str, &'a str) {
        (self.left.source_id.as_str(), self.right.source_id.as_str())
    }
}

/// American Soundex: first letter plus three digits. H and W do not separate
/// letters with the same code; vowels do. Non-ASCII-letters are ignored.
/// Returns `None` when the input has no ASCII letters.
pub fn soundex(name: &str) -> Option<String> {
    let letters: Vec<char> = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let (&first, rest) = letters.split_first()?;

    let code = |c: char| -> Option<char> {
        match c {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    };

    let mut result = String::with_capacity(4);
    result.push(first);
    let mut prev = code(first);

    for &c in rest {
        if result.len() >= 4 {
            break;
        }
        if c == 'H' || c == 'W' {
            continue;
        }
        let current = code(c);
        if let Some(digit) = current {
            if current != prev {
                result.push(digit);
            }
        }
        prev = current;
    }

    while result.len() < 4 {
        result.push('0');
    }
    Some(result)
}

fn state_key(record: &NormalizedRecord) -> String {
    record
        .state()
        .map(str::to_uppercase)
        .unwrap_or_else(|| UNKNOWN_STATE.to_string())
}

fn retain_multi(blocks: &mut Blocks<'_>) {
    blocks.retain(|_, members| members.len() >= 2);
}

fn group_by<'a, F>(records: &'a [NormalizedRecord], key_fn: F) -> Blocks<'a>
where
    F: Fn(&NormalizedRecord) -> Option<String>,
{
    let mut blocks: Blocks<'a> = BTreeMap::new();
    for record in records {
        if let Some(key) = key_fn(record) {
            blocks.entry(key).or_default().push(record);
        }
    }
    retain_multi(&mut blocks);
    blocks
}

/// Groups records sharing a well-formed NPI.
pub fn block_by_npi(records: &[NormalizedRecord]) -> Blocks<'_> {
    let blocks = group_by(records, |r| r.valid_npi().map(str::to_string));
    info!("NPI blocking: {} blocks from {} records", blocks.len(), records.len());
    blocks
}

/// Groups by upper-cased last name and state.
pub fn block_by_last_name_state(records: &[NormalizedRecord]) -> Blocks<'_> {
    let blocks = group_by(records, |r| {
        r.last_name()
            .map(|last| format!("{}|{}", last.to_uppercase(), state_key(r)))
    });
    info!("Last name + state blocking: {} blocks", blocks.len());
    blocks
}

/// Groups by Soundex code of the last name and state.
pub fn block_by_phonetic_state(records: &[NormalizedRecord]) -> Blocks<'_> {
    let blocks = group_by(records, |r| {
        r.last_name()
            .and_then(soundex)
            .map(|code| format!("{}|{}", code, state_key(r)))
    });
    info!("Soundex + state blocking: {} blocks", blocks.len());
    blocks
}

/// Groups by last name and first initial. Not part of the default candidate set.
pub fn block_by_last_name_first_initial(records: &[NormalizedRecord]) -> Blocks<'_> {
    let blocks = group_by(records, |r| {
        let last = r.last_name()?;
        let initial = r.first_name()?.chars().next()?;
        Some(format!(
            "{}|{}",
            last.to_uppercase(),
            initial.to_uppercase()
        ))
    });
    info!("Last name + first initial blocking: {} blocks", blocks.len());
    blocks
}

fn collect_pairs<'a>(
    blocks: &Blocks<'a>,
    seen: &mut BTreeSet<(&'a str, &'a str)>,
    pairs: &mut Vec<CandidatePair<'a>>,
) {
    for members in blocks.values() {
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                if let Some(pair) = CandidatePair::new(a, b) {
                    if seen.insert(pair.key()) {
                        pairs.push(pair);
                    }
                }
            }
        }
    }
}

/// Unions the default blocking passes into deduplicated candidate pairs,
/// sorted by `(left.source_id, right.source_id)`.
pub fn candidate_pairs(records: &[NormalizedRecord], use_phonetic: bool) -> Vec<CandidatePair<'_>> {
    let (npi_blocks, (name_blocks, phonetic_blocks)) = rayon::join(
        || block_by_npi(records),
        || {
            rayon::join(
                || block_by_last_name_state(records),
                || {
                    if use_phonetic {
                        block_by_phonetic_state(records)
                    } else {
                        BTreeMap::new()
                    }
                },
            )
        },
    );

    let mut seen = BTreeSet::new();
    let mut pairs = Vec::new();
    collect_pairs(&npi_blocks, &mut seen, &mut pairs);
    collect_pairs(&name_blocks, &mut seen, &mut pairs);
    collect_pairs(&phonetic_blocks, &mut seen, &mut pairs);

    pairs.sort_by(|a, b| a.key().cmp(&b.key()));
    info!("Generated {} candidate pairs", pairs.len());
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    fn rec(id: &str, last: &str, state: &str) -> NormalizedRecord {
        NormalizedRecord::new(SourceType::Claims, id, last).with_state(state)
    }

    #[test]
    fn test_soundex_codes() {
        assert_eq!(soundex("Robert").as_deref(), Some("R163"));
        assert_eq!(soundex("Rupert").as_deref(), Some("R163"));
        assert_eq!(soundex("Ashcraft").as_deref(), Some("A261"));
        assert_eq!(soundex("Tymczak").as_deref(), Some("T522"));
        assert_eq!(soundex("Pfister").as_deref(), Some("P236"));
        assert_eq!(soundex("Smith"), soundex("Smyth"));
        assert_eq!(soundex("O'Brien").as_deref(), Some("O165"));
        assert_eq!(soundex("Lee").as_deref(), Some("L000"));
        assert_eq!(soundex("'- "), None);
    }

    #[test]
    fn test_singleton_blocks_are_dropped() {
        let records = vec![rec("a", "Smith", "NY"), rec("b", "Jones", "NY")];
        assert!(block_by_last_name_state(&records).is_empty());
    }

    #[test]
    fn test_npi_blocks_ignore_malformed() {
        let records = vec![
            rec("a", "Smith", "NY").with_npi("123"),
            rec("b", "Jones", "CA").with_npi("123"),
            rec("c", "Brown", "TX").with_npi("1234567890"),
            rec("d", "Green", "FL").with_npi(" 1234567890"),
        ];
        let blocks = block_by_npi(&records);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks["1234567890"].len(), 2);
    }

    #[test]
    fn test_pairs_deduplicated_and_ordered() {
        let records = vec![
            rec("z", "Smith", "NY").with_npi("1234567890"),
            rec("a", "Smith", "NY").with_npi("1234567890"),
            rec("m", "Smyth", "NY"),
        ];
        let pairs = candidate_pairs(&records, true);
        let keys: Vec<_> = pairs.iter().map(|p| p.key()).collect();
        // a-z matched by three passes, m joins through soundex only
        assert_eq!(keys, vec![("a", "m"), ("a", "z"), ("m", "z")]);
    }

    #[test]
    fn test_phonetic_pass_can_be_disabled() {
        let records = vec![rec("a", "Smith", "NY"), rec("b", "Smyth", "NY")];
        assert_eq!(candidate_pairs(&records, true).len(), 1);
        assert!(candidate_pairs(&records, false).is_empty());
    }

    #[test]
    fn test_first_initial_blocking() {
        let records = vec![
            rec("a", "Smith", "NY").with_first_name("John"),
            rec("b", "SMITH", "CA").with_first_name("j."),
            rec("c", "Smith", "TX").with_first_name("Mary"),
            rec("d", "Smith", "TX"),
        ];
        let blocks = block_by_last_name_first_initial(&records);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks["SMITH|J"].len(), 2);
    }

    #[test]
    fn test_missing_state_blocks_together() {
        let records = vec![
            NormalizedRecord::new(SourceType::License, "a", "Patel"),
            NormalizedRecord::new(SourceType::Publication, "b", "patel"),
        ];
        let blocks = block_by_last_name_state(&records);
        assert!(blocks.contains_key("PATEL|XX"));
    }
}
