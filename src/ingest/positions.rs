// Position decoding and per-position fan-out.
//
// The export packs positional ability into compact notation such as
// "M/AM (LC)": slash-separated base roles crossed with the side letters in
// parentheses. Decoding expands that to concrete codes, and fan-out turns
// one profile into one independent row per code.

use crate::ingest::record::{Category, Profile, ProfileDraft};
use crate::ingest::IngestError;

/// Every concrete position code, in ordinal order. The index is the stored
/// position id.
pub const POSITION_CODES: [&str; 14] = [
    "GK", "DC", "DR", "DL", "WBR", "DM", "WBL", "MR", "MC", "ML", "AMR", "AMC", "AML", "STC",
];

/// Ordinal for a concrete position code.
pub fn position_ordinal(code: &str) -> Option<u8> {
    POSITION_CODES
        .iter()
        .position(|c| *c == code)
        .map(|i| i as u8)
}

fn position_err(raw: &str, reason: &str) -> IngestError {
    IngestError::FieldParse {
        group: Category::Profile,
        field: "position".to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}

/// Decode compact position notation into concrete codes.
///
/// `"M/AM (LC)"` → `["ML", "MC", "AML", "AMC"]`; a segment without side
/// letters stands alone (`"GK"` → `["GK"]`). Comma-separated segments are
/// decoded independently and concatenated.
pub fn decode_positions(raw: &str) -> Result<Vec<String>, IngestError> {
    let mut codes = Vec::new();

    for segment in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (base_part, sides) = match segment.split_once('(') {
            Some((bases, rest)) => {
                let inner = rest
                    .split_once(')')
                    .ok_or_else(|| position_err(raw, "unclosed side group"))?
                    .0;
                let sides: Vec<char> = inner.chars().filter(|c| c.is_ascii_uppercase()).collect();
                if sides.is_empty() {
                    return Err(position_err(raw, "empty side group"));
                }
                (bases, sides)
            }
            None => (segment, Vec::new()),
        };

        let bases: Vec<&str> = base_part
            .split('/')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .collect();
        if bases.is_empty() {
            return Err(position_err(raw, "no base role"));
        }

        for base in bases {
            if !base.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(position_err(raw, "base role is not an upper-case code"));
            }
            if sides.is_empty() {
                codes.push(base.to_string());
            } else {
                for side in &sides {
                    codes.push(format!("{base}{side}"));
                }
            }
        }
    }

    if codes.is_empty() {
        return Err(position_err(raw, "no positions decoded"));
    }
    Ok(codes)
}

/// Expand one profile draft into one independent `Profile` per position
/// code. Every other field is copied unchanged; outputs share no storage, so
/// mutating one row never affects another.
pub fn fan_out(draft: ProfileDraft) -> Result<Vec<Profile>, IngestError> {
    let mut profiles = Vec::with_capacity(draft.positions.len());
    for code in &draft.positions {
        let position_id = position_ordinal(code)
            .ok_or_else(|| position_err(code, "unknown position code"))?;
        profiles.push(Profile {
            position: code.clone(),
            position_id,
            age: draft.age,
            division: draft.division,
            club: draft.club,
            nat: draft.nat,
            eligible: draft.eligible,
            right_foot: draft.right_foot,
            left_foot: draft.left_foot,
            mins: draft.mins,
        });
    }
    Ok(profiles)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(positions: &[&str]) -> ProfileDraft {
        ProfileDraft {
            age: 24,
            positions: positions.iter().map(|p| p.to_string()).collect(),
            division: 0,
            club: 0,
            nat: 0,
            eligible: 1,
            right_foot: 5,
            left_foot: 3,
            mins: 1800,
        }
    }

    #[test]
    fn decodes_cross_product_of_bases_and_sides() {
        assert_eq!(
            decode_positions("M/AM (LC)").unwrap(),
            vec!["ML", "MC", "AML", "AMC"]
        );
    }

    #[test]
    fn decodes_bare_code() {
        assert_eq!(decode_positions("GK").unwrap(), vec!["GK"]);
    }

    #[test]
    fn decodes_single_base_with_three_sides() {
        assert_eq!(decode_positions("D (RLC)").unwrap(), vec!["DR", "DL", "DC"]);
    }

    #[test]
    fn decodes_comma_separated_segments() {
        assert_eq!(
            decode_positions("ST (C), M (C)").unwrap(),
            vec!["STC", "MC"]
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_positions("").is_err());
        assert!(decode_positions("M (").is_err());
        assert!(decode_positions("(LC)").is_err());
    }

    #[test]
    fn ordinals_follow_the_code_table() {
        assert_eq!(position_ordinal("GK"), Some(0));
        assert_eq!(position_ordinal("STC"), Some(13));
        assert_eq!(position_ordinal("XX"), None);
    }

    #[test]
    fn fan_out_produces_independent_rows() {
        let rows = fan_out(draft(&["ML", "MC"])).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].position, "ML");
        assert_eq!(rows[1].position, "MC");
        assert_eq!(rows[0].mins, rows[1].mins);

        // Mutating one output must not affect the other.
        let mut a = rows[0].clone();
        a.mins = 0;
        a.position.push('X');
        assert_eq!(rows[0].mins, 1800);
        assert_eq!(rows[1].position, "MC");
    }

    #[test]
    fn fan_out_rejects_unknown_code() {
        let err = fan_out(draft(&["QB"])).unwrap_err();
        assert!(matches!(err, IngestError::FieldParse { .. }));
    }
}
