// Per-category field cleaning.
//
// Everything here is a deterministic pure function over one field or one
// group, except value obfuscation, which is random by design. The only
// silent coercions are the documented sentinels: `-` for an unavailable
// statistic, minute count, date or fee, `N/A` for an unavailable wage, and
// an empty extension column. Anything else that fails to coerce is a fatal
// parse failure for the record.

use std::collections::HashMap;

use rand::Rng;

use crate::ingest::interner::{Dimension, Interner};
use crate::ingest::positions::{decode_positions, fan_out};
use crate::ingest::record::{
    AttributeSet, Category, Contract, Identity, Profile, ProfileDraft, Rating, StatLine,
};
use crate::ingest::IngestError;

/// The export's marker for a value the game could not provide.
const UNAVAILABLE: &str = "-";

// ---------------------------------------------------------------------------
// Header aliasing
// ---------------------------------------------------------------------------

/// Map a raw header to its canonical field name.
///
/// The export abbreviates aggressively and re-uses punctuation that is
/// invalid in column names; this table fixes the known quirks. Unmapped
/// headers pass through lower-cased. Canonical names are never alias keys,
/// so applying the mapping twice equals applying it once.
pub fn canonical_field(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "aer a/90" => "aer_a",
        "hdrs w/90" => "hdrs_w",
        "blk/90" => "blk",
        "clr/90" => "clr",
        "tck/90" => "tck_c",
        "pres a/90" => "pres_a",
        "pres c/90" => "pres_c",
        "int/90" => "interceptions",
        "sprints/90" => "sprints",
        "poss lost/90" => "poss_lost",
        "poss won/90" => "poss_won",
        "drb/90" => "drb",
        "op-crs a/90" => "op_crs_a",
        "op-crs c/90" => "op_crs_c",
        "ps a/90" => "ps_a",
        "ps c/90" => "ps_c",
        "pr passes/90" => "pr_passes",
        "op-kp/90" => "op_kp",
        "ch c/90" => "ch_c",
        "xa/90" => "xa",
        "shot/90" => "shot",
        "sht/90" => "sht",
        "np-xg/90" => "np_xg",
        "dec" => "decisions",
        "1v1" => "one_v_one",
        "l th" => "long_throws",
        "right foot" => "right_foot",
        "left foot" => "left_foot",
        "begins" => "begin_date",
        "expires" => "expiry_date",
        "opt ext by club" => "extension",
        "min fee rls" => "release_clause",
        "str" => "strength",
        _ => return lower,
    };
    canonical.to_string()
}

// ---------------------------------------------------------------------------
// Field-level cleaners
// ---------------------------------------------------------------------------

fn field_err(group: Category, field: &str, value: &str, reason: impl Into<String>) -> IngestError {
    IngestError::FieldParse {
        group,
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Remove and return a required field from a group's field map.
pub(crate) fn take_field(
    group: Category,
    fields: &mut HashMap<String, String>,
    name: &str,
) -> Result<String, IngestError> {
    fields
        .remove(name)
        .ok_or_else(|| IngestError::Format(format!("{group} group is missing column `{name}`")))
}

/// A raw text field, trimmed and passed through.
pub(crate) fn text_value(
    _group: Category,
    _field: &str,
    raw: String,
) -> Result<String, IngestError> {
    Ok(raw.trim().to_string())
}

/// A numeric statistic: `f64`, with the unavailable marker meaning 0.0.
pub(crate) fn stat_value(group: Category, field: &str, raw: String) -> Result<f64, IngestError> {
    let raw = raw.trim();
    if raw == UNAVAILABLE {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .map_err(|e| field_err(group, field, raw, e.to_string()))
}

/// An integer buried in locale separators or currency glyphs: keep the
/// digits, drop everything else.
pub fn digits_to_int(group: Category, field: &str, raw: &str) -> Result<i64, IngestError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(field_err(group, field, raw, "no digits found"));
    }
    digits
        .parse::<i64>()
        .map_err(|e| field_err(group, field, raw, e.to_string()))
}

/// A date reduced to its year: the last four characters. The unavailable
/// marker yields 0.
pub fn year_value(group: Category, field: &str, raw: &str) -> Result<i32, IngestError> {
    let raw = raw.trim();
    if raw == UNAVAILABLE {
        return Ok(0);
    }
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() < 4 {
        return Err(field_err(group, field, raw, "too short for a year"));
    }
    let year: String = chars[chars.len() - 4..].iter().collect();
    year.parse::<i32>()
        .map_err(|e| field_err(group, field, raw, e.to_string()))
}

/// A monetary amount in abbreviated notation: a leading numeral scaled by a
/// K/M/B suffix (10^3 / 10^6 / 10^9). Without a suffix letter the currency
/// glyph acts as the unit marker and the multiplier defaults to 10^3.
///
/// `"41M kr"` → 41_000_000.0.
pub fn magnitude_value(group: Category, field: &str, raw: &str) -> Result<f64, IngestError> {
    let raw = raw.trim();
    let (numeral, multiplier) = if let Some(i) = raw.find('K') {
        (&raw[..i], 1e3)
    } else if let Some(i) = raw.find('M') {
        (&raw[..i], 1e6)
    } else if let Some(i) = raw.find('B') {
        (&raw[..i], 1e9)
    } else {
        let end = raw
            .find(|c: char| !c.is_ascii_digit() && c != '.' && c != ',')
            .unwrap_or(raw.len());
        (&raw[..end], 1e3)
    };
    let numeral = numeral.trim().replace(',', "");
    let value = numeral
        .parse::<f64>()
        .map_err(|e| field_err(group, field, raw, e.to_string()))?;
    Ok(value * multiplier)
}

/// Replace a true value with a uniform draw from [V/n, V·n], hiding the
/// exact number while keeping its order of magnitude. Zero maps to zero.
pub fn obfuscate(value: i64, factor: i64) -> i64 {
    if value == 0 {
        return 0;
    }
    let a = value / factor;
    let b = value.saturating_mul(factor);
    let (lo, hi) = (a.min(b), a.max(b));
    rand::thread_rng().gen_range(lo..=hi)
}

/// Ordinal for a foot-strength label.
pub fn foot_code(group: Category, field: &str, raw: &str) -> Result<u8, IngestError> {
    let code = match raw.trim() {
        "-" => 0,
        "Very Weak" => 1,
        "Weak" => 2,
        "Reasonable" => 3,
        "Fairly Strong" => 4,
        "Strong" => 5,
        "Very Strong" => 6,
        _ => return Err(field_err(group, field, raw, "unknown foot strength")),
    };
    Ok(code)
}

/// Ordinal for an eligibility flag.
pub fn eligible_code(group: Category, field: &str, raw: &str) -> Result<u8, IngestError> {
    match raw.trim() {
        "No" => Ok(0),
        "Yes" => Ok(1),
        _ => Err(field_err(group, field, raw, "unknown eligibility flag")),
    }
}

// ---------------------------------------------------------------------------
// Group cleaners
// ---------------------------------------------------------------------------

pub fn clean_identity(
    fields: &mut HashMap<String, String>,
    season: i32,
) -> Result<Identity, IngestError> {
    let group = Category::Identity;
    Ok(Identity {
        name: take_field(group, fields, "name")?.trim().to_string(),
        uid: take_field(group, fields, "uid")?.trim().to_string(),
        season,
    })
}

/// Clean the profile group and intern its categorical values. The position
/// field is decoded but not yet fanned out.
pub fn clean_profile(
    fields: &mut HashMap<String, String>,
    interner: &mut Interner,
) -> Result<ProfileDraft, IngestError> {
    let group = Category::Profile;

    let age_raw = take_field(group, fields, "age")?;
    let age = age_raw
        .trim()
        .parse::<u8>()
        .map_err(|e| field_err(group, "age", &age_raw, e.to_string()))?;

    let positions = decode_positions(&take_field(group, fields, "position")?)?;

    let division = interner.intern(
        Dimension::Division,
        take_field(group, fields, "division")?.trim(),
    );
    let club = interner.intern(Dimension::Club, take_field(group, fields, "club")?.trim());
    let nat = interner.intern(Dimension::Nat, take_field(group, fields, "nat")?.trim());

    let eligible_raw = take_field(group, fields, "eligible")?;
    let eligible = eligible_code(group, "eligible", &eligible_raw)?;
    let right_raw = take_field(group, fields, "right_foot")?;
    let right_foot = foot_code(group, "right_foot", &right_raw)?;
    let left_raw = take_field(group, fields, "left_foot")?;
    let left_foot = foot_code(group, "left_foot", &left_raw)?;

    let mins_raw = take_field(group, fields, "mins")?;
    let mins = if mins_raw.trim() == UNAVAILABLE {
        0
    } else {
        digits_to_int(group, "mins", &mins_raw)?
    };

    Ok(ProfileDraft {
        age,
        positions,
        division,
        club,
        nat,
        eligible,
        right_foot,
        left_foot,
        mins,
    })
}

/// Clean the profile group and fan it out to one row per position.
pub fn clean_profiles(
    fields: &mut HashMap<String, String>,
    interner: &mut Interner,
) -> Result<Vec<Profile>, IngestError> {
    fan_out(clean_profile(fields, interner)?)
}

pub fn clean_stats(fields: &mut HashMap<String, String>) -> Result<StatLine, IngestError> {
    StatLine::from_fields(fields)
}

pub fn clean_attributes(
    fields: &mut HashMap<String, String>,
) -> Result<AttributeSet, IngestError> {
    // Natural fitness arrives as `nat`, which would collide with the
    // profile's nationality column once both land in the same store.
    if let Some(value) = fields.remove("nat") {
        fields.insert("nat_f".to_string(), value);
    }
    AttributeSet::from_fields(fields)
}

pub fn clean_contract(
    fields: &mut HashMap<String, String>,
    obfuscation_factor: i64,
) -> Result<Contract, IngestError> {
    let group = Category::Contract;

    let begin_raw = take_field(group, fields, "begin_date")?;
    let begin_date = year_value(group, "begin_date", &begin_raw)?;
    let expiry_raw = take_field(group, fields, "expiry_date")?;
    let expiry_date = year_value(group, "expiry_date", &expiry_raw)?;

    let ext_raw = take_field(group, fields, "extension")?;
    let extension = if ext_raw.trim().is_empty() {
        0
    } else {
        ext_raw
            .trim()
            .parse::<i32>()
            .map_err(|e| field_err(group, "extension", &ext_raw, e.to_string()))?
    };

    let wage_raw = take_field(group, fields, "wage")?;
    let wage = match wage_raw.trim() {
        UNAVAILABLE | "N/A" => 0,
        _ => digits_to_int(group, "wage", &wage_raw)?,
    };

    // The asking price is never stored verbatim: knowing the exact number
    // would defeat the in-game negotiation.
    let ap_raw = take_field(group, fields, "ap")?;
    let asking_price = magnitude_value(group, "ap", &ap_raw)? as i64;
    let value = obfuscate(asking_price, obfuscation_factor);

    let release_raw = take_field(group, fields, "release_clause")?;
    let release_clause = if release_raw.trim() == UNAVAILABLE {
        0
    } else {
        magnitude_value(group, "release_clause", &release_raw)? as i64
    };

    Ok(Contract {
        begin_date,
        expiry_date,
        extension,
        wage,
        value,
        release_clause,
    })
}

pub fn clean_rating(fields: &mut HashMap<String, String>) -> Result<Rating, IngestError> {
    let group = Category::Rating;
    let raw = take_field(group, fields, "ca")?;
    let ca = raw
        .trim()
        .parse::<i32>()
        .map_err(|e| field_err(group, "ca", &raw, e.to_string()))?;
    Ok(Rating { ca })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
