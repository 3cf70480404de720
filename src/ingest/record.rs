// Typed category groups for one player record.
//
// The export groups its columns into six fixed categories. Each category is
// an explicit struct with named fields so a missing or renamed column fails
// at normalization time instead of turning into a silently-empty value.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::ingest::interner::LookupEntry;
use crate::ingest::normalize::{stat_value, take_field, text_value};
use crate::ingest::IngestError;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// The fixed set of column groups in a view export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Identity,
    Profile,
    Stats,
    Attributes,
    Contract,
    Rating,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Identity,
        Category::Profile,
        Category::Stats,
        Category::Attributes,
        Category::Contract,
        Category::Rating,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Identity => "identity",
            Category::Profile => "profile",
            Category::Stats => "stats",
            Category::Attributes => "attributes",
            Category::Contract => "contract",
            Category::Rating => "rating",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Field-block macro
// ---------------------------------------------------------------------------

/// Declares a wide column group: the struct, its canonical column names in
/// declaration order, `from_fields` construction from a canonical-name map,
/// and `values` in the same order as `NAMES`. Keeping all four in one
/// declaration means the field list can never drift out of step with the
/// column ordering the database and the scoring path rely on.
macro_rules! field_group {
    (
        $(#[$meta:meta])*
        $name:ident($category:expr, $ty:ty, $parse:path) {
            $( $field:ident => $col:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize)]
        pub struct $name {
            $( pub $field: $ty, )+
        }

        impl $name {
            /// Canonical column names, in export column order.
            pub const NAMES: &'static [&'static str] = &[ $( $col, )+ ];

            /// Build from canonical-name → raw-value fields, consuming the
            /// columns this group requires. A missing column is a format
            /// error; an uncoercible value is a field parse error.
            pub fn from_fields(
                fields: &mut HashMap<String, String>,
            ) -> Result<Self, IngestError> {
                Ok(Self {
                    $( $field: $parse($category, $col, take_field($category, fields, $col)?)?, )+
                })
            }

            /// Field values, aligned with `NAMES`.
            pub fn values(&self) -> Vec<$ty> {
                vec![ $( self.$field.clone(), )+ ]
            }

            /// Look up a single value by canonical column name.
            pub fn get(&self, name: &str) -> Option<$ty> {
                Self::NAMES
                    .iter()
                    .position(|n| *n == name)
                    .map(|i| self.values().swap_remove(i))
            }
        }
    };
}

field_group! {
    /// Per-90-minute performance statistics. `-` in the export means the
    /// statistic was unavailable and normalizes to 0.0.
    StatLine(Category::Stats, f64, stat_value) {
        aer_a => "aer_a",
        hdrs_w => "hdrs_w",
        blk => "blk",
        clr => "clr",
        tck_c => "tck_c",
        pres_a => "pres_a",
        pres_c => "pres_c",
        interceptions => "interceptions",
        sprints => "sprints",
        poss_lost => "poss_lost",
        poss_won => "poss_won",
        drb => "drb",
        op_crs_a => "op_crs_a",
        op_crs_c => "op_crs_c",
        ps_a => "ps_a",
        ps_c => "ps_c",
        pr_passes => "pr_passes",
        op_kp => "op_kp",
        ch_c => "ch_c",
        xa => "xa",
        shot => "shot",
        sht => "sht",
        np_xg => "np_xg",
    }
}

field_group! {
    /// Skill attributes. Kept as raw text: the game masks unscouted values
    /// and renders partially-known ones as ranges, so these never feed the
    /// numeric scoring path. The `nat` column (natural fitness) is renamed
    /// to `nat_f` by the cleaner before this struct is built, to keep it
    /// distinct from the profile's nationality column.
    AttributeSet(Category::Attributes, String, text_value) {
        cor => "cor",
        cro => "cro",
        dri => "dri",
        fin => "fin",
        fir => "fir",
        fre => "fre",
        hea => "hea",
        lon => "lon",
        long_throws => "long_throws",
        mar => "mar",
        pas => "pas",
        pen => "pen",
        tck => "tck",
        tec => "tec",
        agg => "agg",
        ant => "ant",
        bra => "bra",
        cmp => "cmp",
        cnt => "cnt",
        decisions => "decisions",
        det => "det",
        fla => "fla",
        ldr => "ldr",
        otb => "otb",
        pos => "pos",
        tea => "tea",
        vis => "vis",
        wor => "wor",
        acc => "acc",
        agi => "agi",
        bal => "bal",
        jum => "jum",
        nat_f => "nat_f",
        pac => "pac",
        sta => "sta",
        strength => "strength",
        aer => "aer",
        cmd => "cmd",
        com => "com",
        ecc => "ecc",
        han => "han",
        kic => "kic",
        one_v_one => "one_v_one",
        pun => "pun",
        reflexes => "ref",
        tro => "tro",
        thr => "thr",
    }
}

// ---------------------------------------------------------------------------
// Narrow groups
// ---------------------------------------------------------------------------

/// Who the row is: display name, the game's stable UID, and the season the
/// export was taken from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub name: String,
    pub uid: String,
    pub season: i32,
}

/// Profile fields before position fan-out: the position field still holds
/// every decoded code. Categorical values are already interned to ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDraft {
    pub age: u8,
    pub positions: Vec<String>,
    pub division: i64,
    pub club: i64,
    pub nat: i64,
    pub eligible: u8,
    pub right_foot: u8,
    pub left_foot: u8,
    pub mins: i64,
}

/// One fanned-out profile row: a single position code plus its ordinal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub position: String,
    pub position_id: u8,
    pub age: u8,
    pub division: i64,
    pub club: i64,
    pub nat: i64,
    pub eligible: u8,
    pub right_foot: u8,
    pub left_foot: u8,
    pub mins: i64,
}

/// Contract terms. Dates are reduced to years; the asking price is stored
/// obfuscated as `value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    pub begin_date: i32,
    pub expiry_date: i32,
    pub extension: i32,
    pub wage: i64,
    pub value: i64,
    pub release_clause: i64,
}

/// Overall current-ability rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rating {
    pub ca: i32,
}

// ---------------------------------------------------------------------------
// Assembled record
// ---------------------------------------------------------------------------

/// One player's full set of normalized category groups for one ingestion
/// pass, plus the lookup rows first seen while normalizing this record.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    /// Player id assigned by the session, sequential within the run.
    pub id: i64,
    pub identity: Identity,
    /// One entry per decoded position; all other fields identical.
    pub profiles: Vec<Profile>,
    pub stats: StatLine,
    pub attributes: AttributeSet,
    pub contract: Contract,
    pub rating: Rating,
    /// Incremental lookup rows: only values never seen before this record.
    pub new_lookups: Vec<LookupEntry>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_names_and_values_stay_aligned() {
        let mut fields: HashMap<String, String> = StatLine::NAMES
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), format!("{}.5", i)))
            .collect();
        let line = StatLine::from_fields(&mut fields).unwrap();
        let values = line.values();
        assert_eq!(values.len(), StatLine::NAMES.len());
        assert_eq!(values[0], 0.5);
        assert_eq!(line.get("np_xg"), Some(22.5));
        assert!(fields.is_empty(), "every column should be consumed");
    }

    #[test]
    fn attribute_names_and_values_stay_aligned() {
        let mut fields: HashMap<String, String> = AttributeSet::NAMES
            .iter()
            .map(|n| (n.to_string(), "12".to_string()))
            .collect();
        let set = AttributeSet::from_fields(&mut fields).unwrap();
        assert_eq!(set.values().len(), AttributeSet::NAMES.len());
        assert_eq!(set.get("ref").as_deref(), Some("12"));
        assert_eq!(set.reflexes, "12");
    }

    #[test]
    fn missing_stat_column_is_an_error() {
        let mut fields: HashMap<String, String> = StatLine::NAMES
            .iter()
            .skip(1)
            .map(|n| (n.to_string(), "1.0".to_string()))
            .collect();
        let err = StatLine::from_fields(&mut fields).unwrap_err();
        assert!(err.to_string().contains("aer_a"));
    }

    #[test]
    fn unparsable_stat_is_a_field_error() {
        let mut fields: HashMap<String, String> = StatLine::NAMES
            .iter()
            .map(|n| (n.to_string(), "1.0".to_string()))
            .collect();
        fields.insert("xa".into(), "not-a-number".into());
        let err = StatLine::from_fields(&mut fields).unwrap_err();
        assert!(matches!(err, IngestError::FieldParse { .. }));
    }
}
