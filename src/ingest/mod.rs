// Ingestion pipeline: export text → normalized per-player records.
//
// The session object owns all run-scoped mutable state (the player-id
// counter and the lookup interner) and is threaded through every
// normalization call, so several runs can coexist and nothing hides in a
// process-wide singleton. One call to `stream` makes exactly one forward
// pass over the source.

pub mod interner;
pub mod normalize;
pub mod parser;
pub mod positions;
pub mod record;

use std::collections::HashMap;
use std::io::BufRead;

use thiserror::Error;
use tracing::debug;

use crate::ingest::interner::{Dimension, Interner, LookupOffsets};
use crate::ingest::parser::{slice_groups, ColumnRange, ExportLayout, ExportReader};
use crate::ingest::record::{Category, PlayerRecord};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IngestError {
    /// The source stream does not match the expected preamble/header/grid
    /// shape. Fatal for the whole ingestion call.
    #[error("malformed export: {0}")]
    Format(String),

    /// A cell could not be coerced to its category's expected shape. Fails
    /// the current record; the driver decides skip versus abort.
    #[error("{group} field `{field}`: cannot parse {value:?}: {reason}")]
    FieldParse {
        group: Category,
        field: String,
        value: String,
        reason: String,
    },

    /// A categorical value resolved to more than one id. Unreachable under
    /// correct single-writer interning; signals an interner shared across
    /// incompatible runs.
    #[error("{dimension} lookup already maps {value:?} to id {existing}, refusing id {incoming}")]
    LookupInconsistency {
        dimension: Dimension,
        value: String,
        existing: i64,
        incoming: i64,
    },

    #[error("failed to read export: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Run-scoped ingestion context: season tag, player-id counter, obfuscation
/// factor, and the lookup interner.
#[derive(Debug)]
pub struct IngestSession {
    season: i32,
    obfuscation_factor: i64,
    next_player_id: i64,
    interner: Interner,
}

impl IngestSession {
    pub fn new(season: i32, offsets: LookupOffsets, obfuscation_factor: i64) -> Self {
        Self {
            season,
            obfuscation_factor,
            next_player_id: 0,
            interner: Interner::new(offsets),
        }
    }

    /// Continue the player-id sequence from `id` instead of zero, so a
    /// merge run never reuses an id already persisted downstream.
    pub fn with_next_player_id(mut self, id: i64) -> Self {
        self.next_player_id = id;
        self
    }

    /// The interner, e.g. for preloading persisted lookup rows before a
    /// merge run.
    pub fn interner_mut(&mut self) -> &mut Interner {
        &mut self.interner
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Begin one forward pass over an export, yielding normalized records.
    pub fn stream<'s, R: BufRead>(
        &'s mut self,
        reader: R,
        layout: &ExportLayout,
    ) -> Result<RecordStream<'s, R>, IngestError> {
        for category in Category::ALL {
            if !layout.ranges.iter().any(|(c, _)| *c == category) {
                return Err(IngestError::Format(format!(
                    "layout defines no column range for the {category} group"
                )));
            }
        }
        let reader = ExportReader::new(reader, layout)?;
        Ok(RecordStream {
            session: self,
            reader,
            ranges: layout.ranges.clone(),
        })
    }

    /// Normalize one sliced row into a `PlayerRecord`.
    fn normalize_row(
        &mut self,
        headers: &[String],
        cells: &[String],
        ranges: &[(Category, ColumnRange)],
    ) -> Result<PlayerRecord, IngestError> {
        let mut groups: HashMap<Category, HashMap<String, String>> = HashMap::new();
        for (category, pairs) in slice_groups(headers, cells, ranges)? {
            let fields = groups.entry(category).or_default();
            for (header, value) in pairs {
                fields.insert(normalize::canonical_field(header), value.to_string());
            }
        }

        let mut fields_for = |category: Category| {
            groups
                .remove(&category)
                .expect("stream() verified every category has a range")
        };

        let stats = normalize::clean_stats(&mut fields_for(Category::Stats))?;
        let attributes = normalize::clean_attributes(&mut fields_for(Category::Attributes))?;
        let contract = normalize::clean_contract(
            &mut fields_for(Category::Contract),
            self.obfuscation_factor,
        )?;
        let rating = normalize::clean_rating(&mut fields_for(Category::Rating))?;
        let identity = normalize::clean_identity(&mut fields_for(Category::Identity), self.season)?;
        let profiles =
            normalize::clean_profiles(&mut fields_for(Category::Profile), &mut self.interner)?;

        let id = self.next_player_id;
        self.next_player_id += 1;

        // Only the lookup rows first seen during this record (or still
        // pending from a record the driver chose to skip) travel with it.
        let new_lookups = self.interner.take_fresh();
        debug!(
            player = %identity.name,
            positions = profiles.len(),
            new_lookups = new_lookups.len(),
            "normalized record"
        );

        Ok(PlayerRecord {
            id,
            identity,
            profiles,
            stats,
            attributes,
            contract,
            rating,
            new_lookups,
        })
    }
}

// ---------------------------------------------------------------------------
// Record stream
// ---------------------------------------------------------------------------

/// Iterator over one export pass. Each item is one normalized record or the
/// error that failed it; grid-shape problems surface as `Format` errors and
/// should abort the pass.
pub struct RecordStream<'s, R: BufRead> {
    session: &'s mut IngestSession,
    reader: ExportReader<R>,
    ranges: Vec<(Category, ColumnRange)>,
}

impl<R: BufRead> Iterator for RecordStream<'_, R> {
    type Item = Result<PlayerRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cells = match self.reader.next()? {
            Ok(cells) => cells,
            Err(e) => return Some(Err(e)),
        };
        Some(
            self.session
                .normalize_row(self.reader.headers(), &cells, &self.ranges),
        )
    }
}
